//! Config validation: unknown-key detection with Levenshtein suggestions.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree and compare against known field names. Unknown keys
//! are errors (a typo in a threshold name would otherwise silently fall back
//! to a default). Then proceed with normal serde deserialization.

use std::collections::HashSet;

/// An unknown or misspelled config key.
#[derive(Debug, Clone)]
pub struct UnknownKey {
    pub field: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown config key '{}'", self.field)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Placeholder segment for user-chosen table names (tag keys, template keys).
const ANY: &str = "*";

/// Returns the complete set of valid dotted key paths for HealerConfig.
///
/// User-named segments appear as `*`. Maintained manually to match the
/// struct hierarchy in healer_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [device]
        "device",
        "device.name",
        "device.address",
        "device.poll_interval_ms",
        "device.read_timeout_ms",
        "device.jitter",
        // [tags.<key>]
        "tags",
        "tags.*",
        "tags.*.name",
        "tags.*.type",
        "tags.*.nominal",
        "tags.*.failure_condition",
        "tags.*.failure_value",
        "tags.*.failure_threshold_low",
        "tags.*.failure_threshold_high",
        "tags.*.remediation_action",
        // [remediation]
        "remediation",
        "remediation.auto_remediate",
        "remediation.cooldown_seconds",
        "remediation.max_retries",
        // [automation]
        "automation",
        "automation.mode",
        "automation.base_url",
        "automation.token",
        "automation.verify_ssl",
        "automation.request_timeout_secs",
        "automation.status_poll_interval_ms",
        "automation.job_timeout_secs",
        "automation.simulated_job_duration_ms",
        "automation.simulated_failure_rate",
        "automation.job_templates",
        "automation.job_templates.*",
        // [chaos]
        "chaos",
        "chaos.enabled",
        "chaos.injection_rate",
        "chaos.failure_types",
        "chaos.failure_weights",
        "chaos.failure_weights.*",
        "chaos.network_timeout_ms",
        "chaos.connection_loss_seconds",
        "chaos.startup_grace_seconds",
        "chaos.rearm_seconds",
        // [history]
        "history",
        "history.tag_history_size",
        "history.violation_history_size",
        "history.event_capacity",
        "history.subscriber_buffer",
        // [server]
        "server",
        "server.addr",
    ];
    keys.iter().copied().collect()
}

/// Tables whose direct children are user-named.
const OPEN_TABLES: &[&str] = &["tags", "automation.job_templates", "chaos.failure_weights"];

/// Replace user-named segments with `*` so the key can be looked up in
/// [`known_config_keys`].
fn normalize_key(key: &str) -> String {
    for table in OPEN_TABLES {
        if let Some(rest) = key.strip_prefix(table).and_then(|r| r.strip_prefix('.')) {
            return match rest.split_once('.') {
                Some((_, tail)) => format!("{table}.{ANY}.{tail}"),
                None => format!("{table}.{ANY}"),
            };
        }
    }
    key.to_string()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        // ties broken alphabetically so suggestions are stable across runs
        match best {
            Some((bk, bd)) if dist > bd || (dist == bd && k >= bk) => {}
            _ => best = Some((k, dist)),
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and report every key that is not part of the
/// config schema.
///
/// Suggestions are given in the user's own spelling, so `tags.Pump.nominl`
/// suggests `tags.Pump.nominal`.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<UnknownKey> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let mut unknown = Vec::new();

    for key in walk_toml_keys(&value, "") {
        let normalized = normalize_key(&key);
        if known.contains(normalized.as_str()) {
            continue;
        }
        let suggestion = suggest_correction(&normalized, &known).map(|s| denormalize(&s, &key));
        unknown.push(UnknownKey {
            field: key,
            suggestion,
        });
    }

    unknown
}

/// Put the user's table name back into a suggested `*` key.
fn denormalize(suggested: &str, original: &str) -> String {
    if !suggested.contains(ANY) {
        return suggested.to_string();
    }
    for table in OPEN_TABLES {
        if let Some(rest) = original.strip_prefix(table).and_then(|r| r.strip_prefix('.')) {
            let name = rest.split('.').next().unwrap_or(ANY);
            return suggested.replacen(ANY, name, 1);
        }
    }
    suggested.to_string()
}

// ============================================================================
// Tests
// ============================================================================
