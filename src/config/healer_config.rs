//! Healer Configuration - typed TOML file form and its validated runtime form
//!
//! [`HealerConfig`] mirrors the file one-to-one (every field has a serde
//! default except the tag table). [`HealerConfig::into_app_config`] checks
//! every rule and produces an [`AppConfig`] whose tag, chaos and template
//! settings are already typed, so the core never re-validates at runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::defaults;
use crate::types::{FailureCondition, FailureType, RemediationAction, TagConfig, TagValue, ValueType};

// ============================================================================
// File form
// ============================================================================

/// Root of `healer.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealerConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    /// Monitored tags keyed by their identity inside the core.
    #[serde(default)]
    pub tags: BTreeMap<String, TagEntry>,

    #[serde(default)]
    pub remediation: RemediationConfig,

    #[serde(default)]
    pub automation: AutomationConfig,

    #[serde(default)]
    pub chaos: ChaosConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// `[device]`: the controller being polled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Label used in logs and status reports.
    #[serde(default = "default_device_name")]
    pub name: String,

    /// Network address of the controller (informational for the simulated link).
    #[serde(default)]
    pub address: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Relative standard deviation of simulated readings around nominal.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            address: String::new(),
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            read_timeout_ms: defaults::READ_TIMEOUT_MS,
            jitter: default_jitter(),
        }
    }
}

impl DeviceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// `[tags.<key>]` as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagEntry {
    /// Device-side tag path. Defaults to the table key.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub value_type: ValueType,

    pub nominal: toml::Value,

    pub failure_condition: String,

    #[serde(default)]
    pub failure_value: Option<toml::Value>,

    #[serde(default)]
    pub failure_threshold_low: Option<f64>,

    #[serde(default)]
    pub failure_threshold_high: Option<f64>,

    #[serde(default)]
    pub remediation_action: Option<String>,
}

/// `[remediation]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationConfig {
    #[serde(default)]
    pub auto_remediate: bool,

    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            auto_remediate: false,
            cooldown_seconds: defaults::COOLDOWN_SECONDS,
            max_retries: defaults::MAX_RETRIES,
        }
    }
}

impl RemediationConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

/// Which automation backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AutomationMode {
    /// In-process stand-in; no network traffic.
    #[default]
    Simulated,
    /// Automation platform REST API.
    Aap,
}

/// `[automation]` as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    #[serde(default)]
    pub mode: AutomationMode,

    #[serde(default)]
    pub base_url: String,

    /// Bearer token. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub token: String,

    #[serde(default = "default_true")]
    pub verify_ssl: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,

    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Simulated backend: time from launch to terminal status.
    #[serde(default = "default_simulated_job_duration_ms")]
    pub simulated_job_duration_ms: u64,

    /// Simulated backend: probability that a job ends `failed`.
    #[serde(default)]
    pub simulated_failure_rate: f64,

    /// Action (`reset` or `emergency_reset`) to job template id.
    #[serde(default)]
    pub job_templates: BTreeMap<String, u64>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            mode: AutomationMode::default(),
            base_url: String::new(),
            token: String::new(),
            verify_ssl: true,
            request_timeout_secs: defaults::AUTOMATION_REQUEST_TIMEOUT_SECS,
            status_poll_interval_ms: defaults::STATUS_POLL_INTERVAL_MS,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            simulated_job_duration_ms: defaults::SIMULATED_JOB_DURATION_MS,
            simulated_failure_rate: 0.0,
            job_templates: BTreeMap::new(),
        }
    }
}

/// `[chaos]` as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_injection_rate")]
    pub injection_rate: f64,

    #[serde(default = "default_failure_types")]
    pub failure_types: Vec<String>,

    /// Optional relative weights per failure type; uniform when absent.
    #[serde(default)]
    pub failure_weights: BTreeMap<String, f64>,

    #[serde(default = "default_network_timeout_ms")]
    pub network_timeout_ms: u64,

    #[serde(default = "default_connection_loss_seconds")]
    pub connection_loss_seconds: u64,

    #[serde(default = "default_startup_grace_seconds")]
    pub startup_grace_seconds: u64,

    #[serde(default = "default_rearm_seconds")]
    pub rearm_seconds: u64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            injection_rate: defaults::INJECTION_RATE,
            failure_types: default_failure_types(),
            failure_weights: BTreeMap::new(),
            network_timeout_ms: defaults::NETWORK_TIMEOUT_MS,
            connection_loss_seconds: defaults::CONNECTION_LOSS_SECONDS,
            startup_grace_seconds: defaults::CHAOS_STARTUP_GRACE_SECONDS,
            rearm_seconds: defaults::CHAOS_REARM_SECONDS,
        }
    }
}

/// `[history]`: sizes of the bounded in-memory containers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_tag_history_size")]
    pub tag_history_size: usize,

    #[serde(default = "default_violation_history_size")]
    pub violation_history_size: usize,

    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            tag_history_size: defaults::TAG_HISTORY_SIZE,
            violation_history_size: defaults::VIOLATION_HISTORY_SIZE,
            event_capacity: defaults::EVENT_CAPACITY,
            subscriber_buffer: defaults::SUBSCRIBER_BUFFER,
        }
    }
}

/// `[server]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Validated form
// ============================================================================

/// Automation settings with templates resolved to actions.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationSettings {
    pub mode: AutomationMode,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub verify_ssl: bool,
    pub request_timeout: Duration,
    pub status_poll_interval: Duration,
    pub job_timeout: Duration,
    pub simulated_job_duration: Duration,
    pub simulated_failure_rate: f64,
    pub job_templates: BTreeMap<RemediationAction, u64>,
}

impl Default for AutomationSettings {
    /// Simulated backend with one template per action (ids 1 to 4).
    fn default() -> Self {
        let file = AutomationConfig::default();
        Self {
            mode: file.mode,
            base_url: file.base_url,
            token: file.token,
            verify_ssl: file.verify_ssl,
            request_timeout: Duration::from_secs(file.request_timeout_secs),
            status_poll_interval: Duration::from_millis(file.status_poll_interval_ms),
            job_timeout: Duration::from_secs(file.job_timeout_secs),
            simulated_job_duration: Duration::from_millis(file.simulated_job_duration_ms),
            simulated_failure_rate: 0.0,
            job_templates: RemediationAction::ALL
                .into_iter()
                .zip(1..)
                .collect(),
        }
    }
}

/// Chaos settings with failure types parsed.
#[derive(Debug, Clone, Serialize)]
pub struct ChaosSettings {
    pub enabled: bool,
    pub injection_rate: f64,
    pub failure_types: Vec<FailureType>,
    /// Same order as `failure_types`; `None` means uniform selection.
    pub failure_weights: Option<Vec<f64>>,
    pub network_timeout: Duration,
    pub connection_loss: Duration,
    pub startup_grace: Duration,
    pub rearm: Duration,
}

impl Default for ChaosSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            injection_rate: defaults::INJECTION_RATE,
            failure_types: FailureType::ALL.to_vec(),
            failure_weights: None,
            network_timeout: Duration::from_millis(defaults::NETWORK_TIMEOUT_MS),
            connection_loss: Duration::from_secs(defaults::CONNECTION_LOSS_SECONDS),
            startup_grace: Duration::from_secs(defaults::CHAOS_STARTUP_GRACE_SECONDS),
            rearm: Duration::from_secs(defaults::CHAOS_REARM_SECONDS),
        }
    }
}

/// Fully validated configuration handed to the control plane.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub tags: Vec<TagConfig>,
    pub remediation: RemediationConfig,
    pub automation: AutomationSettings,
    pub chaos: ChaosSettings,
    pub history: HistoryConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Defaults everywhere except the tag list.
    ///
    /// Intended for embedding and tests; file-based startup goes through
    /// [`HealerConfig::into_app_config`].
    pub fn with_tags(tags: Vec<TagConfig>) -> Self {
        Self {
            device: DeviceConfig::default(),
            tags,
            remediation: RemediationConfig::default(),
            automation: AutomationSettings::default(),
            chaos: ChaosSettings::default(),
            history: HistoryConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn tag(&self, key: &str) -> Option<&TagConfig> {
        self.tags.iter().find(|t| t.key == key)
    }

    /// Parse, check unknown keys and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut errors: Vec<String> = super::validation::validate_unknown_keys(contents)
            .iter()
            .map(ToString::to_string)
            .collect();

        let file: HealerConfig = match toml::from_str(contents) {
            Ok(f) => f,
            Err(e) if errors.is_empty() => return Err(ConfigError::Parse(None, e)),
            Err(e) => {
                errors.push(e.to_string());
                return Err(ConfigError::Validation(errors));
            }
        };

        match file.into_app_config() {
            Ok(cfg) if errors.is_empty() => Ok(cfg),
            Ok(_) => Err(ConfigError::Validation(errors)),
            Err(ConfigError::Validation(more)) => {
                errors.extend(more);
                Err(ConfigError::Validation(errors))
            }
            Err(other) => Err(other),
        }
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(None, err) => ConfigError::Parse(Some(path.to_path_buf()), err),
            other => other,
        })?;
        info!(
            path = %path.display(),
            device = %config.device.name,
            tags = config.tags.len(),
            "Loaded healer config"
        );
        Ok(config)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl HealerConfig {
    /// Check every rule and build the typed runtime configuration.
    ///
    /// All problems are collected; nothing is reported piecemeal.
    pub fn into_app_config(self) -> Result<AppConfig, ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        // Device
        if self.device.poll_interval_ms == 0 {
            errors.push("device.poll_interval_ms must be > 0".to_string());
        }
        if self.device.read_timeout_ms == 0 {
            errors.push("device.read_timeout_ms must be > 0".to_string());
        }
        if !self.device.jitter.is_finite() || self.device.jitter < 0.0 {
            errors.push(format!(
                "device.jitter = {} must be a finite number >= 0",
                self.device.jitter
            ));
        }

        // Tags
        if self.tags.is_empty() {
            errors.push("at least one [tags.<name>] section is required".to_string());
        }
        let mut tags = Vec::with_capacity(self.tags.len());
        for (key, entry) in &self.tags {
            match build_tag(key, entry) {
                Ok(tag) => tags.push(tag),
                Err(mut tag_errors) => errors.append(&mut tag_errors),
            }
        }

        // Remediation
        if self.remediation.max_retries > 100 {
            errors.push(format!(
                "remediation.max_retries = {} is unreasonably large (max 100)",
                self.remediation.max_retries
            ));
        }

        // Automation
        let automation = build_automation(&self.automation, &tags, &mut errors);

        // Chaos
        let chaos = build_chaos(&self.chaos, &mut errors);

        // History
        let h = &self.history;
        for (name, value) in [
            ("history.tag_history_size", h.tag_history_size),
            ("history.violation_history_size", h.violation_history_size),
            ("history.event_capacity", h.event_capacity),
            ("history.subscriber_buffer", h.subscriber_buffer),
        ] {
            if value == 0 {
                errors.push(format!("{name} must be > 0"));
            }
        }

        // Server
        if self.server.addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "server.addr = '{}' is not a valid socket address",
                self.server.addr
            ));
        }

        if errors.is_empty() {
            Ok(AppConfig {
                device: self.device,
                tags,
                remediation: self.remediation,
                automation,
                chaos,
                history: self.history,
                server: self.server,
            })
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

fn build_tag(key: &str, entry: &TagEntry) -> Result<TagConfig, Vec<String>> {
    let mut errors = Vec::new();
    let ty = entry.value_type;

    let nominal = match TagValue::from_toml(&entry.nominal).and_then(|v| v.coerce(ty)) {
        Some(v) => Some(v),
        None => {
            errors.push(format!(
                "tags.{key}.nominal = {} is not a valid {ty}",
                entry.nominal
            ));
            None
        }
    };

    let failure_value = entry.failure_value.as_ref().map(|raw| {
        TagValue::from_toml(raw).and_then(|v| v.coerce(ty)).ok_or_else(|| {
            format!("tags.{key}.failure_value = {raw} is not a valid {ty}")
        })
    });

    let low = entry.failure_threshold_low;
    let high = entry.failure_threshold_high;
    for (field, value) in [("failure_threshold_low", low), ("failure_threshold_high", high)] {
        if let Some(v) = value {
            if !v.is_finite() {
                errors.push(format!("tags.{key}.{field} must be finite (got {v})"));
            }
        }
    }

    let numeric_only = |errors: &mut Vec<String>| {
        if ty == ValueType::Bool {
            errors.push(format!(
                "tags.{key}: bool tags only support 'equals' and 'not_equals' (got '{}')",
                entry.failure_condition
            ));
        }
    };

    let need_failure_value = |errors: &mut Vec<String>| match failure_value.clone() {
        Some(Ok(v)) => Some(v),
        Some(Err(e)) => {
            errors.push(e);
            None
        }
        None => {
            errors.push(format!(
                "tags.{key}: '{}' requires failure_value",
                entry.failure_condition
            ));
            None
        }
    };

    let condition = match entry.failure_condition.as_str() {
        "equals" => need_failure_value(&mut errors)
            .map(|failure_value| FailureCondition::Equals { failure_value }),
        "not_equals" => need_failure_value(&mut errors)
            .map(|failure_value| FailureCondition::NotEquals { failure_value }),
        "outside_range" => {
            numeric_only(&mut errors);
            match (low, high) {
                (Some(low), Some(high)) if low <= high => {
                    Some(FailureCondition::OutsideRange { low, high })
                }
                (Some(low), Some(high)) => {
                    errors.push(format!(
                        "tags.{key}: failure_threshold_low ({low}) must be <= failure_threshold_high ({high})"
                    ));
                    None
                }
                _ => {
                    errors.push(format!(
                        "tags.{key}: 'outside_range' requires failure_threshold_low and failure_threshold_high"
                    ));
                    None
                }
            }
        }
        "below" => {
            numeric_only(&mut errors);
            if let Some(threshold) = low {
                Some(FailureCondition::Below { threshold })
            } else {
                errors.push(format!("tags.{key}: 'below' requires failure_threshold_low"));
                None
            }
        }
        "above" => {
            numeric_only(&mut errors);
            if let Some(threshold) = high {
                Some(FailureCondition::Above { threshold })
            } else {
                errors.push(format!("tags.{key}: 'above' requires failure_threshold_high"));
                None
            }
        }
        other => {
            errors.push(format!(
                "tags.{key}.failure_condition = '{other}' is not one of equals, not_equals, outside_range, below, above"
            ));
            None
        }
    };

    let remediation_action = match entry.remediation_action.as_deref() {
        None => RemediationAction::default(),
        Some(raw) => match RemediationAction::parse(raw) {
            Some(a) => a,
            None => {
                errors.push(format!(
                    "tags.{key}.remediation_action = '{raw}' is not one of stop, reset, restart, gather_metrics"
                ));
                RemediationAction::default()
            }
        },
    };

    let device_name = entry.name.clone().unwrap_or_else(|| key.to_string());
    if device_name.trim().is_empty() {
        errors.push(format!("tags.{key}.name must not be empty"));
    }

    match (nominal, condition) {
        (Some(nominal), Some(condition)) if errors.is_empty() => Ok(TagConfig {
            key: key.to_string(),
            device_name,
            value_type: ty,
            nominal,
            condition,
            remediation_action,
        }),
        _ => Err(errors),
    }
}

fn build_automation(
    file: &AutomationConfig,
    tags: &[TagConfig],
    errors: &mut Vec<String>,
) -> AutomationSettings {
    let mut job_templates = BTreeMap::new();
    for (raw, id) in &file.job_templates {
        match RemediationAction::from_template_key(raw) {
            Some(action) => {
                job_templates.insert(action, *id);
            }
            None => errors.push(format!(
                "automation.job_templates.{raw} does not name a remediation action"
            )),
        }
    }

    let mut missing: Vec<RemediationAction> = tags
        .iter()
        .map(|t| t.remediation_action)
        .filter(|a| !job_templates.contains_key(a))
        .collect();
    missing.sort();
    missing.dedup();
    for action in missing {
        errors.push(format!(
            "automation.job_templates has no template for action '{action}' used by a tag"
        ));
    }

    if file.mode == AutomationMode::Aap {
        if file.base_url.trim().is_empty() {
            errors.push("automation.base_url is required when mode = \"aap\"".to_string());
        } else if !(file.base_url.starts_with("http://") || file.base_url.starts_with("https://")) {
            errors.push(format!(
                "automation.base_url = '{}' must start with http:// or https://",
                file.base_url
            ));
        }
    }
    if file.status_poll_interval_ms == 0 {
        errors.push("automation.status_poll_interval_ms must be > 0".to_string());
    }
    if file.job_timeout_secs == 0 {
        errors.push("automation.job_timeout_secs must be > 0".to_string());
    }
    if file.request_timeout_secs == 0 {
        errors.push("automation.request_timeout_secs must be > 0".to_string());
    }
    if !(0.0..=1.0).contains(&file.simulated_failure_rate) {
        errors.push(format!(
            "automation.simulated_failure_rate = {} must be in [0, 1]",
            file.simulated_failure_rate
        ));
    }

    AutomationSettings {
        mode: file.mode,
        base_url: file.base_url.trim_end_matches('/').to_string(),
        token: file.token.clone(),
        verify_ssl: file.verify_ssl,
        request_timeout: Duration::from_secs(file.request_timeout_secs),
        status_poll_interval: Duration::from_millis(file.status_poll_interval_ms),
        job_timeout: Duration::from_secs(file.job_timeout_secs),
        simulated_job_duration: Duration::from_millis(file.simulated_job_duration_ms),
        simulated_failure_rate: file.simulated_failure_rate,
        job_templates,
    }
}

fn build_chaos(file: &ChaosConfig, errors: &mut Vec<String>) -> ChaosSettings {
    // NaN fails the range check too
    if !(0.0..=1.0).contains(&file.injection_rate) {
        errors.push(format!(
            "chaos.injection_rate = {} must be in [0, 1]",
            file.injection_rate
        ));
    }

    let mut failure_types = Vec::new();
    for raw in &file.failure_types {
        match FailureType::parse(raw) {
            Some(t) if failure_types.contains(&t) => {
                errors.push(format!("chaos.failure_types lists '{raw}' more than once"));
            }
            Some(t) => failure_types.push(t),
            None => errors.push(format!(
                "chaos.failure_types: '{raw}' is not one of value_anomaly, network_timeout, connection_loss, service_crash"
            )),
        }
    }
    if file.enabled && file.failure_types.is_empty() {
        errors.push("chaos.failure_types must not be empty when chaos is enabled".to_string());
    }

    let failure_weights = if file.failure_weights.is_empty() {
        None
    } else {
        for (raw, w) in &file.failure_weights {
            match FailureType::parse(raw) {
                Some(t) if failure_types.contains(&t) => {}
                _ => errors.push(format!(
                    "chaos.failure_weights.{raw} does not match an entry in chaos.failure_types"
                )),
            }
            if !w.is_finite() || *w < 0.0 {
                errors.push(format!("chaos.failure_weights.{raw} = {w} must be finite and >= 0"));
            }
        }
        let weights: Vec<f64> = failure_types
            .iter()
            .map(|t| file.failure_weights.get(t.as_str()).copied().unwrap_or(0.0))
            .collect();
        if weights.iter().all(|w| *w <= 0.0) {
            errors.push("chaos.failure_weights must not all be zero".to_string());
        }
        Some(weights)
    };

    if file.network_timeout_ms == 0 {
        errors.push("chaos.network_timeout_ms must be > 0".to_string());
    }
    if file.connection_loss_seconds == 0 {
        errors.push("chaos.connection_loss_seconds must be > 0".to_string());
    }

    ChaosSettings {
        enabled: file.enabled,
        injection_rate: file.injection_rate,
        failure_types,
        failure_weights,
        network_timeout: Duration::from_millis(file.network_timeout_ms),
        connection_loss: Duration::from_secs(file.connection_loss_seconds),
        startup_grace: Duration::from_secs(file.startup_grace_seconds),
        rearm: Duration::from_secs(file.rearm_seconds),
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    /// No config file at any searched location.
    NotFound(Vec<PathBuf>),
    Io(PathBuf, std::io::Error),
    Parse(Option<PathBuf>, toml::de::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(searched) => {
                write!(f, "No config file found (searched:")?;
                for p in searched {
                    write!(f, " {}", p.display())?;
                }
                write!(f, ")")
            }
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(Some(path), e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Parse(None, e) => write!(f, "Config parse error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Serde defaults
// ============================================================================

fn default_true() -> bool { true }
fn default_device_name() -> String { "plc".to_string() }
fn default_poll_interval_ms() -> u64 { defaults::POLL_INTERVAL_MS }
fn default_read_timeout_ms() -> u64 { defaults::READ_TIMEOUT_MS }
fn default_jitter() -> f64 { 0.01 }
fn default_cooldown_seconds() -> u64 { defaults::COOLDOWN_SECONDS }
fn default_max_retries() -> u32 { defaults::MAX_RETRIES }
fn default_request_timeout_secs() -> u64 { defaults::AUTOMATION_REQUEST_TIMEOUT_SECS }
fn default_status_poll_interval_ms() -> u64 { defaults::STATUS_POLL_INTERVAL_MS }
fn default_job_timeout_secs() -> u64 { defaults::JOB_TIMEOUT_SECS }
fn default_simulated_job_duration_ms() -> u64 { defaults::SIMULATED_JOB_DURATION_MS }
fn default_injection_rate() -> f64 { defaults::INJECTION_RATE }
fn default_failure_types() -> Vec<String> {
    FailureType::ALL.iter().map(|t| t.as_str().to_string()).collect()
}
fn default_network_timeout_ms() -> u64 { defaults::NETWORK_TIMEOUT_MS }
fn default_connection_loss_seconds() -> u64 { defaults::CONNECTION_LOSS_SECONDS }
fn default_startup_grace_seconds() -> u64 { defaults::CHAOS_STARTUP_GRACE_SECONDS }
fn default_rearm_seconds() -> u64 { defaults::CHAOS_REARM_SECONDS }
fn default_tag_history_size() -> usize { defaults::TAG_HISTORY_SIZE }
fn default_violation_history_size() -> usize { defaults::VIOLATION_HISTORY_SIZE }
fn default_event_capacity() -> usize { defaults::EVENT_CAPACITY }
fn default_subscriber_buffer() -> usize { defaults::SUBSCRIBER_BUFFER }
fn default_server_addr() -> String { defaults::SERVER_ADDR.to_string() }
