//! In-process simulated automation platform
//!
//! Jobs move `pending -> running -> succeeded|failed` on a fixed schedule
//! measured from launch. Uses tokio's clock so paused-time tests can drive it.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::{AutomationClient, AutomationError, JobId, JobStatus};

/// First job id handed out; keeps simulated ids visually distinct from
/// template ids in logs.
const FIRST_JOB_ID: u64 = 1000;

#[derive(Debug)]
struct SimJob {
    template_id: u64,
    launched: Instant,
    fails: bool,
}

struct SimState {
    next_id: u64,
    jobs: HashMap<JobId, SimJob>,
    rng: StdRng,
}

pub struct SimulatedAutomation {
    job_duration: Duration,
    failure_rate: f64,
    state: Mutex<SimState>,
}

impl SimulatedAutomation {
    pub fn new(job_duration: Duration, failure_rate: f64) -> Self {
        Self {
            job_duration,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            state: Mutex::new(SimState {
                next_id: FIRST_JOB_ID,
                jobs: HashMap::new(),
                rng: StdRng::from_entropy(),
            }),
        }
    }

    /// Number of jobs launched so far.
    pub fn launch_count(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).jobs.len()
    }

    /// Template id a job was launched from.
    pub fn template_of(&self, job: JobId) -> Option<u64> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .jobs
            .get(&job)
            .map(|j| j.template_id)
    }
}

#[async_trait]
impl AutomationClient for SimulatedAutomation {
    async fn launch_job(
        &self,
        template_id: u64,
        variables: serde_json::Value,
    ) -> Result<JobId, AutomationError> {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let id = JobId(st.next_id);
        st.next_id += 1;
        let fails = self.failure_rate > 0.0 && st.rng.gen_bool(self.failure_rate);
        st.jobs.insert(
            id,
            SimJob {
                template_id,
                launched: Instant::now(),
                fails,
            },
        );
        tracing::info!(template_id, job_id = %id, %variables, "Simulated job launched");
        Ok(id)
    }

    async fn get_status(&self, job: JobId) -> Result<JobStatus, AutomationError> {
        let st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sim) = st.jobs.get(&job) else {
            return Err(AutomationError::Rejected {
                status: 404,
                message: format!("job {job} not found"),
            });
        };
        let elapsed = sim.launched.elapsed();
        Ok(if elapsed < self.job_duration / 3 {
            JobStatus::Pending
        } else if elapsed < self.job_duration {
            JobStatus::Running
        } else if sim.fails {
            JobStatus::Failed
        } else {
            JobStatus::Succeeded
        })
    }

    fn backend_name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn job_progresses_to_success() {
        let sim = SimulatedAutomation::new(Duration::from_secs(3), 0.0);
        let job = sim.launch_job(7, serde_json::json!({"action": "reset"})).await.unwrap();
        assert_eq!(job, JobId(FIRST_JOB_ID));
        assert_eq!(sim.get_status(job).await.unwrap(), JobStatus::Pending);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(sim.get_status(job).await.unwrap(), JobStatus::Running);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(sim.get_status(job).await.unwrap(), JobStatus::Succeeded);
        assert_eq!(sim.template_of(job), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_rate_one_always_fails() {
        let sim = SimulatedAutomation::new(Duration::from_millis(10), 1.0);
        let job = sim.launch_job(1, serde_json::json!({})).await.unwrap();
        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(sim.get_status(job).await.unwrap(), JobStatus::Failed);
    }

    #[tokio::test]
    async fn unknown_job_is_rejected() {
        let sim = SimulatedAutomation::new(Duration::from_secs(1), 0.0);
        assert!(sim.get_status(JobId(1)).await.is_err());
    }
}
