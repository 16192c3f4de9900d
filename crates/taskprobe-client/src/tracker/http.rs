use crate::cluster::JobTracker;
use crate::error::{ClientError, Result};
use crate::transport::HttpTransport;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use taskprobe_core::model::{
    JobId, JobSpec, JobStatusSnapshot, TaskAttemptId, TaskCompletionEvent, TaskId, TaskInfo,
};

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: JobId,
}

#[derive(Debug, Serialize)]
struct KillRequest {
    fail_job: bool,
}

/// Job tracker reached through its JSON status gateway.
#[derive(Clone)]
pub struct HttpJobTracker {
    transport: HttpTransport,
}

impl HttpJobTracker {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            transport: HttpTransport::new(base_url, timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }
}

impl JobTracker for HttpJobTracker {
    fn ping(&self) -> Result<()> {
        self.transport.get_json::<serde_json::Value>("/health")?;
        Ok(())
    }

    fn submit_job(&self, spec: &JobSpec) -> Result<JobId> {
        let (status, body) = self.transport.post_raw("/jobs", spec)?;
        match status {
            200..=299 => {
                let parsed: SubmitResponse =
                    serde_json::from_str(&body).map_err(|e| ClientError::Decode {
                        endpoint: self.transport.url("/jobs"),
                        reason: e.to_string(),
                    })?;
                tracing::debug!("Submitted '{}' as {}", spec.name, parsed.job_id);
                Ok(parsed.job_id)
            }
            400 | 422 => Err(ClientError::SubmissionRejected { reason: body }),
            _ => Err(ClientError::Status {
                endpoint: self.transport.url("/jobs"),
                status,
                body,
            }),
        }
    }

    fn job_status(&self, job_id: &JobId) -> Result<JobStatusSnapshot> {
        self.transport.get_json(&format!("/jobs/{}", job_id))
    }

    fn all_job_statuses(&self) -> Result<Vec<JobStatusSnapshot>> {
        self.transport.get_json("/jobs")
    }

    fn task_infos(&self, job_id: &JobId) -> Result<Vec<TaskInfo>> {
        self.transport.get_json(&format!("/jobs/{}/tasks", job_id))
    }

    fn task_info(&self, task_id: &TaskId) -> Result<TaskInfo> {
        self.transport.get_json(&format!("/tasks/{}", task_id))
    }

    fn task_completion_events(
        &self,
        job_id: &JobId,
        from_index: usize,
    ) -> Result<Vec<TaskCompletionEvent>> {
        self.transport.get_json_with_query(
            &format!("/jobs/{}/events", job_id),
            &[("from", from_index.to_string())],
        )
    }

    fn kill_task_attempt(&self, attempt_id: &TaskAttemptId, fail_job: bool) -> Result<()> {
        let target = attempt_id.to_string();
        let path = format!("/attempts/{}/kill", target);
        let (status, body) = self
            .transport
            .post_raw(&path, &KillRequest { fail_job })
            .map_err(|e| ClientError::ControlChannel {
                target: target.clone(),
                reason: e.to_string(),
            })?;

        match status {
            200..=299 => Ok(()),
            404 | 409 | 410 => Err(ClientError::ControlChannel {
                target,
                reason: format!("stale attempt reference (HTTP {}): {}", status, body),
            }),
            _ => Err(ClientError::ControlChannel {
                target,
                reason: format!("HTTP {}: {}", status, body),
            }),
        }
    }
}
