//! Session bookkeeping nodes: named bookmarks for job token pairs, and a
//! bounded status poll against the backend.

use chrono::Utc;
use tracing::{error, warn};
use trellis_client::store::SessionStore;
use trellis_client::{Config, Job, TrellisClient};

use crate::runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Create,
    Load,
    Save,
}

/// Creates, loads, or saves a named `(session_id, task_id)` bookmark.
pub struct SessionNode {
    store: SessionStore,
}

impl SessionNode {
    pub fn new(config: &Config) -> Self {
        Self {
            store: SessionStore::new(config.storage.session_dir.clone()),
        }
    }

    /// Returns `(session_id, task_id)`, empty strings on failure.
    pub fn manage(
        &self,
        action: SessionAction,
        name: &str,
        session_id: &str,
        task_id: &str,
    ) -> (String, String) {
        match action {
            SessionAction::Create => {
                let job = Job {
                    session_id: non_empty_or(session_id, || {
                        format!("session_{}_{name}", Utc::now().timestamp())
                    }),
                    task_id: non_empty_or(task_id, || format!("task_{}", Utc::now().timestamp())),
                };
                if let Err(err) = self.store.save(name, &job) {
                    error!("could not save session '{name}': {err}");
                    return (String::new(), String::new());
                }
                (job.session_id, job.task_id)
            }
            SessionAction::Load => match self.store.load(name) {
                Some(job) => (job.session_id, job.task_id),
                None => {
                    warn!("session '{name}' not found, creating a new one");
                    self.manage(SessionAction::Create, name, "", "")
                }
            },
            SessionAction::Save => {
                if session_id.is_empty() || task_id.is_empty() {
                    error!("cannot save session '{name}': session_id and task_id required");
                    return (String::new(), String::new());
                }
                let job = Job {
                    session_id: session_id.to_string(),
                    task_id: task_id.to_string(),
                };
                if let Err(err) = self.store.save(name, &job) {
                    error!("could not save session '{name}': {err}");
                    return (String::new(), String::new());
                }
                (job.session_id, job.task_id)
            }
        }
    }
}

fn non_empty_or(value: &str, fallback: impl FnOnce() -> String) -> String {
    if value.is_empty() {
        fallback()
    } else {
        value.to_string()
    }
}

/// Polls the backend for a job's status a bounded number of times.
pub struct StatusNode {
    config: Config,
    attempts: u32,
}

impl StatusNode {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            attempts: 5,
        }
    }

    /// Returns a human-readable status line; never propagates.
    pub fn poll(&self, session_id: &str, task_id: &str, poll_interval_secs: f64) -> String {
        if session_id.is_empty() || task_id.is_empty() {
            return "Error: session_id and task_id are required".to_string();
        }
        let job = Job {
            session_id: session_id.to_string(),
            task_id: task_id.to_string(),
        };
        match runtime::block_on(self.poll_async(&job, poll_interval_secs)) {
            Ok(Ok(status)) => format!("Status: {status}"),
            Ok(Err(err)) => {
                error!("status poll failed: {err}");
                format!("Error: {err}")
            }
            Err(err) => format!("Error: {err}"),
        }
    }

    async fn poll_async(
        &self,
        job: &Job,
        poll_interval_secs: f64,
    ) -> trellis_client::Result<String> {
        let mut client = TrellisClient::from_config(&self.config);
        let interval = std::time::Duration::from_secs_f64(poll_interval_secs.clamp(0.5, 10.0));
        let mut status = "unknown".to_string();
        for _ in 0..self.attempts {
            let reply = client.check_status(job).await?;
            status = reply.status.clone();
            if matches!(status.as_str(), "complete" | "failed" | "error") {
                break;
            }
            tokio::time::sleep(interval).await;
        }
        client.disconnect().await;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.session_dir = dir.join("sessions");
        config
    }

    #[test]
    fn create_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let node = SessionNode::new(&config_in(dir.path()));
        let (session_id, task_id) = node.manage(SessionAction::Create, "chair", "", "");
        assert!(session_id.starts_with("session_"));
        assert!(task_id.starts_with("task_"));

        let (loaded_session, loaded_task) = node.manage(SessionAction::Load, "chair", "", "");
        assert_eq!(loaded_session, session_id);
        assert_eq!(loaded_task, task_id);
    }

    #[test]
    fn load_of_missing_session_creates_one() {
        let dir = tempfile::tempdir().unwrap();
        let node = SessionNode::new(&config_in(dir.path()));
        let (session_id, _) = node.manage(SessionAction::Load, "fresh", "", "");
        assert!(!session_id.is_empty());
    }

    #[test]
    fn save_requires_both_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let node = SessionNode::new(&config_in(dir.path()));
        assert_eq!(
            node.manage(SessionAction::Save, "x", "sess", ""),
            (String::new(), String::new())
        );
        assert_eq!(
            node.manage(SessionAction::Save, "x", "sess", "task"),
            ("sess".to_string(), "task".to_string())
        );
    }
}
