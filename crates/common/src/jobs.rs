//! Single-flight, poll-based job status tracking.
//!
//! A job is identified by `(kind, episode id)`. At most one job per key runs at
//! a time. Status moves `Idle -> Running -> {Done, Failed}`; the first
//! [`JobStatusRegistry::read_and_clear`] that observes a terminal state
//! consumes it and the key goes back to `Idle`, so a result is delivered to
//! exactly one poller.
//!
//! State lives in process memory only. A restart forgets every job.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{CastError, CastResult};

/// Long-running operations tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Render,
    Transcribe,
}

impl JobKind {
    /// Word a poller sees while a job of this kind is running.
    pub fn running_label(self) -> &'static str {
        match self {
            JobKind::Render => "building",
            JobKind::Transcribe => "transcribing",
        }
    }
}

/// Registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub kind: JobKind,
    pub episode_id: Uuid,
}

impl JobKey {
    pub fn new(kind: JobKind, episode_id: Uuid) -> Self {
        Self { kind, episode_id }
    }
}

/// Observable job state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Done,
    Failed { error: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed { .. })
    }

    /// Wire representation for a poll endpoint.
    pub fn report(&self, kind: JobKind) -> StatusReport {
        match self {
            JobStatus::Idle => StatusReport::new("idle", None),
            JobStatus::Running => StatusReport::new(kind.running_label(), None),
            JobStatus::Done => StatusReport::new("done", None),
            JobStatus::Failed { error } => StatusReport::new("failed", Some(error.clone())),
        }
    }
}

/// `{"status": "...", "error": "..."}` body returned to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    fn new(status: &str, error: Option<String>) -> Self {
        Self {
            status: status.to_string(),
            error,
        }
    }

    /// `done` or `failed`; the poller can stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "done" | "failed")
    }
}

/// Handed to the caller whose `try_start` was accepted.
#[derive(Debug, Clone)]
pub struct JobTicket {
    key: JobKey,
    generation: Uuid,
    cancel: CancellationToken,
}

impl JobTicket {
    pub fn key(&self) -> JobKey {
        self.key
    }

    /// Identifies this run of the key. Completions from an older run are
    /// ignored.
    pub fn generation(&self) -> Uuid {
        self.generation
    }

    /// Token that fires when the job is cancelled through the registry.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Result of [`JobStatusRegistry::try_start`].
#[derive(Debug)]
pub enum StartOutcome {
    Accepted(JobTicket),
    Conflict,
}

/// Keyed single-flight tracker. Implementations own their synchronization.
pub trait JobStatusRegistry: Send + Sync {
    /// Move the key to `Running` unless it already is.
    fn try_start(&self, key: JobKey) -> StartOutcome;

    /// `Running -> Done` for the run `ticket` was issued for. Ignored in any
    /// other state or when the key has since been restarted.
    fn complete(&self, ticket: &JobTicket);

    /// `Running -> Failed`, with the same ticket check as `complete`.
    fn fail(&self, ticket: &JobTicket, error: String);

    /// Current status; a terminal status is reset to `Idle` by this read.
    fn read_and_clear(&self, key: JobKey) -> JobStatus;

    /// Cancel a running job. Returns whether anything was running.
    fn cancel(&self, key: JobKey) -> bool;
}

#[derive(Debug, Default)]
struct Entry {
    status: JobStatus,
    generation: Option<Uuid>,
    cancel: Option<CancellationToken>,
}

/// Process-local [`JobStatusRegistry`].
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    entries: Mutex<HashMap<JobKey, Entry>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<JobKey, Entry>) -> R) -> R {
        // A poisoned lock only means another thread panicked mid-update; the
        // map itself is still usable.
        let mut guard = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn finish(&self, ticket: &JobTicket, terminal: JobStatus) {
        let key = ticket.key;
        self.with_entries(|entries| match entries.get_mut(&key) {
            Some(entry)
                if entry.status == JobStatus::Running
                    && entry.generation == Some(ticket.generation) =>
            {
                entry.status = terminal;
                entry.cancel = None;
            }
            _ => {
                tracing::debug!(?key, "Ignoring completion for a run that is no longer current");
            }
        });
    }
}

impl JobStatusRegistry for InMemoryJobRegistry {
    fn try_start(&self, key: JobKey) -> StartOutcome {
        self.with_entries(|entries| {
            let entry = entries.entry(key).or_default();
            if entry.status == JobStatus::Running {
                return StartOutcome::Conflict;
            }
            let cancel = CancellationToken::new();
            let generation = Uuid::new_v4();
            entry.status = JobStatus::Running;
            entry.generation = Some(generation);
            entry.cancel = Some(cancel.clone());
            StartOutcome::Accepted(JobTicket {
                key,
                generation,
                cancel,
            })
        })
    }

    fn complete(&self, ticket: &JobTicket) {
        self.finish(ticket, JobStatus::Done);
    }

    fn fail(&self, ticket: &JobTicket, error: String) {
        self.finish(ticket, JobStatus::Failed { error });
    }

    fn read_and_clear(&self, key: JobKey) -> JobStatus {
        self.with_entries(|entries| {
            let Some(entry) = entries.get_mut(&key) else {
                return JobStatus::Idle;
            };
            let status = entry.status.clone();
            if status.is_terminal() {
                entries.remove(&key);
            }
            status
        })
    }

    fn cancel(&self, key: JobKey) -> bool {
        let token = self.with_entries(|entries| match entries.get_mut(&key) {
            Some(entry) if entry.status == JobStatus::Running => {
                entry.status = JobStatus::Failed {
                    error: "cancelled".to_string(),
                };
                entry.cancel.take()
            }
            _ => None,
        });
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Run `work` as a detached task for an accepted job and record its outcome.
///
/// The work is raced against the ticket's cancellation token. A panic inside
/// the work is captured as a failure instead of leaving the key `Running`.
pub fn spawn_job<F>(
    registry: Arc<dyn JobStatusRegistry>,
    ticket: JobTicket,
    work: F,
) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = CastResult<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let key = ticket.key;
        let mut inner = tokio::spawn(work);
        let outcome = tokio::select! {
            _ = ticket.cancel.cancelled() => {
                inner.abort();
                // `cancel` already recorded the terminal status, and the key
                // may have been restarted since.
                tracing::info!(kind = ?key.kind, episode_id = %key.episode_id, "Job cancelled");
                return;
            }
            joined = &mut inner => match joined {
                Ok(result) => result,
                Err(e) => Err(CastError::processing(format!("job aborted: {e}"))),
            },
        };

        match outcome {
            Ok(()) => {
                tracing::info!(kind = ?key.kind, episode_id = %key.episode_id, "Job finished");
                registry.complete(&ticket);
            }
            Err(e) => {
                tracing::warn!(
                    kind = ?key.kind,
                    episode_id = %key.episode_id,
                    error = %e,
                    "Job failed"
                );
                registry.fail(&ticket, e.to_string());
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> JobKey {
        JobKey::new(JobKind::Render, Uuid::new_v4())
    }

    #[test]
    fn test_idle_key_accepts_then_conflicts() {
        let registry = InMemoryJobRegistry::new();
        let key = key();

        assert!(matches!(registry.try_start(key), StartOutcome::Accepted(_)));
        assert!(matches!(registry.try_start(key), StartOutcome::Conflict));
        assert_eq!(registry.read_and_clear(key), JobStatus::Running);
        assert_eq!(registry.read_and_clear(key), JobStatus::Running);
    }

    #[test]
    fn test_done_is_observed_exactly_once() {
        let registry = InMemoryJobRegistry::new();
        let key = key();

        let StartOutcome::Accepted(ticket) = registry.try_start(key) else {
            panic!("expected accepted");
        };
        registry.complete(&ticket);

        assert_eq!(registry.read_and_clear(key), JobStatus::Done);
        assert_eq!(registry.read_and_clear(key), JobStatus::Idle);
        assert_eq!(registry.read_and_clear(key), JobStatus::Idle);
    }

    #[test]
    fn test_failure_carries_message_and_allows_restart() {
        let registry = InMemoryJobRegistry::new();
        let key = key();

        let StartOutcome::Accepted(first) = registry.try_start(key) else {
            panic!("expected accepted");
        };
        registry.fail(&first, "ffmpeg exited with status 1".to_string());
        // A new job may start while the failure is still unread.
        let StartOutcome::Accepted(second) = registry.try_start(key) else {
            panic!("expected accepted");
        };
        registry.fail(&second, "second".to_string());

        assert_eq!(
            registry.read_and_clear(key),
            JobStatus::Failed {
                error: "second".to_string()
            }
        );
        assert_eq!(registry.read_and_clear(key), JobStatus::Idle);
    }

    #[test]
    fn test_keys_are_independent() {
        let registry = InMemoryJobRegistry::new();
        let episode = Uuid::new_v4();
        let render = JobKey::new(JobKind::Render, episode);
        let transcribe = JobKey::new(JobKind::Transcribe, episode);

        let _ = registry.try_start(render);
        assert!(matches!(
            registry.try_start(transcribe),
            StartOutcome::Accepted(_)
        ));
    }

    #[test]
    fn test_completion_from_stale_ticket_is_ignored() {
        let registry = InMemoryJobRegistry::new();
        let key = key();
        let StartOutcome::Accepted(first) = registry.try_start(key) else {
            panic!("expected accepted");
        };
        registry.complete(&first);
        assert_eq!(registry.read_and_clear(key), JobStatus::Done);

        // Nothing running: a late completion leaves the key idle.
        registry.complete(&first);
        assert_eq!(registry.read_and_clear(key), JobStatus::Idle);

        let StartOutcome::Accepted(second) = registry.try_start(key) else {
            panic!("expected accepted");
        };
        registry.fail(&first, "late".to_string());
        assert_eq!(registry.read_and_clear(key), JobStatus::Running);
        registry.complete(&second);
        assert_eq!(registry.read_and_clear(key), JobStatus::Done);
    }

    #[test]
    fn test_status_report_labels() {
        assert_eq!(
            JobStatus::Running.report(JobKind::Render).status,
            "building"
        );
        assert_eq!(
            JobStatus::Running.report(JobKind::Transcribe).status,
            "transcribing"
        );
        let failed = JobStatus::Failed {
            error: "boom".to_string(),
        }
        .report(JobKind::Render);
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert_eq!(
            serde_json::to_string(&JobStatus::Idle.report(JobKind::Render)).unwrap(),
            r#"{"status":"idle"}"#
        );
    }

    #[tokio::test]
    async fn test_spawned_job_records_success_and_failure() {
        let registry: Arc<dyn JobStatusRegistry> = Arc::new(InMemoryJobRegistry::new());

        let ok_key = key();
        let StartOutcome::Accepted(ticket) = registry.try_start(ok_key) else {
            panic!("expected accepted");
        };
        spawn_job(registry.clone(), ticket, async { Ok::<(), CastError>(()) })
            .await
            .unwrap();
        assert_eq!(registry.read_and_clear(ok_key), JobStatus::Done);

        let err_key = key();
        let StartOutcome::Accepted(ticket) = registry.try_start(err_key) else {
            panic!("expected accepted");
        };
        spawn_job(registry.clone(), ticket, async {
            Err::<(), _>(CastError::processing("no audio"))
        })
        .await
        .unwrap();
        assert!(matches!(
            registry.read_and_clear(err_key),
            JobStatus::Failed { error } if error.contains("no audio")
        ));
    }

    #[tokio::test]
    async fn test_cancel_stops_running_job() {
        let registry: Arc<dyn JobStatusRegistry> = Arc::new(InMemoryJobRegistry::new());
        let key = key();
        let StartOutcome::Accepted(ticket) = registry.try_start(key) else {
            panic!("expected accepted");
        };
        let handle = spawn_job(registry.clone(), ticket, async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok::<(), CastError>(())
        });

        assert!(registry.cancel(key));
        handle.await.unwrap();
        assert_eq!(
            registry.read_and_clear(key),
            JobStatus::Failed {
                error: "cancelled".to_string()
            }
        );
        assert!(!registry.cancel(key));
    }

    #[tokio::test]
    async fn test_cancelled_task_does_not_touch_restarted_job() {
        let registry: Arc<dyn JobStatusRegistry> = Arc::new(InMemoryJobRegistry::new());
        let key = key();
        let StartOutcome::Accepted(first) = registry.try_start(key) else {
            panic!("expected accepted");
        };
        let old = spawn_job(registry.clone(), first, async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok::<(), CastError>(())
        });

        assert!(registry.cancel(key));
        let StartOutcome::Accepted(second) = registry.try_start(key) else {
            panic!("restart after cancel should be accepted");
        };
        let current = spawn_job(registry.clone(), second, async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok::<(), CastError>(())
        });

        old.await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(registry.read_and_clear(key), JobStatus::Running);
        assert!(matches!(registry.try_start(key), StartOutcome::Conflict));

        assert!(registry.cancel(key));
        current.await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_job_is_marked_failed() {
        let registry: Arc<dyn JobStatusRegistry> = Arc::new(InMemoryJobRegistry::new());
        let key = key();
        let StartOutcome::Accepted(ticket) = registry.try_start(key) else {
            panic!("expected accepted");
        };
        spawn_job(registry.clone(), ticket, async move {
            if key.kind == JobKind::Render {
                panic!("boom");
            }
            Ok::<(), CastError>(())
        })
        .await
        .unwrap();
        assert!(matches!(
            registry.read_and_clear(key),
            JobStatus::Failed { .. }
        ));
    }
}
