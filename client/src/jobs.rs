//! Per-job view of the generation queue built from the event stream.

use std::collections::BTreeMap;

use genwave_engine::{JobId, Message};
use serde::Serialize;
use serde_json::Value;

/// Where a generation job stands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Queued {
        position: u32,
        eta: f64,
    },
    Running {
        progress: f64,
        stage: String,
        eta: f64,
    },
    Completed {
        audio_url: String,
        metadata: Value,
    },
    Failed {
        error: String,
        retry_available: bool,
    },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed { .. } | JobState::Failed { .. })
    }

    /// Completion percentage for progress bars.
    pub fn progress(&self) -> f64 {
        match self {
            JobState::Queued { .. } | JobState::Failed { .. } => 0.0,
            JobState::Running { progress, .. } => *progress,
            JobState::Completed { .. } => 100.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::Queued { .. } => "queued",
            JobState::Running { .. } => "generating",
            JobState::Completed { .. } => "completed",
            JobState::Failed { .. } => "failed",
        }
    }
}

/// The most recent queue-wide position report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub position: u32,
    pub total: u32,
    pub eta: f64,
}

/// Folds generation events into per-job state.
///
/// Terminal states are sticky: once a job completes or fails, later events
/// for the same id are ignored.
#[derive(Debug, Default, Clone)]
pub struct JobTracker {
    jobs: BTreeMap<JobId, JobState>,
    queue: Option<QueueSnapshot>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns whether a job entry changed; queue updates
    /// without an id report the snapshot refresh instead.
    pub fn apply(&mut self, message: &Message) -> bool {
        if let Message::QueueUpdated {
            position,
            total_queue_size,
            eta,
            ..
        } = message
        {
            self.queue = Some(QueueSnapshot {
                position: *position,
                total: *total_queue_size,
                eta: *eta,
            });
        }

        let Some(id) = message.job_id() else {
            return matches!(message, Message::QueueUpdated { .. });
        };

        if self.jobs.get(id).is_some_and(JobState::is_terminal) {
            tracing::debug!(job = %id, kind = %message.kind(), "Ignoring event for finished job");
            return false;
        }

        let next = match message {
            Message::GenerationStarted {
                position_in_queue,
                eta,
                ..
            } => JobState::Queued {
                position: *position_in_queue,
                eta: *eta,
            },
            Message::GenerationProgress {
                progress,
                stage,
                eta,
                ..
            } => JobState::Running {
                progress: *progress,
                stage: stage.clone(),
                eta: *eta,
            },
            Message::GenerationCompleted {
                audio_url,
                metadata,
                ..
            } => JobState::Completed {
                audio_url: audio_url.clone(),
                metadata: metadata.clone(),
            },
            Message::GenerationFailed {
                error,
                retry_available,
                ..
            } => JobState::Failed {
                error: error.clone(),
                retry_available: *retry_available,
            },
            Message::QueueUpdated { position, eta, .. } => match self.jobs.get(id) {
                Some(JobState::Running { .. }) => return false,
                _ => JobState::Queued {
                    position: *position,
                    eta: *eta,
                },
            },
        };

        self.jobs.insert(id.clone(), next);
        true
    }

    pub fn get(&self, id: &JobId) -> Option<&JobState> {
        self.jobs.get(id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = (&JobId, &JobState)> {
        self.jobs.iter()
    }

    pub fn queue(&self) -> Option<QueueSnapshot> {
        self.queue
    }

    /// Number of jobs still waiting or generating.
    pub fn active(&self) -> usize {
        self.jobs.values().filter(|state| !state.is_terminal()).count()
    }

    pub fn remove(&mut self, id: &JobId) -> Option<JobState> {
        self.jobs.remove(id)
    }

    /// Forget completed and failed jobs. Returns how many were removed.
    pub fn clear_finished(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, state| !state.is_terminal());
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
