//! Finite state machine for a deployment job's phases

use serde::{Deserialize, Serialize};

/// Deployment phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPhase {
    Initialized,
    Extracting,
    Classifying,
    Building,
    Uploading,
    Completed,
    Failed,
}

impl JobPhase {
    /// Status label shown to clients
    pub fn label(&self) -> &'static str {
        match self {
            JobPhase::Initialized => "Initialized",
            JobPhase::Extracting => "Extracting",
            JobPhase::Classifying => "Classifying",
            JobPhase::Building => "Building",
            JobPhase::Uploading => "Uploading",
            JobPhase::Completed => "Completed Successfully",
            JobPhase::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Failed)
    }
}

/// Phase event
#[derive(Debug, Clone)]
pub enum PhaseEvent {
    /// Source extraction or clone started
    Extract,

    /// Project location and classification started
    Classify,

    /// Install and build started
    Build,

    /// Upload started
    Upload,

    /// Every file is published
    Succeed,

    /// Any stage failed
    Fail(String),
}

/// Deployment phase FSM. Phases only move forward; `Building` may be skipped.
#[derive(Debug, Clone)]
pub struct JobFsm {
    phase: JobPhase,
    error: Option<String>,
}

impl JobFsm {
    /// Create a new FSM in the initialized phase
    pub fn new() -> Self {
        Self {
            phase: JobPhase::Initialized,
            error: None,
        }
    }

    /// Get current phase
    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition phase
    pub fn process(&mut self, event: PhaseEvent) -> Result<JobPhase, String> {
        let next = match (self.phase, &event) {
            (JobPhase::Initialized, PhaseEvent::Extract) => JobPhase::Extracting,
            (JobPhase::Extracting, PhaseEvent::Classify) => JobPhase::Classifying,
            (JobPhase::Classifying, PhaseEvent::Build) => JobPhase::Building,
            (JobPhase::Classifying, PhaseEvent::Upload) => JobPhase::Uploading,
            (JobPhase::Building, PhaseEvent::Upload) => JobPhase::Uploading,
            (JobPhase::Uploading, PhaseEvent::Succeed) => JobPhase::Completed,

            (phase, PhaseEvent::Fail(err)) if !phase.is_terminal() => {
                self.error = Some(err.clone());
                JobPhase::Failed
            }

            // Invalid transitions
            (phase, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", phase, event));
            }
        };

        self.phase = next;
        Ok(next)
    }
}

impl Default for JobFsm {
    fn default() -> Self {
        Self::new()
    }
}
