//! # Release Events
//!
//! Events broadcast to the admin console while releases move through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::{Actor, ReleaseStatus};

/// Kind of release event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseEventKind {
    /// Customer placed an order
    Submitted,
    /// Status changed
    StatusChanged,
    DraftStarted,
    DraftCompleted,
    DraftFailed,
    PanelStarted,
    PanelCompleted,
    PanelFailed,
    /// An editor or the client produced a new draft revision
    RevisionSaved,
    /// Distribution entries were queued after publishing
    DistributionQueued,
}

/// An event in the release pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ReleaseEventKind,
    pub release_id: String,
    #[serde(default)]
    pub status: Option<ReleaseStatus>,
    #[serde(default)]
    pub actor: Option<Actor>,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ReleaseEvent {
    pub fn new(kind: ReleaseEventKind, release_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            release_id: release_id.to_string(),
            status: None,
            actor: None,
            data: None,
        }
    }

    pub fn with_status(mut self, status: ReleaseStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = ReleaseEvent::new(ReleaseEventKind::StatusChanged, "rel-1")
            .with_status(ReleaseStatus::Drafting)
            .with_actor(Actor::Admin);

        assert_eq!(event.release_id, "rel-1");
        assert_eq!(event.status, Some(ReleaseStatus::Drafting));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "status_changed");
        assert_eq!(json["actor"], "admin");
    }
}
