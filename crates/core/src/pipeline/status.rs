//! # Release Status
//!
//! The release request lifecycle as a lookup table. Each status carries the
//! label and badge color dashboards render, and the actions a human may take
//! from it. [`transition`] is the only way a status changes.
//!
//! ```text
//! submitted → drafting → draft_generated → panel_reviewing → panel_reviewed
//!                 ↑            │                                   │
//!                 └── changes_requested ← awaiting_client ← in_revision
//!                                              │
//!                              client_approved → scheduled → published
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ReleaseError, ReleaseResult};

/// Status of a release request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    /// Order placed, nothing generated yet
    Submitted,
    /// LLM draft in flight
    Drafting,
    DraftGenerated,
    /// Journalist panel critique in flight
    PanelReviewing,
    PanelReviewed,
    /// An editor is reworking the draft
    InRevision,
    AwaitingClient,
    ChangesRequested,
    ClientApproved,
    Scheduled,
    Published,
    OnHold,
    Cancelled,
}

/// Something that moves a release between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseAction {
    GenerateDraft,
    DraftReady,
    DraftFailed,
    RunPanel,
    PanelReady,
    PanelFailed,
    Revise,
    SendToClient,
    ClientApprove,
    RequestChanges,
    Schedule,
    Unschedule,
    Publish,
    Hold,
    Resume,
    Cancel,
}

/// Who is asking for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Customer,
    Admin,
    /// The pipeline itself, reporting the outcome of an LLM step
    System,
}

/// One row of the lifecycle table
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub status: ReleaseStatus,
    pub label: &'static str,
    /// Badge color name understood by the dashboards
    pub color: &'static str,
    pub description: &'static str,
    pub next_actions: Vec<ReleaseAction>,
    pub terminal: bool,
}

const ALL_STATUSES: [ReleaseStatus; 13] = [
    ReleaseStatus::Submitted,
    ReleaseStatus::Drafting,
    ReleaseStatus::DraftGenerated,
    ReleaseStatus::PanelReviewing,
    ReleaseStatus::PanelReviewed,
    ReleaseStatus::InRevision,
    ReleaseStatus::AwaitingClient,
    ReleaseStatus::ChangesRequested,
    ReleaseStatus::ClientApproved,
    ReleaseStatus::Scheduled,
    ReleaseStatus::Published,
    ReleaseStatus::OnHold,
    ReleaseStatus::Cancelled,
];

impl ReleaseStatus {
    /// Every status in lifecycle order
    pub fn all() -> &'static [ReleaseStatus] {
        &ALL_STATUSES
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Drafting => "drafting",
            Self::DraftGenerated => "draft_generated",
            Self::PanelReviewing => "panel_reviewing",
            Self::PanelReviewed => "panel_reviewed",
            Self::InRevision => "in_revision",
            Self::AwaitingClient => "awaiting_client",
            Self::ChangesRequested => "changes_requested",
            Self::ClientApproved => "client_approved",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::OnHold => "on_hold",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::Drafting => "Drafting",
            Self::DraftGenerated => "Draft Ready",
            Self::PanelReviewing => "Panel Reviewing",
            Self::PanelReviewed => "Panel Reviewed",
            Self::InRevision => "In Revision",
            Self::AwaitingClient => "Awaiting Client",
            Self::ChangesRequested => "Changes Requested",
            Self::ClientApproved => "Client Approved",
            Self::Scheduled => "Scheduled",
            Self::Published => "Published",
            Self::OnHold => "On Hold",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Submitted => "gray",
            Self::Drafting | Self::PanelReviewing => "blue",
            Self::DraftGenerated | Self::PanelReviewed => "indigo",
            Self::InRevision => "purple",
            Self::AwaitingClient => "amber",
            Self::ChangesRequested => "orange",
            Self::ClientApproved => "teal",
            Self::Scheduled => "cyan",
            Self::Published => "green",
            Self::OnHold => "yellow",
            Self::Cancelled => "red",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Submitted => "Order received and waiting for a first draft.",
            Self::Drafting => "The AI writer is producing a draft.",
            Self::DraftGenerated => "A draft exists and is ready for the journalist panel.",
            Self::PanelReviewing => "The simulated journalist panel is critiquing the draft.",
            Self::PanelReviewed => "Panel feedback is in; an editor decides what to change.",
            Self::InRevision => "An editor is revising the draft.",
            Self::AwaitingClient => "The client has been asked to review the release.",
            Self::ChangesRequested => "The client asked for changes.",
            Self::ClientApproved => "The client approved the final copy.",
            Self::Scheduled => "Distribution is scheduled.",
            Self::Published => "Distributed to the journalist list.",
            Self::OnHold => "Paused by the editorial team.",
            Self::Cancelled => "The order was cancelled.",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published | Self::Cancelled)
    }

    /// Whether an LLM step owns the release right now. Only an admin cancel
    /// may interrupt it.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Drafting | Self::PanelReviewing)
    }

    /// Actions a person may trigger from this status
    pub fn next_actions(&self) -> Vec<ReleaseAction> {
        use ReleaseAction::*;
        match self {
            Self::Submitted => vec![GenerateDraft, Hold, Cancel],
            Self::Drafting | Self::PanelReviewing => vec![Cancel],
            Self::DraftGenerated => vec![RunPanel, GenerateDraft, Revise, Hold, Cancel],
            Self::PanelReviewed => vec![Revise, SendToClient, RunPanel, Hold, Cancel],
            Self::InRevision => vec![SendToClient, RunPanel, Hold, Cancel],
            Self::AwaitingClient => vec![ClientApprove, RequestChanges, Cancel],
            Self::ChangesRequested => vec![Revise, GenerateDraft, Hold, Cancel],
            Self::ClientApproved => vec![Schedule, Publish, Hold],
            Self::Scheduled => vec![Publish, Unschedule],
            Self::OnHold => vec![Resume, Cancel],
            Self::Published | Self::Cancelled => vec![],
        }
    }

    pub fn info(&self) -> StatusInfo {
        StatusInfo {
            status: *self,
            label: self.label(),
            color: self.color(),
            description: self.description(),
            next_actions: self.next_actions(),
            terminal: self.is_terminal(),
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseStatus {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_STATUSES
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ReleaseError::Validation(format!("unknown release status '{}'", s)))
    }
}

const ALL_ACTIONS: [ReleaseAction; 16] = [
    ReleaseAction::GenerateDraft,
    ReleaseAction::DraftReady,
    ReleaseAction::DraftFailed,
    ReleaseAction::RunPanel,
    ReleaseAction::PanelReady,
    ReleaseAction::PanelFailed,
    ReleaseAction::Revise,
    ReleaseAction::SendToClient,
    ReleaseAction::ClientApprove,
    ReleaseAction::RequestChanges,
    ReleaseAction::Schedule,
    ReleaseAction::Unschedule,
    ReleaseAction::Publish,
    ReleaseAction::Hold,
    ReleaseAction::Resume,
    ReleaseAction::Cancel,
];

impl ReleaseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateDraft => "generate_draft",
            Self::DraftReady => "draft_ready",
            Self::DraftFailed => "draft_failed",
            Self::RunPanel => "run_panel",
            Self::PanelReady => "panel_ready",
            Self::PanelFailed => "panel_failed",
            Self::Revise => "revise",
            Self::SendToClient => "send_to_client",
            Self::ClientApprove => "client_approve",
            Self::RequestChanges => "request_changes",
            Self::Schedule => "schedule",
            Self::Unschedule => "unschedule",
            Self::Publish => "publish",
            Self::Hold => "hold",
            Self::Resume => "resume",
            Self::Cancel => "cancel",
        }
    }

    /// Outcome reports from the pipeline; people never send these
    pub fn is_system_only(&self) -> bool {
        matches!(
            self,
            Self::DraftReady | Self::DraftFailed | Self::PanelReady | Self::PanelFailed
        )
    }

    fn permits(&self, actor: Actor, from: ReleaseStatus) -> bool {
        match (self, actor) {
            (_, Actor::System) => self.is_system_only(),
            (action, _) if action.is_system_only() => false,
            (Self::ClientApprove | Self::RequestChanges, _) => true,
            (Self::Cancel, Actor::Customer) => from == ReleaseStatus::Submitted,
            (_, Actor::Customer) => false,
            (_, Actor::Admin) => true,
        }
    }
}

impl fmt::Display for ReleaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseAction {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_ACTIONS
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ReleaseError::Validation(format!("unknown release action '{}'", s)))
    }
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Actor {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            "system" => Ok(Self::System),
            other => Err(ReleaseError::Validation(format!("unknown actor '{}'", other))),
        }
    }
}

/// Resolve the status an action leads to.
///
/// `held_from` is the status recorded when the release was put on hold; it is
/// the target of `resume`.
pub fn transition(
    from: ReleaseStatus,
    action: ReleaseAction,
    actor: Actor,
    held_from: Option<ReleaseStatus>,
) -> ReleaseResult<ReleaseStatus> {
    use ReleaseAction as A;
    use ReleaseStatus as S;

    let invalid = || ReleaseError::InvalidTransition { from, action };

    let to = match (from, action) {
        (S::Submitted, A::GenerateDraft) => S::Drafting,

        (S::Drafting, A::DraftReady) => S::DraftGenerated,
        (S::Drafting, A::DraftFailed) => S::Submitted,

        (S::DraftGenerated, A::RunPanel) => S::PanelReviewing,
        (S::DraftGenerated, A::GenerateDraft) => S::Drafting,
        (S::DraftGenerated, A::Revise) => S::InRevision,

        (S::PanelReviewing, A::PanelReady) => S::PanelReviewed,
        (S::PanelReviewing, A::PanelFailed) => S::DraftGenerated,

        (S::PanelReviewed, A::Revise) => S::InRevision,
        (S::PanelReviewed, A::SendToClient) => S::AwaitingClient,
        (S::PanelReviewed, A::RunPanel) => S::PanelReviewing,

        (S::InRevision, A::SendToClient) => S::AwaitingClient,
        (S::InRevision, A::RunPanel) => S::PanelReviewing,

        (S::AwaitingClient, A::ClientApprove) => S::ClientApproved,
        (S::AwaitingClient, A::RequestChanges) => S::ChangesRequested,

        (S::ChangesRequested, A::Revise) => S::InRevision,
        (S::ChangesRequested, A::GenerateDraft) => S::Drafting,

        (S::ClientApproved, A::Schedule) => S::Scheduled,
        (S::ClientApproved, A::Publish) => S::Published,

        (S::Scheduled, A::Publish) => S::Published,
        (S::Scheduled, A::Unschedule) => S::ClientApproved,

        (S::OnHold, A::Resume) => match held_from {
            Some(previous) if previous != S::OnHold && !previous.is_terminal() => previous,
            _ => return Err(invalid()),
        },

        (status, A::Hold) if status.next_actions().contains(&A::Hold) => S::OnHold,
        (status, A::Cancel) if status.next_actions().contains(&A::Cancel) => S::Cancelled,

        _ => return Err(invalid()),
    };

    if !action.permits(actor, from) {
        return Err(ReleaseError::Forbidden {
            from,
            action,
            actor,
        });
    }

    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table_has_thirteen_rows() {
        assert_eq!(ReleaseStatus::all().len(), 13);
        for status in ReleaseStatus::all() {
            let info = status.info();
            assert!(!info.label.is_empty());
            assert!(!info.color.is_empty());
        }
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ReleaseStatus::AwaitingClient).unwrap();
        assert_eq!(json, "\"awaiting_client\"");
        for status in ReleaseStatus::all() {
            assert_eq!(status.as_str().parse::<ReleaseStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!("archived".parse::<ReleaseStatus>().is_err());
        assert!("publish_now".parse::<ReleaseAction>().is_err());
    }

    #[test]
    fn test_happy_path() {
        let steps = [
            (ReleaseAction::GenerateDraft, Actor::Admin, ReleaseStatus::Drafting),
            (ReleaseAction::DraftReady, Actor::System, ReleaseStatus::DraftGenerated),
            (ReleaseAction::RunPanel, Actor::Admin, ReleaseStatus::PanelReviewing),
            (ReleaseAction::PanelReady, Actor::System, ReleaseStatus::PanelReviewed),
            (ReleaseAction::SendToClient, Actor::Admin, ReleaseStatus::AwaitingClient),
            (ReleaseAction::ClientApprove, Actor::Customer, ReleaseStatus::ClientApproved),
            (ReleaseAction::Schedule, Actor::Admin, ReleaseStatus::Scheduled),
            (ReleaseAction::Publish, Actor::Admin, ReleaseStatus::Published),
        ];

        let mut status = ReleaseStatus::Submitted;
        for (action, actor, expected) in steps {
            status = transition(status, action, actor, None).unwrap();
            assert_eq!(status, expected);
        }
        assert!(status.is_terminal());
    }

    #[test]
    fn test_terminal_states_have_no_actions() {
        for status in ReleaseStatus::all().iter().filter(|s| s.is_terminal()) {
            assert!(status.next_actions().is_empty());
            assert!(transition(*status, ReleaseAction::Cancel, Actor::Admin, None).is_err());
        }
    }

    #[test]
    fn test_next_actions_are_all_valid_transitions() {
        for status in ReleaseStatus::all() {
            for action in status.next_actions() {
                let held = Some(ReleaseStatus::Submitted);
                assert!(
                    transition(*status, action, Actor::Admin, held).is_ok(),
                    "{} should accept {}",
                    status,
                    action
                );
            }
        }
    }

    #[test]
    fn test_every_live_status_can_finish() {
        // Walk the graph from each non-terminal status and require a terminal state be reachable.
        for start in ReleaseStatus::all().iter().filter(|s| !s.is_terminal()) {
            let mut seen = vec![*start];
            let mut frontier = vec![*start];
            let mut reached_terminal = false;
            while let Some(status) = frontier.pop() {
                let mut actions = status.next_actions();
                actions.extend([
                    ReleaseAction::DraftReady,
                    ReleaseAction::PanelReady,
                ]);
                for action in actions {
                    let actor = if action.is_system_only() {
                        Actor::System
                    } else {
                        Actor::Admin
                    };
                    if let Ok(next) =
                        transition(status, action, actor, Some(ReleaseStatus::Submitted))
                    {
                        reached_terminal |= next.is_terminal();
                        if !seen.contains(&next) {
                            seen.push(next);
                            frontier.push(next);
                        }
                    }
                }
            }
            assert!(reached_terminal, "{} cannot finish", start);
        }
    }

    #[test]
    fn test_people_can_finish_every_live_status() {
        // Same walk without the pipeline's outcome reports, so an abandoned
        // step is never a dead end.
        for start in ReleaseStatus::all().iter().filter(|s| !s.is_terminal()) {
            let mut seen = vec![*start];
            let mut frontier = vec![*start];
            let mut reached_terminal = false;
            while let Some(status) = frontier.pop() {
                for action in status.next_actions() {
                    if let Ok(next) =
                        transition(status, action, Actor::Admin, Some(ReleaseStatus::Submitted))
                    {
                        reached_terminal |= next.is_terminal();
                        if !seen.contains(&next) {
                            seen.push(next);
                            frontier.push(next);
                        }
                    }
                }
            }
            assert!(reached_terminal, "{} cannot finish without the pipeline", start);
        }
    }

    #[test]
    fn test_system_only_actions() {
        let err = transition(
            ReleaseStatus::Drafting,
            ReleaseAction::DraftReady,
            Actor::Admin,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ReleaseError::Forbidden { .. }));

        let err = transition(
            ReleaseStatus::Submitted,
            ReleaseAction::GenerateDraft,
            Actor::System,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ReleaseError::Forbidden { .. }));
    }

    #[test]
    fn test_customer_permissions() {
        assert_eq!(
            transition(
                ReleaseStatus::AwaitingClient,
                ReleaseAction::RequestChanges,
                Actor::Customer,
                None
            )
            .unwrap(),
            ReleaseStatus::ChangesRequested
        );
        assert_eq!(
            transition(
                ReleaseStatus::Submitted,
                ReleaseAction::Cancel,
                Actor::Customer,
                None
            )
            .unwrap(),
            ReleaseStatus::Cancelled
        );

        let err = transition(
            ReleaseStatus::AwaitingClient,
            ReleaseAction::Cancel,
            Actor::Customer,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ReleaseError::Forbidden { .. }));

        let err = transition(
            ReleaseStatus::ClientApproved,
            ReleaseAction::Publish,
            Actor::Customer,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ReleaseError::Forbidden { .. }));
    }

    #[test]
    fn test_hold_and_resume() {
        let held = transition(
            ReleaseStatus::PanelReviewed,
            ReleaseAction::Hold,
            Actor::Admin,
            None,
        )
        .unwrap();
        assert_eq!(held, ReleaseStatus::OnHold);

        let resumed = transition(
            held,
            ReleaseAction::Resume,
            Actor::Admin,
            Some(ReleaseStatus::PanelReviewed),
        )
        .unwrap();
        assert_eq!(resumed, ReleaseStatus::PanelReviewed);

        let err = transition(held, ReleaseAction::Resume, Actor::Admin, None).unwrap_err();
        assert!(matches!(err, ReleaseError::InvalidTransition { .. }));
    }

    #[test]
    fn test_cannot_hold_in_flight() {
        assert!(transition(
            ReleaseStatus::Drafting,
            ReleaseAction::Hold,
            Actor::Admin,
            None
        )
        .is_err());
        assert!(ReleaseStatus::PanelReviewing.is_in_flight());
        assert_eq!(
            transition(
                ReleaseStatus::PanelReviewing,
                ReleaseAction::Cancel,
                Actor::Admin,
                None
            )
            .unwrap(),
            ReleaseStatus::Cancelled
        );
        assert!(transition(
            ReleaseStatus::Drafting,
            ReleaseAction::Cancel,
            Actor::Customer,
            None
        )
        .is_err());
    }

    #[test]
    fn test_failures_roll_back() {
        assert_eq!(
            transition(
                ReleaseStatus::Drafting,
                ReleaseAction::DraftFailed,
                Actor::System,
                None
            )
            .unwrap(),
            ReleaseStatus::Submitted
        );
        assert_eq!(
            transition(
                ReleaseStatus::PanelReviewing,
                ReleaseAction::PanelFailed,
                Actor::System,
                None
            )
            .unwrap(),
            ReleaseStatus::DraftGenerated
        );
    }
}
