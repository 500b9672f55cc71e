//! Release lifecycle: the status machine, pipeline events and the LLM orchestration.

pub mod events;
pub mod orchestrator;
pub mod status;

pub use events::{ReleaseEvent, ReleaseEventKind};
pub use orchestrator::{DraftOutcome, PanelOutcome, ReleasePipeline};
pub use status::{transition, Actor, ReleaseAction, ReleaseStatus, StatusInfo};
