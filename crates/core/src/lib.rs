//! # Pressroom Core
//!
//! The "Newsroom" of the Pressroom service - contains the release lifecycle,
//! prompt orchestration, response parsing, and state management.
//!
//! ## Architecture
//!
//! - `pipeline/` - Release status machine, events, and the LLM orchestration
//! - `prompts/` - Editable prompt configs and `{{variable}}` templating
//! - `parsing/` - Best-effort extraction of drafts, panel critiques, and recommendations
//! - `llm/` - Provider-agnostic completion client
//! - `models/` - Centralized LLM provider configuration
//! - `state/` - SQLite persistence for customers, releases, drafts, and subscribers
//! - `pricing` - Credit plans
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pressroom_core::pipeline::{Actor, ReleasePipeline};
//!
//! let pipeline = ReleasePipeline::new(db, llm);
//! let outcome = pipeline.generate_draft(&release_id, Actor::Admin).await?;
//! ```

pub mod error;
pub mod llm;
pub mod models;
pub mod parsing;
pub mod pipeline;
pub mod pricing;
pub mod prompts;
pub mod state;

pub use error::{ReleaseError, ReleaseResult};
