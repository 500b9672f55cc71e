//! # Release Pipeline
//!
//! Runs the LLM steps of a release: first draft, journalist panel plus
//! contrarian review, and feedback-driven revision. Each step renders its
//! prompt config from the database, calls the model, parses the reply
//! best-effort and stores both the parsed and the raw text.
//!
//! Any failure after a step has taken a release in flight moves it back with
//! the matching failure action. The `spawn_*` variants run the step on its own
//! task so a dropped HTTP request cannot leave the release in flight.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use super::events::{ReleaseEvent, ReleaseEventKind};
use super::status::{transition, Actor, ReleaseAction};
use crate::error::{ReleaseError, ReleaseResult};
use crate::llm::{CompletionRequest, LlmClient};
use crate::parsing::{parse_contrarian, parse_draft, parse_panel};
use crate::prompts::{self, PromptConfig, RenderedPrompt};
use crate::state::{
    ActionOptions, Draft, DraftManager, PanelReview, PressroomDb, ReleaseManager, ReleaseRequest,
    Transition,
};

/// Outcome of a draft or revision step
#[derive(Debug, Clone, Serialize)]
pub struct DraftOutcome {
    pub release: ReleaseRequest,
    pub draft: Draft,
}

/// Outcome of a panel step
#[derive(Debug, Clone, Serialize)]
pub struct PanelOutcome {
    pub release: ReleaseRequest,
    pub review: PanelReview,
}

/// Drives releases through the LLM-backed steps of the lifecycle
pub struct ReleasePipeline {
    db: Arc<PressroomDb>,
    llm: Arc<dyn LlmClient>,
    event_tx: Option<broadcast::Sender<ReleaseEvent>>,
}

impl ReleasePipeline {
    pub fn new(db: Arc<PressroomDb>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            db,
            llm,
            event_tx: None,
        }
    }

    /// Broadcast every event to subscribers (the admin event stream)
    pub fn with_event_channel(mut self, tx: broadcast::Sender<ReleaseEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn releases(&self) -> ReleaseManager {
        ReleaseManager::new(&self.db)
    }

    fn drafts(&self) -> DraftManager {
        DraftManager::new(&self.db)
    }

    /// Emit an event; having no listeners is fine
    pub fn emit(&self, event: ReleaseEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Apply a lifecycle action and announce the change
    pub fn apply_action(
        &self,
        release_id: &str,
        action: ReleaseAction,
        actor: Actor,
        options: ActionOptions,
    ) -> ReleaseResult<Transition> {
        let moved = self
            .releases()
            .apply_action(release_id, action, actor, options)?;

        self.emit(
            ReleaseEvent::new(ReleaseEventKind::StatusChanged, release_id)
                .with_status(moved.release.status)
                .with_actor(actor)
                .with_data(serde_json::json!({
                    "from": moved.from,
                    "action": action,
                    "version": moved.release.version,
                })),
        );
        if moved.distribution_queued > 0 {
            self.emit(
                ReleaseEvent::new(ReleaseEventKind::DistributionQueued, release_id)
                    .with_data(serde_json::json!({ "queued": moved.distribution_queued })),
            );
        }
        Ok(moved)
    }

    /// Prompt variables for a release: the order, its latest draft and panel summary
    pub fn release_vars(&self, release: &ReleaseRequest) -> ReleaseResult<HashMap<String, String>> {
        let mut vars = release.template_vars();
        let drafts = self.drafts();

        if let Some(draft) = drafts.latest(&release.id)? {
            let headline = release
                .selected_headline
                .clone()
                .unwrap_or_else(|| draft.headline.clone());
            vars.insert("headline".to_string(), headline);
            vars.insert("body".to_string(), draft.body);
            if let Some(sub) = draft.subheadline {
                vars.insert("subheadline".to_string(), sub);
            }
        }
        if let Some(review) = drafts.latest_panel(&release.id)? {
            let summary = review.critique.summary();
            if !summary.is_empty() {
                vars.insert("panel_summary".to_string(), summary);
            }
        }
        Ok(vars)
    }

    /// Render a prompt config against a release without calling the model
    pub fn preview(&self, slug: &str, release_id: &str) -> ReleaseResult<RenderedPrompt> {
        let release = self.releases().get(release_id)?;
        let config = self.load_prompt(slug)?;
        Ok(config.render(&self.release_vars(&release)?))
    }

    fn load_prompt(&self, slug: &str) -> ReleaseResult<PromptConfig> {
        Ok(self.db.prompt_or_default(slug)?)
    }

    fn request(&self, config: &PromptConfig, vars: &HashMap<String, String>) -> CompletionRequest {
        let rendered = config.render(vars);
        if !rendered.missing.is_empty() {
            tracing::warn!(
                prompt = %config.slug,
                missing = ?rendered.missing,
                "Prompt rendered with missing variables"
            );
        }
        CompletionRequest::from_prompt(config, rendered)
    }

    /// Generate a first (or fresh) draft
    #[tracing::instrument(skip(self))]
    pub async fn generate_draft(&self, release_id: &str, actor: Actor) -> ReleaseResult<DraftOutcome> {
        let release = self.releases().get(release_id)?;
        let config = self.load_prompt(prompts::DRAFT_RELEASE)?;
        let request = self.request(&config, &release.template_vars());

        self.apply_action(
            release_id,
            ReleaseAction::GenerateDraft,
            actor,
            ActionOptions::expecting(release.version),
        )?;
        self.emit(ReleaseEvent::new(ReleaseEventKind::DraftStarted, release_id).with_actor(actor));

        match self.finish_draft(release_id, &request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.roll_back(release_id, ReleaseAction::DraftFailed, ReleaseEventKind::DraftFailed, &e);
                Err(e)
            }
        }
    }

    async fn finish_draft(
        &self,
        release_id: &str,
        request: &CompletionRequest,
    ) -> ReleaseResult<DraftOutcome> {
        let completion = self.llm.complete(request).await?;

        let parsed = parse_draft(&completion.text);
        let draft = self.drafts().save_generated(
            release_id,
            &parsed,
            &completion.text,
            Some(&completion.model),
        )?;
        let moved = self.apply_action(
            release_id,
            ReleaseAction::DraftReady,
            Actor::System,
            ActionOptions::default(),
        )?;

        tracing::info!(revision = draft.revision, quotes = draft.quotes.len(), "Draft generated");
        self.emit(
            ReleaseEvent::new(ReleaseEventKind::DraftCompleted, release_id)
                .with_status(moved.release.status)
                .with_data(serde_json::json!({
                    "revision": draft.revision,
                    "headline": draft.headline,
                })),
        );

        Ok(DraftOutcome {
            release: moved.release,
            draft,
        })
    }

    /// Run the journalist panel and the contrarian review on the latest draft.
    ///
    /// The contrarian review is advisory: if that call fails the panel is
    /// still stored, without recommendations.
    #[tracing::instrument(skip(self))]
    pub async fn run_panel(&self, release_id: &str, actor: Actor) -> ReleaseResult<PanelOutcome> {
        let release = self.releases().get(release_id)?;
        let draft = self
            .drafts()
            .latest(release_id)?
            .ok_or_else(|| ReleaseError::Validation("release has no draft to review".into()))?;
        let panel_config = self.load_prompt(prompts::JOURNALIST_PANEL)?;
        let contrarian_config = self.load_prompt(prompts::CONTRARIAN_REVIEW)?;

        let mut vars = self.release_vars(&release)?;
        // The panel always reviews the copy as drafted, not a prior summary
        vars.remove("panel_summary");

        self.apply_action(
            release_id,
            ReleaseAction::RunPanel,
            actor,
            ActionOptions::expecting(release.version),
        )?;
        self.emit(ReleaseEvent::new(ReleaseEventKind::PanelStarted, release_id).with_actor(actor));

        match self
            .finish_panel(release_id, &draft, vars, &panel_config, &contrarian_config)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.roll_back(release_id, ReleaseAction::PanelFailed, ReleaseEventKind::PanelFailed, &e);
                Err(e)
            }
        }
    }

    async fn finish_panel(
        &self,
        release_id: &str,
        draft: &Draft,
        mut vars: HashMap<String, String>,
        panel_config: &PromptConfig,
        contrarian_config: &PromptConfig,
    ) -> ReleaseResult<PanelOutcome> {
        let panel = self.llm.complete(&self.request(panel_config, &vars)).await?;
        let critique = parse_panel(&panel.text);

        vars.insert("panel_summary".to_string(), critique.summary());
        let contrarian_request = self.request(contrarian_config, &vars);
        let (recommendations, contrarian_raw) = match self.llm.complete(&contrarian_request).await {
            Ok(completion) => (parse_contrarian(&completion.text), Some(completion.text)),
            Err(e) => {
                tracing::warn!(error = %e, "Contrarian review failed; storing panel without it");
                (Vec::new(), None)
            }
        };

        let review = self.drafts().save_panel(
            release_id,
            draft.revision,
            &critique,
            &recommendations,
            &panel.text,
            contrarian_raw.as_deref(),
        )?;
        let moved = self.apply_action(
            release_id,
            ReleaseAction::PanelReady,
            Actor::System,
            ActionOptions::default(),
        )?;

        tracing::info!(
            panelists = critique.panelists.len(),
            average_score = ?critique.average_score,
            recommendations = recommendations.len(),
            "Panel review stored"
        );
        self.emit(
            ReleaseEvent::new(ReleaseEventKind::PanelCompleted, release_id)
                .with_status(moved.release.status)
                .with_data(serde_json::json!({
                    "average_score": critique.average_score,
                    "panelists": critique.panelists.len(),
                    "recommendations": recommendations.len(),
                })),
        );

        Ok(PanelOutcome {
            release: moved.release,
            review,
        })
    }

    /// Move an in-flight release back after its step failed and record why.
    ///
    /// The release may already have left the in-flight status (an admin
    /// cancelled it meanwhile); then only the event is sent.
    fn roll_back(
        &self,
        release_id: &str,
        action: ReleaseAction,
        kind: ReleaseEventKind,
        error: &ReleaseError,
    ) {
        tracing::warn!(error = %error, %action, "Pipeline step failed");
        let in_flight = self
            .releases()
            .get(release_id)
            .map(|release| release.status.is_in_flight())
            .unwrap_or(false);
        if !in_flight {
            tracing::info!(%action, "Release already left the step; nothing to roll back");
        } else if let Err(e) = self.apply_action(
            release_id,
            action,
            Actor::System,
            ActionOptions::default().with_note(error.to_string()),
        ) {
            tracing::warn!(error = %e, %action, "Release was not rolled back");
        }
        self.emit(
            ReleaseEvent::new(kind, release_id)
                .with_data(serde_json::json!({ "error": error.to_string() })),
        );
    }

    /// [`generate_draft`](Self::generate_draft) on its own task; dropping the
    /// returned future does not abandon the step.
    pub async fn spawn_generate_draft(
        self: Arc<Self>,
        release_id: String,
        actor: Actor,
    ) -> ReleaseResult<DraftOutcome> {
        let task = tokio::spawn(async move { self.generate_draft(&release_id, actor).await });
        task.await
            .map_err(|e| ReleaseError::Internal(anyhow::anyhow!("draft task failed: {}", e)))?
    }

    /// [`run_panel`](Self::run_panel) on its own task
    pub async fn spawn_run_panel(
        self: Arc<Self>,
        release_id: String,
        actor: Actor,
    ) -> ReleaseResult<PanelOutcome> {
        let task = tokio::spawn(async move { self.run_panel(&release_id, actor).await });
        task.await
            .map_err(|e| ReleaseError::Internal(anyhow::anyhow!("panel task failed: {}", e)))?
    }

    /// Rewrite the latest draft from editor instructions and the panel's feedback.
    ///
    /// The model is called before the status changes, so a failed call leaves
    /// the release where it was.
    #[tracing::instrument(skip(self, instructions))]
    pub async fn revise_with_feedback(
        &self,
        release_id: &str,
        instructions: &str,
    ) -> ReleaseResult<DraftOutcome> {
        let release = self.releases().get(release_id)?;
        transition(
            release.status,
            ReleaseAction::Revise,
            Actor::Admin,
            release.held_from,
        )?;
        if self.drafts().latest(release_id)?.is_none() {
            return Err(ReleaseError::Validation("release has no draft to revise".into()));
        }

        let config = self.load_prompt(prompts::REVISE_DRAFT)?;
        let mut vars = self.release_vars(&release)?;
        if !instructions.trim().is_empty() {
            vars.insert("instructions".to_string(), instructions.trim().to_string());
        }
        let request = self.request(&config, &vars);

        let completion = self.llm.complete(&request).await.map_err(|e| {
            tracing::warn!(error = %e, "Revision failed");
            ReleaseError::from(e)
        })?;

        let moved = self.apply_action(
            release_id,
            ReleaseAction::Revise,
            Actor::Admin,
            ActionOptions::expecting(release.version).with_note("revised with feedback"),
        )?;

        let parsed = parse_draft(&completion.text);
        let draft = self.drafts().save_generated(
            release_id,
            &parsed,
            &completion.text,
            Some(&completion.model),
        )?;

        self.emit(
            ReleaseEvent::new(ReleaseEventKind::RevisionSaved, release_id)
                .with_status(moved.release.status)
                .with_actor(Actor::Admin)
                .with_data(serde_json::json!({ "revision": draft.revision })),
        );

        Ok(DraftOutcome {
            release: moved.release,
            draft,
        })
    }
}
