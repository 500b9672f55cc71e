//! HTTP API: shared state, routing and the OpenAPI document.

pub mod admin;
pub mod auth;
pub mod customer;
pub mod error;
pub mod events;
pub mod prompts;
pub mod public;

use axum::{
    routing::{get, post},
    Json, Router,
};
use pressroom_core::llm::{LlmClient, ProviderRouter};
use pressroom_core::pipeline::{ReleaseEvent, ReleasePipeline};
use pressroom_core::state::PressroomDb;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::config::PressroomConfig;

/// Application state
pub struct AppState {
    pub db: Arc<PressroomDb>,
    pub event_tx: broadcast::Sender<ReleaseEvent>,
    pub config: RwLock<PressroomConfig>,
    /// Where config PATCHes are persisted
    pub config_path: PathBuf,
    /// Swapped when the LLM settings change
    pipeline: RwLock<Arc<ReleasePipeline>>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        db: Arc<PressroomDb>,
        llm: Arc<dyn LlmClient>,
        config: PressroomConfig,
        config_path: PathBuf,
    ) -> SharedState {
        let (event_tx, _) = broadcast::channel::<ReleaseEvent>(100);
        let pipeline = ReleasePipeline::new(db.clone(), llm).with_event_channel(event_tx.clone());
        Arc::new(Self {
            db,
            event_tx,
            config: RwLock::new(config),
            config_path,
            pipeline: RwLock::new(Arc::new(pipeline)),
        })
    }

    pub async fn pipeline(&self) -> Arc<ReleasePipeline> {
        self.pipeline.read().await.clone()
    }

    /// Broadcast an event raised outside the pipeline
    pub fn emit(&self, event: ReleaseEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Point the pipeline at the provider and model in `config`
    pub async fn reload_llm(&self, config: &PressroomConfig) -> anyhow::Result<()> {
        let model = config.model_config()?;
        tracing::info!(provider = %model.provider, model = %model.model, "Switching LLM client");
        let llm = Arc::new(ProviderRouter::new(model, config.llm_timeout()));
        let pipeline =
            ReleasePipeline::new(self.db.clone(), llm).with_event_channel(self.event_tx.clone());
        *self.pipeline.write().await = Arc::new(pipeline);
        Ok(())
    }
}

pub fn router(state: SharedState) -> Router {
    let admin_routes = Router::new()
        .route("/releases", get(admin::list_releases))
        .route("/releases/:id", get(admin::get_release))
        .route("/releases/:id/actions", post(admin::apply_action))
        .route(
            "/releases/:id/draft",
            post(admin::generate_draft).put(admin::edit_draft),
        )
        .route("/releases/:id/panel", post(admin::run_panel))
        .route("/releases/:id/revise", post(admin::revise))
        .route("/releases/:id/headline", post(admin::select_headline))
        .route("/releases/:id/history", get(admin::history))
        .route("/releases/:id/votes", post(admin::cast_vote))
        .route("/prompts", get(prompts::list_prompts))
        .route(
            "/prompts/:slug",
            get(prompts::get_prompt)
                .patch(prompts::update_prompt)
                .put(prompts::upsert_prompt),
        )
        .route("/prompts/:slug/reset", post(prompts::reset_prompt))
        .route("/prompts/:slug/preview", post(prompts::preview_prompt))
        .route("/customers", get(admin::list_customers))
        .route("/customers/:id", get(admin::get_customer))
        .route("/customers/:id/credits", post(admin::add_credits))
        .route("/journalists", get(admin::list_journalists))
        .route("/distribution", get(admin::list_distribution))
        .route("/distribution/:id/sent", post(admin::mark_sent))
        .route("/config", get(admin::get_config).patch(admin::update_config))
        .route("/events", get(events::events));

    let v1_routes = Router::new()
        // Public
        .route("/pricing", get(public::list_plans))
        .route("/statuses", get(public::list_statuses))
        .route("/signup", post(public::signup))
        .route("/journalists/subscribe", post(public::subscribe))
        .route("/journalists/unsubscribe", post(public::unsubscribe))
        .route("/openapi.json", get(serve_openapi))
        // Customer dashboard
        .route("/me", get(customer::me))
        .route(
            "/releases",
            get(customer::list_releases).post(customer::create_release),
        )
        .route("/releases/:id", get(customer::get_release))
        .route("/releases/:id/approve", post(customer::approve))
        .route("/releases/:id/request-changes", post(customer::request_changes))
        .route("/releases/:id/cancel", post(customer::cancel))
        .route(
            "/releases/:id/votes",
            get(customer::get_votes).post(customer::cast_vote),
        )
        .nest("/admin", admin_routes);

    Router::new()
        .route("/health", get(public::health))
        .nest("/api/v1", v1_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pressroom API",
        version = "1.0.0",
        description = "Press-release drafting, review and distribution service"
    ),
    paths(
        public::health,
        public::list_plans,
        public::list_statuses,
        public::signup,
        public::subscribe,
        public::unsubscribe,
        customer::me,
        customer::list_releases,
        customer::create_release,
        customer::get_release,
        customer::approve,
        customer::request_changes,
        customer::cancel,
        customer::cast_vote,
        customer::get_votes,
        admin::list_releases,
        admin::get_release,
        admin::apply_action,
        admin::generate_draft,
        admin::run_panel,
        admin::revise,
        admin::edit_draft,
        admin::select_headline,
        admin::history,
        admin::cast_vote,
        admin::list_customers,
        admin::get_customer,
        admin::add_credits,
        admin::list_journalists,
        admin::list_distribution,
        admin::mark_sent,
        admin::get_config,
        admin::update_config,
        prompts::list_prompts,
        prompts::get_prompt,
        prompts::update_prompt,
        prompts::upsert_prompt,
        prompts::reset_prompt,
        prompts::preview_prompt
    ),
    components(
        schemas(
            error::ErrorBody,
            public::HealthResponse,
            public::SignupRequest,
            public::SubscribeRequest,
            public::UnsubscribeRequest,
            customer::ClientActionRequest,
            customer::VoteRequest,
            admin::ActionRequest,
            admin::ReviseRequest,
            admin::HeadlineRequest,
            admin::AdminVoteRequest,
            admin::CreditRequest,
            admin::ConfigResponse,
            admin::ProviderInfo,
            prompts::PreviewRequest,
            PressroomConfig
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "public", description = "Pricing, signup and the journalist mailing list"),
        (name = "customer", description = "Customer dashboard"),
        (name = "admin", description = "Admin console"),
        (name = "prompts", description = "Prompt config management")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        components.add_security_scheme(
            "admin_token",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
