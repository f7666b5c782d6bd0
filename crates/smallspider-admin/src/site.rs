//! Admin site registry and router generation.
//!
//! The [`AdminSite`] is where models are registered with their
//! [`ModelAdmin`] configuration and [`ModelAdminHooks`]. It produces an Axum
//! router serving the admin as JSON under the configured URL prefix.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use smallspider_core::checks::CheckMessage;
use smallspider_core::logging::admin_span;
use smallspider_core::AdminSettings;
use tracing::Instrument;

use crate::actions::{ActionRegistry, ActionResult, AdminAction};
use crate::api::{
    ActionRequest, ApiError, ChangeFormResponse, ChangeListResponse, IndexResponse, LoginRequest,
    LoginResponse,
};
use crate::auth::UserRegistry;
use crate::checks::check_model_admin;
use crate::db::{AdminDbExecutor, InMemoryAdminDb};
use crate::hooks::ModelAdminHooks;
use crate::log_entry::{InMemoryLogEntryStore, LogEntry, LogEntryStore};
use crate::model_admin::ModelAdmin;
use crate::urls::AdminUrls;
use crate::views::{AdminState, Registration};

/// The admin site, responsible for model registration and route generation.
///
/// # Examples
///
/// ```
/// use smallspider_admin::site::AdminSite;
/// use smallspider_admin::{DefaultHooks, ModelAdmin};
/// use smallspider_core::AdminSettings;
///
/// let mut site = AdminSite::new(AdminSettings::default());
/// site.register(ModelAdmin::new("blog", "tag"), DefaultHooks);
/// assert!(site.is_registered("blog.tag"));
/// let _router = site.into_axum_router();
/// ```
pub struct AdminSite {
    settings: AdminSettings,
    models: BTreeMap<String, Registration>,
    urls: AdminUrls,
    db: Arc<dyn AdminDbExecutor>,
    users: UserRegistry,
    log_store: Arc<dyn LogEntryStore>,
    actions: ActionRegistry,
}

impl AdminSite {
    /// Creates an empty site backed by in-memory storage.
    pub fn new(settings: AdminSettings) -> Self {
        let urls = AdminUrls::new(settings.namespace.clone(), &settings.url_prefix);
        Self {
            settings,
            models: BTreeMap::new(),
            urls,
            db: Arc::new(InMemoryAdminDb::new()),
            users: UserRegistry::new(),
            log_store: Arc::new(InMemoryLogEntryStore::new()),
            actions: ActionRegistry::new(),
        }
    }

    /// Replaces the object store.
    #[must_use]
    pub fn with_db(mut self, db: Arc<dyn AdminDbExecutor>) -> Self {
        self.db = db;
        self
    }

    /// Replaces the account registry.
    #[must_use]
    pub fn with_users(mut self, users: UserRegistry) -> Self {
        self.users = users;
        self
    }

    /// Replaces the audit trail store.
    #[must_use]
    pub fn with_log_store(mut self, store: Arc<dyn LogEntryStore>) -> Self {
        self.log_store = store;
        self
    }

    /// Registers a model. Registering the same model again replaces it.
    pub fn register(&mut self, admin: ModelAdmin, hooks: impl ModelAdminHooks + 'static) {
        self.urls.add_model(&admin.app_label, &admin.model_name);
        tracing::debug!(model = %admin.model_key(), "registered admin model");
        self.models.insert(
            admin.model_key(),
            Registration {
                admin,
                hooks: Arc::new(hooks),
            },
        );
    }

    /// Offers an extra bulk action on every change list.
    pub fn register_action(&mut self, action: impl AdminAction + 'static) {
        self.actions.register(action);
    }

    /// Returns `true` if `model_key` (`"app.model"`) is registered.
    pub fn is_registered(&self, model_key: &str) -> bool {
        self.models.contains_key(model_key)
    }

    /// Registered model keys, sorted.
    pub fn registered_models(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// The configuration of a registered model.
    pub fn get_model_admin(&self, model_key: &str) -> Option<&ModelAdmin> {
        self.models.get(model_key).map(|r| &r.admin)
    }

    /// Presentation options.
    pub const fn settings(&self) -> &AdminSettings {
        &self.settings
    }

    /// URL reversing for this site's namespace.
    pub const fn urls(&self) -> &AdminUrls {
        &self.urls
    }

    /// The account registry. Clones share accounts and tokens.
    pub const fn users(&self) -> &UserRegistry {
        &self.users
    }

    /// The object store.
    pub fn db(&self) -> Arc<dyn AdminDbExecutor> {
        Arc::clone(&self.db)
    }

    /// The audit trail store.
    pub fn log_store(&self) -> Arc<dyn LogEntryStore> {
        Arc::clone(&self.log_store)
    }

    /// Runs the system checks over every registration.
    pub fn check(&self) -> Vec<CheckMessage> {
        let registered: Vec<&ModelAdmin> = self.models.values().map(|r| &r.admin).collect();
        registered
            .iter()
            .flat_map(|admin| check_model_admin(admin, &registered))
            .collect()
    }

    /// Freezes the registry into the state shared by request handlers.
    pub fn into_state(self) -> Arc<AdminState> {
        Arc::new(AdminState {
            settings: self.settings,
            models: self.models,
            urls: self.urls,
            db: self.db,
            users: self.users,
            log: self.log_store,
            actions: self.actions,
        })
    }

    /// Generates the Axum router with all admin endpoints under the URL prefix.
    ///
    /// The generated routes are:
    ///
    /// - `POST /login/` - Authenticate and get a bearer token
    /// - `POST /logout/` - Revoke the token
    /// - `GET /` - Registered models grouped by app
    /// - `GET /log/` - The user's recent actions
    /// - `GET /{app}/{model}/` - Change list
    /// - `POST /{app}/{model}/action/` - Run a bulk action
    /// - `GET /{app}/{model}/add/` - Add form
    /// - `POST /{app}/{model}/add/` - Create an object
    /// - `GET /{app}/{model}/{pk}/change/` - Change form
    /// - `POST /{app}/{model}/{pk}/change/` - Update an object
    /// - `POST /{app}/{model}/{pk}/delete/` - Delete an object
    pub fn into_axum_router(self) -> Router {
        let prefix = self.urls.prefix().to_string();
        let shared = self.into_state();

        Router::new()
            .route(&format!("{prefix}/login/"), post(handle_login))
            .route(&format!("{prefix}/logout/"), post(handle_logout))
            .route(&format!("{prefix}/"), get(handle_index))
            .route(&format!("{prefix}/log/"), get(handle_log_recent))
            .route(&format!("{prefix}/{{app}}/{{model}}/"), get(handle_changelist))
            .route(&format!("{prefix}/{{app}}/{{model}}/action/"), post(handle_action))
            .route(
                &format!("{prefix}/{{app}}/{{model}}/add/"),
                get(handle_add_form).post(handle_add),
            )
            .route(
                &format!("{prefix}/{{app}}/{{model}}/{{pk}}/change/"),
                get(handle_change_form).post(handle_change),
            )
            .route(
                &format!("{prefix}/{{app}}/{{model}}/{{pk}}/delete/"),
                post(handle_delete),
            )
            .with_state(shared)
    }
}

impl std::fmt::Debug for AdminSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSite")
            .field("namespace", &self.urls.namespace())
            .field("url_prefix", &self.urls.prefix())
            .field("models", &self.registered_models().join(", "))
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

type Shared = State<Arc<AdminState>>;

// ── Authentication Handlers ────────────────────────────────────────

async fn handle_login(
    State(state): Shared,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    Ok(Json(state.login(&payload).await?))
}

async fn handle_logout(State(state): Shared, headers: HeaderMap) -> Result<StatusCode, ApiError> {
    state.logout(&headers)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Site Handlers ──────────────────────────────────────────────────

async fn handle_index(
    State(state): Shared,
    headers: HeaderMap,
) -> Result<Json<IndexResponse>, ApiError> {
    let user = state.authenticate(&headers)?;
    Ok(Json(state.index(&user)))
}

async fn handle_log_recent(
    State(state): Shared,
    headers: HeaderMap,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let user = state.authenticate(&headers)?;
    Ok(Json(state.recent_log(&user)))
}

// ── Model Handlers ─────────────────────────────────────────────────

async fn handle_changelist(
    State(state): Shared,
    headers: HeaderMap,
    Path((app, model)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ChangeListResponse>, ApiError> {
    let user = state.authenticate(&headers)?;
    let span = admin_span(&format!("{app}.{model}"), &user.username);
    let response = state
        .changelist(&user, &app, &model, &params)
        .instrument(span)
        .await?;
    Ok(Json(response))
}

async fn handle_action(
    State(state): Shared,
    headers: HeaderMap,
    Path((app, model)): Path<(String, String)>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<ActionResult>, ApiError> {
    let user = state.authenticate(&headers)?;
    let span = admin_span(&format!("{app}.{model}"), &user.username);
    let result = state
        .run_action(&user, &app, &model, &request)
        .instrument(span)
        .await?;
    Ok(Json(result))
}

async fn handle_add_form(
    State(state): Shared,
    headers: HeaderMap,
    Path((app, model)): Path<(String, String)>,
) -> Result<Json<ChangeFormResponse>, ApiError> {
    let user = state.authenticate(&headers)?;
    let span = admin_span(&format!("{app}.{model}"), &user.username);
    let form = state
        .change_form(&user, &app, &model, None)
        .instrument(span)
        .await?;
    Ok(Json(form))
}

async fn handle_add(
    State(state): Shared,
    headers: HeaderMap,
    Path((app, model)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = state.authenticate(&headers)?;
    let span = admin_span(&format!("{app}.{model}"), &user.username);
    let saved = state
        .save(&user, &app, &model, None, body)
        .instrument(span)
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn handle_change_form(
    State(state): Shared,
    headers: HeaderMap,
    Path((app, model, pk)): Path<(String, String, String)>,
) -> Result<Json<ChangeFormResponse>, ApiError> {
    let user = state.authenticate(&headers)?;
    let span = admin_span(&format!("{app}.{model}"), &user.username);
    let form = state
        .change_form(&user, &app, &model, Some(&pk))
        .instrument(span)
        .await?;
    Ok(Json(form))
}

async fn handle_change(
    State(state): Shared,
    headers: HeaderMap,
    Path((app, model, pk)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let user = state.authenticate(&headers)?;
    let span = admin_span(&format!("{app}.{model}"), &user.username);
    let saved = state
        .save(&user, &app, &model, Some(&pk), body)
        .instrument(span)
        .await?;
    Ok(Json(saved))
}

async fn handle_delete(
    State(state): Shared,
    headers: HeaderMap,
    Path((app, model, pk)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let user = state.authenticate(&headers)?;
    let span = admin_span(&format!("{app}.{model}"), &user.username);
    state
        .delete(&user, &app, &model, &pk)
        .instrument(span)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
