//! JSON bodies exchanged with admin clients.
//!
//! Requests and responses of every admin endpoint, plus [`ApiError`], which
//! turns a [`SpiderError`] into an HTTP response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallspider_core::SpiderError;

use crate::auth::AdminUser;
use crate::filters::{FilterChoice, FilterSpec};
use crate::hooks::JsonObject;
use crate::model_admin::{FieldType, Fieldset, InlineType, Media};

/// An error returned from an admin handler.
///
/// The body is `{"error": message}`; validation failures add
/// `"fields": {field: [messages]}` with object-level messages under `__all__`.
#[derive(Debug)]
pub struct ApiError(pub SpiderError);

impl From<SpiderError> for ApiError {
    fn from(err: SpiderError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "admin request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "admin request rejected");
        }

        let mut body = serde_json::json!({ "error": self.0.to_string() });
        if let SpiderError::Validation(validation) = &self.0 {
            let mut fields: JsonObject = validation
                .field_errors
                .iter()
                .map(|(field, messages)| (field.clone(), Value::from(messages.clone())))
                .collect();
            if !validation.non_field_errors.is_empty() {
                fields.insert(
                    "__all__".to_string(),
                    Value::from(validation.non_field_errors.clone()),
                );
            }
            body["fields"] = Value::Object(fields);
        }
        (status, axum::Json(body)).into_response()
    }
}

/// A page of results with pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonListResponse<T = Value> {
    /// The items on this page.
    pub results: Vec<T>,
    /// Total number of matching items across all pages.
    pub count: usize,
    /// The current page number (1-indexed).
    pub page: usize,
    /// The number of items per page.
    pub page_size: usize,
    /// Total number of pages.
    pub total_pages: usize,
    /// Whether there is a next page.
    pub has_next: bool,
    /// Whether there is a previous page.
    pub has_previous: bool,
}

impl<T> JsonListResponse<T> {
    /// Slices `all_results` to the requested page.
    ///
    /// Pages past either end are clamped to the nearest valid page.
    pub fn paginate(all_results: Vec<T>, page: usize, page_size: usize) -> Self {
        let count = all_results.len();
        let page_size = page_size.max(1);
        let total_pages = count.div_ceil(page_size).max(1);
        let page = page.clamp(1, total_pages);

        let start = (page - 1) * page_size;
        let results = all_results
            .into_iter()
            .skip(start)
            .take(page_size)
            .collect();

        Self {
            results,
            count,
            page,
            page_size,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }

    /// Replaces the items, keeping the metadata.
    pub fn with_results<U>(self, results: Vec<U>) -> JsonListResponse<U> {
        JsonListResponse {
            results,
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// `POST /login/` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Login name.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

/// `POST /login/` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// The signed-in account.
    pub user: AdminUser,
}

/// `POST /{app}/{model}/action/` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// The action name, e.g. `delete_selected`.
    pub action: String,
    /// Primary keys of the selected rows.
    #[serde(default)]
    pub ids: Vec<Value>,
}

/// An action offered by a change list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInfo {
    /// The identifier to submit.
    pub name: String,
    /// A human-readable description.
    pub description: String,
}

/// A change list column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// The `list_display` entry.
    pub name: String,
    /// The header label.
    pub label: String,
    /// Whether the cell links to the change form.
    pub link: bool,
    /// Whether the column may be passed to the `o` ordering parameter.
    pub sortable: bool,
}

/// One row of a change list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeListRow {
    /// The object's primary key.
    pub pk: String,
    /// The object's change form URL.
    pub url: String,
    /// Display values keyed by column name.
    pub cells: JsonObject,
}

/// `GET /{app}/{model}/` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeListResponse {
    /// The model key.
    pub model: String,
    /// Page title.
    pub title: String,
    /// Columns in display order.
    pub columns: Vec<Column>,
    /// The requested page of rows.
    #[serde(flatten)]
    pub list: JsonListResponse<ChangeListRow>,
    /// Sidebar filters.
    pub filters: Vec<FilterSpec>,
    /// Whether a search box is shown.
    pub has_search: bool,
    /// The active search query.
    pub query: Option<String>,
    /// The ordering applied.
    pub ordering: Vec<String>,
    /// Bulk actions.
    pub actions: Vec<ActionInfo>,
    /// Whether the action bar is shown above the rows.
    pub actions_on_top: bool,
    /// Whether the action bar is shown below the rows.
    pub actions_on_bottom: bool,
    /// URL of the add form.
    pub add_url: String,
}

/// A form input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    /// The field name.
    pub name: String,
    /// The label.
    pub label: String,
    /// The storage type.
    pub field_type: FieldType,
    /// Whether a value must be submitted.
    pub required: bool,
    /// Maximum length, if any.
    pub max_length: Option<usize>,
    /// Help text.
    pub help_text: String,
    /// Preferred widget.
    pub widget: Option<String>,
    /// Allowed values: declared choices, or the related objects of a relation.
    pub choices: Vec<FilterChoice>,
}

/// The inline editor of a change form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineFormset {
    /// The child model key; also the key to submit rows under.
    pub model: String,
    /// Layout.
    pub inline_type: InlineType,
    /// The child field pointing at the parent.
    pub fk_name: String,
    /// Editable fields of each row.
    pub fields: Vec<FormField>,
    /// Existing child rows.
    pub rows: Vec<Value>,
    /// Number of blank rows offered.
    pub extra: usize,
    /// Maximum number of rows, if limited.
    pub max_num: Option<usize>,
}

/// `GET /{app}/{model}/add/` and `GET /{app}/{model}/{pk}/change/` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeFormResponse {
    /// The model key.
    pub model: String,
    /// Page title.
    pub title: String,
    /// The object being changed; `None` on the add form.
    pub object: Option<Value>,
    /// Form layout.
    pub fieldsets: Vec<Fieldset>,
    /// Inputs, in layout order.
    pub fields: Vec<FormField>,
    /// Whether save buttons are also shown above the form.
    pub save_on_top: bool,
    /// Extra assets the page loads.
    pub media: Option<Media>,
    /// Inline editors.
    pub inlines: Vec<InlineFormset>,
    /// Where to POST the form.
    pub submit_url: String,
    /// Where to POST a delete; `None` on the add form.
    pub delete_url: Option<String>,
}

/// A registered model on the index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// The model name.
    pub name: String,
    /// The plural display name.
    pub verbose_name_plural: String,
    /// Change list URL.
    pub changelist_url: String,
    /// Add form URL.
    pub add_url: String,
}

/// The models of one app on the index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppModels {
    /// The app label.
    pub app_label: String,
    /// Its registered models, sorted by name.
    pub models: Vec<ModelInfo>,
}

/// `GET /` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexResponse {
    /// Text at the top of every page.
    pub site_header: String,
    /// Browser title.
    pub site_title: String,
    /// Index heading.
    pub index_title: String,
    /// The signed-in user's name.
    pub username: String,
    /// Registered models grouped by app, sorted by app label.
    pub apps: Vec<AppModels>,
}
