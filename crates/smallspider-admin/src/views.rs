//! The work behind each admin endpoint.
//!
//! Handlers in [`site`](crate::site) authenticate the request and then call
//! into [`AdminState`]. Every lookup of a model's objects goes through the
//! model's `get_queryset` hook first, so an object the hook hides answers
//! 404 on every page.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use serde_json::Value;
use smallspider_core::{AdminSettings, SpiderError, SpiderResult, ValidationError};

use crate::actions::{ActionRegistry, ActionResult};
use crate::api::{
    ActionInfo, ActionRequest, AppModels, ChangeFormResponse, ChangeListResponse, ChangeListRow,
    Column, FormField, IndexResponse, InlineFormset, JsonListResponse, LoginRequest,
    LoginResponse, ModelInfo,
};
use crate::auth::{bearer_token, AdminUser, UserRegistry};
use crate::checks::{inline_fk, USER_MODEL};
use crate::db::AdminDbExecutor;
use crate::filters::{
    apply_field_filter, apply_ordering, apply_search, field_filter_choices, json_matches,
    value_text, FilterChoice, FilterSpec, RelatedValues, SearchField, RESERVED_PARAMS,
};
use crate::hooks::{AdminContext, JsonObject, ModelAdminHooks};
use crate::log_entry::{ActionFlag, LogEntry, LogEntryStore};
use crate::model_admin::{FieldSchema, FieldType, InlineAdmin, ListFilter, ModelAdmin};
use crate::urls::{AdminUrls, AdminView};

/// Number of entries returned by the recent actions page.
pub const RECENT_ACTIONS: usize = 10;

const REQUIRED: &str = "This field is required.";

/// A registered model: its layout and its behaviour.
#[derive(Clone)]
pub struct Registration {
    /// Declarative configuration.
    pub admin: ModelAdmin,
    /// Per-request behaviour.
    pub hooks: Arc<dyn ModelAdminHooks>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

/// Shared state of a running admin site.
pub struct AdminState {
    pub(crate) settings: AdminSettings,
    pub(crate) models: BTreeMap<String, Registration>,
    pub(crate) urls: AdminUrls,
    pub(crate) db: Arc<dyn AdminDbExecutor>,
    pub(crate) users: UserRegistry,
    pub(crate) log: Arc<dyn LogEntryStore>,
    pub(crate) actions: ActionRegistry,
}

/// String representations of related objects, loaded once per model per request.
#[derive(Default)]
struct ReprCache {
    models: HashMap<String, HashMap<String, String>>,
}

/// A validated inline row waiting for its parent to be saved.
struct InlineOp {
    inline: InlineAdmin,
    fk: String,
    pk: Option<String>,
    delete: bool,
    data: JsonObject,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn parse_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn invalid_choice(value: impl std::fmt::Display) -> String {
    format!("Select a valid choice. {value} is not one of the available choices.")
}

fn schema_choices(schema: &FieldSchema) -> Vec<FilterChoice> {
    schema
        .choices
        .iter()
        .filter_map(|c| value_text(&c.value).map(|v| FilterChoice::new(v, c.label.clone())))
        .collect()
}

/// Keeps the primary key, the parent key and the editable fields of an inline row.
fn project_row(row: &Value, keep: &[&str]) -> Value {
    let map: JsonObject = keep
        .iter()
        .filter_map(|k| row.get(*k).map(|v| ((*k).to_string(), v.clone())))
        .collect();
    Value::Object(map)
}

fn changed_fields(before: &Value, after: &JsonObject) -> Vec<String> {
    after
        .iter()
        .filter(|(k, v)| before.get(k.as_str()) != Some(*v))
        .map(|(k, _)| k.clone())
        .collect()
}

impl AdminState {
    /// The URL reverser of this site.
    pub const fn urls(&self) -> &AdminUrls {
        &self.urls
    }

    /// The hook context for a request made by `user`.
    pub fn context<'a>(&'a self, user: &'a AdminUser) -> AdminContext<'a> {
        AdminContext {
            user,
            db: self.db.as_ref(),
            urls: &self.urls,
            log: self.log.as_ref(),
        }
    }

    fn token(headers: &HeaderMap) -> SpiderResult<&str> {
        let header = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                SpiderError::Unauthorized("Authentication credentials were not provided.".into())
            })?;
        bearer_token(header)
            .ok_or_else(|| SpiderError::Unauthorized("Malformed Authorization header.".into()))
    }

    /// Resolves the bearer token of a request to a staff account.
    ///
    /// # Errors
    ///
    /// [`SpiderError::Unauthorized`] for a missing or unknown token,
    /// [`SpiderError::PermissionDenied`] for accounts without admin access.
    pub fn authenticate(&self, headers: &HeaderMap) -> SpiderResult<AdminUser> {
        let token = Self::token(headers)?;
        let user = self.users.user_for_token(token).ok_or_else(|| {
            tracing::warn!("rejected unknown admin token");
            SpiderError::Unauthorized("Invalid token.".into())
        })?;
        if !user.can_access_admin() {
            tracing::warn!(user = %user.username, "non-staff account refused");
            return Err(SpiderError::PermissionDenied(format!(
                "'{}' may not use the admin.",
                user.username
            )));
        }
        Ok(user)
    }

    /// Checks credentials and issues a token.
    pub async fn login(&self, request: &LoginRequest) -> SpiderResult<LoginResponse> {
        let user = self
            .users
            .authenticate(&request.username, &request.password)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user = %request.username, "admin login failed");
                SpiderError::Unauthorized(
                    "Please enter the correct username and password for a staff account.".into(),
                )
            })?;
        if !user.can_access_admin() {
            tracing::warn!(user = %user.username, "non-staff login refused");
            return Err(SpiderError::PermissionDenied(format!(
                "'{}' may not use the admin.",
                user.username
            )));
        }
        let token = self.users.issue_token(&user);
        tracing::info!(user = %user.username, "admin login");
        Ok(LoginResponse { token, user })
    }

    /// Revokes the token the request was made with.
    pub fn logout(&self, headers: &HeaderMap) -> SpiderResult<()> {
        let user = self.authenticate(headers)?;
        self.users.revoke_token(Self::token(headers)?);
        tracing::info!(user = %user.username, "admin logout");
        Ok(())
    }

    /// Looks up a registered model.
    pub fn registration(&self, app: &str, model: &str) -> SpiderResult<&Registration> {
        self.models
            .get(&format!("{app}.{model}"))
            .ok_or_else(|| {
                SpiderError::NotFound(format!("Model '{app}.{model}' is not registered"))
            })
    }

    /// The site index: registered models grouped by app.
    pub fn index(&self, user: &AdminUser) -> IndexResponse {
        let mut apps: Vec<AppModels> = Vec::new();
        for reg in self.models.values() {
            let admin = &reg.admin;
            let info = ModelInfo {
                name: admin.model_name.clone(),
                verbose_name_plural: admin.verbose_name_plural.clone(),
                changelist_url: self.model_url(admin, AdminView::Changelist, None),
                add_url: self.model_url(admin, AdminView::Add, None),
            };
            match apps.last_mut() {
                Some(app) if app.app_label == admin.app_label => app.models.push(info),
                _ => apps.push(AppModels {
                    app_label: admin.app_label.clone(),
                    models: vec![info],
                }),
            }
        }
        IndexResponse {
            site_header: self.settings.site_header.clone(),
            site_title: self.settings.site_title.clone(),
            index_title: self.settings.index_title.clone(),
            username: user.username.clone(),
            apps,
        }
    }

    /// The user's most recent admin edits.
    pub fn recent_log(&self, user: &AdminUser) -> Vec<LogEntry> {
        self.log.recent_for_user(user.id, RECENT_ACTIONS)
    }

    fn model_url(&self, admin: &ModelAdmin, view: AdminView, pk: Option<&str>) -> String {
        self.urls
            .model_url(&admin.app_label, &admin.model_name, view, pk)
    }

    async fn queryset(
        &self,
        ctx: &AdminContext<'_>,
        reg: &Registration,
    ) -> SpiderResult<Vec<Value>> {
        let objects = self.db.all_objects(&reg.admin.model_key()).await?;
        reg.hooks.get_queryset(ctx, objects).await
    }

    async fn visible_object(
        &self,
        ctx: &AdminContext<'_>,
        reg: &Registration,
        pk: &str,
    ) -> SpiderResult<Value> {
        let pk_field = reg.admin.pk_field();
        self.queryset(ctx, reg)
            .await?
            .into_iter()
            .find(|obj| obj.get(pk_field).is_some_and(|v| json_matches(v, pk)))
            .ok_or_else(|| {
                SpiderError::NotFound(format!(
                    "{} with pk '{pk}' does not exist",
                    reg.admin.model_key()
                ))
            })
    }

    /// Every object of `target` as a `(pk, repr)` choice.
    async fn related_choices(&self, target: &str) -> SpiderResult<Vec<FilterChoice>> {
        if target == USER_MODEL {
            return Ok(self
                .users
                .all()
                .into_iter()
                .map(|u| FilterChoice::new(u.id.to_string(), u.username))
                .collect());
        }
        let objects = self.db.all_objects(target).await?;
        Ok(match self.models.get(target) {
            Some(reg) => objects
                .iter()
                .filter_map(|obj| {
                    reg.admin
                        .object_pk(obj)
                        .map(|pk| FilterChoice::new(pk, reg.admin.object_repr(obj)))
                })
                .collect(),
            None => objects
                .iter()
                .filter_map(|obj| obj.get("id").and_then(value_text))
                .map(|pk| FilterChoice::new(pk.clone(), pk))
                .collect(),
        })
    }

    async fn reprs<'c>(
        &self,
        cache: &'c mut ReprCache,
        target: &str,
    ) -> SpiderResult<&'c HashMap<String, String>> {
        if !cache.models.contains_key(target) {
            let reprs = self
                .related_choices(target)
                .await?
                .into_iter()
                .map(|c| (c.value, c.display))
                .collect();
            cache.models.insert(target.to_string(), reprs);
        }
        cache
            .models
            .get(target)
            .ok_or_else(|| SpiderError::Internal(format!("no representations for '{target}'")))
    }

    /// `related__field` values of `target`, keyed by primary key.
    async fn related_values(
        &self,
        target: &str,
        field: &str,
    ) -> SpiderResult<HashMap<String, String>> {
        if target == USER_MODEL {
            return Ok(self
                .users
                .all()
                .into_iter()
                .filter(|_| field == "username")
                .map(|u| (u.id.to_string(), u.username))
                .collect());
        }
        let pk_field = self
            .models
            .get(target)
            .map_or("id", |reg| reg.admin.pk_field());
        Ok(self
            .db
            .all_objects(target)
            .await?
            .iter()
            .filter_map(|obj| {
                let pk = obj.get(pk_field).and_then(value_text)?;
                let value = obj.get(field).and_then(value_text)?;
                Some((pk, value))
            })
            .collect())
    }

    async fn display_cell(
        &self,
        ctx: &AdminContext<'_>,
        reg: &Registration,
        column: &str,
        obj: &Value,
        cache: &mut ReprCache,
    ) -> SpiderResult<Value> {
        let admin = &reg.admin;
        if column == "__str__" {
            return Ok(Value::String(admin.object_repr(obj)));
        }
        if admin.is_computed(column) {
            return Ok(reg
                .hooks
                .display_column(ctx, column, obj)
                .await?
                .unwrap_or(Value::Null));
        }

        let raw = obj.get(column).cloned().unwrap_or(Value::Null);
        let Some(schema) = admin.field(column) else {
            return Ok(raw);
        };
        if let Some(label) = schema.choice_label(&raw) {
            return Ok(Value::String(label.to_string()));
        }
        let Some(target) = schema.related_model.as_deref() else {
            return Ok(raw);
        };

        let reprs = self.reprs(cache, target).await?;
        let show = |v: &Value| value_text(v).map(|k| reprs.get(&k).cloned().unwrap_or(k));
        Ok(match &raw {
            Value::Array(items) => {
                Value::String(items.iter().filter_map(show).collect::<Vec<_>>().join(", "))
            }
            other => show(other).map_or(Value::Null, Value::String),
        })
    }

    /// The change list of a model.
    ///
    /// Query parameters: `q` searches, `o` orders (comma-separated fields,
    /// `-` for descending), `p` selects the page, and each list filter reads
    /// its own parameter. Any other parameter is rejected.
    #[allow(clippy::too_many_lines)]
    pub async fn changelist(
        &self,
        user: &AdminUser,
        app: &str,
        model: &str,
        params: &HashMap<String, String>,
    ) -> SpiderResult<ChangeListResponse> {
        let reg = self.registration(app, model)?;
        let admin = &reg.admin;
        let ctx = self.context(user);
        let mut cache = ReprCache::default();

        let filter_params: Vec<&str> = admin
            .list_filter
            .iter()
            .map(ListFilter::parameter_name)
            .collect();
        if let Some(unknown) = params
            .keys()
            .find(|k| {
                !RESERVED_PARAMS.contains(&k.as_str()) && !filter_params.contains(&k.as_str())
            })
        {
            return Err(SpiderError::BadRequest(format!(
                "Unknown filter parameter '{unknown}'"
            )));
        }

        let mut objects = self.queryset(&ctx, reg).await?;
        let visible = objects.clone();

        let mut filters = Vec::with_capacity(admin.list_filter.len());
        for filter in &admin.list_filter {
            let parameter = filter.parameter_name().to_string();
            let selected = params.get(&parameter).filter(|v| !v.is_empty()).cloned();
            match filter {
                ListFilter::Field(field) => {
                    let mut choices = field_filter_choices(admin, field, &visible);
                    if let Some(target) =
                        admin.field(field).and_then(|f| f.related_model.as_deref())
                    {
                        let reprs = self.reprs(&mut cache, target).await?;
                        for choice in &mut choices {
                            if let Some(repr) = reprs.get(&choice.value) {
                                choice.display.clone_from(repr);
                            }
                        }
                    }
                    if let Some(value) = &selected {
                        objects = apply_field_filter(objects, field, value);
                    }
                    filters.push(FilterSpec {
                        parameter,
                        title: admin.column_label(field),
                        choices,
                        selected,
                    });
                }
                ListFilter::Simple(simple) => {
                    let choices = simple.lookups(&ctx).await?;
                    objects = simple.queryset(selected.as_deref(), objects);
                    filters.push(FilterSpec {
                        parameter,
                        title: simple.title().to_string(),
                        choices,
                        selected,
                    });
                }
            }
        }

        let query = params
            .get("q")
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());
        if let Some(q) = &query {
            let fields: Vec<SearchField> = admin
                .search_fields
                .iter()
                .map(|f| SearchField::parse(f))
                .collect();
            let mut related = RelatedValues::new();
            for field in &fields {
                if let Some((fk, sub)) = &field.relation {
                    let target = admin
                        .field(fk)
                        .and_then(|f| f.related_model.as_deref())
                        .ok_or_else(|| {
                            SpiderError::Configuration(format!(
                                "search field '{}' does not follow a relation",
                                field.name
                            ))
                        })?;
                    related.insert(field.name.clone(), self.related_values(target, sub).await?);
                }
            }
            objects = apply_search(objects, &fields, q, &related);
        }

        let ordering = match params.get("o").filter(|o| !o.trim().is_empty()) {
            Some(o) => {
                let keys: Vec<String> = o
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(String::from)
                    .collect();
                if let Some(bad) = keys
                    .iter()
                    .find(|k| admin.field(k.trim_start_matches('-')).is_none())
                {
                    return Err(SpiderError::BadRequest(format!("Cannot order by '{bad}'")));
                }
                keys
            }
            None if !admin.ordering.is_empty() => admin.ordering.clone(),
            None => vec![format!("-{}", admin.pk_field())],
        };
        apply_ordering(&mut objects, &ordering);

        let page = match params.get("p") {
            Some(p) => p
                .trim()
                .parse::<usize>()
                .map_err(|_| SpiderError::BadRequest(format!("Invalid page '{p}'")))?,
            None => 1,
        };
        let per_page = admin.list_per_page.unwrap_or(self.settings.list_per_page);
        let page = JsonListResponse::paginate(objects, page, per_page);

        let mut rows = Vec::with_capacity(page.results.len());
        for obj in &page.results {
            let pk = admin.object_pk(obj).unwrap_or_default();
            let mut cells = JsonObject::new();
            for column in &admin.list_display {
                let cell = self.display_cell(&ctx, reg, column, obj, &mut cache).await?;
                cells.insert(column.clone(), cell);
            }
            rows.push(ChangeListRow {
                url: self.model_url(admin, AdminView::Change, Some(&pk)),
                pk,
                cells,
            });
        }

        let links = admin.link_columns();
        let columns = admin
            .list_display
            .iter()
            .map(|name| Column {
                name: name.clone(),
                label: admin.column_label(name),
                link: links.contains(name),
                sortable: admin.field(name).is_some(),
            })
            .collect();

        Ok(ChangeListResponse {
            model: admin.model_key(),
            title: format!("Select {} to change", admin.verbose_name),
            columns,
            list: page.with_results(rows),
            filters,
            has_search: !admin.search_fields.is_empty(),
            query,
            ordering,
            actions: self
                .actions
                .descriptions()
                .into_iter()
                .map(|(name, description)| ActionInfo { name, description })
                .collect(),
            actions_on_top: admin.actions_on_top,
            actions_on_bottom: admin.actions_on_bottom,
            add_url: self.model_url(admin, AdminView::Add, None),
        })
    }

    async fn form_fields(
        &self,
        admin: &ModelAdmin,
        names: &[String],
    ) -> SpiderResult<Vec<FormField>> {
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            let Some(schema) = admin.field(name) else {
                continue;
            };
            let choices = match schema.related_model.as_deref() {
                Some(target) => self.related_choices(target).await?,
                None => schema_choices(schema),
            };
            fields.push(FormField {
                name: schema.name.clone(),
                label: schema.label.clone(),
                field_type: schema.field_type,
                required: schema.required,
                max_length: schema.max_length,
                help_text: schema.help_text.clone(),
                widget: schema.widget.clone(),
                choices,
            });
        }
        Ok(fields)
    }

    /// The child registration, its key to the parent and the editable fields of an inline.
    fn inline_parts(
        &self,
        parent: &ModelAdmin,
        inline: &InlineAdmin,
    ) -> SpiderResult<(&Registration, String, Vec<String>)> {
        let child = self.models.get(&inline.model_key()).ok_or_else(|| {
            SpiderError::Configuration(format!(
                "inline model '{}' is not registered",
                inline.model_key()
            ))
        })?;
        let fk = inline_fk(&child.admin, inline.fk_name.as_deref(), &parent.model_key())
            .ok_or_else(|| {
                SpiderError::Configuration(format!(
                    "'{}' has no foreign key to '{}'",
                    inline.model_key(),
                    parent.model_key()
                ))
            })?
            .to_string();
        let names = if inline.fields.is_empty() {
            child.admin.form_fields()
        } else {
            inline.fields.clone()
        };
        let names = names.into_iter().filter(|n| *n != fk).collect();
        Ok((child, fk, names))
    }

    /// The inline rows of one parent that the child's queryset lets the user see.
    async fn inline_siblings(
        &self,
        ctx: &AdminContext<'_>,
        child: &Registration,
        fk: &str,
        parent_pk: &Value,
    ) -> SpiderResult<Vec<Value>> {
        let rows = self
            .db
            .objects_where(&child.admin.model_key(), fk, parent_pk)
            .await?;
        child.hooks.get_queryset(ctx, rows).await
    }

    async fn inline_formset(
        &self,
        ctx: &AdminContext<'_>,
        parent: &ModelAdmin,
        inline: &InlineAdmin,
        object: Option<&Value>,
    ) -> SpiderResult<InlineFormset> {
        let (child, fk, names) = self.inline_parts(parent, inline)?;
        let rows: Vec<Value> = match object.and_then(|o| o.get(parent.pk_field())) {
            Some(parent_pk) => {
                let mut keep = vec![child.admin.pk_field(), fk.as_str()];
                keep.extend(names.iter().map(String::as_str));
                self.inline_siblings(ctx, child, &fk, parent_pk)
                    .await?
                    .iter()
                    .map(|row| project_row(row, &keep))
                    .collect()
            }
            None => Vec::new(),
        };
        let fields = self.form_fields(&child.admin, &names).await?;
        Ok(InlineFormset {
            model: inline.model_key(),
            inline_type: inline.inline_type,
            fk_name: fk,
            fields,
            extra: inline.blank_rows(rows.len()),
            max_num: inline.max_num,
            rows,
        })
    }

    /// The add form (`pk` is `None`) or the change form of a visible object.
    pub async fn change_form(
        &self,
        user: &AdminUser,
        app: &str,
        model: &str,
        pk: Option<&str>,
    ) -> SpiderResult<ChangeFormResponse> {
        let reg = self.registration(app, model)?;
        let admin = &reg.admin;
        let ctx = self.context(user);

        let object = match pk {
            Some(pk) => Some(self.visible_object(&ctx, reg, pk).await?),
            None => None,
        };
        let fields = self.form_fields(admin, &admin.form_fields()).await?;
        let mut inlines = Vec::with_capacity(admin.inlines.len());
        for inline in &admin.inlines {
            inlines.push(
                self.inline_formset(&ctx, admin, inline, object.as_ref())
                    .await?,
            );
        }

        let (title, submit_url, delete_url) = match pk {
            Some(pk) => (
                format!("Change {}", admin.verbose_name),
                self.model_url(admin, AdminView::Change, Some(pk)),
                Some(self.model_url(admin, AdminView::Delete, Some(pk))),
            ),
            None => (
                format!("Add {}", admin.verbose_name),
                self.model_url(admin, AdminView::Add, None),
                None,
            ),
        };

        Ok(ChangeFormResponse {
            model: admin.model_key(),
            title,
            object,
            fieldsets: admin.effective_fieldsets(),
            fields,
            save_on_top: admin.save_on_top,
            media: admin.media.clone(),
            inlines,
            submit_url,
            delete_url,
        })
    }

    async fn related_exists(&self, schema: &FieldSchema, pk: u64) -> SpiderResult<bool> {
        match schema.related_model.as_deref() {
            Some(USER_MODEL) => Ok(self.users.get(pk).is_some()),
            Some(target) => match self.models.get(target) {
                Some(reg) => Ok(self
                    .db
                    .get_object(&reg.admin, &pk.to_string())
                    .await?
                    .is_some()),
                None => Ok(true),
            },
            None => Ok(true),
        }
    }

    /// Normalizes one submitted value, or explains why it is invalid.
    async fn clean_value(
        &self,
        schema: &FieldSchema,
        raw: &Value,
    ) -> SpiderResult<Result<Value, String>> {
        if is_blank(raw) && schema.field_type != FieldType::BooleanField {
            if let Some(default) = &schema.default {
                return Ok(Ok(default.clone()));
            }
            if schema.required {
                return Ok(Err(REQUIRED.to_string()));
            }
            return Ok(Ok(match schema.field_type {
                FieldType::CharField | FieldType::TextField => Value::String(String::new()),
                FieldType::ManyToManyField => Value::Array(Vec::new()),
                _ => Value::Null,
            }));
        }

        let value = match schema.field_type {
            FieldType::CharField | FieldType::TextField => {
                let Some(text) = value_text(raw) else {
                    return Ok(Err("Enter a valid value.".to_string()));
                };
                let text = text.trim().to_string();
                if let Some(max) = schema.max_length {
                    let len = text.chars().count();
                    if len > max {
                        return Ok(Err(format!(
                            "Ensure this value has at most {max} characters (it has {len})."
                        )));
                    }
                }
                Value::String(text)
            }
            FieldType::PositiveIntegerField | FieldType::BigAutoField => match parse_u64(raw) {
                Some(n) => Value::from(n),
                None => return Ok(Err("Enter a whole number.".to_string())),
            },
            FieldType::BooleanField => match raw {
                Value::Bool(b) => Value::Bool(*b),
                Value::Null => Value::Bool(false),
                other => match value_text(other).as_deref().map(str::trim) {
                    Some("1" | "true" | "True" | "on") => Value::Bool(true),
                    Some("0" | "false" | "False" | "off" | "") => Value::Bool(false),
                    _ => return Ok(Err("Enter a valid boolean.".to_string())),
                },
            },
            FieldType::DateTimeField => {
                let parsed = raw
                    .as_str()
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(s.trim()).ok());
                match parsed {
                    Some(dt) => Value::String(dt.with_timezone(&chrono::Utc).to_rfc3339()),
                    None => return Ok(Err("Enter a valid date/time.".to_string())),
                }
            }
            FieldType::ForeignKey => {
                let Some(pk) = parse_u64(raw) else {
                    return Ok(Err(invalid_choice(raw)));
                };
                if !self.related_exists(schema, pk).await? {
                    return Ok(Err(invalid_choice(pk)));
                }
                Value::from(pk)
            }
            FieldType::ManyToManyField => {
                let items: Vec<&Value> = match raw {
                    Value::Array(items) => items.iter().collect(),
                    other => vec![other],
                };
                let mut pks: Vec<u64> = Vec::with_capacity(items.len());
                for item in items {
                    let Some(pk) = parse_u64(item) else {
                        return Ok(Err(invalid_choice(item)));
                    };
                    if !self.related_exists(schema, pk).await? {
                        return Ok(Err(invalid_choice(pk)));
                    }
                    if !pks.contains(&pk) {
                        pks.push(pk);
                    }
                }
                Value::from(pks)
            }
        };

        if !schema.choices.is_empty() && schema.choice_label(&value).is_none() {
            return Ok(Err(invalid_choice(value_text(&value).unwrap_or_default())));
        }
        Ok(Ok(value))
    }

    /// Validates the named form fields of `input`.
    ///
    /// Fields missing from `input` fall back to `base`, the stored object on
    /// a change. Errors are recorded under `prefix` + field name.
    async fn clean(
        &self,
        admin: &ModelAdmin,
        names: &[String],
        input: &JsonObject,
        base: Option<&JsonObject>,
        prefix: &str,
        errors: &mut ValidationError,
    ) -> SpiderResult<JsonObject> {
        let mut cleaned = JsonObject::new();
        for name in names {
            let Some(schema) = admin.field(name) else {
                continue;
            };
            if !schema.is_editable() {
                continue;
            }
            let raw = input
                .get(name)
                .or_else(|| base.and_then(|b| b.get(name)))
                .unwrap_or(&Value::Null);
            match self.clean_value(schema, raw).await? {
                Ok(value) => {
                    cleaned.insert(name.clone(), value);
                }
                Err(message) => errors.add(format!("{prefix}{name}"), message),
            }
        }
        Ok(cleaned)
    }

    /// Validates the rows submitted under `inlines`, keyed by child model.
    async fn clean_inlines(
        &self,
        ctx: &AdminContext<'_>,
        parent: &ModelAdmin,
        input: Option<Value>,
        existing: Option<&Value>,
        errors: &mut ValidationError,
    ) -> SpiderResult<Vec<InlineOp>> {
        let Some(input) = input else {
            return Ok(Vec::new());
        };
        let Value::Object(input) = input else {
            return Err(SpiderError::BadRequest(
                "'inlines' must be an object keyed by model".into(),
            ));
        };
        let parent_pk = existing.and_then(|o| o.get(parent.pk_field())).cloned();

        let mut ops = Vec::new();
        for (key, rows) in input {
            let inline = parent
                .inlines
                .iter()
                .find(|i| i.model_key() == key)
                .ok_or_else(|| {
                    SpiderError::BadRequest(format!(
                        "'{key}' is not an inline of '{}'",
                        parent.model_key()
                    ))
                })?;
            let (child, fk, names) = self.inline_parts(parent, inline)?;
            let Value::Array(rows) = rows else {
                return Err(SpiderError::BadRequest(format!(
                    "inline rows of '{key}' must be an array"
                )));
            };
            let siblings = match &parent_pk {
                Some(pk) => self.inline_siblings(ctx, child, &fk, pk).await?,
                None => Vec::new(),
            };
            let child_pk_field = child.admin.pk_field();

            let mut kept = siblings.len();
            for (index, row) in rows.into_iter().enumerate() {
                let prefix = format!("{key}[{index}].");
                let Value::Object(row) = row else {
                    return Err(SpiderError::BadRequest(format!(
                        "inline row {prefix} must be an object"
                    )));
                };
                let row_pk = row.get(child_pk_field).filter(|v| !v.is_null()).and_then(value_text);
                let delete = row.get("DELETE").is_some_and(|v| json_matches(v, "true"));

                let base = match &row_pk {
                    Some(pk) => {
                        let Some(sibling) = siblings
                            .iter()
                            .find(|s| child.admin.object_pk(s).as_deref() == Some(pk.as_str()))
                        else {
                            errors.add(
                                format!("{prefix}{child_pk_field}"),
                                "This row does not belong to this object.",
                            );
                            continue;
                        };
                        sibling.as_object()
                    }
                    None => None,
                };

                if delete {
                    if row_pk.is_some() {
                        kept = kept.saturating_sub(1);
                        ops.push(InlineOp {
                            inline: inline.clone(),
                            fk: fk.clone(),
                            pk: row_pk,
                            delete: true,
                            data: JsonObject::new(),
                        });
                    }
                    continue;
                }
                if row_pk.is_none() && names.iter().all(|n| row.get(n).map_or(true, is_blank)) {
                    continue;
                }
                if row_pk.is_none() {
                    kept += 1;
                }

                let data = self
                    .clean(&child.admin, &names, &row, base, &prefix, errors)
                    .await?;
                ops.push(InlineOp {
                    inline: inline.clone(),
                    fk: fk.clone(),
                    pk: row_pk,
                    delete: false,
                    data,
                });
            }

            if let Some(max) = inline.max_num {
                if kept > max {
                    errors.add(key.clone(), format!("Please submit at most {max} forms."));
                }
            }
        }
        Ok(ops)
    }

    async fn apply_inline(
        &self,
        ctx: &AdminContext<'_>,
        parent: &Registration,
        saved_parent: &Value,
        op: InlineOp,
    ) -> SpiderResult<()> {
        let (child, _, _) = self.inline_parts(&parent.admin, &op.inline)?;
        let child_admin = &child.admin;
        let child_key = child_admin.model_key();
        let user_id = ctx.user.id;

        if op.delete {
            if let Some(pk) = &op.pk {
                let repr = match self.db.get_object(child_admin, pk).await? {
                    Some(obj) => child_admin.object_repr(&obj),
                    None => return Ok(()),
                };
                if self.db.delete_object(child_admin, pk).await? {
                    self.log
                        .record(user_id, ActionFlag::Deletion, &child_key, pk, &repr, "");
                }
            }
            return Ok(());
        }

        let mut data = op.data;
        let parent_pk = saved_parent
            .get(parent.admin.pk_field())
            .cloned()
            .unwrap_or(Value::Null);
        data.insert(op.fk, parent_pk);
        let change = op.pk.is_some();
        if !change {
            for field in &child_admin.fields_schema {
                let text = matches!(field.field_type, FieldType::CharField | FieldType::TextField);
                if text && field.default.is_none() && !data.contains_key(&field.name) {
                    data.insert(field.name.clone(), Value::String(String::new()));
                }
            }
        }
        parent
            .hooks
            .save_inline(ctx, &op.inline, &mut data, change)
            .await?;

        match op.pk {
            Some(pk) => {
                let saved = self.db.update_object(child_admin, &pk, data).await?;
                self.log.record(
                    user_id,
                    ActionFlag::Change,
                    &child_key,
                    &pk,
                    &child_admin.object_repr(&saved),
                    "Changed via inline.",
                );
            }
            None => {
                let saved = self.db.create_object(child_admin, data).await?;
                self.log.record(
                    user_id,
                    ActionFlag::Addition,
                    &child_key,
                    &child_admin.object_pk(&saved).unwrap_or_default(),
                    &child_admin.object_repr(&saved),
                    "Added via inline.",
                );
            }
        }
        Ok(())
    }

    /// Creates (`pk` is `None`) or changes an object from a submitted form.
    ///
    /// Keys outside the form fields are dropped. Inline rows go under
    /// `"inlines": {"app.model": [{...}, ...]}`; a row with the child's
    /// primary key changes that child, one with `"DELETE": true` deletes it,
    /// and one without a primary key is created. Nothing is written unless
    /// the parent and every inline row validate.
    pub async fn save(
        &self,
        user: &AdminUser,
        app: &str,
        model: &str,
        pk: Option<&str>,
        body: Value,
    ) -> SpiderResult<Value> {
        let reg = self.registration(app, model)?;
        let admin = &reg.admin;
        let ctx = self.context(user);
        let Value::Object(mut body) = body else {
            return Err(SpiderError::BadRequest("expected a JSON object".into()));
        };

        let existing = match pk {
            Some(pk) => Some(self.visible_object(&ctx, reg, pk).await?),
            None => None,
        };
        let inline_input = body.remove("inlines");

        let mut errors = ValidationError::default();
        let base = existing.as_ref().and_then(Value::as_object);
        let mut data = self
            .clean(admin, &admin.form_fields(), &body, base, "", &mut errors)
            .await?;
        let inline_ops = self
            .clean_inlines(&ctx, admin, inline_input, existing.as_ref(), &mut errors)
            .await?;
        errors.into_result()?;

        let change = existing.is_some();
        reg.hooks.save_model(&ctx, &mut data, change).await?;

        let model_key = admin.model_key();
        let saved = match (pk, &existing) {
            (Some(pk), Some(before)) => {
                let changed = changed_fields(before, &data);
                let saved = self.db.update_object(admin, pk, data).await?;
                let message = if changed.is_empty() {
                    "No fields changed.".to_string()
                } else {
                    format!("Changed {}.", changed.join(", "))
                };
                self.log.record(
                    user.id,
                    ActionFlag::Change,
                    &model_key,
                    pk,
                    &admin.object_repr(&saved),
                    &message,
                );
                saved
            }
            _ => {
                let saved = self.db.create_object(admin, data).await?;
                self.log.record(
                    user.id,
                    ActionFlag::Addition,
                    &model_key,
                    &admin.object_pk(&saved).unwrap_or_default(),
                    &admin.object_repr(&saved),
                    "Added.",
                );
                saved
            }
        };
        tracing::info!(
            model = %model_key,
            pk = ?admin.object_pk(&saved),
            change,
            "admin object saved"
        );

        for op in inline_ops {
            self.apply_inline(&ctx, reg, &saved, op).await?;
        }
        Ok(saved)
    }

    /// Deletes a visible object.
    pub async fn delete(
        &self,
        user: &AdminUser,
        app: &str,
        model: &str,
        pk: &str,
    ) -> SpiderResult<()> {
        let reg = self.registration(app, model)?;
        let admin = &reg.admin;
        let ctx = self.context(user);
        let obj = self.visible_object(&ctx, reg, pk).await?;

        if !self.db.delete_object(admin, pk).await? {
            return Err(SpiderError::NotFound(format!(
                "{} with pk '{pk}' does not exist",
                admin.model_key()
            )));
        }
        self.log.record(
            user.id,
            ActionFlag::Deletion,
            &admin.model_key(),
            pk,
            &admin.object_repr(&obj),
            "",
        );
        tracing::info!(model = %admin.model_key(), pk, "admin object deleted");
        Ok(())
    }

    /// Runs a bulk action over the selected objects that are visible to the user.
    pub async fn run_action(
        &self,
        user: &AdminUser,
        app: &str,
        model: &str,
        request: &ActionRequest,
    ) -> SpiderResult<ActionResult> {
        let reg = self.registration(app, model)?;
        let admin = &reg.admin;
        let ctx = self.context(user);
        let action = self.actions.get(&request.action)?;

        let wanted: Vec<String> = request.ids.iter().filter_map(value_text).collect();
        let selected: Vec<Value> = self
            .queryset(&ctx, reg)
            .await?
            .into_iter()
            .filter(|obj| admin.object_pk(obj).is_some_and(|pk| wanted.contains(&pk)))
            .collect();

        let result = action.execute(&ctx, admin, selected).await?;
        tracing::info!(
            model = %admin.model_key(),
            action = %request.action,
            affected = result.affected_count,
            "admin action run"
        );
        Ok(result)
    }
}
