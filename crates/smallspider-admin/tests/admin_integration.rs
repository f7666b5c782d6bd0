//! Integration tests for the admin site: owner scoping through hooks, form
//! validation, change lists, inline editing, actions and the HTTP router.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use smallspider_admin::api::{ActionRequest, LoginRequest};
use smallspider_admin::auth::AdminUser;
use smallspider_admin::checks::USER_MODEL;
use smallspider_admin::db::AdminDbExecutor;
use smallspider_admin::log_entry::ActionFlag;
use smallspider_admin::model_admin::{
    Choice, FieldSchema, FieldType, InlineAdmin, InlineType, ModelAdmin,
};
use smallspider_admin::views::AdminState;
use smallspider_admin::{AdminContext, AdminSite, JsonObject, ModelAdminHooks};
use smallspider_core::{AdminSettings, SpiderError, SpiderResult};
use tower::ServiceExt;

// ── Helpers ─────────────────────────────────────────────────────────

/// Stamps and scopes objects by their `owner` field.
struct OwnedHooks;

#[async_trait]
impl ModelAdminHooks for OwnedHooks {
    async fn save_model(
        &self,
        ctx: &AdminContext<'_>,
        obj: &mut JsonObject,
        change: bool,
    ) -> SpiderResult<()> {
        if !change {
            obj.insert("owner".to_string(), ctx.user_pk());
        }
        Ok(())
    }

    async fn get_queryset(
        &self,
        ctx: &AdminContext<'_>,
        objects: Vec<Value>,
    ) -> SpiderResult<Vec<Value>> {
        let me = ctx.user_pk();
        Ok(objects.into_iter().filter(|o| o["owner"] == me).collect())
    }

    async fn display_column(
        &self,
        ctx: &AdminContext<'_>,
        column: &str,
        obj: &Value,
    ) -> SpiderResult<Option<Value>> {
        if column != "note_count" {
            return Ok(None);
        }
        let notes = ctx.db.objects_where("notes.note", "folder", &obj["id"]).await?;
        Ok(Some(Value::from(notes.len())))
    }

    async fn save_inline(
        &self,
        ctx: &AdminContext<'_>,
        _inline: &InlineAdmin,
        obj: &mut JsonObject,
        _change: bool,
    ) -> SpiderResult<()> {
        obj.insert("owner".to_string(), ctx.user_pk());
        Ok(())
    }
}

fn folder_admin() -> ModelAdmin {
    ModelAdmin::new("notes", "folder")
        .str_field("name")
        .fields_schema(vec![
            FieldSchema::new("id", FieldType::BigAutoField).primary_key(),
            FieldSchema::new("name", FieldType::CharField).max_length(20),
            FieldSchema::new("owner", FieldType::ForeignKey).relation(USER_MODEL),
        ])
        .list_display(vec!["name", "note_count"])
        .display_column("note_count", "Notes")
        .fields(vec!["name"])
        .inlines(vec![InlineAdmin::new("notes", "note", InlineType::Tabular)
            .fields(vec!["title", "body"])
            .extra(1)])
}

fn label_admin() -> ModelAdmin {
    ModelAdmin::new("notes", "label")
        .str_field("name")
        .fields_schema(vec![
            FieldSchema::new("id", FieldType::BigAutoField).primary_key(),
            FieldSchema::new("name", FieldType::CharField).max_length(10),
        ])
        .fields(vec!["name"])
}

fn note_admin() -> ModelAdmin {
    ModelAdmin::new("notes", "note")
        .str_field("title")
        .fields_schema(vec![
            FieldSchema::new("id", FieldType::BigAutoField).primary_key(),
            FieldSchema::new("title", FieldType::CharField).max_length(30),
            FieldSchema::new("body", FieldType::TextField).optional(),
            FieldSchema::new("status", FieldType::PositiveIntegerField)
                .choices(vec![Choice::new(1, "Active"), Choice::new(0, "Archived")])
                .default_value(1),
            FieldSchema::new("folder", FieldType::ForeignKey).relation("notes.folder"),
            FieldSchema::new("labels", FieldType::ManyToManyField)
                .relation("notes.label")
                .optional(),
            FieldSchema::new("owner", FieldType::ForeignKey).relation(USER_MODEL),
            FieldSchema::new("created", FieldType::DateTimeField).auto_now_add(),
        ])
        .list_display(vec!["title", "folder", "status", "labels"])
        .list_filter_fields(vec!["status", "folder"])
        .search_fields(vec!["title", "folder__name"])
        .exclude(vec!["owner"])
        .list_per_page(2)
}

struct Fixture {
    state: Arc<AdminState>,
    alice: AdminUser,
    bob: AdminUser,
}

async fn fixture() -> Fixture {
    let mut site = AdminSite::new(AdminSettings::default());
    site.register(folder_admin(), OwnedHooks);
    site.register(label_admin(), smallspider_admin::DefaultHooks);
    site.register(note_admin(), OwnedHooks);
    let alice = site.users().create_user("alice", "pw-a", true, false).await.unwrap();
    let bob = site.users().create_user("bob", "pw-b", true, false).await.unwrap();
    assert!(site.check().is_empty(), "{:?}", site.check());
    Fixture {
        state: site.into_state(),
        alice,
        bob,
    }
}

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn field_errors(err: SpiderError) -> Vec<String> {
    match err {
        SpiderError::Validation(v) => v.field_errors.keys().cloned().collect(),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

async fn seed(f: &Fixture) {
    let s = &f.state;
    s.save(&f.alice, "notes", "folder", None, json!({"name": "Work"})).await.unwrap();
    s.save(&f.bob, "notes", "folder", None, json!({"name": "Home"})).await.unwrap();
    s.save(&f.alice, "notes", "label", None, json!({"name": "urgent"})).await.unwrap();
    s.save(&f.alice, "notes", "label", None, json!({"name": "later"})).await.unwrap();
    for (title, status) in [("Quarterly plan", 1), ("Budget", 0), ("Hiring plan", 1)] {
        s.save(
            &f.alice,
            "notes",
            "note",
            None,
            json!({"title": title, "folder": 1, "status": status, "labels": [1, 2]}),
        )
        .await
        .unwrap();
    }
    s.save(&f.bob, "notes", "note", None, json!({"title": "Groceries", "folder": 2}))
        .await
        .unwrap();
}

// ═════════════════════════════════════════════════════════════════════
// Saving
// ═════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_stamps_owner_and_logs() {
    let f = fixture().await;
    let folder = f
        .state
        .save(&f.alice, "notes", "folder", None, json!({"name": "  Work  ", "owner": 99}))
        .await
        .unwrap();
    assert_eq!(folder["name"], "Work");
    assert_eq!(folder["owner"], f.alice.id);

    let log = f.state.recent_log(&f.alice);
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action_flag, ActionFlag::Addition);
    assert_eq!(log[0].object_repr, "Work");
    assert_eq!(log[0].change_message, "Added.");
}

#[tokio::test]
async fn test_create_fills_defaults() {
    let f = fixture().await;
    seed(&f).await;
    let notes = f.state.changelist(&f.bob, "notes", "note", &params(&[])).await.unwrap();
    let groceries = &notes.list.results[0];
    assert_eq!(groceries.cells["status"], "Active");
    assert_eq!(groceries.cells["labels"], "");
}

#[tokio::test]
async fn test_validation_errors_are_collected() {
    let f = fixture().await;
    seed(&f).await;
    let err = f
        .state
        .save(
            &f.alice,
            "notes",
            "note",
            None,
            json!({
                "title": "x".repeat(31),
                "status": 7,
                "folder": 42,
                "labels": [1, 9],
            }),
        )
        .await
        .unwrap_err();
    assert_eq!(field_errors(err), vec!["folder", "labels", "status", "title"]);

    let err = f
        .state
        .save(&f.alice, "notes", "note", None, json!({"folder": 1}))
        .await
        .unwrap_err();
    assert_eq!(field_errors(err), vec!["title"]);
}

#[tokio::test]
async fn test_non_object_body_is_rejected() {
    let f = fixture().await;
    let err = f
        .state
        .save(&f.alice, "notes", "folder", None, json!(["Work"]))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_change_merges_and_logs_changed_fields() {
    let f = fixture().await;
    seed(&f).await;
    let saved = f
        .state
        .save(&f.alice, "notes", "note", Some("1"), json!({"title": "Annual plan"}))
        .await
        .unwrap();
    assert_eq!(saved["title"], "Annual plan");
    assert_eq!(saved["labels"], json!([1, 2]));
    assert_eq!(saved["owner"], f.alice.id);

    let log = f.state.recent_log(&f.alice);
    assert_eq!(log[0].action_flag, ActionFlag::Change);
    assert_eq!(log[0].change_message, "Changed title.");

    f.state
        .save(&f.alice, "notes", "note", Some("1"), json!({}))
        .await
        .unwrap();
    assert_eq!(f.state.recent_log(&f.alice)[0].change_message, "No fields changed.");
}

// ═════════════════════════════════════════════════════════════════════
// Owner scoping
// ═════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_other_users_objects_are_invisible() {
    let f = fixture().await;
    seed(&f).await;
    let s = &f.state;

    let bobs = s.changelist(&f.bob, "notes", "note", &params(&[])).await.unwrap();
    assert_eq!(bobs.list.count, 1);
    assert_eq!(bobs.list.results[0].cells["title"], "Groceries");

    for result in [
        s.change_form(&f.bob, "notes", "note", Some("1")).await.err(),
        s.save(&f.bob, "notes", "note", Some("1"), json!({"title": "mine"})).await.err(),
        s.delete(&f.bob, "notes", "note", "1").await.err(),
    ] {
        assert_eq!(result.unwrap().status_code(), 404);
    }

    let request = ActionRequest {
        action: "delete_selected".to_string(),
        ids: vec![json!(1), json!(4)],
    };
    let result = s.run_action(&f.bob, "notes", "note", &request).await.unwrap();
    assert_eq!(result.affected_count, 1);
    assert_eq!(s.changelist(&f.alice, "notes", "note", &params(&[])).await.unwrap().list.count, 3);
}

// ═════════════════════════════════════════════════════════════════════
// Change list
// ═════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_changelist_display_values() {
    let f = fixture().await;
    seed(&f).await;
    let list = f
        .state
        .changelist(&f.alice, "notes", "note", &params(&[("o", "title")]))
        .await
        .unwrap();
    assert_eq!(list.list.count, 3);
    assert_eq!(list.list.total_pages, 2);
    let first = &list.list.results[0];
    assert_eq!(first.cells["title"], "Budget");
    assert_eq!(first.cells["folder"], "Work");
    assert_eq!(first.cells["status"], "Archived");
    assert_eq!(first.cells["labels"], "urgent, later");
    assert_eq!(first.url, "/admin/notes/note/2/change/");
    assert!(list.columns[0].link);
    assert!(!list.columns[1].link);
    assert_eq!(list.actions[0].name, "delete_selected");

    let folders = f
        .state
        .changelist(&f.alice, "notes", "folder", &params(&[]))
        .await
        .unwrap();
    assert_eq!(folders.list.results[0].cells["note_count"], 3);
    assert_eq!(folders.columns[1].label, "Notes");
}

#[tokio::test]
async fn test_changelist_search_filter_and_paging() {
    let f = fixture().await;
    seed(&f).await;
    let s = &f.state;

    let found = s
        .changelist(&f.alice, "notes", "note", &params(&[("q", "plan")]))
        .await
        .unwrap();
    assert_eq!(found.list.count, 2);

    let by_folder = s
        .changelist(&f.alice, "notes", "note", &params(&[("q", "work budget")]))
        .await
        .unwrap();
    assert_eq!(by_folder.list.count, 1);

    let archived = s
        .changelist(&f.alice, "notes", "note", &params(&[("status", "0")]))
        .await
        .unwrap();
    assert_eq!(archived.list.count, 1);
    let status_filter = &archived.filters[0];
    assert_eq!(status_filter.selected.as_deref(), Some("0"));
    assert_eq!(status_filter.choices.len(), 2);
    assert_eq!(archived.filters[1].choices[0].display, "Work");

    let page_two = s
        .changelist(&f.alice, "notes", "note", &params(&[("p", "2")]))
        .await
        .unwrap();
    assert_eq!(page_two.list.results.len(), 1);
    assert_eq!(page_two.list.results[0].pk, "1");
}

#[tokio::test]
async fn test_changelist_rejects_bad_parameters() {
    let f = fixture().await;
    for pairs in [[("colour", "red")], [("o", "nope")], [("p", "two")]] {
        let err = f
            .state
            .changelist(&f.alice, "notes", "note", &params(&pairs))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400, "{pairs:?}");
    }
}

// ═════════════════════════════════════════════════════════════════════
// Change form and inlines
// ═════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_change_form_layout() {
    let f = fixture().await;
    seed(&f).await;
    let form = f
        .state
        .change_form(&f.alice, "notes", "note", None)
        .await
        .unwrap();
    assert_eq!(form.title, "Add note");
    let names: Vec<&str> = form.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["title", "body", "status", "folder", "labels"]);
    let folder = form.fields.iter().find(|f| f.name == "folder").unwrap();
    assert_eq!(folder.choices.len(), 2);
    assert!(form.delete_url.is_none());

    let form = f
        .state
        .change_form(&f.alice, "notes", "folder", Some("1"))
        .await
        .unwrap();
    assert_eq!(form.title, "Change folder");
    assert_eq!(form.delete_url.as_deref(), Some("/admin/notes/folder/1/delete/"));
    let inline = &form.inlines[0];
    assert_eq!(inline.fk_name, "folder");
    assert_eq!(inline.rows.len(), 3);
    assert_eq!(inline.extra, 1);
    assert!(inline.rows[0].get("status").is_none());
}

#[tokio::test]
async fn test_inline_rows_are_saved_with_the_parent() {
    let f = fixture().await;
    let s = &f.state;
    let folder = s
        .save(
            &f.alice,
            "notes",
            "folder",
            None,
            json!({
                "name": "Trips",
                "inlines": {"notes.note": [
                    {"title": "Lisbon", "body": "May"},
                    {"title": "", "body": ""},
                ]},
            }),
        )
        .await
        .unwrap();
    assert_eq!(folder["id"], 1);

    let notes = s.changelist(&f.alice, "notes", "note", &params(&[])).await.unwrap();
    assert_eq!(notes.list.count, 1);
    let form = s.change_form(&f.alice, "notes", "folder", Some("1")).await.unwrap();
    let row = &form.inlines[0].rows[0];
    assert_eq!(row["title"], "Lisbon");
    assert_eq!(row["folder"], 1);

    s.save(
        &f.alice,
        "notes",
        "folder",
        Some("1"),
        json!({"inlines": {"notes.note": [
            {"id": 1, "DELETE": true},
            {"title": "Porto"},
        ]}}),
    )
    .await
    .unwrap();
    let titles: Vec<Value> = s
        .changelist(&f.alice, "notes", "note", &params(&[]))
        .await
        .unwrap()
        .list
        .results
        .into_iter()
        .map(|r| r.cells["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("Porto")]);
}

#[tokio::test]
async fn test_inline_rows_follow_the_child_queryset() {
    let f = fixture().await;
    seed(&f).await;
    let s = &f.state;
    let sneaky = s
        .save(&f.bob, "notes", "note", None, json!({"title": "Sneaky", "folder": 1}))
        .await
        .unwrap();
    assert_eq!(sneaky["id"], 5);

    let form = s.change_form(&f.alice, "notes", "folder", Some("1")).await.unwrap();
    let ids: Vec<&Value> = form.inlines[0].rows.iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, vec![&json!(1), &json!(2), &json!(3)]);

    let err = s
        .save(
            &f.alice,
            "notes",
            "folder",
            Some("1"),
            json!({"inlines": {"notes.note": [{"id": 5, "DELETE": true}]}}),
        )
        .await
        .unwrap_err();
    assert_eq!(field_errors(err), vec!["notes.note[0].id"]);
    let visible = s.changelist(&f.bob, "notes", "note", &params(&[])).await.unwrap();
    assert_eq!(visible.list.count, 2);
}

#[tokio::test]
async fn test_inline_errors_block_the_whole_save() {
    let f = fixture().await;
    let err = f
        .state
        .save(
            &f.alice,
            "notes",
            "folder",
            None,
            json!({
                "name": "Trips",
                "inlines": {"notes.note": [{"body": "no title"}, {"id": 7, "title": "x"}]},
            }),
        )
        .await
        .unwrap_err();
    assert_eq!(
        field_errors(err),
        vec!["notes.note[0].title", "notes.note[1].id"]
    );
    assert!(f.state.recent_log(&f.alice).is_empty());
}

// ═════════════════════════════════════════════════════════════════════
// Index, delete and log
// ═════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_index_groups_models_by_app() {
    let f = fixture().await;
    let index = f.state.index(&f.alice);
    assert_eq!(index.username, "alice");
    assert_eq!(index.apps.len(), 1);
    let names: Vec<&str> = index.apps[0].models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["folder", "label", "note"]);
    assert_eq!(index.apps[0].models[0].changelist_url, "/admin/notes/folder/");
}

#[tokio::test]
async fn test_delete_logs_and_removes() {
    let f = fixture().await;
    seed(&f).await;
    f.state.delete(&f.alice, "notes", "note", "2").await.unwrap();
    let entry = &f.state.recent_log(&f.alice)[0];
    assert_eq!(entry.action_flag, ActionFlag::Deletion);
    assert_eq!(entry.object_repr, "Budget");
    assert_eq!(
        f.state.delete(&f.alice, "notes", "note", "2").await.unwrap_err().status_code(),
        404
    );
}

// ═════════════════════════════════════════════════════════════════════
// HTTP
// ═════════════════════════════════════════════════════════════════════

async fn call(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn http_site() -> axum::Router {
    let mut site = AdminSite::new(AdminSettings::default());
    site.register(folder_admin(), OwnedHooks);
    site.register(note_admin(), OwnedHooks);
    site.register(label_admin(), smallspider_admin::DefaultHooks);
    site.users().create_user("alice", "pw-a", true, false).await.unwrap();
    site.users().create_user("reader", "pw-r", false, false).await.unwrap();
    site.into_axum_router()
}

async fn login(router: &axum::Router, username: &str, password: &str) -> (StatusCode, Value) {
    let body = serde_json::to_value(LoginRequest {
        username: username.to_string(),
        password: password.to_string(),
    })
    .unwrap();
    call(router, json_request("POST", "/admin/login/", None, &body)).await
}

#[tokio::test]
async fn test_http_login_rules() {
    let router = http_site().await;
    assert_eq!(login(&router, "alice", "wrong").await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(login(&router, "reader", "pw-r").await.0, StatusCode::FORBIDDEN);
    let (status, body) = login(&router, "alice", "pw-a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_http_crud_round() {
    let router = http_site().await;
    let (_, body) = login(&router, "alice", "pw-a").await;
    let token = body["token"].as_str().unwrap().to_string();
    let token = Some(token.as_str());

    let (status, folder) = call(
        &router,
        json_request("POST", "/admin/notes/folder/add/", token, &json!({"name": "Work"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(folder["owner"], 1);

    let (status, body) = call(
        &router,
        json_request("POST", "/admin/notes/note/add/", token, &json!({"folder": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["title"][0], "This field is required.");

    let (status, note) = call(
        &router,
        json_request(
            "POST",
            "/admin/notes/note/add/",
            token,
            &json!({"title": "Plan", "folder": 1}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, form) = call(
        &router,
        json_request("GET", "/admin/notes/note/1/change/", token, &Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["object"], note);

    let (status, changed) = call(
        &router,
        json_request("POST", "/admin/notes/note/1/change/", token, &json!({"status": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed["status"], 0);

    let (status, result) = call(
        &router,
        json_request(
            "POST",
            "/admin/notes/note/action/",
            token,
            &json!({"action": "delete_selected", "ids": [1]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["message"], "Successfully deleted 1 note.");

    let (status, _) = call(
        &router,
        json_request("POST", "/admin/notes/folder/1/delete/", token, &Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, log) =
        call(&router, json_request("GET", "/admin/log/", token, &Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    let flags: Vec<&str> = log
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action_flag"].as_str().unwrap())
        .collect();
    assert_eq!(flags, vec!["deletion", "deletion", "change", "addition", "addition"]);
}

#[tokio::test]
async fn test_http_logout_revokes_token() {
    let router = http_site().await;
    let (_, body) = login(&router, "alice", "pw-a").await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = call(
        &router,
        json_request("POST", "/admin/logout/", Some(&token), &Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) =
        call(&router, json_request("GET", "/admin/", Some(&token), &Value::Null)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
