//! Bulk actions on selected change list rows.
//!
//! The site passes an action only the selected objects that survived the
//! model's `get_queryset` hook, so an action can never reach rows the user
//! is not allowed to see.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallspider_core::{SpiderError, SpiderResult};

use crate::hooks::AdminContext;
use crate::log_entry::ActionFlag;
use crate::model_admin::ModelAdmin;

/// The outcome of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the action did anything.
    pub success: bool,
    /// A message for the user.
    pub message: String,
    /// The number of objects affected.
    pub affected_count: usize,
}

impl ActionResult {
    /// Creates a successful result.
    pub fn success(message: impl Into<String>, affected_count: usize) -> Self {
        Self {
            success: true,
            message: message.into(),
            affected_count,
        }
    }

    /// Creates a result for an action that did nothing.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            affected_count: 0,
        }
    }
}

/// An action applicable to the selected objects of a change list.
#[async_trait]
pub trait AdminAction: Send + Sync {
    /// The identifier submitted by the client.
    fn name(&self) -> &str;

    /// A human-readable description.
    fn description(&self) -> &str;

    /// Runs the action over `selected`, which holds full stored objects.
    async fn execute(
        &self,
        ctx: &AdminContext<'_>,
        admin: &ModelAdmin,
        selected: Vec<Value>,
    ) -> SpiderResult<ActionResult>;
}

/// Deletes the selected objects, logging each deletion.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteSelectedAction;

#[async_trait]
impl AdminAction for DeleteSelectedAction {
    fn name(&self) -> &'static str {
        "delete_selected"
    }

    fn description(&self) -> &'static str {
        "Delete selected objects"
    }

    async fn execute(
        &self,
        ctx: &AdminContext<'_>,
        admin: &ModelAdmin,
        selected: Vec<Value>,
    ) -> SpiderResult<ActionResult> {
        if selected.is_empty() {
            return Ok(ActionResult::failure("No objects selected."));
        }

        let model_key = admin.model_key();
        let mut deleted = 0;
        for obj in &selected {
            let Some(pk) = admin.object_pk(obj) else {
                continue;
            };
            if ctx.db.delete_object(admin, &pk).await? {
                ctx.log.record(
                    ctx.user.id,
                    ActionFlag::Deletion,
                    &model_key,
                    &pk,
                    &admin.object_repr(obj),
                    "",
                );
                deleted += 1;
            }
        }

        Ok(ActionResult::success(
            format!(
                "Successfully deleted {deleted} {}.",
                if deleted == 1 {
                    &admin.verbose_name
                } else {
                    &admin.verbose_name_plural
                }
            ),
            deleted,
        ))
    }
}

/// The actions offered by a site.
#[derive(Clone)]
pub struct ActionRegistry {
    actions: Vec<Arc<dyn AdminAction>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    /// Creates a registry holding `delete_selected`.
    pub fn new() -> Self {
        Self {
            actions: vec![Arc::new(DeleteSelectedAction)],
        }
    }

    /// Adds an action.
    pub fn register(&mut self, action: impl AdminAction + 'static) {
        self.actions.push(Arc::new(action));
    }

    /// `(name, description)` of every action, in registration order.
    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.actions
            .iter()
            .map(|a| (a.name().to_string(), a.description().to_string()))
            .collect()
    }

    /// Looks up an action by name.
    pub fn get(&self, name: &str) -> SpiderResult<Arc<dyn AdminAction>> {
        self.actions
            .iter()
            .find(|a| a.name() == name)
            .cloned()
            .ok_or_else(|| SpiderError::BadRequest(format!("Unknown action '{name}'")))
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.actions.iter().map(|a| a.name()).collect();
        f.debug_struct("ActionRegistry")
            .field("actions", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AdminUser;
    use crate::db::{AdminDbExecutor, InMemoryAdminDb};
    use crate::log_entry::{InMemoryLogEntryStore, LogEntryStore};
    use crate::urls::AdminUrls;
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl AdminAction for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }
        fn description(&self) -> &'static str {
            "Do nothing"
        }
        async fn execute(
            &self,
            _ctx: &AdminContext<'_>,
            _admin: &ModelAdmin,
            selected: Vec<Value>,
        ) -> SpiderResult<ActionResult> {
            Ok(ActionResult::success("ok", selected.len()))
        }
    }

    #[test]
    fn test_registry_defaults_and_lookup() {
        let mut registry = ActionRegistry::new();
        registry.register(Noop);
        let names: Vec<String> = registry.descriptions().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["delete_selected", "noop"]);
        assert!(registry.get("noop").is_ok());
        assert_eq!(registry.get("missing").err().unwrap().status_code(), 400);
    }

    #[tokio::test]
    async fn test_delete_selected_deletes_and_logs() {
        let db = InMemoryAdminDb::new();
        db.load_fixture(&json!({"blog.tag": [
            {"id": 1, "name": "a"}, {"id": 2, "name": "b"}, {"id": 3, "name": "c"}
        ]}))
        .unwrap();
        let admin = ModelAdmin::new("blog", "tag").str_field("name");
        let user = AdminUser::new(1, "alice");
        let urls = AdminUrls::new("cus_admin", "/admin");
        let log = InMemoryLogEntryStore::new();
        let ctx = AdminContext {
            user: &user,
            db: &db,
            urls: &urls,
            log: &log,
        };

        let selected = db.all_objects("blog.tag").await.unwrap()[..2].to_vec();
        let result = DeleteSelectedAction
            .execute(&ctx, &admin, selected)
            .await
            .unwrap();
        assert_eq!(result.affected_count, 2);
        assert_eq!(result.message, "Successfully deleted 2 tags.");
        assert_eq!(db.count("blog.tag").unwrap(), 1);

        let entries = log.recent_for_user(1, 10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].object_repr, "b");
    }

    #[tokio::test]
    async fn test_delete_selected_nothing_selected() {
        let db = InMemoryAdminDb::new();
        let user = AdminUser::new(1, "alice");
        let urls = AdminUrls::new("cus_admin", "/admin");
        let log = InMemoryLogEntryStore::new();
        let ctx = AdminContext {
            user: &user,
            db: &db,
            urls: &urls,
            log: &log,
        };
        let result = DeleteSelectedAction
            .execute(&ctx, &ModelAdmin::new("blog", "tag"), Vec::new())
            .await
            .unwrap();
        assert!(!result.success);
    }
}
