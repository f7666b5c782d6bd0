//! Per-model behaviour hooks.
//!
//! [`ModelAdmin`](crate::model_admin::ModelAdmin) only describes layout. Anything
//! that depends on the requesting user or on other stored data lives behind
//! [`ModelAdminHooks`], which the site calls at fixed points of every request:
//!
//! - [`get_queryset`](ModelAdminHooks::get_queryset) before any listing,
//!   lookup, delete or action, so hidden objects behave as if absent.
//! - [`save_model`](ModelAdminHooks::save_model) after validation and before
//!   the object is written.
//! - [`save_inline`](ModelAdminHooks::save_inline) before each inline row is written.
//! - [`display_column`](ModelAdminHooks::display_column) for change list
//!   columns that are not stored fields.

use async_trait::async_trait;
use serde_json::Value;
use smallspider_core::SpiderResult;

use crate::auth::AdminUser;
use crate::db::AdminDbExecutor;
use crate::log_entry::LogEntryStore;
use crate::model_admin::InlineAdmin;
use crate::urls::AdminUrls;

/// A JSON object as submitted by a form or held by the store.
pub type JsonObject = serde_json::Map<String, Value>;

/// Everything a hook may consult while handling one request.
#[derive(Clone, Copy)]
pub struct AdminContext<'a> {
    /// The authenticated user making the request.
    pub user: &'a AdminUser,
    /// The object store.
    pub db: &'a dyn AdminDbExecutor,
    /// URL reversing for the site's namespace.
    pub urls: &'a AdminUrls,
    /// The audit trail.
    pub log: &'a dyn LogEntryStore,
}

impl AdminContext<'_> {
    /// The requesting user's primary key as a JSON value.
    pub fn user_pk(&self) -> Value {
        Value::from(self.user.id)
    }
}

/// Hooks customizing how one registered model behaves.
///
/// Every method has a default that leaves the request untouched, so an
/// implementation only overrides what it needs.
#[async_trait]
pub trait ModelAdminHooks: Send + Sync {
    /// Adjusts `obj` just before it is written. `change` is `false` on creation.
    async fn save_model(
        &self,
        _ctx: &AdminContext<'_>,
        _obj: &mut JsonObject,
        _change: bool,
    ) -> SpiderResult<()> {
        Ok(())
    }

    /// Restricts the objects the admin may see for the requesting user.
    async fn get_queryset(
        &self,
        _ctx: &AdminContext<'_>,
        objects: Vec<Value>,
    ) -> SpiderResult<Vec<Value>> {
        Ok(objects)
    }

    /// Computes the value of a change list column that is not a stored field.
    ///
    /// Returns `None` for columns this model does not compute.
    async fn display_column(
        &self,
        _ctx: &AdminContext<'_>,
        _column: &str,
        _obj: &Value,
    ) -> SpiderResult<Option<Value>> {
        Ok(None)
    }

    /// Adjusts an inline row just before it is written.
    async fn save_inline(
        &self,
        _ctx: &AdminContext<'_>,
        _inline: &InlineAdmin,
        _obj: &mut JsonObject,
        _change: bool,
    ) -> SpiderResult<()> {
        Ok(())
    }
}

/// Hooks that keep every default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl ModelAdminHooks for DefaultHooks {}
