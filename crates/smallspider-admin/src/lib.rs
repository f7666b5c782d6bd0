//! # smallspider-admin
//!
//! The admin site behind SmallSpider. Models are registered on an
//! [`AdminSite`](site::AdminSite) with a declarative
//! [`ModelAdmin`](model_admin::ModelAdmin) configuration and a
//! [`ModelAdminHooks`](hooks::ModelAdminHooks) implementation; the site then
//! serves change lists, add/change forms, deletes and bulk actions as JSON.

pub mod actions;
pub mod api;
pub mod auth;
pub mod checks;
pub mod db;
pub mod filters;
pub mod hooks;
pub mod html;
pub mod log_entry;
pub mod model_admin;
pub mod site;
pub mod urls;
pub mod views;

pub use hooks::{AdminContext, DefaultHooks, JsonObject, ModelAdminHooks};
pub use model_admin::ModelAdmin;
pub use site::AdminSite;
