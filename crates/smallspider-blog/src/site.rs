//! The `cus_admin` site serving the blog.

use std::sync::Arc;

use smallspider_admin::auth::UserRegistry;
use smallspider_admin::db::InMemoryAdminDb;
use smallspider_admin::AdminSite;
use smallspider_core::{AdminSettings, Settings, SpiderResult};

use crate::admin::{
    category_admin, post_admin, tag_admin, CategoryHooks, PostHooks, TagHooks,
};

/// Builds the admin site with the three blog models registered.
///
/// # Examples
///
/// ```
/// use smallspider_blog::custom_site;
/// use smallspider_core::AdminSettings;
///
/// let site = custom_site(&AdminSettings::default());
/// assert_eq!(site.registered_models(), vec!["blog.category", "blog.post", "blog.tag"]);
/// assert_eq!(site.urls().namespace(), "cus_admin");
/// ```
pub fn custom_site(settings: &AdminSettings) -> AdminSite {
    let mut site = AdminSite::new(settings.clone());
    register_blog(&mut site);
    site
}

fn register_blog(site: &mut AdminSite) {
    site.register(category_admin(), CategoryHooks);
    site.register(tag_admin(), TagHooks);
    site.register(post_admin(), PostHooks);
}

/// Builds the site the server runs: seeded accounts, the optional fixture
/// and the blog registrations.
pub async fn bootstrap(settings: &Settings) -> SpiderResult<AdminSite> {
    let db = InMemoryAdminDb::new();
    if let Some(path) = &settings.fixture {
        let loaded = db.load_fixture_file(path)?;
        tracing::info!(path = %path.display(), objects = loaded, "fixture loaded");
    }

    let users = UserRegistry::new();
    for seed in &settings.users {
        users
            .create_user(&seed.username, &seed.password, seed.is_staff, seed.is_superuser)
            .await?;
    }

    let mut site = AdminSite::new(settings.admin.clone())
        .with_db(Arc::new(db))
        .with_users(users);
    register_blog(&mut site);
    Ok(site)
}
