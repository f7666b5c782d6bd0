//! Admin registrations for the blog models.
//!
//! Each model gets a [`ModelAdmin`] layout and a hooks type. All three hooks
//! stamp the requesting user as owner on save; [`PostHooks`] additionally
//! hides other users' posts.

use async_trait::async_trait;
use serde_json::Value;
use smallspider_admin::filters::{json_matches, value_text, FilterChoice, SimpleListFilter};
use smallspider_admin::html::format_html;
use smallspider_admin::model_admin::{
    Fieldset, InlineAdmin, InlineType, ListFilter, Media, ModelAdmin,
};
use smallspider_admin::{AdminContext, JsonObject, ModelAdminHooks};
use smallspider_core::SpiderResult;

use crate::models::{Category, Post, Record, Tag};

/// Stylesheet loaded by the post form.
pub const BOOTSTRAP_CSS: &str =
    "https://cdn.bootcss.com/bootstrap/4.0.0-beta.2/css/bootstrap.min.css";

/// Script loaded by the post form.
pub const BOOTSTRAP_JS: &str = "https://cdn.bootcss.com/bootstrap/4.0.0-beta.2/bootstrap.bundle.js";

fn stamp_owner(ctx: &AdminContext<'_>, obj: &mut JsonObject) {
    obj.insert("owner".to_string(), ctx.user_pk());
}

fn owned_by(obj: &Value, ctx: &AdminContext<'_>) -> bool {
    obj.get("owner") == Some(&ctx.user_pk())
}

// ── Tag ────────────────────────────────────────────────────────────

/// Layout of the tag pages.
pub fn tag_admin() -> ModelAdmin {
    ModelAdmin::new(Tag::APP_LABEL, Tag::MODEL_NAME)
        .verbose_name("标签")
        .verbose_name_plural("标签")
        .str_field("name")
        .fields_schema(Tag::fields_schema())
        .list_display(vec!["name", "status", "created_time"])
        .fields(vec!["name", "status"])
}

/// Tags are stamped with their owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagHooks;

#[async_trait]
impl ModelAdminHooks for TagHooks {
    async fn save_model(
        &self,
        ctx: &AdminContext<'_>,
        obj: &mut JsonObject,
        _change: bool,
    ) -> SpiderResult<()> {
        stamp_owner(ctx, obj);
        Ok(())
    }
}

// ── Post ───────────────────────────────────────────────────────────

/// Sidebar filter offering only the requesting user's categories.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryOwnerFilter;

#[async_trait]
impl SimpleListFilter for CategoryOwnerFilter {
    fn title(&self) -> &str {
        "分类过滤器"
    }

    fn parameter_name(&self) -> &str {
        "owner_category"
    }

    async fn lookups(&self, ctx: &AdminContext<'_>) -> SpiderResult<Vec<FilterChoice>> {
        let owner = ctx.user_pk();
        Ok(ctx
            .db
            .objects_where(&Category::model_key(), "owner", &owner)
            .await?
            .iter()
            .filter_map(|c| {
                let id = c.get("id").and_then(value_text)?;
                let name = c.get("name").and_then(Value::as_str).unwrap_or_default();
                Some(FilterChoice::new(id, name))
            })
            .collect())
    }

    fn queryset(&self, value: Option<&str>, objects: Vec<Value>) -> Vec<Value> {
        match value {
            Some(category_id) if !category_id.is_empty() => objects
                .into_iter()
                .filter(|obj| obj.get("category").is_some_and(|c| json_matches(c, category_id)))
                .collect(),
            _ => objects,
        }
    }
}

/// Layout of the post pages.
pub fn post_admin() -> ModelAdmin {
    ModelAdmin::new(Post::APP_LABEL, Post::MODEL_NAME)
        .verbose_name("文章")
        .verbose_name_plural("文章")
        .str_field("title")
        .fields_schema(Post::fields_schema())
        .list_display(vec![
            "title",
            "category",
            "status",
            "created_time",
            "owner",
            "operator",
        ])
        .display_column("operator", "操作")
        .list_display_links(Vec::new())
        .list_filter(vec![ListFilter::simple(CategoryOwnerFilter)])
        .search_fields(vec!["title", "category__name"])
        .actions_on_top(true)
        .actions_on_bottom(true)
        .exclude(vec!["owner"])
        .save_on_top(true)
        .fieldsets(vec![
            Fieldset::new("基础配置")
                .description("基础配置描述")
                .row(&["title", "category"])
                .field("status"),
            Fieldset::new("内容").field("desc").field("content"),
            Fieldset::new("额外信息")
                .classes(vec!["collapse"])
                .field("tags"),
        ])
        .media(Media::new().css("all", BOOTSTRAP_CSS).js(BOOTSTRAP_JS))
}

/// Posts are stamped with their owner and only shown to that owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostHooks;

#[async_trait]
impl ModelAdminHooks for PostHooks {
    async fn save_model(
        &self,
        ctx: &AdminContext<'_>,
        obj: &mut JsonObject,
        _change: bool,
    ) -> SpiderResult<()> {
        stamp_owner(ctx, obj);
        Ok(())
    }

    async fn get_queryset(
        &self,
        ctx: &AdminContext<'_>,
        objects: Vec<Value>,
    ) -> SpiderResult<Vec<Value>> {
        Ok(objects.into_iter().filter(|obj| owned_by(obj, ctx)).collect())
    }

    async fn display_column(
        &self,
        ctx: &AdminContext<'_>,
        column: &str,
        obj: &Value,
    ) -> SpiderResult<Option<Value>> {
        if column != "operator" {
            return Ok(None);
        }
        let Some(id) = obj.get("id").and_then(Value::as_u64) else {
            return Ok(None);
        };
        let name = format!("{}:blog_post_change", ctx.urls.namespace());
        let url = ctx.urls.reverse(&name, &[&id.to_string()])?;
        Ok(Some(Value::String(format_html("<a href='{}'>编辑</a>", &[url.as_str()]))))
    }
}

// ── Category ───────────────────────────────────────────────────────

/// The posts of a category, edited in the category form.
pub fn post_inline() -> InlineAdmin {
    InlineAdmin::new(Post::APP_LABEL, Post::MODEL_NAME, InlineType::Tabular)
        .fields(vec!["title", "desc"])
        .extra(1)
}

/// Layout of the category pages.
pub fn category_admin() -> ModelAdmin {
    ModelAdmin::new(Category::APP_LABEL, Category::MODEL_NAME)
        .verbose_name("分类")
        .verbose_name_plural("分类")
        .str_field("name")
        .fields_schema(Category::fields_schema())
        .inlines(vec![post_inline()])
        .list_display(vec!["name", "status", "is_nav", "created_time", "post_count"])
        .display_column("post_count", "文章数量")
        .fields(vec!["name", "status", "is_nav"])
}

/// Categories are stamped with their owner, as are posts added inline.
///
/// Posts edited inline keep their owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryHooks;

#[async_trait]
impl ModelAdminHooks for CategoryHooks {
    async fn save_model(
        &self,
        ctx: &AdminContext<'_>,
        obj: &mut JsonObject,
        _change: bool,
    ) -> SpiderResult<()> {
        stamp_owner(ctx, obj);
        Ok(())
    }

    async fn display_column(
        &self,
        ctx: &AdminContext<'_>,
        column: &str,
        obj: &Value,
    ) -> SpiderResult<Option<Value>> {
        if column != "post_count" {
            return Ok(None);
        }
        let Some(id) = obj.get("id") else {
            return Ok(None);
        };
        let posts = ctx.db.objects_where(&Post::model_key(), "category", id).await?;
        Ok(Some(Value::from(posts.len())))
    }

    async fn save_inline(
        &self,
        ctx: &AdminContext<'_>,
        _inline: &InlineAdmin,
        obj: &mut JsonObject,
        change: bool,
    ) -> SpiderResult<()> {
        if !change {
            stamp_owner(ctx, obj);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use smallspider_admin::auth::AdminUser;
    use smallspider_admin::db::InMemoryAdminDb;
    use smallspider_admin::log_entry::InMemoryLogEntryStore;
    use smallspider_admin::urls::AdminUrls;

    struct Env {
        user: AdminUser,
        db: InMemoryAdminDb,
        urls: AdminUrls,
        log: InMemoryLogEntryStore,
    }

    impl Env {
        fn new(user_id: u64) -> Self {
            let mut urls = AdminUrls::new("cus_admin", "/admin");
            urls.add_model("blog", "post");
            Self {
                user: AdminUser::new(user_id, "alice"),
                db: InMemoryAdminDb::new(),
                urls,
                log: InMemoryLogEntryStore::new(),
            }
        }

        fn ctx(&self) -> AdminContext<'_> {
            AdminContext {
                user: &self.user,
                db: &self.db,
                urls: &self.urls,
                log: &self.log,
            }
        }
    }

    fn category(id: u64, name: &str, owner: u64) -> Value {
        json!({
            "id": id, "name": name, "status": 1, "is_nav": false,
            "owner": owner, "created_time": "2024-05-01T08:00:00+00:00",
        })
    }

    #[tokio::test]
    async fn test_save_model_overwrites_owner() {
        let env = Env::new(7);
        let mut obj = JsonObject::new();
        obj.insert("owner".to_string(), json!(99));
        PostHooks.save_model(&env.ctx(), &mut obj, true).await.unwrap();
        assert_eq!(obj["owner"], 7);

        let mut obj = JsonObject::new();
        TagHooks.save_model(&env.ctx(), &mut obj, false).await.unwrap();
        assert_eq!(obj["owner"], 7);
    }

    #[tokio::test]
    async fn test_post_queryset_keeps_own_posts() {
        let env = Env::new(1);
        let posts = vec![
            json!({"id": 1, "owner": 1}),
            json!({"id": 2, "owner": 2}),
            json!({"id": 3}),
        ];
        let visible = PostHooks.get_queryset(&env.ctx(), posts).await.unwrap();
        assert_eq!(visible, vec![json!({"id": 1, "owner": 1})]);
    }

    #[tokio::test]
    async fn test_operator_column_links_to_change_page() {
        let env = Env::new(1);
        let cell = PostHooks
            .display_column(&env.ctx(), "operator", &json!({"id": 5}))
            .await
            .unwrap();
        assert_eq!(
            cell,
            Some(json!("<a href='/admin/blog/post/5/change/'>编辑</a>"))
        );
        let other = PostHooks
            .display_column(&env.ctx(), "title", &json!({"id": 5}))
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_category_owner_filter_lookups() {
        let env = Env::new(1);
        env.db
            .load_fixture(&json!({"blog.category": [
                category(1, "Rust", 1),
                category(2, "Go", 2),
                category(3, "Life", 1),
            ]}))
            .unwrap();
        let choices = CategoryOwnerFilter.lookups(&env.ctx()).await.unwrap();
        assert_eq!(
            choices,
            vec![FilterChoice::new("1", "Rust"), FilterChoice::new("3", "Life")]
        );
    }

    #[tokio::test]
    async fn test_category_owner_filter_reads_partial_records() {
        let env = Env::new(1);
        env.db
            .load_fixture(&json!({"blog.category": [
                {"id": 4, "name": "Imported", "owner": 1},
                {"id": 5, "owner": 1},
                {"id": 6, "name": "Orphan"},
            ]}))
            .unwrap();
        let choices = CategoryOwnerFilter.lookups(&env.ctx()).await.unwrap();
        assert_eq!(
            choices,
            vec![FilterChoice::new("4", "Imported"), FilterChoice::new("5", "")]
        );
    }

    #[tokio::test]
    async fn test_inline_edit_keeps_post_owner() {
        let env = Env::new(2);
        let inline = post_inline();

        let mut existing = JsonObject::new();
        existing.insert("owner".to_string(), json!(1));
        CategoryHooks
            .save_inline(&env.ctx(), &inline, &mut existing, true)
            .await
            .unwrap();
        assert_eq!(existing["owner"], 1);

        let mut added = JsonObject::new();
        CategoryHooks
            .save_inline(&env.ctx(), &inline, &mut added, false)
            .await
            .unwrap();
        assert_eq!(added["owner"], 2);
    }

    #[test]
    fn test_category_owner_filter_queryset() {
        let posts = vec![
            json!({"id": 1, "category": 1}),
            json!({"id": 2, "category": 2}),
        ];
        let filter = CategoryOwnerFilter;
        assert_eq!(filter.queryset(Some("2"), posts.clone()).len(), 1);
        assert_eq!(filter.queryset(Some(""), posts.clone()).len(), 2);
        assert_eq!(filter.queryset(None, posts).len(), 2);
    }

    #[tokio::test]
    async fn test_post_count_column() {
        let env = Env::new(1);
        env.db
            .load_fixture(&json!({"blog.post": [
                {"id": 1, "category": 1},
                {"id": 2, "category": 1},
                {"id": 3, "category": 2},
            ]}))
            .unwrap();
        let count = CategoryHooks
            .display_column(&env.ctx(), "post_count", &category(1, "Rust", 1))
            .await
            .unwrap();
        assert_eq!(count, Some(json!(2)));
    }

    #[test]
    fn test_post_admin_layout() {
        let admin = post_admin();
        assert_eq!(
            admin.form_fields(),
            vec!["title", "category", "status", "desc", "content", "tags"]
        );
        assert_eq!(admin.link_columns(), vec!["title"]);
        assert!(admin.actions_on_top && admin.actions_on_bottom && admin.save_on_top);
        let media = admin.media.unwrap();
        assert_eq!(media.css["all"], vec![BOOTSTRAP_CSS]);
        assert_eq!(media.js, vec![BOOTSTRAP_JS]);
    }

    #[test]
    fn test_registrations_pass_checks() {
        use smallspider_admin::checks::check_model_admin;

        let (tag, post, category) = (tag_admin(), post_admin(), category_admin());
        let registered = [&tag, &post, &category];
        for admin in registered {
            assert!(check_model_admin(admin, &registered).is_empty(), "{}", admin.model_key());
        }
    }
}
