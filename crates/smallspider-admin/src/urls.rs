//! Named admin URLs.
//!
//! Every admin page has a name of the form `namespace:app_model_view`
//! (`cus_admin:blog_post_change`), so hooks can link to pages without
//! knowing where the site is mounted.

use smallspider_core::{SpiderError, SpiderResult};

/// The pages the admin serves for each registered model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminView {
    /// The change list.
    Changelist,
    /// The add form.
    Add,
    /// The change form of one object.
    Change,
    /// The delete endpoint of one object.
    Delete,
}

impl AdminView {
    const ALL: [Self; 4] = [Self::Changelist, Self::Add, Self::Change, Self::Delete];

    /// The suffix used in URL names.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Changelist => "changelist",
            Self::Add => "add",
            Self::Change => "change",
            Self::Delete => "delete",
        }
    }

    /// Whether the URL takes the object's primary key.
    pub const fn takes_pk(self) -> bool {
        matches!(self, Self::Change | Self::Delete)
    }
}

/// URL reversing for one admin site.
///
/// # Examples
///
/// ```
/// use smallspider_admin::urls::AdminUrls;
///
/// let mut urls = AdminUrls::new("cus_admin", "/admin");
/// urls.add_model("blog", "post");
/// assert_eq!(
///     urls.reverse("cus_admin:blog_post_change", &["3"]).unwrap(),
///     "/admin/blog/post/3/change/"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUrls {
    namespace: String,
    prefix: String,
    models: Vec<(String, String)>,
}

impl AdminUrls {
    /// Creates URLs for a site mounted under `prefix`.
    pub fn new(namespace: impl Into<String>, prefix: &str) -> Self {
        Self {
            namespace: namespace.into(),
            prefix: prefix.trim_end_matches('/').to_string(),
            models: Vec::new(),
        }
    }

    /// Makes a registered model's pages reversible.
    pub fn add_model(&mut self, app_label: &str, model_name: &str) {
        let entry = (app_label.to_string(), model_name.to_string());
        if !self.models.contains(&entry) {
            self.models.push(entry);
        }
    }

    /// The namespace prefixing every URL name.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The mount prefix without a trailing slash.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The admin index URL.
    pub fn index(&self) -> String {
        format!("{}/", self.prefix)
    }

    /// The URL of a model page. `pk` is ignored by views that do not take one.
    pub fn model_url(
        &self,
        app_label: &str,
        model_name: &str,
        view: AdminView,
        pk: Option<&str>,
    ) -> String {
        let base = format!("{}/{app_label}/{model_name}/", self.prefix);
        match (view, pk) {
            (AdminView::Changelist, _) => base,
            (AdminView::Add, _) => format!("{base}add/"),
            (AdminView::Change, Some(pk)) => format!("{base}{pk}/change/"),
            (AdminView::Delete, Some(pk)) => format!("{base}{pk}/delete/"),
            (AdminView::Change | AdminView::Delete, None) => base,
        }
    }

    /// Resolves a URL name such as `cus_admin:blog_post_change` to a path.
    ///
    /// # Errors
    ///
    /// Returns [`SpiderError::NotFound`] for an unknown name, and
    /// [`SpiderError::BadRequest`] when the number of arguments does not fit
    /// the page.
    pub fn reverse(&self, name: &str, args: &[&str]) -> SpiderResult<String> {
        let no_match = || SpiderError::NotFound(format!("Reverse for '{name}' not found"));
        let (namespace, view_name) = name.split_once(':').ok_or_else(no_match)?;
        if namespace != self.namespace {
            return Err(no_match());
        }

        if view_name == "index" {
            return if args.is_empty() {
                Ok(self.index())
            } else {
                Err(wrong_args(name, 0, args.len()))
            };
        }

        for (app, model) in &self.models {
            for view in AdminView::ALL {
                if view_name != format!("{app}_{model}_{}", view.suffix()) {
                    continue;
                }
                let expected = usize::from(view.takes_pk());
                if args.len() != expected {
                    return Err(wrong_args(name, expected, args.len()));
                }
                return Ok(self.model_url(app, model, view, args.first().copied()));
            }
        }
        Err(no_match())
    }
}

fn wrong_args(name: &str, expected: usize, got: usize) -> SpiderError {
    SpiderError::BadRequest(format!(
        "Reverse for '{name}' takes {expected} argument(s), {got} given"
    ))
}
