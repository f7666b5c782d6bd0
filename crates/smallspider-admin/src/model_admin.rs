//! Model administration configuration.
//!
//! [`ModelAdmin`] describes how one model appears in the admin: which columns
//! the change list shows, which filters and search fields it offers, how the
//! add/change form is laid out and which inline editors it embeds. It is pure
//! data built with a builder; behaviour lives in
//! [`ModelAdminHooks`](crate::hooks::ModelAdminHooks).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::filters::SimpleListFilter;

/// Configuration for how a model is displayed and edited in the admin.
///
/// # Examples
///
/// ```
/// use smallspider_admin::model_admin::{FieldSchema, FieldType, ModelAdmin};
///
/// let admin = ModelAdmin::new("blog", "tag")
///     .fields_schema(vec![
///         FieldSchema::new("id", FieldType::BigAutoField).primary_key(),
///         FieldSchema::new("name", FieldType::CharField).max_length(10),
///     ])
///     .list_display(vec!["name"])
///     .fields(vec!["name"]);
/// assert_eq!(admin.model_key(), "blog.tag");
/// assert_eq!(admin.form_fields(), vec!["name"]);
/// ```
#[derive(Debug, Clone)]
pub struct ModelAdmin {
    /// The application label (e.g., "blog").
    pub app_label: String,
    /// The model name in lowercase (e.g., "post").
    pub model_name: String,
    /// The human-readable verbose name.
    pub verbose_name: String,
    /// The human-readable plural verbose name.
    pub verbose_name_plural: String,
    /// Field whose value is the object's string representation.
    pub str_field: String,
    /// Columns shown in the change list.
    pub list_display: Vec<String>,
    /// Columns linking to the change form. Empty means the first column.
    pub list_display_links: Vec<String>,
    /// Filters available in the change list sidebar.
    pub list_filter: Vec<ListFilter>,
    /// Fields searched by the change list search box. `fk__field` follows a relation.
    pub search_fields: Vec<String>,
    /// Default ordering (prefix with "-" for descending).
    pub ordering: Vec<String>,
    /// Page size; `None` uses the site default.
    pub list_per_page: Option<usize>,
    /// Whether the action bar is rendered above the change list.
    pub actions_on_top: bool,
    /// Whether the action bar is rendered below the change list.
    pub actions_on_bottom: bool,
    /// Fields removed from the add/change form.
    pub exclude: Vec<String>,
    /// Flat list of form fields, used when no fieldsets are configured.
    pub fields: Vec<String>,
    /// Fieldset groupings for the add/change form.
    pub fieldsets: Vec<Fieldset>,
    /// Inline editors embedded in the change form.
    pub inlines: Vec<InlineAdmin>,
    /// Whether to show save buttons at the top of the form.
    pub save_on_top: bool,
    /// Static assets the add/change form loads.
    pub media: Option<Media>,
    /// Columns computed by the model's hooks rather than read from a field.
    pub computed_columns: Vec<String>,
    /// Header labels overriding the field label, keyed by column name.
    pub column_labels: BTreeMap<String, String>,
    /// Schema of the model's stored fields.
    pub fields_schema: Vec<FieldSchema>,
}

impl ModelAdmin {
    /// Creates a new `ModelAdmin` with default configuration.
    pub fn new(app_label: impl Into<String>, model_name: impl Into<String>) -> Self {
        let model = model_name.into();
        let verbose = model.replace('_', " ");
        let verbose_plural = format!("{verbose}s");
        Self {
            app_label: app_label.into(),
            model_name: model,
            verbose_name: verbose,
            verbose_name_plural: verbose_plural,
            str_field: "id".to_string(),
            list_display: vec!["__str__".to_string()],
            list_display_links: Vec::new(),
            list_filter: Vec::new(),
            search_fields: Vec::new(),
            ordering: Vec::new(),
            list_per_page: None,
            actions_on_top: true,
            actions_on_bottom: false,
            exclude: Vec::new(),
            fields: Vec::new(),
            fieldsets: Vec::new(),
            inlines: Vec::new(),
            save_on_top: false,
            media: None,
            computed_columns: Vec::new(),
            column_labels: BTreeMap::new(),
            fields_schema: Vec::new(),
        }
    }

    /// Sets the verbose name.
    #[must_use]
    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = name.into();
        self
    }

    /// Sets the plural verbose name.
    #[must_use]
    pub fn verbose_name_plural(mut self, name: impl Into<String>) -> Self {
        self.verbose_name_plural = name.into();
        self
    }

    /// Sets the field used as the object's string representation.
    #[must_use]
    pub fn str_field(mut self, field: impl Into<String>) -> Self {
        self.str_field = field.into();
        self
    }

    /// Sets the columns shown in the change list.
    #[must_use]
    pub fn list_display(mut self, fields: Vec<&str>) -> Self {
        self.list_display = fields.into_iter().map(String::from).collect();
        self
    }

    /// Sets the columns that link to the change form.
    #[must_use]
    pub fn list_display_links(mut self, fields: Vec<&str>) -> Self {
        self.list_display_links = fields.into_iter().map(String::from).collect();
        self
    }

    /// Sets the list filters from field names.
    #[must_use]
    pub fn list_filter_fields(mut self, fields: Vec<&str>) -> Self {
        self.list_filter = fields
            .into_iter()
            .map(|f| ListFilter::Field(f.to_string()))
            .collect();
        self
    }

    /// Sets the list filters.
    #[must_use]
    pub fn list_filter(mut self, filters: Vec<ListFilter>) -> Self {
        self.list_filter = filters;
        self
    }

    /// Sets the fields to search over.
    #[must_use]
    pub fn search_fields(mut self, fields: Vec<&str>) -> Self {
        self.search_fields = fields.into_iter().map(String::from).collect();
        self
    }

    /// Sets the default ordering.
    #[must_use]
    pub fn ordering(mut self, fields: Vec<&str>) -> Self {
        self.ordering = fields.into_iter().map(String::from).collect();
        self
    }

    /// Sets the number of rows per page.
    #[must_use]
    pub const fn list_per_page(mut self, count: usize) -> Self {
        self.list_per_page = Some(count);
        self
    }

    /// Places the action bar above the change list.
    #[must_use]
    pub const fn actions_on_top(mut self, enabled: bool) -> Self {
        self.actions_on_top = enabled;
        self
    }

    /// Places the action bar below the change list.
    #[must_use]
    pub const fn actions_on_bottom(mut self, enabled: bool) -> Self {
        self.actions_on_bottom = enabled;
        self
    }

    /// Sets the excluded form fields.
    #[must_use]
    pub fn exclude(mut self, fields: Vec<&str>) -> Self {
        self.exclude = fields.into_iter().map(String::from).collect();
        self
    }

    /// Sets a flat list of form fields.
    #[must_use]
    pub fn fields(mut self, fields: Vec<&str>) -> Self {
        self.fields = fields.into_iter().map(String::from).collect();
        self
    }

    /// Sets the fieldsets for the add/change form.
    #[must_use]
    pub fn fieldsets(mut self, fieldsets: Vec<Fieldset>) -> Self {
        self.fieldsets = fieldsets;
        self
    }

    /// Sets the inline editors.
    #[must_use]
    pub fn inlines(mut self, inlines: Vec<InlineAdmin>) -> Self {
        self.inlines = inlines;
        self
    }

    /// Enables the save buttons above the form.
    #[must_use]
    pub const fn save_on_top(mut self, enabled: bool) -> Self {
        self.save_on_top = enabled;
        self
    }

    /// Sets the static assets loaded by the form.
    #[must_use]
    pub fn media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    /// Declares a column computed by the hooks, with its header label.
    #[must_use]
    pub fn display_column(mut self, name: &str, label: &str) -> Self {
        self.computed_columns.push(name.to_string());
        self.column_labels
            .insert(name.to_string(), label.to_string());
        self
    }

    /// Sets the field schema.
    #[must_use]
    pub fn fields_schema(mut self, schema: Vec<FieldSchema>) -> Self {
        self.fields_schema = schema;
        self
    }

    /// Returns the model key in `"app_label.model_name"` format.
    pub fn model_key(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields_schema.iter().find(|f| f.name == name)
    }

    /// Returns the name of the primary key field.
    pub fn pk_field(&self) -> &str {
        self.fields_schema
            .iter()
            .find(|f| f.primary_key)
            .map_or("id", |f| f.name.as_str())
    }

    /// The primary key of a stored object in query-string form.
    pub fn object_pk(&self, obj: &serde_json::Value) -> Option<String> {
        obj.get(self.pk_field()).and_then(crate::filters::value_text)
    }

    /// The string representation of a stored object.
    pub fn object_repr(&self, obj: &serde_json::Value) -> String {
        obj.get(&self.str_field)
            .and_then(crate::filters::value_text)
            .unwrap_or_else(|| {
                format!(
                    "{} object ({})",
                    self.verbose_name,
                    self.object_pk(obj).unwrap_or_default()
                )
            })
    }

    /// Returns `true` if `column` is computed by the hooks.
    pub fn is_computed(&self, column: &str) -> bool {
        self.computed_columns.iter().any(|c| c == column)
    }

    /// The fields the add/change form accepts, in layout order.
    ///
    /// Taken from the fieldsets, else from `fields`, else every editable
    /// schema field; `exclude` is applied last.
    pub fn form_fields(&self) -> Vec<String> {
        let declared: Vec<String> = if !self.fieldsets.is_empty() {
            self.fieldsets.iter().flat_map(Fieldset::flat_fields).collect()
        } else if !self.fields.is_empty() {
            self.fields.clone()
        } else {
            self.fields_schema
                .iter()
                .filter(|f| f.is_editable())
                .map(|f| f.name.clone())
                .collect()
        };
        declared
            .into_iter()
            .filter(|f| !self.exclude.contains(f))
            .collect()
    }

    /// The fieldsets the form renders; one untitled fieldset when none are configured.
    pub fn effective_fieldsets(&self) -> Vec<Fieldset> {
        if self.fieldsets.is_empty() {
            let mut fieldset = Fieldset::untitled();
            for field in self.form_fields() {
                fieldset = fieldset.field(&field);
            }
            vec![fieldset]
        } else {
            self.fieldsets
                .iter()
                .map(|fs| fs.without(&self.exclude))
                .collect()
        }
    }

    /// Columns rendered as links to the change form.
    pub fn link_columns(&self) -> Vec<String> {
        if self.list_display_links.is_empty() {
            self.list_display.iter().take(1).cloned().collect()
        } else {
            self.list_display_links.clone()
        }
    }

    /// The header label for a change list column.
    pub fn column_label(&self, column: &str) -> String {
        if let Some(label) = self.column_labels.get(column) {
            return label.clone();
        }
        if column == "__str__" {
            return self.verbose_name.clone();
        }
        self.field(column)
            .map_or_else(|| column.replace('_', " "), |f| f.label.clone())
    }
}

/// A grouping of fields in the add/change form.
///
/// Each entry of `fields` is one row; fields sharing a row render side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fieldset {
    /// Optional display name for this group.
    pub name: Option<String>,
    /// Rows of fields.
    pub fields: Vec<Vec<String>>,
    /// CSS classes to apply (e.g., `"collapse"`).
    pub classes: Vec<String>,
    /// Optional description shown below the title.
    pub description: Option<String>,
}

impl Fieldset {
    /// Creates an empty titled fieldset.
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::untitled()
        }
    }

    /// Creates an empty fieldset without a title.
    pub const fn untitled() -> Self {
        Self {
            name: None,
            fields: Vec::new(),
            classes: Vec::new(),
            description: None,
        }
    }

    /// Appends a row holding a single field.
    #[must_use]
    pub fn field(mut self, field: &str) -> Self {
        self.fields.push(vec![field.to_string()]);
        self
    }

    /// Appends a row holding several fields side by side.
    #[must_use]
    pub fn row(mut self, fields: &[&str]) -> Self {
        self.fields
            .push(fields.iter().map(|f| (*f).to_string()).collect());
        self
    }

    /// Sets the CSS classes.
    #[must_use]
    pub fn classes(mut self, classes: Vec<&str>) -> Self {
        self.classes = classes.into_iter().map(String::from).collect();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// All field names in row order.
    pub fn flat_fields(&self) -> Vec<String> {
        self.fields.iter().flatten().cloned().collect()
    }

    fn without(&self, excluded: &[String]) -> Self {
        let fields = self
            .fields
            .iter()
            .map(|row| {
                row.iter()
                    .filter(|f| !excluded.contains(f))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .filter(|row| !row.is_empty())
            .collect();
        Self {
            fields,
            ..self.clone()
        }
    }
}

/// Configuration for editing a child model inside its parent's change form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineAdmin {
    /// The app label of the inline model.
    pub app_label: String,
    /// The model name of the inline model.
    pub model_name: String,
    /// The display layout for the inline editor.
    pub inline_type: InlineType,
    /// Number of blank rows offered for new objects.
    pub extra: usize,
    /// Maximum number of rows, if any.
    pub max_num: Option<usize>,
    /// Fields editable in each row.
    pub fields: Vec<String>,
    /// The foreign key pointing at the parent; detected when `None`.
    pub fk_name: Option<String>,
}

impl InlineAdmin {
    /// Creates a new inline configuration.
    pub fn new(
        app_label: impl Into<String>,
        model_name: impl Into<String>,
        inline_type: InlineType,
    ) -> Self {
        Self {
            app_label: app_label.into(),
            model_name: model_name.into(),
            inline_type,
            extra: 3,
            max_num: None,
            fields: Vec::new(),
            fk_name: None,
        }
    }

    /// Sets the number of blank rows.
    #[must_use]
    pub const fn extra(mut self, n: usize) -> Self {
        self.extra = n;
        self
    }

    /// Sets the maximum number of rows.
    #[must_use]
    pub const fn max_num(mut self, n: Option<usize>) -> Self {
        self.max_num = n;
        self
    }

    /// Sets the fields to display.
    #[must_use]
    pub fn fields(mut self, fields: Vec<&str>) -> Self {
        self.fields = fields.into_iter().map(String::from).collect();
        self
    }

    /// Names the foreign key explicitly.
    #[must_use]
    pub fn fk_name(mut self, name: &str) -> Self {
        self.fk_name = Some(name.to_string());
        self
    }

    /// Returns the inline model key in `"app_label.model_name"` format.
    pub fn model_key(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }

    /// Number of blank rows to offer next to `existing` rows.
    pub fn blank_rows(&self, existing: usize) -> usize {
        self.max_num.map_or(self.extra, |max| {
            self.extra.min(max.saturating_sub(existing))
        })
    }
}

/// The visual layout style for inline editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineType {
    /// Each inline object is a table row.
    Tabular,
    /// Each inline object is a full form block.
    Stacked,
}

/// Extra CSS and JavaScript a form page loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Stylesheets keyed by media type (e.g., "all", "screen").
    pub css: BTreeMap<String, Vec<String>>,
    /// Script URLs.
    pub js: Vec<String>,
}

impl Media {
    /// Creates empty media.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stylesheet for the given media type.
    #[must_use]
    pub fn css(mut self, medium: &str, url: &str) -> Self {
        self.css
            .entry(medium.to_string())
            .or_default()
            .push(url.to_string());
        self
    }

    /// Adds a script.
    #[must_use]
    pub fn js(mut self, url: &str) -> Self {
        self.js.push(url.to_string());
        self
    }
}

/// A filter in the change list sidebar.
#[derive(Clone)]
pub enum ListFilter {
    /// Filter by the distinct values of a field.
    Field(String),
    /// A filter with custom lookups and queryset logic.
    Simple(Arc<dyn SimpleListFilter>),
}

impl ListFilter {
    /// Wraps a custom filter.
    pub fn simple(filter: impl SimpleListFilter + 'static) -> Self {
        Self::Simple(Arc::new(filter))
    }

    /// The query parameter that selects this filter's value.
    pub fn parameter_name(&self) -> &str {
        match self {
            Self::Field(name) => name,
            Self::Simple(filter) => filter.parameter_name(),
        }
    }
}

impl fmt::Debug for ListFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.debug_tuple("Field").field(name).finish(),
            Self::Simple(filter) => f
                .debug_struct("Simple")
                .field("title", &filter.title())
                .field("parameter_name", &filter.parameter_name())
                .finish(),
        }
    }
}

/// The storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// Auto-incrementing integer primary key.
    BigAutoField,
    /// Bounded string.
    CharField,
    /// Unbounded string.
    TextField,
    /// Non-negative integer.
    PositiveIntegerField,
    /// Boolean.
    BooleanField,
    /// RFC 3339 timestamp.
    DateTimeField,
    /// Primary key of another model.
    ForeignKey,
    /// List of primary keys of another model.
    ManyToManyField,
}

impl FieldType {
    /// Returns `true` for fields that reference another model.
    pub const fn is_relation(self) -> bool {
        matches!(self, Self::ForeignKey | Self::ManyToManyField)
    }
}

/// One allowed value of a field with choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// The stored value.
    pub value: serde_json::Value,
    /// The label shown instead of the value.
    pub label: String,
}

impl Choice {
    /// Creates a new choice.
    pub fn new(value: impl Into<serde_json::Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Schema information about a single stored field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct FieldSchema {
    /// The field name.
    pub name: String,
    /// The field type.
    pub field_type: FieldType,
    /// Whether a value must be submitted.
    pub required: bool,
    /// Whether forms may not change the field.
    pub read_only: bool,
    /// Whether this field is the primary key.
    pub primary_key: bool,
    /// Maximum character length, if applicable.
    pub max_length: Option<usize>,
    /// Human-readable label.
    pub label: String,
    /// Help text for the field.
    pub help_text: String,
    /// Allowed values, if restricted.
    pub choices: Vec<Choice>,
    /// The target model for relational fields (e.g., "auth.user").
    pub related_model: Option<String>,
    /// Stamped with the creation time and never changed afterwards.
    pub auto_now_add: bool,
    /// Value stored when the field is missing on creation.
    pub default: Option<serde_json::Value>,
    /// Preferred form widget (e.g., "textarea").
    pub widget: Option<String>,
}

impl FieldSchema {
    /// Creates a new required field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let n = name.into();
        let label = n.replace('_', " ");
        Self {
            name: n,
            field_type,
            required: true,
            read_only: false,
            primary_key: false,
            max_length: None,
            label,
            help_text: String::new(),
            choices: Vec::new(),
            related_model: None,
            auto_now_add: false,
            default: None,
            widget: None,
        }
    }

    /// Marks this field as optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Marks this field as read-only.
    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Marks this field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.read_only = true;
        self
    }

    /// Sets the maximum length.
    #[must_use]
    pub const fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Sets the human-readable label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// Restricts the field to the given choices.
    #[must_use]
    pub fn choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    /// Points a relational field at its target model.
    #[must_use]
    pub fn relation(mut self, related_model: impl Into<String>) -> Self {
        self.related_model = Some(related_model.into());
        self
    }

    /// Stamps the field on creation and makes it read-only.
    #[must_use]
    pub const fn auto_now_add(mut self) -> Self {
        self.auto_now_add = true;
        self.read_only = true;
        self.required = false;
        self
    }

    /// Sets the value used when the field is missing on creation.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the preferred widget.
    #[must_use]
    pub fn widget(mut self, widget: &str) -> Self {
        self.widget = Some(widget.to_string());
        self
    }

    /// Returns `true` if forms may set this field.
    pub const fn is_editable(&self) -> bool {
        !self.read_only && !self.primary_key
    }

    /// The label of the choice matching `value`, if any.
    pub fn choice_label(&self, value: &serde_json::Value) -> Option<&str> {
        self.choices
            .iter()
            .find(|c| &c.value == value)
            .map(|c| c.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_schema() -> Vec<FieldSchema> {
        vec![
            FieldSchema::new("id", FieldType::BigAutoField).primary_key(),
            FieldSchema::new("title", FieldType::CharField).max_length(200),
            FieldSchema::new("body", FieldType::TextField).optional(),
            FieldSchema::new("owner", FieldType::ForeignKey).relation("auth.user"),
            FieldSchema::new("created", FieldType::DateTimeField).auto_now_add(),
        ]
    }

    #[test]
    fn test_model_admin_new_defaults() {
        let admin = ModelAdmin::new("blog", "article");
        assert_eq!(admin.verbose_name, "article");
        assert_eq!(admin.verbose_name_plural, "articles");
        assert_eq!(admin.list_display, vec!["__str__"]);
        assert!(admin.actions_on_top);
        assert!(!admin.actions_on_bottom);
        assert!(!admin.save_on_top);
        assert!(admin.list_per_page.is_none());
        assert!(admin.media.is_none());
    }

    #[test]
    fn test_form_fields_from_schema_skips_read_only() {
        let admin = ModelAdmin::new("blog", "article").fields_schema(article_schema());
        assert_eq!(admin.form_fields(), vec!["title", "body", "owner"]);
    }

    #[test]
    fn test_form_fields_from_fields_with_exclude() {
        let admin = ModelAdmin::new("blog", "article")
            .fields_schema(article_schema())
            .fields(vec!["title", "owner"])
            .exclude(vec!["owner"]);
        assert_eq!(admin.form_fields(), vec!["title"]);
    }

    #[test]
    fn test_form_fields_from_fieldsets() {
        let admin = ModelAdmin::new("blog", "article")
            .fields_schema(article_schema())
            .fieldsets(vec![
                Fieldset::new("Main").row(&["title", "owner"]),
                Fieldset::new("Body").field("body").classes(vec!["collapse"]),
            ])
            .exclude(vec!["owner"]);
        assert_eq!(admin.form_fields(), vec!["title", "body"]);

        let fieldsets = admin.effective_fieldsets();
        assert_eq!(fieldsets[0].fields, vec![vec!["title".to_string()]]);
        assert_eq!(fieldsets[1].classes, vec!["collapse"]);
    }

    #[test]
    fn test_effective_fieldsets_default() {
        let admin = ModelAdmin::new("blog", "article")
            .fields_schema(article_schema())
            .fields(vec!["title", "body"]);
        let fieldsets = admin.effective_fieldsets();
        assert_eq!(fieldsets.len(), 1);
        assert!(fieldsets[0].name.is_none());
        assert_eq!(fieldsets[0].flat_fields(), vec!["title", "body"]);
    }

    #[test]
    fn test_link_columns() {
        let admin = ModelAdmin::new("blog", "article").list_display(vec!["title", "owner"]);
        assert_eq!(admin.link_columns(), vec!["title"]);

        let admin = admin.list_display_links(vec!["owner"]);
        assert_eq!(admin.link_columns(), vec!["owner"]);
    }

    #[test]
    fn test_column_label() {
        let admin = ModelAdmin::new("blog", "article")
            .fields_schema(vec![
                FieldSchema::new("title", FieldType::CharField).label("标题"),
            ])
            .display_column("operator", "操作");
        assert_eq!(admin.column_label("title"), "标题");
        assert_eq!(admin.column_label("operator"), "操作");
        assert_eq!(admin.column_label("created_time"), "created time");
        assert!(admin.is_computed("operator"));
        assert!(!admin.is_computed("title"));
    }

    #[test]
    fn test_pk_field() {
        let admin = ModelAdmin::new("blog", "article");
        assert_eq!(admin.pk_field(), "id");
        let admin = admin.fields_schema(vec![
            FieldSchema::new("slug", FieldType::CharField).primary_key(),
        ]);
        assert_eq!(admin.pk_field(), "slug");
    }

    #[test]
    fn test_inline_blank_rows() {
        let inline = InlineAdmin::new("blog", "post", InlineType::Tabular).extra(1);
        assert_eq!(inline.blank_rows(5), 1);
        let capped = inline.clone().extra(3).max_num(Some(4));
        assert_eq!(capped.blank_rows(2), 2);
        assert_eq!(capped.blank_rows(6), 0);
        assert_eq!(inline.model_key(), "blog.post");
    }

    #[test]
    fn test_media_builder() {
        let media = Media::new().css("all", "a.css").js("b.js");
        assert_eq!(media.css["all"], vec!["a.css"]);
        assert_eq!(media.js, vec!["b.js"]);
    }

    #[test]
    fn test_choice_label() {
        let field = FieldSchema::new("status", FieldType::PositiveIntegerField)
            .choices(vec![Choice::new(1, "正常"), Choice::new(0, "删除")]);
        assert_eq!(field.choice_label(&serde_json::json!(0)), Some("删除"));
        assert_eq!(field.choice_label(&serde_json::json!(7)), None);
    }

    #[test]
    fn test_auto_now_add_is_not_editable() {
        let field = FieldSchema::new("created", FieldType::DateTimeField).auto_now_add();
        assert!(!field.is_editable());
        assert!(!field.required);
    }
}
