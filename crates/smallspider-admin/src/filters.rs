//! Change list filtering, searching and ordering.
//!
//! All of these operate on the JSON objects returned by the store after the
//! model's [`get_queryset`](crate::hooks::ModelAdminHooks::get_queryset) hook
//! has run. Custom sidebar filters implement [`SimpleListFilter`].

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallspider_core::SpiderResult;

use crate::hooks::AdminContext;
use crate::model_admin::{FieldType, ModelAdmin};

/// Query parameters with a fixed meaning in the change list.
pub const RESERVED_PARAMS: [&str; 3] = ["p", "o", "q"];

/// A single choice in a filter sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterChoice {
    /// The query parameter value selecting this choice.
    pub value: String,
    /// The label shown for this choice.
    pub display: String,
}

impl FilterChoice {
    /// Creates a new filter choice.
    pub fn new(value: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            display: display.into(),
        }
    }
}

/// A resolved filter with its available choices and current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// The query parameter that selects a value.
    pub parameter: String,
    /// Human-readable title.
    pub title: String,
    /// Available choices.
    pub choices: Vec<FilterChoice>,
    /// The currently selected value, if any.
    pub selected: Option<String>,
}

/// A sidebar filter with custom choices and custom queryset logic.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use smallspider_admin::filters::{FilterChoice, SimpleListFilter};
/// use smallspider_admin::AdminContext;
/// use smallspider_core::SpiderResult;
///
/// struct Published;
///
/// #[async_trait]
/// impl SimpleListFilter for Published {
///     fn title(&self) -> &str { "published" }
///     fn parameter_name(&self) -> &str { "published" }
///
///     async fn lookups(&self, _ctx: &AdminContext<'_>) -> SpiderResult<Vec<FilterChoice>> {
///         Ok(vec![FilterChoice::new("1", "Yes")])
///     }
///
///     fn queryset(&self, value: Option<&str>, objects: Vec<Value>) -> Vec<Value> {
///         match value {
///             Some("1") => objects.into_iter().filter(|o| o["status"] == 1).collect(),
///             _ => objects,
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait SimpleListFilter: Send + Sync {
    /// The title shown above the choices.
    fn title(&self) -> &str;

    /// The query parameter carrying the selected value.
    fn parameter_name(&self) -> &str;

    /// The choices offered to the requesting user.
    async fn lookups(&self, ctx: &AdminContext<'_>) -> SpiderResult<Vec<FilterChoice>>;

    /// Narrows `objects` for the selected value. `None` means nothing is selected.
    fn queryset(&self, value: Option<&str>, objects: Vec<Value>) -> Vec<Value>;
}

/// Renders a scalar JSON value the way it appears in a query string.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Returns `true` if `value` equals the query-string form `expected`.
///
/// Booleans also accept `1`/`0`, and `null` matches an empty string.
pub fn json_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::Bool(b) => match expected {
            "1" | "true" | "True" => *b,
            "0" | "false" | "False" => !*b,
            _ => false,
        },
        Value::Null => expected.is_empty() || expected == "null",
        Value::Array(items) => items.iter().any(|item| json_matches(item, expected)),
        other => value_text(other).is_some_and(|text| text == expected),
    }
}

/// Keeps the objects whose `field` matches `value`.
pub fn apply_field_filter(objects: Vec<Value>, field: &str, value: &str) -> Vec<Value> {
    objects
        .into_iter()
        .filter(|obj| obj.get(field).is_some_and(|v| json_matches(v, value)))
        .collect()
}

/// The choices offered by a field filter.
///
/// Fields with declared choices offer those; booleans offer yes and no;
/// other fields offer their distinct values in `objects`.
pub fn field_filter_choices(
    admin: &ModelAdmin,
    field: &str,
    objects: &[Value],
) -> Vec<FilterChoice> {
    let schema = admin.field(field);
    if let Some(schema) = schema {
        if !schema.choices.is_empty() {
            return schema
                .choices
                .iter()
                .filter_map(|c| value_text(&c.value).map(|v| FilterChoice::new(v, c.label.clone())))
                .collect();
        }
        if schema.field_type == FieldType::BooleanField {
            return vec![FilterChoice::new("1", "Yes"), FilterChoice::new("0", "No")];
        }
    }
    let distinct: BTreeSet<String> = objects
        .iter()
        .filter_map(|obj| obj.get(field).and_then(value_text))
        .collect();
    distinct
        .into_iter()
        .map(|v| FilterChoice::new(v.clone(), v))
        .collect()
}

/// How a search term is compared against a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLookup {
    /// Case-insensitive substring (the default).
    Contains,
    /// Case-insensitive prefix (`^field`).
    StartsWith,
    /// Case-insensitive equality (`=field`).
    Exact,
}

/// A parsed entry of `search_fields`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchField {
    /// The entry as configured, without its lookup prefix.
    pub name: String,
    /// The comparison used.
    pub lookup: SearchLookup,
    /// For `fk__field`, the foreign key and the field of the related object.
    pub relation: Option<(String, String)>,
}

impl SearchField {
    /// Parses a `search_fields` entry such as `title`, `^slug` or `category__name`.
    pub fn parse(entry: &str) -> Self {
        let (lookup, name) = if let Some(rest) = entry.strip_prefix('^') {
            (SearchLookup::StartsWith, rest)
        } else if let Some(rest) = entry.strip_prefix('=') {
            (SearchLookup::Exact, rest)
        } else {
            (SearchLookup::Contains, entry)
        };
        let relation = name
            .split_once("__")
            .map(|(fk, field)| (fk.to_string(), field.to_string()));
        Self {
            name: name.to_string(),
            lookup,
            relation,
        }
    }

    fn matches(&self, haystack: &str, needle: &str) -> bool {
        let haystack = haystack.to_lowercase();
        match self.lookup {
            SearchLookup::Contains => haystack.contains(needle),
            SearchLookup::StartsWith => haystack.starts_with(needle),
            SearchLookup::Exact => haystack == needle,
        }
    }
}

/// Values of related objects reachable through `fk__field` search fields.
///
/// Keyed by the search field name, then by the related object's primary key
/// in query-string form.
pub type RelatedValues = HashMap<String, HashMap<String, String>>;

/// Keeps the objects matching every whitespace-separated word of `query`.
///
/// A word matches an object when it matches at least one search field.
pub fn apply_search(
    objects: Vec<Value>,
    fields: &[SearchField],
    query: &str,
    related: &RelatedValues,
) -> Vec<Value> {
    let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if words.is_empty() || fields.is_empty() {
        return objects;
    }

    objects
        .into_iter()
        .filter(|obj| {
            words.iter().all(|word| {
                fields.iter().any(|field| {
                    searchable_texts(obj, field, related)
                        .iter()
                        .any(|text| field.matches(text, word))
                })
            })
        })
        .collect()
}

fn searchable_texts(obj: &Value, field: &SearchField, related: &RelatedValues) -> Vec<String> {
    match &field.relation {
        None => obj.get(&field.name).and_then(value_text).into_iter().collect(),
        Some((fk, _)) => {
            let Some(lookup) = related.get(&field.name) else {
                return Vec::new();
            };
            let keys: Vec<String> = match obj.get(fk) {
                Some(Value::Array(items)) => items.iter().filter_map(value_text).collect(),
                Some(v) => value_text(v).into_iter().collect(),
                None => Vec::new(),
            };
            keys.iter().filter_map(|k| lookup.get(k).cloned()).collect()
        }
    }
}

/// Sorts `objects` by the given fields; a leading `-` sorts descending.
pub fn apply_ordering(objects: &mut [Value], ordering: &[String]) {
    if ordering.is_empty() {
        return;
    }
    objects.sort_by(|a, b| {
        for key in ordering {
            let (field, descending) = key
                .strip_prefix('-')
                .map_or((key.as_str(), false), |f| (f, true));
            let ord = compare_json_values(
                a.get(field).unwrap_or(&Value::Null),
                b.get(field).unwrap_or(&Value::Null),
            );
            let ord = if descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Total order over JSON scalars: null first, then booleans, numbers and strings.
pub fn compare_json_values(a: &Value, b: &Value) -> Ordering {
    const fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_admin::{Choice, FieldSchema};
    use serde_json::json;

    fn posts() -> Vec<Value> {
        vec![
            json!({"id": 1, "title": "Rust tips", "category": 1, "status": 1, "tags": [1, 2]}),
            json!({"id": 2, "title": "Python notes", "category": 2, "status": 0, "tags": []}),
            json!({"id": 3, "title": "rusty nails", "category": 2, "status": 1, "tags": [2]}),
        ]
    }

    fn ids(objects: &[Value]) -> Vec<i64> {
        objects.iter().map(|o| o["id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_json_matches() {
        assert!(json_matches(&json!(3), "3"));
        assert!(json_matches(&json!("draft"), "draft"));
        assert!(json_matches(&json!(true), "1"));
        assert!(json_matches(&json!(false), "false"));
        assert!(json_matches(&Value::Null, ""));
        assert!(json_matches(&json!([1, 2]), "2"));
        assert!(!json_matches(&json!(3), "4"));
        assert!(!json_matches(&json!(true), "maybe"));
    }

    #[test]
    fn test_apply_field_filter() {
        let filtered = apply_field_filter(posts(), "category", "2");
        assert_eq!(ids(&filtered), vec![2, 3]);
        let by_tag = apply_field_filter(posts(), "tags", "1");
        assert_eq!(ids(&by_tag), vec![1]);
    }

    #[test]
    fn test_field_filter_choices() {
        let admin = ModelAdmin::new("blog", "post").fields_schema(vec![
            FieldSchema::new("status", FieldType::PositiveIntegerField)
                .choices(vec![Choice::new(1, "正常"), Choice::new(0, "删除")]),
            FieldSchema::new("is_nav", FieldType::BooleanField),
        ]);
        let status = field_filter_choices(&admin, "status", &posts());
        assert_eq!(status[0], FilterChoice::new("1", "正常"));
        let nav = field_filter_choices(&admin, "is_nav", &[]);
        assert_eq!(nav.len(), 2);
        let categories = field_filter_choices(&admin, "category", &posts());
        assert_eq!(
            categories,
            vec![FilterChoice::new("1", "1"), FilterChoice::new("2", "2")]
        );
    }

    #[test]
    fn test_search_field_parse() {
        let plain = SearchField::parse("title");
        assert_eq!(plain.lookup, SearchLookup::Contains);
        assert!(plain.relation.is_none());

        let related = SearchField::parse("category__name");
        assert_eq!(
            related.relation,
            Some(("category".to_string(), "name".to_string()))
        );

        assert_eq!(SearchField::parse("^title").lookup, SearchLookup::StartsWith);
        assert_eq!(SearchField::parse("=title").name, "title");
    }

    #[test]
    fn test_apply_search_case_insensitive() {
        let fields = vec![SearchField::parse("title")];
        let found = apply_search(posts(), &fields, "RUST", &RelatedValues::new());
        assert_eq!(ids(&found), vec![1, 3]);
    }

    #[test]
    fn test_apply_search_all_words_must_match() {
        let fields = vec![SearchField::parse("title")];
        let found = apply_search(posts(), &fields, "rust tips", &RelatedValues::new());
        assert_eq!(ids(&found), vec![1]);
    }

    #[test]
    fn test_apply_search_related() {
        let fields = vec![SearchField::parse("title"), SearchField::parse("category__name")];
        let mut related = RelatedValues::new();
        related.insert(
            "category__name".to_string(),
            HashMap::from([
                ("1".to_string(), "Programming".to_string()),
                ("2".to_string(), "Hardware".to_string()),
            ]),
        );
        let found = apply_search(posts(), &fields, "hardware", &related);
        assert_eq!(ids(&found), vec![2, 3]);
    }

    #[test]
    fn test_apply_search_startswith() {
        let fields = vec![SearchField::parse("^title")];
        let found = apply_search(posts(), &fields, "rust", &RelatedValues::new());
        assert_eq!(ids(&found), vec![1, 3]);
        let none = apply_search(posts(), &fields, "tips", &RelatedValues::new());
        assert!(none.is_empty());
    }

    #[test]
    fn test_apply_search_empty_query() {
        let fields = vec![SearchField::parse("title")];
        assert_eq!(apply_search(posts(), &fields, "  ", &RelatedValues::new()).len(), 3);
    }

    #[test]
    fn test_apply_ordering() {
        let mut objects = posts();
        apply_ordering(&mut objects, &["-id".to_string()]);
        assert_eq!(ids(&objects), vec![3, 2, 1]);

        apply_ordering(&mut objects, &["category".to_string(), "-status".to_string()]);
        assert_eq!(ids(&objects), vec![1, 3, 2]);
    }

    #[test]
    fn test_compare_json_values() {
        assert_eq!(compare_json_values(&json!(1), &json!(2)), Ordering::Less);
        assert_eq!(compare_json_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_json_values(&Value::Null, &json!(0)), Ordering::Less);
        assert_eq!(compare_json_values(&json!(1.5), &json!(1.5)), Ordering::Equal);
    }
}
