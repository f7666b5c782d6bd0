//! System checks for admin registrations.
//!
//! Mistyped field names in a [`ModelAdmin`] would otherwise only surface as
//! empty columns or rejected forms at request time. These checks run at
//! startup and by the `check` command.

use std::collections::HashSet;

use smallspider_core::checks::CheckMessage;

use crate::model_admin::{FieldType, ListFilter, ModelAdmin};

/// The model key of the built-in user model.
pub const USER_MODEL: &str = "auth.user";

/// Checks one registration against every registered model.
pub fn check_model_admin(admin: &ModelAdmin, registered: &[&ModelAdmin]) -> Vec<CheckMessage> {
    let obj = admin.model_key();
    let obj = Some(obj.as_str());
    let known = |name: &str| admin.field(name).is_some();
    let mut messages = Vec::new();

    for column in &admin.list_display {
        if column != "__str__" && !known(column) && !admin.is_computed(column) {
            messages.push(
                CheckMessage::error(
                    format!(
                        "The value of 'list_display' refers to '{column}', which is not a field or a display column."
                    ),
                    obj,
                    Some("admin.E108"),
                )
                .with_hint("Declare computed columns with ModelAdmin::display_column."),
            );
        }
    }

    for link in &admin.list_display_links {
        if !admin.list_display.contains(link) {
            messages.push(CheckMessage::error(
                format!(
                    "The value of 'list_display_links' refers to '{link}', which is not in 'list_display'."
                ),
                obj,
                Some("admin.E111"),
            ));
        }
    }

    if !admin.fields.is_empty() && !admin.fieldsets.is_empty() {
        messages.push(CheckMessage::error(
            "Both 'fieldsets' and 'fields' are specified.",
            obj,
            Some("admin.E005"),
        ));
    }

    let (option, declared) = if admin.fieldsets.is_empty() {
        ("fields", admin.fields.clone())
    } else {
        (
            "fieldsets",
            admin.fieldsets.iter().flat_map(|fs| fs.flat_fields()).collect(),
        )
    };
    let mut seen = HashSet::new();
    for field in &declared {
        if !seen.insert(field.as_str()) {
            messages.push(CheckMessage::error(
                format!("There are duplicate field(s) in '{option}': '{field}'."),
                obj,
                Some(if option == "fields" { "admin.E006" } else { "admin.E012" }),
            ));
        }
        match admin.field(field) {
            None => messages.push(CheckMessage::error(
                format!(
                    "The value of '{option}' refers to '{field}', which is not a field of '{}'.",
                    admin.model_key()
                ),
                obj,
                Some("admin.E030"),
            )),
            Some(schema) if !schema.is_editable() => messages.push(CheckMessage::error(
                format!("The value of '{option}' refers to '{field}', which is not editable."),
                obj,
                Some("admin.E031"),
            )),
            Some(_) => {}
        }
    }

    for filter in &admin.list_filter {
        if let ListFilter::Field(name) = filter {
            if !known(name) {
                messages.push(CheckMessage::error(
                    format!(
                        "The value of 'list_filter' refers to '{name}', which does not refer to a field."
                    ),
                    obj,
                    Some("admin.E116"),
                ));
            }
        }
    }

    for entry in &admin.search_fields {
        let entry = entry.trim_start_matches(['^', '=']);
        let ok = match entry.split_once("__") {
            None => known(entry),
            Some((fk, sub)) => admin
                .field(fk)
                .and_then(|f| f.related_model.as_deref())
                .and_then(|target| registered.iter().find(|m| m.model_key() == target))
                .is_some_and(|target| target.field(sub).is_some() && !sub.contains("__")),
        };
        if !ok {
            messages.push(CheckMessage::error(
                format!(
                    "The value of 'search_fields' refers to '{entry}', which cannot be searched."
                ),
                obj,
                Some("admin.E126"),
            ));
        }
    }

    for field in &admin.exclude {
        if !known(field) {
            messages.push(CheckMessage::warning(
                format!("The value of 'exclude' refers to '{field}', which is not a field."),
                obj,
                Some("admin.W001"),
            ));
        }
    }

    for field in &admin.fields_schema {
        let Some(target) = field.related_model.as_deref() else {
            continue;
        };
        if target != USER_MODEL && !registered.iter().any(|m| m.model_key() == target) {
            messages.push(
                CheckMessage::warning(
                    format!("'{}' relates to '{target}', which is not registered.", field.name),
                    obj,
                    Some("admin.W002"),
                )
                .with_hint("Related objects will be shown by primary key."),
            );
        }
    }

    for inline in &admin.inlines {
        let inline_key = inline.model_key();
        let Some(child) = registered.iter().find(|m| m.model_key() == inline_key) else {
            messages.push(CheckMessage::error(
                format!("The inline model '{inline_key}' is not registered."),
                obj,
                Some("admin.E201"),
            ));
            continue;
        };
        if inline_fk(child, inline.fk_name.as_deref(), &admin.model_key()).is_none() {
            messages.push(CheckMessage::error(
                format!("'{inline_key}' has no ForeignKey to '{}'.", admin.model_key()),
                obj,
                Some("admin.E202"),
            ));
        }
        for field in &inline.fields {
            if child.field(field).is_none() {
                messages.push(CheckMessage::error(
                    format!(
                        "The inline of '{inline_key}' refers to '{field}', which is not a field."
                    ),
                    obj,
                    Some("admin.E030"),
                ));
            }
        }
    }

    messages
}

/// Finds the foreign key of `child` pointing at `parent_key`.
///
/// With `fk_name` set, that field must be such a foreign key.
pub fn inline_fk<'a>(
    child: &'a ModelAdmin,
    fk_name: Option<&str>,
    parent_key: &str,
) -> Option<&'a str> {
    child
        .fields_schema
        .iter()
        .filter(|f| f.field_type == FieldType::ForeignKey)
        .filter(|f| f.related_model.as_deref() == Some(parent_key))
        .find(|f| fk_name.map_or(true, |name| f.name == name))
        .map(|f| f.name.as_str())
}
