//! Admin object storage.
//!
//! The admin works with `serde_json::Value` objects rather than typed models
//! because it is generic over every registered model. [`AdminDbExecutor`] is
//! the seam between the admin and whatever holds the data;
//! [`InMemoryAdminDb`] is the implementation the server runs with, seeded
//! from a JSON fixture.
//!
//! # Example
//!
//! ```
//! use smallspider_admin::db::InMemoryAdminDb;
//!
//! let db = InMemoryAdminDb::new();
//! db.load_fixture(&serde_json::json!({
//!     "blog.tag": [{"id": 1, "name": "rust"}]
//! }))
//! .unwrap();
//! assert_eq!(db.count("blog.tag").unwrap(), 1);
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;
use smallspider_core::{SpiderError, SpiderResult};

use crate::filters::json_matches;
use crate::hooks::JsonObject;
use crate::model_admin::{FieldType, ModelAdmin};

/// CRUD operations on arbitrary models using JSON objects.
#[async_trait]
pub trait AdminDbExecutor: Send + Sync {
    /// Returns every stored object of a model, in insertion order.
    async fn all_objects(&self, model_key: &str) -> SpiderResult<Vec<Value>>;

    /// Returns the objects of a model whose `field` equals `value`.
    ///
    /// Many-to-many fields match when they contain `value`.
    async fn objects_where(
        &self,
        model_key: &str,
        field: &str,
        value: &Value,
    ) -> SpiderResult<Vec<Value>> {
        let Some(expected) = crate::filters::value_text(value) else {
            return Ok(Vec::new());
        };
        Ok(self
            .all_objects(model_key)
            .await?
            .into_iter()
            .filter(|obj| obj.get(field).is_some_and(|v| json_matches(v, &expected)))
            .collect())
    }

    /// Looks up one object by primary key.
    async fn get_object(&self, admin: &ModelAdmin, pk: &str) -> SpiderResult<Option<Value>>;

    /// Stores a new object, assigning its primary key and creation stamps.
    async fn create_object(&self, admin: &ModelAdmin, data: JsonObject) -> SpiderResult<Value>;

    /// Overwrites the given fields of an existing object.
    ///
    /// The primary key and `auto_now_add` fields never change.
    async fn update_object(
        &self,
        admin: &ModelAdmin,
        pk: &str,
        data: JsonObject,
    ) -> SpiderResult<Value>;

    /// Removes an object. Returns `false` if it did not exist.
    async fn delete_object(&self, admin: &ModelAdmin, pk: &str) -> SpiderResult<bool>;
}

#[derive(Debug)]
struct ModelTable {
    objects: Vec<Value>,
    next_id: u64,
}

impl ModelTable {
    const fn new() -> Self {
        Self {
            objects: Vec::new(),
            next_id: 1,
        }
    }

    fn observe_id(&mut self, id: &Value) -> SpiderResult<()> {
        if let Some(id) = id.as_u64() {
            let next = id.checked_add(1).ok_or_else(|| ids_exhausted(id))?;
            self.next_id = self.next_id.max(next);
        }
        Ok(())
    }

    fn take_id(&mut self) -> SpiderResult<u64> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or_else(|| ids_exhausted(id))?;
        Ok(id)
    }
}

fn ids_exhausted(id: u64) -> SpiderError {
    SpiderError::BadRequest(format!("primary key {id} leaves no room for further objects"))
}

/// In-memory implementation of [`AdminDbExecutor`].
///
/// Each model gets its own table of JSON objects. Clones share the same
/// tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAdminDb {
    tables: Arc<RwLock<HashMap<String, ModelTable>>>,
}

impl Default for ModelTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAdminDb {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> SpiderResult<RwLockReadGuard<'_, HashMap<String, ModelTable>>> {
        self.tables
            .read()
            .map_err(|_| SpiderError::Internal("admin store lock poisoned".to_string()))
    }

    fn write(&self) -> SpiderResult<RwLockWriteGuard<'_, HashMap<String, ModelTable>>> {
        self.tables
            .write()
            .map_err(|_| SpiderError::Internal("admin store lock poisoned".to_string()))
    }

    /// Returns the number of objects in a model's table.
    pub fn count(&self, model_key: &str) -> SpiderResult<usize> {
        Ok(self.read()?.get(model_key).map_or(0, |t| t.objects.len()))
    }

    /// Loads objects from a fixture of the form `{"app.model": [{...}, ...]}`.
    ///
    /// Objects without an `id` get the next free one. Returns the number of
    /// objects loaded.
    pub fn load_fixture(&self, fixture: &Value) -> SpiderResult<usize> {
        let models = fixture.as_object().ok_or_else(|| {
            SpiderError::BadRequest("fixture must be an object keyed by model".to_string())
        })?;

        let mut tables = self.write()?;
        let mut loaded = 0;
        for (model_key, objects) in models {
            let objects = objects.as_array().ok_or_else(|| {
                SpiderError::BadRequest(format!("fixture entry '{model_key}' must be an array"))
            })?;
            let table = tables.entry(model_key.clone()).or_default();
            for object in objects {
                let Value::Object(map) = object else {
                    return Err(SpiderError::BadRequest(format!(
                        "fixture entry '{model_key}' contains a non-object"
                    )));
                };
                let mut map = map.clone();
                match map.get("id") {
                    Some(id) => table.observe_id(id)?,
                    None => {
                        map.insert("id".to_string(), Value::from(table.take_id()?));
                    }
                }
                table.objects.push(Value::Object(map));
                loaded += 1;
            }
        }
        drop(tables);
        tracing::debug!(objects = loaded, "fixture loaded");
        Ok(loaded)
    }

    /// Reads and loads a fixture file.
    pub fn load_fixture_file(&self, path: impl AsRef<Path>) -> SpiderResult<usize> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let fixture: Value = serde_json::from_str(&content)?;
        self.load_fixture(&fixture)
    }

    /// Returns every table as a fixture document.
    pub fn dump(&self) -> SpiderResult<Value> {
        let tables = self.read()?;
        let map: JsonObject = tables
            .iter()
            .map(|(key, table)| (key.clone(), Value::Array(table.objects.clone())))
            .collect();
        Ok(Value::Object(map))
    }
}

fn pk_matches(obj: &Value, pk_field: &str, pk: &str) -> bool {
    obj.get(pk_field).is_some_and(|v| json_matches(v, pk))
}

#[async_trait]
impl AdminDbExecutor for InMemoryAdminDb {
    async fn all_objects(&self, model_key: &str) -> SpiderResult<Vec<Value>> {
        Ok(self
            .read()?
            .get(model_key)
            .map_or_else(Vec::new, |t| t.objects.clone()))
    }

    async fn get_object(&self, admin: &ModelAdmin, pk: &str) -> SpiderResult<Option<Value>> {
        let pk_field = admin.pk_field();
        Ok(self.read()?.get(&admin.model_key()).and_then(|t| {
            t.objects
                .iter()
                .find(|obj| pk_matches(obj, pk_field, pk))
                .cloned()
        }))
    }

    async fn create_object(&self, admin: &ModelAdmin, data: JsonObject) -> SpiderResult<Value> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut obj = data;
        for field in &admin.fields_schema {
            if field.primary_key {
                continue;
            }
            if field.auto_now_add {
                obj.insert(field.name.clone(), Value::String(now.clone()));
            } else if !obj.contains_key(&field.name) {
                if let Some(default) = &field.default {
                    obj.insert(field.name.clone(), default.clone());
                } else if field.field_type == FieldType::ManyToManyField {
                    obj.insert(field.name.clone(), Value::Array(Vec::new()));
                }
            }
        }

        let pk_field = admin.pk_field().to_string();
        let mut tables = self.write()?;
        let table = tables.entry(admin.model_key()).or_default();
        match obj.get(&pk_field) {
            Some(id) if !id.is_null() => table.observe_id(id)?,
            _ => {
                obj.insert(pk_field, Value::from(table.take_id()?));
            }
        }
        let value = Value::Object(obj);
        table.objects.push(value.clone());
        drop(tables);
        Ok(value)
    }

    async fn update_object(
        &self,
        admin: &ModelAdmin,
        pk: &str,
        data: JsonObject,
    ) -> SpiderResult<Value> {
        let model_key = admin.model_key();
        let pk_field = admin.pk_field();
        let mut tables = self.write()?;
        let obj = tables
            .get_mut(&model_key)
            .and_then(|t| t.objects.iter_mut().find(|obj| pk_matches(obj, pk_field, pk)))
            .ok_or_else(|| SpiderError::NotFound(format!("{model_key} with pk '{pk}'")))?;

        if let Value::Object(map) = obj {
            for (key, value) in data {
                let frozen = key == pk_field || admin.field(&key).is_some_and(|f| f.auto_now_add);
                if !frozen {
                    map.insert(key, value);
                }
            }
        }
        let updated = obj.clone();
        drop(tables);
        Ok(updated)
    }

    async fn delete_object(&self, admin: &ModelAdmin, pk: &str) -> SpiderResult<bool> {
        let pk_field = admin.pk_field();
        let mut tables = self.write()?;
        let Some(table) = tables.get_mut(&admin.model_key()) else {
            return Ok(false);
        };
        let before = table.objects.len();
        table.objects.retain(|obj| !pk_matches(obj, pk_field, pk));
        Ok(table.objects.len() < before)
    }
}

/// Recovers the data behind a poisoned lock.
///
/// Used by read-only registries where a panic elsewhere cannot leave the
/// data half-written.
pub(crate) fn recover<T>(result: Result<T, PoisonError<T>>) -> T {
    result.unwrap_or_else(PoisonError::into_inner)
}
