//! Model instances.
//!
//! A [`Model`] is an attribute bag bound to an [`EntityDef`]: current
//! attributes, the `original` snapshot that defines dirtiness, a cache of
//! loaded relations, and an `exists` flag. Persistence goes through its own
//! query builder; nothing here touches a connection except `save`, `delete`,
//! `fresh`, and `load`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use sable_query::{IntoValue, Operand, QueryBuilder, Record, Row, Value};

use crate::builder::ModelBuilder;
use crate::entity::EntityDef;
use crate::error::{OrmError, Result};
use crate::events::ModelEvent;
use crate::orm::Orm;
use crate::relations::{build_relation, BelongsToMany, RelationDef};

/// A loaded relation value: a single optional model or an ordered list.
#[derive(Debug, Clone)]
pub enum Related {
    One(Option<Box<Model>>),
    Many(Vec<Model>),
}

/// An entity instance.
#[derive(Debug, Clone)]
pub struct Model {
    def: Arc<EntityDef>,
    attributes: BTreeMap<String, Value>,
    original: BTreeMap<String, Value>,
    relations: BTreeMap<String, Related>,
    exists: bool,
}

impl Model {
    /// Creates an empty, unsaved instance.
    #[must_use]
    pub fn new(def: Arc<EntityDef>) -> Self {
        Self {
            def,
            attributes: BTreeMap::new(),
            original: BTreeMap::new(),
            relations: BTreeMap::new(),
            exists: false,
        }
    }

    /// Hydrates an instance from a result row. The row becomes both the
    /// attributes and the original snapshot, and the instance exists.
    #[must_use]
    pub fn from_row(def: Arc<EntityDef>, row: Row) -> Self {
        Self {
            def,
            attributes: row.clone(),
            original: row,
            relations: BTreeMap::new(),
            exists: true,
        }
    }

    /// Returns the entity descriptor.
    #[must_use]
    pub fn def(&self) -> &Arc<EntityDef> {
        &self.def
    }

    /// Returns whether the instance is persisted.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.exists
    }

    /// Returns the raw attribute map.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Returns the primary-key value.
    #[must_use]
    pub fn key(&self) -> Value {
        self.attributes
            .get(self.def.key_name())
            .cloned()
            .unwrap_or(Value::Null)
    }

    // ---- attributes ------------------------------------------------------

    /// Mass-assigns attributes. Keys the descriptor does not allow are
    /// silently dropped, never an error.
    pub fn fill<'a, I, V>(&mut self, attrs: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: IntoValue,
    {
        for (key, value) in attrs {
            if self.def.is_fillable(key) {
                self.set_attribute(key, value);
            }
        }
        self
    }

    /// Assigns attributes without consulting the mass-assignment lists.
    pub fn force_fill<'a, I, V>(&mut self, attrs: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: IntoValue,
    {
        for (key, value) in attrs {
            self.set_attribute(key, value);
        }
        self
    }

    /// Writes an attribute, applying any registered mutator and formatting
    /// date-cast values into the entity's date format.
    pub fn set_attribute(&mut self, key: &str, value: impl IntoValue) -> &mut Self {
        let mut value = self.def.mutate_set(key, value.into_value());
        if self.def.is_date(key) {
            if let Value::DateTime(dt) = value {
                value = Value::Text(dt.format(self.def.get_date_format()).to_string());
            }
        }
        self.attributes.insert(key.to_string(), value);
        self
    }

    /// Reads an attribute, applying any registered accessor and parsing
    /// date-cast text back into a date-time. Missing keys read as NULL.
    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Value {
        let raw = self.attributes.get(key).cloned().unwrap_or(Value::Null);
        let value = self.def.mutate_get(key, raw);
        if self.def.is_date(key) {
            if let Value::Text(text) = &value {
                if let Ok(dt) = NaiveDateTime::parse_from_str(text, self.def.get_date_format()) {
                    return Value::DateTime(dt);
                }
            }
        }
        value
    }

    /// Removes every attribute starting with `prefix` from the attributes
    /// and original maps, returning them with the prefix stripped. Used to
    /// split aliased pivot columns out of hydrated rows.
    pub(crate) fn extract_prefixed(&mut self, prefix: &str) -> BTreeMap<String, Value> {
        let keys: Vec<String> = self
            .attributes
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        let mut extracted = BTreeMap::new();
        for key in keys {
            if let Some(value) = self.attributes.remove(&key) {
                self.original.remove(&key);
                extracted.insert(key[prefix.len()..].to_string(), value);
            }
        }
        extracted
    }

    // ---- dirty tracking --------------------------------------------------

    /// Returns the attributes whose value differs from the original
    /// snapshot (or that the snapshot never had).
    #[must_use]
    pub fn get_dirty(&self) -> BTreeMap<String, Value> {
        self.attributes
            .iter()
            .filter(|(key, value)| self.original.get(*key) != Some(value))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Returns whether any attribute changed since the last sync.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.attributes
            .iter()
            .any(|(key, value)| self.original.get(key) != Some(value))
    }

    /// Snapshots the current attributes as the new original state.
    pub fn sync_original(&mut self) -> &mut Self {
        self.original = self.attributes.clone();
        self
    }

    // ---- relations cache -------------------------------------------------

    /// Returns a loaded relation, if present.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    /// Stores a loaded relation.
    pub fn set_relation(&mut self, name: &str, related: Related) -> &mut Self {
        self.relations.insert(name.to_string(), related);
        self
    }

    /// Lazily loads a relation and caches it on the instance.
    pub async fn load(&mut self, orm: &Orm, name: &str) -> Result<()> {
        let def = self
            .def
            .relation(name)
            .cloned()
            .ok_or_else(|| OrmError::RelationNotDefined(name.to_string()))?;
        let relation = build_relation(&def, &self.def, Some(&*self));
        let results = relation.get_results(orm).await?;
        self.relations.insert(name.to_string(), results);
        Ok(())
    }

    /// Returns the pivot-capable handle for a many-to-many relation,
    /// constrained to this instance.
    pub fn many_to_many(&self, name: &str) -> Result<BelongsToMany> {
        match self.def.relation(name) {
            Some(RelationDef::BelongsToMany {
                related,
                pivot_table,
                foreign_pivot_key,
                related_pivot_key,
            }) => Ok(BelongsToMany::new(
                related(),
                &self.def,
                pivot_table.clone(),
                foreign_pivot_key.clone(),
                related_pivot_key.clone(),
                Some(self),
            )),
            Some(_) => Err(OrmError::NotManyToMany(name.to_string())),
            None => Err(OrmError::RelationNotDefined(name.to_string())),
        }
    }

    // ---- persistence -----------------------------------------------------

    /// Persists the instance: INSERT when new, UPDATE of dirty columns when
    /// it exists. A clean UPDATE is skipped entirely and still succeeds.
    /// Returns `false` when a cancelable hook aborted the save.
    pub async fn save(&mut self, orm: &Orm) -> Result<bool> {
        if !orm.until(ModelEvent::Saving, self) {
            return Ok(false);
        }

        if self.exists {
            if !self.perform_update(orm).await? {
                return Ok(false);
            }
        } else {
            if !self.perform_insert(orm).await? {
                return Ok(false);
            }
        }

        orm.dispatch(ModelEvent::Saved, self);
        self.sync_original();
        Ok(true)
    }

    async fn perform_update(&mut self, orm: &Orm) -> Result<bool> {
        if self.get_dirty().is_empty() {
            return Ok(true);
        }
        if !orm.until(ModelEvent::Updating, self) {
            return Ok(false);
        }
        if self.def.uses_timestamps() {
            let now = self.fresh_timestamp();
            self.attributes.insert("updated_at".to_string(), now);
        }
        let record = to_record(self.get_dirty());
        self.save_query().update(orm.connection(), &record).await?;
        orm.dispatch(ModelEvent::Updated, self);
        Ok(true)
    }

    async fn perform_insert(&mut self, orm: &Orm) -> Result<bool> {
        if !orm.until(ModelEvent::Creating, self) {
            return Ok(false);
        }
        if self.def.uses_timestamps() {
            let now = self.fresh_timestamp();
            self.attributes
                .entry("created_at".to_string())
                .or_insert_with(|| now.clone());
            self.attributes.insert("updated_at".to_string(), now);
        }
        let query = QueryBuilder::table(self.def.table());
        let record = to_record(self.attributes.clone());
        if self.def.is_incrementing() {
            let id = query
                .insert_get_id(orm.connection(), &record, None)
                .await?;
            self.attributes.insert(self.def.key_name().to_string(), id);
        } else {
            query.insert(orm.connection(), &[record]).await?;
        }
        self.exists = true;
        orm.dispatch(ModelEvent::Created, self);
        Ok(true)
    }

    /// Deletes the row keyed by the primary key and clears `exists`.
    /// Returns `false` when the instance was never persisted or a hook
    /// aborted the delete.
    pub async fn delete(&mut self, orm: &Orm) -> Result<bool> {
        if !self.exists {
            return Ok(false);
        }
        if !orm.until(ModelEvent::Deleting, self) {
            return Ok(false);
        }
        self.save_query().delete(orm.connection()).await?;
        self.exists = false;
        orm.dispatch(ModelEvent::Deleted, self);
        Ok(true)
    }

    /// Reloads a fresh copy of this instance by primary key.
    pub async fn fresh(&self, orm: &Orm) -> Result<Option<Model>> {
        ModelBuilder::new(self.def.clone())
            .find(orm, self.key_for_save())
            .await
    }

    fn save_query(&self) -> QueryBuilder {
        QueryBuilder::table(self.def.table())
            .where_eq(self.def.key_name(), self.key_for_save())
    }

    /// Key used to address the row: the original key when one was loaded,
    /// so changing the key attribute still updates the right row.
    fn key_for_save(&self) -> Value {
        self.original
            .get(self.def.key_name())
            .or_else(|| self.attributes.get(self.def.key_name()))
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn fresh_timestamp(&self) -> Value {
        Value::Text(
            Utc::now()
                .naive_utc()
                .format(self.def.get_date_format())
                .to_string(),
        )
    }

    // ---- serialization ---------------------------------------------------

    /// Serializes attributes (minus hidden keys) and loaded relations.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for key in self.attributes.keys() {
            if self.def.is_hidden(key) {
                continue;
            }
            map.insert(key.clone(), self.json_of(&self.get_attribute(key)));
        }
        for (name, related) in &self.relations {
            let value = match related {
                Related::One(None) => serde_json::Value::Null,
                Related::One(Some(model)) => model.to_value(),
                Related::Many(models) => {
                    serde_json::Value::Array(models.iter().map(Model::to_value).collect())
                }
            };
            map.insert(name.clone(), value);
        }
        serde_json::Value::Object(map)
    }

    /// Serializes to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_value())?)
    }

    fn json_of(&self, value: &Value) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::Number((*n).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Blob(b) => {
                serde_json::Value::Array(b.iter().map(|byte| (*byte).into()).collect())
            }
            Value::DateTime(dt) => serde_json::Value::String(
                dt.format(self.def.get_date_format()).to_string(),
            ),
        }
    }
}

pub(crate) fn to_record(attrs: BTreeMap<String, Value>) -> Record {
    attrs
        .into_iter()
        .map(|(k, v)| (k, Operand::Value(v)))
        .collect()
}
