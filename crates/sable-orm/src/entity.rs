//! Entity descriptors.
//!
//! An [`EntityDef`] is the class-level half of a model: table and key names,
//! mass-assignment lists, date casting, mutator hooks, and relation
//! definitions. One descriptor is built per entity type and shared across
//! every instance through an `Arc`; define them once (a `once_cell` static
//! works well) and clone the handle freely.
//!
//! ```
//! use sable_orm::EntityDef;
//!
//! let users = EntityDef::new("users")
//!     .fillable(&["name", "email"])
//!     .hidden(&["password"])
//!     .shared();
//! assert!(users.is_fillable("name"));
//! assert!(!users.is_fillable("is_admin"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sable_query::Value;

use crate::relations::RelationDef;

/// A registered attribute transform, applied on write (mutator) or read
/// (accessor).
pub type Mutator = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Deferred handle to another entity's descriptor. A plain function pointer
/// so mutually-referencing definitions never recurse at initialization.
pub type EntityRef = fn() -> Arc<EntityDef>;

/// Class-level metadata shared by every instance of an entity type.
pub struct EntityDef {
    name: String,
    table: String,
    primary_key: String,
    incrementing: bool,
    unguarded: bool,
    fillable: Vec<String>,
    guarded: Vec<String>,
    hidden: Vec<String>,
    dates: Vec<String>,
    timestamps: bool,
    date_format: String,
    set_mutators: HashMap<String, Mutator>,
    get_accessors: HashMap<String, Mutator>,
    relations: HashMap<String, RelationDef>,
}

impl EntityDef {
    /// Creates a descriptor for the given table. Defaults mirror the common
    /// case: primary key `id`, auto-incrementing, timestamps on, everything
    /// guarded against mass assignment until `fillable` is set.
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            name: table.to_string(),
            table: table.to_string(),
            primary_key: "id".to_string(),
            incrementing: true,
            unguarded: false,
            fillable: Vec::new(),
            guarded: vec!["*".to_string()],
            hidden: Vec::new(),
            dates: Vec::new(),
            timestamps: true,
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
            set_mutators: HashMap::new(),
            get_accessors: HashMap::new(),
            relations: HashMap::new(),
        }
    }

    /// Overrides the entity name used in error messages.
    #[must_use]
    pub fn entity_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Overrides the primary key column.
    #[must_use]
    pub fn primary_key(mut self, key: &str) -> Self {
        self.primary_key = key.to_string();
        self
    }

    /// Marks the primary key as application-assigned.
    #[must_use]
    pub const fn non_incrementing(mut self) -> Self {
        self.incrementing = false;
        self
    }

    /// Sets the mass-assignment whitelist.
    #[must_use]
    pub fn fillable(mut self, keys: &[&str]) -> Self {
        self.fillable = keys.iter().map(|k| (*k).to_string()).collect();
        self
    }

    /// Sets the mass-assignment blacklist (`*` guards everything).
    #[must_use]
    pub fn guarded(mut self, keys: &[&str]) -> Self {
        self.guarded = keys.iter().map(|k| (*k).to_string()).collect();
        self
    }

    /// Disables mass-assignment guarding entirely.
    #[must_use]
    pub const fn unguarded(mut self) -> Self {
        self.unguarded = true;
        self
    }

    /// Sets the keys omitted from serialization.
    #[must_use]
    pub fn hidden(mut self, keys: &[&str]) -> Self {
        self.hidden = keys.iter().map(|k| (*k).to_string()).collect();
        self
    }

    /// Sets the date-cast attributes.
    #[must_use]
    pub fn dates(mut self, keys: &[&str]) -> Self {
        self.dates = keys.iter().map(|k| (*k).to_string()).collect();
        self
    }

    /// Disables `created_at`/`updated_at` maintenance.
    #[must_use]
    pub const fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Overrides the date format used for date-cast attributes and
    /// timestamps.
    #[must_use]
    pub fn date_format(mut self, format: &str) -> Self {
        self.date_format = format.to_string();
        self
    }

    /// Registers a write-side transform for an attribute.
    #[must_use]
    pub fn set_mutator<F>(mut self, key: &str, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.set_mutators.insert(key.to_string(), Arc::new(f));
        self
    }

    /// Registers a read-side transform for an attribute.
    #[must_use]
    pub fn get_accessor<F>(mut self, key: &str, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.get_accessors.insert(key.to_string(), Arc::new(f));
        self
    }

    /// Defines a has-one relation keyed by `foreign_key` on the related
    /// table.
    #[must_use]
    pub fn has_one(mut self, name: &str, related: EntityRef, foreign_key: &str) -> Self {
        self.relations.insert(
            name.to_string(),
            RelationDef::HasOne {
                related,
                foreign_key: foreign_key.to_string(),
            },
        );
        self
    }

    /// Defines a has-many relation keyed by `foreign_key` on the related
    /// table.
    #[must_use]
    pub fn has_many(mut self, name: &str, related: EntityRef, foreign_key: &str) -> Self {
        self.relations.insert(
            name.to_string(),
            RelationDef::HasMany {
                related,
                foreign_key: foreign_key.to_string(),
            },
        );
        self
    }

    /// Defines an inverse relation keyed by `foreign_key` on this table.
    #[must_use]
    pub fn belongs_to(mut self, name: &str, related: EntityRef, foreign_key: &str) -> Self {
        self.relations.insert(
            name.to_string(),
            RelationDef::BelongsTo {
                related,
                foreign_key: foreign_key.to_string(),
            },
        );
        self
    }

    /// Defines a many-to-many relation through a pivot table.
    #[must_use]
    pub fn belongs_to_many(
        mut self,
        name: &str,
        related: EntityRef,
        pivot_table: &str,
        foreign_pivot_key: &str,
        related_pivot_key: &str,
    ) -> Self {
        self.relations.insert(
            name.to_string(),
            RelationDef::BelongsToMany {
                related,
                pivot_table: pivot_table.to_string(),
                foreign_pivot_key: foreign_pivot_key.to_string(),
                related_pivot_key: related_pivot_key.to_string(),
            },
        );
        self
    }

    /// Finishes the fluent chain and wraps the descriptor for sharing.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    // ---- accessors -------------------------------------------------------

    /// Returns the entity name used in error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the primary key column.
    #[must_use]
    pub fn key_name(&self) -> &str {
        &self.primary_key
    }

    /// Returns whether the primary key is database-assigned.
    #[must_use]
    pub const fn is_incrementing(&self) -> bool {
        self.incrementing
    }

    /// Returns whether `created_at`/`updated_at` are maintained.
    #[must_use]
    pub const fn uses_timestamps(&self) -> bool {
        self.timestamps
    }

    /// Returns the date format for date-cast attributes.
    #[must_use]
    pub fn get_date_format(&self) -> &str {
        &self.date_format
    }

    /// Returns whether a key survives mass assignment.
    ///
    /// Whitelist wins when present; otherwise the blacklist applies, with
    /// `*` guarding everything.
    #[must_use]
    pub fn is_fillable(&self, key: &str) -> bool {
        if self.unguarded {
            return true;
        }
        if !self.fillable.is_empty() {
            return self.fillable.iter().any(|k| k == key);
        }
        !self.guarded.iter().any(|k| k == key || k == "*")
    }

    /// Returns whether a key is omitted from serialization.
    #[must_use]
    pub fn is_hidden(&self, key: &str) -> bool {
        self.hidden.iter().any(|k| k == key)
    }

    /// Returns whether a key is date-cast. Timestamp columns are date-cast
    /// implicitly while timestamps are enabled.
    #[must_use]
    pub fn is_date(&self, key: &str) -> bool {
        if self.timestamps && (key == "created_at" || key == "updated_at") {
            return true;
        }
        self.dates.iter().any(|k| k == key)
    }

    /// Looks up a relation definition.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    pub(crate) fn mutate_set(&self, key: &str, value: Value) -> Value {
        match self.set_mutators.get(key) {
            Some(mutator) => mutator(value),
            None => value,
        }
    }

    pub(crate) fn mutate_get(&self, key: &str, value: Value) -> Value {
        match self.get_accessors.get(key) {
            Some(accessor) => accessor(value),
            None => value,
        }
    }
}

impl fmt::Debug for EntityDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDef")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("incrementing", &self.incrementing)
            .field("timestamps", &self.timestamps)
            .field("fillable", &self.fillable)
            .field("guarded", &self.guarded)
            .field("hidden", &self.hidden)
            .field("dates", &self.dates)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fillable_whitelist_wins() {
        let def = EntityDef::new("users").fillable(&["name"]);
        assert!(def.is_fillable("name"));
        assert!(!def.is_fillable("password"));
    }

    #[test]
    fn test_guarded_star_blocks_everything() {
        let def = EntityDef::new("users");
        assert!(!def.is_fillable("name"));
    }

    #[test]
    fn test_guarded_blacklist() {
        let def = EntityDef::new("users").guarded(&["is_admin"]);
        assert!(def.is_fillable("name"));
        assert!(!def.is_fillable("is_admin"));
    }

    #[test]
    fn test_unguarded_bypasses_lists() {
        let def = EntityDef::new("users").unguarded();
        assert!(def.is_fillable("anything"));
    }

    #[test]
    fn test_timestamp_columns_are_date_cast() {
        let def = EntityDef::new("users");
        assert!(def.is_date("created_at"));
        let bare = EntityDef::new("users").without_timestamps();
        assert!(!bare.is_date("created_at"));
    }

    #[test]
    fn test_mutator_applies() {
        let def = EntityDef::new("users").set_mutator("name", |v| match v {
            Value::Text(s) => Value::Text(s.to_ascii_lowercase()),
            other => other,
        });
        assert_eq!(
            def.mutate_set("name", Value::Text("ALICE".into())),
            Value::Text("alice".into())
        );
    }
}
