//! Relation strategies.
//!
//! Each association kind implements [`Relation`]: constrain the related
//! query for a single parent (lazy load) or a whole hydrated page of parents
//! (eager load), seed defaults, and match the batch results back onto their
//! owners. Whether constraints apply is decided by the explicit parent
//! argument at construction time; there is no shared toggle state.

pub mod belongs_to;
pub mod belongs_to_many;
pub mod has_many;
pub mod has_one;

pub use belongs_to::BelongsTo;
pub use belongs_to_many::{BelongsToMany, SyncChanges};
pub use has_many::HasMany;
pub use has_one::HasOne;

use std::sync::Arc;

use async_trait::async_trait;
use sable_query::Value;

use crate::entity::{EntityDef, EntityRef};
use crate::error::Result;
use crate::model::{Model, Related};
use crate::orm::Orm;

/// A relation definition registered on an [`EntityDef`].
///
/// Key conventions follow the common defaults: the local/owner/parent key is
/// always the respective entity's primary key.
#[derive(Debug, Clone)]
pub enum RelationDef {
    HasOne {
        related: EntityRef,
        foreign_key: String,
    },
    HasMany {
        related: EntityRef,
        foreign_key: String,
    },
    BelongsTo {
        related: EntityRef,
        foreign_key: String,
    },
    BelongsToMany {
        related: EntityRef,
        pivot_table: String,
        foreign_pivot_key: String,
        related_pivot_key: String,
    },
}

/// Strategy interface over the association kinds.
#[async_trait]
pub trait Relation: Send + Sync {
    /// Constrains the related query to the set of owning keys across a
    /// hydrated page of parents.
    fn add_eager_constraints(&mut self, models: &[Model]);

    /// Seeds every parent with the relation's empty default before matching.
    fn init_relation(&self, models: &mut [Model], name: &str);

    /// Assigns each parent its related value(s) from the batch results.
    fn match_eager(&self, models: &mut [Model], results: Vec<Model>, name: &str);

    /// Executes the (single-parent) relation query.
    async fn get_results(&self, orm: &Orm) -> Result<Related>;

    /// Executes the batch query for eager loading.
    async fn get_eager(&self, orm: &Orm) -> Result<Vec<Model>>;
}

/// Instantiates the strategy for a definition. Passing a parent applies the
/// single-instance constraints; passing `None` leaves the query open for
/// `add_eager_constraints`.
pub(crate) fn build_relation(
    def: &RelationDef,
    parent_def: &Arc<EntityDef>,
    parent: Option<&Model>,
) -> Box<dyn Relation> {
    match def {
        RelationDef::HasOne { related, foreign_key } => Box::new(HasOne::new(
            related(),
            parent_def,
            foreign_key.clone(),
            parent,
        )),
        RelationDef::HasMany { related, foreign_key } => Box::new(HasMany::new(
            related(),
            parent_def,
            foreign_key.clone(),
            parent,
        )),
        RelationDef::BelongsTo { related, foreign_key } => {
            Box::new(BelongsTo::new(related(), foreign_key.clone(), parent))
        }
        RelationDef::BelongsToMany {
            related,
            pivot_table,
            foreign_pivot_key,
            related_pivot_key,
        } => Box::new(BelongsToMany::new(
            related(),
            parent_def,
            pivot_table.clone(),
            foreign_pivot_key.clone(),
            related_pivot_key.clone(),
            parent,
        )),
    }
}

/// Canonical dictionary key for a value. Variants are prefixed so, say,
/// `Int(1)` and `Text("1")` never collide.
pub(crate) fn value_key(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("b:{b}"),
        Value::Int(n) => format!("i:{n}"),
        Value::Float(f) => format!("f:{f}"),
        Value::Text(s) => format!("s:{s}"),
        Value::Blob(b) => format!("x:{b:02x?}"),
        Value::DateTime(dt) => format!("d:{dt}"),
    }
}

/// Collects the distinct, non-null values of an attribute across a page of
/// models, preserving first-seen order.
pub(crate) fn unique_keys(models: &[Model], attribute: &str) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    let mut keys = Vec::new();
    for model in models {
        let value = model.get_attribute(attribute);
        if value.is_null() {
            continue;
        }
        if seen.insert(value_key(&value)) {
            keys.push(value);
        }
    }
    keys
}
