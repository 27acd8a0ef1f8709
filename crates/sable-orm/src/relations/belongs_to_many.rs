//! Many-to-many association through a pivot table.
//!
//! The related query joins the pivot table and aliases pivot columns with a
//! `pivot_` prefix; hydration splits them back out into a synthetic `pivot`
//! relation on every related model. Pivot membership is mutated directly on
//! the join table (`attach`/`detach`/`sync`), never through the related
//! entity's own persistence.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use sable_query::{IntoValue, Operand, QueryBuilder, Record, Value};

use super::{unique_keys, value_key, Relation};
use crate::builder::ModelBuilder;
use crate::entity::EntityDef;
use crate::error::Result;
use crate::model::{Model, Related};
use crate::orm::Orm;

/// Membership changes computed by [`BelongsToMany::sync`].
#[derive(Debug, Clone, Default)]
pub struct SyncChanges {
    pub attached: Vec<Value>,
    pub detached: Vec<Value>,
}

/// A `BelongsToMany` relation.
#[derive(Debug, Clone)]
pub struct BelongsToMany {
    query: ModelBuilder,
    pivot_def: Arc<EntityDef>,
    pivot_table: String,
    foreign_pivot_key: String,
    related_pivot_key: String,
    parent_key: String,
    parent: Option<Model>,
}

impl BelongsToMany {
    pub(crate) fn new(
        related: Arc<EntityDef>,
        parent_def: &Arc<EntityDef>,
        pivot_table: String,
        foreign_pivot_key: String,
        related_pivot_key: String,
        parent: Option<&Model>,
    ) -> Self {
        let parent_key = parent_def.key_name().to_string();
        let related_table = related.table().to_string();
        let related_key = related.key_name().to_string();

        let foreign_alias =
            format!("{pivot_table}.{foreign_pivot_key} as pivot_{foreign_pivot_key}");
        let related_alias =
            format!("{pivot_table}.{related_pivot_key} as pivot_{related_pivot_key}");
        let mut query = ModelBuilder::new(related).modify_query(|q| {
            q.select(&[&format!("{related_table}.*")])
                .add_select(&[foreign_alias.as_str(), related_alias.as_str()])
                .inner_join(
                    &pivot_table,
                    &format!("{related_table}.{related_key}"),
                    &format!("{pivot_table}.{related_pivot_key}"),
                )
        });
        if let Some(parent) = parent {
            query = query.where_eq(
                &format!("{pivot_table}.{foreign_pivot_key}"),
                parent.get_attribute(&parent_key),
            );
        }

        let pivot_def = EntityDef::new(&pivot_table).without_timestamps().shared();
        Self {
            query,
            pivot_def,
            pivot_table,
            foreign_pivot_key,
            related_pivot_key,
            parent_key,
            parent: parent.cloned(),
        }
    }

    /// Splits the `pivot_`-prefixed columns of a hydrated model into its
    /// synthetic `pivot` relation.
    fn hydrate_pivot(&self, model: &mut Model) {
        let pivot_attrs = model.extract_prefixed("pivot_");
        let pivot = Model::from_row(self.pivot_def.clone(), pivot_attrs);
        model.set_relation("pivot", Related::One(Some(Box::new(pivot))));
    }

    fn pivot_owner_key(&self, model: &Model) -> Value {
        match model.relation("pivot") {
            Some(Related::One(Some(pivot))) => pivot.get_attribute(&self.foreign_pivot_key),
            _ => Value::Null,
        }
    }

    fn parent_key_value(&self) -> Value {
        self.parent
            .as_ref()
            .map_or(Value::Null, |p| p.get_attribute(&self.parent_key))
    }

    fn pivot_query(&self) -> QueryBuilder {
        QueryBuilder::table(&self.pivot_table)
            .where_eq(&self.foreign_pivot_key, self.parent_key_value())
    }

    // ---- pivot lifecycle -------------------------------------------------

    /// Inserts pivot rows linking this parent to the given ids, as one
    /// batch insert.
    pub async fn attach<V: IntoValue>(&self, orm: &Orm, ids: Vec<V>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let parent_value = self.parent_key_value();
        let records: Vec<Record> = ids
            .into_iter()
            .map(|id| {
                let mut record = Record::new();
                record.insert(
                    self.foreign_pivot_key.clone(),
                    Operand::Value(parent_value.clone()),
                );
                record.insert(
                    self.related_pivot_key.clone(),
                    Operand::Value(id.into_value()),
                );
                record
            })
            .collect();
        QueryBuilder::table(&self.pivot_table)
            .insert(orm.connection(), &records)
            .await?;
        Ok(())
    }

    /// Deletes pivot rows for the given ids, or every row of this parent
    /// when `None`. Returns the detached count.
    pub async fn detach<V: IntoValue>(&self, orm: &Orm, ids: Option<Vec<V>>) -> Result<u64> {
        let mut query = self.pivot_query();
        if let Some(ids) = ids {
            let ids: Vec<Value> = ids.into_iter().map(IntoValue::into_value).collect();
            query = query.where_in(&self.related_pivot_key, ids);
        }
        Ok(query.delete(orm.connection()).await?)
    }

    /// Reconciles pivot membership with the desired id set: the symmetric
    /// difference against the currently attached ids becomes exactly one
    /// batch detach and one batch attach.
    pub async fn sync<V: IntoValue>(&self, orm: &Orm, ids: Vec<V>) -> Result<SyncChanges> {
        let mut desired: Vec<Value> = Vec::new();
        let mut desired_keys = HashSet::new();
        for id in ids {
            let value = id.into_value();
            if desired_keys.insert(value_key(&value)) {
                desired.push(value);
            }
        }

        let current = self
            .pivot_query()
            .lists(orm.connection(), &self.related_pivot_key)
            .await?;
        let current_keys: HashSet<String> = current.iter().map(value_key).collect();

        let detached: Vec<Value> = current
            .iter()
            .filter(|v| !desired_keys.contains(&value_key(v)))
            .cloned()
            .collect();
        let attached: Vec<Value> = desired
            .into_iter()
            .filter(|v| !current_keys.contains(&value_key(v)))
            .collect();

        if !detached.is_empty() {
            self.detach(orm, Some(detached.clone())).await?;
        }
        if !attached.is_empty() {
            self.attach(orm, attached.clone()).await?;
        }
        Ok(SyncChanges { attached, detached })
    }
}

#[async_trait]
impl Relation for BelongsToMany {
    fn add_eager_constraints(&mut self, models: &[Model]) {
        let keys = unique_keys(models, &self.parent_key);
        let column = format!("{}.{}", self.pivot_table, self.foreign_pivot_key);
        self.query = self.query.clone().where_in(&column, keys);
    }

    fn init_relation(&self, models: &mut [Model], name: &str) {
        for model in models.iter_mut() {
            model.set_relation(name, Related::Many(Vec::new()));
        }
    }

    fn match_eager(&self, models: &mut [Model], results: Vec<Model>, name: &str) {
        let mut dictionary: HashMap<String, Vec<Model>> = HashMap::new();
        for related in results {
            let key = value_key(&self.pivot_owner_key(&related));
            dictionary.entry(key).or_default().push(related);
        }
        for model in models.iter_mut() {
            let key = value_key(&model.get_attribute(&self.parent_key));
            let related = dictionary.get(&key).cloned().unwrap_or_default();
            model.set_relation(name, Related::Many(related));
        }
    }

    async fn get_results(&self, orm: &Orm) -> Result<Related> {
        Ok(Related::Many(self.get_eager(orm).await?))
    }

    async fn get_eager(&self, orm: &Orm) -> Result<Vec<Model>> {
        let mut models = self.query.get(orm).await?;
        for model in &mut models {
            self.hydrate_pivot(model);
        }
        Ok(models)
    }
}
