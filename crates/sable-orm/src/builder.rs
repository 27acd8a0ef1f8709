//! Model-level query builder.
//!
//! Wraps a [`QueryBuilder`] pre-set to an entity's table, hydrates result
//! rows into [`Model`]s, and orchestrates eager loading for the relation
//! names recorded by [`ModelBuilder::with`].

use std::sync::Arc;

use sable_query::{IntoValue, Operand, QueryBuilder};

use crate::entity::EntityDef;
use crate::error::{OrmError, Result};
use crate::model::Model;
use crate::orm::Orm;
use crate::relations::build_relation;

/// A lazy, chainable query over one entity type.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    def: Arc<EntityDef>,
    query: QueryBuilder,
    eager: Vec<String>,
}

/// One page of hydrated models plus totals.
#[derive(Debug, Clone)]
pub struct ModelPage {
    pub models: Vec<Model>,
    pub total: i64,
    pub per_page: i64,
    pub current_page: i64,
    pub last_page: i64,
}

impl ModelBuilder {
    /// Creates a builder targeting the entity's table.
    #[must_use]
    pub fn new(def: Arc<EntityDef>) -> Self {
        let query = QueryBuilder::table(def.table());
        Self {
            def,
            query,
            eager: Vec::new(),
        }
    }

    /// Records relation names to eager-load alongside the results.
    #[must_use]
    pub fn with(mut self, names: &[&str]) -> Self {
        self.eager.extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    /// Applies an arbitrary transformation to the underlying query.
    #[must_use]
    pub fn modify_query<F>(mut self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.query = f(self.query);
        self
    }

    /// Returns the underlying query.
    #[must_use]
    pub fn query(&self) -> &QueryBuilder {
        &self.query
    }

    // ---- fluent passthroughs ---------------------------------------------

    /// Adds an `AND column op value` predicate.
    pub fn where_(mut self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.query = self.query.where_(column, operator, value)?;
        Ok(self)
    }

    /// Adds an `OR column op value` predicate.
    pub fn or_where(
        mut self,
        column: &str,
        operator: &str,
        value: impl Into<Operand>,
    ) -> Result<Self> {
        self.query = self.query.or_where(column, operator, value)?;
        Ok(self)
    }

    /// Adds an `AND column = value` predicate.
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<Operand>) -> Self {
        self.query = self.query.where_eq(column, value);
        self
    }

    /// Adds an `AND column IN (values...)` predicate.
    #[must_use]
    pub fn where_in<V: IntoValue>(mut self, column: &str, values: Vec<V>) -> Self {
        self.query = self.query.where_in(column, values);
        self
    }

    /// Adds an `AND column IS NULL` predicate.
    #[must_use]
    pub fn where_null(mut self, column: &str) -> Self {
        self.query = self.query.where_null(column);
        self
    }

    /// Adds an `AND column IS NOT NULL` predicate.
    #[must_use]
    pub fn where_not_null(mut self, column: &str) -> Self {
        self.query = self.query.where_not_null(column);
        self
    }

    /// Appends an ascending ORDER BY entry.
    #[must_use]
    pub fn order_by(mut self, column: &str) -> Self {
        self.query = self.query.order_by(column);
        self
    }

    /// Appends a descending ORDER BY entry.
    #[must_use]
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.query = self.query.order_by_desc(column);
        self
    }

    /// Sets the LIMIT.
    #[must_use]
    pub fn limit(mut self, n: i64) -> Self {
        self.query = self.query.limit(n);
        self
    }

    /// Sets the OFFSET.
    #[must_use]
    pub fn offset(mut self, n: i64) -> Self {
        self.query = self.query.offset(n);
        self
    }

    // ---- execution -------------------------------------------------------

    /// Executes the query, hydrates the rows, and eager-loads any recorded
    /// relations.
    pub async fn get(&self, orm: &Orm) -> Result<Vec<Model>> {
        let rows = self.query.get(orm.connection()).await?;
        let mut models: Vec<Model> = rows
            .into_iter()
            .map(|row| Model::from_row(self.def.clone(), row))
            .collect();
        if !self.eager.is_empty() && !models.is_empty() {
            self.eager_load(orm, &mut models).await?;
        }
        Ok(models)
    }

    /// Returns the first matching model, if any.
    pub async fn first(&self, orm: &Orm) -> Result<Option<Model>> {
        let models = self.clone().limit(1).get(orm).await?;
        Ok(models.into_iter().next())
    }

    /// Returns the first matching model or a `NotFound` error carrying the
    /// entity name.
    pub async fn first_or_fail(&self, orm: &Orm) -> Result<Model> {
        self.first(orm).await?.ok_or_else(|| OrmError::NotFound {
            entity: self.def.name().to_string(),
        })
    }

    /// Returns the model with the given primary key, if any.
    pub async fn find(&self, orm: &Orm, id: impl IntoValue + Send) -> Result<Option<Model>> {
        self.clone()
            .where_eq(self.def.key_name(), id.into_value())
            .first(orm)
            .await
    }

    /// Returns the model with the given primary key or a `NotFound` error.
    pub async fn find_or_fail(&self, orm: &Orm, id: impl IntoValue + Send) -> Result<Model> {
        self.find(orm, id).await?.ok_or_else(|| OrmError::NotFound {
            entity: self.def.name().to_string(),
        })
    }

    /// Counts matching rows.
    pub async fn count(&self, orm: &Orm) -> Result<i64> {
        Ok(self.query.count(orm.connection()).await?)
    }

    /// Returns whether any row matches.
    pub async fn exists(&self, orm: &Orm) -> Result<bool> {
        Ok(self.query.exists(orm.connection()).await?)
    }

    /// Fetches one page of hydrated models plus the total count.
    pub async fn paginate(&self, orm: &Orm, page: i64, per_page: i64) -> Result<ModelPage> {
        let page = page.max(1);
        let total = self.query.pagination_count(orm.connection()).await?;
        let models = self
            .clone()
            .offset((page - 1) * per_page)
            .limit(per_page)
            .get(orm)
            .await?;
        let last_page = if total == 0 {
            1
        } else {
            (total + per_page - 1) / per_page
        };
        Ok(ModelPage {
            models,
            total,
            per_page,
            current_page: page,
            last_page,
        })
    }

    /// Runs each recorded relation as one batch query and attaches the
    /// results to their parents.
    async fn eager_load(&self, orm: &Orm, models: &mut Vec<Model>) -> Result<()> {
        for name in &self.eager {
            let rel_def = self
                .def
                .relation(name)
                .cloned()
                .ok_or_else(|| OrmError::RelationNotDefined(name.clone()))?;
            let mut relation = build_relation(&rel_def, &self.def, None);
            relation.add_eager_constraints(models);
            relation.init_relation(models, name);
            let results = relation.get_eager(orm).await?;
            tracing::debug!(
                relation = %name,
                parents = models.len(),
                matched = results.len(),
                "eager loaded relation"
            );
            relation.match_eager(models, results, name);
        }
        Ok(())
    }
}
