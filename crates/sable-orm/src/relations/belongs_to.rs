//! Inverse association.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{unique_keys, value_key, Relation};
use crate::builder::ModelBuilder;
use crate::entity::EntityDef;
use crate::error::Result;
use crate::model::{Model, Related};
use crate::orm::Orm;

/// A `BelongsTo` relation: this entity carries the owner's key in its
/// `foreign_key` column.
#[derive(Debug, Clone)]
pub struct BelongsTo {
    query: ModelBuilder,
    foreign_key: String,
    owner_key: String,
}

impl BelongsTo {
    pub(crate) fn new(related: Arc<EntityDef>, foreign_key: String, parent: Option<&Model>) -> Self {
        let owner_key = related.key_name().to_string();
        let mut query = ModelBuilder::new(related);
        if let Some(parent) = parent {
            query = query.where_eq(&owner_key, parent.get_attribute(&foreign_key));
        }
        Self {
            query,
            foreign_key,
            owner_key,
        }
    }
}

#[async_trait]
impl Relation for BelongsTo {
    /// Gathers the parents' foreign-key values, since the owners are looked
    /// up by their own key.
    fn add_eager_constraints(&mut self, models: &[Model]) {
        let keys = unique_keys(models, &self.foreign_key);
        self.query = self.query.clone().where_in(&self.owner_key, keys);
    }

    fn init_relation(&self, models: &mut [Model], name: &str) {
        for model in models.iter_mut() {
            model.set_relation(name, Related::One(None));
        }
    }

    fn match_eager(&self, models: &mut [Model], results: Vec<Model>, name: &str) {
        let mut dictionary: HashMap<String, Model> = HashMap::new();
        for owner in results {
            let key = value_key(&owner.get_attribute(&self.owner_key));
            dictionary.entry(key).or_insert(owner);
        }
        for model in models.iter_mut() {
            let key = value_key(&model.get_attribute(&self.foreign_key));
            let owner = dictionary.get(&key).cloned().map(Box::new);
            model.set_relation(name, Related::One(owner));
        }
    }

    async fn get_results(&self, orm: &Orm) -> Result<Related> {
        Ok(Related::One(self.query.first(orm).await?.map(Box::new)))
    }

    async fn get_eager(&self, orm: &Orm) -> Result<Vec<Model>> {
        self.query.get(orm).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_query::{Row, Value};

    fn model(def: &Arc<EntityDef>, pairs: &[(&str, i64)]) -> Model {
        let row: Row = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::Int(*v)))
            .collect();
        Model::from_row(def.clone(), row)
    }

    #[test]
    fn test_eager_constraints_use_the_parents_foreign_keys() {
        let users = EntityDef::new("users").without_timestamps().shared();
        let posts = EntityDef::new("posts").without_timestamps().shared();

        let children = vec![
            model(&posts, &[("id", 1), ("user_id", 9)]),
            model(&posts, &[("id", 2), ("user_id", 7)]),
            model(&posts, &[("id", 3), ("user_id", 9)]),
        ];

        let mut relation = BelongsTo::new(users, "user_id".to_string(), None);
        relation.add_eager_constraints(&children);
        assert_eq!(
            relation.query.query().bindings(),
            vec![Value::Int(9), Value::Int(7)]
        );
    }

    #[test]
    fn test_match_assigns_each_child_its_owner() {
        let users = EntityDef::new("users").without_timestamps().shared();
        let posts = EntityDef::new("posts").without_timestamps().shared();

        let mut children = vec![
            model(&posts, &[("id", 1), ("user_id", 9)]),
            model(&posts, &[("id", 2), ("user_id", 8)]),
        ];
        let owners = vec![model(&users, &[("id", 9)])];

        let relation = BelongsTo::new(users, "user_id".to_string(), None);
        relation.init_relation(&mut children, "author");
        relation.match_eager(&mut children, owners, "author");

        let Some(Related::One(Some(owner))) = children[0].relation("author") else {
            panic!("expected a matched owner");
        };
        assert_eq!(owner.get_attribute("id"), Value::Int(9));
        assert!(matches!(
            children[1].relation("author"),
            Some(Related::One(None))
        ));
    }
}
