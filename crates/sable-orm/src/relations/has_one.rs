//! One-to-one association.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{unique_keys, value_key, Relation};
use crate::builder::ModelBuilder;
use crate::entity::EntityDef;
use crate::error::Result;
use crate::model::{Model, Related};
use crate::orm::Orm;

/// A `HasOne` relation: a single related row carries this entity's key in
/// its `foreign_key` column. Matching takes the first hit.
#[derive(Debug, Clone)]
pub struct HasOne {
    query: ModelBuilder,
    foreign_key: String,
    local_key: String,
}

impl HasOne {
    pub(crate) fn new(
        related: Arc<EntityDef>,
        parent_def: &Arc<EntityDef>,
        foreign_key: String,
        parent: Option<&Model>,
    ) -> Self {
        let local_key = parent_def.key_name().to_string();
        let mut query = ModelBuilder::new(related);
        if let Some(parent) = parent {
            query = query.where_eq(&foreign_key, parent.get_attribute(&local_key));
        }
        Self {
            query,
            foreign_key,
            local_key,
        }
    }
}

#[async_trait]
impl Relation for HasOne {
    fn add_eager_constraints(&mut self, models: &[Model]) {
        let keys = unique_keys(models, &self.local_key);
        self.query = self.query.clone().where_in(&self.foreign_key, keys);
    }

    fn init_relation(&self, models: &mut [Model], name: &str) {
        for model in models.iter_mut() {
            model.set_relation(name, Related::One(None));
        }
    }

    fn match_eager(&self, models: &mut [Model], results: Vec<Model>, name: &str) {
        let mut dictionary: HashMap<String, Model> = HashMap::new();
        for related in results {
            let key = value_key(&related.get_attribute(&self.foreign_key));
            dictionary.entry(key).or_insert(related);
        }
        for model in models.iter_mut() {
            let key = value_key(&model.get_attribute(&self.local_key));
            let related = dictionary.get(&key).cloned().map(Box::new);
            model.set_relation(name, Related::One(related));
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
    fn test_match_takes_the_first_hit() {
        let users = EntityDef::new("users").without_timestamps().shared();
        let profiles = EntityDef::new("profiles").without_timestamps().shared();

        let mut parents = vec![model(&users, &[("id", 1)]), model(&users, &[("id", 2)])];
        let results = vec![
            model(&profiles, &[("id", 20), ("user_id", 1)]),
            model(&profiles, &[("id", 21), ("user_id", 1)]),
        ];

        let relation = HasOne::new(profiles, &users, "user_id".to_string(), None);
        relation.init_relation(&mut parents, "profile");
        relation.match_eager(&mut parents, results, "profile");

        let Some(Related::One(Some(profile))) = parents[0].relation("profile") else {
            panic!("expected a matched profile");
        };
        assert_eq!(profile.get_attribute("id"), Value::Int(20));
        assert!(matches!(
            parents[1].relation("profile"),
            Some(Related::One(None))
        ));
    }
}
