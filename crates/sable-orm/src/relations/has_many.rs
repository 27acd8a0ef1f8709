//! One-to-many association.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{unique_keys, value_key, Relation};
use crate::builder::ModelBuilder;
use crate::entity::EntityDef;
use crate::error::Result;
use crate::model::{Model, Related};
use crate::orm::Orm;

/// A `HasMany` relation: many related rows carry this entity's key in their
/// `foreign_key` column.
#[derive(Debug, Clone)]
pub struct HasMany {
    query: ModelBuilder,
    foreign_key: String,
    local_key: String,
}

impl HasMany {
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
impl Relation for HasMany {
    fn add_eager_constraints(&mut self, models: &[Model]) {
        let keys = unique_keys(models, &self.local_key);
        self.query = self.query.clone().where_in(&self.foreign_key, keys);
    }

    fn init_relation(&self, models: &mut [Model], name: &str) {
        for model in models.iter_mut() {
            model.set_relation(name, Related::Many(Vec::new()));
        }
    }

    fn match_eager(&self, models: &mut [Model], results: Vec<Model>, name: &str) {
        let mut dictionary: HashMap<String, Vec<Model>> = HashMap::new();
        for related in results {
            let key = value_key(&related.get_attribute(&self.foreign_key));
            dictionary.entry(key).or_default().push(related);
        }
        for model in models.iter_mut() {
            let key = value_key(&model.get_attribute(&self.local_key));
            let children = dictionary.get(&key).cloned().unwrap_or_default();
            model.set_relation(name, Related::Many(children));
        }
    }

    async fn get_results(&self, orm: &Orm) -> Result<Related> {
        Ok(Related::Many(self.query.get(orm).await?))
    }

    async fn get_eager(&self, orm: &Orm) -> Result<Vec<Model>> {
        self.query.get(orm).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_query::{Row, Value};

    fn parents_def() -> Arc<EntityDef> {
        EntityDef::new("parents").without_timestamps().shared()
    }

    fn children_def() -> Arc<EntityDef> {
        EntityDef::new("children").without_timestamps().shared()
    }

    fn model(def: &Arc<EntityDef>, pairs: &[(&str, i64)]) -> Model {
        let row: Row = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::Int(*v)))
            .collect();
        Model::from_row(def.clone(), row)
    }

    #[test]
    fn test_match_assigns_children_to_the_right_parents() {
        let parents_def = parents_def();
        let children_def = children_def();

        let mut parents = vec![
            model(&parents_def, &[("id", 1)]),
            model(&parents_def, &[("id", 2)]),
            model(&parents_def, &[("id", 3)]),
        ];
        let children = vec![
            model(&children_def, &[("id", 10), ("parent_id", 1)]),
            model(&children_def, &[("id", 11), ("parent_id", 1)]),
            model(&children_def, &[("id", 12), ("parent_id", 2)]),
        ];

        let relation = HasMany::new(
            children_def,
            &parents_def,
            "parent_id".to_string(),
            None,
        );
        relation.init_relation(&mut parents, "children");
        relation.match_eager(&mut parents, children, "children");

        let Some(Related::Many(first)) = parents[0].relation("children") else {
            panic!("expected many relation");
        };
        let ids: Vec<Value> = first.iter().map(|m| m.get_attribute("id")).collect();
        assert_eq!(ids, vec![Value::Int(10), Value::Int(11)]);

        let Some(Related::Many(second)) = parents[1].relation("children") else {
            panic!("expected many relation");
        };
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].get_attribute("id"), Value::Int(12));

        let Some(Related::Many(third)) = parents[2].relation("children") else {
            panic!("expected many relation");
        };
        assert!(third.is_empty());
    }

    #[test]
    fn test_eager_constraints_collect_distinct_parent_keys() {
        let parents_def = parents_def();
        let parents = vec![
            model(&parents_def, &[("id", 1)]),
            model(&parents_def, &[("id", 1)]),
            model(&parents_def, &[("id", 2)]),
        ];

        let mut relation = HasMany::new(
            children_def(),
            &parents_def,
            "parent_id".to_string(),
            None,
        );
        relation.add_eager_constraints(&parents);
        assert_eq!(
            relation.query.query().bindings(),
            vec![Value::Int(1), Value::Int(2)]
        );
    }
}
