//! The ORM entry point.
//!
//! [`Orm`] holds the connection and the optional event sink explicitly, so
//! there is no global resolver state; tests hand it a fake connection and
//! everything downstream follows.

use std::sync::Arc;

use sable_query::{Connection, IntoValue};

use crate::builder::ModelBuilder;
use crate::entity::EntityDef;
use crate::error::Result;
use crate::events::{EventSink, ModelEvent};
use crate::model::Model;

/// Connection plus optional event sink, injected wherever persistence runs.
#[derive(Clone)]
pub struct Orm {
    connection: Arc<dyn Connection>,
    events: Option<Arc<dyn EventSink>>,
}

impl Orm {
    /// Creates an ORM over the given connection.
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            events: None,
        }
    }

    /// Attaches a lifecycle event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Returns the connection.
    #[must_use]
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    /// Starts a query over the given entity.
    #[must_use]
    pub fn query(&self, def: &Arc<EntityDef>) -> ModelBuilder {
        ModelBuilder::new(def.clone())
    }

    /// Fetches every row of the entity's table.
    pub async fn all(&self, def: &Arc<EntityDef>) -> Result<Vec<Model>> {
        self.query(def).get(self).await
    }

    /// Fetches a model by primary key, if any.
    pub async fn find(
        &self,
        def: &Arc<EntityDef>,
        id: impl IntoValue + Send,
    ) -> Result<Option<Model>> {
        self.query(def).find(self, id).await
    }

    /// Fetches a model by primary key or fails with `NotFound`.
    pub async fn find_or_fail(
        &self,
        def: &Arc<EntityDef>,
        id: impl IntoValue + Send,
    ) -> Result<Model> {
        self.query(def).find_or_fail(self, id).await
    }

    /// Mass-assigns a new model and saves it.
    pub async fn create<'a, I, V>(&self, def: &Arc<EntityDef>, attrs: I) -> Result<Model>
    where
        I: IntoIterator<Item = (&'a str, V)> + Send,
        V: IntoValue,
    {
        let mut model = Model::new(def.clone());
        model.fill(attrs);
        model.save(self).await?;
        Ok(model)
    }

    pub(crate) fn until(&self, event: ModelEvent, model: &Model) -> bool {
        self.events
            .as_ref()
            .map_or(true, |sink| sink.until(event, model))
    }

    pub(crate) fn dispatch(&self, event: ModelEvent, model: &Model) {
        if let Some(sink) = &self.events {
            sink.dispatch(event, model);
        }
    }
}
