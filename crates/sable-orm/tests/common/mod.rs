//! Shared fixtures: a recording fake connection and a small entity graph.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use sable_orm::EntityDef;
use sable_query::{Connection, Grammar, Result, Row, Value};

pub struct FakeConnection {
    grammar: Grammar,
    log: Mutex<Vec<(String, Vec<Value>)>>,
    responses: Mutex<VecDeque<Vec<Row>>>,
    last_id: Mutex<Value>,
}

impl FakeConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            grammar: Grammar::new(),
            log: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            last_id: Mutex::new(Value::Int(1)),
        })
    }

    /// Queues rows for the next SELECT.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.responses.lock().unwrap().push_back(rows);
    }

    pub fn set_last_insert_id(&self, id: Value) {
        *self.last_id.lock().unwrap() = id;
    }

    /// Returns every executed statement with its bindings, in order.
    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, bindings: &[Value]) {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), bindings.to_vec()));
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn select(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>> {
        self.record(sql, bindings);
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn insert(&self, sql: &str, bindings: &[Value]) -> Result<bool> {
        self.record(sql, bindings);
        Ok(true)
    }

    async fn update(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        self.record(sql, bindings);
        Ok(1)
    }

    async fn delete(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        self.record(sql, bindings);
        Ok(1)
    }

    async fn statement(&self, sql: &str, bindings: &[Value]) -> Result<bool> {
        self.record(sql, bindings);
        Ok(true)
    }

    async fn last_insert_id(&self, _sequence: Option<&str>) -> Result<Value> {
        Ok(self.last_id.lock().unwrap().clone())
    }

    fn grammar(&self) -> &Grammar {
        &self.grammar
    }
}

/// Builds a result row from `(column, value)` pairs.
pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

pub static USERS: Lazy<Arc<EntityDef>> = Lazy::new(|| {
    EntityDef::new("users")
        .entity_name("User")
        .fillable(&["name", "email", "age"])
        .hidden(&["password"])
        .without_timestamps()
        .has_many("posts", || POSTS.clone(), "user_id")
        .has_one("profile", || PROFILES.clone(), "user_id")
        .belongs_to_many("tags", || TAGS.clone(), "user_tag", "user_id", "tag_id")
        .shared()
});

pub static POSTS: Lazy<Arc<EntityDef>> = Lazy::new(|| {
    EntityDef::new("posts")
        .entity_name("Post")
        .fillable(&["title", "user_id"])
        .without_timestamps()
        .belongs_to("author", || USERS.clone(), "user_id")
        .shared()
});

pub static PROFILES: Lazy<Arc<EntityDef>> = Lazy::new(|| {
    EntityDef::new("profiles")
        .entity_name("Profile")
        .fillable(&["bio", "user_id"])
        .without_timestamps()
        .shared()
});

pub static TAGS: Lazy<Arc<EntityDef>> = Lazy::new(|| {
    EntityDef::new("tags")
        .entity_name("Tag")
        .fillable(&["name"])
        .without_timestamps()
        .shared()
});
