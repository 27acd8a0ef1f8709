//! # sable-orm
//!
//! An ActiveRecord-style ORM over `sable-query`.
//!
//! This crate provides:
//! - [`EntityDef`]: per-entity metadata built once and shared (table, keys,
//!   mass-assignment lists, date casting, mutators, relations)
//! - [`Model`]: an attribute bag with dirty tracking against an original
//!   snapshot, lifecycle events, and persistence through its own query
//! - [`ModelBuilder`]: hydrates rows into models and eager-loads relations
//! - The relation strategies: [`HasOne`], [`HasMany`], [`BelongsTo`], and
//!   [`BelongsToMany`] with pivot `attach`/`detach`/`sync`
//! - [`Orm`]: the injected connection + event-sink holder
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use once_cell::sync::Lazy;
//! use sable_orm::{EntityDef, Orm};
//!
//! static USERS: Lazy<Arc<EntityDef>> = Lazy::new(|| {
//!     EntityDef::new("users")
//!         .fillable(&["name", "email"])
//!         .has_many("posts", || POSTS.clone(), "user_id")
//!         .shared()
//! });
//! static POSTS: Lazy<Arc<EntityDef>> = Lazy::new(|| {
//!     EntityDef::new("posts")
//!         .fillable(&["title", "body"])
//!         .belongs_to("author", || USERS.clone(), "user_id")
//!         .shared()
//! });
//!
//! async fn example(orm: &Orm) -> sable_orm::Result<()> {
//!     let mut user = orm.create(&USERS, vec![("name", "Ada")]).await?;
//!     user.set_attribute("email", "ada@example.com");
//!     user.save(orm).await?;
//!
//!     let users = orm.query(&USERS).with(&["posts"]).get(orm).await?;
//!     let missing = orm.find_or_fail(&USERS, 999).await; // Err(NotFound)
//!     Ok(())
//! }
//! ```

mod builder;
mod entity;
mod error;
mod events;
mod model;
mod orm;
pub mod relations;

pub use builder::{ModelBuilder, ModelPage};
pub use entity::{EntityDef, EntityRef, Mutator};
pub use error::{OrmError, Result};
pub use events::{EventSink, ModelEvent};
pub use model::{Model, Related};
pub use orm::Orm;
pub use relations::{BelongsTo, BelongsToMany, HasMany, HasOne, Relation, RelationDef, SyncChanges};

// Re-export the query layer's commonly used types.
pub use sable_query::{raw, Expression, IntoValue, Operand, QueryBuilder, Value};
