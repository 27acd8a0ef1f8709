//! A small blog schema exercising the builder, the ORM, and relations
//! against an in-memory SQLite database.
//!
//! Run with: `cargo run --example blog -p sable-sqlite`

use std::sync::Arc;

use once_cell::sync::Lazy;
use sable_orm::{EntityDef, Orm, Related};
use sable_query::{Connection, QueryBuilder, Value};
use sable_sqlite::SqliteConnection;

static USERS: Lazy<Arc<EntityDef>> = Lazy::new(|| {
    EntityDef::new("users")
        .entity_name("User")
        .fillable(&["name", "email"])
        .hidden(&["email"])
        .without_timestamps()
        .has_many("posts", || POSTS.clone(), "user_id")
        .shared()
});

static POSTS: Lazy<Arc<EntityDef>> = Lazy::new(|| {
    EntityDef::new("posts")
        .entity_name("Post")
        .fillable(&["title", "user_id"])
        .without_timestamps()
        .belongs_to("author", || USERS.clone(), "user_id")
        .shared()
});

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let conn = SqliteConnection::connect("sqlite::memory:").await?;
    conn.statement(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, email TEXT)",
        &[],
    )
    .await?;
    conn.statement(
        "CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER, title TEXT)",
        &[],
    )
    .await?;

    let orm = Orm::new(Arc::new(conn));

    let ada = orm
        .create(
            &USERS,
            vec![
                ("name", Value::Text("Ada".into())),
                ("email", Value::Text("ada@example.com".into())),
            ],
        )
        .await?;
    for title in ["Hello, world", "Queries as values"] {
        orm.create(
            &POSTS,
            vec![
                ("title", Value::Text(title.into())),
                ("user_id", ada.key()),
            ],
        )
        .await?;
    }

    let users = orm.query(&USERS).with(&["posts"]).get(&orm).await?;
    for user in &users {
        let count = match user.relation("posts") {
            Some(Related::Many(posts)) => posts.len(),
            _ => 0,
        };
        println!(
            "{:?} has {count} post(s): {}",
            user.get_attribute("name"),
            user.to_json()?
        );
    }

    let recent = QueryBuilder::table("posts")
        .where_("id", ">=", 1)?
        .order_by_desc("id")
        .limit(5)
        .get(orm.connection())
        .await?;
    println!("{} recent posts", recent.len());

    Ok(())
}
