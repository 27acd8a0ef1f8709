//! Save/delete lifecycle against a fake connection.

mod common;

use std::sync::{Arc, Mutex};

use common::{row, FakeConnection, USERS};
use sable_orm::{EntityDef, EventSink, Model, ModelEvent, Orm, OrmError, Value};

#[tokio::test]
async fn insert_sets_the_primary_key_from_last_insert_id() {
    let conn = FakeConnection::new();
    conn.set_last_insert_id(Value::Int(7));
    let orm = Orm::new(conn.clone());

    let user = orm
        .create(&USERS, vec![("name", Value::Text("Ada".into()))])
        .await
        .unwrap();

    assert!(user.exists());
    assert_eq!(user.key(), Value::Int(7));
    assert!(user.get_dirty().is_empty());

    let (sql, bindings) = conn.executed().remove(0);
    assert_eq!(sql, "INSERT INTO `users` (`name`) VALUES (?)");
    assert_eq!(bindings, vec![Value::Text("Ada".into())]);
}

#[tokio::test]
async fn fill_drops_non_fillable_keys_silently() {
    let conn = FakeConnection::new();
    let orm = Orm::new(conn.clone());

    let user = orm
        .create(
            &USERS,
            vec![
                ("name", Value::Text("x".into())),
                ("password", Value::Text("y".into())),
            ],
        )
        .await
        .unwrap();

    assert_eq!(user.get_attribute("name"), Value::Text("x".into()));
    assert!(!user.attributes().contains_key("password"));

    let (sql, _) = conn.executed().remove(0);
    assert_eq!(sql, "INSERT INTO `users` (`name`) VALUES (?)");
}

#[tokio::test]
async fn update_writes_only_dirty_columns() {
    let conn = FakeConnection::new();
    let orm = Orm::new(conn.clone());

    let mut user = Model::from_row(
        USERS.clone(),
        row(&[
            ("id", Value::Int(1)),
            ("name", Value::Text("a".into())),
            ("age", Value::Int(30)),
        ]),
    );
    user.set_attribute("name", "b");

    assert!(user.save(&orm).await.unwrap());
    assert!(user.get_dirty().is_empty());

    let (sql, bindings) = conn.executed().remove(0);
    assert_eq!(sql, "UPDATE `users` SET `name` = ? WHERE `id` = ?");
    assert_eq!(bindings, vec![Value::Text("b".into()), Value::Int(1)]);
}

#[tokio::test]
async fn clean_update_issues_no_statement_and_still_succeeds() {
    let conn = FakeConnection::new();
    let orm = Orm::new(conn.clone());

    let mut user = Model::from_row(
        USERS.clone(),
        row(&[("id", Value::Int(1)), ("name", Value::Text("a".into()))]),
    );
    user.set_attribute("name", "a");

    assert!(user.save(&orm).await.unwrap());
    assert!(conn.executed().is_empty());
}

#[tokio::test]
async fn delete_is_keyed_by_primary_key_and_clears_exists() {
    let conn = FakeConnection::new();
    let orm = Orm::new(conn.clone());

    let mut user = Model::from_row(USERS.clone(), row(&[("id", Value::Int(3))]));
    assert!(user.delete(&orm).await.unwrap());
    assert!(!user.exists());

    let (sql, bindings) = conn.executed().remove(0);
    assert_eq!(sql, "DELETE FROM `users` WHERE `id` = ?");
    assert_eq!(bindings, vec![Value::Int(3)]);

    // Deleting again is a no-op on a gone instance.
    assert!(!user.delete(&orm).await.unwrap());
    assert_eq!(conn.executed().len(), 1);
}

#[tokio::test]
async fn find_or_fail_carries_the_entity_name() {
    let conn = FakeConnection::new();
    let orm = Orm::new(conn.clone());

    let err = orm.find_or_fail(&USERS, 99).await.unwrap_err();
    match err {
        OrmError::NotFound { entity } => assert_eq!(entity, "User"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn timestamps_are_maintained_when_enabled() {
    let conn = FakeConnection::new();
    let orm = Orm::new(conn.clone());

    let def = EntityDef::new("articles").fillable(&["title"]).shared();
    let article = orm
        .create(&def, vec![("title", Value::Text("t".into()))])
        .await
        .unwrap();

    assert!(article.attributes().contains_key("created_at"));
    assert!(article.attributes().contains_key("updated_at"));
    // Timestamp columns read back as date-times.
    assert!(matches!(
        article.get_attribute("created_at"),
        Value::DateTime(_)
    ));
}

struct RecordingSink {
    cancel: Option<ModelEvent>,
    seen: Mutex<Vec<&'static str>>,
}

impl EventSink for RecordingSink {
    fn until(&self, event: ModelEvent, _model: &Model) -> bool {
        self.seen.lock().unwrap().push(event.name());
        self.cancel != Some(event)
    }

    fn dispatch(&self, event: ModelEvent, _model: &Model) {
        self.seen.lock().unwrap().push(event.name());
    }
}

#[tokio::test]
async fn canceled_saving_hook_aborts_before_any_statement() {
    let conn = FakeConnection::new();
    let sink = Arc::new(RecordingSink {
        cancel: Some(ModelEvent::Saving),
        seen: Mutex::new(Vec::new()),
    });
    let orm = Orm::new(conn.clone()).with_events(sink.clone());

    let mut user = Model::new(USERS.clone());
    user.fill(vec![("name", Value::Text("x".into()))]);

    assert!(!user.save(&orm).await.unwrap());
    assert!(!user.exists());
    assert!(conn.executed().is_empty());
    assert_eq!(*sink.seen.lock().unwrap(), vec!["saving"]);
}

#[tokio::test]
async fn lifecycle_events_fire_in_order() {
    let conn = FakeConnection::new();
    let sink = Arc::new(RecordingSink {
        cancel: None,
        seen: Mutex::new(Vec::new()),
    });
    let orm = Orm::new(conn.clone()).with_events(sink.clone());

    let mut user = Model::new(USERS.clone());
    user.fill(vec![("name", Value::Text("x".into()))]);
    assert!(user.save(&orm).await.unwrap());
    assert_eq!(
        *sink.seen.lock().unwrap(),
        vec!["saving", "creating", "created", "saved"]
    );

    sink.seen.lock().unwrap().clear();
    user.set_attribute("name", "y");
    assert!(user.save(&orm).await.unwrap());
    assert_eq!(
        *sink.seen.lock().unwrap(),
        vec!["saving", "updating", "updated", "saved"]
    );
}

#[tokio::test]
async fn serialization_omits_hidden_keys_and_includes_relations() {
    let user = {
        let mut m = Model::from_row(
            USERS.clone(),
            row(&[
                ("id", Value::Int(1)),
                ("name", Value::Text("a".into())),
                ("password", Value::Text("secret".into())),
            ]),
        );
        m.set_relation("posts", sable_orm::Related::Many(Vec::new()));
        m
    };

    let value = user.to_value();
    assert_eq!(value["name"], serde_json::json!("a"));
    assert!(value.get("password").is_none());
    assert_eq!(value["posts"], serde_json::json!([]));

    let json = user.to_json().unwrap();
    assert!(json.contains("\"name\":\"a\""));
}
