//! Execution-level behavior of the query builder against a fake connection.

mod common;

use common::{row, FakeConnection};
use sable_query::{raw, record, Connection, QueryBuilder, Value};

#[tokio::test]
async fn placeholders_align_with_bindings_across_all_sections() {
    let conn = FakeConnection::new();
    let query = QueryBuilder::table("users")
        .select_raw("`score` + ? as boosted", vec![Value::Int(5)])
        .join_where("orders", "orders.status", "=", "open")
        .unwrap()
        .where_("age", ">", 18)
        .unwrap()
        .where_eq("updated_at", raw("created_at"))
        .where_in("role", vec!["admin", "owner"])
        .group_by(&["role"])
        .having("age", ">=", 21)
        .unwrap()
        .order_by_raw("case when `id` = ? then 0 else 1 end", vec![Value::Int(9)]);

    query.get(&conn).await.unwrap();

    let (sql, bindings) = conn.executed().remove(0);
    assert_eq!(sql.matches('?').count(), bindings.len());
    // Sections flatten in the fixed order: select, join, where, having, order.
    assert_eq!(
        bindings,
        vec![
            Value::Int(5),
            Value::Text("open".into()),
            Value::Int(18),
            Value::Text("admin".into()),
            Value::Text("owner".into()),
            Value::Int(21),
            Value::Int(9),
        ]
    );
}

#[tokio::test]
async fn pagination_count_ignores_ordering_and_paging_but_keeps_filters() {
    let conn = FakeConnection::new();
    conn.push_rows(vec![row(&[("aggregate", Value::Int(42))])]);

    let query = QueryBuilder::table("users")
        .where_("a", "=", 1)
        .unwrap()
        .order_by("x")
        .limit(5)
        .offset(10);

    let total = query.pagination_count(&conn).await.unwrap();
    assert_eq!(total, 42);

    let (sql, bindings) = conn.executed().remove(0);
    assert_eq!(
        sql,
        "SELECT COUNT(*) AS aggregate FROM `users` WHERE `a` = ?"
    );
    assert_eq!(bindings, vec![Value::Int(1)]);

    // The original builder keeps its ordering and paging.
    let sql = query.to_sql(conn.grammar());
    assert!(sql.contains("ORDER BY `x` ASC"));
    assert!(sql.contains("LIMIT 5"));
    assert!(sql.contains("OFFSET 10"));
}

#[tokio::test]
async fn aggregates_read_the_aggregate_column_and_leave_columns_alone() {
    let conn = FakeConnection::new();
    conn.push_rows(vec![row(&[("aggregate", Value::Int(3))])]);

    let query = QueryBuilder::table("users").select(&["id", "name"]);
    let before = query.to_sql(conn.grammar());

    assert_eq!(query.count(&conn).await.unwrap(), 3);
    assert_eq!(query.to_sql(conn.grammar()), before);
}

#[tokio::test]
async fn first_applies_a_limit_of_one() {
    let conn = FakeConnection::new();
    conn.push_rows(vec![row(&[("id", Value::Int(1))])]);

    let query = QueryBuilder::table("users");
    let found = query.first(&conn).await.unwrap();
    assert!(found.is_some());

    let (sql, _) = conn.executed().remove(0);
    assert_eq!(sql, "SELECT * FROM `users` LIMIT 1");
}

#[tokio::test]
async fn find_constrains_on_the_id_column() {
    let conn = FakeConnection::new();
    let query = QueryBuilder::table("users");
    let found = query.find(&conn, 7).await.unwrap();
    assert!(found.is_none());

    let (sql, bindings) = conn.executed().remove(0);
    assert_eq!(sql, "SELECT * FROM `users` WHERE `id` = ? LIMIT 1");
    assert_eq!(bindings, vec![Value::Int(7)]);
}

#[tokio::test]
async fn pluck_and_lists_extract_a_single_column() {
    let conn = FakeConnection::new();
    conn.push_rows(vec![row(&[("name", Value::Text("a".into()))])]);
    let query = QueryBuilder::table("users");
    assert_eq!(
        query.pluck(&conn, "name").await.unwrap(),
        Some(Value::Text("a".into()))
    );

    conn.push_rows(vec![
        row(&[("name", Value::Text("a".into()))]),
        row(&[("name", Value::Text("b".into()))]),
    ]);
    assert_eq!(
        query.lists(&conn, "name").await.unwrap(),
        vec![Value::Text("a".into()), Value::Text("b".into())]
    );
}

#[tokio::test]
async fn insert_get_id_casts_numeric_text() {
    let conn = FakeConnection::new();
    conn.set_last_insert_id(Value::Text("42".into()));

    let query = QueryBuilder::table("users");
    let rec = record(vec![("name", "x")]);
    let id = query.insert_get_id(&conn, &rec, None).await.unwrap();
    assert_eq!(id, Value::Int(42));
}

#[tokio::test]
async fn update_binds_values_before_where_constraints() {
    let conn = FakeConnection::new();
    let query = QueryBuilder::table("users").where_eq("id", 7);
    let rec = record(vec![("name", "x")]);
    query.update(&conn, &rec).await.unwrap();

    let (sql, bindings) = conn.executed().remove(0);
    assert_eq!(sql, "UPDATE `users` SET `name` = ? WHERE `id` = ?");
    assert_eq!(bindings, vec![Value::Text("x".into()), Value::Int(7)]);
}

#[tokio::test]
async fn paginate_reports_totals_and_pages() {
    let conn = FakeConnection::new();
    conn.push_rows(vec![row(&[("aggregate", Value::Int(23))])]);
    conn.push_rows(vec![row(&[("id", Value::Int(11))])]);

    let query = QueryBuilder::table("users");
    let page = query.paginate(&conn, 3, 5).await.unwrap();
    assert_eq!(page.total, 23);
    assert_eq!(page.current_page, 3);
    assert_eq!(page.last_page, 5);

    let executed = conn.executed();
    let (sql, _) = &executed[1];
    assert!(sql.contains("LIMIT 5"));
    assert!(sql.contains("OFFSET 10"));
}

#[tokio::test]
async fn simple_paginate_peeks_one_row_ahead() {
    let conn = FakeConnection::new();
    conn.push_rows(vec![
        row(&[("id", Value::Int(1))]),
        row(&[("id", Value::Int(2))]),
        row(&[("id", Value::Int(3))]),
    ]);

    let query = QueryBuilder::table("users");
    let page = query.simple_paginate(&conn, 1, 2).await.unwrap();
    assert!(page.has_more);
    assert_eq!(page.data.len(), 2);

    let (sql, _) = conn.executed().remove(0);
    assert!(sql.contains("LIMIT 3"));
}

#[tokio::test]
async fn empty_insert_is_a_noop() {
    let conn = FakeConnection::new();
    let query = QueryBuilder::table("users");
    assert!(query.insert(&conn, &[]).await.unwrap());
    assert!(conn.executed().is_empty());
}
