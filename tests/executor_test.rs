//! Integration tests for statement execution outside transactions.

mod common;

use common::{setup, setup_accounts};
use db_template::db::{JsonRowMapper, scalar};
use db_template::error::{DbError, DbResult, ErrorKind};
use db_template::models::{LogicalUnit, Row, StatementSpec, Value};
use db_template::params;

#[derive(Debug, PartialEq)]
struct Account {
    id: i64,
    balance: i64,
}

fn account(row: &Row, _row_num: usize) -> DbResult<Account> {
    Ok(Account {
        id: row.get("id")?,
        balance: row.get("balance")?,
    })
}

#[tokio::test]
async fn test_each_statement_acquires_and_releases_its_own_connection() {
    let db = setup_accounts().await;
    let unit = LogicalUnit::new();

    let updated = db
        .executor
        .execute(&unit, ("UPDATE accounts SET balance = balance + ?", params![5]))
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let accounts = db
        .executor
        .query(&unit, "SELECT id, balance FROM accounts ORDER BY id", account)
        .await
        .unwrap();
    assert_eq!(
        accounts,
        vec![
            Account { id: 1, balance: 15 },
            Account { id: 2, balance: 25 },
        ]
    );

    assert_eq!(db.counters().acquired(), 2);
    assert_eq!(db.counters().released(), 2);
    assert_eq!(db.counters().commits(), 0);
    assert_eq!(db.counters().rollbacks(), 0);
    assert!(!db.registry().is_bound(&unit));
    assert_eq!(db.registry().count(), 0);
}

#[tokio::test]
async fn test_query_single_cardinality() {
    let db = setup_accounts().await;
    let unit = LogicalUnit::new();

    let one = db
        .executor
        .query_single(
            &unit,
            StatementSpec::new("SELECT id, balance FROM accounts WHERE id = ?", [2]),
            account,
        )
        .await
        .unwrap();
    assert_eq!(one, Account { id: 2, balance: 20 });

    let err = db
        .executor
        .query_single(&unit, "SELECT id, balance FROM accounts", account)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Cardinality { actual: 2 }));
    assert_eq!(err.kind(), ErrorKind::Cardinality);

    let err = db
        .executor
        .query_single(
            &unit,
            StatementSpec::new("SELECT id, balance FROM accounts WHERE id = ?", [99]),
            account,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(db.counters().outstanding(), 0);
}

#[tokio::test]
async fn test_query_optional() {
    let db = setup_accounts().await;
    let unit = LogicalUnit::new();
    let sql = "SELECT balance FROM accounts WHERE id = ?";

    let found: Option<i64> = db
        .executor
        .query_optional(&unit, (sql, params![1]), scalar())
        .await
        .unwrap();
    assert_eq!(found, Some(10));

    let missing: Option<i64> = db
        .executor
        .query_optional(&unit, (sql, params![99]), scalar())
        .await
        .unwrap();
    assert_eq!(missing, None);

    let err = db
        .executor
        .query_optional(&unit, "SELECT balance FROM accounts", scalar::<i64>())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Cardinality { actual: 2 }));
}

#[tokio::test]
async fn test_failed_statement_still_releases() {
    let db = setup_accounts().await;
    let unit = LogicalUnit::new();

    let err = db
        .executor
        .execute(&unit, "UPDATE missing_table SET x = 1")
        .await
        .unwrap_err();
    assert!(err.is_data_access());

    let err = db
        .executor
        .execute(
            &unit,
            ("INSERT INTO accounts (id, balance) VALUES (?, ?)", params![1, 0]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::DataAccess { .. }));
    assert!(err.sql_state().is_some());

    assert_eq!(db.counters().acquired(), 2);
    assert_eq!(db.counters().released(), 2);
}

#[tokio::test]
async fn test_mapping_failure_is_data_access() {
    let db = setup_accounts().await;

    let err = db
        .executor
        .query(
            &LogicalUnit::new(),
            "SELECT id FROM accounts",
            |row: &Row, _: usize| row.get::<i64, _>("balance"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Mapping { .. }));
    assert!(err.is_data_access());
}

#[tokio::test]
async fn test_parameter_values_round_trip() {
    let db = setup().await;
    let unit = LogicalUnit::new();
    db.executor
        .execute(
            &unit,
            "CREATE TABLE samples (name TEXT, score REAL, payload BLOB, flag INTEGER, note TEXT)",
        )
        .await
        .unwrap();

    db.executor
        .execute(
            &unit,
            (
                "INSERT INTO samples (name, score, payload, flag, note) VALUES (?, ?, ?, ?, ?)",
                params!["alice", 1.5, vec![0xde_u8, 0xad], true, None::<String>],
            ),
        )
        .await
        .unwrap();

    let row = db
        .executor
        .query_single(
            &unit,
            "SELECT name, score, payload, flag, note FROM samples",
            |row: &Row, _: usize| -> DbResult<Row> { Ok(row.clone()) },
        )
        .await
        .unwrap();

    assert_eq!(row.get::<String, _>("name").unwrap(), "alice");
    assert_eq!(row.get::<f64, _>("score").unwrap(), 1.5);
    assert_eq!(row.get::<Vec<u8>, _>("payload").unwrap(), vec![0xde, 0xad]);
    assert!(row.get::<bool, _>("flag").unwrap());
    assert_eq!(row.get::<Option<String>, _>("note").unwrap(), None);
    assert_eq!(row.get::<Value, _>(4usize).unwrap(), Value::Null);
}

#[tokio::test]
async fn test_json_row_mapper() {
    let db = setup_accounts().await;

    let rows = db
        .executor
        .query(
            &LogicalUnit::new(),
            "SELECT id, balance FROM accounts ORDER BY id",
            JsonRowMapper,
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], serde_json::json!(1));
    assert_eq!(rows[1]["balance"], serde_json::json!(20));
}

#[tokio::test]
async fn test_undecodable_column_is_mapping_error() {
    let db = setup_accounts().await;

    let err = db
        .executor
        .query(
            &LogicalUnit::new(),
            "SELECT id, CAST(x'c3' AS TEXT) AS label FROM accounts",
            JsonRowMapper,
        )
        .await
        .unwrap_err();

    match &err {
        DbError::Mapping { column, .. } => assert_eq!(column, "label"),
        other => panic!("expected a mapping error, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::DataAccess);
    assert_eq!(db.counters().outstanding(), 0);
}
