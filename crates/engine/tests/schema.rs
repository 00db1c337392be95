use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, ExecResult, Statement, Value};

use engine::{RemovalReason, TransactionType};
use migration::MigratorTrait;

/// Migrated database with one catalog item (id 1) and one batch (id 1).
async fn migrated_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db.execute_unprepared("INSERT INTO stock_names (name, name_norm) VALUES ('Bolts', 'bolts')")
        .await
        .unwrap();
    insert_batch(&db, 10, 10, "2025-06-01", "2025-09-01")
        .await
        .unwrap();
    db
}

async fn insert_batch(
    db: &DatabaseConnection,
    initial: i64,
    current: i64,
    delivered_at: &str,
    use_by: &str,
) -> Result<ExecResult, DbErr> {
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO batches \
         (stock_id, quantity_initial, quantity_current, delivered_at, use_by, recorded_at) \
         VALUES (1, ?, ?, ?, ?, '2025-06-01 09:00:00+00:00')",
        [
            Value::from(initial),
            Value::from(current),
            Value::from(delivered_at),
            Value::from(use_by),
        ],
    ))
    .await
}

async fn insert_entry(
    db: &DatabaseConnection,
    kind: &str,
    reason: Option<&str>,
) -> Result<ExecResult, DbErr> {
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO transactions \
         (batch_id, stock_id, transaction_type, quantity, occurred_at, removal_reason, recorded_at) \
         VALUES (1, 1, ?, 1, '2025-06-02', ?, '2025-06-02 09:00:00+00:00')",
        [
            Value::from(kind),
            Value::from(reason.map(str::to_string)),
        ],
    ))
    .await
}

#[tokio::test]
async fn batch_quantities_are_bounded_by_the_delivery() {
    let db = migrated_db().await;

    assert!(insert_batch(&db, 5, 5, "2025-06-01", "2025-09-01").await.is_ok());
    assert!(insert_batch(&db, 5, 0, "2025-06-01", "2025-09-01").await.is_ok());

    assert!(insert_batch(&db, 5, 9, "2025-06-01", "2025-09-01").await.is_err());
    assert!(insert_batch(&db, 5, -1, "2025-06-01", "2025-09-01").await.is_err());
    assert!(insert_batch(&db, 0, 0, "2025-06-01", "2025-09-01").await.is_err());
}

#[tokio::test]
async fn batch_use_by_must_follow_delivery() {
    let db = migrated_db().await;

    assert!(insert_batch(&db, 5, 5, "2025-06-01", "2025-06-02").await.is_ok());
    assert!(insert_batch(&db, 5, 5, "2025-06-01", "2025-06-01").await.is_err());
    assert!(insert_batch(&db, 5, 5, "2025-06-01", "2025-05-01").await.is_err());
}

#[tokio::test]
async fn batch_quantity_cannot_be_raised_past_initial() {
    let db = migrated_db().await;

    let raised = db
        .execute_unprepared("UPDATE batches SET quantity_current = 11 WHERE id = 1")
        .await;
    assert!(raised.is_err());
}

#[tokio::test]
async fn every_engine_storage_text_is_accepted() {
    let db = migrated_db().await;

    for kind in TransactionType::ALL {
        let reason = match kind {
            TransactionType::Addition => None,
            TransactionType::Removal => Some(RemovalReason::Used.as_str()),
        };
        assert!(insert_entry(&db, kind.as_str(), reason).await.is_ok(), "{kind}");
    }
    for reason in RemovalReason::ALL {
        assert!(
            insert_entry(&db, "removal", Some(reason.as_str())).await.is_ok(),
            "{reason}"
        );
    }
}

#[tokio::test]
async fn ledger_rows_outside_the_vocabulary_are_refused() {
    let db = migrated_db().await;

    assert!(insert_entry(&db, "gift", None).await.is_err());
    assert!(insert_entry(&db, "removal", Some("stolen")).await.is_err());
    // reason present exactly on removals
    assert!(insert_entry(&db, "removal", None).await.is_err());
    assert!(insert_entry(&db, "addition", Some("used")).await.is_err());

    let rows = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT COUNT(*) FROM transactions",
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rows.try_get_by_index::<i64>(0).unwrap(), 0);
}
