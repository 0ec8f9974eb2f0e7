//! Transaction helper.
//!
//! Runs a closure inside one database transaction: commit on `Ok`, rollback
//! on `Err`. Unlike a bare `TransactionTrait::transaction` call, the
//! caller's own error type comes back out unchanged, so domain errors raised
//! mid-transaction (a stale cart version, say) are not flattened into `DbErr`.

use futures::future::BoxFuture;
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionError, TransactionTrait};

/// Execute a function within a database transaction
///
/// ```rust,ignore
/// let order = with_transaction(&db, move |txn| {
///     Box::pin(async move {
///         let order = order_model.insert(txn).await?;
///         for item in items {
///             item.insert(txn).await?;
///         }
///         Ok::<_, ServiceError>(order)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T, E>(db: &DatabaseConnection, f: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: std::error::Error + From<DbErr> + Send,
{
    db.transaction::<F, T, E>(f).await.map_err(|e| match e {
        TransactionError::Connection(db_err) => E::from(db_err),
        TransactionError::Transaction(err) => err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use sea_orm::{ConnectOptions, ConnectionTrait, Database, DbBackend, Statement};

    async fn scratch_db() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1);
        let db = Database::connect(opt).await.unwrap();
        db.execute_unprepared("CREATE TABLE scratch (id INTEGER PRIMARY KEY)")
            .await
            .unwrap();
        db
    }

    async fn count(db: &DatabaseConnection) -> i64 {
        let row = db
            .query_one(Statement::from_string(
                DbBackend::Sqlite,
                "SELECT COUNT(*) AS n FROM scratch",
            ))
            .await
            .unwrap()
            .unwrap();
        row.try_get("", "n").unwrap()
    }

    #[tokio::test]
    async fn commits_on_ok() {
        let db = scratch_db().await;

        with_transaction(&db, |txn| {
            Box::pin(async move {
                txn.execute_unprepared("INSERT INTO scratch (id) VALUES (1)")
                    .await?;
                Ok::<_, ServiceError>(())
            })
        })
        .await
        .unwrap();

        assert_eq!(count(&db).await, 1);
    }

    #[tokio::test]
    async fn rolls_back_and_preserves_caller_error() {
        let db = scratch_db().await;

        let err = with_transaction(&db, |txn| {
            Box::pin(async move {
                txn.execute_unprepared("INSERT INTO scratch (id) VALUES (1)")
                    .await?;
                Err::<(), _>(ServiceError::ValidationError("stale".into()))
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::ValidationError(ref m) if m == "stale"));
        assert_eq!(count(&db).await, 0);
    }
}
