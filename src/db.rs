use std::{str::FromStr, time::Duration};

use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};

/// Open (creating when missing) the snapshot database at `url` and make sure
/// the key/value table exists.
pub async fn connect(url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid database url {url}"))?
        .create_if_missing(true);
    let db_conn = SqlitePool::connect_with(options)
        .await
        .with_context(|| format!("fail to open database {url}"))?;
    init_schema(&db_conn).await?;
    Ok(db_conn)
}

/// A private database living as long as the returned pool.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    // every sqlite memory connection is its own database
    let db_conn = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect("sqlite::memory:")
        .await
        .context("fail to open in-memory database")?;
    init_schema(&db_conn).await?;
    Ok(db_conn)
}

pub async fn init_schema(db_conn: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS snapshot (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)"#,
    )
    .execute(db_conn)
    .await
    .context("fail to create snapshot table")?;
    Ok(())
}

pub async fn read_snapshot(db_conn: &SqlitePool, key: &str) -> anyhow::Result<Option<String>> {
    let row = sqlx::query("SELECT value FROM snapshot WHERE key = ?")
        .bind(key)
        .fetch_optional(db_conn)
        .await
        .with_context(|| format!("fail to read snapshot {key}"))?;
    Ok(row.map(|row| row.get("value")))
}

pub async fn write_snapshot(db_conn: &SqlitePool, key: &str, value: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
INSERT INTO snapshot
    (key, value)
VALUES
    (?, ?)
ON CONFLICT(key) DO UPDATE SET value = excluded.value"#,
    )
    .bind(key)
    .bind(value)
    .execute(db_conn)
    .await
    .with_context(|| format!("fail to write snapshot {key}"))?;
    Ok(())
}

#[tokio::test]
async fn test_missing_snapshot_reads_as_none() {
    let db = connect_in_memory().await.unwrap();
    assert_eq!(read_snapshot(&db, "restaurants").await.unwrap(), None);
}

#[tokio::test]
async fn test_write_then_overwrite_snapshot() {
    let db = connect_in_memory().await.unwrap();

    write_snapshot(&db, "restaurants", "[]").await.unwrap();
    write_snapshot(&db, "restaurants", r#"[{"name":"KFC"}]"#)
        .await
        .unwrap();
    write_snapshot(&db, "other", "kept apart").await.unwrap();

    let value = read_snapshot(&db, "restaurants").await.unwrap();
    assert_eq!(value.as_deref(), Some(r#"[{"name":"KFC"}]"#));

    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM snapshot")
        .fetch_one(&db)
        .await
        .unwrap()
        .get("n");
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_schema_init_is_repeatable() {
    let db = connect_in_memory().await.unwrap();
    write_snapshot(&db, "restaurants", "[]").await.unwrap();
    init_schema(&db).await.unwrap();
    assert!(read_snapshot(&db, "restaurants").await.unwrap().is_some());
}
