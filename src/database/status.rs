// file: src/database/status.rs
use crate::error::SyncResult;
use crate::models::SyncStatus;
use sqlx::{Row, SqlitePool};

pub async fn set(pool: &SqlitePool, sink_group: &str, status: SyncStatus) -> SyncResult<()> {
    sqlx::query(
        "INSERT INTO sync_status (sink_group, status, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP) \
         ON CONFLICT(sink_group) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at",
    )
    .bind(sink_group)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get(pool: &SqlitePool, sink_group: &str) -> SyncResult<SyncStatus> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM sync_status WHERE sink_group = ?")
        .bind(sink_group)
        .fetch_optional(pool)
        .await?;

    Ok(status.map(|s| SyncStatus::parse(&s)).unwrap_or_default())
}

pub async fn list(pool: &SqlitePool) -> SyncResult<Vec<(String, SyncStatus)>> {
    let rows = sqlx::query("SELECT sink_group, status FROM sync_status ORDER BY sink_group")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let status: String = row.get("status");
            (row.get("sink_group"), SyncStatus::parse(&status))
        })
        .collect())
}
