// file: src/database/events.rs
use crate::error::SyncResult;
use crate::models::DerivedEventLink;
use sqlx::SqlitePool;

pub async fn record(pool: &SqlitePool, sink_event_id: &str, source_record_id: &str, sink_group: &str) -> SyncResult<()> {
    sqlx::query("INSERT OR REPLACE INTO derived_events (sink_event_id, source_record_id, sink_group) VALUES (?, ?, ?)")
        .bind(sink_event_id)
        .bind(source_record_id)
        .bind(sink_group)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn list_for_group(pool: &SqlitePool, sink_group: &str) -> SyncResult<Vec<DerivedEventLink>> {
    let links = sqlx::query_as::<_, DerivedEventLink>(
        "SELECT sink_event_id, source_record_id, sink_group FROM derived_events \
         WHERE sink_group = ? ORDER BY sink_event_id, source_record_id",
    )
    .bind(sink_group)
    .fetch_all(pool)
    .await?;

    Ok(links)
}

/// Drops the link for one sink event once that event is gone from the sink.
pub async fn forget(pool: &SqlitePool, sink_event_id: &str) -> SyncResult<()> {
    sqlx::query("DELETE FROM derived_events WHERE sink_event_id = ?")
        .bind(sink_event_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Clears the group's remaining links and removes its flagged mappings in a
/// single transaction. Returns `(links_cleared, mappings_removed)`.
pub async fn finish_teardown(pool: &SqlitePool, sink_group: &str) -> SyncResult<(u64, u64)> {
    let mut tx = pool.begin().await?;

    let links = sqlx::query("DELETE FROM derived_events WHERE sink_group = ?")
        .bind(sink_group)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let mappings = sqlx::query("DELETE FROM mappings WHERE sink_group = ? AND delete_flag = 1")
        .bind(sink_group)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    Ok((links, mappings))
}
