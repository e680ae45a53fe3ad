// file: src/database/mappings.rs
use crate::error::{MappingConflict, SyncResult};
use crate::models::GroupMapping;
use sqlx::SqlitePool;

/// Inserts an `Active` mapping. The insert and its conflict check are one
/// statement, so concurrent adds of the same pair get exactly one winner.
pub async fn add(pool: &SqlitePool, sink_group: &str, source_group: &str, source_kind: &str) -> SyncResult<()> {
    let inserted = sqlx::query(
        "INSERT INTO mappings (sink_group, source_group, source_kind, delete_flag) VALUES (?, ?, ?, 0)
         ON CONFLICT (sink_group, source_group) DO NOTHING",
    )
    .bind(sink_group)
    .bind(source_group)
    .bind(source_kind)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted > 0 {
        return Ok(());
    }

    let existing: Option<bool> =
        sqlx::query_scalar("SELECT delete_flag FROM mappings WHERE sink_group = ? AND source_group = ?")
            .bind(sink_group)
            .bind(source_group)
            .fetch_optional(pool)
            .await?;

    match existing {
        Some(false) => Err(MappingConflict::AlreadyExists.into()),
        // Flagged, or removed by a tear-down since the insert was refused
        Some(true) | None => Err(MappingConflict::PendingDeletion.into()),
    }
}

/// Moves a mapping to `FlaggedForDeletion`. Flagging twice is reported, not ignored.
pub async fn flag_for_deletion(pool: &SqlitePool, sink_group: &str, source_group: &str) -> SyncResult<()> {
    let mut tx = pool.begin().await?;

    let existing: Option<bool> =
        sqlx::query_scalar("SELECT delete_flag FROM mappings WHERE sink_group = ? AND source_group = ?")
            .bind(sink_group)
            .bind(source_group)
            .fetch_optional(&mut *tx)
            .await?;

    match existing {
        None => return Err(MappingConflict::NotFound.into()),
        Some(true) => return Err(MappingConflict::PendingDeletion.into()),
        Some(false) => {}
    }

    sqlx::query("UPDATE mappings SET delete_flag = 1 WHERE sink_group = ? AND source_group = ?")
        .bind(sink_group)
        .bind(source_group)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn list(pool: &SqlitePool, sink_group: Option<&str>) -> SyncResult<Vec<GroupMapping>> {
    let mappings = match sink_group {
        Some(group) => {
            sqlx::query_as::<_, GroupMapping>(
                "SELECT sink_group, source_group, source_kind, delete_flag FROM mappings \
                 WHERE sink_group = ? ORDER BY sink_group, source_group",
            )
            .bind(group)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, GroupMapping>(
                "SELECT sink_group, source_group, source_kind, delete_flag FROM mappings \
                 ORDER BY sink_group, source_group",
            )
            .fetch_all(pool)
            .await?
        }
    };

    Ok(mappings)
}

pub async fn distinct_sink_groups(pool: &SqlitePool) -> SyncResult<Vec<String>> {
    let groups = sqlx::query_scalar("SELECT DISTINCT sink_group FROM mappings ORDER BY sink_group")
        .fetch_all(pool)
        .await?;

    Ok(groups)
}

/// Source groups of the non-flagged mappings for `sink_group`, sorted.
pub async fn active_source_groups(pool: &SqlitePool, sink_group: &str) -> SyncResult<Vec<String>> {
    let groups = sqlx::query_scalar(
        "SELECT source_group FROM mappings WHERE sink_group = ? AND delete_flag = 0 ORDER BY source_group",
    )
    .bind(sink_group)
    .fetch_all(pool)
    .await?;

    Ok(groups)
}
