// file: src/database/templates.rs
use crate::error::{MappingConflict, SyncError, SyncResult};
use crate::models::{Category, TemplateCoverage, TemplateRule, DEFAULT_SCOPE};
use sqlx::{Row, SqlitePool};

pub async fn list(pool: &SqlitePool) -> SyncResult<Vec<TemplateRule>> {
    let rows = sqlx::query(
        "SELECT id, category, source_kind, source_field, sink_group FROM template_rules ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let category: String = row.get("category");
            Ok(TemplateRule {
                id: row.get("id"),
                category: Category::parse(&category).map_err(SyncError::Template)?,
                source_kind: row.get("source_kind"),
                source_field: row.get("source_field"),
                sink_group: row.get("sink_group"),
            })
        })
        .collect()
}

pub async fn add(
    pool: &SqlitePool,
    category: Category,
    source_kind: &str,
    source_field: &str,
    sink_group: Option<&str>,
) -> SyncResult<i64> {
    let sink_group = sink_group.unwrap_or(DEFAULT_SCOPE);

    let exists: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM template_rules WHERE category = ? AND source_kind = ? AND source_field = ? AND sink_group = ?",
    )
    .bind(category.as_str())
    .bind(source_kind)
    .bind(source_field)
    .bind(sink_group)
    .fetch_optional(pool)
    .await?;

    if exists.is_some() {
        return Err(MappingConflict::AlreadyExists.into());
    }

    let result = sqlx::query(
        "INSERT INTO template_rules (category, source_kind, source_field, sink_group) VALUES (?, ?, ?, ?)",
    )
    .bind(category.as_str())
    .bind(source_kind)
    .bind(source_field)
    .bind(sink_group)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn delete(pool: &SqlitePool, id: i64) -> SyncResult<()> {
    let result = sqlx::query("DELETE FROM template_rules WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(MappingConflict::NotFound.into());
    }
    Ok(())
}

pub async fn coverage(pool: &SqlitePool, sink_group: &str) -> SyncResult<TemplateCoverage> {
    let rows = sqlx::query(
        "SELECT DISTINCT category, sink_group FROM template_rules WHERE sink_group IN (?, ?) ORDER BY category",
    )
    .bind(sink_group)
    .bind(DEFAULT_SCOPE)
    .fetch_all(pool)
    .await?;

    let mut coverage = TemplateCoverage::default();
    for row in rows {
        let category: String = row.get("category");
        let scope: String = row.get("sink_group");
        let category = Category::parse(&category).map_err(SyncError::Template)?;
        // A group literally named "default" fills both lists.
        if scope == sink_group {
            coverage.group.push(category);
        }
        if scope == DEFAULT_SCOPE {
            coverage.default.push(category);
        }
    }
    coverage.group.sort();
    coverage.default.sort();

    Ok(coverage)
}
