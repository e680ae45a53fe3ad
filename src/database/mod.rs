// file: src/database/mod.rs

use crate::error::SyncResult;
use crate::models::{Category, DerivedEventLink, GroupMapping, SyncStatus, TemplateCoverage, TemplateRule};
use anyhow::{Context, Result};
use log::info;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePool, sqlite::SqlitePoolOptions, Sqlite};

// Declare submodules
pub mod events;
pub mod mappings;
pub mod status;
pub mod templates;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:canvas_sync.db?mode=rwc";

/// Mapping store: group mappings, template rules, derived-event links and
/// sync status, all in one SQLite database.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(db_url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        let db_exists = Sqlite::database_exists(db_url)
            .await
            .context("Failed to check if database exists")?;
        if !db_exists {
            info!("Creating database");
            Sqlite::create_database(db_url)
                .await
                .context("Failed to create database")?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(db_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self::from_pool(pool).await?;
        info!("Database initialized successfully");
        Ok(db)
    }

    /// Wraps an existing pool and makes sure the schema is in place.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        run_schema(&pool).await.context("Failed to run database schema")?;
        Ok(Database { pool })
    }

    // --- Mapping Delegates ---

    pub async fn add_mapping(&self, sink_group: &str, source_group: &str, source_kind: &str) -> SyncResult<()> {
        mappings::add(&self.pool, sink_group, source_group, source_kind).await
    }

    pub async fn flag_mapping_for_deletion(&self, sink_group: &str, source_group: &str) -> SyncResult<()> {
        mappings::flag_for_deletion(&self.pool, sink_group, source_group).await
    }

    pub async fn list_mappings(&self, sink_group: Option<&str>) -> SyncResult<Vec<GroupMapping>> {
        mappings::list(&self.pool, sink_group).await
    }

    pub async fn list_distinct_sink_groups(&self) -> SyncResult<Vec<String>> {
        mappings::distinct_sink_groups(&self.pool).await
    }

    pub async fn active_source_groups(&self, sink_group: &str) -> SyncResult<Vec<String>> {
        mappings::active_source_groups(&self.pool, sink_group).await
    }

    // --- Template Delegates ---

    pub async fn list_template_rules(&self) -> SyncResult<Vec<TemplateRule>> {
        templates::list(&self.pool).await
    }

    pub async fn add_template_rule(
        &self,
        category: Category,
        source_kind: &str,
        source_field: &str,
        sink_group: Option<&str>,
    ) -> SyncResult<i64> {
        templates::add(&self.pool, category, source_kind, source_field, sink_group).await
    }

    pub async fn delete_template_rule(&self, id: i64) -> SyncResult<()> {
        templates::delete(&self.pool, id).await
    }

    pub async fn template_coverage(&self, sink_group: &str) -> SyncResult<TemplateCoverage> {
        templates::coverage(&self.pool, sink_group).await
    }

    // --- Derived Event Delegates ---

    pub async fn record_derived_event(
        &self,
        sink_event_id: &str,
        source_record_id: &str,
        sink_group: &str,
    ) -> SyncResult<()> {
        events::record(&self.pool, sink_event_id, source_record_id, sink_group).await
    }

    pub async fn list_derived_events(&self, sink_group: &str) -> SyncResult<Vec<DerivedEventLink>> {
        events::list_for_group(&self.pool, sink_group).await
    }

    pub async fn forget_derived_event(&self, sink_event_id: &str) -> SyncResult<()> {
        events::forget(&self.pool, sink_event_id).await
    }

    pub async fn finish_teardown(&self, sink_group: &str) -> SyncResult<(u64, u64)> {
        events::finish_teardown(&self.pool, sink_group).await
    }

    // --- Status Delegates ---

    pub async fn set_status(&self, sink_group: &str, status: SyncStatus) -> SyncResult<()> {
        status::set(&self.pool, sink_group, status).await
    }

    pub async fn get_status(&self, sink_group: &str) -> SyncResult<SyncStatus> {
        status::get(&self.pool, sink_group).await
    }

    pub async fn list_statuses(&self) -> SyncResult<Vec<(String, SyncStatus)>> {
        status::list(&self.pool).await
    }
}

async fn run_schema(pool: &SqlitePool) -> Result<()> {
    let schema = include_str!("schema.sql");

    let mut current_statement = String::new();

    for line in schema.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }

        current_statement.push_str(line);
        current_statement.push('\n');

        if trimmed.ends_with(';') {
            sqlx::query(&current_statement).execute(pool).await?;
            current_statement.clear();
        }
    }
    Ok(())
}

/// Single-connection in-memory pool with the schema applied.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_schema(&pool).await.unwrap();
    pool
}
