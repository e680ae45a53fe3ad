use crate::models::{GroupOutcome, SyncReport};
use env_logger::{Builder, Target};
use log::{Level, LevelFilter, SetLoggerError};
use std::env;
use std::io::Write;

fn parse_level(value: &str) -> LevelFilter {
    match value.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

pub fn init_logging() -> Result<(), SetLoggerError> {
    let log_level = parse_level(&env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));

    let mut builder = Builder::from_default_env();

    builder.format(|buf, record| {
        let timestamp = buf.timestamp();
        let target = record.target();

        match record.level() {
            Level::Info => writeln!(buf, "{} [INFO] [{}]: {}", timestamp, target, record.args()),
            level => writeln!(
                buf,
                "{} [{}] [{}:{}] {}: {}",
                timestamp,
                level,
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                target,
                record.args()
            ),
        }
    });

    // Filter out noisy modules in production
    if env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production" {
        builder.filter_module("reqwest", LevelFilter::Warn);
        builder.filter_module("hyper", LevelFilter::Warn);
        builder.filter_module("tokio", LevelFilter::Info);
        builder.filter_module("sqlx", LevelFilter::Warn);
    }

    builder.filter_level(log_level).target(Target::Stdout).try_init()
}

pub fn log_group_outcome(sink_group: &str, outcome: &GroupOutcome) {
    match outcome {
        GroupOutcome::Skipped => log::debug!("[Sync] Group {} unchanged, skipped", sink_group),
        GroupOutcome::Reconciled { deleted, created } => log::info!(
            "[Sync] Group {} reconciled: {} events deleted, {} created",
            sink_group,
            deleted,
            created
        ),
        GroupOutcome::Failed { kind, message } => {
            log::error!("[Sync] Group {} failed ({}): {}", sink_group, kind, message)
        }
    }
}

pub fn log_sync_run(report: &SyncReport) {
    let duration_ms = (report.finished_at - report.started_at).num_milliseconds();
    if report.failed > 0 {
        log::warn!(
            "[Sync] Run finished in {}ms: {} synced, {} skipped, {} failed",
            duration_ms,
            report.synced,
            report.skipped,
            report.failed
        );
    } else {
        log::info!(
            "[Sync] Run finished in {}ms: {} synced, {} skipped",
            duration_ms,
            report.synced,
            report.skipped
        );
    }
}
