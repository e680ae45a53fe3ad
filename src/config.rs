//! Environment configuration.
//!
//! Everything the daemon needs comes from environment variables. Missing
//! credentials are reported together so a misconfigured deployment fails
//! once with the full list.

use crate::database::DEFAULT_DATABASE_URL;
use crate::error::{SyncError, SyncResult};
use crate::sync::DEFAULT_MAX_WORKERS;
use log::info;
use std::env;
use std::time::Duration;
use url::Url;

pub const DEFAULT_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasConfig {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEditConfig {
    pub id: String,
    pub cert: String,
    pub username: String,
    pub password: String,
    pub usergroup: String,
    /// Fields matched by free-text object search.
    pub search_fields: Vec<String>,
    /// Fields returned for each object found by search.
    pub return_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub canvas: CanvasConfig,
    pub timeedit: TimeEditConfig,
    pub database_url: String,
    pub interval: Duration,
    pub max_workers: usize,
}

impl Config {
    pub fn from_env() -> SyncResult<Self> {
        let mut missing = Vec::new();
        let mut required = |name: &str| match env::var(name) {
            Ok(value) if !value.trim().is_empty() => value,
            _ => {
                missing.push(name.to_string());
                String::new()
            }
        };

        let canvas = CanvasConfig {
            url: required("CANVAS_URL"),
            key: required("CANVAS_KEY"),
        };
        let timeedit = TimeEditConfig {
            id: required("TE_ID"),
            cert: required("TE_CERT"),
            username: required("TE_USERNAME"),
            password: required("TE_PASSWORD"),
            usergroup: required("TE_USERGROUP"),
            search_fields: list_var("TE_SEARCH_FIELDS"),
            return_fields: list_var("TE_RETURN_FIELDS"),
        };

        if !missing.is_empty() {
            return Err(SyncError::config(format!("missing environment variables: {}", missing.join(", "))));
        }

        let config = Self {
            canvas,
            timeedit,
            database_url: env::var("CANVAS_SYNC_DB").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            interval: Duration::from_secs(parse_var("CANVAS_SYNC_INTERVAL", DEFAULT_INTERVAL_SECS)?),
            max_workers: parse_var("CANVAS_SYNC_MAX_WORKERS", DEFAULT_MAX_WORKERS)?,
        };
        config.validate()?;

        info!(
            "Configuration loaded: interval {:?}, {} workers, database {}",
            config.interval, config.max_workers, config.database_url
        );
        Ok(config)
    }

    pub fn validate(&self) -> SyncResult<()> {
        let url = Url::parse(&self.canvas.url)
            .map_err(|e| SyncError::config(format!("CANVAS_URL is not a valid URL: {}", e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::config(format!("CANVAS_URL must be http or https, got {}", url.scheme())));
        }
        if self.canvas.key.is_empty() {
            return Err(SyncError::config("CANVAS_KEY is empty"));
        }
        if self.timeedit.id.is_empty() || self.timeedit.cert.is_empty() {
            return Err(SyncError::config("TE_ID and TE_CERT are required"));
        }
        if self.interval.is_zero() {
            return Err(SyncError::config("CANVAS_SYNC_INTERVAL must be positive"));
        }
        if self.max_workers == 0 {
            return Err(SyncError::config("CANVAS_SYNC_MAX_WORKERS must be positive"));
        }
        Ok(())
    }
}

fn list_var(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> SyncResult<T> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| SyncError::config(format!("{} is not a valid number: {}", name, value))),
        Err(_) => Ok(default),
    }
}
