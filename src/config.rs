//! Runtime configuration read from the environment (and `.env`).

use crate::engine::{DuplicatePolicy, NumericMode, ResolveOptions};
use crate::sheets::GOOGLE_SHEETS_BASE_URL;
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub sheets_base_url: String,
    /// Upper bound on one sheet export request, connect to last byte.
    pub sheets_timeout: Duration,
    /// Used when a request does not name a sheet.
    pub default_sheet_id: u64,
    pub strict_numbers: bool,
    pub reject_duplicates: bool,
    /// `tracing-subscriber` filter directive, e.g. `info` or `walker_payout=debug`.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            sheets_base_url: GOOGLE_SHEETS_BASE_URL.to_string(),
            sheets_timeout: Duration::from_secs(10),
            default_sheet_id: 0,
            strict_numbers: false,
            reject_duplicates: false,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let default_sheet_id = match lookup("WALKER_DEFAULT_SHEET_ID") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("WALKER_DEFAULT_SHEET_ID must be a sheet id, got {:?}", v))?,
            None => defaults.default_sheet_id,
        };
        let sheets_timeout = match lookup("WALKER_SHEETS_TIMEOUT_SECS") {
            Some(v) => {
                let secs: u64 = v.trim().parse().with_context(|| {
                    format!("WALKER_SHEETS_TIMEOUT_SECS must be whole seconds, got {:?}", v)
                })?;
                anyhow::ensure!(secs > 0, "WALKER_SHEETS_TIMEOUT_SECS must be at least 1");
                Duration::from_secs(secs)
            }
            None => defaults.sheets_timeout,
        };
        Ok(Self {
            bind_addr: lookup("WALKER_BIND_ADDR").unwrap_or(defaults.bind_addr),
            sheets_base_url: lookup("WALKER_SHEETS_BASE_URL").unwrap_or(defaults.sheets_base_url),
            sheets_timeout,
            default_sheet_id,
            strict_numbers: parse_flag(&lookup, "WALKER_STRICT_NUMBERS", defaults.strict_numbers)?,
            reject_duplicates: parse_flag(
                &lookup,
                "WALKER_REJECT_DUPLICATES",
                defaults.reject_duplicates,
            )?,
            log_filter: lookup("WALKER_LOG").unwrap_or(defaults.log_filter),
        })
    }

    /// Resolver options implied by this config, with the standard mapping.
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            numeric: if self.strict_numbers {
                NumericMode::Strict
            } else {
                NumericMode::Lenient
            },
            duplicates: if self.reject_duplicates {
                DuplicatePolicy::Reject
            } else {
                DuplicatePolicy::FirstMatch
            },
            ..Default::default()
        }
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => anyhow::bail!("{} must be a boolean, got {:?}", key, other),
        },
    }
}
