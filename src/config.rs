use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::buckets::WeekConvention;
use crate::task::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub api_url: String,
    pub api_key: Option<String>,
    pub page_size: u32,
    /// How long a page render waits for a pending fetch before showing the
    /// loading state.
    pub render_wait: Duration,
    pub week: WeekConvention,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            api_url: "http://localhost:8000".to_string(),
            api_key: None,
            page_size: DEFAULT_PAGE_SIZE,
            render_wait: Duration::from_millis(1500),
            week: WeekConvention::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let week = match lookup("DASHBOARD_WEEK_START") {
            Some(value) => WeekConvention::parse(&value).unwrap_or_else(|| {
                warn!("ignoring DASHBOARD_WEEK_START={value:?}, expected sunday or monday");
                defaults.week
            }),
            None => defaults.week,
        };

        Self {
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            api_url: lookup("DASHBOARD_API_URL").unwrap_or(defaults.api_url),
            api_key: lookup("DASHBOARD_API_KEY").filter(|key| !key.trim().is_empty()),
            page_size: parsed(&lookup, "DASHBOARD_PAGE_SIZE")
                .filter(|size| *size > 0)
                .unwrap_or(defaults.page_size),
            render_wait: parsed(&lookup, "DASHBOARD_RENDER_WAIT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.render_wait),
            week,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("ignoring invalid {key}={value:?}");
            None
        }
    }
}
