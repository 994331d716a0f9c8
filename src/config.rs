// src/config.rs

use std::env;
use dotenvy::dotenv;
use url::Url;

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Labels handed to whatever renders the service index and admin screens.
#[derive(Debug, Clone)]
pub struct Branding {
    pub site_header: String,
    pub site_title: String,
    pub index_title: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            site_header: "Exam Engine".to_string(),
            site_title: "Exam Engine Admin".to_string(),
            index_title: "Exams and statistics".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub cors_allowed_origins: Vec<String>,
    pub rust_log: String,
    pub branding: Branding,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let cors_allowed_origins = parse_origins(
            &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string()),
        );

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let defaults = Branding::default();
        let branding = Branding {
            site_header: env::var("SITE_HEADER").unwrap_or(defaults.site_header),
            site_title: env::var("SITE_TITLE").unwrap_or(defaults.site_title),
            index_title: env::var("INDEX_TITLE").unwrap_or(defaults.index_title),
        };

        Self {
            database_url,
            database_max_connections,
            bind_addr,
            cors_allowed_origins,
            rust_log,
            branding,
        }
    }
}

/// Splits a comma separated origin list, keeping only entries that parse as URLs.
/// Origins are normalized to `scheme://host[:port]` without a trailing slash.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match Url::parse(s) {
            Ok(url) => Some(url.origin().ascii_serialization()),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin '{}': {}", s, e);
                None
            }
        })
        .collect()
}
