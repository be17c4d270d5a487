use std::{
    fs,
    num::NonZeroU32,
    path::{Path, PathBuf},
};

use anyhow::Context;
use shared::pagination::Paginator;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub items_per_page: u32,
    pub jwt_secret: String,
    pub session_ttl_seconds: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/registry.db".into(),
            items_per_page: 10,
            jwt_secret: "dev-insecure-secret".into(),
            session_ttl_seconds: 8 * 3600,
        }
    }
}

impl Settings {
    /// Defaults, then the flat `server.toml` table, then environment
    /// variables. Numeric values that do not parse (or are zero) are skipped.
    pub fn from_sources(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Settings::default();

        if let Some(file_cfg) = file.and_then(|raw| raw.parse::<toml::Table>().ok()) {
            if let Some(v) = file_value(&file_cfg, "bind_addr") {
                settings.server_bind = v;
            }
            if let Some(v) = file_value(&file_cfg, "database_url") {
                settings.database_url = v;
            }
            if let Some(v) = file_value(&file_cfg, "items_per_page") {
                settings.set_items_per_page(&v);
            }
            if let Some(v) = file_value(&file_cfg, "jwt_secret") {
                settings.jwt_secret = v;
            }
            if let Some(v) = file_value(&file_cfg, "session_ttl_seconds") {
                settings.set_session_ttl(&v);
            }
        }

        if let Some(v) = env("SERVER_BIND") {
            settings.server_bind = v;
        }
        if let Some(v) = env("APP__BIND_ADDR") {
            settings.server_bind = v;
        }

        if let Some(v) = env("DATABASE_URL") {
            settings.database_url = v;
        }
        if let Some(v) = env("APP__DATABASE_URL") {
            settings.database_url = v;
        }

        if let Some(v) = env("ITEMS_PER_PAGE") {
            settings.set_items_per_page(&v);
        }
        if let Some(v) = env("APP__ITEMS_PER_PAGE") {
            settings.set_items_per_page(&v);
        }

        if let Some(v) = env("APP__JWT_SECRET") {
            settings.jwt_secret = v;
        }

        if let Some(v) = env("APP__SESSION_TTL_SECONDS") {
            settings.set_session_ttl(&v);
        }

        settings
    }

    pub fn paginator(&self) -> Paginator {
        let per_page = NonZeroU32::new(self.items_per_page)
            .or(NonZeroU32::new(Settings::default().items_per_page))
            .unwrap_or(NonZeroU32::MIN);
        Paginator::new(per_page)
    }

    fn set_items_per_page(&mut self, raw: &str) {
        if let Ok(parsed) = raw.trim().parse::<u32>() {
            if parsed > 0 {
                self.items_per_page = parsed;
            }
        }
    }

    fn set_session_ttl(&mut self, raw: &str) {
        if let Ok(parsed) = raw.trim().parse::<i64>() {
            if parsed > 0 {
                self.session_ttl_seconds = parsed;
            }
        }
    }
}

/// `server.toml` values may be written as strings or bare integers.
fn file_value(table: &toml::Table, key: &str) -> Option<String> {
    match table.get(key)? {
        toml::Value::String(v) => Some(v.clone()),
        toml::Value::Integer(v) => Some(v.to_string()),
        _ => None,
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string("server.toml").ok();
    Settings::from_sources(file.as_deref(), |key| std::env::var(key).ok())
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
