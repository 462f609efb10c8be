//! Server configuration and runtime settings.
//!
//! Process-level options (bind address, data directory, bootstrap admin)
//! come from environment variables. Tunables that operators change while
//! the service runs live in the `config` table.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::database::Database;
use crate::error::{AppError, AppResult};

/// Default server port.
pub const DEFAULT_PORT: u16 = 13234;

/// Seed rows for the `config` table: (key, default value, description).
pub const DEFAULT_SETTINGS: [(&str, &str, &str); 6] = [
    ("session_ttl_secs", "43200", "Session token lifetime (seconds)"),
    ("max_page_size", "500", "Maximum items returned by list endpoints"),
    (
        "invoice_trend_months",
        "6",
        "Months shown in the invoice monthly series",
    ),
    (
        "top_suppliers_limit",
        "5",
        "Suppliers listed in invoice analytics",
    ),
    (
        "sensor_max_points",
        "5000",
        "Maximum raw readings returned by the series endpoint",
    ),
    (
        "overstock_factor",
        "3.0",
        "Overstock threshold as a multiple of reorder level when no max stock is set",
    ),
];

/// Process configuration read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub data_dir: PathBuf,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            data_dir: default_data_dir(),
            admin_email: None,
            admin_password: None,
        }
    }
}

impl ServerConfig {
    /// Reads `AGRIDASH_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bind) = lookup("AGRIDASH_BIND") {
            match bind.parse() {
                Ok(addr) => config.bind = addr,
                Err(_) => tracing::warn!(value = %bind, "Invalid AGRIDASH_BIND, using default"),
            }
        }
        if let Some(port) = lookup("AGRIDASH_PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(_) => tracing::warn!(value = %port, "Invalid AGRIDASH_PORT, using default"),
            }
        }
        if let Some(dir) = lookup("AGRIDASH_DATA_DIR").filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        config.admin_email = lookup("AGRIDASH_ADMIN_EMAIL").filter(|v| !v.trim().is_empty());
        config.admin_password = lookup("AGRIDASH_ADMIN_PASSWORD").filter(|v| !v.is_empty());

        config
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Returns the default data directory.
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agridash")
}

/// Typed view of the `config` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub session_ttl_secs: i64,
    pub max_page_size: usize,
    pub invoice_trend_months: u32,
    pub top_suppliers_limit: usize,
    pub sensor_max_points: usize,
    pub overstock_factor: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session_ttl_secs: 43_200,
            max_page_size: 500,
            invoice_trend_months: 6,
            top_suppliers_limit: 5,
            sensor_max_points: 5000,
            overstock_factor: 3.0,
        }
    }
}

impl Settings {
    /// Loads settings, keeping the default for any missing or unparsable key.
    pub fn load(db: &Database) -> Settings {
        let mut settings = Settings::default();
        let rows = match db.get_all_config() {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load settings, using defaults");
                return settings;
            }
        };

        for row in rows {
            if let Err(e) = settings.apply(&row.key, &row.value) {
                tracing::warn!(key = %row.key, value = %row.value, error = %e, "Ignoring invalid setting");
            }
        }
        settings
    }

    /// Parses `value` into the field named by `key`.
    pub fn apply(&mut self, key: &str, value: &str) -> AppResult<()> {
        let invalid = || AppError::validation(format!("Invalid value for {}: {}", key, value));
        let value = value.trim();
        match key {
            "session_ttl_secs" => {
                self.session_ttl_secs = value.parse::<i64>().ok().filter(|v| *v > 0).ok_or_else(invalid)?
            }
            "max_page_size" => {
                self.max_page_size = value.parse::<usize>().ok().filter(|v| *v > 0).ok_or_else(invalid)?
            }
            "invoice_trend_months" => {
                self.invoice_trend_months = value
                    .parse::<u32>()
                    .ok()
                    .filter(|v| (1..=36).contains(v))
                    .ok_or_else(invalid)?
            }
            "top_suppliers_limit" => {
                self.top_suppliers_limit = value.parse::<usize>().ok().filter(|v| *v > 0).ok_or_else(invalid)?
            }
            "sensor_max_points" => {
                self.sensor_max_points = value.parse::<usize>().ok().filter(|v| *v > 0).ok_or_else(invalid)?
            }
            "overstock_factor" => {
                self.overstock_factor = value
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite() && *v >= 1.0)
                    .ok_or_else(invalid)?
            }
            _ => return Err(AppError::not_found("Setting", key)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_server_config_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("AGRIDASH_BIND", "0.0.0.0"),
            ("AGRIDASH_PORT", "9000"),
            ("AGRIDASH_DATA_DIR", "/tmp/agri"),
            ("AGRIDASH_ADMIN_EMAIL", "root@farm.io"),
        ]
        .into_iter()
        .collect();

        let config = ServerConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:9000");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/agri"));
        assert_eq!(config.admin_email.as_deref(), Some("root@farm.io"));
        assert!(config.admin_password.is_none());
    }

    #[test]
    fn test_invalid_env_falls_back() {
        let config = ServerConfig::from_lookup(|k| match k {
            "AGRIDASH_PORT" => Some("not-a-port".into()),
            "AGRIDASH_BIND" => Some("localhost:80".into()),
            _ => None,
        });
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_settings_defaults_match_seed() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(Settings::load(&db), Settings::default());
    }

    #[test]
    fn test_settings_apply_validates() {
        let mut settings = Settings::default();
        settings.apply("max_page_size", "50").unwrap();
        assert_eq!(settings.max_page_size, 50);

        assert!(settings.apply("max_page_size", "0").is_err());
        assert!(settings.apply("overstock_factor", "0.5").is_err());
        assert!(settings.apply("invoice_trend_months", "48").is_err());
        assert!(settings.apply("unknown", "1").is_err());
        assert_eq!(settings.max_page_size, 50);
    }

    #[test]
    fn test_load_skips_invalid_rows() {
        let db = Database::open_in_memory().unwrap();
        db.set_config("sensor_max_points", "lots").unwrap();
        db.set_config("top_suppliers_limit", "3").unwrap();

        let settings = Settings::load(&db);
        assert_eq!(settings.sensor_max_points, 5000);
        assert_eq!(settings.top_suppliers_limit, 3);
    }
}
