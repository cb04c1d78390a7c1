use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scenarios_dir: PathBuf,
    pub notification_capacity: usize,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let scenarios_dir = settings
            .get_string("content.scenarios_dir")
            .or_else(|_| env::var("SCENARIOS_DIR"))
            .unwrap_or_else(|_| "scenarios".to_string());

        let notification_capacity = settings
            .get_int("notifications.capacity")
            .ok()
            .map(|v| v.to_string())
            .or_else(|| env::var("NOTIFICATION_CAPACITY").ok())
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_NOTIFICATION_CAPACITY);

        let log_format = settings
            .get_string("log.format")
            .or_else(|_| env::var("LOG_FORMAT"))
            .map(|v| LogFormat::parse(&v))
            .unwrap_or(LogFormat::Pretty);

        Ok(Config {
            scenarios_dir: PathBuf::from(scenarios_dir),
            notification_capacity,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "APP_ENV",
            "APP__CONTENT__SCENARIOS_DIR",
            "APP__NOTIFICATIONS__CAPACITY",
            "SCENARIOS_DIR",
            "NOTIFICATION_CAPACITY",
            "LOG_FORMAT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_without_env() {
        clear_env();
        let config = Config::load().unwrap();
        assert_eq!(config.scenarios_dir, PathBuf::from("scenarios"));
        assert_eq!(config.notification_capacity, DEFAULT_NOTIFICATION_CAPACITY);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    #[serial]
    fn plain_env_vars_are_used_as_fallback() {
        clear_env();
        env::set_var("SCENARIOS_DIR", "/srv/scenarios");
        env::set_var("NOTIFICATION_CAPACITY", "8");
        env::set_var("LOG_FORMAT", "JSON");

        let config = Config::load().unwrap();
        assert_eq!(config.scenarios_dir, PathBuf::from("/srv/scenarios"));
        assert_eq!(config.notification_capacity, 8);
        assert_eq!(config.log_format, LogFormat::Json);
        clear_env();
    }

    #[test]
    #[serial]
    fn prefixed_env_vars_take_precedence() {
        clear_env();
        env::set_var("SCENARIOS_DIR", "/srv/fallback");
        env::set_var("APP__CONTENT__SCENARIOS_DIR", "/srv/primary");
        env::set_var("NOTIFICATION_CAPACITY", "0");

        let config = Config::load().unwrap();
        assert_eq!(config.scenarios_dir, PathBuf::from("/srv/primary"));
        assert_eq!(config.notification_capacity, DEFAULT_NOTIFICATION_CAPACITY);
        clear_env();
    }
}
