use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub auth_dev_mode: bool,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub result_display_seconds: u64,
    pub attempt_idle_timeout_minutes: u64,
    pub cleanup_interval_seconds: u64,
}

/// Read `key`, falling back to `default` when unset or unparsable
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {}={:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_or("PORT", 8080),
            auth_dev_mode: env::var("AUTH_DEV_MODE").unwrap_or_else(|_| "false".to_string())
                == "true",
            jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
            jwt_audience: env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "authenticated".to_string()),
            result_display_seconds: env_or("RESULT_DISPLAY_SECONDS", 3),
            attempt_idle_timeout_minutes: env_or("ATTEMPT_IDLE_TIMEOUT_MINUTES", 30),
            cleanup_interval_seconds: env_or("CLEANUP_INTERVAL_SECONDS", 30),
        }
    }

    /// How long a settled result stays viewable before the attempt is dropped
    pub fn result_display_delay(&self) -> Duration {
        Duration::from_secs(self.result_display_seconds)
    }

    pub fn attempt_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_idle_timeout_minutes * 60)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        // SAFETY: test-only variable name, not read by any other test
        unsafe { env::set_var("ECO_TEST_BAD_NUMBER", "lots") };
        assert_eq!(env_or("ECO_TEST_BAD_NUMBER", 42u64), 42);

        unsafe { env::set_var("ECO_TEST_GOOD_NUMBER", "7") };
        assert_eq!(env_or("ECO_TEST_GOOD_NUMBER", 42u64), 7);

        assert_eq!(env_or("ECO_TEST_UNSET_NUMBER", 5u16), 5);
    }

    #[test]
    fn test_durations() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            auth_dev_mode: true,
            jwt_secret: String::new(),
            jwt_audience: "authenticated".to_string(),
            result_display_seconds: 3,
            attempt_idle_timeout_minutes: 2,
            cleanup_interval_seconds: 30,
        };

        assert_eq!(config.result_display_delay(), Duration::from_secs(3));
        assert_eq!(config.attempt_idle_timeout(), Duration::from_secs(120));
    }
}
