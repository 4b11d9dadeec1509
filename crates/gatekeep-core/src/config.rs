//! Core configuration.
//!
//! ```bash
//! GATEKEEP_ONLINE_CLOCK_SKEW_MINUTES=10     # server-side QR and document checks
//! GATEKEEP_OFFLINE_CLOCK_SKEW_MINUTES=5     # handed to devices at enrollment
//! GATEKEEP_ENROLLMENT_TTL_HOURS=24
//! GATEKEEP_ENROLLMENT_BASE_URL=https://gatekeep.local/enroll
//! GATEKEEP_KEY_ENCRYPTION_KEY=<64 hex chars>  # required
//! ```

use std::env;
use std::ops::RangeInclusive;
use std::sync::Arc;

use gatekeep_crypto::KeyEncryptionKey;
use thiserror::Error;

pub const DEFAULT_ONLINE_CLOCK_SKEW_MINUTES: i64 = 10;
pub const DEFAULT_OFFLINE_CLOCK_SKEW_MINUTES: i64 = 5;
pub const DEFAULT_ENROLLMENT_TTL_HOURS: i64 = 24;
pub const DEFAULT_ENROLLMENT_BASE_URL: &str = "https://gatekeep.local/enroll";
/// One day either side of a window.
pub const MAX_CLOCK_SKEW_MINUTES: i64 = 1440;
pub const MAX_ENROLLMENT_TTL_HOURS: i64 = 720;

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Tolerance applied where the server validates (signed QR, documents).
    pub online_clock_skew_minutes: i64,
    /// Tolerance a device must apply offline; returned by enrollment.
    pub offline_clock_skew_minutes: i64,
    pub enrollment_ttl_hours: i64,
    pub enrollment_base_url: String,
    pub key_encryption_key: Arc<KeyEncryptionKey>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Invalid key encryption key: {0}")]
    InvalidKey(String),
}

impl GateConfig {
    /// Defaults with an explicit key-encryption key.
    pub fn new(key_encryption_key: KeyEncryptionKey) -> Self {
        Self {
            online_clock_skew_minutes: DEFAULT_ONLINE_CLOCK_SKEW_MINUTES,
            offline_clock_skew_minutes: DEFAULT_OFFLINE_CLOCK_SKEW_MINUTES,
            enrollment_ttl_hours: DEFAULT_ENROLLMENT_TTL_HOURS,
            enrollment_base_url: DEFAULT_ENROLLMENT_BASE_URL.to_string(),
            key_encryption_key: Arc::new(key_encryption_key),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let kek_hex = env::var("GATEKEEP_KEY_ENCRYPTION_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GATEKEEP_KEY_ENCRYPTION_KEY"))?;
        let kek = KeyEncryptionKey::from_hex(&kek_hex)
            .map_err(|e| ConfigError::InvalidKey(e.to_string()))?;

        let mut config = Self::new(kek);
        config.online_clock_skew_minutes = bounded_var(
            "GATEKEEP_ONLINE_CLOCK_SKEW_MINUTES",
            DEFAULT_ONLINE_CLOCK_SKEW_MINUTES,
            0..=MAX_CLOCK_SKEW_MINUTES,
        )?;
        config.offline_clock_skew_minutes = bounded_var(
            "GATEKEEP_OFFLINE_CLOCK_SKEW_MINUTES",
            DEFAULT_OFFLINE_CLOCK_SKEW_MINUTES,
            0..=MAX_CLOCK_SKEW_MINUTES,
        )?;
        config.enrollment_ttl_hours = bounded_var(
            "GATEKEEP_ENROLLMENT_TTL_HOURS",
            DEFAULT_ENROLLMENT_TTL_HOURS,
            1..=MAX_ENROLLMENT_TTL_HOURS,
        )?;
        if let Ok(url) = env::var("GATEKEEP_ENROLLMENT_BASE_URL") {
            config.enrollment_base_url = url.trim_end_matches('/').to_string();
        }

        Ok(config)
    }
}

/// Integer variable with a default, rejected outside `range`.
fn bounded_var(
    name: &'static str,
    default: i64,
    range: RangeInclusive<i64>,
) -> Result<i64, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => match value.trim().parse::<i64>() {
            Ok(n) if range.contains(&n) => Ok(n),
            _ => Err(ConfigError::InvalidValue { name, value }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "GATEKEEP_ONLINE_CLOCK_SKEW_MINUTES",
        "GATEKEEP_OFFLINE_CLOCK_SKEW_MINUTES",
        "GATEKEEP_ENROLLMENT_TTL_HOURS",
        "GATEKEEP_ENROLLMENT_BASE_URL",
        "GATEKEEP_KEY_ENCRYPTION_KEY",
    ];

    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
    }

    impl<'a> EnvGuard<'a> {
        fn new() -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            for var in ENV_VARS {
                env::remove_var(var);
            }
            Self { _lock: lock }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for var in ENV_VARS {
                env::remove_var(var);
            }
        }
    }

    fn set_kek() {
        env::set_var("GATEKEEP_KEY_ENCRYPTION_KEY", "ab".repeat(32));
    }

    #[test]
    fn test_defaults() {
        let _guard = EnvGuard::new();
        set_kek();

        let config = GateConfig::from_env().unwrap();
        assert_eq!(config.online_clock_skew_minutes, 10);
        assert_eq!(config.offline_clock_skew_minutes, 5);
        assert_eq!(config.enrollment_ttl_hours, 24);
        assert_eq!(config.enrollment_base_url, "https://gatekeep.local/enroll");
        assert_eq!(config.key_encryption_key.as_bytes(), &[0xab; 32]);
    }

    #[test]
    fn test_overrides() {
        let _guard = EnvGuard::new();
        set_kek();
        env::set_var("GATEKEEP_ONLINE_CLOCK_SKEW_MINUTES", "15");
        env::set_var("GATEKEEP_OFFLINE_CLOCK_SKEW_MINUTES", "3");
        env::set_var("GATEKEEP_ENROLLMENT_TTL_HOURS", "48");
        env::set_var("GATEKEEP_ENROLLMENT_BASE_URL", "https://gate.example.com/e/");

        let config = GateConfig::from_env().unwrap();
        assert_eq!(config.online_clock_skew_minutes, 15);
        assert_eq!(config.offline_clock_skew_minutes, 3);
        assert_eq!(config.enrollment_ttl_hours, 48);
        assert_eq!(config.enrollment_base_url, "https://gate.example.com/e");
    }

    #[test]
    fn test_missing_key() {
        let _guard = EnvGuard::new();

        let result = GateConfig::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::MissingEnvVar("GATEKEEP_KEY_ENCRYPTION_KEY"))
        ));
    }

    #[test]
    fn test_invalid_values() {
        let _guard = EnvGuard::new();
        env::set_var("GATEKEEP_KEY_ENCRYPTION_KEY", "not-hex");
        assert!(matches!(
            GateConfig::from_env(),
            Err(ConfigError::InvalidKey(_))
        ));

        set_kek();
        env::set_var("GATEKEEP_OFFLINE_CLOCK_SKEW_MINUTES", "-1");
        match GateConfig::from_env() {
            Err(ConfigError::InvalidValue { name, value }) => {
                assert_eq!(name, "GATEKEEP_OFFLINE_CLOCK_SKEW_MINUTES");
                assert_eq!(value, "-1");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_implausible_durations() {
        let _guard = EnvGuard::new();
        set_kek();

        for (name, value) in [
            ("GATEKEEP_ONLINE_CLOCK_SKEW_MINUTES", "1441"),
            ("GATEKEEP_OFFLINE_CLOCK_SKEW_MINUTES", "9223372036854775"),
            ("GATEKEEP_ENROLLMENT_TTL_HOURS", "0"),
            ("GATEKEEP_ENROLLMENT_TTL_HOURS", "721"),
        ] {
            env::set_var(name, value);
            match GateConfig::from_env() {
                Err(ConfigError::InvalidValue { name: got, .. }) => assert_eq!(got, name),
                other => panic!("expected InvalidValue for {name}={value}, got {other:?}"),
            }
            env::remove_var(name);
        }

        env::set_var("GATEKEEP_ONLINE_CLOCK_SKEW_MINUTES", "1440");
        env::set_var("GATEKEEP_ENROLLMENT_TTL_HOURS", "720");
        let config = GateConfig::from_env().unwrap();
        assert_eq!(config.online_clock_skew_minutes, MAX_CLOCK_SKEW_MINUTES);
        assert_eq!(config.enrollment_ttl_hours, MAX_ENROLLMENT_TTL_HOURS);
    }
}
