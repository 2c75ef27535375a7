use std::fmt;

/// Credentials and settings read from the environment. Nothing is read
/// from disk; this tool is meant to run from CI and cron jobs where env
/// vars are the native configuration surface.
#[derive(Debug, Clone)]
pub struct Config {
    pub mywhoosh_email: String,
    pub mywhoosh_password: String,
    pub garmin_username: String,
    pub garmin_password: String,
    pub log_level: LogLevel,
}

/// How much of the run's feedback reaches stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
}

impl LogLevel {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warning),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("unrecognized LOG_LEVEL {0:?} (expected \"info\" or \"warning\")")]
    BadLogLevel(String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Every missing variable is
    /// reported in one error rather than one per run.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut require = |name: &str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => Some(value),
            _ => {
                missing.push(name.to_owned());
                None
            }
        };

        let credentials = (
            require("MYWHOOSH_EMAIL"),
            require("MYWHOOSH_PASSWORD"),
            require("GARMIN_USERNAME"),
            require("GARMIN_PASSWORD"),
        );

        let (
            Some(mywhoosh_email),
            Some(mywhoosh_password),
            Some(garmin_username),
            Some(garmin_password),
        ) = credentials
        else {
            return Err(ConfigError::MissingVariables(missing));
        };

        let log_level = match lookup("LOG_LEVEL") {
            Some(raw) => LogLevel::parse(&raw).ok_or(ConfigError::BadLogLevel(raw))?,
            None => LogLevel::default(),
        };

        Ok(Self {
            mywhoosh_email,
            mywhoosh_password,
            garmin_username,
            garmin_password,
            log_level,
        })
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_env(name: &str) -> Option<String> {
        match name {
            "MYWHOOSH_EMAIL" => Some("rider@example.com".into()),
            "MYWHOOSH_PASSWORD" => Some("whoosh-secret".into()),
            "GARMIN_USERNAME" => Some("rider".into()),
            "GARMIN_PASSWORD" => Some("garmin-secret".into()),
            _ => None,
        }
    }

    #[test]
    fn loads_a_complete_environment() {
        let config = Config::from_lookup(full_env).unwrap();
        assert_eq!(config.mywhoosh_email, "rider@example.com");
        assert_eq!(config.garmin_username, "rider");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn reports_every_missing_variable_at_once() {
        let error = Config::from_lookup(|_| None).unwrap_err();
        match error {
            ConfigError::MissingVariables(names) => {
                assert_eq!(
                    names,
                    vec![
                        "MYWHOOSH_EMAIL",
                        "MYWHOOSH_PASSWORD",
                        "GARMIN_USERNAME",
                        "GARMIN_PASSWORD",
                    ]
                );
            }
            other => panic!("expected MissingVariables, got {other:?}"),
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let error = Config::from_lookup(|name| {
            if name == "GARMIN_PASSWORD" {
                Some("   ".into())
            } else {
                full_env(name)
            }
        })
        .unwrap_err();

        match error {
            ConfigError::MissingVariables(names) => assert_eq!(names, vec!["GARMIN_PASSWORD"]),
            other => panic!("expected MissingVariables, got {other:?}"),
        }
    }

    #[test]
    fn parses_log_level_variants() {
        for (raw, expected) in [
            ("info", LogLevel::Info),
            ("WARN", LogLevel::Warning),
            ("warning", LogLevel::Warning),
        ] {
            let config = Config::from_lookup(|name| {
                if name == "LOG_LEVEL" {
                    Some(raw.into())
                } else {
                    full_env(name)
                }
            })
            .unwrap();
            assert_eq!(config.log_level, expected, "for {raw:?}");
        }
    }

    #[test]
    fn rejects_unknown_log_level() {
        let error = Config::from_lookup(|name| {
            if name == "LOG_LEVEL" {
                Some("loud".into())
            } else {
                full_env(name)
            }
        })
        .unwrap_err();

        assert!(matches!(error, ConfigError::BadLogLevel(_)));
    }
}
