//! Runtime configuration for the stream processor.

use purge_core::LogFormat;

use crate::error::{Error, Result};
use crate::store::DEFAULT_PAGE_SIZE;

const ENV_LOG_FORMAT: &str = "PURGE_LOG_FORMAT";
const ENV_EVENT_PAGE_SIZE: &str = "PURGE_EVENT_PAGE_SIZE";
const ENV_STATE_MACHINE_NAME: &str = "PURGE_STATE_MACHINE_NAME";

const DEFAULT_STATE_MACHINE_NAME: &str = "purge-deletion";

/// Stream processor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Log output format.
    pub log_format: LogFormat,
    /// Events read per statistics scan page.
    pub event_page_size: usize,
    /// Workflow that deletion executions are started on.
    pub state_machine_name: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            event_page_size: DEFAULT_PAGE_SIZE,
            state_machine_name: DEFAULT_STATE_MACHINE_NAME.to_string(),
        }
    }
}

impl ProcessorConfig {
    /// Loads configuration from the process environment with strict validation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a value is present but invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads configuration with a custom environment source.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a value is present but invalid.
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_format = match get_env(ENV_LOG_FORMAT).as_deref().map(str::trim) {
            None | Some("") => LogFormat::default(),
            Some(raw) => parse_log_format(raw)?,
        };

        let page_size = parse_positive_u64_env(&get_env, ENV_EVENT_PAGE_SIZE, DEFAULT_PAGE_SIZE as u64)?;
        let event_page_size = usize::try_from(page_size).map_err(|_| {
            Error::configuration(format!(
                "{ENV_EVENT_PAGE_SIZE} value {page_size} exceeds supported range"
            ))
        })?;

        let state_machine_name = match get_env(ENV_STATE_MACHINE_NAME) {
            Some(name) if name.trim().is_empty() => {
                return Err(Error::configuration(format!(
                    "{ENV_STATE_MACHINE_NAME} must not be empty"
                )));
            }
            Some(name) => name.trim().to_string(),
            None => DEFAULT_STATE_MACHINE_NAME.to_string(),
        };

        Ok(Self {
            log_format,
            event_page_size,
            state_machine_name,
        })
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat> {
    match raw.to_ascii_lowercase().as_str() {
        "json" => Ok(LogFormat::Json),
        "pretty" => Ok(LogFormat::Pretty),
        _ => Err(Error::configuration(format!(
            "{ENV_LOG_FORMAT} must be 'json' or 'pretty', got '{raw}'"
        ))),
    }
}

fn parse_positive_u64_env<F>(get_env: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get_env(key) else {
        return Ok(default);
    };

    let parsed = raw.trim().parse::<u64>().map_err(|_| {
        Error::configuration(format!("{key} must be a positive integer, got '{raw}'"))
    })?;
    if parsed == 0 {
        return Err(Error::configuration(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(parsed)
}
