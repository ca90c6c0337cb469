// src/config.rs
// Environment driven settings, read once at startup.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::error::ConfigError;
use crate::light::{transition_time, LightState};
use crate::pulse::PulseJob;

/// Hue used by the `/frontend` trigger.
pub const FRONTEND_HUE: u16 = 46920;
/// Pulse interval used by the `/frontend` trigger, independent of `DEFAULT_PULSE_TIME_MS`.
pub const FRONTEND_PULSE_TIME: Duration = Duration::from_millis(500);

const DEFAULT_BRIDGE_TIMEOUT_MS: u64 = 5000;

/// Every environment key the service reads.
const KEYS: [&str; 14] = [
    "PORT",
    "HUE_BRIDGE_API_URI",
    "HUE_LIGHT_ID",
    "HUE_USER_ID",
    "DEFAULT_PULSE_TIME_MS",
    "BRI_LO",
    "BRI_HI",
    "DEFAULT_ON",
    "DEFAULT_HUE",
    "DEFAULT_BRI",
    "DEFAULT_SAT",
    "SUCCESS_HUE",
    "FAILURE_HUE",
    "BRIDGE_TIMEOUT_MS",
];

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub port: u16,
    pub bridge_api_uri: String,
    pub user_id: String,
    pub light_id: String,
    pub pulse_time_ms: u64,
    pub bri_lo: u8,
    pub bri_hi: u8,
    pub default_hue: u16,
    pub success_hue: u16,
    pub failure_hue: u16,
    /// State written back to the light after every terminal colour.
    pub default_state: LightState,
    pub bridge_timeout_ms: u64,
}

impl Config {
    /// Load `.env` when present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(err) if err.not_found() => {}
            Err(err) => {
                return Err(ConfigError::Invalid {
                    key: ".env",
                    value: String::new(),
                    reason: err.to_string(),
                })
            }
        }

        Self::from_vars(&collect_vars(std::env::vars_os())?)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let pulse_time_ms: u64 = parse(vars, "DEFAULT_PULSE_TIME_MS")?;
        if pulse_time_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_PULSE_TIME_MS",
                value: pulse_time_ms.to_string(),
                reason: "pulse time must be greater than zero".into(),
            });
        }

        let default_hue = parse(vars, "DEFAULT_HUE")?;

        Ok(Self {
            port: parse(vars, "PORT")?,
            bridge_api_uri: required(vars, "HUE_BRIDGE_API_URI")?.to_string(),
            user_id: required(vars, "HUE_USER_ID")?.to_string(),
            light_id: required(vars, "HUE_LIGHT_ID")?.to_string(),
            pulse_time_ms,
            bri_lo: parse(vars, "BRI_LO")?,
            bri_hi: parse(vars, "BRI_HI")?,
            default_hue,
            success_hue: parse(vars, "SUCCESS_HUE")?,
            failure_hue: parse(vars, "FAILURE_HUE")?,
            default_state: LightState {
                on: Some(parse_bool(vars, "DEFAULT_ON")?),
                hue: Some(default_hue),
                bri: Some(parse(vars, "DEFAULT_BRI")?),
                sat: Some(parse(vars, "DEFAULT_SAT")?),
                transitiontime: None,
            },
            bridge_timeout_ms: bridge_timeout_ms(vars)?,
        })
    }

    /// `{HUE_BRIDGE_API_URI}{HUE_USER_ID}/lights/{HUE_LIGHT_ID}/state`
    pub fn light_state_url(&self) -> String {
        format!(
            "{}{}/lights/{}/state",
            self.bridge_api_uri, self.user_id, self.light_id
        )
    }

    pub fn pulse_time(&self) -> Duration {
        Duration::from_millis(self.pulse_time_ms)
    }

    /// Bridge transition time matching the default pulse, in deciseconds.
    pub fn transition_time(&self) -> u16 {
        transition_time(self.pulse_time())
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_millis(self.bridge_timeout_ms)
    }

    /// Job started by `/`.
    pub fn default_job(&self) -> PulseJob {
        PulseJob::new(self.default_hue, self.pulse_time())
    }

    /// Job started by `/frontend`.
    pub fn frontend_job(&self) -> PulseJob {
        PulseJob::new(FRONTEND_HUE, FRONTEND_PULSE_TIME)
    }
}

/// Keep the keys this service reads. Anything else in the environment is
/// ignored, even when it is not valid UTF-8.
fn collect_vars<I>(vars: I) -> Result<HashMap<String, String>, ConfigError>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut collected = HashMap::new();
    for (key, value) in vars {
        let Some(key) = KEYS.iter().copied().find(|known| key == **known) else {
            continue;
        };
        let value = value.into_string().map_err(|raw| ConfigError::Invalid {
            key,
            value: raw.to_string_lossy().into_owned(),
            reason: "value is not valid UTF-8".into(),
        })?;
        collected.insert(key.to_string(), value);
    }
    Ok(collected)
}

/// Optional; blank counts as unset.
fn bridge_timeout_ms(vars: &HashMap<String, String>) -> Result<u64, ConfigError> {
    let key = "BRIDGE_TIMEOUT_MS";
    if vars.get(key).map_or(true, |value| value.trim().is_empty()) {
        return Ok(DEFAULT_BRIDGE_TIMEOUT_MS);
    }

    let timeout_ms: u64 = parse(vars, key)?;
    if timeout_ms == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: timeout_ms.to_string(),
            reason: "bridge timeout must be greater than zero".into(),
        });
    }
    Ok(timeout_ms)
}

fn required<'a>(vars: &'a HashMap<String, String>, key: &'static str) -> Result<&'a str, ConfigError> {
    vars.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parse<T>(vars: &HashMap<String, String>, key: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = required(vars, key)?;
    raw.parse::<T>().map_err(|err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

fn parse_bool(vars: &HashMap<String, String>, key: &'static str) -> Result<bool, ConfigError> {
    let raw = required(vars, key)?;
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "expected true or false".into(),
        }),
    }
}
