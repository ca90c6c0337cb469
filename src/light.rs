// src/light.rs

//! Light Controller - writes state changes to the lighting bridge
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::error::{PulseError, Result};

/// Desired light state. Unset fields are left untouched on the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
    /// Deciseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitiontime: Option<u16>,
}

/// Convert a pulse interval to the bridge's transition unit (100 ms).
pub fn transition_time(pulse: Duration) -> u16 {
    u16::try_from(pulse.as_millis() / 100).unwrap_or(u16::MAX)
}

/// Transport for light state changes.
#[async_trait]
pub trait Lamp: Send + Sync {
    async fn set_state(&self, state: &LightState) -> Result<()>;
}

/// A single light behind a Hue-style REST bridge.
pub struct HueLamp {
    url: String,
    client: reqwest::Client,
}

impl HueLamp {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.light_state_url(), config.bridge_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Lamp for HueLamp {
    async fn set_state(&self, state: &LightState) -> Result<()> {
        let response = self.client.put(&self.url).json(state).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PulseError::BridgeStatus(status));
        }

        // The bridge reports per-field failures inside a 2xx body.
        let body: Value = response.json().await.unwrap_or(Value::Null);
        match bridge_errors(&body) {
            Some(description) => Err(PulseError::BridgeRejected(description)),
            None => Ok(()),
        }
    }
}

/// Collect the `error.description` entries of a bridge reply, if any.
fn bridge_errors(body: &Value) -> Option<String> {
    let descriptions: Vec<String> = body
        .as_array()?
        .iter()
        .filter_map(|entry| entry.get("error"))
        .map(|error| {
            error
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string())
        })
        .collect();

    if descriptions.is_empty() {
        None
    } else {
        Some(descriptions.join("; "))
    }
}

/// The light operations the pulse job needs, with brightness bounds and the
/// default state baked in.
#[derive(Clone)]
pub struct LightController {
    lamp: Arc<dyn Lamp>,
    bri_lo: u8,
    bri_hi: u8,
    default_state: LightState,
}

impl LightController {
    pub fn new(lamp: Arc<dyn Lamp>, bri_lo: u8, bri_hi: u8, default_state: LightState) -> Self {
        Self {
            lamp,
            bri_lo,
            bri_hi,
            default_state,
        }
    }

    pub fn from_config(lamp: Arc<dyn Lamp>, config: &Config) -> Self {
        Self::new(lamp, config.bri_lo, config.bri_hi, config.default_state.clone())
    }

    pub async fn set_state(&self, state: &LightState) -> Result<()> {
        self.lamp.set_state(state).await
    }

    pub async fn dim(&self, hue: u16, transitiontime: u16) -> Result<()> {
        self.set_state(&LightState {
            on: Some(true),
            hue: Some(hue),
            bri: Some(self.bri_lo),
            sat: None,
            transitiontime: Some(transitiontime),
        })
        .await
    }

    pub async fn bright(&self, hue: u16, transitiontime: u16) -> Result<()> {
        self.set_state(&LightState {
            on: Some(true),
            hue: Some(hue),
            bri: Some(self.bri_hi),
            sat: None,
            transitiontime: Some(transitiontime),
        })
        .await
    }

    /// Steady colour shown when a job ends.
    pub async fn terminal(&self, hue: u16) -> Result<()> {
        self.set_state(&LightState {
            on: Some(true),
            hue: Some(hue),
            ..Default::default()
        })
        .await
    }

    pub async fn restore_default(&self) -> Result<()> {
        self.set_state(&self.default_state).await
    }
}
