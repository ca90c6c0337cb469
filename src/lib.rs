pub mod config;
pub mod error;
pub mod light;
pub mod pulse;
pub mod server;

pub use config::Config;
pub use error::{ConfigError, PulseError, Result};
pub use light::{HueLamp, Lamp, LightController, LightState};
pub use pulse::{PulseActor, PulseHandle, PulseJob};
pub use server::{router, serve, AppState};
