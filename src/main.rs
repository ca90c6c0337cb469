use std::sync::Arc;

use pulse_bridge::{AppState, Config, HueLamp, LightController, PulseActor};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    color_eyre::install()?;

    let config = Arc::new(Config::from_env()?);
    info!(
        "Initiating, pulse time ms and transition time are: {} {}",
        config.pulse_time_ms,
        config.transition_time()
    );

    let lamp = HueLamp::from_config(&config)?;
    info!("Driving light at {}", lamp.url());
    let light = LightController::from_config(Arc::new(lamp), &config);

    let (actor, pulse) = PulseActor::new(light, config.pulse_time());
    tokio::spawn(actor.run());

    pulse_bridge::serve(AppState { config, pulse }).await?;
    Ok(())
}
