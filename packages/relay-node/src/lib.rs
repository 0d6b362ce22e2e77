//! Relay node library
//!
//! Wraps the relay core in a runnable validator daemon: env configuration,
//! an in-memory ledger effect handler, an axum submission API, and
//! Prometheus metrics.

pub mod api;
pub mod config;
pub mod ledger;
pub mod metrics;

use std::sync::Arc;

use eyre::Result;
use tokio::sync::Mutex;

use relay_core::{Direction, RelayExecutor, ValidatorSet};

use config::{DirectionConfig, ValidatorConfig};
use ledger::Ledger;

/// Build a direction's executor from configuration.
pub fn build_executor(
    direction: Direction,
    dir_config: &DirectionConfig,
    validators: &ValidatorConfig,
) -> Result<RelayExecutor<Ledger>> {
    let set = ValidatorSet::new(
        validators.validators.clone(),
        validators.required_signatures,
    )?;
    let limits = dir_config.rate_limiter()?;
    Ok(RelayExecutor::new(
        direction,
        set,
        limits,
        Ledger::new(dir_config.reserve),
    ))
}

/// Build the shared API state from configuration: one executor per direction.
pub fn build_state(config: &config::Config) -> Result<api::AppState> {
    let home = build_executor(Direction::HomeToForeign, &config.home, &config.validators)?;
    let foreign = build_executor(Direction::ForeignToHome, &config.foreign, &config.validators)?;
    Ok(api::AppState {
        home: Arc::new(Mutex::new(home)),
        foreign: Arc::new(Mutex::new(foreign)),
    })
}
