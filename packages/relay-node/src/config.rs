//! Node configuration
//!
//! Loads from environment variables (optionally via a `.env` file). Each
//! direction carries its own deposit/execution limits and ledger reserve;
//! the validator set and threshold are shared by both directions.

use alloy::primitives::Address;
use eyre::{eyre, Result, WrapErr};
use std::env;
use std::path::Path;
use std::str::FromStr;

use relay_core::{LimitConfig, RateLimiter, TransferKind};

/// Main configuration for the relay node
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub validators: ValidatorConfig,
    pub home: DirectionConfig,
    pub foreign: DirectionConfig,
}

/// HTTP API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_address: String,
    pub port: u16,
}

/// Validator set configuration
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub validators: Vec<Address>,
    pub required_signatures: usize,
}

/// Per-direction limits and ledger backing
#[derive(Debug, Clone)]
pub struct DirectionConfig {
    pub deposit_min_per_tx: u128,
    pub deposit_max_per_tx: u128,
    pub deposit_daily_limit: u128,
    pub execution_min_per_tx: u128,
    pub execution_max_per_tx: u128,
    pub execution_daily_limit: u128,
    /// Backing reserve for the in-memory ledger effect handler
    pub reserve: u128,
}

impl DirectionConfig {
    /// Build the direction's rate limiter, validating limit ordering.
    pub fn rate_limiter(&self) -> Result<RateLimiter> {
        let deposit = LimitConfig::new(
            TransferKind::Deposit,
            self.deposit_min_per_tx,
            self.deposit_max_per_tx,
            self.deposit_daily_limit,
        )?;
        let withdrawal = LimitConfig::new(
            TransferKind::Withdrawal,
            self.execution_min_per_tx,
            self.execution_max_per_tx,
            self.execution_daily_limit,
        )?;
        Ok(RateLimiter::new(deposit, withdrawal))
    }
}

/// Default functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9090
}

fn default_min_per_tx() -> u128 {
    1
}

fn default_max_per_tx() -> u128 {
    1_000_000_000
}

fn default_daily_limit() -> u128 {
    10_000_000_000
}

fn default_reserve() -> u128 {
    1_000_000_000_000
}

/// Parse a comma-separated list of 0x-prefixed validator addresses.
pub fn parse_validators(raw: &str) -> Result<Vec<Address>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Address::from_str(s).wrap_err_with(|| format!("Invalid validator address: {s}")))
        .collect()
}

fn env_u128(name: &str, default: u128) -> Result<u128> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u128>()
            .wrap_err_with(|| format!("{name} must be an unsigned integer, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    /// Loads .env file if present, then reads from environment.
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env").or_else(|_| Self::load_from_env())
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    fn load_from_env() -> Result<Self> {
        let api = ApiConfig {
            bind_address: env::var("API_BIND").unwrap_or_else(|_| default_bind_address()),
            port: match env::var("API_PORT") {
                Ok(raw) => raw
                    .parse::<u16>()
                    .wrap_err_with(|| format!("API_PORT must be a port number, got '{raw}'"))?,
                Err(_) => default_port(),
            },
        };

        let raw_validators = env::var("RELAY_VALIDATORS")
            .map_err(|_| eyre!("RELAY_VALIDATORS environment variable is required"))?;
        let validators = parse_validators(&raw_validators)?;

        let required_signatures = match env::var("RELAY_REQUIRED_SIGNATURES") {
            Ok(raw) => raw.parse::<usize>().wrap_err_with(|| {
                format!("RELAY_REQUIRED_SIGNATURES must be an unsigned integer, got '{raw}'")
            })?,
            Err(_) => 1,
        };

        Ok(Config {
            api,
            validators: ValidatorConfig {
                validators,
                required_signatures,
            },
            home: Self::direction_from_env("HOME")?,
            foreign: Self::direction_from_env("FOREIGN")?,
        })
    }

    fn direction_from_env(prefix: &str) -> Result<DirectionConfig> {
        Ok(DirectionConfig {
            deposit_min_per_tx: env_u128(
                &format!("{prefix}_DEPOSIT_MIN_PER_TX"),
                default_min_per_tx(),
            )?,
            deposit_max_per_tx: env_u128(
                &format!("{prefix}_DEPOSIT_MAX_PER_TX"),
                default_max_per_tx(),
            )?,
            deposit_daily_limit: env_u128(
                &format!("{prefix}_DEPOSIT_DAILY_LIMIT"),
                default_daily_limit(),
            )?,
            execution_min_per_tx: env_u128(
                &format!("{prefix}_EXECUTION_MIN_PER_TX"),
                default_min_per_tx(),
            )?,
            execution_max_per_tx: env_u128(
                &format!("{prefix}_EXECUTION_MAX_PER_TX"),
                default_max_per_tx(),
            )?,
            execution_daily_limit: env_u128(
                &format!("{prefix}_EXECUTION_DAILY_LIMIT"),
                default_daily_limit(),
            )?,
            reserve: env_u128(&format!("{prefix}_RESERVE"), default_reserve())?,
        })
    }
}
