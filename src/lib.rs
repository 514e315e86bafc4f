//! Sessionkeep is an authentication and session core: password credentials,
//! scoped tokens with refresh rotation, a read-through session cache and
//! role-based authorization.

#![forbid(unsafe_code)]

pub mod adapters;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod dto;
pub mod error;
pub mod policy;
pub mod ports;
pub mod service;
pub mod session;
pub mod telemetry;
pub mod token;

use std::sync::Arc;

pub use domain::{EmailAddress, Identity, Role};
pub use dto::{Credentials, NewPassword};
pub use error::{AuthError, Result};
pub use policy::{AccessPolicy, authorize};
pub use service::AuthService;
pub use token::TokenPair;

use crate::adapters::{
    LogNotifier, MemoryCache, RabbitMqNotifier, RedisCache, SystemClock,
};
use crate::ports::{CachePort, Notifier, UserDirectory};

/// Initialize the authentication service around a user directory.
///
/// Reads `config.yaml` and the `JWT_SECRET` environment variable, then
/// connects to Redis and RabbitMQ when they are configured.
pub async fn initialize_service(
    directory: Arc<dyn UserDirectory>,
) -> std::result::Result<AuthService, Box<dyn std::error::Error>> {
    // read configuration file.
    let config = config::Configuration::default().read()?;

    let secret = std::env::var(config::SECRET_ENV).map_err(|_| {
        AuthError::Configuration(format!(
            "missing `{}` environment variable",
            config::SECRET_ENV
        ))
    })?;

    telemetry::describe_metrics();

    let hasher = crypto::PasswordHasher::new(&config.argon2)?;
    let codec = token::TokenCodec::new(
        &config.token,
        secret,
        Arc::new(SystemClock::new()),
    )?;

    let cache: Arc<dyn CachePort> = match &config.cache.address {
        Some(address) => Arc::new(RedisCache::connect(address).await?),
        None => {
            tracing::warn!("missing `cache.address`, using in-process cache");
            Arc::new(MemoryCache::new())
        },
    };

    let notifier: Arc<dyn Notifier> = match &config.mail {
        Some(mail) => Arc::new(RabbitMqNotifier::new(mail).await?),
        None => {
            tracing::warn!("missing `mail` entry, notifications are only logged");
            Arc::new(LogNotifier)
        },
    };

    Ok(AuthService::new(
        &config, directory, cache, notifier, hasher, codec,
    ))
}
