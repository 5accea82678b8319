//! Engine bootstrap: configuration, telemetry and registry construction.

use std::rc::Rc;
use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;
use tracing::info;

use modem_config::{Config, OrthoConfig};

use crate::events::EventQueue;
use crate::service::{CallService, CallServiceOptions};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::Transport;

const BOOTSTRAP_TARGET: &str = "modem_core::bootstrap";

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader {
    /// Loads the engine configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when no valid configuration can be built.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Result of a successful bootstrap.
///
/// Every registry built from one engine shares its event queue.
#[derive(Debug)]
pub struct Engine {
    config: Config,
    telemetry: TelemetryHandle,
    events: EventQueue,
}

impl Engine {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Queue receiving every registry's notifications.
    #[must_use]
    pub const fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Registry options derived from the configuration.
    #[must_use]
    pub fn options(&self) -> CallServiceOptions {
        CallServiceOptions::from(&self.config)
    }

    /// Builds an unconnected call registry for the modem at `modem_path`.
    #[must_use]
    pub fn call_service(&self, modem_path: &str, transport: Rc<dyn Transport>) -> CallService {
        info!(target: BOOTSTRAP_TARGET, modem = modem_path, "creating call service");
        CallService::new(modem_path, transport, self.events.clone(), self.options())
    }
}

/// Bootstraps the engine from the system configuration layers.
///
/// # Errors
///
/// See [`bootstrap_with`].
pub fn bootstrap() -> Result<Engine, BootstrapError> {
    bootstrap_with(&SystemConfigLoader)
}

/// Bootstraps the engine using the supplied loader.
///
/// # Errors
///
/// Returns [`BootstrapError::Configuration`] when the configuration cannot be
/// loaded and [`BootstrapError::Telemetry`] when logging cannot be set up.
pub fn bootstrap_with(loader: &dyn ConfigLoader) -> Result<Engine, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry = telemetry::initialise(&config.log_settings())
        .map_err(|source| BootstrapError::Telemetry { source })?;
    info!(
        target: BOOTSTRAP_TARGET,
        service = config.service_name(),
        format = %config.log_format(),
        "engine bootstrapped"
    );
    Ok(Engine {
        config,
        telemetry,
        events: EventQueue::new(),
    })
}
