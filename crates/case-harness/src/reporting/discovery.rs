// crates/case-harness/src/reporting/discovery.rs
// ============================================================================
// Module: Reporting Sink Discovery
// Description: Ordered, injectable strategies for obtaining a reporting sink.
// Purpose: Resolve the sink once per run and pass it down explicitly.
// Dependencies: crate::log, crate::reporting
// ============================================================================

//! ## Overview
//! Discovery walks its strategies in order: the process-wide installed sink,
//! then synchronous factories, then asynchronous factories. The first success
//! wins. When every strategy fails the run proceeds with reporting disabled
//! and a single `sink_discovery` diagnostic is logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::RwLock;

use super::Reporter;
use super::ReportingSink;
use super::SinkError;
use crate::log::RunEvent;
use crate::log::RunLog;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Boxed future returned by asynchronous sink factories.
pub type SinkFuture =
    Pin<Box<dyn Future<Output = Result<Arc<dyn ReportingSink>, SinkError>> + Send>>;

/// Synchronous sink factory.
pub type SinkFactory = Arc<dyn Fn() -> Result<Arc<dyn ReportingSink>, SinkError> + Send + Sync>;

/// Asynchronous sink factory.
pub type AsyncSinkFactory = Arc<dyn Fn() -> SinkFuture + Send + Sync>;

/// One way of obtaining a reporting sink.
#[derive(Clone)]
pub enum DiscoveryStrategy {
    /// The sink installed with [`install_global_sink`].
    Installed,
    /// A sink supplied directly by the caller.
    Instance(Arc<dyn ReportingSink>),
    /// A synchronous factory.
    Factory(SinkFactory),
    /// An asynchronous factory.
    AsyncFactory(AsyncSinkFactory),
}

// ============================================================================
// SECTION: Installed Sink
// ============================================================================

/// Process-wide sink installed by the surrounding test environment.
static INSTALLED_SINK: RwLock<Option<Arc<dyn ReportingSink>>> = RwLock::new(None);

/// Installs the process-wide sink consulted by [`DiscoveryStrategy::Installed`].
///
/// Returns the previously installed sink, if any.
pub fn install_global_sink(sink: Arc<dyn ReportingSink>) -> Option<Arc<dyn ReportingSink>> {
    INSTALLED_SINK.write().map_or(None, |mut slot| slot.replace(sink))
}

/// Removes and returns the process-wide sink.
pub fn uninstall_global_sink() -> Option<Arc<dyn ReportingSink>> {
    INSTALLED_SINK.write().map_or(None, |mut slot| slot.take())
}

/// Reads the process-wide sink.
fn installed_sink() -> Result<Arc<dyn ReportingSink>, SinkError> {
    INSTALLED_SINK
        .read()
        .map_err(|_| SinkError::Unavailable("installed sink lock poisoned".to_string()))?
        .clone()
        .ok_or_else(|| SinkError::Unavailable("no sink installed".to_string()))
}

// ============================================================================
// SECTION: Discovery
// ============================================================================

/// Ordered list of discovery strategies.
#[derive(Clone)]
pub struct SinkDiscovery {
    /// Strategies tried in order.
    strategies: Vec<DiscoveryStrategy>,
}

impl Default for SinkDiscovery {
    fn default() -> Self {
        Self::standard()
    }
}

impl SinkDiscovery {
    /// Discovery that only consults the installed process-wide sink.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            strategies: vec![DiscoveryStrategy::Installed],
        }
    }

    /// Discovery that never finds a sink.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Discovery that always yields `sink`.
    #[must_use]
    pub fn instance(sink: Arc<dyn ReportingSink>) -> Self {
        Self {
            strategies: vec![DiscoveryStrategy::Instance(sink)],
        }
    }

    /// Appends a synchronous factory.
    #[must_use]
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ReportingSink>, SinkError> + Send + Sync + 'static,
    {
        self.strategies.push(DiscoveryStrategy::Factory(Arc::new(factory)));
        self
    }

    /// Appends an asynchronous factory.
    #[must_use]
    pub fn with_async_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> SinkFuture + Send + Sync + 'static,
    {
        self.strategies.push(DiscoveryStrategy::AsyncFactory(Arc::new(factory)));
        self
    }

    /// Returns the configured strategies in order.
    #[must_use]
    pub fn strategies(&self) -> &[DiscoveryStrategy] {
        &self.strategies
    }

    /// Resolves the first available sink.
    ///
    /// # Errors
    ///
    /// Returns the collected [`SinkError`] messages when every strategy fails.
    pub async fn resolve(&self) -> Result<Arc<dyn ReportingSink>, SinkError> {
        let mut failures = Vec::new();
        for strategy in &self.strategies {
            let attempt = match strategy {
                DiscoveryStrategy::Installed => installed_sink(),
                DiscoveryStrategy::Instance(sink) => Ok(Arc::clone(sink)),
                DiscoveryStrategy::Factory(factory) => factory(),
                DiscoveryStrategy::AsyncFactory(factory) => factory().await,
            };
            match attempt {
                Ok(sink) => return Ok(sink),
                Err(err) => failures.push(err.to_string()),
            }
        }
        if failures.is_empty() {
            failures.push("no discovery strategies configured".to_string());
        }
        Err(SinkError::Unavailable(failures.join("; ")))
    }

    /// Builds the run's reporter.
    ///
    /// With reporting disabled no strategy is consulted.
    pub async fn discover(&self, enabled: bool, log: Arc<dyn RunLog>) -> Reporter {
        if !enabled {
            return Reporter::new(None, false, log);
        }
        match self.resolve().await {
            Ok(sink) => Reporter::new(Some(sink), true, log),
            Err(err) => {
                log.record(
                    &RunEvent::new("sink_discovery")
                        .message(format!("reporting disabled: {err}")),
                );
                Reporter::new(None, true, log)
            }
        }
    }
}
