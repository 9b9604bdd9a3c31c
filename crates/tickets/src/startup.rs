//! Starts the background bridge subsystems once per process.
//!
//! The platform may report "ready" several times (reconnects, resumed
//! sessions, shards). Only the first report starts the bridges.

use std::{
    panic::AssertUnwindSafe,
    sync::atomic::{AtomicBool, Ordering},
};

use {
    async_trait::async_trait,
    futures::FutureExt,
    tracing::{error, info},
};

use crate::error::BootstrapError;

/// A background subsystem started with the platform client handle.
///
/// `start` should spawn its long-running work and return once the
/// subsystem is up.
#[async_trait]
pub trait Bridge<H>: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self, client: H) -> anyhow::Result<()>;
}

/// Result of one [`StartupGuard::ensure_started`] call.
#[derive(Debug)]
pub enum StartupOutcome {
    /// This call won the latch and ran the bootstraps.
    Started { failures: Vec<BootstrapError> },
    /// An earlier call already ran them.
    AlreadyStarted,
}

impl StartupOutcome {
    #[must_use]
    pub fn is_first(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

/// One-shot latch. Failures do not reset it.
#[derive(Debug, Default)]
pub struct StartupGuard {
    started: AtomicBool,
}

impl StartupGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Run both bootstraps in order on the first call; do nothing after.
    ///
    /// A missing bridge is skipped. A failing or panicking bridge is logged
    /// and does not stop the other.
    pub async fn ensure_started<H>(
        &self,
        client: H,
        first: Option<&dyn Bridge<H>>,
        second: Option<&dyn Bridge<H>>,
    ) -> StartupOutcome
    where
        H: Clone + Send + 'static,
    {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("bridges already started, skipping");
            return StartupOutcome::AlreadyStarted;
        }

        let mut failures = Vec::new();
        for (slot, bridge) in [("first", first), ("second", second)] {
            let Some(bridge) = bridge else {
                info!(slot, "bridge not configured, skipping");
                continue;
            };
            if let Err(e) = start_one(bridge, client.clone()).await {
                error!(bridge = e.bridge(), error = %e, "bridge failed to start");
                failures.push(e);
            }
        }
        StartupOutcome::Started { failures }
    }
}

async fn start_one<H>(bridge: &dyn Bridge<H>, client: H) -> Result<(), BootstrapError>
where
    H: Send + 'static,
{
    let name = bridge.name().to_string();
    let result = AssertUnwindSafe(bridge.start(client)).catch_unwind().await;
    match result {
        Ok(Ok(())) => {
            info!(bridge = %name, "bridge started");
            Ok(())
        },
        Ok(Err(source)) => Err(BootstrapError::Failed {
            bridge: name,
            source,
        }),
        Err(_) => Err(BootstrapError::Failed {
            bridge: name,
            source: anyhow::anyhow!("bridge panicked during start"),
        }),
    }
}
