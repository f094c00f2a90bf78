//! Server orchestration.
//!
//! Wires the pieces together: restores the registry from the disk cache,
//! starts the persistence worker, and runs the event loop on a `LocalSet`
//! until shutdown. Dropping the serve future (ctrl-c, test teardown) drops
//! the cache worker, which drains its queue before the process moves on.

use crate::cache::{self, CacheWorker};
use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::ServerError;
use crate::event_loop::EventLoop;
use crate::registry::PatchRegistry;
use tokio::net::TcpListener;

/// Patch hub server.
pub struct Server {
    config: ServerConfig,
    registry: PatchRegistry,
    cache: CacheWorker,
}

impl Server {
    /// Restore the registry from the disk cache and start the persistence
    /// worker.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` when the cache root cannot be read or the
    /// worker thread cannot start.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let mut registry = PatchRegistry::new();
        for (key, patches) in cache::restore(&config.cache_dir)? {
            registry.upsert(key, patches);
        }
        tracing::info!(
            keys = registry.key_count(),
            patches = registry.patch_count(),
            "registry restored from {}",
            config.cache_dir.display()
        );

        let cache = CacheWorker::spawn(config.cache_dir.clone())?;
        Ok(Self {
            config,
            registry,
            cache,
        })
    }

    /// Bind the configured address and serve until interrupted.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` when binding fails or the listener breaks.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.bind;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::BindFailed { addr, source })?;
        tracing::info!("listening on {addr}");

        let local = tokio::task::LocalSet::new();
        tokio::select! {
            result = local.run_until(self.serve(listener)) => result,
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|e| {
                    ServerError::Shutdown(format!("failed to listen for shutdown signal: {e}"))
                })?;
                tracing::info!("shutdown signal received, stopping server");
                Ok(())
            }
        }
    }

    /// Serve connections on an already-bound listener.
    ///
    /// Spawns one local task per connection, so this future must be driven
    /// inside a `tokio::task::LocalSet` — every connection and the
    /// dispatcher stay on the current thread. Only returns when the
    /// listener fails; intended to be raced against a shutdown signal or
    /// driven directly by tests.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Accept` when the listener breaks.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let Self {
            config,
            registry,
            cache,
        } = self;
        let dispatcher = Dispatcher::new(registry, cache.handle(), config.max_patch_size);
        let event_loop = EventLoop::new(listener, dispatcher, config.buffer_size);
        let result = event_loop.run().await;
        drop(cache); // joins the worker after draining
        result
    }
}
