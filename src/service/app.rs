//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the session
//! engine, connection registry, timeout scheduler, and the axum server
//! into one runnable service with graceful shutdown.

use crate::config::AppConfig;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::session::engine::SessionEngine;
use crate::session::timer::{TimeoutScheduler, TimerEvent};
use crate::utils::current_timestamp;
use crate::ws::registry::ConnectionRegistry;
use crate::ws::server::{router, ServerState};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc::UnboundedReceiver, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Connection registry shared with the transport layer
    registry: Arc<ConnectionRegistry>,

    /// The session engine
    engine: Arc<SessionEngine>,

    /// Metrics collector backing the /metrics endpoint
    metrics: Arc<MetricsCollector>,

    /// Timer event stream, consumed when the service starts
    timer_events: Option<UnboundedReceiver<TimerEvent>>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Shutdown signal for the server task
    shutdown_tx: broadcast::Sender<()>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    /// Service start timestamp
    started_at: DateTime<Utc>,

    /// Address the server actually bound, available after start
    local_addr: Option<std::net::SocketAddr>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing paddock race session service");

        let registry = Arc::new(ConnectionRegistry::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap_or_else(|e| {
            warn!("Failed to create metrics collector, using default: {}", e);
            MetricsCollector::default()
        }));
        let (scheduler, timer_events) = TimeoutScheduler::channel();
        let engine = Arc::new(SessionEngine::new(
            registry.clone(),
            config.matchmaking.clone(),
            scheduler,
            metrics.clone(),
        ));

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            registry,
            engine,
            metrics,
            timer_events: Some(timer_events),
            background_tasks: Vec::new(),
            shutdown_tx,
            is_running: Arc::new(RwLock::new(false)),
            started_at: current_timestamp(),
            local_addr: None,
        })
    }

    /// Start the timer dispatcher and the WebSocket/HTTP server
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting paddock race session service");

        *self.is_running.write().await = true;

        // Timer dispatcher
        if let Some(events) = self.timer_events.take() {
            self.background_tasks.push(self.engine.start(events));
        }

        // WebSocket/HTTP server
        let addr = self.config.listen_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        info!("Server listening on http://{}", local_addr);

        let app = router(self.server_state());
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    info!("Server shutdown signal received");
                })
                .await;
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        });
        self.background_tasks.push(server);

        info!("Paddock race session service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Starting graceful shutdown of paddock service");

        *self.is_running.write().await = false;

        if self.shutdown_tx.send(()).is_err() {
            warn!("No server task listening for shutdown signal");
        }

        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        info!("Paddock service stopped");
        Ok(())
    }

    /// Shared state handed to the router
    fn server_state(&self) -> ServerState {
        ServerState {
            engine: self.engine.clone(),
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            service_name: self.config.service.name.clone(),
            started_at: self.started_at,
            is_running: self.is_running.clone(),
        }
    }

    /// The session engine
    pub fn engine(&self) -> Arc<SessionEngine> {
        self.engine.clone()
    }

    /// The connection registry
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Service start timestamp
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Address the server bound, once started
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.local_addr
    }

    /// Whether the service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}
