//! Top-level butlerd client.
//!
//! [`ButlerClient`] owns the daemon process, the daemon notification
//! registry and the bootstrap coordinator. Starting the client spawns the
//! daemon, reads its output until the listen notification arrives, then
//! connects and authenticates the global socket session.

use super::connector::TcpConnector;
use super::error::{ButlerError, Result};
use super::extensions::forward_log;
use super::process::{DaemonCommand, DaemonProcess, supervise_stdout};
use super::session::{Session, SessionBuilder};
use super::transport::LineReader;
use crate::config::FileConfig;
use crate::logging::JsonlTrafficLogger;
use butlerd_application::{
    BootstrapCoordinator, BootstrapError, NoTrafficLogger, NotificationRegistry, TrafficLogger,
};
use butlerd_domain::daemon::{LISTEN_NOTIFICATION_TYPE, LOG_NOTIFICATION_TYPE};
use butlerd_domain::protocol::meta::{META_FLOW, META_FLOW_ESTABLISHED, MetaFlowEstablished};
use butlerd_domain::{BootstrapPhase, Endpoint, ListenNotification, LogNotification};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Client for a butlerd daemon spawned and owned by this process.
pub struct ButlerClient {
    config: FileConfig,
    daemon_registry: Arc<NotificationRegistry>,
    coordinator: Arc<BootstrapCoordinator<TcpConnector>>,
    secret: Arc<OnceLock<String>>,
    traffic: Arc<dyn TrafficLogger>,
    process: tokio::sync::Mutex<Option<DaemonProcess>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ButlerClient {
    pub fn new(config: FileConfig) -> Self {
        Self::with_global_handlers(config, Ok)
    }

    /// Create a client whose global session gets extra handlers.
    ///
    /// `configure` runs on a builder that already forwards `Log`
    /// notifications.
    pub fn with_global_handlers<F>(config: FileConfig, configure: F) -> Self
    where
        F: Fn(SessionBuilder) -> Result<SessionBuilder> + Send + Sync + 'static,
    {
        let traffic: Arc<dyn TrafficLogger> = match &config.logging.traffic_log {
            Some(path) => match JsonlTrafficLogger::new(path) {
                Some(logger) => {
                    info!("Recording wire traffic to {}", logger.path().display());
                    Arc::new(logger)
                }
                None => Arc::new(NoTrafficLogger),
            },
            None => Arc::new(NoTrafficLogger),
        };

        let connector = TcpConnector::new(config.rpc.session_options(), Arc::clone(&traffic))
            .with_configure(move |builder| {
                let builder = builder
                    .with_log_forwarding()?
                    .on_notification(META_FLOW_ESTABLISHED, |flow: MetaFlowEstablished| {
                        info!(pid = flow.pid, "Meta flow established")
                    })?;
                configure(builder)
            });

        let client = Self {
            config,
            daemon_registry: Arc::new(NotificationRegistry::new("daemon notification")),
            coordinator: Arc::new(BootstrapCoordinator::new(Arc::new(connector))),
            secret: Arc::new(OnceLock::new()),
            traffic,
            process: tokio::sync::Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        };
        client.register_builtin_daemon_handlers();
        client
    }

    fn register_builtin_daemon_handlers(&self) {
        let coordinator = Arc::clone(&self.coordinator);
        let secret = Arc::clone(&self.secret);
        self.register_daemon_handler(LISTEN_NOTIFICATION_TYPE, move |listen: ListenNotification| {
            let _ = secret.set(listen.secret.clone());
            coordinator.on_listen(listen);
        });
        self.register_daemon_handler(LOG_NOTIFICATION_TYPE, |log: LogNotification| {
            forward_log(log.log_level(), &log.message)
        });
    }

    /// Register a handler for a daemon notification type.
    ///
    /// A duplicate registration is logged and ignored; returns whether the
    /// handler was added.
    pub fn register_daemon_handler<T, F>(&self, notification_type: &str, callback: F) -> bool
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        match self.daemon_registry.register(notification_type, callback) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    pub fn phase(&self) -> BootstrapPhase {
        self.coordinator.phase()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<BootstrapPhase> {
        self.coordinator.subscribe()
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        self.coordinator.endpoint()
    }

    /// The global session, once the client is ready.
    pub fn global_session(&self) -> Option<Arc<Session>> {
        self.coordinator.session()
    }

    /// Spawn the daemon (first call only) and wait for readiness.
    ///
    /// Every call, including concurrent ones, resolves to the same global
    /// session.
    pub async fn start(&self) -> Result<Arc<Session>> {
        if self.coordinator.mark_starting() {
            let command = DaemonCommand::from_config(&self.config.daemon);
            match DaemonProcess::spawn(&command) {
                Ok((process, stdout)) => {
                    *self.process.lock().await = Some(process);
                    self.follow_output(stdout);
                }
                Err(e) => {
                    self.coordinator.fail(BootstrapError::Spawn(e.to_string()));
                    return Err(e);
                }
            }
        }
        self.wait_ready().await
    }

    /// Bootstrap from the output of a daemon started elsewhere.
    ///
    /// Returns `false` if the client was already started.
    pub fn attach<R>(&self, output: R) -> bool
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        if !self.coordinator.mark_starting() {
            return false;
        }
        self.follow_output(output);
        true
    }

    fn follow_output<R>(&self, output: R)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.coordinator.mark_awaiting_listen();

        let lines = LineReader::new(output, self.config.rpc.max_line_bytes);
        let registry = Arc::clone(&self.daemon_registry);
        let traffic = Arc::clone(&self.traffic);
        let coordinator = Arc::clone(&self.coordinator);
        let reader = tokio::spawn(async move {
            supervise_stdout(lines, &registry, &*traffic).await;
            coordinator.on_stream_closed();
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.push(reader);

        if self.config.rpc.meta_flow {
            let coordinator = Arc::clone(&self.coordinator);
            tasks.push(tokio::spawn(async move {
                let Ok(session) = coordinator.wait_ready().await else {
                    return;
                };
                debug!("Opening meta flow");
                let shutdown = coordinator.shutdown_token();
                match session
                    .request_until_cancelled::<_, Value>(META_FLOW, &Value::Null, &shutdown)
                    .await
                {
                    Ok(_) => debug!("Meta flow ended"),
                    Err(ButlerError::Cancelled) => debug!("Meta flow closed with the client"),
                    Err(e) => warn!("Meta flow failed: {}", e),
                }
            }));
        }
    }

    /// Wait for the global session without starting anything.
    pub async fn wait_ready(&self) -> Result<Arc<Session>> {
        Ok(self.coordinator.wait_ready().await?)
    }

    /// A builder preconfigured with this client's session options.
    pub fn session_builder(&self) -> SessionBuilder {
        SessionBuilder::new()
            .with_options(self.config.rpc.session_options())
            .with_traffic_logger(Arc::clone(&self.traffic))
    }

    /// Open an additional authenticated session to the daemon.
    ///
    /// Fails with [`ButlerError::NotReady`] before the global session is up.
    pub async fn establish_session(&self, builder: SessionBuilder) -> Result<Session> {
        if self.phase() != BootstrapPhase::Ready {
            return Err(ButlerError::NotReady);
        }
        let (Some(endpoint), Some(secret)) = (self.endpoint(), self.secret.get()) else {
            return Err(ButlerError::NotReady);
        };
        builder.connect_authenticated(endpoint, secret).await
    }

    /// Close the global session and stop the daemon.
    pub async fn shutdown(&self) {
        info!("Shutting down butlerd client");
        let session = self.coordinator.session();
        self.coordinator.close();
        if let Some(session) = session {
            session.close().await;
        }
        for task in self.take_tasks() {
            task.abort();
        }
        if let Some(mut process) = self.process.lock().await.take() {
            process.kill().await;
        }
    }

    fn take_tasks(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Drop for ButlerClient {
    fn drop(&mut self) {
        self.coordinator.close();
        for task in self.take_tasks() {
            task.abort();
        }
    }
}
