//! Bootstrap use case
//!
//! Drives the client from "daemon spawned" to "authenticated session ready".
//! The daemon announces its socket endpoint and secret in a listen
//! notification on standard output; the coordinator validates the address,
//! connects through a [`SessionConnector`], authenticates and publishes the
//! resulting phase on a `watch` channel so any number of callers can await
//! readiness.

use crate::ports::session_connector::SessionConnector;
use butlerd_domain::{AddressError, BootstrapPhase, Endpoint, ListenNotification};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reasons the bootstrap did not reach `Ready`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
    #[error("Failed to start daemon: {0}")]
    Spawn(String),

    #[error("Invalid listen address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("Failed to connect to daemon socket: {0}")]
    Connect(String),

    #[error("Authentication failed: {0}")]
    Authenticate(String),

    #[error("Daemon rejected the authentication secret")]
    AuthenticationRejected,

    #[error("Daemon output ended before the session was ready")]
    DaemonExited,

    #[error("Client closed")]
    Closed,
}

/// Coordinates readiness of the global session.
pub struct BootstrapCoordinator<C: SessionConnector> {
    connector: Arc<C>,
    phase: watch::Sender<BootstrapPhase>,
    failure: OnceLock<BootstrapError>,
    session: OnceLock<Arc<C::Session>>,
    endpoint: OnceLock<Endpoint>,
    listen_received: AtomicBool,
    shutdown: CancellationToken,
}

impl<C: SessionConnector> BootstrapCoordinator<C> {
    pub fn new(connector: Arc<C>) -> Self {
        let (phase, _) = watch::channel(BootstrapPhase::NotStarted);
        Self {
            connector,
            phase,
            failure: OnceLock::new(),
            session: OnceLock::new(),
            endpoint: OnceLock::new(),
            listen_received: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    fn advance(&self, next: BootstrapPhase) -> bool {
        let advanced = self.phase.send_if_modified(|phase| {
            if phase.can_advance_to(next) {
                *phase = next;
                true
            } else {
                false
            }
        });
        if advanced {
            debug!(phase = %next, "Bootstrap phase changed");
        }
        advanced
    }

    pub fn phase(&self) -> BootstrapPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BootstrapPhase> {
        self.phase.subscribe()
    }

    /// Endpoint announced by the daemon, once a valid one has been seen.
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.endpoint.get().copied()
    }

    /// The authenticated session, only once the phase is `Ready`.
    pub fn session(&self) -> Option<Arc<C::Session>> {
        if self.phase() == BootstrapPhase::Ready {
            self.session.get().cloned()
        } else {
            None
        }
    }

    pub fn failure(&self) -> Option<BootstrapError> {
        self.failure.get().cloned()
    }

    /// `NotStarted → Starting`. Returns `false` if already started.
    pub fn mark_starting(&self) -> bool {
        self.advance(BootstrapPhase::Starting)
    }

    /// `Starting → AwaitingListen`, once the daemon process is running.
    pub fn mark_awaiting_listen(&self) -> bool {
        self.advance(BootstrapPhase::AwaitingListen)
    }

    /// Move to `Failed` with `error`, unless already terminal.
    pub fn fail(&self, error: BootstrapError) {
        if self.phase().is_terminal() {
            debug!(%error, "Ignoring failure after bootstrap settled");
            return;
        }
        warn!(%error, "Bootstrap failed");
        let _ = self.failure.set(error);
        self.advance(BootstrapPhase::Failed);
        self.shutdown.cancel();
    }

    /// Cancelled once the bootstrap is closed or has failed.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Move to `Closed` and abandon any in-flight connection attempt.
    pub fn close(&self) {
        self.shutdown.cancel();
        self.advance(BootstrapPhase::Closed);
    }

    /// Handle the daemon's listen notification.
    ///
    /// Only the first notification is acted on. Connecting and authenticating
    /// run on a spawned task so the daemon reader is never blocked.
    pub fn on_listen(self: &Arc<Self>, notification: ListenNotification) {
        if self.listen_received.swap(true, Ordering::SeqCst) {
            warn!(
                address = %notification.tcp.address,
                "Ignoring repeated listen notification"
            );
            return;
        }

        let endpoint = match notification.endpoint() {
            Ok(endpoint) => endpoint,
            Err(err) => {
                self.fail(err.into());
                return;
            }
        };
        let _ = self.endpoint.set(endpoint);

        if !self.advance(BootstrapPhase::SocketConnecting) {
            warn!(
                phase = %self.phase(),
                "Listen notification arrived outside of awaiting-listen"
            );
            return;
        }
        info!(%endpoint, "Daemon is listening");

        let this = Arc::clone(self);
        let secret = notification.secret;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = this.shutdown.cancelled() => {
                    debug!("Bootstrap cancelled while connecting");
                }
                result = this.establish(endpoint, &secret) => {
                    if let Err(err) = result {
                        this.fail(err);
                    }
                }
            }
        });
    }

    async fn establish(&self, endpoint: Endpoint, secret: &str) -> Result<(), BootstrapError> {
        let session = self
            .connector
            .connect(endpoint)
            .await
            .map_err(|e| BootstrapError::Connect(e.to_string()))?;

        if !self.advance(BootstrapPhase::Authenticating) {
            return Err(BootstrapError::Closed);
        }

        let accepted = self
            .connector
            .authenticate(&session, secret)
            .await
            .map_err(|e| BootstrapError::Authenticate(e.to_string()))?;
        if !accepted {
            return Err(BootstrapError::AuthenticationRejected);
        }

        let _ = self.session.set(Arc::new(session));
        if self.advance(BootstrapPhase::Ready) {
            info!(%endpoint, "Session authenticated");
            Ok(())
        } else {
            Err(BootstrapError::Closed)
        }
    }

    /// The daemon's standard output ended.
    ///
    /// Before readiness this is fatal; afterwards the socket session carries on
    /// until it notices the close itself.
    pub fn on_stream_closed(&self) {
        let phase = self.phase();
        if phase.is_settled() {
            debug!(%phase, "Daemon output closed");
        } else {
            self.fail(BootstrapError::DaemonExited);
        }
    }

    /// Wait until the phase settles and return the global session.
    pub async fn wait_ready(&self) -> Result<Arc<C::Session>, BootstrapError> {
        let mut receiver = self.phase.subscribe();
        let phase = *receiver
            .wait_for(|phase| phase.is_settled())
            .await
            .map_err(|_| BootstrapError::Closed)?;

        match phase {
            BootstrapPhase::Ready => self.session.get().cloned().ok_or(BootstrapError::Closed),
            BootstrapPhase::Failed => Err(self.failure().unwrap_or(BootstrapError::Closed)),
            _ => Err(BootstrapError::Closed),
        }
    }
}
