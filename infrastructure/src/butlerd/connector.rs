//! TCP adapter for the [`SessionConnector`] port.

use super::error::Result;
use super::session::{Session, SessionBuilder};
use async_trait::async_trait;
use butlerd_application::{ConnectorError, SessionConnector, SessionOptions, TrafficLogger};
use butlerd_domain::Endpoint;
use std::sync::Arc;

type Configure = dyn Fn(SessionBuilder) -> Result<SessionBuilder> + Send + Sync;

/// Opens socket sessions with a fixed set of options and handlers.
pub struct TcpConnector {
    options: SessionOptions,
    traffic: Arc<dyn TrafficLogger>,
    configure: Option<Arc<Configure>>,
}

impl TcpConnector {
    pub fn new(options: SessionOptions, traffic: Arc<dyn TrafficLogger>) -> Self {
        Self {
            options,
            traffic,
            configure: None,
        }
    }

    /// Apply `configure` to every builder before connecting (handler registration).
    pub fn with_configure<F>(mut self, configure: F) -> Self
    where
        F: Fn(SessionBuilder) -> Result<SessionBuilder> + Send + Sync + 'static,
    {
        self.configure = Some(Arc::new(configure));
        self
    }

    /// A builder carrying this connector's options and traffic logger.
    pub fn session_builder(&self) -> SessionBuilder {
        SessionBuilder::new()
            .with_options(self.options.clone())
            .with_traffic_logger(Arc::clone(&self.traffic))
    }

    fn configured_builder(&self) -> Result<SessionBuilder> {
        let builder = self.session_builder();
        match &self.configure {
            Some(configure) => configure(builder),
            None => Ok(builder),
        }
    }
}

#[async_trait]
impl SessionConnector for TcpConnector {
    type Session = Session;

    async fn connect(&self, endpoint: Endpoint) -> std::result::Result<Session, ConnectorError> {
        let connect_error = |e: super::error::ButlerError| ConnectorError::Connect {
            endpoint,
            reason: e.to_string(),
        };
        let builder = self.configured_builder().map_err(connect_error)?;
        builder.connect(endpoint).await.map_err(connect_error)
    }

    async fn authenticate(
        &self,
        session: &Session,
        secret: &str,
    ) -> std::result::Result<bool, ConnectorError> {
        session
            .authenticate(secret)
            .await
            .map_err(|e| ConnectorError::Authenticate(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use butlerd_application::NoTrafficLogger;
    use serde_json::Value;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let connector = TcpConnector::new(SessionOptions::default(), Arc::new(NoTrafficLogger));
        let result = connector
            .connect(Endpoint::new(Ipv4Addr::LOCALHOST, port))
            .await;
        assert!(matches!(result, Err(ConnectorError::Connect { .. })));
    }

    #[tokio::test]
    async fn configure_failure_is_reported_before_connecting() {
        let connector = TcpConnector::new(SessionOptions::default(), Arc::new(NoTrafficLogger))
            .with_configure(|builder| {
                builder
                    .on_notification("Log", |_: Value| {})?
                    .on_notification("Log", |_: Value| {})
            });
        let result = connector
            .connect(Endpoint::new(Ipv4Addr::LOCALHOST, 1))
            .await;
        match result {
            Err(ConnectorError::Connect { reason, .. }) => assert!(reason.contains("duplicate")),
            _ => panic!("expected configure failure"),
        }
    }
}
