//! Socket session management.
//!
//! Provides [`SessionBuilder`] for registering handlers before a connection
//! exists, and [`Session`] for issuing requests and notifications over an
//! open connection. Each session owns one background reader task.

use super::error::{ButlerError, Result};
use super::router::Router;
use super::transport::{LineReader, LineWriter};
use butlerd_application::{
    NoTrafficLogger, NotificationRegistry, RequestRegistry, SessionOptions, TrafficLogger,
};
use butlerd_domain::protocol::meta::{AuthenticateParams, AuthenticateResult, META_AUTHENTICATE};
use butlerd_domain::{Endpoint, RequestId, SessionState, encode_notification, encode_request};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::any::type_name;
use std::fmt::Display;
use std::future::{Future, pending};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Collects handler registrations and options, then opens a [`Session`].
pub struct SessionBuilder {
    notifications: NotificationRegistry,
    requests: RequestRegistry,
    options: SessionOptions,
    traffic: Arc<dyn TrafficLogger>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            notifications: NotificationRegistry::default(),
            requests: RequestRegistry::new(),
            options: SessionOptions::default(),
            traffic: Arc::new(NoTrafficLogger),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_traffic_logger(mut self, traffic: Arc<dyn TrafficLogger>) -> Self {
        self.traffic = traffic;
        self
    }

    /// Register a handler for an inbound notification.
    ///
    /// Fails if `method` already has a handler.
    pub fn on_notification<T, F>(self, method: &str, callback: F) -> Result<Self>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.notifications.register(method, callback)?;
        Ok(self)
    }

    /// Register a handler for an inbound request.
    ///
    /// The handler's `Ok` value becomes the reply's `result`; an `Err`, or a
    /// value that is not a JSON object, is answered with a `-32000` error
    /// response.
    pub fn on_request<T, R, E, F, Fut>(self, method: &str, callback: F) -> Result<Self>
    where
        T: DeserializeOwned + 'static,
        R: Serialize + 'static,
        E: Display + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    {
        self.requests.register(method, callback)?;
        Ok(self)
    }

    /// Connect over TCP and start the reader.
    pub async fn connect(self, endpoint: Endpoint) -> Result<Session> {
        info!(%endpoint, "Connecting to butlerd socket");
        let stream = TcpStream::connect(endpoint.socket_addr()).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }
        let (read_half, write_half) = stream.into_split();
        Ok(self.open(read_half, write_half))
    }

    /// Connect and present `secret`, failing if the daemon refuses it.
    pub async fn connect_authenticated(self, endpoint: Endpoint, secret: &str) -> Result<Session> {
        let session = self.connect(endpoint).await?;
        if session.authenticate(secret).await? {
            Ok(session)
        } else {
            session.close().await;
            Err(ButlerError::AuthenticationFailed)
        }
    }

    /// Start a session over an already-open byte stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open<R, W>(self, reader: R, writer: W) -> Session
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let lines = LineReader::new(reader, self.options.max_line_bytes);
        let router = Arc::new(Router::new(
            LineWriter::new(writer),
            self.notifications,
            self.requests,
            self.options,
            self.traffic,
        ));
        let reader = tokio::spawn(Arc::clone(&router).reader_loop(lines));
        Session { router, reader }
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An open JSON-RPC session with butlerd.
pub struct Session {
    router: Arc<Router>,
    reader: JoinHandle<()>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn state(&self) -> SessionState {
        self.router.state()
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Resolves once the session is closed by either side.
    pub async fn closed(&self) {
        let mut state = self.router.subscribe_state();
        let _ = state.wait_for(|s| s.is_closed()).await;
    }

    /// Number of requests still awaiting a response (including abandoned ones).
    pub fn pending_requests(&self) -> usize {
        self.router.pending.len()
    }

    /// Send a notification with `params`.
    ///
    /// Params that serialize to `null` are left out of the message.
    pub async fn send_notification<P: Serialize>(&self, method: &str, params: &P) -> Result<()> {
        let params = serde_json::to_value(params)?;
        let params = match params {
            Value::Null => None,
            Value::Object(_) => Some(params),
            _ => {
                return Err(ButlerError::ParamsNotObject {
                    method: method.to_string(),
                });
            }
        };
        let line = encode_notification(method, params.as_ref())?;
        self.router.send_line(&line).await
    }

    /// Send a notification without a `params` member.
    pub async fn send_bare_notification(&self, method: &str) -> Result<()> {
        let line = encode_notification(method, None)?;
        self.router.send_line(&line).await
    }

    /// Send a request and wait for its decoded result.
    pub async fn request<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        self.call(method, params, None, self.router.options.request_timeout)
            .await
    }

    /// Send a request with an empty `params` object.
    pub async fn request_without_params<R: DeserializeOwned>(&self, method: &str) -> Result<R> {
        self.call(method, Value::Null, None, self.router.options.request_timeout)
            .await
    }

    /// Send a long-lived request that ignores the configured deadline.
    ///
    /// Only `cancel` abandons the call.
    pub async fn request_until_cancelled<P, R>(
        &self,
        method: &str,
        params: &P,
        cancel: &CancellationToken,
    ) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        self.call(method, params, Some(cancel), None).await
    }

    /// Like [`request`](Self::request), abandoning the call when `cancel` fires.
    pub async fn request_with_cancellation<P, R>(
        &self,
        method: &str,
        params: &P,
        cancel: &CancellationToken,
    ) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        self.call(method, params, Some(cancel), self.router.options.request_timeout)
            .await
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        cancel: Option<&CancellationToken>,
        timeout: Option<Duration>,
    ) -> Result<R> {
        let params = match params {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => params,
            _ => {
                return Err(ButlerError::ParamsNotObject {
                    method: method.to_string(),
                });
            }
        };

        // Registered before writing so a fast reply always finds its slot.
        let call = self.router.pending.register();
        let id = call.id();
        let line = match encode_request(method, &params, &RequestId::Number(id)) {
            Ok(line) => line,
            Err(e) => {
                self.router.pending.discard(id);
                return Err(e.into());
            }
        };
        if let Err(e) = self.router.send_line(&line).await {
            self.router.pending.discard(id);
            return Err(e);
        }
        debug!(%method, id, "Request sent");

        let outcome = tokio::select! {
            biased;
            _ = cancelled(cancel) => {
                self.router.pending.neutralize(id);
                debug!(%method, id, "Request cancelled");
                return Err(ButlerError::Cancelled);
            }
            limit = deadline(timeout) => {
                self.router.pending.neutralize(id);
                warn!(%method, id, "Request timed out after {:?}", limit);
                return Err(ButlerError::Timeout(limit));
            }
            outcome = call.outcome() => outcome,
        };

        match outcome {
            None => Err(ButlerError::SessionClosed),
            Some(Ok(result)) => {
                serde_json::from_str(result.get()).map_err(|source| ButlerError::Decode {
                    type_name: type_name::<R>(),
                    source,
                })
            }
            Some(Err(error)) => Err(ButlerError::Rpc(error.into())),
        }
    }

    /// Perform the `Meta.Authenticate` handshake.
    ///
    /// Returns whether the daemon accepted `secret`.
    pub async fn authenticate(&self, secret: &str) -> Result<bool> {
        let params = AuthenticateParams {
            secret: secret.to_string(),
        };
        let result: AuthenticateResult = self.request(META_AUTHENTICATE, &params).await?;
        if result.ok {
            self.router.mark_authenticated();
            debug!("Socket session authenticated");
        } else {
            warn!("Daemon rejected the authentication secret");
        }
        Ok(result.ok)
    }

    /// Close the connection and stop the reader.
    ///
    /// Requests still waiting are not resolved.
    pub async fn close(&self) {
        self.router.mark_closed();
        self.router.shutdown_writer().await;
        self.reader.abort();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.router.mark_closed();
        self.reader.abort();
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => pending().await,
    }
}

async fn deadline(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(limit) => {
            tokio::time::sleep(limit).await;
            limit
        }
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use butlerd_domain::ErrorCode;
    use butlerd_domain::protocol::meta::SocketLogNotification;
    use serde::Deserialize;
    use serde_json::json;
    use std::net::Ipv4Addr;
    use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf, duplex, split};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// The daemon side of an in-memory session.
    struct Peer {
        lines: LineReader<ReadHalf<DuplexStream>>,
        writer: LineWriter,
    }

    impl Peer {
        async fn recv(&mut self) -> Value {
            let line = self.lines.next_line().await.expect("peer stream ended");
            serde_json::from_str(&line).unwrap()
        }

        async fn recv_raw(&mut self) -> String {
            self.lines.next_line().await.expect("peer stream ended")
        }

        async fn send(&self, message: Value) {
            self.writer.write_line(&message.to_string()).await.unwrap();
        }

        async fn send_raw(&self, line: &str) {
            self.writer.write_line(line).await.unwrap();
        }
    }

    fn pair(builder: SessionBuilder) -> (Session, Peer) {
        let (client, server) = duplex(64 * 1024);
        let (client_read, client_write) = split(client);
        let session = builder.open(client_read, client_write);
        let (server_read, server_write): (_, WriteHalf<DuplexStream>) = split(server);
        let peer = Peer {
            lines: LineReader::new(server_read, 1 << 20),
            writer: LineWriter::new(server_write),
        };
        (session, peer)
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Version {
        version: String,
    }

    #[tokio::test]
    async fn request_without_params_sends_empty_object_and_decodes_result() {
        let (session, mut peer) = pair(SessionBuilder::new());

        let daemon = async {
            let request = peer.recv().await;
            assert_eq!(request["jsonrpc"], "2.0");
            assert_eq!(request["method"], "Version.Get");
            assert_eq!(request["params"], json!({}));
            assert_eq!(request["id"], 1);
            peer.send(json!({"jsonrpc": "2.0", "id": 1, "result": {"version": "v15.0.0"}}))
                .await;
        };

        let (result, ()) = tokio::join!(session.request_without_params::<Version>("Version.Get"), daemon);
        assert_eq!(result.unwrap().version, "v15.0.0");
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn concurrent_requests_resolve_out_of_order() {
        let (session, mut peer) = pair(SessionBuilder::new());

        let daemon = async {
            let mut requests = Vec::new();
            for _ in 0..3 {
                requests.push(peer.recv().await);
            }
            for request in requests.iter().rev() {
                peer.send(json!({
                    "jsonrpc": "2.0",
                    "id": request["id"],
                    "result": {"echo": request["params"]["n"]}
                }))
                .await;
            }
        };

        let (one, two, three) = (json!({"n": 1}), json!({"n": 2}), json!({"n": 3}));
        let (a, b, c, ()) = tokio::join!(
            session.request::<_, Value>("Echo", &one),
            session.request::<_, Value>("Echo", &two),
            session.request::<_, Value>("Echo", &three),
            daemon
        );
        assert_eq!(a.unwrap(), json!({"echo": 1}));
        assert_eq!(b.unwrap(), json!({"echo": 2}));
        assert_eq!(c.unwrap(), json!({"echo": 3}));
    }

    #[tokio::test]
    async fn error_response_carries_typed_kind() {
        let (session, mut peer) = pair(SessionBuilder::new());

        let daemon = async {
            let request = peer.recv().await;
            peer.send(json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": {"code": 404, "message": "not installed"}
            }))
            .await;
        };

        let (result, ()) = tokio::join!(session.request_without_params::<Value>("Install.Launch"), daemon);
        let err = result.unwrap_err();
        assert_eq!(err.rpc_kind(), Some(ErrorCode::InstallFolderMissing));
        match err {
            ButlerError::Rpc(fault) => {
                assert_eq!(fault.code, 404);
                assert_eq!(fault.message, "not installed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unknown_error_code_has_no_kind() {
        let (session, mut peer) = pair(SessionBuilder::new());

        let daemon = async {
            let request = peer.recv().await;
            peer.send(json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": {"code": 7, "message": "odd"}
            }))
            .await;
        };

        let (result, ()) = tokio::join!(session.request_without_params::<Value>("X"), daemon);
        let err = result.unwrap_err();
        assert!(matches!(&err, ButlerError::Rpc(fault) if fault.code == 7));
        assert_eq!(err.rpc_kind(), None);
    }

    #[tokio::test]
    async fn cancelled_request_ignores_late_response() {
        let (session, mut peer) = pair(SessionBuilder::new());
        let token = CancellationToken::new();

        let daemon = async {
            let request = peer.recv().await;
            token.cancel();
            tokio::task::yield_now().await;
            peer.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": {}}))
                .await;
        };
        let params = json!({});
        let (result, ()) = tokio::join!(
            session.request_with_cancellation::<_, Value>("Slow", &params, &token),
            daemon
        );
        assert!(matches!(result, Err(ButlerError::Cancelled)));

        let daemon = async {
            let request = peer.recv().await;
            assert_eq!(request["id"], 2);
            peer.send(json!({"jsonrpc": "2.0", "id": 2, "result": {"ok": true}}))
                .await;
        };
        let (result, ()) = tokio::join!(session.request_without_params::<Value>("Next"), daemon);
        assert_eq!(result.unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn request_times_out_with_configured_deadline() {
        let options = SessionOptions::default().with_request_timeout(Some(Duration::from_millis(50)));
        let (session, mut peer) = pair(SessionBuilder::new().with_options(options));

        let daemon = async {
            peer.recv().await;
        };
        let (result, ()) = tokio::join!(session.request_without_params::<Value>("Never"), daemon);
        assert!(matches!(result, Err(ButlerError::Timeout(d)) if d == Duration::from_millis(50)));
        assert_eq!(session.pending_requests(), 1);
    }

    #[tokio::test]
    async fn long_lived_request_ignores_configured_deadline() {
        let options = SessionOptions::default().with_request_timeout(Some(Duration::from_millis(20)));
        let (session, mut peer) = pair(SessionBuilder::new().with_options(options));
        let token = CancellationToken::new();

        let daemon = async {
            let request = peer.recv().await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            peer.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": {"done": true}}))
                .await;
        };
        let params = Value::Null;
        let (result, ()) = tokio::join!(
            session.request_until_cancelled::<_, Value>("Meta.Flow", &params, &token),
            daemon
        );
        assert_eq!(result.unwrap(), json!({"done": true}));
    }

    #[tokio::test]
    async fn non_object_params_are_rejected_before_sending() {
        let (session, _peer) = pair(SessionBuilder::new());

        let result = session.request::<_, Value>("Echo", &json!([1, 2])).await;
        assert!(matches!(result, Err(ButlerError::ParamsNotObject { method }) if method == "Echo"));
        let result = session.send_notification("Echo", &5).await;
        assert!(matches!(result, Err(ButlerError::ParamsNotObject { .. })));
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn null_notification_params_are_omitted() {
        let (session, mut peer) = pair(SessionBuilder::new());

        session.send_notification("Foo", &Option::<Value>::None).await.unwrap();
        session.send_notification("Bar", &()).await.unwrap();

        assert_eq!(peer.recv_raw().await, r#"{"jsonrpc":"2.0","method":"Foo"}"#);
        assert_eq!(peer.recv_raw().await, r#"{"jsonrpc":"2.0","method":"Bar"}"#);
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_close_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let builder = SessionBuilder::new()
            .on_notification("Log", move |log: SocketLogNotification| {
                let _ = tx.send(log.message);
            })
            .unwrap();
        let (client, mut server) = duplex(64 * 1024);
        let (client_read, client_write) = split(client);
        let session = builder.open(client_read, client_write);

        server
            .write_all(b"{\"method\":\"X\",\"params\":{\"a\":\"\xff\xfe\"}}\n")
            .await
            .unwrap();
        server
            .write_all(
                b"{\"jsonrpc\":\"2.0\",\"method\":\"Log\",\"params\":{\"level\":\"info\",\"message\":\"still here\"}}\n",
            )
            .await
            .unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("still here"));
        assert_eq!(session.state(), SessionState::Connected);

        let (server_read, server_write) = split(server);
        let mut peer = Peer {
            lines: LineReader::new(server_read, 1 << 20),
            writer: LineWriter::new(server_write),
        };
        let daemon = async {
            let request = peer.recv().await;
            peer.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": {"ok": true}}))
                .await;
        };
        let (result, ()) = tokio::join!(session.request_without_params::<Value>("Next"), daemon);
        assert_eq!(result.unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn notifications_reach_registered_handler() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let builder = SessionBuilder::new()
            .on_notification("Log", move |log: SocketLogNotification| {
                let _ = tx.send(log.message);
            })
            .unwrap();
        let (_session, peer) = pair(builder);

        peer.send_raw("not json at all").await;
        peer.send(json!({"jsonrpc": "2.0", "method": "Unhandled", "params": {}}))
            .await;
        peer.send(json!({
            "jsonrpc": "2.0",
            "method": "Log",
            "params": {"level": "info", "message": "hello"}
        }))
        .await;

        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[derive(Debug, Deserialize)]
    struct PickParams {
        choices: Vec<String>,
    }

    #[tokio::test]
    async fn inbound_request_is_answered_with_handler_result() {
        let builder = SessionBuilder::new()
            .on_request("Pick", |params: PickParams| async move {
                Ok::<_, String>(json!({"index": params.choices.len() - 1}))
            })
            .unwrap();
        let (_session, mut peer) = pair(builder);

        peer.send(json!({
            "jsonrpc": "2.0",
            "method": "Pick",
            "id": 7,
            "params": {"choices": ["a", "b", "c"]}
        }))
        .await;

        assert_eq!(
            peer.recv_raw().await,
            r#"{"jsonrpc":"2.0","result":{"index":2},"id":7}"#
        );
    }

    #[tokio::test]
    async fn failing_handler_produces_exactly_one_error_reply() {
        let builder = SessionBuilder::new()
            .on_request("Fail", |_: Value| async move { Err::<Value, _>("boom") })
            .unwrap()
            .on_request("Ping", |_: Value| async move { Ok::<_, String>(json!({"pong": true})) })
            .unwrap();
        let (_session, mut peer) = pair(builder);

        peer.send(json!({"jsonrpc": "2.0", "method": "Fail", "id": "a", "params": {}}))
            .await;
        let reply = peer.recv().await;
        assert_eq!(reply["id"], "a");
        assert_eq!(reply["error"]["code"], -32000);
        assert_eq!(reply["error"]["message"], ErrorCode::FailedToProcessRequest.message());

        peer.send(json!({"jsonrpc": "2.0", "method": "Ping", "id": "b"}))
            .await;
        let reply = peer.recv().await;
        assert_eq!(reply["id"], "b");
        assert_eq!(reply["result"], json!({"pong": true}));
    }

    #[tokio::test]
    async fn scalar_handler_result_is_answered_with_an_error() {
        let builder = SessionBuilder::new()
            .on_request("Count", |_: Value| async move { Ok::<_, String>(5) })
            .unwrap();
        let (_session, mut peer) = pair(builder);

        peer.send(json!({"jsonrpc": "2.0", "method": "Count", "id": 1, "params": {}}))
            .await;
        let reply = peer.recv().await;
        assert_eq!(reply["id"], 1);
        assert!(reply.get("result").is_none());
        assert_eq!(reply["error"]["code"], -32000);
    }

    #[tokio::test]
    async fn unregistered_request_gets_no_reply_by_default() {
        let builder = SessionBuilder::new()
            .on_request("Ping", |_: Value| async move { Ok::<_, String>(json!({})) })
            .unwrap();
        let (_session, mut peer) = pair(builder);

        peer.send(json!({"jsonrpc": "2.0", "method": "Nobody.Home", "id": 1}))
            .await;
        peer.send(json!({"jsonrpc": "2.0", "method": "Ping", "id": 2}))
            .await;

        assert_eq!(peer.recv().await["id"], 2);
    }

    #[tokio::test]
    async fn unregistered_request_can_be_answered_with_method_not_found() {
        let options = SessionOptions::default().with_reply_method_not_found(true);
        let (_session, mut peer) = pair(SessionBuilder::new().with_options(options));

        peer.send(json!({"jsonrpc": "2.0", "method": "Nobody.Home", "id": 1}))
            .await;

        let reply = peer.recv().await;
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn undecodable_request_params_get_invalid_params() {
        let builder = SessionBuilder::new()
            .on_request("Pick", |_: PickParams| async move { Ok::<_, String>(json!({})) })
            .unwrap();
        let (_session, mut peer) = pair(builder);

        peer.send(json!({"jsonrpc": "2.0", "method": "Pick", "id": 3, "params": {"choices": 5}}))
            .await;

        let reply = peer.recv().await;
        assert_eq!(reply["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn stray_responses_and_garbage_do_not_stop_the_reader() {
        let (session, mut peer) = pair(SessionBuilder::new());

        let daemon = async {
            let request = peer.recv().await;
            peer.send(json!({"jsonrpc": "2.0", "id": 999, "result": {}})).await;
            peer.send(json!({"jsonrpc": "2.0", "id": "1", "result": {}})).await;
            peer.send_raw("[1, 2, 3]").await;
            peer.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": {"ok": 1}}))
                .await;
        };

        let (result, ()) = tokio::join!(session.request_without_params::<Value>("Any"), daemon);
        assert_eq!(result.unwrap(), json!({"ok": 1}));
    }

    #[tokio::test]
    async fn notifications_are_encoded_with_and_without_params() {
        let (session, mut peer) = pair(SessionBuilder::new());

        session
            .send_notification("Cancel", &json!({"id": "abc"}))
            .await
            .unwrap();
        session.send_bare_notification("Ping").await.unwrap();

        assert_eq!(
            peer.recv_raw().await,
            r#"{"jsonrpc":"2.0","method":"Cancel","params":{"id":"abc"}}"#
        );
        assert_eq!(peer.recv_raw().await, r#"{"jsonrpc":"2.0","method":"Ping"}"#);
    }

    #[tokio::test]
    async fn authenticate_marks_session_authenticated() {
        let (session, mut peer) = pair(SessionBuilder::new());

        let daemon = async {
            let request = peer.recv().await;
            assert_eq!(request["method"], "Meta.Authenticate");
            assert_eq!(request["params"], json!({"secret": "hunter2"}));
            peer.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": {"ok": true}}))
                .await;
        };

        let (accepted, ()) = tokio::join!(session.authenticate("hunter2"), daemon);
        assert!(accepted.unwrap());
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn rejected_authentication_keeps_session_connected() {
        let (session, mut peer) = pair(SessionBuilder::new());

        let daemon = async {
            let request = peer.recv().await;
            peer.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": {"ok": false}}))
                .await;
        };

        let (accepted, ()) = tokio::join!(session.authenticate("wrong"), daemon);
        assert!(!accepted.unwrap());
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn peer_close_closes_session() {
        let (session, peer) = pair(SessionBuilder::new());
        drop(peer);

        session.closed().await;
        assert!(session.is_closed());
        assert!(matches!(
            session.send_bare_notification("Ping").await,
            Err(ButlerError::SessionClosed)
        ));
    }

    #[test]
    fn duplicate_handler_registration_fails() {
        let result = SessionBuilder::new()
            .on_notification("Log", |_: Value| {})
            .and_then(|b| b.on_notification("Log", |_: Value| {}));
        assert!(matches!(result, Err(ButlerError::Registry(_))));
    }

    #[tokio::test]
    async fn connects_and_authenticates_over_loopback_tcp() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let daemon = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, write_half) = stream.into_split();
            let mut lines = LineReader::new(read_half, 1 << 20);
            let writer = LineWriter::new(write_half);

            let request: Value = serde_json::from_str(&lines.next_line().await.unwrap()).unwrap();
            let ok = request["params"]["secret"] == "s3cr3t";
            let reply = json!({"jsonrpc": "2.0", "id": request["id"], "result": {"ok": ok}});
            writer.write_line(&reply.to_string()).await.unwrap();
            lines.next_line().await
        });

        let session = SessionBuilder::new()
            .connect_authenticated(Endpoint::new(Ipv4Addr::LOCALHOST, port), "s3cr3t")
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);

        session.close().await;
        assert_eq!(daemon.await.unwrap(), None);
    }

    #[tokio::test]
    async fn wrong_secret_over_tcp_is_authentication_failure() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, write_half) = stream.into_split();
            let mut lines = LineReader::new(read_half, 1 << 20);
            let writer = LineWriter::new(write_half);
            let request: Value = serde_json::from_str(&lines.next_line().await.unwrap()).unwrap();
            let reply = json!({"jsonrpc": "2.0", "id": request["id"], "result": {"ok": false}});
            writer.write_line(&reply.to_string()).await.unwrap();
            let _ = lines.next_line().await;
        });

        let result = SessionBuilder::new()
            .connect_authenticated(Endpoint::new(Ipv4Addr::LOCALHOST, port), "nope")
            .await;
        assert!(matches!(result, Err(ButlerError::AuthenticationFailed)));
    }
}
