use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot, watch, Mutex},
    task::JoinHandle,
    time::timeout,
};

mod credentials;
mod driver;
mod handshake;


pub use credentials::Credentials;

use driver::{Driver, DriverCommand};

use crate::{
    config::SessionConfig,
    envelope::{encode_requests, CorrelationKey},
    errors::WsJsonError,
    fabric::{Event, EventBus, EventFilter, Subscription},
    patch::PatchEngine,
    services::{ServiceId, ServiceRegistry},
    transport::{Connector, TungsteniteConnector},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to one multiplexed WsJson connection. Clones share the connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<ServiceRegistry>,
    state: Arc<watch::Sender<SessionState>>,
    link: Mutex<Option<Link>>,
    next_request_id: AtomicU64,
}

struct Link {
    commands: mpsc::UnboundedSender<DriverCommand>,
    bus: Arc<EventBus>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Link {
    async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "wsjson driver task ended abnormally");
        }
        self.bus.close().await;
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(TungsteniteConnector),
            ServiceRegistry::with_default_catalog(),
        )
    }

    pub fn with_parts(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        registry: ServiceRegistry,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            inner: Arc::new(SessionInner {
                config,
                connector,
                registry: Arc::new(registry),
                state: Arc::new(state),
                link: Mutex::new(None),
                next_request_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.state() == SessionState::Connecting
    }

    pub async fn authenticate_with_token(
        &self,
        token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Result<Value, WsJsonError> {
        self.authenticate(Credentials::access_token(token, refresh_token))
            .await
    }

    pub async fn authenticate_with_auth_code(
        &self,
        code: impl Into<String>,
    ) -> Result<Value, WsJsonError> {
        self.authenticate(Credentials::auth_code(code)).await
    }

    /// Runs the connect/login handshake and resolves with the login body.
    pub async fn authenticate(&self, credentials: Credentials) -> Result<Value, WsJsonError> {
        credentials.validate()?;

        let handshake_receiver = {
            // Handshake state transitions and teardown both run under this lock.
            let mut link = self.inner.link.lock().await;
            self.begin_handshake()?;
            if let Some(stale) = link.take() {
                stale.shutdown().await;
            }

            let transport = match self.inner.connector.connect(&self.inner.config.url).await {
                Ok(transport) => transport,
                Err(err) => {
                    tracing::warn!(url = %self.inner.config.url, error = %err, "wsjson connect failed");
                    self.inner.state.send_replace(SessionState::Error);
                    return Err(err.into());
                }
            };

            let (handshake_sender, handshake_receiver) = oneshot::channel();
            let (commands, command_receiver) = mpsc::unbounded_channel();
            let (shutdown, shutdown_receiver) = watch::channel(false);
            let bus = Arc::new(EventBus::new());

            let driver = Driver {
                transport,
                engine: PatchEngine::new(self.inner.config.patch_policy),
                registry: self.inner.registry.clone(),
                bus: bus.clone(),
                state: self.inner.state.clone(),
                config: self.inner.config.clone(),
                credentials,
                handshake: Some(handshake_sender),
                login_sent: false,
                commands: command_receiver,
                shutdown: shutdown_receiver,
            };
            let task = tokio::spawn(driver.run());

            *link = Some(Link {
                commands,
                bus,
                shutdown,
                task,
            });
            handshake_receiver
        };

        let outcome = match self.inner.config.handshake_timeout {
            Some(limit) => match timeout(limit, handshake_receiver).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(?limit, "wsjson handshake timed out");
                    self.teardown(SessionState::Error).await;
                    return Err(WsJsonError::HandshakeTimeout(limit));
                }
            },
            None => handshake_receiver.await,
        };

        match outcome {
            Ok(result) => result,
            Err(_) => Err(WsJsonError::SessionClosed),
        }
    }

    pub async fn disconnect(&self) {
        self.teardown(SessionState::Disconnected).await;
    }

    pub fn ensure_connected(&self) -> Result<(), WsJsonError> {
        match self.state() {
            SessionState::Connected => Ok(()),
            other => Err(WsJsonError::NotConnected(other)),
        }
    }

    /// Sends one request and resolves with the first event echoed for it.
    pub async fn call(&self, service: ServiceId, args: Value) -> Result<Arc<Event>, WsJsonError> {
        let subscription = self.open(service, args).await?;

        match self.inner.config.call_timeout {
            Some(limit) => timeout(limit, subscription.first())
                .await
                .map_err(|_| WsJsonError::CallTimeout {
                    service: service.as_str().to_string(),
                    limit,
                })?,
            None => subscription.first().await,
        }
    }

    pub async fn subscribe(
        &self,
        service: ServiceId,
        args: Value,
    ) -> Result<Subscription, WsJsonError> {
        self.open(service, args).await
    }

    /// Drops the reconstructed document for `key`; the server is not notified.
    pub async fn release(&self, key: CorrelationKey) -> Result<(), WsJsonError> {
        self.ensure_connected()?;
        let link = self.inner.link.lock().await;
        let link = link
            .as_ref()
            .ok_or_else(|| WsJsonError::NotConnected(self.state()))?;
        link.commands
            .send(DriverCommand::Release(key))
            .map_err(|_| WsJsonError::SessionClosed)
    }

    async fn open(&self, service: ServiceId, args: Value) -> Result<Subscription, WsJsonError> {
        self.ensure_connected()?;

        let descriptor = self
            .inner
            .registry
            .get(service)
            .ok_or_else(|| WsJsonError::UnknownService(service.as_str().to_string()))?;
        let id = descriptor
            .request_id(&args)
            .unwrap_or_else(|| self.allocate_request_id(service));
        let request = descriptor.build_request(&id, &args)?;
        let frame = encode_requests(std::slice::from_ref(&request))?;

        let link = self.inner.link.lock().await;
        let link = link
            .as_ref()
            .ok_or_else(|| WsJsonError::NotConnected(self.state()))?;

        // Subscribe before the request reaches the wire.
        let subscription = link.bus.subscribe(EventFilter::for_request(&request.header)).await;
        link.commands
            .send(DriverCommand::Send(frame))
            .map_err(|_| WsJsonError::SessionClosed)?;

        tracing::debug!(service = %service, id = %id, "sent wsjson request");
        Ok(subscription)
    }

    fn allocate_request_id(&self, service: ServiceId) -> String {
        let sequence = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        format!("{}-{sequence}", service.as_str())
    }

    fn begin_handshake(&self) -> Result<(), WsJsonError> {
        let mut rejection = None;
        self.inner.state.send_if_modified(|state| match *state {
            SessionState::Connecting => {
                rejection = Some(WsJsonError::AlreadyConnecting);
                false
            }
            SessionState::Connected => {
                rejection = Some(WsJsonError::AlreadyConnected);
                false
            }
            SessionState::Disconnected | SessionState::Error => {
                *state = SessionState::Connecting;
                true
            }
        });
        rejection.map_or(Ok(()), Err)
    }

    async fn teardown(&self, final_state: SessionState) {
        let mut link = self.inner.link.lock().await;
        if let Some(link) = link.take() {
            link.shutdown().await;
            tracing::info!(state = %final_state, "wsjson session closed");
        }
        self.inner.state.send_replace(final_state);
    }
}
