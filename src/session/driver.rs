use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use super::{credentials::Credentials, handshake, SessionState};
use crate::{
    config::SessionConfig,
    envelope::{
        encode_connection_frame, encode_requests, parse_inbound_frame, ConnectionAck,
        CorrelationKey, Envelope, InboundFrame,
    },
    errors::{TransportError, WsJsonError},
    fabric::{Event, EventBus},
    patch::PatchEngine,
    services::{ServiceId, ServiceRegistry},
    transport::Transport,
};

pub(crate) type HandshakeResult = Result<Value, WsJsonError>;

#[derive(Debug)]
pub(crate) enum DriverCommand {
    Send(String),
    Release(CorrelationKey),
}

enum Flow {
    Continue,
    Stop,
}

/// Owns one live transport and processes its frames strictly in arrival order.
pub(crate) struct Driver {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) engine: PatchEngine,
    pub(crate) registry: Arc<ServiceRegistry>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) state: Arc<watch::Sender<SessionState>>,
    pub(crate) config: SessionConfig,
    pub(crate) credentials: Credentials,
    pub(crate) handshake: Option<oneshot::Sender<HandshakeResult>>,
    pub(crate) login_sent: bool,
    pub(crate) commands: mpsc::UnboundedReceiver<DriverCommand>,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl Driver {
    pub(crate) async fn run(mut self) {
        if let Err(err) = self.transport.send(encode_connection_frame()).await {
            tracing::warn!(error = %err, "failed to send connection parameters");
            self.on_transport_lost(err.into());
            self.finish().await;
            return;
        }

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        self.transport.close().await;
                        break;
                    }
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        self.transport.close().await;
                        break;
                    };
                    if let Flow::Stop = self.on_command(command).await {
                        break;
                    }
                }
                frame = self.transport.recv() => {
                    match frame {
                        Some(Ok(text)) => {
                            if let Flow::Stop = self.on_frame(&text).await {
                                break;
                            }
                        }
                        Some(Err(err)) => {
                            tracing::warn!(error = %err, "wsjson websocket error");
                            self.on_transport_lost(err.into());
                            break;
                        }
                        None => {
                            tracing::info!("wsjson websocket closed by peer");
                            self.on_transport_lost(TransportError::Closed.into());
                            break;
                        }
                    }
                }
            }
        }

        self.finish().await;
    }

    async fn finish(&mut self) {
        self.engine.reset();
        self.bus.close().await;
    }

    async fn on_command(&mut self, command: DriverCommand) -> Flow {
        match command {
            DriverCommand::Send(frame) => {
                if let Err(err) = self.transport.send(frame).await {
                    tracing::warn!(error = %err, "failed to send wsjson request");
                    self.on_transport_lost(err.into());
                    return Flow::Stop;
                }
            }
            DriverCommand::Release(key) => {
                if self.engine.release(&key).is_some() {
                    tracing::debug!(key = %key, "released reconstructed document");
                }
            }
        }
        Flow::Continue
    }

    async fn on_frame(&mut self, text: &str) -> Flow {
        let frame = match parse_inbound_frame(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "dropping undecodable wsjson frame");
                return Flow::Continue;
            }
        };

        match frame {
            InboundFrame::ConnectionAck(ack) => self.on_connection_ack(ack).await,
            InboundFrame::Heartbeat(timestamp) => {
                tracing::trace!(?timestamp, "wsjson heartbeat");
                Flow::Continue
            }
            InboundFrame::Payload(envelopes) => {
                for envelope in envelopes {
                    if let Flow::Stop = self.on_envelope(envelope).await {
                        return Flow::Stop;
                    }
                }
                Flow::Continue
            }
            InboundFrame::Unrecognized(value) => {
                tracing::debug!(frame = %value, "dropping unrecognized wsjson frame");
                Flow::Continue
            }
        }
    }

    async fn on_connection_ack(&mut self, ack: ConnectionAck) -> Flow {
        if self.handshake.is_none() || self.login_sent {
            tracing::debug!(session = ?ack.session, "ignoring repeated connection acknowledgement");
            return Flow::Continue;
        }

        tracing::info!(
            session = ?ack.session,
            build = ?ack.build,
            login_service = %self.credentials.login_service(),
            "connection acknowledged; sending login"
        );

        let request = handshake::login_request(&self.credentials, &self.config);
        let frame = match encode_requests(std::slice::from_ref(&request)) {
            Ok(frame) => frame,
            Err(err) => return self.fail_handshake(err.into()).await,
        };

        if let Err(err) = self.transport.send(frame).await {
            self.on_transport_lost(err.into());
            return Flow::Stop;
        }
        self.login_sent = true;
        Flow::Continue
    }

    async fn on_envelope(&mut self, envelope: Envelope) -> Flow {
        let service = ServiceId::from_wire(&envelope.header.service);
        if service.is_some_and(ServiceId::is_control) {
            return self.on_login_response(envelope).await;
        }

        if *self.state.borrow() != SessionState::Connected {
            tracing::debug!(
                service = %envelope.header.service,
                "dropping service frame received before login completed"
            );
            return Flow::Continue;
        }

        self.dispatch(envelope).await;
        Flow::Continue
    }

    async fn on_login_response(&mut self, envelope: Envelope) -> Flow {
        let Some(handshake) = self.handshake.take() else {
            tracing::debug!(
                service = %envelope.header.service,
                "ignoring login frame outside of a handshake"
            );
            return Flow::Continue;
        };

        match handshake::login_outcome(&envelope.body) {
            Ok(()) => {
                self.state.send_replace(SessionState::Connected);
                tracing::info!(service = %envelope.header.service, "wsjson session authenticated");
                let _ = handshake.send(Ok(envelope.body));
                Flow::Continue
            }
            Err(reason) => {
                self.handshake = Some(handshake);
                self.fail_handshake(WsJsonError::AuthenticationRejected(reason))
                    .await
            }
        }
    }

    async fn dispatch(&mut self, envelope: Envelope) {
        let Some(descriptor) = self.registry.resolve(&envelope.header.service) else {
            tracing::debug!(
                service = %envelope.header.service,
                id = %envelope.header.id,
                "dropping frame for unknown service"
            );
            return;
        };

        for normalized in self.engine.apply_incoming(envelope) {
            let parsed = descriptor.parse(&normalized);
            let event = Event {
                key: normalized.key,
                kind: normalized.kind,
                body: normalized.body,
                parsed,
            };
            let delivered = self.bus.push(Arc::new(event)).await;
            tracing::trace!(delivered, "published wsjson event");
        }
    }

    async fn fail_handshake(&mut self, error: WsJsonError) -> Flow {
        tracing::warn!(error = %error, "wsjson handshake failed");
        self.state.send_replace(SessionState::Error);
        self.transport.close().await;
        if let Some(handshake) = self.handshake.take() {
            let _ = handshake.send(Err(error));
        }
        Flow::Stop
    }

    fn on_transport_lost(&mut self, error: WsJsonError) {
        match self.handshake.take() {
            Some(handshake) => {
                self.state.send_replace(SessionState::Error);
                let _ = handshake.send(Err(error));
            }
            None => {
                self.state.send_replace(SessionState::Disconnected);
            }
        }
    }
}
