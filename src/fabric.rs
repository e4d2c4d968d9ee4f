use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures_util::Stream;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use crate::{
    envelope::{CorrelationKey, FrameKind, Header},
    errors::WsJsonError,
    services::DomainEvent,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub key: CorrelationKey,
    pub kind: FrameKind,
    pub body: Value,
    pub parsed: Option<DomainEvent>,
}

impl Event {
    pub fn service(&self) -> &str {
        &self.key.service
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub service: String,
    pub id: Option<String>,
}

impl EventFilter {
    pub fn service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn for_request(header: &Header) -> Self {
        Self::service(header.service.as_str()).with_id(header.id.as_str())
    }

    pub fn matches(&self, key: &CorrelationKey) -> bool {
        self.service == key.service && self.id.as_ref().is_none_or(|id| *id == key.id)
    }
}

struct Subscriber {
    filter: EventFilter,
    sender: mpsc::UnboundedSender<Arc<Event>>,
}

#[derive(Default)]
struct BusState {
    subscribers: Vec<Subscriber>,
    closed: bool,
}

/// Fans one ordered event feed out to independent per-subscriber queues.
#[derive(Default)]
pub struct EventBus {
    state: Mutex<BusState>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, filter: EventFilter) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        if !state.closed {
            state.subscribers.push(Subscriber {
                filter: filter.clone(),
                sender,
            });
        }
        Subscription { filter, receiver }
    }

    pub async fn push(&self, event: Arc<Event>) -> usize {
        let mut state = self.state.lock().await;
        if state.closed {
            return 0;
        }

        state
            .subscribers
            .retain(|subscriber| !subscriber.sender.is_closed());

        let mut delivered = 0usize;
        for subscriber in &state.subscribers {
            if subscriber.filter.matches(&event.key)
                && subscriber.sender.send(event.clone()).is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.subscribers.clear();
    }

    pub async fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock().await;
        state
            .subscribers
            .retain(|subscriber| !subscriber.sender.is_closed());
        state.subscribers.len()
    }
}

/// Pull-based cursor over the events matching one [`EventFilter`].
///
/// Ends with `None` once the owning session disconnects.
pub struct Subscription {
    filter: EventFilter,
    receiver: mpsc::UnboundedReceiver<Arc<Event>>,
}

impl Subscription {
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    pub async fn next(&mut self) -> Option<Arc<Event>> {
        self.receiver.recv().await
    }

    pub async fn first(mut self) -> Result<Arc<Event>, WsJsonError> {
        self.receiver.recv().await.ok_or(WsJsonError::SessionClosed)
    }
}

impl Stream for Subscription {
    type Item = Arc<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
