use serde_json::Value;

use super::{DomainEvent, ServiceId};
use crate::{envelope::RequestEnvelope, errors::WsJsonError, patch::NormalizedEvent};

pub trait ServiceDescriptor: Send + Sync {
    fn service(&self) -> ServiceId;

    /// Fixed request id for services whose responses do not echo the caller's id.
    fn request_id(&self, _args: &Value) -> Option<String> {
        None
    }

    fn build_request(&self, id: &str, args: &Value) -> Result<RequestEnvelope, WsJsonError>;

    fn parse(&self, _event: &NormalizedEvent) -> Option<DomainEvent> {
        None
    }
}
