use serde_json::{json, Value};

use super::{DomainEvent, ServiceDescriptor, ServiceId};
use crate::{envelope::RequestEnvelope, errors::WsJsonError, patch::NormalizedEvent};

pub struct UserPropertiesService;

impl ServiceDescriptor for UserPropertiesService {
    fn service(&self) -> ServiceId {
        ServiceId::UserProperties
    }

    fn build_request(&self, id: &str, _args: &Value) -> Result<RequestEnvelope, WsJsonError> {
        Ok(RequestEnvelope::new(self.service().as_str(), id, json!({})))
    }

    fn parse(&self, event: &NormalizedEvent) -> Option<DomainEvent> {
        Some(DomainEvent::Raw(event.body.clone()))
    }
}
