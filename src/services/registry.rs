use std::{collections::HashMap, sync::Arc};

use super::{
    chart::ChartService, quotes::QuotesService, search::InstrumentSearchService,
    traits::ServiceDescriptor, user_properties::UserPropertiesService, ServiceId,
};

#[derive(Default, Clone)]
pub struct ServiceRegistry {
    descriptors: HashMap<ServiceId, Arc<dyn ServiceDescriptor>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: HashMap::new(),
        }
    }

    pub fn with_default_catalog() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(QuotesService));
        registry.register(Arc::new(ChartService));
        registry.register(Arc::new(InstrumentSearchService));
        registry.register(Arc::new(UserPropertiesService));
        registry
    }

    pub fn register(&mut self, descriptor: Arc<dyn ServiceDescriptor>) {
        let service = descriptor.service();
        if service.is_control() {
            tracing::warn!(service = %service, "control services are handled by the session; ignoring descriptor");
            return;
        }
        self.descriptors.insert(service, descriptor);
    }

    pub fn resolve(&self, service: &str) -> Option<Arc<dyn ServiceDescriptor>> {
        ServiceId::from_wire(service).and_then(|service| self.get(service))
    }

    pub fn get(&self, service: ServiceId) -> Option<Arc<dyn ServiceDescriptor>> {
        self.descriptors.get(&service).cloned()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
