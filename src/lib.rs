pub mod config;
pub mod envelope;
pub mod errors;
pub mod fabric;
pub mod patch;
pub mod services;
pub mod session;
pub mod transport;

pub use config::SessionConfig;
pub use envelope::{CorrelationKey, FrameKind};
pub use errors::{TransportError, WsJsonError};
pub use fabric::{Event, EventFilter, Subscription};
pub use patch::PatchPolicy;
pub use services::{DomainEvent, ServiceDescriptor, ServiceId, ServiceRegistry};
pub use session::{Credentials, Session, SessionState};
pub use transport::{Connector, Transport, TungsteniteConnector};
