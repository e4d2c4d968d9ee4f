use std::fmt;

use serde_json::Value;

use crate::errors::WsJsonError;

pub mod chart;
pub mod quotes;
pub mod registry;
pub mod search;
pub mod traits;
pub mod user_properties;

pub use chart::{Candle, ChartSeries};
pub use quotes::{QuoteItem, QuotesUpdate};
pub use registry::ServiceRegistry;
pub use search::{Instrument, InstrumentSearchResult};
pub use traits::ServiceDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    Login,
    LoginSchwab,
    Quotes,
    Chart,
    InstrumentSearch,
    UserProperties,
}

impl ServiceId {
    pub const ALL: [ServiceId; 6] = [
        Self::Login,
        Self::LoginSchwab,
        Self::Quotes,
        Self::Chart,
        Self::InstrumentSearch,
        Self::UserProperties,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::LoginSchwab => "login/schwab",
            Self::Quotes => "quotes",
            Self::Chart => "chart",
            Self::InstrumentSearch => "instrument_search",
            Self::UserProperties => "user_properties",
        }
    }

    pub fn from_wire(service: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == service)
    }

    pub fn is_control(self) -> bool {
        matches!(self, Self::Login | Self::LoginSchwab)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Quotes(QuotesUpdate),
    Chart(ChartSeries),
    InstrumentSearch(InstrumentSearchResult),
    Raw(Value),
}

fn extract_non_empty_string(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn extract_string_list(params: &Value, key: &str) -> Option<Vec<String>> {
    let items = params.get(key)?.as_array()?;
    let values = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    (!values.is_empty()).then_some(values)
}

fn ensure_object_args(service: ServiceId, args: &Value) -> Result<(), WsJsonError> {
    if args.is_null() || args.is_object() {
        return Ok(());
    }
    Err(WsJsonError::InvalidArgs {
        service: service.as_str(),
        message: "`args` must be an object or null".to_string(),
    })
}

fn parse_f64_lossy(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}
