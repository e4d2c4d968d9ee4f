use serde_json::{json, Value};

use super::{ensure_object_args, extract_non_empty_string, DomainEvent, ServiceDescriptor, ServiceId};
use crate::{envelope::RequestEnvelope, errors::WsJsonError, patch::NormalizedEvent};

const DEFAULT_SEARCH_LIMIT: u64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub description: Option<String>,
    pub info: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSearchResult {
    pub instruments: Vec<Instrument>,
}

pub struct InstrumentSearchService;

impl ServiceDescriptor for InstrumentSearchService {
    fn service(&self) -> ServiceId {
        ServiceId::InstrumentSearch
    }

    fn build_request(&self, id: &str, args: &Value) -> Result<RequestEnvelope, WsJsonError> {
        ensure_object_args(self.service(), args)?;

        let pattern =
            extract_non_empty_string(args, "pattern").ok_or_else(|| WsJsonError::InvalidArgs {
                service: self.service().as_str(),
                message: "`pattern` cannot be empty".to_string(),
            })?;
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_SEARCH_LIMIT);

        Ok(RequestEnvelope::new(
            self.service().as_str(),
            id,
            json!({"pattern": pattern, "limit": limit}),
        ))
    }

    fn parse(&self, event: &NormalizedEvent) -> Option<DomainEvent> {
        let rows = event.body.get("instruments")?.as_array()?;

        let instruments = rows
            .iter()
            .filter_map(|row| {
                let symbol = row.get("symbol").and_then(Value::as_str)?;
                Some(Instrument {
                    symbol: symbol.to_string(),
                    description: row
                        .get("description")
                        .and_then(Value::as_str)
                        .map(ToString::to_string),
                    info: row.clone(),
                })
            })
            .collect();

        Some(DomainEvent::InstrumentSearch(InstrumentSearchResult {
            instruments,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{CorrelationKey, FrameKind};

    #[test]
    fn builds_request_and_parses_instruments() {
        let request = InstrumentSearchService
            .build_request("search-1", &json!({"pattern": " AAP ", "limit": 0}))
            .expect("request should build");
        assert_eq!(request.params, json!({"pattern": "AAP", "limit": 5}));

        let event = NormalizedEvent {
            key: CorrelationKey::new("instrument_search", "search-1", 0),
            kind: FrameKind::Snapshot,
            body: json!({"instruments": [
                {"symbol": "AAPL", "description": "Apple Inc"},
                {"description": "no symbol"}
            ]}),
        };
        let Some(DomainEvent::InstrumentSearch(result)) = InstrumentSearchService.parse(&event)
        else {
            panic!("expected search result");
        };
        assert_eq!(result.instruments.len(), 1);
        assert_eq!(result.instruments[0].symbol, "AAPL");
        assert_eq!(result.instruments[0].description.as_deref(), Some("Apple Inc"));
    }
}
