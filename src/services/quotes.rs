use serde_json::{json, Map, Value};

use super::{
    ensure_object_args, extract_non_empty_string, extract_string_list, DomainEvent,
    ServiceDescriptor, ServiceId,
};
use crate::{envelope::RequestEnvelope, errors::WsJsonError, patch::NormalizedEvent};

const QUOTES_REQUEST_ID: &str = "generic";
const DEFAULT_ACCOUNT: &str = "COMBINED ACCOUNT";
const DEFAULT_REFRESH_RATE_MS: u64 = 300;
const DEFAULT_FIELDS: &[&str] = &[
    "MARK",
    "MARK_CHANGE",
    "MARK_PERCENT_CHANGE",
    "NET_CHANGE",
    "NET_CHANGE_PERCENT",
    "BID",
    "ASK",
    "LAST",
    "VOLUME",
    "OPEN",
    "HIGH",
    "LOW",
];

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteItem {
    pub symbol: String,
    pub values: Map<String, Value>,
}

impl QuoteItem {
    pub fn value_f64(&self, field: &str) -> Option<f64> {
        self.values.get(field).and_then(super::parse_f64_lossy)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuotesUpdate {
    pub items: Vec<QuoteItem>,
}

impl QuotesUpdate {
    pub fn item(&self, symbol: &str) -> Option<&QuoteItem> {
        self.items.iter().find(|item| item.symbol == symbol)
    }
}

pub struct QuotesService;

impl ServiceDescriptor for QuotesService {
    fn service(&self) -> ServiceId {
        ServiceId::Quotes
    }

    // The server keeps one quotes document per session and echoes this id.
    fn request_id(&self, _args: &Value) -> Option<String> {
        Some(QUOTES_REQUEST_ID.to_string())
    }

    fn build_request(&self, id: &str, args: &Value) -> Result<RequestEnvelope, WsJsonError> {
        ensure_object_args(self.service(), args)?;

        let symbols = extract_string_list(args, "symbols").ok_or_else(|| {
            WsJsonError::InvalidArgs {
                service: self.service().as_str(),
                message: "`symbols` must be a non-empty list of strings".to_string(),
            }
        })?;
        let fields = extract_string_list(args, "fields").unwrap_or_else(|| {
            DEFAULT_FIELDS
                .iter()
                .map(|field| field.to_string())
                .collect()
        });
        let account = extract_non_empty_string(args, "account")
            .unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());
        let refresh_rate = args
            .get("refreshRate")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_REFRESH_RATE_MS);

        Ok(RequestEnvelope::new(
            self.service().as_str(),
            id,
            json!({
                "account": account,
                "symbols": symbols,
                "refreshRate": refresh_rate,
                "fields": fields,
            }),
        ))
    }

    fn parse(&self, event: &NormalizedEvent) -> Option<DomainEvent> {
        let rows = event.body.get("items")?.as_array()?;

        let items = rows
            .iter()
            .filter_map(|row| {
                let symbol = row.get("symbol").and_then(Value::as_str)?;
                let values = row
                    .get("values")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                Some(QuoteItem {
                    symbol: symbol.to_string(),
                    values,
                })
            })
            .collect();

        Some(DomainEvent::Quotes(QuotesUpdate { items }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{CorrelationKey, FrameKind};

    #[test]
    fn builds_request_with_default_fields() {
        let request = QuotesService
            .build_request("generic", &json!({"symbols": ["AAPL", " ", "MSFT"]}))
            .expect("request should build");

        assert_eq!(request.header.service, "quotes");
        assert_eq!(request.header.id, "generic");
        assert_eq!(request.params["symbols"], json!(["AAPL", "MSFT"]));
        assert_eq!(request.params["account"], json!("COMBINED ACCOUNT"));
        assert_eq!(request.params["refreshRate"], json!(300));
        assert!(request.params["fields"]
            .as_array()
            .is_some_and(|fields| fields.contains(&json!("LAST"))));
    }

    #[test]
    fn rejects_missing_symbols() {
        let err = QuotesService
            .build_request("generic", &json!({}))
            .expect_err("symbols are required");
        assert!(matches!(err, WsJsonError::InvalidArgs { service: "quotes", .. }));
    }

    #[test]
    fn parses_items_into_typed_quotes() {
        let event = NormalizedEvent {
            key: CorrelationKey::new("quotes", "generic", 0),
            kind: FrameKind::Patch,
            body: json!({"items": [
                {"symbol": "AAPL", "values": {"LAST": 151, "BID": "150.5"}},
                {"values": {"LAST": 1}}
            ]}),
        };

        let Some(DomainEvent::Quotes(update)) = QuotesService.parse(&event) else {
            panic!("expected quotes update");
        };
        assert_eq!(update.items.len(), 1);
        let aapl = update.item("AAPL").expect("AAPL should be present");
        assert_eq!(aapl.value_f64("LAST"), Some(151.0));
        assert_eq!(aapl.value_f64("BID"), Some(150.5));
    }
}
