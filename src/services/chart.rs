use serde_json::{json, Value};

use super::{
    ensure_object_args, extract_non_empty_string, parse_f64_lossy, DomainEvent,
    ServiceDescriptor, ServiceId,
};
use crate::{envelope::RequestEnvelope, errors::WsJsonError, patch::NormalizedEvent};

const DEFAULT_TIME_AGGREGATION: &str = "DAY";
const DEFAULT_RANGE: &str = "YEAR2";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub timestamp: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub symbol: String,
    pub candles: Vec<Candle>,
}

pub struct ChartService;

impl ServiceDescriptor for ChartService {
    fn service(&self) -> ServiceId {
        ServiceId::Chart
    }

    fn build_request(&self, id: &str, args: &Value) -> Result<RequestEnvelope, WsJsonError> {
        ensure_object_args(self.service(), args)?;

        let symbol =
            extract_non_empty_string(args, "symbol").ok_or_else(|| WsJsonError::InvalidArgs {
                service: self.service().as_str(),
                message: "`symbol` cannot be empty".to_string(),
            })?;
        let time_aggregation = extract_non_empty_string(args, "timeAggregation")
            .unwrap_or_else(|| DEFAULT_TIME_AGGREGATION.to_string())
            .to_ascii_uppercase();
        let range = extract_non_empty_string(args, "range")
            .unwrap_or_else(|| DEFAULT_RANGE.to_string())
            .to_ascii_uppercase();
        let include_extended_hours = args
            .get("includeExtendedHours")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        Ok(RequestEnvelope::new(
            self.service().as_str(),
            id,
            json!({
                "symbol": symbol,
                "timeAggregation": time_aggregation,
                "range": range,
                "includeExtendedHours": include_extended_hours,
            }),
        ))
    }

    fn parse(&self, event: &NormalizedEvent) -> Option<DomainEvent> {
        let body = &event.body;
        let symbol = body.get("symbol").and_then(Value::as_str)?.to_string();
        let timestamps = body.get("timestamps")?.as_array()?;

        let column = |name: &str| -> Vec<Option<f64>> {
            body.get(name)
                .and_then(Value::as_array)
                .map(|values| values.iter().map(parse_f64_lossy).collect())
                .unwrap_or_default()
        };
        let open = column("open");
        let high = column("high");
        let low = column("low");
        let close = column("close");
        let volume = column("volume");

        let candles = timestamps
            .iter()
            .enumerate()
            .filter_map(|(index, timestamp)| {
                Some(Candle {
                    timestamp: timestamp.as_u64()?,
                    open: (*open.get(index)?)?,
                    high: (*high.get(index)?)?,
                    low: (*low.get(index)?)?,
                    close: (*close.get(index)?)?,
                    volume: volume.get(index).copied().flatten().unwrap_or(0.0),
                })
            })
            .collect();

        Some(DomainEvent::Chart(ChartSeries { symbol, candles }))
    }
}
