use chrono::{SecondsFormat, Utc};
use wsjson_client::{
    services::{Candle, ChartSeries, Instrument, QuoteItem},
    DomainEvent, Event,
};

use crate::constants::MAX_CHART_ROWS;

const QUOTE_FIELDS: &[(&str, &str)] = &[
    ("LAST", "last"),
    ("BID", "bid"),
    ("ASK", "ask"),
    ("MARK", "mark"),
    ("NET_CHANGE", "chg"),
    ("VOLUME", "volume"),
];

pub(crate) fn event_lines(event: &Event) -> Vec<String> {
    match &event.parsed {
        Some(DomainEvent::Quotes(update)) => update.items.iter().map(format_quote_line).collect(),
        Some(DomainEvent::Chart(series)) => build_chart_lines(series),
        Some(DomainEvent::InstrumentSearch(result)) => {
            if result.instruments.is_empty() {
                return vec!["no instruments matched".to_string()];
            }
            result
                .instruments
                .iter()
                .map(format_instrument_line)
                .collect()
        }
        Some(DomainEvent::Raw(_)) | None => vec![format_raw_line(event)],
    }
}

pub(crate) fn format_quote_line(item: &QuoteItem) -> String {
    let mut line = format!("{:<8}", item.symbol);
    for (field, label) in QUOTE_FIELDS {
        line.push_str(&format!(" {label}={:<12}", format_f64(item.value_f64(field))));
    }
    line.trim_end().to_string()
}

pub(crate) fn build_chart_lines(series: &ChartSeries) -> Vec<String> {
    let mut lines = vec![format!(
        "{} candles={} window={}..{}",
        series.symbol,
        series.candles.len(),
        series
            .candles
            .first()
            .and_then(|candle| iso8601_millis(candle.timestamp))
            .unwrap_or_else(|| "unknown".to_string()),
        series
            .candles
            .last()
            .and_then(|candle| iso8601_millis(candle.timestamp))
            .unwrap_or_else(|| "unknown".to_string()),
    )];

    let skip = series.candles.len().saturating_sub(MAX_CHART_ROWS);
    lines.extend(series.candles.iter().skip(skip).map(format_candle_line));
    lines
}

pub(crate) fn format_candle_line(candle: &Candle) -> String {
    let time = iso8601_millis(candle.timestamp).unwrap_or_else(|| "unknown-time".to_string());
    format!(
        "  {} open={:<12} high={:<12} low={:<12} close={:<12} volume={}",
        time,
        format_price(candle.open),
        format_price(candle.high),
        format_price(candle.low),
        format_price(candle.close),
        candle.volume
    )
}

fn format_instrument_line(instrument: &Instrument) -> String {
    format!(
        "{:<10} {}",
        instrument.symbol,
        instrument.description.as_deref().unwrap_or("-")
    )
}

fn format_raw_line(event: &Event) -> String {
    format!("{} {} {}", event.key, event.kind.as_str(), event.body)
}

pub(crate) fn iso8601_millis(timestamp: u64) -> Option<String> {
    let millis = i64::try_from(timestamp).ok()?;
    chrono::DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|value| value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn format_price(value: f64) -> String {
    if value.abs() >= 10_000.0 {
        return format!("{value:.2}");
    }
    format!("{value:.4}")
}

fn format_f64(value: Option<f64>) -> String {
    value
        .map(format_price)
        .unwrap_or_else(|| "-".to_string())
}
