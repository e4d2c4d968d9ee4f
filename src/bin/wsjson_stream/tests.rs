use serde_json::{json, Map};
use tracing_subscriber::filter::LevelFilter;
use wsjson_client::{
    services::{Candle, ChartSeries, QuoteItem, QuotesUpdate},
    CorrelationKey, Credentials, DomainEvent, Event, FrameKind, ServiceId,
};

use super::{
    build_chart_lines, env_filter, event_lines, format_quote_line, iso8601_millis, parse_args,
    Config, Mode, ParseResult,
};

fn parse_run(args: &[&str]) -> Config {
    let args = args
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>();
    match parse_args(&args).expect("parse should succeed") {
        ParseResult::Run(config) => config,
        ParseResult::Help => panic!("expected ParseResult::Run"),
    }
}

fn parse_err(args: &[&str]) -> String {
    let args = args
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>();
    parse_args(&args).expect_err("parse should fail")
}

#[test]
fn parse_args_reads_quotes_flags() {
    let config = parse_run(&[
        "quotes",
        "--token",
        "tok",
        "--symbol",
        "aapl",
        "--symbol",
        "MSFT",
        "--iterations",
        "3",
    ]);

    assert_eq!(config.mode, Mode::Quotes);
    assert_eq!(config.symbols, vec!["AAPL".to_string(), "MSFT".to_string()]);
    assert_eq!(config.iterations, Some(3));
    assert_eq!(config.credentials, Credentials::access_token("tok", None));
    assert_eq!(config.credentials.login_service(), ServiceId::Login);
}

#[test]
fn parse_args_defaults_symbol_and_chart_window() {
    let config = parse_run(&["chart", "--auth-code", "code-1"]);

    assert_eq!(config.mode, Mode::Chart);
    assert_eq!(config.primary_symbol(), "AAPL");
    assert_eq!(config.chart_range, "YEAR2");
    assert_eq!(config.chart_aggregation, "DAY");
    assert_eq!(config.credentials.login_service(), ServiceId::LoginSchwab);
}

#[test]
fn parse_args_returns_help() {
    assert!(matches!(
        parse_args(&[]).expect("empty args should parse"),
        ParseResult::Help
    ));
    assert!(matches!(
        parse_args(&["quotes".to_string(), "--help".to_string()]).expect("help should parse"),
        ParseResult::Help
    ));
}

#[test]
fn parse_args_requires_exactly_one_credential() {
    assert!(parse_err(&["quotes"]).contains("is required"));
    assert!(parse_err(&["quotes", "--token", "a", "--auth-code", "b"]).contains("mutually exclusive"));
    assert!(parse_err(&["quotes", "--auth-code", "b", "--refresh-token", "r"]).contains("requires"));
    assert!(parse_err(&["quotes", "--token", "  "]).contains("cannot be empty"));
}

#[test]
fn parse_args_rejects_invalid_input() {
    assert!(parse_err(&["trades", "--token", "a"]).contains("invalid mode"));
    assert!(parse_err(&["search", "--token", "a"]).contains("--pattern"));
    assert!(parse_err(&["quotes", "--token", "a", "--iterations", "0"]).contains("greater than 0"));
    assert!(parse_err(&["quotes", "--token", "a", "--bogus"]).contains("unknown argument"));
    assert!(parse_err(&["quotes", "--token"]).contains("missing value"));
    assert!(
        parse_err(&["chart", "--token", "a", "--symbol", "A", "--symbol", "B"])
            .contains("single `--symbol`")
    );
}

#[test]
fn formats_quote_lines_with_missing_fields() {
    let mut values = Map::new();
    values.insert("LAST".to_string(), json!(151));
    values.insert("BID".to_string(), json!("150.5"));
    let item = QuoteItem {
        symbol: "AAPL".to_string(),
        values,
    };

    let line = format_quote_line(&item);
    assert!(line.starts_with("AAPL"));
    assert!(line.contains("last=151.0000"));
    assert!(line.contains("bid=150.5000"));
    assert!(line.contains("ask=-"));
}

#[test]
fn chart_lines_show_window_and_latest_candles() {
    let candles = (0..8)
        .map(|index| Candle {
            timestamp: 1_700_000_000_000 + index * 86_400_000,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10.0,
        })
        .collect::<Vec<_>>();
    let series = ChartSeries {
        symbol: "SPY".to_string(),
        candles,
    };

    let lines = build_chart_lines(&series);
    assert_eq!(lines.len(), 6);
    assert!(lines[0].starts_with("SPY candles=8 window=2023-11-14T22:13:20.000Z.."));
    assert!(lines[5].contains("close=1.5000"));
}

#[test]
fn raw_events_fall_back_to_key_and_body() {
    let event = Event {
        key: CorrelationKey::new("user_properties", "user_properties-1", 0),
        kind: FrameKind::Patch,
        body: json!({"theme": "dark"}),
        parsed: Some(DomainEvent::Raw(json!({"theme": "dark"}))),
    };

    assert_eq!(
        event_lines(&event),
        vec![r#"user_properties|user_properties-1|v0 patch {"theme":"dark"}"#.to_string()]
    );

    let quotes = Event {
        key: CorrelationKey::new("quotes", "generic", 0),
        kind: FrameKind::Snapshot,
        body: json!({}),
        parsed: Some(DomainEvent::Quotes(QuotesUpdate { items: Vec::new() })),
    };
    assert!(event_lines(&quotes).is_empty());
}

#[test]
fn iso8601_millis_formats_utc() {
    assert_eq!(
        iso8601_millis(1_700_000_000_123).as_deref(),
        Some("2023-11-14T22:13:20.123Z")
    );
    assert_eq!(iso8601_millis(u64::MAX), None);
}

#[test]
fn log_filter_defaults_to_info_and_honors_overrides() {
    assert_eq!(env_filter(None).max_level_hint(), Some(LevelFilter::INFO));
    assert_eq!(
        env_filter(Some("debug")).max_level_hint(),
        Some(LevelFilter::DEBUG)
    );
    assert_eq!(
        env_filter(Some("wsjson_client=trace")).max_level_hint(),
        Some(LevelFilter::TRACE)
    );
}
