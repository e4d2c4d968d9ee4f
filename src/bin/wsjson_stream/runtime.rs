use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tokio::time::MissedTickBehavior;
use wsjson_client::{ServiceId, Session, Subscription};

use crate::{
    cli::Config,
    constants::STOP_CHECK_INTERVAL_MS,
    control::StopCondition,
    view::event_lines,
};

pub(crate) async fn run_quotes_stream(session: &Session, config: &Config) -> anyhow::Result<()> {
    let subscription = session
        .subscribe(ServiceId::Quotes, json!({ "symbols": config.symbols }))
        .await
        .context("failed to subscribe to quotes")?;
    print_until_stopped(subscription, config).await
}

pub(crate) async fn run_chart_stream(session: &Session, config: &Config) -> anyhow::Result<()> {
    let subscription = session
        .subscribe(
            ServiceId::Chart,
            json!({
                "symbol": config.primary_symbol(),
                "range": config.chart_range,
                "timeAggregation": config.chart_aggregation,
            }),
        )
        .await
        .with_context(|| format!("failed to subscribe to chart {}", config.primary_symbol()))?;
    print_until_stopped(subscription, config).await
}

pub(crate) async fn run_search(session: &Session, config: &Config) -> anyhow::Result<()> {
    let args = json!({
        "pattern": config.pattern,
        "limit": config.search_limit,
    });

    let event = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("stopped: received Ctrl+C");
            return Ok(());
        }
        event = session.call(ServiceId::InstrumentSearch, args) => {
            event.context("instrument search failed")?
        }
    };

    for line in event_lines(&event) {
        println!("{line}");
    }
    Ok(())
}

async fn print_until_stopped(mut subscription: Subscription, config: &Config) -> anyhow::Result<()> {
    let stop = StopCondition::from_config(config);
    let mut updates = 0u64;

    let mut stop_check = tokio::time::interval(Duration::from_millis(STOP_CHECK_INTERVAL_MS));
    stop_check.set_missed_tick_behavior(MissedTickBehavior::Skip);
    stop_check.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("stopped: received Ctrl+C");
                return Ok(());
            }
            _ = stop_check.tick() => {
                if stop.reached(updates) {
                    println!("stopped: reached configured stop condition");
                    return Ok(());
                }
            }
            event = subscription.next() => {
                let Some(event) = event else {
                    println!("stopped: session closed");
                    return Ok(());
                };

                for line in event_lines(&event) {
                    println!("{line}");
                }

                updates += 1;
                if stop.reached(updates) {
                    println!("stopped: reached configured stop condition");
                    return Ok(());
                }
            }
        }
    }
}
