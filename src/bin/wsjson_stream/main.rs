use std::env;

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};
use wsjson_client::{Session, SessionConfig};

mod cli;
mod constants;
mod control;
mod runtime;
mod view;

#[cfg(test)]
mod tests;

use cli::print_usage;

pub(crate) use cli::{parse_args, Config, Mode, ParseResult};
#[cfg(test)]
pub(crate) use view::{build_chart_lines, event_lines, format_quote_line, iso8601_millis};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let parse_result = match parse_args(&args) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("error: {err}\n");
            print_usage();
            std::process::exit(2);
        }
    };

    match parse_result {
        ParseResult::Help => {
            print_usage();
            Ok(())
        }
        ParseResult::Run(config) => {
            init_tracing();
            run_stream(config).await
        }
    }
}

fn init_tracing() {
    let directives = env::var(EnvFilter::DEFAULT_ENV).ok();
    fmt()
        .with_env_filter(env_filter(directives.as_deref()))
        .with_writer(std::io::stderr)
        .init();
}

pub(crate) fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

async fn run_stream(config: Config) -> anyhow::Result<()> {
    let mut session_config =
        SessionConfig::from_env().context("failed to load session configuration")?;
    if let Some(url) = config.url.as_deref() {
        session_config = session_config.with_url(url);
    }

    println!(
        "mode={} url={} login={} symbols={}",
        config.mode.as_str(),
        session_config.url,
        config.credentials.login_service(),
        config.symbols.join(",")
    );
    if let Some(duration_secs) = config.duration_secs {
        println!("will stop after {duration_secs}s");
    }
    if let Some(iterations) = config.iterations {
        println!("will stop after {iterations} updates");
    }
    println!("press Ctrl+C to stop\n");

    let session = Session::new(session_config);
    session
        .authenticate(config.credentials.clone())
        .await
        .context("wsjson authentication failed")?;

    let outcome = match config.mode {
        Mode::Quotes => runtime::run_quotes_stream(&session, &config).await,
        Mode::Chart => runtime::run_chart_stream(&session, &config).await,
        Mode::Search => runtime::run_search(&session, &config).await,
    };

    session.disconnect().await;
    outcome
}
