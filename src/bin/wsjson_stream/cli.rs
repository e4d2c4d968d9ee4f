use wsjson_client::Credentials;

use crate::constants::*;

const USAGE: &str = r#"Usage:
  cargo run --bin wsjson_stream -- <mode> [options]

Modes:
  quotes       Stream live quote updates for one or more symbols
  chart        Stream the candle series for one symbol
  search       Run one instrument search and print the matches

Authentication (exactly one is required):
  --token <token>          Access token for the `login` service
  --refresh-token <token>  Refresh token sent alongside --token
  --auth-code <code>       OAuth authorization code for the `login/schwab` service

Common options:
  --url <url>              WsJson endpoint override (default: WSJSON_URL or the public endpoint)
  --duration-secs <secs>   Stop after this duration
  --iterations <count>     Stop after this many updates

Mode-specific options:
  quotes:
    --symbol <symbol>      Symbol to watch; repeat for more (default: AAPL)

  chart:
    --symbol <symbol>      Chart symbol (default: AAPL)
    --range <range>        Chart range, e.g. DAY5 or YEAR2 (default: YEAR2)
    --aggregation <agg>    Candle aggregation, e.g. MIN5 or DAY (default: DAY)

  search:
    --pattern <text>       Search pattern (required)
    --limit <count>        Maximum matches (default: 5)

Examples:
  cargo run --bin wsjson_stream -- quotes --token "$TOKEN" --symbol AAPL --symbol MSFT
  cargo run --bin wsjson_stream -- chart --auth-code "$CODE" --symbol SPY --range DAY5
  cargo run --bin wsjson_stream -- search --token "$TOKEN" --pattern APP
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Quotes,
    Chart,
    Search,
}

impl Mode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Quotes => "quotes",
            Self::Chart => "chart",
            Self::Search => "search",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) mode: Mode,
    pub(crate) url: Option<String>,
    pub(crate) credentials: Credentials,
    pub(crate) symbols: Vec<String>,
    pub(crate) chart_range: String,
    pub(crate) chart_aggregation: String,
    pub(crate) pattern: Option<String>,
    pub(crate) search_limit: u64,
    pub(crate) duration_secs: Option<u64>,
    pub(crate) iterations: Option<u64>,
}

impl Config {
    pub(crate) fn primary_symbol(&self) -> &str {
        self.symbols
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_SYMBOL)
    }
}

#[derive(Debug)]
pub(crate) enum ParseResult {
    Help,
    Run(Config),
}

pub(crate) fn print_usage() {
    println!("{USAGE}");
}

pub(crate) fn parse_args(args: &[String]) -> Result<ParseResult, String> {
    if args.is_empty() || args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(ParseResult::Help);
    }

    let mode = parse_mode(&args[0])?;

    let mut url = None;
    let mut token = None;
    let mut refresh_token = None;
    let mut auth_code = None;
    let mut symbols = Vec::new();
    let mut chart_range = DEFAULT_CHART_RANGE.to_string();
    let mut chart_aggregation = DEFAULT_CHART_AGGREGATION.to_string();
    let mut pattern = None;
    let mut search_limit = DEFAULT_SEARCH_LIMIT;
    let mut duration_secs = None;
    let mut iterations = None;

    let mut index = 1usize;
    while index < args.len() {
        let flag = &args[index];
        let value = |i: &mut usize| -> Result<String, String> {
            let next = *i + 1;
            if next >= args.len() {
                return Err(format!("missing value for `{flag}`"));
            }
            *i = next;
            Ok(args[*i].clone())
        };

        match flag.as_str() {
            "--url" => url = Some(non_empty("--url", value(&mut index)?)?),
            "--token" => token = Some(non_empty("--token", value(&mut index)?)?),
            "--refresh-token" => {
                refresh_token = Some(non_empty("--refresh-token", value(&mut index)?)?);
            }
            "--auth-code" => auth_code = Some(non_empty("--auth-code", value(&mut index)?)?),
            "--symbol" => {
                symbols.push(non_empty("--symbol", value(&mut index)?)?.to_ascii_uppercase());
            }
            "--range" => chart_range = non_empty("--range", value(&mut index)?)?,
            "--aggregation" => {
                chart_aggregation = non_empty("--aggregation", value(&mut index)?)?;
            }
            "--pattern" => pattern = Some(non_empty("--pattern", value(&mut index)?)?),
            "--limit" => search_limit = parse_u64_gt_zero("--limit", &value(&mut index)?)?,
            "--duration-secs" => {
                duration_secs = Some(parse_u64_gt_zero("--duration-secs", &value(&mut index)?)?);
            }
            "--iterations" => {
                iterations = Some(parse_u64_gt_zero("--iterations", &value(&mut index)?)?);
            }
            _ => {
                return Err(format!("unknown argument `{flag}`"));
            }
        }

        index += 1;
    }

    let credentials = match (token, auth_code) {
        (Some(token), None) => Credentials::access_token(token, refresh_token),
        (None, Some(code)) => {
            if refresh_token.is_some() {
                return Err("`--refresh-token` requires `--token`".to_string());
            }
            Credentials::auth_code(code)
        }
        (Some(_), Some(_)) => {
            return Err("`--token` and `--auth-code` are mutually exclusive".to_string());
        }
        (None, None) => return Err("one of `--token` or `--auth-code` is required".to_string()),
    };

    if mode == Mode::Search && pattern.is_none() {
        return Err("`search` requires `--pattern`".to_string());
    }
    if mode != Mode::Quotes && symbols.len() > 1 {
        return Err(format!(
            "`{}` accepts a single `--symbol`",
            mode.as_str()
        ));
    }
    if symbols.is_empty() {
        symbols.push(DEFAULT_SYMBOL.to_string());
    }

    Ok(ParseResult::Run(Config {
        mode,
        url,
        credentials,
        symbols,
        chart_range,
        chart_aggregation,
        pattern,
        search_limit,
        duration_secs,
        iterations,
    }))
}

fn parse_mode(value: &str) -> Result<Mode, String> {
    match value {
        "quotes" => Ok(Mode::Quotes),
        "chart" => Ok(Mode::Chart),
        "search" => Ok(Mode::Search),
        _ => Err(format!(
            "invalid mode `{value}` (expected `quotes`, `chart`, or `search`)"
        )),
    }
}

fn non_empty(field: &str, value: String) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("`{field}` cannot be empty"));
    }
    Ok(trimmed.to_string())
}

fn parse_u64_gt_zero(field: &str, value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|_| format!("`{field}` expects a positive integer"))?;
    if parsed == 0 {
        return Err(format!("`{field}` must be greater than 0"));
    }
    Ok(parsed)
}
