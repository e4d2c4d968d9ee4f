pub(crate) const DEFAULT_SYMBOL: &str = "AAPL";
pub(crate) const DEFAULT_CHART_RANGE: &str = "YEAR2";
pub(crate) const DEFAULT_CHART_AGGREGATION: &str = "DAY";
pub(crate) const DEFAULT_SEARCH_LIMIT: u64 = 5;
pub(crate) const STOP_CHECK_INTERVAL_MS: u64 = 50;
pub(crate) const MAX_CHART_ROWS: usize = 5;
