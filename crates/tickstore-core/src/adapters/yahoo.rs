use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::Mutex;
use tracing::debug;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::domain::{CompanyProfile, CorporateActionKind, PeriodKind, StatementKind, Symbol};
use crate::error::FetchError;
use crate::frame::{Frame, Scalar, Series};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::provider::{MarketDataProvider, ProviderFuture};
use crate::retry::RetryPolicy;
use crate::source::ProviderId;
use crate::throttling::RequestPacer;

const REFERER: &str = "https://finance.yahoo.com/";

const SUMMARY_MODULES: &str = "upgradeDowngradeHistory,\
balanceSheetHistory,balanceSheetHistoryQuarterly,\
cashflowStatementHistory,cashflowStatementHistoryQuarterly,\
incomeStatementHistory,incomeStatementHistoryQuarterly,\
esgScores,calendarEvents";

#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub api_base: String,
    /// Visited once per session to obtain the cookie the crumb is bound to.
    pub session_url: String,
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub timeout_ms: u64,
    pub retry: RetryPolicy,
    pub breaker: CircuitBreakerConfig,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            api_base: String::from("https://query2.finance.yahoo.com"),
            session_url: String::from("https://fc.yahoo.com"),
            quota_window: Duration::from_secs(60),
            quota_limit: 30,
            timeout_ms: 10_000,
            retry: RetryPolicy::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Yahoo Finance provider backed by the chart and quoteSummary endpoints.
///
/// The chart payload serves the profile, price history and every
/// corporate-action series; the quoteSummary payload serves analyst,
/// statement, ESG and calendar datasets. Each is fetched once per symbol and
/// reused until a different symbol is requested.
pub struct YahooProvider {
    http: Arc<dyn HttpClient>,
    config: YahooConfig,
    pacer: RequestPacer,
    breaker: CircuitBreaker,
    crumb: Mutex<Option<String>>,
    chart: Mutex<Option<(Symbol, Arc<ChartPayload>)>>,
    summary: Mutex<Option<(Symbol, Arc<SummaryPayload>)>>,
}

impl YahooProvider {
    pub fn new(config: YahooConfig) -> Result<Self, FetchError> {
        let http = ReqwestHttpClient::new().map_err(|e| FetchError::internal(e.message()))?;
        Ok(Self::with_http_client(Arc::new(http), config))
    }

    pub fn with_http_client(http: Arc<dyn HttpClient>, config: YahooConfig) -> Self {
        Self {
            pacer: RequestPacer::new(config.quota_window, config.quota_limit),
            breaker: CircuitBreaker::new(config.breaker),
            http,
            config,
            crumb: Mutex::new(None),
            chart: Mutex::new(None),
            summary: Mutex::new(None),
        }
    }

    /// Sends one request, retrying transport errors and retryable statuses.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let policy = &self.config.retry;
        let mut attempt = 0;
        loop {
            if !self.breaker.allow_request() {
                let wait = self.breaker.cooldown_remaining().unwrap_or_default();
                return Err(FetchError::unavailable(format!(
                    "yahoo circuit open after repeated failures; next attempt in {}s",
                    wait.as_secs()
                )));
            }
            self.pacer.wait().await;

            let outcome = self.http.execute(request.clone()).await;
            let retryable = match &outcome {
                Ok(response) => policy.should_retry_status(response.status),
                Err(error) => error.retryable(),
            };
            if retryable && attempt < policy.max_retries {
                let delay = policy.delay_for_attempt(attempt);
                debug!(url = %request.url, attempt, ?delay, "retrying yahoo request");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return match outcome {
                Ok(response) => {
                    if response.status == 429 || response.status >= 500 {
                        self.breaker.record_failure();
                    } else {
                        self.breaker.record_success();
                    }
                    Ok(response)
                }
                Err(error) => {
                    self.breaker.record_failure();
                    Err(FetchError::unavailable(format!(
                        "yahoo transport error: {}",
                        error.message()
                    )))
                }
            };
        }
    }

    async fn crumb(&self, refresh: bool) -> Result<String, FetchError> {
        let mut cached = self.crumb.lock().await;
        if !refresh {
            if let Some(crumb) = cached.as_ref() {
                return Ok(crumb.clone());
            }
        }

        // Only the Set-Cookie matters here; the page itself is usually a 404.
        self.send(
            HttpRequest::get(&self.config.session_url)
                .with_header("referer", REFERER)
                .with_timeout_ms(self.config.timeout_ms),
        )
        .await?;

        let response = self
            .send(
                HttpRequest::get(format!("{}/v1/test/getcrumb", self.config.api_base))
                    .with_header("referer", REFERER)
                    .with_timeout_ms(self.config.timeout_ms),
            )
            .await?;
        let body = ensure_success(response, "crumb")?;
        let crumb = body.trim();
        if crumb.is_empty() || crumb.len() >= 100 || crumb.contains(char::is_whitespace) || crumb.contains('<') {
            return Err(FetchError::malformed("yahoo returned an unusable crumb"));
        }

        *cached = Some(crumb.to_owned());
        Ok(crumb.to_owned())
    }

    async fn chart(&self, symbol: &Symbol) -> Result<Arc<ChartPayload>, FetchError> {
        let mut cache = self.chart.lock().await;
        if let Some((cached_symbol, payload)) = cache.as_ref() {
            if cached_symbol == symbol {
                return Ok(Arc::clone(payload));
            }
        }

        let request = HttpRequest::get(format!(
            "{}/v8/finance/chart/{}",
            self.config.api_base,
            urlencoding::encode(symbol.as_str())
        ))
        .with_query("range", "max")
        .with_query("interval", "1d")
        .with_query("events", "div,splits,capitalGains")
        .with_header("referer", REFERER)
        .with_timeout_ms(self.config.timeout_ms);

        let response = self.send(request).await?;
        if response.status == 404 {
            return Err(FetchError::invalid_request(format!(
                "yahoo has no chart for '{symbol}'"
            )));
        }
        let body = ensure_success(response, "chart")?;
        let payload = Arc::new(ChartPayload::parse(&body)?);
        *cache = Some((symbol.clone(), Arc::clone(&payload)));
        Ok(payload)
    }

    async fn summary(&self, symbol: &Symbol) -> Result<Arc<SummaryPayload>, FetchError> {
        let mut cache = self.summary.lock().await;
        if let Some((cached_symbol, payload)) = cache.as_ref() {
            if cached_symbol == symbol {
                return Ok(Arc::clone(payload));
            }
        }

        let mut crumb = self.crumb(false).await?;
        let mut refreshed = false;
        let body = loop {
            let request = HttpRequest::get(format!(
                "{}/v10/finance/quoteSummary/{}",
                self.config.api_base,
                urlencoding::encode(symbol.as_str())
            ))
            .with_query("modules", SUMMARY_MODULES)
            .with_query("crumb", crumb.as_str())
            .with_header("referer", REFERER)
            .with_timeout_ms(self.config.timeout_ms);

            let response = self.send(request).await?;
            if matches!(response.status, 401 | 403) && !refreshed {
                debug!(%symbol, status = response.status, "yahoo rejected crumb; refreshing session");
                crumb = self.crumb(true).await?;
                refreshed = true;
                continue;
            }
            if response.status == 404 {
                return Err(FetchError::invalid_request(format!(
                    "yahoo has no summary for '{symbol}'"
                )));
            }
            break ensure_success(response, "quoteSummary")?;
        };

        let payload = Arc::new(SummaryPayload::parse(&body)?);
        *cache = Some((symbol.clone(), Arc::clone(&payload)));
        Ok(payload)
    }
}

impl MarketDataProvider for YahooProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn company_profile<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> ProviderFuture<'a, Option<CompanyProfile>> {
        Box::pin(async move { Ok(Some(self.chart(symbol).await?.profile.clone())) })
    }

    fn price_history<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<Frame>> {
        Box::pin(async move { Ok(self.chart(symbol).await?.prices.clone()) })
    }

    fn corporate_actions<'a>(
        &'a self,
        symbol: &'a Symbol,
        kind: CorporateActionKind,
    ) -> ProviderFuture<'a, Option<Series>> {
        Box::pin(async move { Ok(self.chart(symbol).await?.actions.get(&kind).cloned()) })
    }

    fn analyst_price_targets<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> ProviderFuture<'a, Option<Frame>> {
        Box::pin(async move { Ok(self.summary(symbol).await?.price_targets()) })
    }

    fn analyst_recommendations<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> ProviderFuture<'a, Option<Frame>> {
        Box::pin(async move { Ok(self.summary(symbol).await?.recommendations()) })
    }

    fn financial_statement<'a>(
        &'a self,
        symbol: &'a Symbol,
        kind: StatementKind,
        period: PeriodKind,
    ) -> ProviderFuture<'a, Option<Frame>> {
        Box::pin(async move { self.summary(symbol).await?.statement(kind, period) })
    }

    fn sustainability<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<Frame>> {
        Box::pin(async move { self.summary(symbol).await?.esg_scores() })
    }

    fn calendar<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<Frame>> {
        Box::pin(async move { Ok(self.summary(symbol).await?.calendar()) })
    }
}

fn ensure_success(response: HttpResponse, endpoint: &str) -> Result<String, FetchError> {
    match response.status {
        200..=299 => Ok(response.body),
        429 => Err(FetchError::rate_limited(format!(
            "yahoo {endpoint} rate limited the request"
        ))),
        status if status >= 500 => Err(FetchError::unavailable(format!(
            "yahoo {endpoint} returned status {status}"
        ))),
        status => Err(FetchError::invalid_request(format!(
            "yahoo {endpoint} returned status {status}"
        ))),
    }
}

// ============================================================================
// Chart endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ApiError {
    fn into_fetch_error(self, endpoint: &str) -> FetchError {
        let code = self.code.unwrap_or_default();
        let message = format!(
            "yahoo {endpoint} error {code}: {}",
            self.description.unwrap_or_default()
        );
        if code.eq_ignore_ascii_case("not found") {
            FetchError::invalid_request(message)
        } else {
            FetchError::unavailable(message)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: ChartIndicators,
    #[serde(default)]
    events: ChartEvents,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i32,
    #[serde(default, rename = "longName")]
    long_name: Option<String>,
    #[serde(default, rename = "shortName")]
    short_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: BTreeMap<String, CashEvent>,
    #[serde(default)]
    splits: BTreeMap<String, SplitEvent>,
    #[serde(default, rename = "capitalGains")]
    capital_gains: BTreeMap<String, CashEvent>,
}

#[derive(Debug, Deserialize)]
struct CashEvent {
    date: i64,
    #[serde(default)]
    amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SplitEvent {
    date: i64,
    #[serde(default)]
    numerator: Option<f64>,
    #[serde(default)]
    denominator: Option<f64>,
}

#[derive(Debug)]
struct ChartPayload {
    profile: CompanyProfile,
    prices: Option<Frame>,
    actions: BTreeMap<CorporateActionKind, Series>,
}

impl ChartPayload {
    fn parse(body: &str) -> Result<Self, FetchError> {
        let envelope: ChartEnvelope = serde_json::from_str(body)
            .map_err(|e| FetchError::malformed(format!("failed to parse yahoo chart: {e}")))?;
        if let Some(error) = envelope.chart.error {
            return Err(error.into_fetch_error("chart"));
        }
        let result = envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| FetchError::malformed("yahoo chart response has no result"))?;

        // Daily bars are stamped at the exchange's local midnight.
        let offset = UtcOffset::from_whole_seconds(result.meta.gmtoffset).unwrap_or(UtcOffset::UTC);
        let local = |seconds: i64| -> Scalar {
            OffsetDateTime::from_unix_timestamp(seconds)
                .ok()
                .and_then(|ts| ts.checked_to_offset(offset))
                .map_or(Scalar::Int(seconds), Scalar::Timestamp)
        };

        let prices = result.indicators.quote.first().and_then(|quote| {
            if result.timestamp.is_empty() {
                return None;
            }
            let column = |values: &[Option<f64>], i: usize| -> Scalar {
                values.get(i).copied().flatten().into()
            };
            let bars = result
                .timestamp
                .iter()
                .enumerate()
                .map(|(i, &seconds)| {
                    let cells = [
                        column(&quote.open, i),
                        column(&quote.high, i),
                        column(&quote.low, i),
                        column(&quote.close, i),
                        column(&quote.volume, i),
                    ];
                    (local(seconds), cells)
                })
                .collect();
            Some(Frame::from_rows(["Open", "High", "Low", "Close", "Volume"], bars))
        });

        let mut actions = BTreeMap::new();
        let mut dividends: Vec<_> = result.events.dividends.into_values().collect();
        dividends.sort_by_key(|event| event.date);
        let mut capital_gains: Vec<_> = result.events.capital_gains.into_values().collect();
        capital_gains.sort_by_key(|event| event.date);
        let mut splits: Vec<_> = result.events.splits.into_values().collect();
        splits.sort_by_key(|event| event.date);

        let cash_series = |events: Vec<CashEvent>| {
            let mut series = Series::default();
            for event in events {
                series.push(local(event.date), event.amount);
            }
            series
        };
        if !dividends.is_empty() {
            actions.insert(CorporateActionKind::Dividend, cash_series(dividends));
        }
        if !capital_gains.is_empty() {
            actions.insert(CorporateActionKind::CapitalGain, cash_series(capital_gains));
        }
        if !splits.is_empty() {
            let mut series = Series::default();
            for split in splits {
                let ratio = match (split.numerator, split.denominator) {
                    (Some(numerator), Some(denominator)) if denominator != 0.0 => {
                        Some(numerator / denominator)
                    }
                    _ => None,
                };
                series.push(local(split.date), ratio);
            }
            actions.insert(CorporateActionKind::Split, series);
        }

        Ok(Self {
            profile: CompanyProfile {
                name: result.meta.long_name.or(result.meta.short_name),
            },
            prices,
            actions,
        })
    }
}

// ============================================================================
// quoteSummary endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    #[serde(default)]
    result: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug)]
struct SummaryPayload {
    modules: Map<String, Value>,
}

impl SummaryPayload {
    fn parse(body: &str) -> Result<Self, FetchError> {
        let envelope: SummaryEnvelope = serde_json::from_str(body).map_err(|e| {
            FetchError::malformed(format!("failed to parse yahoo quoteSummary: {e}"))
        })?;
        if let Some(error) = envelope.quote_summary.error {
            return Err(error.into_fetch_error("quoteSummary"));
        }
        let modules = envelope
            .quote_summary
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| FetchError::malformed("yahoo quoteSummary response has no result"))?;
        Ok(Self { modules })
    }

    fn grade_history(&self) -> &[Value] {
        self.modules
            .get("upgradeDowngradeHistory")
            .and_then(|module| module.get("history"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn recommendations(&self) -> Option<Frame> {
        let history = self.grade_history();
        if history.is_empty() {
            return None;
        }
        let rows = history
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let field = |name: &str| entry.get(name).map_or(Scalar::Null, raw_scalar);
                let cells = [
                    field("epochGradeDate"),
                    field("firm"),
                    field("fromGrade"),
                    field("toGrade"),
                    field("action"),
                ];
                (Scalar::Int(i as i64), cells)
            })
            .collect();
        Some(Frame::from_rows(
            ["GradeDate", "Firm", "FromGrade", "ToGrade", "Action"],
            rows,
        ))
    }

    /// Firm-level targets are the grade-history rows that carry a target price.
    fn price_targets(&self) -> Option<Frame> {
        let mut rows = Vec::new();
        for (i, entry) in self.grade_history().iter().enumerate() {
            let field = |name: &str| entry.get(name).map_or(Scalar::Null, raw_scalar);
            let target = field("currentPriceTarget");
            let has_target = match &target {
                Scalar::Int(value) => *value > 0,
                Scalar::Float(value) => *value > 0.0,
                _ => false,
            };
            if !has_target {
                continue;
            }
            let cells = [field("epochGradeDate"), field("firm"), target, field("toGrade")];
            rows.push((Scalar::Int(i as i64), cells));
        }
        (!rows.is_empty()).then(|| Frame::from_rows(["Date", "Firm", "Target Price", "Rating"], rows))
    }

    /// Item-per-row matrix with one column per report, widened to every item any report carries.
    fn statement(&self, kind: StatementKind, period: PeriodKind) -> Result<Option<Frame>, FetchError> {
        let (module, list) = match kind {
            StatementKind::BalanceSheet => ("balanceSheetHistory", "balanceSheetStatements"),
            StatementKind::CashFlow => ("cashflowStatementHistory", "cashflowStatements"),
            StatementKind::Income => ("incomeStatementHistory", "incomeStatementHistory"),
        };
        let module = match period {
            PeriodKind::Annual => module.to_owned(),
            PeriodKind::Quarterly => format!("{module}Quarterly"),
        };
        let Some(reports) = self
            .modules
            .get(&module)
            .and_then(|value| value.get(list))
            .and_then(Value::as_array)
        else {
            return Ok(None);
        };
        let reports: Vec<&Map<String, Value>> =
            reports.iter().filter_map(Value::as_object).collect();
        if reports.is_empty() {
            return Ok(None);
        }

        let mut items: Vec<&str> = Vec::new();
        for report in &reports {
            for key in report.keys() {
                if key != "endDate" && key != "maxAge" && !items.contains(&key.as_str()) {
                    items.push(key);
                }
            }
        }

        let columns = reports
            .iter()
            .map(|report| report.get("endDate").map_or(Scalar::Null, date_label))
            .collect::<Vec<_>>();
        let mut frame = Frame::with_columns(columns);
        for item in items {
            let cells = reports
                .iter()
                .map(|report| report.get(item).map_or(Scalar::Null, raw_scalar))
                .collect();
            frame
                .push_row(item, cells)
                .map_err(|e| FetchError::malformed(format!("yahoo {module} table: {e}")))?;
        }
        Ok(Some(frame))
    }

    fn esg_scores(&self) -> Result<Option<Frame>, FetchError> {
        let Some(scores) = self.modules.get("esgScores").and_then(Value::as_object) else {
            return Ok(None);
        };
        let metrics: Vec<(&String, &Value)> =
            scores.iter().filter(|(key, _)| *key != "maxAge").collect();
        if metrics.is_empty() {
            return Ok(None);
        }
        let columns = metrics.iter().map(|(key, _)| Scalar::text(key.as_str())).collect();
        let cells = metrics.iter().map(|(_, value)| raw_scalar(value)).collect();
        Frame::new(vec![Scalar::text("Value")], columns, vec![cells])
            .map(Some)
            .map_err(|e| FetchError::malformed(format!("yahoo esgScores table: {e}")))
    }

    fn calendar(&self) -> Option<Frame> {
        let events = self.modules.get("calendarEvents")?;
        let mut rows = Vec::new();
        if let Some(dates) = events
            .get("earnings")
            .and_then(|earnings| earnings.get("earningsDate"))
            .and_then(Value::as_array)
        {
            for date in dates {
                rows.push((Scalar::text("Earnings Date"), [epoch_scalar(date)]));
            }
        }
        for (key, label) in [("exDividendDate", "Ex-Dividend Date"), ("dividendDate", "Dividend Date")] {
            if let Some(date) = events.get(key) {
                rows.push((Scalar::text(label), [epoch_scalar(date)]));
            }
        }
        (!rows.is_empty()).then(|| Frame::from_rows(["Value"], rows))
    }
}

/// Unwraps Yahoo's `{"raw": …, "fmt": …}` cells.
fn raw_scalar(value: &Value) -> Scalar {
    match value {
        Value::Null | Value::Array(_) => Scalar::Null,
        Value::Bool(flag) => Scalar::Bool(*flag),
        Value::Number(number) => number
            .as_i64()
            .map(Scalar::Int)
            .or_else(|| number.as_f64().map(Scalar::Float))
            .unwrap_or(Scalar::Null),
        Value::String(text) => Scalar::Text(text.clone()),
        Value::Object(map) => map.get("raw").map_or(Scalar::Null, raw_scalar),
    }
}

/// Report-date label: the formatted `YYYY-MM-DD` form when present.
fn date_label(value: &Value) -> Scalar {
    match value.get("fmt").and_then(Value::as_str) {
        Some(formatted) => Scalar::text(formatted),
        None => raw_scalar(value),
    }
}

fn epoch_scalar(value: &Value) -> Scalar {
    match raw_scalar(value) {
        Scalar::Int(seconds) => OffsetDateTime::from_unix_timestamp(seconds)
            .map_or(Scalar::Null, Scalar::Timestamp),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use time::macros::date;

    use super::*;
    use crate::http_client::{HttpError, HttpFuture};
    use crate::normalize::coerce::derive_date;

    const CHART: &str = r#"{"chart":{"result":[{
        "meta":{"gmtoffset":-18000,"longName":"Microsoft Corporation","shortName":"Microsoft"},
        "timestamp":[1704171600,1704258000],
        "indicators":{"quote":[{"open":[373.86,369.01],"high":[375.9,373.26],"low":[366.77,368.51],"close":[370.87,370.6],"volume":[25258600,null]}]},
        "events":{
            "dividends":{"1707921000":{"amount":0.75,"date":1707921000}},
            "splits":{"1045578600":{"date":1045578600,"numerator":2,"denominator":1,"splitRatio":"2:1"}}
        }
    }],"error":null}}"#;

    const SUMMARY: &str = r#"{"quoteSummary":{"result":[{
        "upgradeDowngradeHistory":{"history":[
            {"epochGradeDate":1714128000,"firm":"Morgan Stanley","toGrade":"Overweight","fromGrade":"Overweight","action":"main","currentPriceTarget":520},
            {"epochGradeDate":1714041600,"firm":"Citi","toGrade":"Buy","fromGrade":"","action":"init"}
        ],"maxAge":86400},
        "balanceSheetHistory":{"balanceSheetStatements":[
            {"endDate":{"raw":1719705600,"fmt":"2024-06-30"},"totalAssets":{"raw":512163000000,"fmt":"512.16B"},"maxAge":1},
            {"endDate":{"raw":1688083200,"fmt":"2023-06-30"},"totalAssets":{"raw":411976000000,"fmt":"411.98B"},"goodwill":{}}
        ],"maxAge":86400},
        "esgScores":{"totalEsg":{"raw":15.2,"fmt":"15.2"},"peerGroup":"Software & Services","maxAge":86400},
        "calendarEvents":{"earnings":{"earningsDate":[{"raw":1721692800,"fmt":"2024-07-23"}]},"exDividendDate":{"raw":1723680000,"fmt":"2024-08-15"}}
    }],"error":null}}"#;

    struct CannedHttpClient {
        routes: Vec<(&'static str, HttpResponse)>,
        requests: StdMutex<Vec<String>>,
    }

    impl CannedHttpClient {
        fn new(routes: Vec<(&'static str, HttpResponse)>) -> Self {
            Self {
                routes,
                requests: StdMutex::new(Vec::new()),
            }
        }

        fn calls_to(&self, fragment: &str) -> usize {
            self.requests
                .lock()
                .expect("request log")
                .iter()
                .filter(|url| url.contains(fragment))
                .count()
        }
    }

    impl HttpClient for CannedHttpClient {
        fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
            let url = request.full_url();
            self.requests.lock().expect("request log").push(url.clone());
            let response = self
                .routes
                .iter()
                .find(|(fragment, _)| url.contains(fragment))
                .map(|(_, response)| response.clone())
                .ok_or_else(|| HttpError::non_retryable(format!("no route for {url}")));
            Box::pin(async move { response })
        }
    }

    fn provider(client: Arc<CannedHttpClient>) -> YahooProvider {
        YahooProvider::with_http_client(
            client,
            YahooConfig {
                api_base: String::from("https://yahoo.test"),
                session_url: String::from("https://session.test"),
                retry: RetryPolicy::fixed(Duration::from_millis(1), 2),
                ..YahooConfig::default()
            },
        )
    }

    fn msft() -> Symbol {
        Symbol::parse("MSFT").expect("symbol")
    }

    #[tokio::test]
    async fn chart_is_fetched_once_per_symbol() {
        let client = Arc::new(CannedHttpClient::new(vec![(
            "/v8/finance/chart/MSFT",
            HttpResponse::ok(CHART),
        )]));
        let yahoo = provider(Arc::clone(&client));
        let symbol = msft();

        let prices = yahoo.price_history(&symbol).await.expect("prices").expect("frame");
        let profile = yahoo.company_profile(&symbol).await.expect("profile").expect("some");
        let splits = yahoo
            .corporate_actions(&symbol, CorporateActionKind::Split)
            .await
            .expect("splits");
        let gains = yahoo
            .corporate_actions(&symbol, CorporateActionKind::CapitalGain)
            .await
            .expect("gains");

        assert_eq!(client.calls_to("/v8/finance/chart/"), 1);
        assert_eq!(prices.n_rows(), 2);
        assert_eq!(profile.name.as_deref(), Some("Microsoft Corporation"));
        assert_eq!(splits.map(|s| s.len()), Some(1));
        assert!(gains.is_none());
    }

    #[tokio::test]
    async fn bar_timestamps_keep_the_exchange_date() {
        let client = Arc::new(CannedHttpClient::new(vec![("/v8/finance/chart/", HttpResponse::ok(CHART))]));
        let yahoo = provider(client);
        let prices = yahoo.price_history(&msft()).await.expect("prices").expect("frame");
        // 1704171600 is 2024-01-02 05:00 UTC, i.e. midnight in New York.
        assert_eq!(derive_date(&prices.index()[0]), Some(date!(2024 - 01 - 02)));
        assert_eq!(prices.cell(1, 4), Some(&Scalar::Null));
    }

    #[tokio::test]
    async fn unknown_symbol_is_an_invalid_request() {
        let client = Arc::new(CannedHttpClient::new(vec![(
            "/v8/finance/chart/",
            HttpResponse::new(
                404,
                r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#,
            ),
        )]));
        let err = provider(client)
            .price_history(&Symbol::parse("ZZZZ").expect("symbol"))
            .await
            .expect_err("404");
        assert_eq!(err.code(), "fetch.invalid_request");
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_reported_unavailable() {
        let client = Arc::new(CannedHttpClient::new(vec![(
            "/v8/finance/chart/",
            HttpResponse::new(503, "busy"),
        )]));
        let err = provider(Arc::clone(&client))
            .price_history(&msft())
            .await
            .expect_err("503");
        assert_eq!(err.code(), "fetch.unavailable");
        assert_eq!(client.calls_to("/v8/finance/chart/"), 3);
    }

    #[tokio::test]
    async fn open_circuit_skips_the_upstream_entirely() {
        let client = Arc::new(CannedHttpClient::new(vec![(
            "/v8/finance/chart/",
            HttpResponse::new(500, "down"),
        )]));
        let yahoo = YahooProvider::with_http_client(
            Arc::clone(&client) as Arc<dyn HttpClient>,
            YahooConfig {
                api_base: String::from("https://yahoo.test"),
                retry: RetryPolicy::no_retry(),
                breaker: CircuitBreakerConfig {
                    failure_threshold: 1,
                    cooldown: Duration::from_secs(600),
                },
                ..YahooConfig::default()
            },
        );

        yahoo.price_history(&msft()).await.expect_err("first 500");
        let err = yahoo
            .price_history(&Symbol::parse("AAPL").expect("symbol"))
            .await
            .expect_err("circuit open");

        assert_eq!(err.code(), "fetch.unavailable");
        assert!(err.message().contains("circuit open"), "{err}");
        assert_eq!(client.calls_to("/v8/finance/chart/"), 1);
    }

    #[tokio::test]
    async fn summary_datasets_are_shaped_for_the_normalizers() {
        let client = Arc::new(CannedHttpClient::new(vec![
            ("session.test", HttpResponse::new(404, "")),
            ("/v1/test/getcrumb", HttpResponse::ok("abcCRUMB")),
            ("/v10/finance/quoteSummary/MSFT", HttpResponse::ok(SUMMARY)),
        ]));
        let yahoo = provider(Arc::clone(&client));
        let symbol = msft();

        let targets = yahoo.analyst_price_targets(&symbol).await.expect("targets").expect("frame");
        let recommendations = yahoo
            .analyst_recommendations(&symbol)
            .await
            .expect("recs")
            .expect("frame");
        let balance = yahoo
            .financial_statement(&symbol, StatementKind::BalanceSheet, PeriodKind::Annual)
            .await
            .expect("balance")
            .expect("frame");
        let quarterly = yahoo
            .financial_statement(&symbol, StatementKind::BalanceSheet, PeriodKind::Quarterly)
            .await
            .expect("quarterly");
        let esg = yahoo.sustainability(&symbol).await.expect("esg").expect("frame");
        let calendar = yahoo.calendar(&symbol).await.expect("calendar").expect("frame");

        assert_eq!(client.calls_to("/v10/finance/quoteSummary/"), 1);
        assert_eq!(client.calls_to("crumb=abcCRUMB"), 1);
        assert_eq!(targets.n_rows(), 1, "only rows with a target price");
        assert_eq!(recommendations.n_rows(), 2);
        assert_eq!(balance.columns()[0], Scalar::text("2024-06-30"));
        assert_eq!(balance.index(), &[Scalar::text("totalAssets"), Scalar::text("goodwill")]);
        assert!(quarterly.is_none());
        assert_eq!(esg.n_cols(), 2);
        assert_eq!(calendar.n_rows(), 2);
    }

    #[test]
    fn short_indicator_arrays_leave_null_cells() {
        let chart = CHART.replace(r#""close":[370.87,370.6]"#, r#""close":[370.87]"#);
        let payload = ChartPayload::parse(&chart).expect("chart");
        let prices = payload.prices.expect("prices");

        assert_eq!(prices.n_rows(), 2);
        let (_, last) = prices.rows().nth(1).expect("second bar");
        assert_eq!(last.len(), 5);
        assert_eq!(last[3], Scalar::Null);
    }

    #[test]
    fn statement_items_missing_from_a_report_become_null_cells() {
        let payload = SummaryPayload::parse(SUMMARY).expect("summary");
        let balance = payload
            .statement(StatementKind::BalanceSheet, PeriodKind::Annual)
            .expect("rectangular")
            .expect("frame");

        let (label, goodwill) = balance.rows().nth(1).expect("goodwill row");
        assert_eq!(label, &Scalar::text("goodwill"));
        assert_eq!(goodwill.len(), balance.n_cols());
        assert_eq!(goodwill[0], Scalar::Null);
    }

    #[tokio::test]
    async fn rejected_crumb_is_refreshed_once() {
        struct FlakyCrumb {
            inner: CannedHttpClient,
            summary_calls: StdMutex<u32>,
        }

        impl HttpClient for FlakyCrumb {
            fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
                if request.url.contains("quoteSummary") {
                    let mut calls = self.summary_calls.lock().expect("calls");
                    *calls += 1;
                    if *calls == 1 {
                        return Box::pin(async { Ok(HttpResponse::new(401, "Invalid Crumb")) });
                    }
                }
                self.inner.execute(request)
            }
        }

        let client = Arc::new(FlakyCrumb {
            inner: CannedHttpClient::new(vec![
                ("session.test", HttpResponse::new(404, "")),
                ("/v1/test/getcrumb", HttpResponse::ok("fresh")),
                ("/v10/finance/quoteSummary/", HttpResponse::ok(SUMMARY)),
            ]),
            summary_calls: StdMutex::new(0),
        });
        let yahoo = YahooProvider::with_http_client(
            Arc::clone(&client) as Arc<dyn HttpClient>,
            YahooConfig {
                api_base: String::from("https://yahoo.test"),
                session_url: String::from("https://session.test"),
                retry: RetryPolicy::no_retry(),
                ..YahooConfig::default()
            },
        );

        let targets = yahoo.analyst_price_targets(&msft()).await.expect("targets");
        assert!(targets.is_some());
        assert_eq!(*client.summary_calls.lock().expect("calls"), 2);
        assert_eq!(client.inner.calls_to("/v1/test/getcrumb"), 2);
    }
}
