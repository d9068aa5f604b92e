use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use time::{Date, Duration};

use crate::domain::{CompanyProfile, CorporateActionKind, PeriodKind, StatementKind, Symbol};
use crate::error::FetchError;
use crate::frame::{Frame, Scalar, Series};
use crate::provider::{MarketDataProvider, ProviderFuture, SecurityDatasets};
use crate::source::ProviderId;

/// Canned responses for one symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureSecurity {
    pub profile: Option<CompanyProfile>,
    pub datasets: SecurityDatasets,
}

/// Deterministic in-memory provider.
///
/// Unknown symbols get no datasets at all, unless the provider was built
/// with [`FixtureProvider::synthetic`], in which case a small generated set
/// is served for any symbol.
#[derive(Debug, Default)]
pub struct FixtureProvider {
    securities: BTreeMap<Symbol, FixtureSecurity>,
    failures: BTreeMap<Symbol, FetchError>,
    profile_failures: BTreeSet<Symbol>,
    synthetic_start: Option<Date>,
    calls: AtomicUsize,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves a generated five-session history starting at `start` for any symbol.
    pub fn synthetic(start: Date) -> Self {
        Self {
            synthetic_start: Some(start),
            ..Self::default()
        }
    }

    pub fn with_security(mut self, symbol: Symbol, security: FixtureSecurity) -> Self {
        self.securities.insert(symbol, security);
        self
    }

    /// Every dataset call for `symbol` fails with `error`.
    pub fn with_failure(mut self, symbol: Symbol, error: FetchError) -> Self {
        self.failures.insert(symbol, error);
        self
    }

    /// Only the company-profile call for `symbol` fails.
    pub fn with_profile_failure(mut self, symbol: Symbol) -> Self {
        self.profile_failures.insert(symbol);
        self
    }

    /// Number of provider calls served so far, failures included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn security(&self, symbol: &Symbol) -> Result<FixtureSecurity, FetchError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.failures.get(symbol) {
            return Err(error.clone());
        }
        if let Some(security) = self.securities.get(symbol) {
            return Ok(security.clone());
        }
        Ok(self
            .synthetic_start
            .map(|start| synthetic_security(symbol, start))
            .unwrap_or_default())
    }
}

impl MarketDataProvider for FixtureProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Fixture
    }

    fn company_profile<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> ProviderFuture<'a, Option<CompanyProfile>> {
        Box::pin(async move {
            if self.profile_failures.contains(symbol) {
                self.calls.fetch_add(1, Ordering::Relaxed);
                return Err(FetchError::unavailable(format!(
                    "fixture profile unavailable for '{symbol}'"
                )));
            }
            Ok(self.security(symbol)?.profile)
        })
    }

    fn price_history<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<Frame>> {
        Box::pin(async move { Ok(self.security(symbol)?.datasets.prices) })
    }

    fn corporate_actions<'a>(
        &'a self,
        symbol: &'a Symbol,
        kind: CorporateActionKind,
    ) -> ProviderFuture<'a, Option<Series>> {
        Box::pin(async move {
            Ok(self
                .security(symbol)?
                .datasets
                .corporate_actions
                .into_iter()
                .find_map(|(candidate, series)| (candidate == kind).then_some(series)))
        })
    }

    fn analyst_price_targets<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> ProviderFuture<'a, Option<Frame>> {
        Box::pin(async move { Ok(self.security(symbol)?.datasets.price_targets) })
    }

    fn analyst_recommendations<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> ProviderFuture<'a, Option<Frame>> {
        Box::pin(async move { Ok(self.security(symbol)?.datasets.recommendations) })
    }

    fn financial_statement<'a>(
        &'a self,
        symbol: &'a Symbol,
        kind: StatementKind,
        period: PeriodKind,
    ) -> ProviderFuture<'a, Option<Frame>> {
        Box::pin(async move {
            Ok(self
                .security(symbol)?
                .datasets
                .statements
                .into_iter()
                .find(|statement| statement.kind == kind && statement.period == period)
                .map(|statement| statement.frame))
        })
    }

    fn sustainability<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<Frame>> {
        Box::pin(async move { Ok(self.security(symbol)?.datasets.sustainability) })
    }

    fn calendar<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<Frame>> {
        Box::pin(async move { Ok(self.security(symbol)?.datasets.calendar) })
    }
}

fn synthetic_security(symbol: &Symbol, start: Date) -> FixtureSecurity {
    // Stable per-symbol base price so reruns produce identical rows.
    let seed = symbol
        .as_str()
        .bytes()
        .fold(0_u32, |acc, byte| acc.wrapping_mul(31).wrapping_add(u32::from(byte)));
    let base = 50.0 + f64::from(seed % 400);

    let mut bars = Vec::new();
    let mut day = start;
    for session in 0..5_i32 {
        let open = base + f64::from(session);
        let cells = [
            Scalar::Float(open),
            Scalar::Float(open + 1.5),
            Scalar::Float(open - 1.0),
            Scalar::Float(open + 0.5),
            Scalar::Int(1_000_000 + i64::from(session) * 10_000),
        ];
        bars.push((Scalar::Date(day), cells));
        day = day.saturating_add(Duration::days(1));
    }
    let prices = Frame::from_rows(["Open", "High", "Low", "Close", "Volume"], bars);

    let dividends = Series::new(vec![(Scalar::Date(start), Scalar::Float(0.25))]);
    let targets = Frame::from_rows(
        ["Date", "Firm", "Target Price", "Rating"],
        vec![(
            Scalar::Int(0),
            [
                Scalar::Date(start),
                Scalar::text("Fixture Research"),
                Scalar::Float(base * 1.2),
                Scalar::text("Buy"),
            ],
        )],
    );

    FixtureSecurity {
        profile: Some(CompanyProfile {
            name: Some(format!("{symbol} Holdings")),
        }),
        datasets: SecurityDatasets {
            prices: Some(prices),
            corporate_actions: vec![(CorporateActionKind::Dividend, dividends)],
            price_targets: Some(targets),
            ..SecurityDatasets::default()
        },
    }
}
