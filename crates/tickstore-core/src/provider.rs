//! Market-data provider contract.
//!
//! Every call may fail with a [`FetchError`] or return `Ok(None)` when the
//! provider simply has no such dataset for the symbol; absence is not an
//! error.
//!
//! | Method | Shape |
//! |--------|-------|
//! | [`company_profile`](MarketDataProvider::company_profile) | [`CompanyProfile`] |
//! | [`price_history`](MarketDataProvider::price_history) | date × OHLCV |
//! | [`corporate_actions`](MarketDataProvider::corporate_actions) | date → magnitude |
//! | [`analyst_price_targets`](MarketDataProvider::analyst_price_targets) | row × (firm, target, rating) |
//! | [`analyst_recommendations`](MarketDataProvider::analyst_recommendations) | row × (date, firm, grades, action) |
//! | [`financial_statement`](MarketDataProvider::financial_statement) | item × report date |
//! | [`sustainability`](MarketDataProvider::sustainability) | metric × 1 or 1 × metric |
//! | [`calendar`](MarketDataProvider::calendar) | event × value |

use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::domain::{CompanyProfile, CorporateActionKind, PeriodKind, StatementKind, Symbol};
use crate::error::FetchError;
use crate::frame::{Frame, Series};
use crate::source::ProviderId;

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

/// Source of per-security datasets.
///
/// Implementations must be `Send + Sync`; the orchestrator holds one behind
/// an `Arc` for the whole run.
pub trait MarketDataProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn company_profile<'a>(&'a self, symbol: &'a Symbol)
        -> ProviderFuture<'a, Option<CompanyProfile>>;

    /// Full daily history.
    fn price_history<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<Frame>>;

    fn corporate_actions<'a>(
        &'a self,
        symbol: &'a Symbol,
        kind: CorporateActionKind,
    ) -> ProviderFuture<'a, Option<Series>>;

    fn analyst_price_targets<'a>(&'a self, symbol: &'a Symbol)
        -> ProviderFuture<'a, Option<Frame>>;

    fn analyst_recommendations<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> ProviderFuture<'a, Option<Frame>>;

    fn financial_statement<'a>(
        &'a self,
        symbol: &'a Symbol,
        kind: StatementKind,
        period: PeriodKind,
    ) -> ProviderFuture<'a, Option<Frame>>;

    fn sustainability<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<Frame>>;

    fn calendar<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Option<Frame>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatementFrame {
    pub kind: StatementKind,
    pub period: PeriodKind,
    pub frame: Frame,
}

/// Everything fetched for one security, still in provider shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityDatasets {
    pub prices: Option<Frame>,
    pub corporate_actions: Vec<(CorporateActionKind, Series)>,
    pub statements: Vec<StatementFrame>,
    pub price_targets: Option<Frame>,
    pub recommendations: Option<Frame>,
    pub sustainability: Option<Frame>,
    pub calendar: Option<Frame>,
}

impl SecurityDatasets {
    /// Fetches every dataset for `symbol` one call at a time.
    ///
    /// The first failing call aborts the fetch; absent datasets are skipped.
    pub async fn fetch(
        provider: &dyn MarketDataProvider,
        symbol: &Symbol,
    ) -> Result<Self, FetchError> {
        let mut datasets = Self {
            prices: provider.price_history(symbol).await?,
            ..Self::default()
        };

        for kind in CorporateActionKind::ALL {
            if let Some(series) = provider.corporate_actions(symbol, kind).await? {
                datasets.corporate_actions.push((kind, series));
            }
        }

        for kind in StatementKind::ALL {
            for period in PeriodKind::ALL {
                match provider.financial_statement(symbol, kind, period).await? {
                    Some(frame) => datasets.statements.push(StatementFrame {
                        kind,
                        period,
                        frame,
                    }),
                    None => debug!(%symbol, statement = %kind, %period, "statement not available"),
                }
            }
        }

        datasets.price_targets = provider.analyst_price_targets(symbol).await?;
        datasets.recommendations = provider.analyst_recommendations(symbol).await?;
        datasets.sustainability = provider.sustainability(symbol).await?;
        datasets.calendar = provider.calendar(symbol).await?;

        Ok(datasets)
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_none()
            && self.corporate_actions.is_empty()
            && self.statements.is_empty()
            && self.price_targets.is_none()
            && self.recommendations.is_none()
            && self.sustainability.is_none()
            && self.calendar.is_none()
    }
}
