use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::Symbol;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Canonical identity of a security. Every other record hangs off this row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerIdentity {
    pub id: i64,
    pub symbol: Symbol,
    pub name: Option<String>,
    pub is_active: bool,
}

/// Descriptive metadata the provider returns for a symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: Option<String>,
}

/// One trading day of OHLCV data.
///
/// Price fields are either `None` or finite; `volume` is either `None` or non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorporateActionKind {
    Split,
    Dividend,
    CapitalGain,
}

impl CorporateActionKind {
    pub const ALL: [Self; 3] = [Self::Split, Self::Dividend, Self::CapitalGain];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Split => "split",
            Self::Dividend => "dividend",
            Self::CapitalGain => "capital_gain",
        }
    }
}

impl Display for CorporateActionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split ratio or per-share cash distribution on a given date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorporateAction {
    Split {
        #[serde(with = "iso_date")]
        date: Date,
        ratio: f64,
    },
    Dividend {
        #[serde(with = "iso_date")]
        date: Date,
        amount: f64,
    },
    CapitalGain {
        #[serde(with = "iso_date")]
        date: Date,
        amount: f64,
    },
}

impl CorporateAction {
    pub fn new(kind: CorporateActionKind, date: Date, magnitude: f64) -> Self {
        match kind {
            CorporateActionKind::Split => Self::Split {
                date,
                ratio: magnitude,
            },
            CorporateActionKind::Dividend => Self::Dividend {
                date,
                amount: magnitude,
            },
            CorporateActionKind::CapitalGain => Self::CapitalGain {
                date,
                amount: magnitude,
            },
        }
    }

    pub const fn kind(&self) -> CorporateActionKind {
        match self {
            Self::Split { .. } => CorporateActionKind::Split,
            Self::Dividend { .. } => CorporateActionKind::Dividend,
            Self::CapitalGain { .. } => CorporateActionKind::CapitalGain,
        }
    }

    pub const fn date(&self) -> Date {
        match self {
            Self::Split { date, .. } | Self::Dividend { date, .. } | Self::CapitalGain { date, .. } => {
                *date
            }
        }
    }

    /// Ratio for splits, cash amount otherwise.
    pub const fn magnitude(&self) -> f64 {
        match self {
            Self::Split { ratio, .. } => *ratio,
            Self::Dividend { amount, .. } | Self::CapitalGain { amount, .. } => *amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    BalanceSheet,
    CashFlow,
    Income,
}

impl StatementKind {
    pub const ALL: [Self; 3] = [Self::BalanceSheet, Self::CashFlow, Self::Income];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BalanceSheet => "balance_sheet",
            Self::CashFlow => "cash_flow",
            Self::Income => "income_statement",
        }
    }
}

impl Display for StatementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Quarterly,
    Annual,
}

impl PeriodKind {
    pub const ALL: [Self; 2] = [Self::Quarterly, Self::Annual];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quarterly => "quarterly",
            Self::Annual => "annual",
        }
    }
}

impl Display for PeriodKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (report date, line item) cell of a financial statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLineItem {
    pub statement: StatementKind,
    pub period: PeriodKind,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub item_name: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTarget {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub firm: String,
    pub target_price: Option<f64>,
    pub rating: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub firm: String,
    pub from_grade: String,
    pub to_grade: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalystEvent {
    PriceTarget(PriceTarget),
    Recommendation(Recommendation),
}

impl AnalystEvent {
    pub const fn date(&self) -> Date {
        match self {
            Self::PriceTarget(target) => target.date,
            Self::Recommendation(recommendation) => recommendation.date,
        }
    }

    pub fn firm(&self) -> &str {
        match self {
            Self::PriceTarget(target) => &target.firm,
            Self::Recommendation(recommendation) => &recommendation.firm,
        }
    }
}

/// Point-in-time ESG score, dated on the day it was ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SustainabilityMetric {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub metric_name: String,
    pub value: Option<f64>,
}

/// Scheduled earnings or dividend event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub event_type: String,
    pub description: Option<String>,
}

/// Every canonical record produced for one security in one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBatch {
    pub prices: Vec<PricePoint>,
    pub corporate_actions: Vec<CorporateAction>,
    pub statements: Vec<StatementLineItem>,
    pub analyst_events: Vec<AnalystEvent>,
    pub sustainability: Vec<SustainabilityMetric>,
    pub calendar: Vec<CalendarEvent>,
}

impl NormalizedBatch {
    pub fn record_count(&self) -> usize {
        self.prices.len()
            + self.corporate_actions.len()
            + self.statements.len()
            + self.analyst_events.len()
            + self.sustainability.len()
            + self.calendar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    pub fn price_targets(&self) -> impl Iterator<Item = &PriceTarget> {
        self.analyst_events.iter().filter_map(|event| match event {
            AnalystEvent::PriceTarget(target) => Some(target),
            AnalystEvent::Recommendation(_) => None,
        })
    }

    pub fn recommendations(&self) -> impl Iterator<Item = &Recommendation> {
        self.analyst_events.iter().filter_map(|event| match event {
            AnalystEvent::Recommendation(recommendation) => Some(recommendation),
            AnalystEvent::PriceTarget(_) => None,
        })
    }
}

/// Provider dataset a normalizer works on; used to label errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Profile,
    Prices,
    CorporateActions(CorporateActionKind),
    Statement(StatementKind, PeriodKind),
    PriceTargets,
    Recommendations,
    Sustainability,
    Calendar,
}

impl Display for DatasetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Profile => f.write_str("profile"),
            Self::Prices => f.write_str("prices"),
            Self::CorporateActions(kind) => write!(f, "corporate_actions/{kind}"),
            Self::Statement(kind, period) => write!(f, "{kind}/{period}"),
            Self::PriceTargets => f.write_str("analyst_price_targets"),
            Self::Recommendations => f.write_str("analyst_recommendations"),
            Self::Sustainability => f.write_str("sustainability"),
            Self::Calendar => f.write_str("calendar"),
        }
    }
}
