//! 衍生財務指標
//!
//! 每個分母都加上 [`EPSILON`]，分母為零時結果為 `分子 / ε`，而不是錯誤或無限大。
//! 這是沿用既有輸出的近似做法，不是精確的財務定義。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// 避免除以零而加在分母上的常數
pub const EPSILON: f64 = 1e-8;

/// 缺值的處理方式
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MissingValue {
    /// 缺值視為 0.0 後照常計算
    #[default]
    ZeroFill,
    /// 任何輸入缺值時，結果也是缺值
    Propagate,
}

impl MissingValue {
    pub fn resolve(&self, value: Option<f64>) -> Option<f64> {
        match self {
            MissingValue::ZeroFill => Some(value.unwrap_or(0.0)),
            MissingValue::Propagate => value,
        }
    }
}

/// 指標的時間點：當期、前一季、一年前（四季前）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Period {
    Current,
    Previous,
    YearAgo,
}

impl Period {
    pub fn offset(&self) -> u8 {
        match self {
            Period::Current => 0,
            Period::Previous => 1,
            Period::YearAgo => 4,
        }
    }

    /// 欄位後綴，例如 `_0`
    pub fn suffix(&self) -> String {
        format!("_{}", self.offset())
    }
}

/// 追蹤的財務指標
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum Metric {
    MarketCap,
    Per,
    Pbr,
    Psr,
    Revenue,
    GrossProfit,
    OperatingIncome,
    NetIncome,
    TotalAssets,
    ShortTermBorrowings,
    LongTermBorrowings,
    NonCurrentFinancialLiabilities,
    Bonds,
    CurrentPortionOfLongTermDebt,
    OperatingCashFlow,
    FreeCashFlow,
}

/// 同一指標在三個時間點的值
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricSeries {
    pub current: Option<f64>,
    pub previous: Option<f64>,
    pub year_ago: Option<f64>,
}

impl MetricSeries {
    pub fn at(&self, period: Period) -> Option<f64> {
        match period {
            Period::Current => self.current,
            Period::Previous => self.previous,
            Period::YearAgo => self.year_ago,
        }
    }

    pub fn set(&mut self, period: Period, value: Option<f64>) {
        match period {
            Period::Current => self.current = value,
            Period::Previous => self.previous = value,
            Period::YearAgo => self.year_ago = value,
        }
    }
}

/// 單一標的抓到的所有指標
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSheet {
    series: HashMap<Metric, MetricSeries>,
}

impl MetricSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, metric: Metric, period: Period, value: Option<f64>) {
        self.series.entry(metric).or_default().set(period, value);
    }

    pub fn series(&self, metric: Metric) -> MetricSeries {
        self.series.get(&metric).copied().unwrap_or_default()
    }

    pub fn raw(&self, metric: Metric, period: Period) -> Option<f64> {
        self.series(metric).at(period)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// 成長率 = a / (b + ε) − 1
pub fn growth(current: f64, prior: f64) -> f64 {
    current / (prior + EPSILON) - 1.0
}

/// 比率 = 分子 / (分母 + ε)
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    numerator / (denominator + EPSILON)
}

/// 由指標算出的欄位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derived {
    /// GP/A_0 = 매출총이익_0 / (자산총계_0 + ε)
    GrossProfitToAssets,
    /// 자산총계_0 對 자산총계_4 的成長率
    AssetGrowthYear,
    OperatingIncomeGrowth(Period),
    NetIncomeGrowth(Period),
    /// 借款細項在當期的加總
    Borrowings,
    /// (영업이익/차입금) 當期對前一季的成長率
    OperatingIncomeToBorrowingsGrowth,
    /// 借款當期對前一季的成長率
    BorrowingsGrowth,
    /// PSR_0 = 시가총액_0 / (매출액_0 + ε)
    Psr,
    /// PFCR_0 = 시가총액_0 / (잉여현금흐름_0 + ε)
    Pfcr,
}

impl Derived {
    pub fn label(&self) -> &'static str {
        match self {
            Derived::GrossProfitToAssets => "GP/A_0",
            Derived::AssetGrowthYear => "자산성장률(년)",
            Derived::OperatingIncomeGrowth(Period::YearAgo) => "영업이익성장률(년)",
            Derived::OperatingIncomeGrowth(_) => "영업이익성장률(분기)",
            Derived::NetIncomeGrowth(Period::YearAgo) => "순이익성장률(년)",
            Derived::NetIncomeGrowth(_) => "순이익성장률(분기)",
            Derived::Borrowings => "차입금_0",
            Derived::OperatingIncomeToBorrowingsGrowth => "(영업이익/차입금)증가율(분기)",
            Derived::BorrowingsGrowth => "차입금증가율(년)",
            Derived::Psr => "PSR_0",
            Derived::Pfcr => "PFCR_0",
        }
    }

    /// 計算時會讀到的指標，借款加總的細項不在此列
    pub fn inputs(&self) -> &'static [Metric] {
        match self {
            Derived::GrossProfitToAssets => &[Metric::GrossProfit, Metric::TotalAssets],
            Derived::AssetGrowthYear => &[Metric::TotalAssets],
            Derived::OperatingIncomeGrowth(_) => &[Metric::OperatingIncome],
            Derived::NetIncomeGrowth(_) => &[Metric::NetIncome],
            Derived::Borrowings | Derived::BorrowingsGrowth => &[],
            Derived::OperatingIncomeToBorrowingsGrowth => &[Metric::OperatingIncome],
            Derived::Psr => &[Metric::MarketCap, Metric::Revenue],
            Derived::Pfcr => &[Metric::MarketCap, Metric::FreeCashFlow],
        }
    }

    pub fn needs_borrowings(&self) -> bool {
        matches!(
            self,
            Derived::Borrowings
                | Derived::BorrowingsGrowth
                | Derived::OperatingIncomeToBorrowingsGrowth
        )
    }
}

/// 依來源設定的借款細項與缺值策略計算衍生指標
#[derive(Debug, Clone)]
pub struct RatioCalculator {
    borrowings: Vec<Metric>,
    policy: MissingValue,
}

impl RatioCalculator {
    pub fn new(borrowings: &[Metric], policy: MissingValue) -> Self {
        RatioCalculator {
            borrowings: borrowings.to_vec(),
            policy,
        }
    }

    /// 依缺值策略取得指標值
    pub fn value(&self, sheet: &MetricSheet, metric: Metric, period: Period) -> Option<f64> {
        self.policy.resolve(sheet.raw(metric, period))
    }

    /// 借款細項在某個時間點的加總
    pub fn borrowings_at(&self, sheet: &MetricSheet, period: Period) -> Option<f64> {
        self.borrowings
            .iter()
            .map(|m| self.value(sheet, *m, period))
            .sum()
    }

    fn growth_of(&self, sheet: &MetricSheet, metric: Metric, prior: Period) -> Option<f64> {
        let current = self.value(sheet, metric, Period::Current)?;
        let prior = self.value(sheet, metric, prior)?;
        Some(growth(current, prior))
    }

    fn ratio_of(&self, sheet: &MetricSheet, numerator: Metric, denominator: Metric) -> Option<f64> {
        let n = self.value(sheet, numerator, Period::Current)?;
        let d = self.value(sheet, denominator, Period::Current)?;
        Some(ratio(n, d))
    }

    fn income_to_borrowings(&self, sheet: &MetricSheet, period: Period) -> Option<f64> {
        let income = self.value(sheet, Metric::OperatingIncome, period)?;
        let borrowings = self.borrowings_at(sheet, period)?;
        Some(ratio(income, borrowings))
    }

    pub fn compute(&self, derived: Derived, sheet: &MetricSheet) -> Option<f64> {
        match derived {
            Derived::GrossProfitToAssets => {
                self.ratio_of(sheet, Metric::GrossProfit, Metric::TotalAssets)
            }
            Derived::AssetGrowthYear => self.growth_of(sheet, Metric::TotalAssets, Period::YearAgo),
            Derived::OperatingIncomeGrowth(prior) => {
                self.growth_of(sheet, Metric::OperatingIncome, prior)
            }
            Derived::NetIncomeGrowth(prior) => self.growth_of(sheet, Metric::NetIncome, prior),
            Derived::Borrowings => self.borrowings_at(sheet, Period::Current),
            Derived::OperatingIncomeToBorrowingsGrowth => {
                let current = self.income_to_borrowings(sheet, Period::Current)?;
                let previous = self.income_to_borrowings(sheet, Period::Previous)?;
                Some(growth(current, previous))
            }
            Derived::BorrowingsGrowth => {
                let current = self.borrowings_at(sheet, Period::Current)?;
                let previous = self.borrowings_at(sheet, Period::Previous)?;
                Some(growth(current, previous))
            }
            Derived::Psr => self.ratio_of(sheet, Metric::MarketCap, Metric::Revenue),
            Derived::Pfcr => self.ratio_of(sheet, Metric::MarketCap, Metric::FreeCashFlow),
        }
    }
}
