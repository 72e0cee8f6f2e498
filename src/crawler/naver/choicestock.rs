//! choicestock 海外個股頁面的財務指標
//!
//! 概要頁只有市值，投資指標頁有 PER、PBR、PSR，季報頁有損益、資產與現金流量。
//! 項目名稱採部分比對，同一指標出現多列時以最後一列為準。

use anyhow::Result;
use concat_string::concat_string;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use urlencoding::encode;

use crate::{
    crawler::{record_periods, PageRequest, PageSource},
    listing::{
        financial::MetricField,
        ratio::{Derived, Metric, MetricSheet, MissingValue, Period},
        FinancialSchema,
    },
    logging,
    util::{http::element, text},
};

const HOST: &str = "https://www.choicestock.co.kr/search";

static SUMMARY_TABLES: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"table[class="tableRanking left guide_table"]"#)
        .unwrap_or_else(|why| panic!("invalid summary selector: {:?}", why))
});

static INVEST_TABLES: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"table[class="tableRanking table_search_invest"]"#)
        .unwrap_or_else(|why| panic!("invalid invest selector: {:?}", why))
});

static FINANCIAL_TABLES: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table.tableRanking")
        .unwrap_or_else(|why| panic!("invalid financials selector: {:?}", why))
});

static BODY_ROWS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("tbody tr").unwrap_or_else(|why| panic!("invalid row selector: {:?}", why))
});

static SPAN: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("span").unwrap_or_else(|why| panic!("invalid span selector: {:?}", why))
});

static TD: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("td").unwrap_or_else(|why| panic!("invalid td selector: {:?}", why))
});

static FIELDS: [MetricField; 12] = [
    MetricField::new("시가총액", Metric::MarketCap, "시가총액"),
    MetricField::new("PER", Metric::Per, "PER"),
    MetricField::new("PBR", Metric::Pbr, "PBR"),
    MetricField::new("PSR", Metric::Psr, "PSR"),
    MetricField::new("매출총이익", Metric::GrossProfit, "매출총이익"),
    MetricField::new("자산총계", Metric::TotalAssets, "총 자산"),
    MetricField::new("영업이익", Metric::OperatingIncome, "영업이익"),
    MetricField::internal("단기차입금", Metric::ShortTermBorrowings),
    MetricField::internal("장기차입금", Metric::LongTermBorrowings),
    MetricField::new("순이익", Metric::NetIncome, "순이익"),
    MetricField::new("영업활동", Metric::OperatingCashFlow, "영업활동 현금흐름"),
    MetricField::new("잉여현금", Metric::FreeCashFlow, "잉여 현금흐름"),
];

const BORROWINGS: [Metric; 2] = [Metric::ShortTermBorrowings, Metric::LongTermBorrowings];

/// PSR 直接取自投資指標頁，不另外計算
const DERIVED: [Derived; 10] = [
    Derived::GrossProfitToAssets,
    Derived::AssetGrowthYear,
    Derived::OperatingIncomeGrowth(Period::Previous),
    Derived::OperatingIncomeGrowth(Period::YearAgo),
    Derived::NetIncomeGrowth(Period::Previous),
    Derived::NetIncomeGrowth(Period::YearAgo),
    Derived::Borrowings,
    Derived::OperatingIncomeToBorrowingsGrowth,
    Derived::BorrowingsGrowth,
    Derived::Pfcr,
];

const POSITIONS: [(Period, usize); 3] =
    [(Period::Current, 1), (Period::Previous, 2), (Period::YearAgo, 5)];

pub fn schema(policy: MissingValue) -> Result<FinancialSchema> {
    Ok(FinancialSchema::new(&FIELDS, &DERIVED, &BORROWINGS, policy)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoicePage {
    Summary,
    Invest,
    Financials,
}

impl ChoicePage {
    pub const ALL: [ChoicePage; 3] = [ChoicePage::Summary, ChoicePage::Invest, ChoicePage::Financials];

    pub fn categories(&self) -> &'static [MetricField] {
        match self {
            ChoicePage::Summary => &FIELDS[0..1],
            ChoicePage::Invest => &FIELDS[1..4],
            ChoicePage::Financials => &FIELDS[4..],
        }
    }

    pub fn request(&self, symbol: &str) -> PageRequest {
        let symbol = encode(symbol);
        PageRequest::new(match self {
            ChoicePage::Summary => concat_string!(HOST, "/summary/", symbol),
            ChoicePage::Invest => concat_string!(HOST, "/invest/", symbol),
            ChoicePage::Financials => concat_string!(HOST, "/financials/", symbol, "/MRQ"),
        })
    }

    fn tables(&self) -> &'static Selector {
        match self {
            ChoicePage::Summary => &SUMMARY_TABLES,
            ChoicePage::Invest => &INVEST_TABLES,
            ChoicePage::Financials => &FINANCIAL_TABLES,
        }
    }

    /// 概要頁取第一個 span，投資指標頁取最後一個 span，季報頁取第一個 td
    fn category(&self, tr: &ElementRef) -> Option<String> {
        let cell = match self {
            ChoicePage::Summary => tr.select(&SPAN).next(),
            ChoicePage::Invest => tr.select(&SPAN).last(),
            ChoicePage::Financials => tr.select(&TD).next(),
        }?;

        Some(element::inner_text(&cell))
    }

    pub fn parse(&self, html: &str, sheet: &mut MetricSheet) {
        let document = Html::parse_document(html);
        let categories = self.categories();

        for table in document.select(self.tables()) {
            for tr in table.select(&BODY_ROWS) {
                let Some(category) = self.category(&tr) else {
                    continue;
                };

                let cells = element::cell_texts(&tr);
                for field in categories.iter().filter(|f| category.contains(f.category)) {
                    if *self == ChoicePage::Summary {
                        let value = cells.first().and_then(|c| text::parse_digits(c).ok());
                        sheet.set(field.metric, Period::Current, value);
                    } else {
                        record_periods(sheet, field.metric, &cells, &POSITIONS);
                    }
                }
            }
        }
    }
}

pub async fn scrape(pages: &dyn PageSource, symbol: &str) -> MetricSheet {
    let mut sheet = MetricSheet::new();

    for page in ChoicePage::ALL {
        match pages.fetch(&page.request(symbol)).await {
            Ok(html) => page.parse(&html, &mut sheet),
            Err(why) => {
                logging::warn_file_async(format!(
                    "Failed to fetch choicestock {:?} of {} because {:?}",
                    page, symbol, why
                ));
            }
        }
    }

    if sheet.is_empty() {
        logging::warn_file_async(format!("No choicestock metrics found for {}", symbol));
    }

    sheet
}
