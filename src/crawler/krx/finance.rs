//! WiseReport 公司頁面的財務指標
//!
//! 概要頁取 시가총액、PER、PBR、FCF，財務分析頁依分頁取損益、財務狀況與現金流量。
//! 每個指標記錄當期、前一季與一年前三個時間點。

use anyhow::Result;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

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

const HOST: &str = "navercomp.wisereport.co.kr";

static SUMMARY_TABLES: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"table.gHead, table[class="gHead01 all-width"]"#)
        .unwrap_or_else(|why| panic!("invalid summary selector: {:?}", why))
});

static FINANCIAL_TABLES: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"table[class="gHead01 all-width data-list"]"#)
        .unwrap_or_else(|why| panic!("invalid financial selector: {:?}", why))
});

static ROWS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("tr").unwrap_or_else(|why| panic!("invalid row selector: {:?}", why))
});

static TH: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("th").unwrap_or_else(|why| panic!("invalid th selector: {:?}", why))
});

static TD: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("td").unwrap_or_else(|why| panic!("invalid td selector: {:?}", why))
});

static SPAN: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("span").unwrap_or_else(|why| panic!("invalid span selector: {:?}", why))
});

/// 各分頁的項目名稱與輸出欄位，順序即輸出順序
static FIELDS: [MetricField; 15] = [
    MetricField::new("시가총액", Metric::MarketCap, "시가총액"),
    MetricField::new("PER", Metric::Per, "PER"),
    MetricField::new("PBR", Metric::Pbr, "PBR"),
    MetricField::new("FCF", Metric::FreeCashFlow, "잉여현금흐름"),
    MetricField::new("매출액(수익)", Metric::Revenue, "매출액"),
    MetricField::new("매출총이익", Metric::GrossProfit, "매출총이익"),
    MetricField::new("영업이익", Metric::OperatingIncome, "영업이익"),
    MetricField::new("당기순이익", Metric::NetIncome, "순이익"),
    MetricField::new("자산총계", Metric::TotalAssets, "총자산"),
    MetricField::internal("단기차입금", Metric::ShortTermBorrowings),
    MetricField::internal("장기차입금", Metric::LongTermBorrowings),
    MetricField::internal("비유동금융부채", Metric::NonCurrentFinancialLiabilities),
    MetricField::internal("사채", Metric::Bonds),
    MetricField::internal("유동성장기부채", Metric::CurrentPortionOfLongTermDebt),
    MetricField::new("영업활동으로인한현금흐름", Metric::OperatingCashFlow, "영업활동현금흐름"),
];

/// 차입금 = 단기차입금 + 장기차입금 + 비유동금융부채 + 사채 + 유동성장기부채
const BORROWINGS: [Metric; 5] = [
    Metric::ShortTermBorrowings,
    Metric::LongTermBorrowings,
    Metric::NonCurrentFinancialLiabilities,
    Metric::Bonds,
    Metric::CurrentPortionOfLongTermDebt,
];

const DERIVED: [Derived; 11] = [
    Derived::GrossProfitToAssets,
    Derived::AssetGrowthYear,
    Derived::OperatingIncomeGrowth(Period::Previous),
    Derived::OperatingIncomeGrowth(Period::YearAgo),
    Derived::NetIncomeGrowth(Period::Previous),
    Derived::NetIncomeGrowth(Period::YearAgo),
    Derived::Borrowings,
    Derived::OperatingIncomeToBorrowingsGrowth,
    Derived::BorrowingsGrowth,
    Derived::Psr,
    Derived::Pfcr,
];

/// 概要頁表格中，當期、前一季、一年前所在的儲存格
const SUMMARY_POSITIONS: [(Period, usize); 3] =
    [(Period::Current, 4), (Period::Previous, 3), (Period::YearAgo, 0)];

/// 財務分析頁表格中，當期、前一季、一年前所在的儲存格
const FINANCIAL_POSITIONS: [(Period, usize); 3] =
    [(Period::Current, 5), (Period::Previous, 4), (Period::YearAgo, 1)];

pub fn schema(policy: MissingValue) -> Result<FinancialSchema> {
    Ok(FinancialSchema::new(&FIELDS, &DERIVED, &BORROWINGS, policy)?)
}

/// WiseReport 的頁面與分頁
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WisePage {
    Summary,
    ProfitAndLoss,
    FinancialPosition,
    CashFlow,
}

impl WisePage {
    pub const ALL: [WisePage; 4] = [
        WisePage::Summary,
        WisePage::ProfitAndLoss,
        WisePage::FinancialPosition,
        WisePage::CashFlow,
    ];

    /// 這個頁面負責的項目名稱
    pub fn categories(&self) -> &'static [MetricField] {
        match self {
            WisePage::Summary => &FIELDS[0..4],
            WisePage::ProfitAndLoss => &FIELDS[4..8],
            WisePage::FinancialPosition => &FIELDS[8..14],
            WisePage::CashFlow => &FIELDS[14..],
        }
    }

    /// 財務分析頁要先切到季報、再切到指定的報表分頁
    pub fn request(&self, symbol: &str) -> PageRequest {
        match self {
            WisePage::Summary => PageRequest::new(format!(
                "https://{}/v2/company/c1010001.aspx?cmp_cd={}",
                HOST, symbol
            ))
            .click("cns_Tab22"),
            _ => {
                let tab = match self {
                    WisePage::ProfitAndLoss => "rpt_tab1",
                    WisePage::FinancialPosition => "rpt_tab2",
                    _ => "rpt_tab3",
                };

                PageRequest::new(format!(
                    "https://{}/v2/company/c1030001.aspx?cmp_cd={}&cn=",
                    HOST, symbol
                ))
                .click("frqTyp1")
                .click("hfinGubun")
                .click(tab)
            }
        }
    }

    /// 解析頁面並把找到的項目寫入 `sheet`，項目名稱必須完全相同
    pub fn parse(&self, html: &str, sheet: &mut MetricSheet) {
        let document = Html::parse_document(html);
        let categories = self.categories();

        match self {
            WisePage::Summary => {
                for table in document.select(&SUMMARY_TABLES) {
                    for tr in table.select(&ROWS) {
                        let Some(th) = tr.select(&TH).next() else {
                            continue;
                        };
                        let category = element::inner_text(&th).replace("(배)", "");
                        let Some(field) = categories.iter().find(|f| f.category == category.trim())
                        else {
                            continue;
                        };

                        let cells = element::cell_texts(&tr);
                        if field.metric == Metric::MarketCap {
                            let value = cells.first().and_then(|c| text::parse_digits(c).ok());
                            sheet.set(field.metric, Period::Current, value);
                        } else {
                            record_periods(sheet, field.metric, &cells, &SUMMARY_POSITIONS);
                        }
                    }
                }
            }
            _ => {
                for table in document.select(&FINANCIAL_TABLES) {
                    for tr in table.select(&ROWS) {
                        // 項目名稱只出現在第一個 td 裡的 span
                        let label = tr.select(&TD).next();
                        let Some(span) = label.and_then(|td| td.select(&SPAN).next()) else {
                            continue;
                        };
                        let category = element::inner_text(&span).replace("펼치기", "");
                        let Some(field) = categories.iter().find(|f| f.category == category.trim())
                        else {
                            continue;
                        };

                        let cells = element::cell_texts(&tr);
                        record_periods(sheet, field.metric, &cells, &FINANCIAL_POSITIONS);
                    }
                }
            }
        }
    }
}

/// 依序抓取四個頁面，單一頁面失敗只記錄錯誤，已取得的指標保留
pub async fn scrape(pages: &dyn PageSource, symbol: &str) -> MetricSheet {
    let mut sheet = MetricSheet::new();

    for page in WisePage::ALL {
        let request = page.request(symbol);
        match pages.fetch(&request).await {
            Ok(html) => page.parse(&html, &mut sheet),
            Err(why) => {
                logging::warn_file_async(format!(
                    "Failed to fetch {:?} of {} because {:?}",
                    page, symbol, why
                ));
            }
        }
    }

    if sheet.is_empty() {
        logging::warn_file_async(format!("No WiseReport metrics found for {}", symbol));
    }

    sheet
}
