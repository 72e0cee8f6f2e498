use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    declare::{EtfSelector, StockSelector},
    listing::{
        ratio::{Metric, MetricSheet, Period},
        FinancialSchema, Table,
    },
    logging,
    util::{http, text},
};

/// 英為財情
pub mod investing;
/// 韓國交易所 (KRX、KIND) 與 WiseReport 財報
pub mod krx;
/// Naver 證券與 choicestock 財報
pub mod naver;

/// 一個清單來源
///
/// `columns` 與 `read` 回傳的表格欄位完全一致；有附加財務指標的來源另外實作
/// `all_columns` 與 `read_all`。
#[async_trait]
pub trait ListingReader: Send + Sync {
    fn columns(&self) -> Vec<String>;

    async fn read(&self) -> Result<Table>;

    fn all_columns(&self) -> Vec<String> {
        self.columns()
    }

    async fn read_all(&self) -> Result<Table> {
        self.read().await
    }
}

/// 取得頁面原始碼的請求，`clicks` 是頁面載入後要依序點擊的元素 id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub clicks: Vec<&'static str>,
}

impl PageRequest {
    pub fn new(url: String) -> Self {
        PageRequest {
            url,
            clicks: Vec::new(),
        }
    }

    pub fn click(mut self, id: &'static str) -> Self {
        self.clicks.push(id);
        self
    }
}

/// 回傳頁面原始碼的來源
///
/// 需要執行 JavaScript 或點擊分頁的網站可以接上無頭瀏覽器實作；預設只用 HTTP GET。
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, request: &PageRequest) -> Result<String>;
}

/// 以 HTTP GET 取得頁面，忽略點擊動作
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpPageSource;

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, request: &PageRequest) -> Result<String> {
        if !request.clicks.is_empty() {
            logging::debug_file_async(format!(
                "HttpPageSource skips clicks {:?} on {}",
                request.clicks, request.url
            ));
        }

        http::get(&request.url, None).await
    }
}

pub fn default_page_source() -> Arc<dyn PageSource> {
    Arc::new(HttpPageSource)
}

/// 將一列儲存格中指定位置的數值寫入指標的各時間點，無法解析的儲存格記為缺值
pub(crate) fn record_periods(
    sheet: &mut MetricSheet,
    metric: Metric,
    cells: &[String],
    positions: &[(Period, usize)],
) {
    for (period, index) in positions {
        let value = cells
            .get(*index)
            .and_then(|cell| text::parse_f64(cell, None).ok());
        sheet.set(metric, *period, value);
    }
}

/// 基本清單每一列依序接上對應的財務指標列，最後四捨五入到 `digits` 位
///
/// `sheets` 與 `base` 的列一一對應，少於列數時其餘列的指標依缺值策略處理。
pub fn attach_metrics(
    base: &Table,
    columns: Vec<String>,
    schema: &FinancialSchema,
    sheets: &[MetricSheet],
    digits: u32,
) -> Table {
    let empty = MetricSheet::new();
    let mut table = Table::new(columns);

    for (index, row) in base.rows().iter().enumerate() {
        let sheet = sheets.get(index).unwrap_or(&empty);
        let mut out = row.clone();
        out.extend(schema.row(sheet));
        table.push_row(out);
    }

    table.round(digits);
    table
}

/// 依選擇器建立股票清單來源
pub fn stock_reader(selector: &str) -> Result<Box<dyn ListingReader>> {
    let reader: Box<dyn ListingReader> = match StockSelector::parse(selector)? {
        StockSelector::Krx(market) => Box::new(krx::listing::KrxStockListing::new(market)),
        StockSelector::KrxDelisting => Box::new(krx::delisting::KrxDelisting),
        StockSelector::KrxMarcap => Box::new(krx::marcap::KrxMarcapListing),
        StockSelector::KrxAdministrative => Box::new(krx::administrative::KrxAdministrative),
        StockSelector::Naver(exchange) => {
            Box::new(naver::listing::NaverStockListing::new(exchange))
        }
    };

    Ok(reader)
}

/// 依選擇器讀取股票清單，`all` 為真時附加財務指標
pub async fn stock_listing(selector: &str, all: bool) -> Result<Table> {
    let reader = stock_reader(selector)?;
    logging::info_file_async(format!("stock_listing({}, all={}) start", selector, all));

    let table = if all {
        reader.read_all().await?
    } else {
        reader.read().await?
    };

    logging::info_file_async(format!(
        "stock_listing({}, all={}) {} rows",
        selector,
        all,
        table.len()
    ));

    Ok(table)
}

pub fn etf_reader(country: &str) -> Result<Box<dyn ListingReader>> {
    let reader: Box<dyn ListingReader> = match EtfSelector::parse(country)? {
        EtfSelector::Kr => Box::new(naver::etf::NaverEtfListing),
        EtfSelector::Investing(country) => Box::new(investing::etf::InvestingEtfListing::new(country)),
    };

    Ok(reader)
}

/// 依國家讀取 ETF 清單
pub async fn etf_listing(country: &str) -> Result<Table> {
    let reader = etf_reader(country)?;
    let table = reader.read().await?;
    logging::info_file_async(format!("etf_listing({}) {} rows", country, table.len()));

    Ok(table)
}
