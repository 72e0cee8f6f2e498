use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use concat_string::concat_string;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};

use crate::{
    config::{self, SETTINGS},
    crawler::ListingReader,
    declare::InvestingCountry,
    error::ListingError,
    listing::{Table, Value},
    logging,
    util::http::{self, element},
};

const HOST: &str = "kr.investing.com";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh) AppleWebKit/537.36 Chrome/98.0.4758.109";

const COLUMNS: [&str; 2] = ["Symbol", "Name"];

/// 依序嘗試的表格，新版頁面是 `#etfs`，舊版是 `#cr_etf`
static TABLES: Lazy<[Selector; 2]> = Lazy::new(|| {
    ["table#etfs", "table#cr_etf"].map(|css| {
        Selector::parse(css).unwrap_or_else(|why| panic!("invalid selector {}: {:?}", css, why))
    })
});

static BODY_ROWS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("tbody tr").unwrap_or_else(|why| panic!("invalid row selector: {:?}", why))
});

/// 英為財情的 ETF 清單
pub struct InvestingEtfListing {
    country: InvestingCountry,
}

impl InvestingEtfListing {
    pub fn new(country: InvestingCountry) -> Self {
        InvestingEtfListing { country }
    }

    pub fn url(&self) -> String {
        concat_string!(
            "https://",
            HOST,
            "/etfs/",
            self.country.slug(),
            "-etfs",
            self.country.query()
        )
    }

    async fn visit(&self) -> Result<Table> {
        let url = self.url();
        let headers = http::header_map(&[("User-Agent", USER_AGENT)])?;
        let html = http::get(&url, Some(headers)).await?;
        parse(&url, &html)
    }
}

/// 含第一次請求在內最多抓取 `attempts` 次，兩次之間以指數退避加上抖動等待
pub(crate) fn backoff(retry: &config::Retry) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2)
        .factor((retry.base_delay_ms / 2).max(1))
        .max_delay(Duration::from_millis(retry.max_delay_ms))
        .map(jitter)
        .take(retry.attempts.saturating_sub(1))
}

/// 第二格是名稱、第三格是代號，儲存格不足的列略過
pub fn parse(url: &str, html: &str) -> Result<Table> {
    let document = Html::parse_document(html);
    let table = TABLES
        .iter()
        .find_map(|selector| document.select(selector).next())
        .ok_or_else(|| ListingError::TableNotFound {
            url: url.to_string(),
        })?;

    let mut result = Table::new(COLUMNS.iter().map(|c| c.to_string()).collect());
    for tr in table.select(&BODY_ROWS) {
        let cells = element::cell_texts(&tr);
        if cells.len() < 3 {
            continue;
        }

        result.push_row(vec![Value::from(cells[2].as_str()), Value::from(cells[1].as_str())]);
    }

    Ok(result)
}

#[async_trait]
impl ListingReader for InvestingEtfListing {
    fn columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn read(&self) -> Result<Table> {
        self.visit().await
    }

    /// 頁面偶爾沒有表格，依設定的次數以指數退避重試
    async fn read_all(&self) -> Result<Table> {
        let retry = &SETTINGS.retry;
        Retry::spawn(backoff(retry), || self.visit())
            .await
            .map_err(|why| {
                logging::error_file_async(format!(
                    "Failed to read {} after {} attempts because {:?}",
                    self.url(),
                    retry.attempts,
                    why
                ));
                why
            })
    }
}
