use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::{
    config::SETTINGS,
    crawler::{attach_metrics, default_page_source, naver::choicestock, ListingReader, PageSource},
    declare::NaverExchange,
    listing::{FieldDef, RawRow, Schema, Table},
    logging,
    util::{http, json},
};

static SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(&[
        FieldDef::keep("symbolCode", "Symbol"),
        FieldDef::keep("stockNameEng", "Name"),
        FieldDef::keep("industryCodeType.industryGroupKor", "Industry"),
        FieldDef::keep("industryCodeType.code", "IndustryCode"),
    ])
    .unwrap_or_else(|why| panic!("invalid naver schema: {}", why))
});

/// Naver 證券的海外交易所個股清單，依市值排序分頁
pub struct NaverStockListing {
    exchange: NaverExchange,
    pages: Arc<dyn PageSource>,
}

impl NaverStockListing {
    pub fn new(exchange: NaverExchange) -> Self {
        Self::with_page_source(exchange, default_page_source())
    }

    pub fn with_page_source(exchange: NaverExchange, pages: Arc<dyn PageSource>) -> Self {
        NaverStockListing { exchange, pages }
    }

    fn page_url(&self, page: u32) -> String {
        format!(
            "http://api.stock.naver.com/stock/exchange/{}/marketValue?page={}&pageSize={}",
            self.exchange.api_name(),
            page,
            SETTINGS.listing.naver_page_size
        )
    }

    /// 取得一頁並轉成標準欄位，空頁回傳 `None`
    async fn visit_page(&self, page: u32) -> Result<Option<Table>> {
        let headers = http::header_map(&[("user-agent", "Mozilla/5.0")])?;
        let json = http::get_json_with_status(&self.page_url(page), Some(headers)).await?;
        let rows = parse_page(&json);
        if rows.is_empty() {
            return Ok(None);
        }

        logging::info_file_async(format!(
            "Naver {} page {} has {} stocks",
            self.exchange,
            page,
            rows.len()
        ));

        map_page(&rows).map(Some)
    }
}

/// 巢狀物件以點號展開，例如 `industryCodeType.code`
pub fn parse_page(json: &serde_json::Value) -> Vec<RawRow> {
    json::records(json, &["stocks"]).unwrap_or_default()
}

/// 一頁的原始列轉成標準欄位；來源欄位以整頁出現過的鍵為準
pub fn map_page(rows: &[RawRow]) -> Result<Table> {
    let mut available: Vec<&str> = rows
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .collect();
    available.sort_unstable();
    available.dedup();

    SCHEMA.ensure_sources(available)?;
    Ok(SCHEMA.map_rows(rows))
}

#[async_trait]
impl ListingReader for NaverStockListing {
    fn columns(&self) -> Vec<String> {
        SCHEMA.columns()
    }

    async fn read(&self) -> Result<Table> {
        let mut tables = Vec::new();
        for page in 1..=SETTINGS.listing.naver_max_pages {
            match self.visit_page(page).await? {
                Some(table) => tables.push(table),
                None => break,
            }
        }

        Ok(Table::concat(self.columns(), tables)?)
    }

    fn all_columns(&self) -> Vec<String> {
        let financial = choicestock::schema(SETTINGS.listing.missing_value)
            .map(|s| s.columns())
            .unwrap_or_default();

        self.columns().into_iter().chain(financial).collect()
    }

    /// 每一頁抓完個股指標後先計算、四捨五入，再合併所有頁面
    async fn read_all(&self) -> Result<Table> {
        let schema = choicestock::schema(SETTINGS.listing.missing_value)?;
        let columns = self.all_columns();

        let mut tables = Vec::new();
        for page in 1..=SETTINGS.listing.naver_max_pages {
            let Some(base) = self.visit_page(page).await? else {
                break;
            };

            let mut sheets = Vec::with_capacity(base.len());
            for row in base.rows() {
                sheets.push(choicestock::scrape(self.pages.as_ref(), &row[0].to_string()).await);
            }

            let table = attach_metrics(
                &base,
                columns.clone(),
                &schema,
                &sheets,
                SETTINGS.listing.round_digits,
            );
            tables.push(table);
        }

        Ok(Table::concat(columns, tables)?)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::{crawler::PageRequest, error::ListingError, listing::Value};

    use super::*;

    fn page_json() -> serde_json::Value {
        serde_json::json!({
            "totalCount": 2,
            "stocks": [
                {"symbolCode": "AAPL", "stockNameEng": "Apple Inc", "reutersCode": "AAPL.O",
                 "industryCodeType": {"code": "57201020", "industryGroupKor": "컴퓨터 하드웨어"}},
                {"symbolCode": "MSFT", "stockNameEng": "Microsoft Corp",
                 "industryCodeType": {"code": "57201030", "industryGroupKor": "소프트웨어"}}
            ]
        })
    }

    #[test]
    fn test_parse_page() {
        let rows = parse_page(&page_json());
        let table = map_page(&rows).unwrap();

        assert_eq!(table.columns(), ["Symbol", "Name", "Industry", "IndustryCode"]);
        assert_eq!(table.get(0, "Symbol"), Some(&Value::from("AAPL")));
        assert_eq!(table.get(1, "Industry"), Some(&Value::from("소프트웨어")));
        assert_eq!(table.get(1, "IndustryCode"), Some(&Value::from("57201030")));
    }

    #[test]
    fn test_empty_page() {
        assert!(parse_page(&serde_json::json!({"totalCount": 0, "stocks": []})).is_empty());
        assert!(parse_page(&serde_json::json!({})).is_empty());
    }

    #[test]
    fn test_missing_source_field() {
        let rows = parse_page(&serde_json::json!({"stocks": [{"symbolCode": "AAPL"}]}));
        let err = map_page(&rows).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ListingError>(),
            Some(ListingError::Schema(_))
        ));
    }

    #[test]
    fn test_page_url() {
        let reader = NaverStockListing::new(NaverExchange::Hkex);
        let url = reader.page_url(3);
        assert!(url.starts_with(
            "http://api.stock.naver.com/stock/exchange/HONG_KONG/marketValue?page=3&pageSize="
        ));
    }

    #[test]
    fn test_all_columns() {
        let columns = NaverStockListing::new(NaverExchange::Nasdaq).all_columns();
        assert_eq!(&columns[..4], ["Symbol", "Name", "Industry", "IndustryCode"]);
        assert_eq!(columns[4], "시가총액_0");
        assert_eq!(columns[7], "PSR_0");
        assert_eq!(columns.last().map(String::as_str), Some("PFCR_0"));
        assert_eq!(columns.len(), 4 + 20);
    }

    struct NoPages;

    #[async_trait]
    impl PageSource for NoPages {
        async fn fetch(&self, request: &PageRequest) -> Result<String> {
            Err(anyhow::anyhow!("offline: {}", request.url))
        }
    }

    /// 抓不到頁面時指標依缺值策略補零，計算結果仍是有限值
    #[tokio::test]
    async fn test_metrics_when_pages_fail() {
        let schema = choicestock::schema(crate::listing::ratio::MissingValue::ZeroFill).unwrap();
        let sheet = choicestock::scrape(&NoPages, "AAPL").await;
        let row = schema.row(&sheet);

        assert_eq!(row.len(), 20);
        assert!(row.iter().all(|v| v.as_f64().is_some_and(f64::is_finite)));
    }

    #[tokio::test]
    async fn test_page_with_metrics_matches_all_columns() {
        let reader = NaverStockListing::with_page_source(NaverExchange::Nasdaq, Arc::new(NoPages));
        let schema = choicestock::schema(crate::listing::ratio::MissingValue::ZeroFill).unwrap();
        let base = map_page(&parse_page(&page_json())).unwrap();

        let mut sheets = Vec::new();
        for row in base.rows() {
            sheets.push(choicestock::scrape(reader.pages.as_ref(), &row[0].to_string()).await);
        }

        let page = attach_metrics(&base, reader.all_columns(), &schema, &sheets, 3);
        let table = Table::concat(reader.all_columns(), vec![page.clone(), page]).unwrap();

        assert_eq!(table.columns(), reader.all_columns().as_slice());
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(3, "Symbol"), Some(&Value::from("MSFT")));
        assert_eq!(table.get(0, "PSR_0"), Some(&Value::Number(0.0)));
    }

    #[tokio::test]
    #[ignore]
    async fn test_read() {
        dotenv::dotenv().ok();
        match NaverStockListing::new(NaverExchange::Hose).read().await {
            Ok(table) => logging::debug_file_async(format!("rows: {}", table.len())),
            Err(why) => logging::debug_file_async(format!("Failed to read because {:?}", why)),
        }
    }
}
