use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::{
    crawler::ListingReader,
    error::ListingError,
    listing::{FieldDef, Schema, Table},
    util::{http, json},
};

const URL: &str = "https://finance.naver.com/api/sise/etfItemList.nhn";

static SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(&[
        FieldDef::keep("itemcode", "Symbol"),
        FieldDef::keep("itemname", "Name"),
    ])
    .unwrap_or_else(|why| panic!("invalid naver etf schema: {}", why))
});

/// Naver 證券的韓國 ETF 清單
pub struct NaverEtfListing;

pub fn parse(json: &serde_json::Value) -> Result<Table> {
    let rows = json::records(json, &["result", "etfItemList"]).ok_or_else(|| {
        ListingError::Schema("etf response has no result.etfItemList".to_string())
    })?;

    if let Some(first) = rows.first() {
        SCHEMA.ensure_sources(first.keys().map(String::as_str))?;
    }

    Ok(SCHEMA.map_rows(&rows))
}

#[async_trait]
impl ListingReader for NaverEtfListing {
    fn columns(&self) -> Vec<String> {
        SCHEMA.columns()
    }

    async fn read(&self) -> Result<Table> {
        parse(&http::get_json_with_status(URL, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::{listing::Value, logging};

    use super::*;

    #[test]
    fn test_parse() {
        let json = serde_json::json!({
            "resultCode": "success",
            "result": {"etfItemList": [
                {"itemcode": "069500", "etfTabCode": 1, "itemname": "KODEX 200", "nowVal": 35120,
                 "risefall": "2", "changeVal": 120, "changeRate": 0.34, "nav": 35150.0,
                 "threeMonthEarnRate": 5.1, "quant": 4123456, "amonut": 145000, "marketSum": 61000},
                {"itemcode": "0080G0", "etfTabCode": 4, "itemname": "KODEX 방산TOP10"}
            ]}
        });

        let table = parse(&json).unwrap();
        assert_eq!(table.columns(), ["Symbol", "Name"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "Symbol"), Some(&Value::from("069500")));
        assert_eq!(table.get(1, "Symbol"), Some(&Value::from("0080G0")));
        assert_eq!(table.get(1, "Name"), Some(&Value::from("KODEX 방산TOP10")));
    }

    #[test]
    fn test_parse_without_list() {
        assert!(parse(&serde_json::json!({"resultCode": "fail"})).is_err());
    }

    #[tokio::test]
    #[ignore]
    async fn test_read() {
        dotenv::dotenv().ok();
        match NaverEtfListing.read().await {
            Ok(table) => logging::debug_file_async(format!("rows: {}", table.len())),
            Err(why) => logging::debug_file_async(format!("Failed to read because {:?}", why)),
        }
    }
}
