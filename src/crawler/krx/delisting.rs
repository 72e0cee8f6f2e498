use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::{
    crawler::{krx::post_data_json, ListingReader},
    error::ListingError,
    listing::{FieldDef, Schema, Table, Value},
    util::{datetime, http, json, text},
};

static SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(&[
        FieldDef::keep("ISU_CD", "Symbol"),
        FieldDef::keep("ISU_NM", "Name"),
        FieldDef::keep("MKT_NM", "Market"),
        FieldDef::keep("SECUGRP_NM", "SecuGroup"),
        FieldDef::keep("KIND_STKCERT_TP_NM", "Kind"),
        FieldDef::keep("LIST_DD", "ListingDate"),
        FieldDef::keep("DELIST_DD", "DelistingDate"),
        FieldDef::keep("DELIST_RSN_DSC", "Reason"),
        FieldDef::keep("ARRANTRD_MKTACT_ENFORCE_DD", "ArrantEnforceDate"),
        FieldDef::keep("ARRANTRD_END_DD", "ArrantEndDate"),
        FieldDef::keep("IDX_IND_NM", "Industry"),
        FieldDef::keep("PARVAL", "ParValue"),
        FieldDef::keep("LIST_SHRS", "ListingShares"),
        FieldDef::keep("TO_ISU_SRT_CD", "ToSymbol"),
        FieldDef::keep("TO_ISU_ABBRV", "ToName"),
    ])
    .unwrap_or_else(|why| panic!("invalid delisting schema: {}", why))
});

const DATE_COLUMNS: [&str; 4] = [
    "ListingDate",
    "DelistingDate",
    "ArrantEnforceDate",
    "ArrantEndDate",
];

const NUMBER_COLUMNS: [&str; 2] = ["ParValue", "ListingShares"];

/// 1990 年至今的下市股票
pub struct KrxDelisting;

impl KrxDelisting {
    async fn visit() -> Result<serde_json::Value> {
        let params = [
            ("bld", "dbms/MDC/STAT/issue/MDCSTAT23801"),
            ("mktId", "ALL"),
            ("isuCd", "ALL"),
            ("isuCd2", "ALL"),
            ("strtDd", "19900101"),
            ("endDd", "22001231"),
            ("share", "1"),
            ("csvxls_isNo", "true"),
        ];
        let headers = http::header_map(&[("User-Agent", "Chrome/78.0.3904.87 Safari/537.36")])?;

        post_data_json(&params, Some(headers)).await
    }
}

/// 將 `YYYY/MM/DD` 轉為日期，無法解析時為空值
fn to_date(value: &Value) -> Value {
    Value::from(datetime::parse_date_with(&value.to_string(), "%Y/%m/%d"))
}

/// 去掉千分位後轉為數值，無法解析時為空值
pub(crate) fn to_number(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(*n),
        other => Value::from(text::parse_f64(&other.to_string(), None).ok()),
    }
}

pub fn parse(json: &serde_json::Value) -> Result<Table> {
    let rows = json::records(json, &["output"])
        .ok_or_else(|| ListingError::Schema("delisting response has no output".to_string()))?;

    if let Some(first) = rows.first() {
        SCHEMA.ensure_sources(first.keys().map(String::as_str))?;
    }

    let mut table = SCHEMA.map_rows(&rows);
    for column in DATE_COLUMNS {
        table.map_column(column, to_date)?;
    }
    for column in NUMBER_COLUMNS {
        table.map_column(column, to_number)?;
    }

    Ok(table)
}

#[async_trait]
impl ListingReader for KrxDelisting {
    fn columns(&self) -> Vec<String> {
        SCHEMA.columns()
    }

    async fn read(&self) -> Result<Table> {
        parse(&Self::visit().await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::logging;

    use super::*;

    fn row(list_dd: &str, enforce_dd: &str, parval: &str) -> serde_json::Value {
        serde_json::json!({
            "ISU_CD": "000010", "ISU_NM": "조흥은행", "MKT_NM": "KOSPI", "SECUGRP_NM": "주권",
            "KIND_STKCERT_TP_NM": "보통주", "LIST_DD": list_dd, "DELIST_DD": "2003/09/01",
            "DELIST_RSN_DSC": "피흡수합병", "ARRANTRD_MKTACT_ENFORCE_DD": enforce_dd,
            "ARRANTRD_END_DD": "-", "IDX_IND_NM": "은행", "PARVAL": parval,
            "LIST_SHRS": "720,530,393", "TO_ISU_SRT_CD": "", "TO_ISU_ABBRV": ""
        })
    }

    #[test]
    fn test_parse() {
        let json = serde_json::json!({
            "output": [row("1956/03/03", "2003/08/20", "5,000"), row("-", "", "무액면")]
        });

        let table = parse(&json).unwrap();
        assert_eq!(table.columns(), KrxDelisting.columns().as_slice());
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get(0, "ListingDate"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(1956, 3, 3).unwrap()))
        );
        assert_eq!(table.get(0, "ArrantEndDate"), Some(&Value::Null));
        assert_eq!(table.get(0, "ParValue"), Some(&Value::Number(5000.0)));
        assert_eq!(table.get(0, "ListingShares"), Some(&Value::Number(720530393.0)));
        assert_eq!(table.get(1, "ListingDate"), Some(&Value::Null));
        assert_eq!(table.get(1, "ParValue"), Some(&Value::Null));
        assert_eq!(table.get(1, "Reason"), Some(&Value::from("피흡수합병")));
    }

    #[test]
    fn test_parse_without_output() {
        assert!(parse(&serde_json::json!({"OutBlock_1": []})).is_err());
    }

    #[tokio::test]
    #[ignore]
    async fn test_read() {
        dotenv::dotenv().ok();
        match KrxDelisting.read().await {
            Ok(table) => logging::debug_file_async(format!("rows: {}", table.len())),
            Err(why) => logging::debug_file_async(format!("Failed to read because {:?}", why)),
        }
    }
}
