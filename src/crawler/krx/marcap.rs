use anyhow::{anyhow, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::{
    crawler::{
        krx::{delisting::to_number, post_data_json},
        ListingReader,
    },
    error::ListingError,
    listing::{FieldDef, RawRow, Schema, Table, Value},
    logging,
    util::{http, json},
};

/// 最近交易日的資源檔
const WORK_DATE_URL: &str = "http://data.krx.co.kr/comm/bldAttendant/executeForResourceBundle.cmd?baseName=krx.mdc.i18n.component&key=B128.bld";

static SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(&[
        FieldDef::keep("ISU_SRT_CD", "Code"),
        FieldDef::keep("ISU_ABBRV", "Name"),
        FieldDef::keep("MKT_NM", "Market"),
        FieldDef::keep("SECT_TP_NM", "Dept"),
        FieldDef::keep("TDD_CLSPRC", "Close"),
        FieldDef::keep("FLUC_TP_CD", "ChangeCode"),
        FieldDef::keep("CMPPREVDD_PRC", "Changes"),
        FieldDef::keep("FLUC_RT", "ChagesRatio"),
        FieldDef::keep("TDD_OPNPRC", "Open"),
        FieldDef::keep("TDD_HGPRC", "High"),
        FieldDef::keep("TDD_LWPRC", "Low"),
        FieldDef::keep("ACC_TRDVOL", "Volume"),
        FieldDef::keep("ACC_TRDVAL", "Amount"),
        FieldDef::keep("MKTCAP", "Marcap"),
        FieldDef::keep("LIST_SHRS", "Stocks"),
        FieldDef::keep("MKT_ID", "MarketId"),
    ])
    .unwrap_or_else(|why| panic!("invalid marcap schema: {}", why))
});

/// 轉為數值的欄位；`Close` 維持文字
const NUMBER_COLUMNS: [&str; 9] = [
    "Changes",
    "ChagesRatio",
    "Open",
    "High",
    "Low",
    "Volume",
    "Amount",
    "Marcap",
    "Stocks",
];

/// 最近交易日全部股票的市值，依市值由大到小排序
pub struct KrxMarcapListing;

impl KrxMarcapListing {
    async fn visit_work_date() -> Result<String> {
        let json = http::get_json_with_status(WORK_DATE_URL, None).await?;
        work_date(&json)
    }

    async fn visit(date: &str) -> Result<serde_json::Value> {
        let params = [
            ("bld", "dbms/MDC/STAT/standard/MDCSTAT01501"),
            ("mktId", "ALL"),
            ("trdDd", date),
            ("share", "1"),
            ("money", "1"),
            ("csvxls_isNo", "false"),
        ];

        post_data_json(&params, None).await
    }
}

pub fn work_date(json: &serde_json::Value) -> Result<String> {
    json.pointer("/result/output/0/max_work_dt")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("max_work_dt not found in {}", json))
}

/// 所有文字儲存格去掉逗號
fn strip_commas(row: &mut RawRow) {
    for value in row.values_mut() {
        if let Value::Text(s) = value {
            if s.contains(',') {
                *s = s.replace(',', "");
            }
        }
    }
}

pub fn parse(json: &serde_json::Value) -> Result<Table> {
    let mut rows = json::records(json, &["OutBlock_1"])
        .ok_or_else(|| ListingError::Schema("marcap response has no OutBlock_1".to_string()))?;

    if let Some(first) = rows.first() {
        SCHEMA.ensure_sources(first.keys().map(String::as_str))?;
    }

    rows.iter_mut().for_each(strip_commas);

    let mut table = SCHEMA.map_rows(&rows);
    for column in NUMBER_COLUMNS {
        table.map_column(column, to_number)?;
    }
    table.sort_by_number_desc("Marcap")?;

    Ok(table)
}

#[async_trait]
impl ListingReader for KrxMarcapListing {
    fn columns(&self) -> Vec<String> {
        SCHEMA.columns()
    }

    async fn read(&self) -> Result<Table> {
        let date = Self::visit_work_date().await?;
        logging::info_file_async(format!("KRX marcap work date {}", date));
        parse(&Self::visit(&date).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, name: &str, close: &str, marcap: &str) -> serde_json::Value {
        serde_json::json!({
            "ISU_SRT_CD": code, "ISU_CD": "KR7", "ISU_ABBRV": name, "MKT_NM": "KOSPI",
            "SECT_TP_NM": "", "TDD_CLSPRC": close, "FLUC_TP_CD": "1", "CMPPREVDD_PRC": "500",
            "FLUC_RT": "0.71", "TDD_OPNPRC": "70,000", "TDD_HGPRC": "71,000", "TDD_LWPRC": "69,500",
            "ACC_TRDVOL": "12,345,678", "ACC_TRDVAL": "-", "MKTCAP": marcap,
            "LIST_SHRS": "5,969,782,550", "MKT_ID": "STK"
        })
    }

    #[test]
    fn test_parse_sorted_by_marcap() {
        let json = serde_json::json!({
            "OutBlock_1": [
                row("000660", "SK하이닉스", "130,000", "94,640,000,000,000"),
                row("005930", "삼성전자", "70,500", "420,869,000,000,000"),
                row("999999", "A,B", "1", "-"),
            ]
        });

        let table = parse(&json).unwrap();
        assert_eq!(table.columns(), KrxMarcapListing.columns().as_slice());
        assert_eq!(table.get(0, "Code"), Some(&Value::from("005930")));
        assert_eq!(table.get(1, "Code"), Some(&Value::from("000660")));
        assert_eq!(table.get(2, "Marcap"), Some(&Value::Null));
        assert_eq!(table.get(0, "Close"), Some(&Value::from("70500")));
        assert_eq!(table.get(0, "Open"), Some(&Value::Number(70000.0)));
        assert_eq!(table.get(0, "Amount"), Some(&Value::Null));
        assert_eq!(table.get(2, "Name"), Some(&Value::from("AB")));
    }

    #[test]
    fn test_work_date() {
        let json = serde_json::json!({"result": {"output": [{"max_work_dt": "20260916"}]}});
        assert_eq!(work_date(&json).unwrap(), "20260916");
        assert!(work_date(&serde_json::json!({"result": {}})).is_err());
    }

    #[tokio::test]
    #[ignore]
    async fn test_read() {
        dotenv::dotenv().ok();
        match KrxMarcapListing.read().await {
            Ok(table) => logging::debug_file_async(format!("top: {:?}", table.rows().first())),
            Err(why) => logging::debug_file_async(format!("Failed to read because {:?}", why)),
        }
    }
}
