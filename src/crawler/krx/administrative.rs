use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::{
    crawler::{
        krx::{listing::pad_symbol, KIND_HOST},
        ListingReader,
    },
    error::ListingError,
    listing::{FieldDef, Schema, Table, Value},
    util::{datetime, http, http::element},
};

static SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(&[
        FieldDef::keep("종목코드", "Symbol"),
        FieldDef::keep("종목명", "Name"),
        FieldDef::keep("지정일", "DesignationDate"),
        FieldDef::keep("지정사유", "Reason"),
    ])
    .unwrap_or_else(|why| panic!("invalid administrative schema: {}", why))
});

/// 目前被指定為管理股票的清單
pub struct KrxAdministrative;

pub fn parse(url: &str, html: &str) -> Result<Table> {
    let rows = element::first_table_records(html, "table")?.ok_or_else(|| {
        ListingError::TableNotFound {
            url: url.to_string(),
        }
    })?;

    if let Some(first) = rows.first() {
        SCHEMA.ensure_sources(first.keys().map(String::as_str))?;
    }

    let mut table = SCHEMA.map_rows(&rows);
    table.map_column("Symbol", pad_symbol)?;
    table.map_column("DesignationDate", |v| {
        Value::from(datetime::parse_date(&v.to_string()))
    })?;

    Ok(table)
}

#[async_trait]
impl ListingReader for KrxAdministrative {
    fn columns(&self) -> Vec<String> {
        SCHEMA.columns()
    }

    async fn read(&self) -> Result<Table> {
        let url = format!(
            "http://{}/investwarn/adminissue.do?method=searchAdminIssueSub&currentPageSize=5000&forward=adminissue_down",
            KIND_HOST
        );
        let html = http::get_use_euc_kr(&url, None).await?;
        parse(&url, &html)
    }
}
