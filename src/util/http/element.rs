use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::listing::{RawRow, Value};

static TR: Lazy<Selector> = Lazy::new(|| selector("tr"));
static TH: Lazy<Selector> = Lazy::new(|| selector("th"));
static TD: Lazy<Selector> = Lazy::new(|| selector("td"));

/// 只用於程式內固定的選擇器字串
fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|why| panic!("invalid selector {}: {:?}", css, why))
}

/// Parses a CSS selector, turning the selector error into an `anyhow` error.
pub fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|why| anyhow!("Failed to Selector::parse({}) because: {:?}", css, why))
}

/// 元素內所有文字，去掉前後空白
pub fn inner_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// 一列中每個 `td` 的文字
pub fn cell_texts(row: &ElementRef) -> Vec<String> {
    row.select(&TD).map(|td| inner_text(&td)).collect()
}

/// 表格的所有列，略過 `thead` 內沒有 `td` 的列
pub fn body_rows<'a>(table: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    table
        .select(&TR)
        .filter(|tr| tr.select(&TD).next().is_some())
        .collect()
}

/// 將第一個含 `th` 的列視為表頭，其後每個含 `td` 的列轉成以表頭為鍵的原始列
///
/// 表頭與儲存格數量不一致時，多出來的儲存格捨棄，缺少的欄位不放入。
pub fn table_records(table: &ElementRef) -> Vec<RawRow> {
    let headers: Vec<String> = table
        .select(&TR)
        .find_map(|tr| {
            let ths: Vec<String> = tr.select(&TH).map(|th| inner_text(&th)).collect();
            (!ths.is_empty()).then_some(ths)
        })
        .unwrap_or_default();

    body_rows(table)
        .iter()
        .map(|tr| {
            headers
                .iter()
                .zip(cell_texts(tr))
                .map(|(h, cell)| (h.clone(), Value::Text(cell)))
                .collect()
        })
        .collect()
}

/// 解析整份文件並取出第一個符合 `css` 的表格
pub fn first_table_records(html: &str, css: &str) -> Result<Option<Vec<RawRow>>> {
    let document = Html::parse_document(html);
    let selector = parse_selector(css)?;
    Ok(document.select(&selector).next().map(|t| table_records(&t)))
}
