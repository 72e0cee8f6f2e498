use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::{
    config::SETTINGS,
    crawler::{
        attach_metrics, default_page_source,
        krx::{finance, post_data_json, KIND_HOST},
        ListingReader, PageSource,
    },
    declare::KrxMarket,
    error::ListingError,
    listing::{ratio::MetricSheet, FieldDef, RawRow, Schema, Table, Value},
    logging,
    util::{datetime, http, http::element, json, text},
};

/// KIND 上市公司目錄的欄位
static KIND_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(&[
        FieldDef::keep("종목코드", "Symbol"),
        FieldDef::internal("회사명"),
        FieldDef::keep("업종", "Sector"),
        FieldDef::keep("주요제품", "Industry"),
        FieldDef::keep("상장일", "ListingDate"),
        FieldDef::keep("결산월", "SettleMonth"),
        FieldDef::keep("대표자명", "Representative"),
        FieldDef::keep("홈페이지", "HomePage"),
        FieldDef::keep("지역", "Region"),
    ])
    .unwrap_or_else(|why| panic!("invalid KIND schema: {}", why))
});

/// KRX 股票搜尋 (finder_stkisu) 的欄位
static FINDER_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(&[
        FieldDef::keep("short_code", "Symbol"),
        FieldDef::keep("marketEngName", "Market"),
        FieldDef::keep("codeName", "Name"),
        FieldDef::internal("full_code"),
    ])
    .unwrap_or_else(|why| panic!("invalid finder schema: {}", why))
});

const BASE_COLUMNS: [&str; 6] = ["Symbol", "Market", "Name", "Sector", "Industry", "ListingDate"];

/// 韓國上市公司清單
pub struct KrxStockListing {
    market: KrxMarket,
    pages: Arc<dyn PageSource>,
}

impl KrxStockListing {
    pub fn new(market: KrxMarket) -> Self {
        Self::with_page_source(market, default_page_source())
    }

    /// 指定抓取 WiseReport 頁面的方式，例如接上無頭瀏覽器
    pub fn with_page_source(market: KrxMarket, pages: Arc<dyn PageSource>) -> Self {
        KrxStockListing { market, pages }
    }

    async fn visit_kind() -> Result<Table> {
        let url = format!(
            "http://{}/corpgeneral/corpList.do?method=download&searchType=13",
            KIND_HOST
        );
        let html = http::get_use_euc_kr(&url, None).await?;
        parse_kind(&url, &html)
    }

    async fn visit_finder() -> Result<Table> {
        let json = post_data_json(&[("bld", "dbms/comm/finder/finder_stkisu")], None).await?;
        parse_finder(&json)
    }

    /// 股票搜尋結果左合併 KIND 目錄，再依市場過濾
    async fn visit(&self) -> Result<Table> {
        let finder = Self::visit_finder().await?;
        let kind = Self::visit_kind().await?;
        assemble(&finder, &kind, self.market)
    }
}

/// 解析 KIND 目錄：代號補零到 6 碼、上市日轉成日期
pub fn parse_kind(url: &str, html: &str) -> Result<Table> {
    let rows = element::first_table_records(html, "table")?.ok_or_else(|| {
        ListingError::TableNotFound {
            url: url.to_string(),
        }
    })?;

    mapped(&KIND_SCHEMA, &rows).and_then(|mut table| {
        table.map_column("Symbol", pad_symbol)?;
        table.map_column("ListingDate", |v| {
            Value::from(datetime::parse_date(&v.to_string()))
        })?;
        Ok(table)
    })
}

/// 數字代碼補零到 6 碼，空值維持空值
pub(crate) fn pad_symbol(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Number(n) => Value::from(text::zero_pad_symbol(&format!("{}", n.trunc()), 6)),
        other => Value::from(text::zero_pad_symbol(&other.to_string(), 6)),
    }
}

pub fn parse_finder(json: &serde_json::Value) -> Result<Table> {
    let rows = json::records(json, &["block1"])
        .ok_or_else(|| ListingError::Schema("finder response has no block1".to_string()))?;

    mapped(&FINDER_SCHEMA, &rows)
}

/// 第一筆資料必須帶齊對照表要求的欄位
fn mapped(schema: &Schema, rows: &[RawRow]) -> Result<Table> {
    if let Some(first) = rows.first() {
        schema.ensure_sources(first.keys().map(String::as_str))?;
    }

    Ok(schema.map_rows(rows))
}

pub fn assemble(finder: &Table, kind: &Table, market: KrxMarket) -> Result<Table> {
    let joined = finder
        .select(&["Symbol", "Market", "Name"])?
        .left_join(kind, "Symbol")?;

    Ok(match market.filter() {
        Some(m) => joined.filter_in("Market", &[m])?,
        None => joined,
    })
}

#[async_trait]
impl ListingReader for KrxStockListing {
    fn columns(&self) -> Vec<String> {
        ["Symbol", "Market", "Name"]
            .iter()
            .map(|c| c.to_string())
            .chain(
                KIND_SCHEMA
                    .columns()
                    .into_iter()
                    .filter(|c| c != "Symbol"),
            )
            .collect()
    }

    async fn read(&self) -> Result<Table> {
        self.visit().await
    }

    fn all_columns(&self) -> Vec<String> {
        let financial = finance::schema(SETTINGS.listing.missing_value)
            .map(|s| s.columns())
            .unwrap_or_default();

        BASE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(financial)
            .collect()
    }

    /// 上市日為空的標的不抓取財報，其指標依缺值策略處理
    async fn read_all(&self) -> Result<Table> {
        let schema = finance::schema(SETTINGS.listing.missing_value)?;
        let base = self.visit().await?.select(&BASE_COLUMNS)?;
        let total = base.len();

        let mut sheets = Vec::with_capacity(total);
        for (index, row) in base.rows().iter().enumerate() {
            let sheet = if row[5].is_null() {
                MetricSheet::new()
            } else {
                finance::scrape(self.pages.as_ref(), &row[0].to_string()).await
            };
            sheets.push(sheet);

            if (index + 1) % 100 == 0 {
                logging::info_file_async(format!("KRX read_all {}/{}", index + 1, total));
            }
        }

        Ok(attach_metrics(
            &base,
            self.all_columns(),
            &schema,
            &sheets,
            SETTINGS.listing.round_digits,
        ))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::{
        crawler::PageRequest,
        listing::ratio::MissingValue,
    };

    use super::*;

    const KIND_HTML: &str = r#"
        <table>
            <tr><th>회사명</th><th>종목코드</th><th>업종</th><th>주요제품</th><th>상장일</th>
                <th>결산월</th><th>대표자명</th><th>홈페이지</th><th>지역</th></tr>
            <tr><td>삼성전자</td><td>5930</td><td>통신 및 방송 장비 제조업</td><td>IM, CE</td>
                <td>1975-06-11</td><td>12월</td><td>한종희</td><td>http://www.samsung.com</td><td>경기도</td></tr>
            <tr><td>엔에이치스팩</td><td>481890</td><td>금융 지원 서비스업</td><td></td>
                <td></td><td>12월</td><td>홍길동</td><td></td><td>서울특별시</td></tr>
        </table>"#;

    fn finder_json() -> serde_json::Value {
        serde_json::json!({
            "block1": [
                {"full_code": "KR7005930003", "short_code": "005930", "codeName": "삼성전자",
                 "marketCode": "STK", "marketName": "유가증권", "marketEngName": "KOSPI", "ord1": "", "ord2": "1"},
                {"full_code": "KR7481890008", "short_code": "481890", "codeName": "엔에이치스팩",
                 "marketCode": "KSQ", "marketName": "코스닥", "marketEngName": "KOSDAQ", "ord1": "", "ord2": "1"},
                {"full_code": "KR7900000001", "short_code": "900000", "codeName": "NOTINKIND",
                 "marketCode": "KSQ", "marketName": "코스닥", "marketEngName": "KOSDAQ", "ord1": "", "ord2": "1"}
            ]
        })
    }

    #[test]
    fn test_parse_kind() {
        let table = parse_kind("http://kind", KIND_HTML).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "Symbol"), Some(&Value::from("005930")));
        assert_eq!(
            table.get(0, "ListingDate"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(1975, 6, 11).unwrap()))
        );
        assert_eq!(table.get(1, "ListingDate"), Some(&Value::Null));
        assert!(table.column_index("회사명").is_none());

        let missing = parse_kind("http://kind", "<p>no table</p>").unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<ListingError>(),
            Some(ListingError::TableNotFound { .. })
        ));
    }

    #[test]
    fn test_assemble_and_filter() {
        let finder = parse_finder(&finder_json()).unwrap();
        let kind = parse_kind("http://kind", KIND_HTML).unwrap();

        let all = assemble(&finder, &kind, KrxMarket::Krx).unwrap();
        let reader = KrxStockListing::new(KrxMarket::Krx);
        assert_eq!(all.columns(), reader.columns().as_slice());
        assert_eq!(all.len(), 3);
        assert_eq!(all.get(2, "Sector"), Some(&Value::Null));

        let kosdaq = assemble(&finder, &kind, KrxMarket::Kosdaq).unwrap();
        let expected = all
            .column_values("Market")
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == Some("KOSDAQ"))
            .count();
        assert_eq!(kosdaq.len(), expected);
        assert!(kosdaq
            .column_values("Market")
            .unwrap()
            .iter()
            .all(|m| m.as_str() == Some("KOSDAQ")));
    }

    #[test]
    fn test_pad_symbol() {
        assert_eq!(pad_symbol(&Value::Number(5930.0)), Value::from("005930"));
        assert_eq!(pad_symbol(&Value::from("5930")), Value::from("005930"));
        assert_eq!(pad_symbol(&Value::Null), Value::Null);
    }

    #[test]
    fn test_finder_missing_source_field() {
        let json = serde_json::json!({"block1": [{"short_code": "005930"}]});
        let err = parse_finder(&json).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ListingError>(),
            Some(ListingError::Schema(_))
        ));
    }

    /// 依網址回傳固定頁面
    struct FixturePages;

    #[async_trait]
    impl PageSource for FixturePages {
        async fn fetch(&self, request: &PageRequest) -> Result<String> {
            if request.clicks.contains(&"rpt_tab2") {
                return Ok(r#"<table class="gHead01 all-width data-list"><tbody>
                    <tr><td><span>자산총계</span></td><td>50</td><td>0</td><td>0</td><td>0</td><td>100</td></tr>
                    </tbody></table>"#
                    .to_string());
            }

            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_metrics_row_from_pages() {
        let schema = finance::schema(MissingValue::ZeroFill).unwrap();
        let sheet = finance::scrape(&FixturePages, "005930").await;
        let columns = schema.columns();
        let row = schema.row(&sheet);

        let total = columns.iter().position(|c| c == "총자산_0").unwrap();
        assert_eq!(row[total], Value::Number(100.0));

        let growth = columns.iter().position(|c| c == "자산성장률(년)").unwrap();
        assert!((row[growth].as_f64().unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_all_columns() {
        let reader = KrxStockListing::new(KrxMarket::Kospi);
        let columns = reader.all_columns();
        assert_eq!(&columns[..6], &BASE_COLUMNS);
        assert_eq!(columns[6], "시가총액_0");
        assert_eq!(columns.last().map(String::as_str), Some("PFCR_0"));
        assert_eq!(columns.len(), 6 + 21);
    }

    #[tokio::test]
    async fn test_read_all_rows_match_all_columns() {
        let reader = KrxStockListing::with_page_source(KrxMarket::Kospi, Arc::new(FixturePages));
        let schema = finance::schema(MissingValue::ZeroFill).unwrap();

        let mut base = Table::new(BASE_COLUMNS.iter().map(|c| c.to_string()).collect());
        base.push_row(vec![
            Value::from("005930"),
            Value::from("KOSPI"),
            Value::from("삼성전자"),
            Value::from("전기전자"),
            Value::from("반도체"),
            Value::Date(NaiveDate::from_ymd_opt(1975, 6, 11).unwrap()),
        ]);
        let sheets = vec![finance::scrape(reader.pages.as_ref(), "005930").await];

        let table = attach_metrics(&base, reader.all_columns(), &schema, &sheets, 3);
        assert_eq!(table.columns(), reader.all_columns().as_slice());
        assert_eq!(table.rows()[0].len(), 6 + 21);
        assert_eq!(table.get(0, "총자산_0"), Some(&Value::Number(100.0)));
        assert_eq!(table.get(0, "자산성장률(년)"), Some(&Value::Number(1.0)));
    }

    #[tokio::test]
    #[ignore]
    async fn test_read() {
        dotenv::dotenv().ok();
        logging::debug_file_async("開始 KrxStockListing::read".to_string());

        match KrxStockListing::new(KrxMarket::Konex).read().await {
            Ok(table) => {
                logging::debug_file_async(format!("rows: {}", table.len()));
            }
            Err(why) => {
                logging::debug_file_async(format!("Failed to read because {:?}", why));
            }
        }

        logging::debug_file_async("結束 KrxStockListing::read".to_string());
    }
}
