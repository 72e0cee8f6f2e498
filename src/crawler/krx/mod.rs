use anyhow::Result;

use crate::util::http;

/// 管理股票指定清單
pub mod administrative;
/// 下市股票
pub mod delisting;
/// WiseReport 公司財務指標
pub mod finance;
/// 上市公司清單
pub mod listing;
/// 全部股票市值
pub mod marcap;

/// KRX 資訊資料系統的 JSON 入口
const DATA_JSON_URL: &str = "http://data.krx.co.kr/comm/bldAttendant/getJsonData.cmd";

/// KIND 上市公司目錄
const KIND_HOST: &str = "kind.krx.co.kr";

/// 以表單 POST 到 KRX 資訊資料系統
async fn post_data_json(
    params: &[(&str, &str)],
    headers: Option<reqwest::header::HeaderMap>,
) -> Result<serde_json::Value> {
    http::post_form_json(DATA_JSON_URL, headers, params).await
}
