use thiserror::Error;

/// 呼叫端需要區分的清單讀取錯誤
#[derive(Debug, Error)]
pub enum ListingError {
    /// 不支援的市場、交易所或國家代碼
    #[error("{kind} \"{value}\" does not support. supported: {}", supported.join(", "))]
    UnsupportedSelector {
        kind: &'static str,
        value: String,
        supported: Vec<String>,
    },

    /// 頁面中找不到預期的資料表格，整個讀取中止
    #[error("StockListing Error! no listing table found at {url}")]
    TableNotFound { url: String },

    /// 上游回應無法解析為 JSON
    #[error("{status} \"{reason}\" Server response delayed. Retry later. ({url})")]
    Upstream {
        status: u16,
        reason: String,
        url: String,
    },

    /// 欄位對照表定義錯誤，或原始資料缺少對照表要求的欄位
    #[error("schema mismatch: {0}")]
    Schema(String),
}

impl ListingError {
    pub fn unsupported<I, S>(kind: &'static str, value: &str, supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        ListingError::UnsupportedSelector {
            kind,
            value: value.to_string(),
            supported: supported.into_iter().map(|s| s.to_string()).collect(),
        }
    }
}
