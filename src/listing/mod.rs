//! # 清單正規化
//!
//! 各資料來源的原始列（欄位名稱 → 文字或數值）在這裡被轉成固定欄位的表格。
//!
//! - `schema`：來源欄位到標準欄位的對照表（Field Mapper）
//! - `ratio`：成長率、GP/A、PSR、PFCR 等衍生指標（Ratio Calculator）
//! - `financial`：每個來源的財務指標欄位定義，串起對照與衍生指標
//! - `table`：分頁結果合併、市場過濾、排序與四捨五入（Table Assembler）

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

pub mod financial;
pub mod ratio;
pub mod schema;
pub mod table;

pub use financial::FinancialSchema;
pub use schema::{FieldDef, Schema};
pub use table::Table;

/// 一筆尚未正規化的原始資料，鍵為來源網站的欄位名稱
pub type RawRow = hashbrown::HashMap<String, Value>;

/// 表格中的單一儲存格
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 將 JSON 的純量轉為儲存格，物件與陣列保留其 JSON 文字
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Text(b.to_string()),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or_default(),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a":null,"b":1.5,"c":"x","d":true}"#).unwrap();
        assert_eq!(Value::from_json(&json["a"]), Value::Null);
        assert_eq!(Value::from_json(&json["b"]), Value::Number(1.5));
        assert_eq!(Value::from_json(&json["c"]), Value::from("x"));
        assert_eq!(Value::from_json(&json["d"]), Value::from("true"));
    }

    #[test]
    fn test_serialize_untagged() {
        let date = NaiveDate::from_ymd_opt(1975, 6, 11).unwrap();
        let row = vec![
            Value::from("005930"),
            Value::Number(1.25),
            Value::Null,
            Value::from(date),
        ];
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"["005930",1.25,null,"1975-06-11"]"#
        );
    }
}
