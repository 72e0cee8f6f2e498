use serde_json::Value as Json;

use crate::listing::{RawRow, Value};

/// 將巢狀 JSON 物件攤平成以 `.` 連接鍵名的原始列
///
/// `{"industryCodeType": {"code": "57"}}` => `{"industryCodeType.code": "57"}`
pub fn flatten(object: &Json) -> RawRow {
    let mut row = RawRow::new();
    if let Json::Object(map) = object {
        for (key, value) in map {
            flatten_into(key, value, &mut row);
        }
    }

    row
}

fn flatten_into(prefix: &str, value: &Json, row: &mut RawRow) {
    match value {
        Json::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                flatten_into(&format!("{}.{}", prefix, key), nested, row);
            }
        }
        other => {
            row.insert(prefix.to_string(), Value::from_json(other));
        }
    }
}

/// 取出 `path` 指向的陣列並攤平每個元素，路徑不存在時回傳 `None`
pub fn records(root: &Json, path: &[&str]) -> Option<Vec<RawRow>> {
    let mut node = root;
    for key in path {
        node = node.get(key)?;
    }

    node.as_array()
        .map(|items| items.iter().map(flatten).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_nested() {
        let json: Json = serde_json::from_str(
            r#"{"symbolCode":"AAPL","stockNameEng":"Apple Inc","industryCodeType":{"code":"57","industryGroupKor":"하드웨어"},"marketValue":null}"#,
        )
        .unwrap();

        let row = flatten(&json);
        assert_eq!(row.get("symbolCode"), Some(&Value::from("AAPL")));
        assert_eq!(row.get("industryCodeType.code"), Some(&Value::from("57")));
        assert_eq!(
            row.get("industryCodeType.industryGroupKor"),
            Some(&Value::from("하드웨어"))
        );
        assert_eq!(row.get("marketValue"), Some(&Value::Null));
        assert!(!row.contains_key("industryCodeType"));
    }

    #[test]
    fn test_records() {
        let json: Json = serde_json::from_str(
            r#"{"result":{"etfItemList":[{"itemcode":"069500"},{"itemcode":"102110"}]}}"#,
        )
        .unwrap();

        let rows = records(&json, &["result", "etfItemList"]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("itemcode"), Some(&Value::from("102110")));
        assert!(records(&json, &["result", "missing"]).is_none());
    }
}
