use std::collections::HashSet;

use crate::{
    error::ListingError,
    listing::{RawRow, Table, Value},
};

/// 一個來源欄位與其標準欄位名稱
///
/// `canonical` 為 `None` 表示該欄位只在內部使用（例如加總前的借款細項），不出現在輸出。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub source: &'static str,
    pub canonical: Option<&'static str>,
}

impl FieldDef {
    pub const fn keep(source: &'static str, canonical: &'static str) -> Self {
        FieldDef {
            source,
            canonical: Some(canonical),
        }
    }

    pub const fn internal(source: &'static str) -> Self {
        FieldDef {
            source,
            canonical: None,
        }
    }
}

/// 有順序的欄位對照表
///
/// 建立時就檢查重複的來源欄位與標準欄位，避免到了讀取時才默默少掉欄位。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldDef>,
}

impl Schema {
    pub fn new(fields: &[FieldDef]) -> Result<Self, ListingError> {
        if !fields.iter().any(|f| f.canonical.is_some()) {
            return Err(ListingError::Schema(
                "schema has no output column".to_string(),
            ));
        }

        let mut sources = HashSet::with_capacity(fields.len());
        let mut canonicals = HashSet::with_capacity(fields.len());
        for field in fields {
            if !sources.insert(field.source) {
                return Err(ListingError::Schema(format!(
                    "duplicate source field '{}'",
                    field.source
                )));
            }

            if let Some(canonical) = field.canonical {
                if !canonicals.insert(canonical) {
                    return Err(ListingError::Schema(format!(
                        "duplicate canonical field '{}'",
                        canonical
                    )));
                }
            }
        }

        Ok(Schema {
            fields: fields.to_vec(),
        })
    }

    /// 輸出欄位，依定義順序
    pub fn columns(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter_map(|f| f.canonical)
            .map(str::to_string)
            .collect()
    }

    /// 確認原始資料帶有對照表要求的每個來源欄位
    pub fn ensure_sources<'a, I>(&self, available: I) -> Result<(), ListingError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let available: HashSet<&str> = available.into_iter().collect();
        let missing: Vec<&str> = self
            .fields
            .iter()
            .map(|f| f.source)
            .filter(|source| !available.contains(source))
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(ListingError::Schema(format!(
            "missing source fields: {}",
            missing.join(", ")
        )))
    }

    /// 將一筆原始資料轉為標準欄位的列，未定義的欄位直接捨棄
    pub fn map_row(&self, raw: &RawRow) -> Vec<Value> {
        self.fields
            .iter()
            .filter(|f| f.canonical.is_some())
            .map(|f| raw.get(f.source).cloned().unwrap_or_default())
            .collect()
    }

    pub fn map_rows<'a, I>(&self, rows: I) -> Table
    where
        I: IntoIterator<Item = &'a RawRow>,
    {
        let mut table = Table::new(self.columns());
        for raw in rows {
            table.push_row(self.map_row(raw));
        }

        table
    }
}
