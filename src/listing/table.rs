use std::cmp::Ordering;

use serde::Serialize;

use crate::{error::ListingError, listing::Value};

/// 依序排列的欄位與資料列
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 新增一列，長度不足補 `Null`，過長則截斷
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }

    pub fn column_values(&self, column: &str) -> Result<Vec<&Value>, ListingError> {
        let index = self.require_column(column)?;
        Ok(self.rows.iter().map(|r| &r[index]).collect())
    }

    fn require_column(&self, column: &str) -> Result<usize, ListingError> {
        self.column_index(column)
            .ok_or_else(|| ListingError::Schema(format!("unknown column '{}'", column)))
    }

    /// 依抓取順序串接多個分頁或個股的結果，每個表格的欄位必須一致
    pub fn concat(columns: Vec<String>, tables: Vec<Table>) -> Result<Table, ListingError> {
        let mut merged = Table::new(columns);
        for table in tables {
            if table.columns != merged.columns {
                return Err(ListingError::Schema(format!(
                    "cannot concat columns {:?} into {:?}",
                    table.columns, merged.columns
                )));
            }

            merged.rows.extend(table.rows);
        }

        Ok(merged)
    }

    /// 僅保留 `column` 的值屬於 `allowed` 的列
    pub fn filter_in(&self, column: &str, allowed: &[&str]) -> Result<Table, ListingError> {
        let index = self.require_column(column)?;
        let rows = self
            .rows
            .iter()
            .filter(|r| allowed.iter().any(|a| r[index].as_str() == Some(*a)))
            .cloned()
            .collect();

        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// 以 `key` 欄位左合併，右表除鍵以外的欄位附加在後
    ///
    /// 右表有多筆相符時每筆各產生一列，沒有相符時補 `Null`。
    pub fn left_join(&self, right: &Table, key: &str) -> Result<Table, ListingError> {
        let left_key = self.require_column(key)?;
        let right_key = right.require_column(key)?;
        let right_columns: Vec<usize> = (0..right.columns.len())
            .filter(|i| *i != right_key)
            .collect();

        let mut columns = self.columns.clone();
        columns.extend(right_columns.iter().map(|i| right.columns[*i].clone()));

        let mut index: hashbrown::HashMap<String, Vec<usize>> =
            hashbrown::HashMap::with_capacity(right.rows.len());
        for (i, row) in right.rows.iter().enumerate() {
            index.entry(row[right_key].to_string()).or_default().push(i);
        }

        let mut joined = Table::new(columns);
        for row in &self.rows {
            let matches = index
                .get(&row[left_key].to_string())
                .filter(|_| !row[left_key].is_null());

            match matches {
                Some(found) => {
                    for i in found {
                        let mut merged = row.clone();
                        merged.extend(right_columns.iter().map(|c| right.rows[*i][*c].clone()));
                        joined.rows.push(merged);
                    }
                }
                None => joined.push_row(row.clone()),
            }
        }

        Ok(joined)
    }

    /// 依指定順序取出欄位
    pub fn select(&self, names: &[&str]) -> Result<Table, ListingError> {
        let indexes = names
            .iter()
            .map(|n| self.require_column(n))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Table {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| indexes.iter().map(|i| r[*i].clone()).collect())
                .collect(),
        })
    }

    /// 數值由大到小排序，非數值排在最後，順序相同時維持原順序
    pub fn sort_by_number_desc(&mut self, column: &str) -> Result<(), ListingError> {
        let index = self.require_column(column)?;
        self.rows.sort_by(|a, b| match (a[index].as_f64(), b[index].as_f64()) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        Ok(())
    }

    /// 對單一欄位的每個儲存格套用轉換
    pub fn map_column<F>(&mut self, column: &str, f: F) -> Result<(), ListingError>
    where
        F: Fn(&Value) -> Value,
    {
        let index = self.require_column(column)?;
        for row in self.rows.iter_mut() {
            row[index] = f(&row[index]);
        }

        Ok(())
    }

    /// 所有數值四捨五入到 `digits` 位，剛好一半時取偶數
    pub fn round(&mut self, digits: u32) {
        let scale = 10f64.powi(i32::try_from(digits).unwrap_or(i32::MAX));
        for value in self.rows.iter_mut().flatten() {
            if let Value::Number(n) = value {
                if n.is_finite() {
                    let rounded = (*n * scale).round_ties_even() / scale;
                    if rounded.is_finite() {
                        *n = rounded;
                    }
                }
            }
        }
    }
}
