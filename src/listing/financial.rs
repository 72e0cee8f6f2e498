use std::collections::HashSet;

use crate::{
    error::ListingError,
    listing::{
        ratio::{Derived, Metric, MetricSheet, MissingValue, Period, RatioCalculator},
        FieldDef, Schema, Value,
    },
};

/// 網頁上的財務項目名稱與其對應指標
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricField {
    /// 網頁表格中的項目名稱，例如 "자산총계"
    pub category: &'static str,
    pub metric: Metric,
    /// 輸出欄位名稱（不含 `_0`），`None` 表示只參與計算
    pub label: Option<&'static str>,
}

impl MetricField {
    pub const fn new(category: &'static str, metric: Metric, label: &'static str) -> Self {
        MetricField {
            category,
            metric,
            label: Some(label),
        }
    }

    pub const fn internal(category: &'static str, metric: Metric) -> Self {
        MetricField {
            category,
            metric,
            label: None,
        }
    }
}

/// 一個來源的財務欄位定義：抓取的項目、輸出的指標欄位與衍生欄位
#[derive(Debug, Clone)]
pub struct FinancialSchema {
    fields: Vec<MetricField>,
    derived: Vec<Derived>,
    calculator: RatioCalculator,
}

impl FinancialSchema {
    pub fn new(
        fields: &[MetricField],
        derived: &[Derived],
        borrowings: &[Metric],
        policy: MissingValue,
    ) -> Result<Self, ListingError> {
        let defs: Vec<FieldDef> = fields
            .iter()
            .map(|f| FieldDef {
                source: f.category,
                canonical: f.label,
            })
            .collect();
        Schema::new(&defs)?;

        let mut metrics = HashSet::with_capacity(fields.len());
        for field in fields {
            if !metrics.insert(field.metric) {
                return Err(ListingError::Schema(format!(
                    "metric {} is mapped twice",
                    field.metric
                )));
            }
        }

        for d in derived {
            if let Some(missing) = d.inputs().iter().find(|m| !metrics.contains(*m)) {
                return Err(ListingError::Schema(format!(
                    "{} needs metric {} which is not scraped",
                    d.label(),
                    missing
                )));
            }

            if d.needs_borrowings() {
                if borrowings.is_empty() {
                    return Err(ListingError::Schema(format!(
                        "{} needs borrowing components",
                        d.label()
                    )));
                }

                if let Some(missing) = borrowings.iter().find(|m| !metrics.contains(*m)) {
                    return Err(ListingError::Schema(format!(
                        "borrowing component {} is not scraped",
                        missing
                    )));
                }
            }
        }

        let schema = FinancialSchema {
            fields: fields.to_vec(),
            derived: derived.to_vec(),
            calculator: RatioCalculator::new(borrowings, policy),
        };

        let columns = schema.columns();
        let unique: HashSet<&String> = columns.iter().collect();
        if unique.len() != columns.len() {
            return Err(ListingError::Schema(format!(
                "duplicate output columns in {:?}",
                columns
            )));
        }

        Ok(schema)
    }

    /// 輸出欄位：先是有名稱的指標 `_0`，再來是衍生欄位
    pub fn columns(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter_map(|f| f.label)
            .map(|label| format!("{}{}", label, Period::Current.suffix()))
            .chain(self.derived.iter().map(|d| d.label().to_string()))
            .collect()
    }

    /// 依欄位順序產生一列數值
    pub fn row(&self, sheet: &MetricSheet) -> Vec<Value> {
        self.fields
            .iter()
            .filter(|f| f.label.is_some())
            .map(|f| self.calculator.value(sheet, f.metric, Period::Current))
            .chain(self.derived.iter().map(|d| self.calculator.compute(*d, sheet)))
            .map(Value::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<MetricField> {
        vec![
            MetricField::new("시가총액", Metric::MarketCap, "시가총액"),
            MetricField::new("매출액", Metric::Revenue, "매출액"),
            MetricField::new("자산총계", Metric::TotalAssets, "총자산"),
            MetricField::internal("단기차입금", Metric::ShortTermBorrowings),
        ]
    }

    #[test]
    fn test_columns_and_row() {
        let schema = FinancialSchema::new(
            &fields(),
            &[Derived::AssetGrowthYear, Derived::Borrowings, Derived::Psr],
            &[Metric::ShortTermBorrowings],
            MissingValue::ZeroFill,
        )
        .unwrap();

        assert_eq!(
            schema.columns(),
            vec!["시가총액_0", "매출액_0", "총자산_0", "자산성장률(년)", "차입금_0", "PSR_0"]
        );

        let mut sheet = MetricSheet::new();
        sheet.set(Metric::MarketCap, Period::Current, Some(1000.0));
        sheet.set(Metric::Revenue, Period::Current, Some(250.0));
        sheet.set(Metric::TotalAssets, Period::Current, Some(100.0));
        sheet.set(Metric::TotalAssets, Period::YearAgo, Some(50.0));
        sheet.set(Metric::ShortTermBorrowings, Period::Current, Some(7.0));

        let row = schema.row(&sheet);
        assert_eq!(row[0], Value::Number(1000.0));
        assert!((row[3].as_f64().unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(row[4], Value::Number(7.0));
        assert!((row[5].as_f64().unwrap() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_propagate_leaves_nulls() {
        let schema = FinancialSchema::new(
            &fields(),
            &[Derived::Psr],
            &[],
            MissingValue::Propagate,
        )
        .unwrap();

        let row = schema.row(&MetricSheet::new());
        assert!(row.iter().all(Value::is_null));
    }

    #[test]
    fn test_derived_without_inputs_rejected() {
        let missing_fcf = FinancialSchema::new(&fields(), &[Derived::Pfcr], &[], MissingValue::ZeroFill);
        assert!(matches!(missing_fcf, Err(ListingError::Schema(_))));

        let missing_borrowings =
            FinancialSchema::new(&fields(), &[Derived::Borrowings], &[], MissingValue::ZeroFill);
        assert!(matches!(missing_borrowings, Err(ListingError::Schema(_))));

        let unscraped_component = FinancialSchema::new(
            &fields(),
            &[Derived::BorrowingsGrowth],
            &[Metric::Bonds],
            MissingValue::ZeroFill,
        );
        assert!(matches!(unscraped_component, Err(ListingError::Schema(_))));
    }

    #[test]
    fn test_duplicate_metric_rejected() {
        let mut dup = fields();
        dup.push(MetricField::new("총자산", Metric::TotalAssets, "자산"));
        let result = FinancialSchema::new(&dup, &[], &[], MissingValue::ZeroFill);
        assert!(matches!(result, Err(ListingError::Schema(_))));
    }
}
