//! Cleaning of raw customer rows into typed records.
//!
//! Every function here is pure. Cleaning never fails: feature values that do
//! not coerce to a number become `0.0`, and labels other than `"yes"` become
//! `0`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::traits::features::CHURN_FEATURES;

/// Name of the label column after normalisation.
pub const TARGET: &str = "churn";

/// A single cell as ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Missing,
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// One customer row with unnormalised column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    fields: Vec<(String, RawValue)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.push((column.into(), value.into()));
    }

    pub fn fields(&self) -> &[(String, RawValue)] {
        &self.fields
    }
}

impl FromIterator<(String, RawValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, RawValue)>>(iter: I) -> Self {
        Self { fields: iter.into_iter().collect() }
    }
}

/// A cleaned, typed customer row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub tenure: f64,
    pub monthlycharges: f64,
    pub totalcharges: f64,
    /// `1` for churned customers, `0` otherwise
    pub churn: u8,
    /// Remaining categorical columns, normalised
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl CleanedRecord {
    pub fn new(tenure: f64, monthlycharges: f64, totalcharges: f64, churn: u8) -> Self {
        Self {
            tenure,
            monthlycharges,
            totalcharges,
            churn,
            attributes: BTreeMap::new(),
        }
    }

    /// Typed numeric column by normalised name, including the label.
    pub fn numeric(&self, column: &str) -> Option<f64> {
        match column {
            "tenure" => Some(self.tenure),
            "monthlycharges" => Some(self.monthlycharges),
            "totalcharges" => Some(self.totalcharges),
            TARGET => Some(f64::from(self.churn)),
            _ => None,
        }
    }

    fn set_feature(&mut self, column: &str, value: f64) {
        match column {
            "tenure" => self.tenure = value,
            "monthlycharges" => self.monthlycharges = value,
            "totalcharges" => self.totalcharges = value,
            _ => {}
        }
    }

    /// Back into raw form so the record can be fed through [`clean`] again.
    pub fn to_raw(&self) -> RawRecord {
        RawRecord::from(self)
    }
}

impl From<&CleanedRecord> for RawRecord {
    fn from(record: &CleanedRecord) -> Self {
        let mut raw = RawRecord::new();
        for (column, value) in &record.attributes {
            raw.push(column.clone(), RawValue::Text(value.clone()));
        }
        raw.push("tenure", record.tenure);
        raw.push("monthlycharges", record.monthlycharges);
        raw.push("totalcharges", record.totalcharges);
        raw.push(TARGET, f64::from(record.churn));
        raw
    }
}

/// Counts of values that fell back to `0.0`, per feature column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows: usize,
    pub coerced: BTreeMap<String, usize>,
}

impl CleaningReport {
    pub fn total_coerced(&self) -> usize {
        self.coerced.values().sum()
    }
}

/// Lower-case a column name and replace spaces with underscores.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Lower-case a categorical value and replace spaces with underscores.
pub fn normalize_text(value: &str) -> String {
    value.to_lowercase().replace(' ', "_")
}

fn coerce_numeric(value: &RawValue) -> Option<f64> {
    match value {
        RawValue::Number(n) if n.is_finite() => Some(*n),
        RawValue::Text(text) => normalize_text(text)
            .trim_matches('_')
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite()),
        _ => None,
    }
}

fn encode_label(value: &RawValue) -> u8 {
    match value {
        RawValue::Text(text) => u8::from(normalize_text(text) == "yes"),
        // Already encoded
        RawValue::Number(n) => u8::from(*n != 0.0 && !n.is_nan()),
        RawValue::Missing => 0,
    }
}

fn clean_record(raw: &RawRecord, report: &mut CleaningReport) -> CleanedRecord {
    let mut record = CleanedRecord::new(0.0, 0.0, 0.0, 0);
    let mut seen = [false; CHURN_FEATURES.len()];

    for (column, value) in raw.fields() {
        let column = normalize_name(column);

        if let Some(position) = CHURN_FEATURES.iter().position(|f| *f == column) {
            seen[position] = true;
            match coerce_numeric(value) {
                Some(n) => record.set_feature(&column, n),
                None => *report.coerced.entry(column).or_default() += 1,
            }
        } else if column == TARGET {
            record.churn = encode_label(value);
        } else {
            let text = match value {
                RawValue::Text(text) => normalize_text(text),
                RawValue::Number(n) => n.to_string(),
                RawValue::Missing => String::new(),
            };
            record.attributes.insert(column, text);
        }
    }

    for (position, present) in seen.iter().enumerate() {
        if !present {
            *report
                .coerced
                .entry(CHURN_FEATURES[position].to_string())
                .or_default() += 1;
        }
    }

    record
}

/// Clean raw rows into typed records.
pub fn clean(rows: &[RawRecord]) -> Vec<CleanedRecord> {
    clean_with_report(rows).0
}

/// Clean raw rows and report how many feature values fell back to `0.0`.
pub fn clean_with_report(rows: &[RawRecord]) -> (Vec<CleanedRecord>, CleaningReport) {
    let mut report = CleaningReport {
        rows: rows.len(),
        ..Default::default()
    };
    let cleaned = rows.iter().map(|row| clean_record(row, &mut report)).collect();
    (cleaned, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn sample_raw_rows() -> Vec<RawRecord> {
        vec![
            RawRecord::new()
                .with("gender", "Female")
                .with("tenure", "1")
                .with("Monthly Charges", "29.85")
                .with("MonthlyCharges", "29.85")
                .with("TotalCharges", "29.85")
                .with("Payment Method", "Electronic check")
                .with("Churn", "No"),
            RawRecord::new()
                .with("gender", "Male")
                .with("tenure", "34")
                .with("MonthlyCharges", "53.85")
                .with("TotalCharges", " ")
                .with("Payment Method", "Mailed check")
                .with("Churn", "Yes"),
        ]
    }

    #[test]
    fn test_clean_normalises_names_and_values() {
        let cleaned = clean(&sample_raw_rows());

        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].attributes["gender"], "female");
        assert_eq!(cleaned[0].attributes["payment_method"], "electronic_check");
        assert_eq!(cleaned[0].attributes["monthly_charges"], "29.85");
        assert_eq!(cleaned[0].monthlycharges, 29.85);
        assert_eq!(cleaned[0].totalcharges, 29.85);
        assert_eq!(cleaned[1].tenure, 34.0);
        assert_eq!(cleaned.iter().map(|r| r.churn).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_clean_coerces_bad_totalcharges_to_zero() {
        let (cleaned, report) = clean_with_report(&sample_raw_rows());
        assert_eq!(cleaned[1].totalcharges, 0.0);
        assert_eq!(report.rows, 2);
        assert_eq!(report.coerced.get("totalcharges"), Some(&1));
        assert_eq!(report.total_coerced(), 1);
    }

    #[test]
    fn test_clean_missing_feature_columns_fall_back() {
        let rows = vec![RawRecord::new().with("Churn", "yes")];
        let (cleaned, report) = clean_with_report(&rows);
        assert_eq!(cleaned[0], CleanedRecord::new(0.0, 0.0, 0.0, 1));
        assert_eq!(report.total_coerced(), 3);
    }

    #[test]
    fn test_clean_label_encoding() {
        let rows: Vec<RawRecord> = ["Yes", "YES", "no", "maybe", ""]
            .iter()
            .map(|label| RawRecord::new().with("Churn", *label))
            .collect();
        let labels: Vec<u8> = clean(&rows).iter().map(|r| r.churn).collect();
        assert_eq!(labels, vec![1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_clean_is_idempotent_on_sample() {
        let once = clean(&sample_raw_rows());
        let raw_again: Vec<RawRecord> = once.iter().map(CleanedRecord::to_raw).collect();
        let twice = clean(&raw_again);
        assert_eq!(once, twice);
    }

    fn raw_value() -> impl Strategy<Value = RawValue> {
        prop_oneof![
            (-1.0e6..1.0e6f64).prop_map(RawValue::Number),
            "[A-Za-z0-9 .]{0,12}".prop_map(RawValue::Text),
            Just(RawValue::Missing),
        ]
    }

    fn raw_record() -> impl Strategy<Value = RawRecord> {
        let column = prop_oneof![
            Just("Tenure".to_string()),
            Just("MonthlyCharges".to_string()),
            Just("TotalCharges".to_string()),
            Just("Churn".to_string()),
            "[A-Za-z ]{1,10}",
        ];
        proptest::collection::vec((column, raw_value()), 0..8)
            .prop_map(|fields| fields.into_iter().collect())
    }

    proptest! {
        #[test]
        fn prop_clean_is_idempotent(rows in proptest::collection::vec(raw_record(), 0..6)) {
            let once = clean(&rows);
            let raw_again: Vec<RawRecord> = once.iter().map(CleanedRecord::to_raw).collect();
            prop_assert_eq!(clean(&raw_again), once);
        }

        #[test]
        fn prop_cleaned_values_are_well_formed(rows in proptest::collection::vec(raw_record(), 0..6)) {
            for record in clean(&rows) {
                prop_assert!(record.churn <= 1);
                prop_assert!(record.totalcharges.is_finite());
                prop_assert!(record.tenure.is_finite());
                prop_assert!(record.monthlycharges.is_finite());
            }
        }
    }
}
