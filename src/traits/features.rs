use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::data::CleanedRecord;

/// Names of the churn model's input columns, in training order.
pub const CHURN_FEATURES: [&str; 3] = ["tenure", "monthlycharges", "totalcharges"];

#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector {
    values: Array1<f64>,
}

impl FeatureVector {
    // Create new feature vector
    pub fn new(values: Vec<f64>) -> Self {
        Self { values: Array1::from(values) }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn as_array(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.to_vec()
    }
}

/// Data type of a column as recorded in a model signature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Double,
    Long,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: DataType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        Self { name: name.into(), dtype }
    }
}

/// Why a request object could not be projected onto the schema
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("field required: {0}")]
    MissingField(String),
    #[error("unexpected field: {0}")]
    UnexpectedField(String),
    #[error("field '{0}' must be a finite number")]
    NotANumber(String),
}

/// Ordered input schema shared by training and serving.
///
/// The position of a column in `columns` is its position in every
/// [`FeatureVector`] the model sees. Both the trainer and the prediction
/// service project through the same schema value, so the order cannot drift
/// between the two.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<ColumnSpec>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// The `[tenure, monthlycharges, totalcharges]` schema of the churn model.
    pub fn churn() -> Self {
        Self::new(
            CHURN_FEATURES
                .iter()
                .map(|name| ColumnSpec::new(*name, DataType::Double))
                .collect(),
        )
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Project a cleaned record onto the schema.
    ///
    /// Columns the record does not carry as typed features project to `0.0`,
    /// matching the cleaning fallback.
    pub fn project_record(&self, record: &CleanedRecord) -> FeatureVector {
        FeatureVector::new(
            self.columns
                .iter()
                .map(|c| record.numeric(&c.name).unwrap_or(0.0))
                .collect(),
        )
    }

    /// Project a JSON request object onto the schema.
    ///
    /// The object must carry exactly the schema's fields, each a finite number.
    pub fn project_json(&self, value: &serde_json::Value) -> Result<FeatureVector, ProjectionError> {
        let object = value.as_object().ok_or(ProjectionError::NotAnObject)?;

        if let Some(extra) = object
            .keys()
            .find(|key| !self.columns.iter().any(|c| &c.name == *key))
        {
            return Err(ProjectionError::UnexpectedField(extra.clone()));
        }

        let mut values = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let field = object
                .get(&column.name)
                .ok_or_else(|| ProjectionError::MissingField(column.name.clone()))?;
            match field.as_f64() {
                Some(v) if v.is_finite() => values.push(v),
                _ => return Err(ProjectionError::NotANumber(column.name.clone())),
            }
        }
        Ok(FeatureVector::new(values))
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::churn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_vector() {
        let vec = FeatureVector::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(vec.dimension(), 3);
        assert_eq!(vec.as_array()[0], 1.0);
        assert_eq!(vec.as_array()[1], 2.0);
        assert_eq!(vec.as_array()[2], 3.0);
    }

    #[test]
    fn test_churn_schema_order() {
        let schema = FeatureSchema::churn();
        assert_eq!(schema.names(), vec!["tenure", "monthlycharges", "totalcharges"]);
        assert!(schema.columns().iter().all(|c| c.dtype == DataType::Double));
    }

    #[test]
    fn test_project_json_uses_schema_order() {
        let schema = FeatureSchema::churn();
        // Field order in the request does not matter
        let request = json!({"totalcharges": 500.0, "tenure": 10, "monthlycharges": 50.0});
        let vector = schema.project_json(&request).unwrap();
        assert_eq!(vector.to_vec(), vec![10.0, 50.0, 500.0]);
    }

    #[test]
    fn test_project_json_rejects_bad_input() {
        let schema = FeatureSchema::churn();

        let missing = json!({"monthlycharges": 50.0, "totalcharges": 500.0});
        assert_eq!(
            schema.project_json(&missing),
            Err(ProjectionError::MissingField("tenure".to_string()))
        );

        let extra = json!({"tenure": 1, "monthlycharges": 2, "totalcharges": 3, "gender": "male"});
        assert_eq!(
            schema.project_json(&extra),
            Err(ProjectionError::UnexpectedField("gender".to_string()))
        );

        let text = json!({"tenure": "ten", "monthlycharges": 2, "totalcharges": 3});
        assert_eq!(
            schema.project_json(&text),
            Err(ProjectionError::NotANumber("tenure".to_string()))
        );

        assert_eq!(schema.project_json(&json!([1, 2, 3])), Err(ProjectionError::NotAnObject));
    }
}
