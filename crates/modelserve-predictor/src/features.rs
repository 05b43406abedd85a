//! Settings-driven feature extraction
//!
//! Settings are a JSON document listing named features and how each one is
//! turned into numbers:
//!
//! ```json
//! {
//!   "features": [
//!     { "name": "sepal_length", "transformer": { "type": "min_max", "min": 4.3, "max": 7.9 } },
//!     { "name": "petal_width", "transformer": { "type": "standard", "mean": 1.2, "std": 0.76 }, "default": 1.2 },
//!     { "name": "species", "transformer": { "type": "one_hot", "vocabulary": ["setosa", "versicolor"] } }
//!   ]
//! }
//! ```
//!
//! Numeric transformers produce one column, `one_hot` produces one column per
//! vocabulary entry. Column order follows the settings.

use crate::extract::{ExtractFn, FeatureExtractor};
use modelserve_core::{Error, ExtractionError, Extracted, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// A raw feature value read from an input record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Inputs that expose named raw features
pub trait FeatureRecord {
    fn get(&self, name: &str) -> Option<FeatureValue>;
}

impl FeatureRecord for HashMap<String, FeatureValue> {
    fn get(&self, name: &str) -> Option<FeatureValue> {
        HashMap::get(self, name).cloned()
    }
}

impl FeatureRecord for BTreeMap<String, FeatureValue> {
    fn get(&self, name: &str) -> Option<FeatureValue> {
        BTreeMap::get(self, name).cloned()
    }
}

impl FeatureRecord for serde_json::Value {
    fn get(&self, name: &str) -> Option<FeatureValue> {
        match self.as_object()?.get(name)? {
            serde_json::Value::Number(n) => n.as_f64().map(FeatureValue::Number),
            serde_json::Value::String(s) => Some(FeatureValue::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(FeatureValue::Number(if *b { 1.0 } else { 0.0 })),
            _ => None,
        }
    }
}

/// Parsed settings document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSettings {
    pub features: Vec<FeatureSpec>,
}

/// One named feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub transformer: Transformer,

    /// Used when the input does not carry this feature
    #[serde(default)]
    pub default: Option<FeatureValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transformer {
    Identity,
    MinMax { min: f64, max: f64 },
    Standard { mean: f64, std: f64 },
    OneHot { vocabulary: Vec<String> },
}

impl Transformer {
    fn width(&self) -> usize {
        match self {
            Self::OneHot { vocabulary } => vocabulary.len(),
            _ => 1,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let invalid =
            |reason: &str| Err(Error::settings(format!("feature '{}': {}", name, reason)));
        match self {
            Self::Identity => Ok(()),
            Self::MinMax { min, max } => {
                if !min.is_finite() || !max.is_finite() || max <= min {
                    return invalid("min_max requires finite min < max");
                }
                Ok(())
            }
            Self::Standard { mean, std } => {
                if !mean.is_finite() || !std.is_finite() || *std <= 0.0 {
                    return invalid("standard requires finite mean and std > 0");
                }
                Ok(())
            }
            Self::OneHot { vocabulary } => {
                if vocabulary.is_empty() {
                    return invalid("one_hot vocabulary is empty");
                }
                let unique: HashSet<&String> = vocabulary.iter().collect();
                if unique.len() != vocabulary.len() {
                    return invalid("one_hot vocabulary has duplicates");
                }
                Ok(())
            }
        }
    }

    fn apply(
        &self,
        name: &str,
        value: &FeatureValue,
        out: &mut Vec<f64>,
    ) -> std::result::Result<(), ExtractionError> {
        match self {
            Self::OneHot { vocabulary } => {
                let category = match value {
                    FeatureValue::Text(s) => s.as_str(),
                    FeatureValue::Number(_) => {
                        return Err(ExtractionError::InvalidValue {
                            feature: name.to_string(),
                            reason: "expected a category".to_string(),
                        })
                    }
                };
                let index = vocabulary
                    .iter()
                    .position(|v| v == category)
                    .ok_or_else(|| ExtractionError::UnknownCategory {
                        feature: name.to_string(),
                        value: category.to_string(),
                    })?;
                out.extend((0..vocabulary.len()).map(|i| if i == index { 1.0 } else { 0.0 }));
            }
            numeric => {
                let x = number_of(name, value)?;
                out.push(match numeric {
                    Self::MinMax { min, max } => ((x - min) / (max - min)).clamp(0.0, 1.0),
                    Self::Standard { mean, std } => (x - mean) / std,
                    _ => x,
                });
            }
        }
        Ok(())
    }
}

fn number_of(name: &str, value: &FeatureValue) -> std::result::Result<f64, ExtractionError> {
    let x = match value {
        FeatureValue::Number(x) => *x,
        FeatureValue::Text(s) => s.trim().parse::<f64>().map_err(|_| ExtractionError::InvalidValue {
            feature: name.to_string(),
            reason: format!("'{}' is not a number", s),
        })?,
    };
    if !x.is_finite() {
        return Err(ExtractionError::InvalidValue {
            feature: name.to_string(),
            reason: "not finite".to_string(),
        });
    }
    Ok(x)
}

/// Validated settings ready to extract vectors
#[derive(Debug, Clone)]
pub struct CompiledFeatures {
    features: Vec<FeatureSpec>,
    width: usize,
}

impl CompiledFeatures {
    /// Parse and validate a JSON settings document
    pub fn compile(settings: &str) -> Result<Self> {
        let parsed: FeatureSettings = serde_json::from_str(settings)
            .map_err(|e| {
                Error::settings_caused_by(format!("invalid feature settings: {}", e), e.into())
            })?;
        Self::from_settings(parsed)
    }

    /// Validate already-parsed settings
    pub fn from_settings(settings: FeatureSettings) -> Result<Self> {
        if settings.features.is_empty() {
            return Err(Error::settings("feature list is empty"));
        }

        let mut seen = HashSet::new();
        for spec in &settings.features {
            if !seen.insert(spec.name.as_str()) {
                return Err(Error::settings(format!("duplicate feature '{}'", spec.name)));
            }
            spec.transformer.validate(&spec.name)?;
            if let Some(default) = &spec.default {
                let mut scratch = Vec::new();
                spec.transformer
                    .apply(&spec.name, default, &mut scratch)
                    .map_err(|e| Error::settings(format!("invalid default: {}", e)))?;
            }
        }

        let width = settings.features.iter().map(|f| f.transformer.width()).sum();
        Ok(Self {
            features: settings.features,
            width,
        })
    }

    /// Length of every extracted vector
    pub fn width(&self) -> usize {
        self.width
    }

    /// Output column names (`feature` or `feature=category` for one-hot columns)
    pub fn columns(&self) -> Vec<String> {
        self.features
            .iter()
            .flat_map(|spec| match &spec.transformer {
                Transformer::OneHot { vocabulary } => vocabulary
                    .iter()
                    .map(|v| format!("{}={}", spec.name, v))
                    .collect::<Vec<_>>(),
                _ => vec![spec.name.clone()],
            })
            .collect()
    }

    /// Extract one record
    pub fn extract<R: FeatureRecord>(
        &self,
        record: &R,
    ) -> std::result::Result<Vec<f64>, ExtractionError> {
        let mut out = Vec::with_capacity(self.width);
        for spec in &self.features {
            let value = match record.get(&spec.name) {
                Some(value) => value,
                None => spec
                    .default
                    .clone()
                    .ok_or_else(|| ExtractionError::MissingFeature(spec.name.clone()))?,
            };
            spec.transformer.apply(&spec.name, &value, &mut out)?;
        }
        Ok(out)
    }
}

impl<R> ExtractFn<R, Vec<f64>> for CompiledFeatures
where
    R: FeatureRecord + Send + Sync,
{
    fn apply(&self, inputs: Vec<R>) -> Vec<Extracted<R, Vec<f64>>> {
        inputs
            .into_iter()
            .map(|record| match self.extract(&record) {
                Ok(vector) => Extracted::ok(record, vector),
                Err(error) => Extracted::failed(record, error),
            })
            .collect()
    }
}

/// Extractor that compiles JSON feature settings
///
/// Settings are required.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsExtractor;

impl<R> FeatureExtractor<R, Vec<f64>> for SettingsExtractor
where
    R: FeatureRecord + Send + Sync + 'static,
{
    fn prepare(&self, settings: Option<&str>) -> Result<Arc<dyn ExtractFn<R, Vec<f64>>>> {
        let settings = settings.ok_or_else(|| Error::settings("feature settings are required"))?;
        let compiled = CompiledFeatures::compile(settings)?;
        tracing::debug!("Compiled {} feature columns", compiled.width());
        Ok(Arc::new(compiled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const IRIS: &str = r#"{
        "features": [
            { "name": "sepal_length", "transformer": { "type": "min_max", "min": 4.0, "max": 8.0 } },
            { "name": "petal_width", "transformer": { "type": "standard", "mean": 1.0, "std": 0.5 }, "default": 1.0 },
            { "name": "species", "transformer": { "type": "one_hot", "vocabulary": ["setosa", "versicolor", "virginica"] } }
        ]
    }"#;

    #[test]
    fn test_extracts_in_settings_order() {
        let compiled = CompiledFeatures::compile(IRIS).unwrap();
        let record = json!({ "sepal_length": 6.0, "petal_width": 2.0, "species": "versicolor" });

        assert_eq!(compiled.width(), 5);
        assert_eq!(compiled.extract(&record).unwrap(), vec![0.5, 2.0, 0.0, 1.0, 0.0]);
        assert_eq!(
            compiled.columns(),
            vec![
                "sepal_length",
                "petal_width",
                "species=setosa",
                "species=versicolor",
                "species=virginica"
            ]
        );
    }

    #[test]
    fn test_min_max_clamps_and_default_fills() {
        let compiled = CompiledFeatures::compile(IRIS).unwrap();
        let record = json!({ "sepal_length": "9.5", "species": "setosa" });

        assert_eq!(compiled.extract(&record).unwrap(), vec![1.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_per_item_failures() {
        let compiled = CompiledFeatures::compile(IRIS).unwrap();

        let missing = json!({ "species": "setosa" });
        assert_eq!(
            compiled.extract(&missing),
            Err(ExtractionError::MissingFeature("sepal_length".into()))
        );

        let unknown = json!({ "sepal_length": 5.0, "species": "rose" });
        assert!(matches!(
            compiled.extract(&unknown),
            Err(ExtractionError::UnknownCategory { ref value, .. }) if value == "rose"
        ));

        let garbage = json!({ "sepal_length": "long", "species": "setosa" });
        assert!(matches!(
            compiled.extract(&garbage),
            Err(ExtractionError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_apply_keeps_failures_in_place() {
        let compiled = CompiledFeatures::compile(IRIS).unwrap();
        let batch = vec![
            json!({ "sepal_length": 4.0, "species": "setosa" }),
            json!({ "sepal_length": 4.0, "species": "rose" }),
        ];

        let extracted = ExtractFn::apply(&compiled, batch);
        assert!(extracted[0].is_ok());
        assert!(!extracted[1].is_ok());
    }

    #[test]
    fn test_map_records() {
        let compiled = CompiledFeatures::compile(
            r#"{"features": [{"name": "x", "transformer": {"type": "identity"}}]}"#,
        )
        .unwrap();
        let mut record: HashMap<String, FeatureValue> = HashMap::new();
        record.insert("x".into(), 3.5.into());

        assert_eq!(compiled.extract(&record).unwrap(), vec![3.5]);
    }

    #[test]
    fn test_malformed_settings_fail_compilation() {
        let cases = [
            "not json",
            r#"{"features": []}"#,
            r#"{"features": [{"name": "x", "transformer": {"type": "min_max", "min": 1.0, "max": 1.0}}]}"#,
            r#"{"features": [{"name": "x", "transformer": {"type": "standard", "mean": 0.0, "std": 0.0}}]}"#,
            r#"{"features": [{"name": "x", "transformer": {"type": "one_hot", "vocabulary": []}}]}"#,
            r#"{"features": [{"name": "x", "transformer": {"type": "identity"}}, {"name": "x", "transformer": {"type": "identity"}}]}"#,
            r#"{"features": [{"name": "x", "transformer": {"type": "one_hot", "vocabulary": ["a"]}, "default": "b"}]}"#,
            r#"{"features": [{"name": "x", "transformer": {"type": "cubic"}}]}"#,
        ];

        for settings in cases {
            assert!(
                matches!(
                    CompiledFeatures::compile(settings),
                    Err(Error::SettingsCompilation { .. })
                ),
                "expected compilation failure for {settings}"
            );
        }
    }

    #[test]
    fn test_settings_extractor_requires_settings() {
        let prepared: Result<Arc<dyn ExtractFn<serde_json::Value, Vec<f64>>>> =
            SettingsExtractor.prepare(None);
        assert!(matches!(prepared, Err(Error::SettingsCompilation { .. })));
    }
}
