//! Complexity scoring oracle.
//!
//! A step's process complexity is predicted by a pretrained regression
//! model from a fixed seven-feature vector. The planner only depends on
//! [`ComplexityOracle`]; [`RegressionModel`] evaluates the two model shapes
//! that can be exported to JSON:
//!
//! - **linear**: `intercept + Σ weight_f · x_f`
//! - **oblivious trees**: symmetric decision trees where every level tests
//!   one `(feature, border)` split and the leaf index collects one bit per
//!   level (`x > border` sets the bit). The prediction is
//!   `bias + scale · Σ leaf`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::OracleError;

pub const TEMPERATURE: &str = "temperature";
pub const PRESSURE: &str = "MPa";
pub const MICROIMPURITIES: &str = "microimpurities";

/// Declared model inputs, in vector order. Every name other than the three
/// valued features above is a boolean condition flag.
pub const FEATURE_NAMES: [&str; 7] = [
    TEMPERATURE,
    PRESSURE,
    "hydrothermal process",
    "vacuum",
    MICROIMPURITIES,
    "equilibrium crystallization",
    "nonequilibrium crystallization",
];

/// Deepest oblivious tree accepted (2^16 leaves).
const MAX_TREE_DEPTH: usize = 16;

/// Whether `name` is a declared boolean condition flag.
pub fn is_declared_flag(name: &str) -> bool {
    !matches!(name, TEMPERATURE | PRESSURE | MICROIMPURITIES) && feature_index(name).is_some()
}

/// Position of `name` in [`FEATURE_NAMES`].
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|f| *f == name)
}

/// One step's model input.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_NAMES.len()],
}

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_NAMES.len()]) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|i| self.values[i])
    }

    pub fn set(&mut self, name: &str, value: f64) -> Result<(), OracleError> {
        let i = feature_index(name).ok_or_else(|| OracleError::UnknownFeature {
            name: name.to_string(),
        })?;
        self.values[i] = value;
        Ok(())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// Scores one reaction step. Lower is simpler.
pub trait ComplexityOracle: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Result<f64, OracleError>;
}

impl<F> ComplexityOracle for F
where
    F: Fn(&FeatureVector) -> f64 + Send + Sync,
{
    fn predict(&self, features: &FeatureVector) -> Result<f64, OracleError> {
        Ok(self(features))
    }
}

/// A single level test of an oblivious tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub feature: String,
    pub border: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObliviousTree {
    /// Level tests; split `d` contributes bit `d` of the leaf index.
    pub splits: Vec<Split>,
    /// `2^depth` leaf values.
    pub leaf_values: Vec<f64>,
}

impl ObliviousTree {
    fn leaf(&self, features: &FeatureVector) -> f64 {
        let index = self
            .splits
            .iter()
            .enumerate()
            .fold(0usize, |acc, (depth, split)| {
                let value = features.get(&split.feature).unwrap_or(0.0);
                if value > split.border { acc | (1 << depth) } else { acc }
            });
        self.leaf_values[index]
    }
}

fn default_scale() -> f64 {
    1.0
}

/// Regression model loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressionModel {
    Linear {
        #[serde(default)]
        intercept: f64,
        /// Feature name → weight. Missing features weigh zero.
        weights: BTreeMap<String, f64>,
    },
    ObliviousTrees {
        #[serde(default)]
        bias: f64,
        #[serde(default = "default_scale")]
        scale: f64,
        trees: Vec<ObliviousTree>,
    },
}

impl RegressionModel {
    /// Read and validate a model file.
    pub fn load(path: &Path) -> Result<Self, OracleError> {
        let content = std::fs::read_to_string(path).map_err(|e| OracleError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let model: Self = serde_json::from_str(&content).map_err(|e| OracleError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        model.validate()?;
        tracing::info!(path = %path.display(), kind = model.kind(), "loaded complexity model");
        Ok(model)
    }

    /// Parse and validate a model from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, OracleError> {
        let model: Self = serde_json::from_str(json).map_err(|e| OracleError::InvalidModel {
            message: e.to_string(),
        })?;
        model.validate()?;
        Ok(model)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RegressionModel::Linear { .. } => "linear",
            RegressionModel::ObliviousTrees { .. } => "oblivious_trees",
        }
    }

    /// Check feature names, tree shapes and that every parameter is finite.
    pub fn validate(&self) -> Result<(), OracleError> {
        match self {
            RegressionModel::Linear { intercept, weights } => {
                ensure_finite("intercept", *intercept)?;
                for (name, weight) in weights {
                    known_feature(name)?;
                    ensure_finite(name, *weight)?;
                }
            }
            RegressionModel::ObliviousTrees { bias, scale, trees } => {
                ensure_finite("bias", *bias)?;
                ensure_finite("scale", *scale)?;
                for (i, tree) in trees.iter().enumerate() {
                    if tree.splits.len() > MAX_TREE_DEPTH {
                        return Err(OracleError::InvalidModel {
                            message: format!(
                                "tree {i} has depth {} (max {MAX_TREE_DEPTH})",
                                tree.splits.len()
                            ),
                        });
                    }
                    let expected = 1usize << tree.splits.len();
                    if tree.leaf_values.len() != expected {
                        return Err(OracleError::InvalidModel {
                            message: format!(
                                "tree {i} has {} leaf values, expected {expected}",
                                tree.leaf_values.len()
                            ),
                        });
                    }
                    for split in &tree.splits {
                        known_feature(&split.feature)?;
                        ensure_finite("border", split.border)?;
                    }
                    for leaf in &tree.leaf_values {
                        ensure_finite("leaf value", *leaf)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn known_feature(name: &str) -> Result<(), OracleError> {
    match feature_index(name) {
        Some(_) => Ok(()),
        None => Err(OracleError::UnknownFeature {
            name: name.to_string(),
        }),
    }
}

fn ensure_finite(what: &str, value: f64) -> Result<(), OracleError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(OracleError::InvalidModel {
            message: format!("{what} is not finite: {value}"),
        })
    }
}

impl ComplexityOracle for RegressionModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64, OracleError> {
        if let Some(bad) = features.as_slice().iter().find(|v| !v.is_finite()) {
            return Err(OracleError::Prediction {
                message: format!("non-finite feature value {bad}"),
            });
        }
        let score = match self {
            RegressionModel::Linear { intercept, weights } => {
                intercept
                    + weights
                        .iter()
                        .map(|(name, w)| w * features.get(name).unwrap_or(0.0))
                        .sum::<f64>()
            }
            RegressionModel::ObliviousTrees { bias, scale, trees } => {
                bias + scale * trees.iter().map(|t| t.leaf(features)).sum::<f64>()
            }
        };
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(temperature: f64, mpa: f64, vacuum: f64) -> FeatureVector {
        FeatureVector::new([temperature, mpa, 0.0, vacuum, 0.0, 0.0, 0.0])
    }

    #[test]
    fn linear_model_weights_named_features() {
        let model = RegressionModel::from_json(
            r#"{"kind": "linear", "intercept": 1.0, "weights": {"temperature": 0.01, "vacuum": 2.0}}"#,
        )
        .unwrap();
        let score = model.predict(&features(500.0, 3.0, 1.0)).unwrap();
        assert!((score - 8.0).abs() < 1e-12);
    }

    #[test]
    fn oblivious_tree_leaf_index_bits() {
        // bit 0: temperature > 600, bit 1: vacuum > 0.5
        let model = RegressionModel::from_json(
            r#"{
                "kind": "oblivious_trees",
                "bias": 0.5,
                "trees": [{
                    "splits": [
                        {"feature": "temperature", "border": 600},
                        {"feature": "vacuum", "border": 0.5}
                    ],
                    "leaf_values": [1, 2, 3, 4]
                }]
            }"#,
        )
        .unwrap();
        let cases = [
            (features(500.0, 0.0, 0.0), 1.5),
            (features(700.0, 0.0, 0.0), 2.5),
            (features(500.0, 0.0, 1.0), 3.5),
            (features(700.0, 0.0, 1.0), 4.5),
        ];
        for (input, expected) in cases {
            assert!((model.predict(&input).unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn scale_multiplies_tree_sum() {
        let model = RegressionModel::from_json(
            r#"{"kind": "oblivious_trees", "scale": 2.0,
                "trees": [{"splits": [], "leaf_values": [3]}, {"splits": [], "leaf_values": [1]}]}"#,
        )
        .unwrap();
        assert_eq!(model.predict(&FeatureVector::default()).unwrap(), 8.0);
    }

    #[test]
    fn wrong_leaf_count_rejected() {
        let err = RegressionModel::from_json(
            r#"{"kind": "oblivious_trees",
                "trees": [{"splits": [{"feature": "MPa", "border": 1}], "leaf_values": [1, 2, 3]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, OracleError::InvalidModel { .. }));
    }

    #[test]
    fn unknown_feature_rejected() {
        let err = RegressionModel::from_json(
            r#"{"kind": "linear", "weights": {"pressure": 1.0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, OracleError::UnknownFeature { name } if name == "pressure"));
    }

    #[test]
    fn load_missing_file_is_load_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = RegressionModel::load(&dir.path().join("model.json")).unwrap_err();
        assert!(matches!(err, OracleError::Load { .. }));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, r#"{"kind": "linear", "intercept": 2.5, "weights": {}}"#).unwrap();
        let model = RegressionModel::load(&path).unwrap();
        assert_eq!(model.kind(), "linear");
        assert_eq!(model.predict(&FeatureVector::default()).unwrap(), 2.5);
    }

    #[test]
    fn non_finite_input_is_prediction_error() {
        let model = RegressionModel::from_json(r#"{"kind": "linear", "weights": {}}"#).unwrap();
        let err = model.predict(&features(f64::NAN, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, OracleError::Prediction { .. }));
    }

    #[test]
    fn closures_are_oracles() {
        let oracle = |f: &FeatureVector| f.get("temperature").unwrap_or(0.0) / 100.0;
        assert_eq!(oracle.predict(&features(300.0, 0.0, 0.0)).unwrap(), 3.0);
    }

    #[test]
    fn feature_vector_set_by_name() {
        let mut v = FeatureVector::default();
        v.set("MPa", 4.0).unwrap();
        assert_eq!(v.as_slice()[1], 4.0);
        assert!(v.set("pressure", 1.0).is_err());
    }
}
