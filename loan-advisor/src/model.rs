use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AdvisorError, Result};

/// Column order the classifier was trained on.
pub const FEATURE_COLUMNS: [&str; 11] = [
    "no_of_dependents",
    "education",
    "self_employed",
    "income_annum",
    "loan_amount",
    "loan_term",
    "cibil_score",
    "residential_assets_value",
    "commercial_assets_value",
    "luxury_assets_value",
    "bank_asset_value",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Education {
    Graduate,
    NotGraduate,
}

impl FromStr for Education {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "graduate" => Ok(Education::Graduate),
            "not graduate" => Ok(Education::NotGraduate),
            _ => Err(AdvisorError::Prediction(format!(
                "education must be 'Graduate' or 'Not Graduate', got '{}'",
                s
            ))),
        }
    }
}

/// Parses the `self_employed` column ("Yes"/"No").
pub fn parse_self_employed(s: &str) -> Result<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(AdvisorError::Prediction(format!(
            "self_employed must be 'Yes' or 'No', got '{}'",
            s
        ))),
    }
}

/// One applicant row, in the model's column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub no_of_dependents: u32,
    pub education: Education,
    pub self_employed: bool,
    pub income_annum: f64,
    pub loan_amount: f64,
    pub loan_term: u32,
    pub cibil_score: u32,
    pub residential_assets_value: f64,
    pub commercial_assets_value: f64,
    pub luxury_assets_value: f64,
    pub bank_asset_value: f64,
}

impl PredictionInput {
    /// Numeric feature row. Categorical columns are label encoded in
    /// alphabetical order (Graduate=0, Not Graduate=1; No=0, Yes=1).
    pub fn features(&self) -> [f64; 11] {
        [
            f64::from(self.no_of_dependents),
            match self.education {
                Education::Graduate => 0.0,
                Education::NotGraduate => 1.0,
            },
            if self.self_employed { 1.0 } else { 0.0 },
            self.income_annum,
            self.loan_amount,
            f64::from(self.loan_term),
            f64::from(self.cibil_score),
            self.residential_assets_value,
            self.commercial_assets_value,
            self.luxury_assets_value,
            self.bank_asset_value,
        ]
    }
}

/// Binary model output. Label 0 is an approval, label 1 a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanDecision {
    Approved,
    Denied,
}

impl LoanDecision {
    pub fn label(self) -> u8 {
        match self {
            LoanDecision::Approved => 0,
            LoanDecision::Denied => 1,
        }
    }

    pub fn from_label(label: u8) -> Option<Self> {
        match label {
            0 => Some(LoanDecision::Approved),
            1 => Some(LoanDecision::Denied),
            _ => None,
        }
    }
}

impl fmt::Display for LoanDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanDecision::Approved => write!(f, "approved"),
            LoanDecision::Denied => write!(f, "denied"),
        }
    }
}

/// A pre-trained loan approval classifier.
pub trait LoanClassifier: Send + Sync {
    fn predict(&self, input: &PredictionInput) -> Result<LoanDecision>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Go to `left` when `features[feature] <= threshold`, else `right`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Per-class weights (sample counts or probabilities).
    Leaf { value: Vec<f64> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    fn class_weights(&self, features: &[f64]) -> Result<&[f64]> {
        let mut index = 0;
        // A well-formed tree reaches a leaf in at most `nodes.len()` steps.
        for _ in 0..=self.nodes.len() {
            let node = self.nodes.get(index).ok_or_else(|| {
                AdvisorError::Prediction(format!("decision tree has no node {}", index))
            })?;
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(*feature).ok_or_else(|| {
                        AdvisorError::Prediction(format!("no feature at column {}", feature))
                    })?;
                    index = if *value <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { value } => return Ok(value),
            }
        }
        Err(AdvisorError::Prediction(
            "decision tree contains a cycle".to_string(),
        ))
    }
}

/// Tree ensemble loaded from a JSON artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    pub feature_names: Vec<String>,
    pub classes: Vec<u8>,
    pub trees: Vec<DecisionTree>,
}

impl ForestModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AdvisorError::Model(format!("cannot read {}: {}", path.display(), e))
        })?;
        let model = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            trees = model.trees.len(),
            "Loan model loaded"
        );
        Ok(model)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let model: ForestModel = serde_json::from_str(raw)
            .map_err(|e| AdvisorError::Model(format!("invalid model artifact: {}", e)))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_COLUMNS) {
            return Err(AdvisorError::Model(format!(
                "feature columns {:?} do not match expected {:?}",
                self.feature_names, FEATURE_COLUMNS
            )));
        }
        if self.classes != [0, 1] {
            return Err(AdvisorError::Model(format!(
                "expected classes [0, 1], got {:?}",
                self.classes
            )));
        }
        if self.trees.is_empty() {
            return Err(AdvisorError::Model("model has no trees".to_string()));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(AdvisorError::Model(format!("tree {} is empty", t)));
            }
            for (n, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Split {
                        feature,
                        left,
                        right,
                        ..
                    } => {
                        if *feature >= FEATURE_COLUMNS.len() {
                            return Err(AdvisorError::Model(format!(
                                "tree {} node {} splits on unknown feature {}",
                                t, n, feature
                            )));
                        }
                        if *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                            return Err(AdvisorError::Model(format!(
                                "tree {} node {} points outside the tree",
                                t, n
                            )));
                        }
                    }
                    Node::Leaf { value } => {
                        if value.len() != self.classes.len() {
                            return Err(AdvisorError::Model(format!(
                                "tree {} node {} has {} class weights, expected {}",
                                t,
                                n,
                                value.len(),
                                self.classes.len()
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl LoanClassifier for ForestModel {
    fn predict(&self, input: &PredictionInput) -> Result<LoanDecision> {
        let features = input.features();
        let mut mean = vec![0.0; self.classes.len()];

        for tree in &self.trees {
            let weights = tree.class_weights(&features)?;
            let total: f64 = weights.iter().sum();
            if total > 0.0 {
                for (acc, w) in mean.iter_mut().zip(weights) {
                    *acc += w / total;
                }
            }
        }

        let mut best = 0;
        for (i, score) in mean.iter().enumerate() {
            if *score > mean[best] {
                best = i;
            }
        }

        let label = self.classes[best];
        debug!(label, scores = ?mean, "Loan model evaluated");
        LoanDecision::from_label(label)
            .ok_or_else(|| AdvisorError::Prediction(format!("unexpected class label {}", label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Two stumps on `cibil_score` (column 6) and one on `loan_term`.
    fn test_model() -> ForestModel {
        let artifact = json!({
            "feature_names": FEATURE_COLUMNS,
            "classes": [0, 1],
            "trees": [
                {"nodes": [
                    {"kind": "split", "feature": 6, "threshold": 549.5, "left": 1, "right": 2},
                    {"kind": "leaf", "value": [2.0, 98.0]},
                    {"kind": "leaf", "value": [95.0, 5.0]}
                ]},
                {"nodes": [
                    {"kind": "split", "feature": 6, "threshold": 540.0, "left": 1, "right": 2},
                    {"kind": "leaf", "value": [0.1, 0.9]},
                    {"kind": "leaf", "value": [0.8, 0.2]}
                ]},
                {"nodes": [
                    {"kind": "split", "feature": 5, "threshold": 3.0, "left": 1, "right": 2},
                    {"kind": "leaf", "value": [10.0, 0.0]},
                    {"kind": "leaf", "value": [6.0, 4.0]}
                ]}
            ]
        });
        ForestModel::from_json(&artifact.to_string()).unwrap()
    }

    fn approved_profile() -> PredictionInput {
        PredictionInput {
            no_of_dependents: 2,
            education: Education::Graduate,
            self_employed: false,
            income_annum: 9_600_000.0,
            loan_amount: 29_900_000.0,
            loan_term: 12,
            cibil_score: 778,
            residential_assets_value: 2_400_000.0,
            commercial_assets_value: 17_600_000.0,
            luxury_assets_value: 22_700_000.0,
            bank_asset_value: 8_000_000.0,
        }
    }

    #[test]
    fn test_low_cibil_score_flips_decision() {
        let model = test_model();
        let approved = approved_profile();
        let denied = PredictionInput {
            cibil_score: 417,
            ..approved.clone()
        };

        assert_eq!(model.predict(&approved).unwrap().label(), 0);
        assert_eq!(model.predict(&denied).unwrap().label(), 1);
    }

    #[test]
    fn test_features_follow_column_order() {
        let features = approved_profile().features();
        assert_eq!(features.len(), FEATURE_COLUMNS.len());
        assert_eq!(features[0], 2.0);
        assert_eq!(features[1], 0.0);
        assert_eq!(features[2], 0.0);
        assert_eq!(features[6], 778.0);
        assert_eq!(features[10], 8_000_000.0);
    }

    #[test]
    fn test_rejects_mismatched_columns() {
        let artifact = json!({
            "feature_names": ["cibil_score"],
            "classes": [0, 1],
            "trees": [{"nodes": [{"kind": "leaf", "value": [1.0, 0.0]}]}]
        });
        assert!(matches!(
            ForestModel::from_json(&artifact.to_string()),
            Err(AdvisorError::Model(_))
        ));
    }

    #[test]
    fn test_rejects_dangling_child_index() {
        let artifact = json!({
            "feature_names": FEATURE_COLUMNS,
            "classes": [0, 1],
            "trees": [{"nodes": [
                {"kind": "split", "feature": 6, "threshold": 500.0, "left": 1, "right": 7},
                {"kind": "leaf", "value": [1.0, 0.0]}
            ]}]
        });
        assert!(matches!(
            ForestModel::from_json(&artifact.to_string()),
            Err(AdvisorError::Model(_))
        ));
    }

    #[test]
    fn test_cyclic_tree_fails_prediction_instead_of_looping() {
        let artifact = json!({
            "feature_names": FEATURE_COLUMNS,
            "classes": [0, 1],
            "trees": [{"nodes": [
                {"kind": "split", "feature": 6, "threshold": 500.0, "left": 0, "right": 0}
            ]}]
        });
        let model = ForestModel::from_json(&artifact.to_string()).unwrap();
        assert!(matches!(
            model.predict(&approved_profile()),
            Err(AdvisorError::Prediction(_))
        ));
    }

    #[test]
    fn test_categorical_parsing() {
        assert_eq!("Graduate".parse::<Education>().unwrap(), Education::Graduate);
        assert_eq!(" Not Graduate".parse::<Education>().unwrap(), Education::NotGraduate);
        assert_eq!("not_graduate".parse::<Education>().unwrap(), Education::NotGraduate);
        assert!("PhD".parse::<Education>().is_err());

        assert!(parse_self_employed("Yes").unwrap());
        assert!(!parse_self_employed(" no ").unwrap());
        assert!(parse_self_employed("maybe").is_err());
    }

    #[test]
    fn test_shipped_artifact_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../models/loan_forest.json");
        let model = ForestModel::load(path).unwrap();
        let approved = approved_profile();
        let denied = PredictionInput {
            cibil_score: 350,
            ..approved.clone()
        };
        assert_eq!(model.predict(&approved).unwrap(), LoanDecision::Approved);
        assert_eq!(model.predict(&denied).unwrap(), LoanDecision::Denied);
    }
}
