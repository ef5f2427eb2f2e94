// Model - random forest genre model loaded from a JSON artifact
//
// The artifact is an export of a trained forest of decision trees. Every tree
// is a flat node list rooted at index 0; split nodes route an input to a child
// by comparing one feature against a threshold, leaf nodes hold per-class
// sample counts. The forest's probabilities are the mean of the normalized
// leaf distributions.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::analysis::classifier::ClassifierModel;
use crate::error::ClassifierError;

/// One decision tree node
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Route NaN inputs left instead of right
        #[serde(default)]
        missing_go_to_left: bool,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Class distribution of the leaf reached by `input`, normalized to sum 1
    fn leaf_distribution(&self, input: &[f64]) -> Vec<f64> {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    missing_go_to_left,
                } => {
                    let x = input[*feature];
                    // Inputs are compared at single precision
                    let go_left = if x.is_nan() {
                        *missing_go_to_left
                    } else {
                        (x as f32) as f64 <= *threshold
                    };
                    idx = if go_left { *left } else { *right };
                }
                Node::Leaf { value } => {
                    let total: f64 = value.iter().sum();
                    let norm = if total > 0.0 { total } else { 1.0 };
                    return value.iter().map(|v| v / norm).collect();
                }
            }
        }
    }
}

/// Random forest classifier
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RandomForestModel {
    classes: Vec<String>,
    n_features: usize,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    trees: Vec<Tree>,
}

impl RandomForestModel {
    /// Load and validate a model artifact
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let load_error = |reason: String| ClassifierError::ModelLoad {
            path: path.display().to_string(),
            reason,
        };

        let contents = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let model = Self::from_json(&contents).map_err(load_error)?;

        log::info!(
            "[Model] Loaded {} trees, {} classes, {} features from {:?}",
            model.trees.len(),
            model.classes.len(),
            model.n_features,
            path
        );
        Ok(model)
    }

    /// Parse and validate a model from its JSON text
    ///
    /// # Errors
    /// A description of the first structural problem found
    pub fn from_json(json: &str) -> Result<Self, String> {
        let model: Self = serde_json::from_str(json).map_err(|e| e.to_string())?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("model has no classes".to_string());
        }
        if self.trees.is_empty() {
            return Err("model has no trees".to_string());
        }
        if let Some(names) = &self.feature_names {
            if names.len() != self.n_features {
                return Err(format!(
                    "{} feature names for {} features",
                    names.len(),
                    self.n_features
                ));
            }
        }

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(format!("tree {} is empty", t));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Split {
                        feature,
                        left,
                        right,
                        ..
                    } => {
                        if *feature >= self.n_features {
                            return Err(format!(
                                "tree {} node {} splits on feature {} of {}",
                                t, i, feature, self.n_features
                            ));
                        }
                        // Children after their parent rules out cycles
                        for child in [*left, *right] {
                            if child <= i || child >= tree.nodes.len() {
                                return Err(format!(
                                    "tree {} node {} has invalid child {}",
                                    t, i, child
                                ));
                            }
                        }
                    }
                    Node::Leaf { value } => {
                        if value.len() != self.classes.len() {
                            return Err(format!(
                                "tree {} leaf {} has {} values for {} classes",
                                t,
                                i,
                                value.len(),
                                self.classes.len()
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl ClassifierModel for RandomForestModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict_probabilities(&self, features: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        if features.len() != self.n_features {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.n_features,
                actual: features.len(),
            });
        }

        let mut sum = vec![0.0f64; self.classes.len()];
        for tree in &self.trees {
            for (s, p) in sum.iter_mut().zip(tree.leaf_distribution(features)) {
                *s += p;
            }
        }
        let n = self.trees.len() as f64;
        Ok(sum.into_iter().map(|s| s / n).collect())
    }
}
