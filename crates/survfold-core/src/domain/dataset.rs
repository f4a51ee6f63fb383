//! Cohort samples and the train/validation splits a fold trains on.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, SurvfoldError};

/// One patient case with its survival target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    /// Case identifier written to split files.
    pub case_id: String,

    /// Discretised survival bin.
    pub label: usize,

    /// Observed survival or follow-up time.
    pub event_time: f64,

    /// `true` when the event was not observed (right-censored).
    pub censorship: bool,

    /// Omic feature vectors, one per modality group.
    #[serde(default)]
    pub omics: Vec<Vec<f32>>,
}

/// A named subset of samples sharing the same omic layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitSet {
    pub name: String,
    pub omic_sizes: Vec<usize>,
    pub samples: Vec<Sample>,
}

impl SplitSet {
    pub fn new(name: impl Into<String>, omic_sizes: Vec<usize>, samples: Vec<Sample>) -> Self {
        Self {
            name: name.into(),
            omic_sizes,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Case identifiers in sample order.
    pub fn case_ids(&self) -> impl Iterator<Item = &str> {
        self.samples.iter().map(|s| s.case_id.as_str())
    }

    /// Number of right-censored samples.
    pub fn censored(&self) -> usize {
        self.samples.iter().filter(|s| s.censorship).count()
    }
}

/// The (train, validation) pair for one fold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoldDatasets {
    pub train: SplitSet,
    pub val: SplitSet,
}

impl FoldDatasets {
    pub fn new(train: SplitSet, val: SplitSet) -> Self {
        Self { train, val }
    }

    /// Splits in persisted column order.
    pub fn splits(&self) -> [&SplitSet; 2] {
        [&self.train, &self.val]
    }
}

/// Every sample available to a cross-validation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cohort {
    pub omic_sizes: Vec<usize>,
    pub samples: Vec<Sample>,
}

impl Cohort {
    /// Read and validate a cohort JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(SurvfoldError::filesystem(path))?;
        let cohort: Cohort = serde_json::from_str(&content)?;
        cohort.validate()?;
        Ok(cohort)
    }

    /// Case ids must be unique and omic groups must match `omic_sizes`.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for sample in &self.samples {
            if !seen.insert(sample.case_id.as_str()) {
                return Err(SurvfoldError::InvalidConfig(format!(
                    "duplicate case id {} in cohort",
                    sample.case_id
                )));
            }
            if sample.omics.is_empty() {
                continue;
            }
            let sizes: Vec<usize> = sample.omics.iter().map(Vec::len).collect();
            if sizes != self.omic_sizes {
                return Err(SurvfoldError::InvalidConfig(format!(
                    "case {} has omic groups {:?}, cohort declares {:?}",
                    sample.case_id, sizes, self.omic_sizes
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, case_id: &str) -> Option<&Sample> {
        self.samples.iter().find(|s| s.case_id == case_id)
    }

    /// Build a split from identifiers, failing on any id not in the cohort.
    pub fn select(&self, name: &str, case_ids: &[String]) -> Result<SplitSet> {
        let samples = case_ids
            .iter()
            .map(|id| {
                self.get(id)
                    .cloned()
                    .ok_or_else(|| SurvfoldError::UnknownSample {
                        split: name.to_string(),
                        case_id: id.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SplitSet::new(name, self.omic_sizes.clone(), samples))
    }
}
