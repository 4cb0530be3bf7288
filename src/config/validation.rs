//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse: the raw TOML is first walked as a `toml::Value` tree and
//! every key is compared against the known field paths, producing warnings
//! with "did you mean" suggestions. Serde deserialization follows. Unknown
//! keys never make a config fail to load.

use std::collections::HashSet;

use super::PipelineConfig;
use crate::types::NUM_FEATURES;

/// A non-fatal config warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of [`PipelineConfig`].
///
/// Must be kept in step with the structs in `pipeline_config.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        "data",
        "data.data_dir",
        "data.variant",
        "labeling",
        "labeling.failure_threshold",
        "windowing",
        "windowing.sequence_length",
        "model",
        "model.num_features",
        "model.lstm1_units",
        "model.lstm2_units",
        "model.dense_units",
        "model.dropout",
        "training",
        "training.epochs",
        "training.batch_size",
        "training.learning_rate",
        "training.validation_fraction",
        "training.early_stopping_patience",
        "training.lr_patience",
        "training.lr_factor",
        "training.min_learning_rate",
        "training.gradient_clip_norm",
        "training.seed",
        "training.verbose",
        "evaluation",
        "evaluation.decision_threshold",
        "evaluation.cost_preventive",
        "evaluation.cost_failure",
        "output",
        "output.output_dir",
        "output.write_plots",
        "output.save_checkpoint",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively collect all dotted key paths of a TOML table.
///
/// `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest known key within edit distance 3. Ties resolve alphabetically.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut candidates: Vec<&str> = known.iter().copied().collect();
    candidates.sort_unstable();
    candidates
        .into_iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|&(_, d)| d <= 3)
        .min_by_key(|&(_, d)| d)
        .map(|(k, _)| k.to_string())
}

/// Warnings for every key in `raw_toml` that the config does not know.
///
/// Parse errors yield no warnings; serde reports them afterwards.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Every out-of-range value in `config`, one message each.
pub fn validate_ranges(config: &PipelineConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.data.data_dir.as_os_str().is_empty() {
        errors.push("data.data_dir must not be empty".to_string());
    }
    if config.windowing.sequence_length == 0 {
        errors.push("windowing.sequence_length must be >= 1".to_string());
    }

    let m = &config.model;
    if m.num_features != NUM_FEATURES {
        errors.push(format!("model.num_features = {} must equal {NUM_FEATURES}", m.num_features));
    }
    for (name, units) in [
        ("model.lstm1_units", m.lstm1_units),
        ("model.lstm2_units", m.lstm2_units),
        ("model.dense_units", m.dense_units),
    ] {
        if units == 0 {
            errors.push(format!("{name} must be >= 1"));
        }
    }
    if !(0.0..1.0).contains(&m.dropout) {
        errors.push(format!("model.dropout = {} must be in [0, 1)", m.dropout));
    }

    let t = &config.training;
    if t.epochs == 0 {
        errors.push("training.epochs must be >= 1".to_string());
    }
    if t.batch_size == 0 {
        errors.push("training.batch_size must be >= 1".to_string());
    }
    if !(t.learning_rate.is_finite() && t.learning_rate > 0.0) {
        errors.push(format!("training.learning_rate = {} must be a positive number", t.learning_rate));
    }
    if !(t.validation_fraction > 0.0 && t.validation_fraction < 1.0) {
        errors.push(format!(
            "training.validation_fraction = {} must be in (0, 1)",
            t.validation_fraction
        ));
    }
    if !(t.lr_factor > 0.0 && t.lr_factor <= 1.0) {
        errors.push(format!("training.lr_factor = {} must be in (0, 1]", t.lr_factor));
    }
    if !(t.min_learning_rate.is_finite() && t.min_learning_rate >= 0.0) {
        errors.push(format!("training.min_learning_rate = {} must be >= 0", t.min_learning_rate));
    } else if t.min_learning_rate > t.learning_rate {
        errors.push(format!(
            "training.min_learning_rate = {} must not exceed training.learning_rate = {}",
            t.min_learning_rate, t.learning_rate
        ));
    }
    if !t.gradient_clip_norm.is_finite() {
        errors.push("training.gradient_clip_norm must be finite".to_string());
    }

    let e = &config.evaluation;
    if !(0.0..=1.0).contains(&e.decision_threshold) {
        errors.push(format!("evaluation.decision_threshold = {} must be in [0, 1]", e.decision_threshold));
    }
    for (name, cost) in [
        ("evaluation.cost_preventive", e.cost_preventive),
        ("evaluation.cost_failure", e.cost_failure),
    ] {
        if !(cost.is_finite() && cost >= 0.0) {
            errors.push(format!("{name} = {cost} must be a finite, non-negative number"));
        }
    }

    if config.output.output_dir.as_os_str().is_empty() {
        errors.push("output.output_dir must not be empty".to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_typo_gets_suggestion() {
        let warnings = validate_unknown_keys("[training]\nepohcs = 10\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "training.epohcs");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("training.epochs"));
        assert!(warnings[0].to_string().contains("did you mean"));
    }

    #[test]
    fn test_known_keys_produce_no_warnings() {
        let raw = toml::to_string(&PipelineConfig::default()).expect("serialize");
        assert!(validate_unknown_keys(&raw).is_empty(), "{:?}", validate_unknown_keys(&raw));
    }

    #[test]
    fn test_unrelated_key_has_no_suggestion() {
        let warnings = validate_unknown_keys("[completely_unrelated]\nx = 1\n");
        assert!(warnings.iter().all(|w| w.suggestion.is_none()));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_default_config_passes_ranges() {
        assert!(validate_ranges(&PipelineConfig::default()).is_empty());
    }

    #[test]
    fn test_range_errors_are_collected() {
        let mut config = PipelineConfig::default();
        config.windowing.sequence_length = 0;
        config.model.dropout = 1.0;
        config.training.validation_fraction = 0.0;
        config.evaluation.cost_failure = f64::NAN;
        config.evaluation.decision_threshold = 1.5;
        assert_eq!(validate_ranges(&config).len(), 5);
    }

    #[test]
    fn test_min_learning_rate_above_initial_is_rejected() {
        let mut config = PipelineConfig::default();
        config.training.learning_rate = 1e-4;
        config.training.min_learning_rate = 1e-3;
        let errors = validate_ranges(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("min_learning_rate"));

        config.training.min_learning_rate = 1e-4;
        assert!(validate_ranges(&config).is_empty());
    }
}
