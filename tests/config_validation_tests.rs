//! Config Validation Tests
//!
//! Typo detection and range validation of `PipelineConfig`, exercised
//! independently from the rest of the pipeline.

use turbofan_warning::config::validation::{known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys};
use turbofan_warning::config::{ConfigError, PipelineConfig};
use turbofan_warning::dataset::Variant;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_training_key_warns_with_suggestion() {
    let toml_str = r#"
[training]
batch_szie = 32
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("batch_szie"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("training.batch_size"));
}

#[test]
fn typo_in_section_name_warns() {
    let toml_str = r#"
[windowng]
sequence_length = 30
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().any(|w| w.suggestion.as_deref() == Some("windowing")));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[data]
data_dir = "/srv/cmapss"
variant = "FD002"

[labeling]
failure_threshold = 25

[windowing]
sequence_length = 40

[model]
lstm1_units = 64
lstm2_units = 32
dense_units = 16
dropout = 0.2

[training]
epochs = 30
batch_size = 128
seed = 7

[evaluation]
decision_threshold = 0.6
cost_preventive = 500.0
cost_failure = 20000.0

[output]
output_dir = "runs/fd002"
write_plots = false
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());

    let config = PipelineConfig::from_toml_str(toml_str).expect("valid config");
    assert_eq!(config.data.variant, Variant::Fd002);
    assert_eq!(config.model.lstm1_units, 64);
    assert_eq!(config.evaluation.cost_model().cost_failure, 20000.0);
    assert!(!config.output.write_plots);
    assert!(config.output.save_checkpoint);
}

#[test]
fn unknown_keys_do_not_prevent_loading() {
    let config = PipelineConfig::from_toml_str("[training]\nepochz = 3\n").expect("still loads");
    assert_eq!(config.training.epochs, 50);
}

#[test]
fn suggestion_requires_close_match() {
    let known = known_config_keys();
    assert_eq!(suggest_correction("output.output_dri", &known).as_deref(), Some("output.output_dir"));
    assert!(suggest_correction("something_else_entirely", &known).is_none());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn out_of_range_values_are_all_reported() {
    let toml_str = r#"
[windowing]
sequence_length = 0

[training]
validation_fraction = 1.0
batch_size = 0

[evaluation]
cost_preventive = -1.0
"#;
    match PipelineConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 4, "{errors:?}");
            assert!(errors.iter().any(|e| e.contains("sequence_length")));
            assert!(errors.iter().any(|e| e.contains("validation_fraction")));
            assert!(errors.iter().any(|e| e.contains("batch_size")));
            assert!(errors.iter().any(|e| e.contains("cost_preventive")));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn unknown_variant_is_a_parse_error() {
    let err = PipelineConfig::from_toml_str("[data]\nvariant = \"FD009\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)));
}

#[test]
fn default_config_is_valid() {
    assert!(validate_ranges(&PipelineConfig::default()).is_empty());
}
