//! Data preparation: labeling, standardization, windowing, and splitting.
//!
//! The order matters and is enforced by the types: the scaler is fitted on
//! labeled training units only, then borrowed immutably to build windows for
//! both training and held-out units.

pub mod labeling;
pub mod scaler;
pub mod split;
pub mod windowing;

pub use labeling::{label_for_rul, label_heldout_units, label_training_units, DEFAULT_FAILURE_THRESHOLD};
pub use scaler::StandardScaler;
pub use split::{stratified_split, SplitIndices};
pub use windowing::{build_windows, window_count, windows_for_unit, NormalizedSeries, Window, WindowSet};
