//! Remaining-useful-life and imminent-failure label derivation.
//!
//! Training units ran to failure, so their last cycle is the failure point:
//! `rul = max_cycle - cycle`. Held-out units were truncated, so the failure
//! point lies `remaining` cycles past the last observed one:
//! `rul = max_cycle + remaining - cycle`.

use crate::dataset::{DatasetError, RemainingCycles};
use crate::types::{LabeledRecord, LabeledUnit, Unit};

/// Default RUL (cycles) at or below which a record counts as imminent failure.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 30;

/// Binary label for a given RUL: 1 when `rul <= threshold`.
#[inline]
pub const fn label_for_rul(rul: u32, threshold: u32) -> u8 {
    if rul <= threshold {
        1
    } else {
        0
    }
}

fn label_unit(unit: &Unit, failure_cycle: u32, threshold: u32) -> LabeledUnit {
    let records = unit
        .records
        .iter()
        .map(|r| {
            let rul = failure_cycle - r.cycle;
            LabeledRecord {
                cycle: r.cycle,
                features: r.features,
                rul,
                label: label_for_rul(rul, threshold),
            }
        })
        .collect();

    LabeledUnit { id: unit.id, records }
}

/// Label run-to-failure units.
pub fn label_training_units(units: &[Unit], threshold: u32) -> Vec<LabeledUnit> {
    units
        .iter()
        .map(|u| label_unit(u, u.max_cycle(), threshold))
        .collect()
}

/// Label truncated units using the remaining cycles keyed by unit id.
pub fn label_heldout_units(
    units: &[Unit],
    remaining: &RemainingCycles,
    threshold: u32,
) -> Result<Vec<LabeledUnit>, DatasetError> {
    units
        .iter()
        .map(|u| {
            let extra = remaining
                .get(u.id)
                .ok_or(DatasetError::MissingRemaining(u.id))?;
            let failure_cycle = u
                .max_cycle()
                .checked_add(extra)
                .ok_or(DatasetError::RemainingOverflow { unit: u.id, remaining: extra })?;
            Ok(label_unit(u, failure_cycle, threshold))
        })
        .collect()
}
