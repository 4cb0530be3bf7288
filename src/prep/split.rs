//! Stratified train/validation split over window indices.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Index partition produced by [`stratified_split`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Hold out `validation_fraction` of each class independently so both halves
/// keep the label ratio of `labels`.
///
/// Each class contributes `round(fraction * class_size)` indices to the
/// validation half. Indices within each half are shuffled.
pub fn stratified_split(labels: &[u8], validation_fraction: f64, rng: &mut StdRng) -> SplitIndices {
    let fraction = validation_fraction.clamp(0.0, 1.0);
    let mut split = SplitIndices::default();

    for class in [0_u8, 1] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == class)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(rng);

        let held = ((members.len() as f64) * fraction).round() as usize;
        let held = held.min(members.len());
        split.validation.extend_from_slice(&members[..held]);
        split.train.extend_from_slice(&members[held..]);
    }

    split.train.shuffle(rng);
    split.validation.shuffle(rng);
    split
}
