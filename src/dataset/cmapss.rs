//! Parsers for the whitespace-delimited C-MAPSS text files.
//!
//! Record files carry 26 numeric columns per line: unit id, cycle,
//! 3 operational settings and 21 sensors. The remaining-cycles file carries
//! either one value per line (line k belongs to the k-th held-out unit in
//! ascending id order) or two columns `unit_id remaining`.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::DatasetError;
use crate::types::{CycleRecord, Unit, UnitId, NUM_FEATURES};

/// Columns per record line: unit id + cycle + features.
pub const RECORD_COLUMNS: usize = 2 + NUM_FEATURES;

/// Remaining cycles beyond truncation, keyed by held-out unit id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemainingCycles {
    by_unit: BTreeMap<UnitId, u32>,
}

impl RemainingCycles {
    pub fn new(by_unit: BTreeMap<UnitId, u32>) -> Self {
        Self { by_unit }
    }

    pub fn get(&self, unit: UnitId) -> Option<u32> {
        self.by_unit.get(&unit).copied()
    }

    pub fn len(&self) -> usize {
        self.by_unit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_unit.is_empty()
    }
}

impl FromIterator<(UnitId, u32)> for RemainingCycles {
    fn from_iter<I: IntoIterator<Item = (UnitId, u32)>>(iter: I) -> Self {
        Self { by_unit: iter.into_iter().collect() }
    }
}

fn open_lines(path: &Path) -> Result<impl Iterator<Item = (usize, std::io::Result<String>)>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file).lines().enumerate().map(|(i, l)| (i + 1, l)))
}

/// Parse a token that must hold a whole number, tolerating the `"12.0"`
/// spelling some exports use.
fn parse_whole(token: &str) -> Option<u32> {
    if let Ok(v) = token.parse::<u32>() {
        return Some(v);
    }
    let v = token.parse::<f64>().ok()?;
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) {
        Some(v as u32)
    } else {
        None
    }
}

/// Parse one record line. Returns `Ok(None)` for blank lines.
pub fn parse_record_line(line: &str, line_num: usize, path: &Path) -> Result<Option<CycleRecord>, DatasetError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(None);
    }
    if tokens.len() != RECORD_COLUMNS {
        return Err(DatasetError::ColumnCount {
            path: path.to_path_buf(),
            line: line_num,
            expected: RECORD_COLUMNS,
            found: tokens.len(),
        });
    }

    let parse_err = |column: usize, token: &str| DatasetError::Parse {
        path: path.to_path_buf(),
        line: line_num,
        message: format!("column {}: '{}' is not a valid value", column + 1, token),
    };

    let unit_id = parse_whole(tokens[0]).ok_or_else(|| parse_err(0, tokens[0]))?;
    let cycle = parse_whole(tokens[1]).ok_or_else(|| parse_err(1, tokens[1]))?;
    if cycle == 0 {
        return Err(parse_err(1, tokens[1]));
    }

    let mut features = [0.0_f64; NUM_FEATURES];
    for (i, &token) in tokens[2..].iter().enumerate() {
        let v: f64 = token.parse().map_err(|_| parse_err(i + 2, token))?;
        if !v.is_finite() {
            return Err(parse_err(i + 2, token));
        }
        features[i] = v;
    }

    Ok(Some(CycleRecord { unit_id, cycle, features }))
}

/// Load every record from a training or held-out file.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<CycleRecord>, DatasetError> {
    let path = path.as_ref();
    let mut records = Vec::new();

    for (line_num, line) in open_lines(path)? {
        let line = line.map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(record) = parse_record_line(&line, line_num, path)? {
            records.push(record);
        }
    }

    if records.is_empty() {
        return Err(DatasetError::Empty(path.to_path_buf()));
    }

    tracing::debug!(file = %path.display(), records = records.len(), "Record file parsed");
    Ok(records)
}

/// Group records by unit id (ascending) and order each unit by cycle.
///
/// Rejects a unit that repeats a cycle index, since RUL must strictly
/// decrease along a unit's history.
pub fn group_units(records: Vec<CycleRecord>) -> Result<Vec<Unit>, DatasetError> {
    let mut grouped: BTreeMap<UnitId, Vec<CycleRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.unit_id).or_default().push(record);
    }

    grouped
        .into_iter()
        .map(|(id, mut records)| {
            records.sort_by_key(|r| r.cycle);
            if let Some(pair) = records.windows(2).find(|w| w[0].cycle == w[1].cycle) {
                return Err(DatasetError::DuplicateCycle { unit: id, cycle: pair[0].cycle });
            }
            Ok(Unit { id, records })
        })
        .collect()
}

/// Load the per-unit remaining-cycles file for the given held-out units.
pub fn load_remaining_cycles(path: impl AsRef<Path>, heldout: &[Unit]) -> Result<RemainingCycles, DatasetError> {
    let path = path.as_ref();
    let mut single: Vec<u32> = Vec::new();
    let mut keyed: BTreeMap<UnitId, u32> = BTreeMap::new();

    for (line_num, line) in open_lines(path)? {
        let line = line.map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let parse_err = |token: &str| DatasetError::Parse {
            path: path.to_path_buf(),
            line: line_num,
            message: format!("'{token}' is not a non-negative cycle count"),
        };

        match tokens.as_slice() {
            [] => {}
            [remaining] => {
                if !keyed.is_empty() {
                    return Err(DatasetError::MixedRemainingFormat(path.to_path_buf()));
                }
                single.push(parse_whole(remaining).ok_or_else(|| parse_err(*remaining))?);
            }
            [unit, remaining] => {
                if !single.is_empty() {
                    return Err(DatasetError::MixedRemainingFormat(path.to_path_buf()));
                }
                let unit = parse_whole(unit).ok_or_else(|| parse_err(*unit))?;
                let remaining = parse_whole(remaining).ok_or_else(|| parse_err(*remaining))?;
                if keyed.insert(unit, remaining).is_some() {
                    return Err(DatasetError::Parse {
                        path: path.to_path_buf(),
                        line: line_num,
                        message: format!("unit {unit} listed twice"),
                    });
                }
            }
            _ => {
                return Err(DatasetError::ColumnCount {
                    path: path.to_path_buf(),
                    line: line_num,
                    expected: 1,
                    found: tokens.len(),
                });
            }
        }
    }

    let remaining = if keyed.is_empty() {
        // Positional format: line k belongs to the k-th unit id in ascending order.
        if single.len() != heldout.len() {
            return Err(DatasetError::RemainingCount {
                expected: heldout.len(),
                found: single.len(),
            });
        }
        heldout.iter().map(|u| u.id).zip(single).collect()
    } else {
        RemainingCycles::new(keyed)
    };

    let known: HashSet<UnitId> = heldout.iter().map(|u| u.id).collect();
    if let Some(unit) = heldout.iter().map(|u| u.id).find(|id| remaining.get(*id).is_none()) {
        return Err(DatasetError::MissingRemaining(unit));
    }
    if remaining.len() != known.len() {
        tracing::warn!(
            file = %path.display(),
            listed = remaining.len(),
            units = known.len(),
            "Remaining-cycles file lists units absent from the held-out records"
        );
    }

    Ok(remaining)
}
