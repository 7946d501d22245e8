// Score positions measured in quarter notes from the start of a piece.
//
// Offsets are the row keys of every event table, so they need a total order
// and exact equality. `Offset` wraps a finite `f64`: construction rejects NaN
// and infinities, and `-0.0` is folded into `0.0` so that equality, ordering
// and hashing all agree on the bit pattern.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Offset(f64);

impl Offset {
    pub const ZERO: Offset = Offset(0.0);

    pub fn new(quarters: f64) -> IndexResult<Self> {
        if !quarters.is_finite() {
            return Err(IndexError::NonFiniteOffset(quarters));
        }
        // Adding 0.0 turns -0.0 into +0.0 and leaves everything else alone.
        Ok(Offset(quarters + 0.0))
    }

    /// Offset of `ticks` at `ticks_per_quarter` resolution.
    pub fn from_ticks(ticks: u64, ticks_per_quarter: u16) -> Self {
        Offset(ticks as f64 / f64::from(ticks_per_quarter.max(1)))
    }

    pub fn quarters(self) -> f64 {
        self.0
    }

    /// Distance from `earlier` to `self` in quarter notes.
    pub fn since(self, earlier: Offset) -> f64 {
        self.0 - earlier.0
    }
}

impl PartialEq for Offset {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Offset {}

impl PartialOrd for Offset {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Offset {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Offset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl TryFrom<f64> for Offset {
    type Error = IndexError;

    fn try_from(value: f64) -> IndexResult<Self> {
        Offset::new(value)
    }
}

impl From<Offset> for f64 {
    fn from(offset: Offset) -> f64 {
        offset.0
    }
}

impl From<u32> for Offset {
    fn from(quarters: u32) -> Self {
        Offset(f64::from(quarters))
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_finite() {
        assert!(Offset::new(f64::NAN).is_err());
        assert!(Offset::new(f64::INFINITY).is_err());
        assert!(Offset::new(2.5).is_ok());
    }

    #[test]
    fn test_negative_zero_equals_zero() {
        let neg = Offset::new(-0.0).unwrap();
        assert_eq!(neg, Offset::ZERO);
        assert_eq!(neg.cmp(&Offset::ZERO), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_total_order() {
        let mut offsets: Vec<Offset> = [3.0, 0.5, 1.0, 0.0]
            .into_iter()
            .map(|q| Offset::new(q).unwrap())
            .collect();
        offsets.sort();
        let quarters: Vec<f64> = offsets.iter().map(|o| o.quarters()).collect();
        assert_eq!(quarters, vec![0.0, 0.5, 1.0, 3.0]);
    }

    #[test]
    fn test_from_ticks() {
        assert_eq!(Offset::from_ticks(720, 480), Offset::new(1.5).unwrap());
    }

    #[test]
    fn test_serde_validates() {
        let ok: Offset = serde_json::from_str("1.25").unwrap();
        assert_eq!(ok.quarters(), 1.25);
        assert_eq!(serde_json::to_string(&ok).unwrap(), "1.25");
    }
}
