/// Lab pixel-grid signature payload
///
/// A signature summarizes a rectangular image region as a small grid of
/// averaged CIE Lab samples, one per unit cell of the owning aspect
/// (a 4:3 aspect yields a 4x3 grid). Matching compares two grids
/// numerically instead of diffing pixels.
///
/// Grids live decoded in memory. Encoding to the persisted JSON blob
/// happens exactly at write time, decoding exactly at read time; callers
/// never observe a half-encoded state.

use serde::{Deserialize, Serialize};

/// One averaged CIE Lab color sample
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

/// A columns x rows grid of Lab samples, stored row-major
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Pixels {
    pub columns: i64,
    pub rows: i64,
    pub samples: Vec<Lab>,
}

impl Pixels {
    pub fn new(columns: i64, rows: i64, samples: Vec<Lab>) -> Self {
        debug_assert_eq!((columns * rows) as usize, samples.len());
        Pixels {
            columns,
            rows,
            samples,
        }
    }

    /// Encode to the persisted blob form
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode from the persisted blob form
    pub fn decode(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Color distance to another signature: sum of squared per-sample
    /// Lab channel differences. Grids of different shapes are never
    /// comparable and return infinity.
    pub fn dist(&self, other: &Pixels) -> f64 {
        if self.columns != other.columns || self.rows != other.rows {
            return f64::INFINITY;
        }
        self.samples
            .iter()
            .zip(other.samples.iter())
            .map(|(p, q)| {
                let dl = p.l - q.l;
                let da = p.a - q.a;
                let db = p.b - q.b;
                dl * dl + da * da + db * db
            })
            .sum()
    }
}
