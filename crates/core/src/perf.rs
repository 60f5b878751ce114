//! Measured performance vectors.
//!
//! An objective value is finite when measured, `+inf` when the point was
//! rejected or penalised, and NaN while unmeasured.  Comparisons treat NaN
//! as worse than any other value.

use smallvec::{smallvec, SmallVec};

/// Performance vector with one slot per objective.
#[derive(Debug, Clone, PartialEq)]
pub struct Perf {
    obj: SmallVec<[f64; 4]>,
}

impl Perf {
    /// A fresh, unmeasured vector (all NaN).
    pub fn new(perf_n: usize) -> Self {
        Self {
            obj: smallvec![f64::NAN; perf_n],
        }
    }

    /// A single-objective measurement.
    pub fn scalar(value: f64) -> Self {
        Self {
            obj: smallvec![value],
        }
    }

    pub fn from_objectives(obj: &[f64]) -> Self {
        Self {
            obj: SmallVec::from_slice(obj),
        }
    }

    pub fn len(&self) -> usize {
        self.obj.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obj.is_empty()
    }

    pub fn obj(&self, k: usize) -> f64 {
        self.obj[k]
    }

    pub fn obj_mut(&mut self, k: usize) -> &mut f64 {
        &mut self.obj[k]
    }

    pub fn objectives(&self) -> &[f64] {
        &self.obj
    }

    /// Mark every objective invalid (`+inf`).  Used both for rejected points
    /// under the penalty policy and as the pre-measurement state of an
    /// emitted candidate.
    pub fn reset(&mut self) {
        self.obj.fill(f64::INFINITY);
    }

    pub fn copy_from(&mut self, other: &Perf) {
        self.obj.clear();
        self.obj.extend_from_slice(&other.obj);
    }

    /// True once every objective has been assigned (no NaN slots).
    pub fn is_measured(&self) -> bool {
        self.obj.iter().all(|v| !v.is_nan())
    }

    /// Collapse the vector to a single scalar (the objective sum).  Used
    /// only by the baseline strategies and the best-tracking shortcut; the
    /// simplex algorithms always compare a single objective.
    pub fn unify(&self) -> f64 {
        self.obj.iter().sum()
    }
}

/// `a` is strictly better (smaller) than `b`, with NaN ordered after
/// everything else.
pub fn is_better(a: f64, b: f64) -> bool {
    if a.is_nan() {
        false
    } else if b.is_nan() {
        true
    } else {
        a < b
    }
}
