//! Configuration points exchanged with the host pipeline.

use crate::error::{Result, SearchError};
use crate::perf::Perf;
use crate::space::{SearchSpace, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A candidate configuration: one term per dimension, tagged with a search
/// id.  Id `0` is the unassigned sentinel; real ids are strictly positive
/// and monotonically increasing per search instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: u64,
    pub terms: Vec<Value>,
}

impl Point {
    pub fn new(terms: Vec<Value>) -> Self {
        Self { id: 0, terms }
    }

    /// The unassigned sentinel point.
    pub fn unset() -> Self {
        Self {
            id: 0,
            terms: Vec::new(),
        }
    }

    pub fn is_set(&self) -> bool {
        self.id != 0
    }

    /// Parse a comma-separated coordinate list against a space, e.g.
    /// `"80"` or `"1.5, 32, fast"`.
    pub fn parse(input: &str, space: &SearchSpace) -> Result<Self> {
        let tokens: Vec<&str> = input.split(',').map(str::trim).collect();
        if tokens.len() != space.len() {
            return Err(SearchError::PointParse(format!(
                "expected {} terms, found {}",
                space.len(),
                tokens.len()
            )));
        }
        let mut terms = Vec::with_capacity(tokens.len());
        for (tok, dim) in tokens.iter().zip(space.iter()) {
            terms.push(dim.range.parse_value(tok)?);
        }
        Ok(Self::new(terms))
    }

    /// True when every term lies on a legal value of its dimension.
    pub fn is_aligned(&self, space: &SearchSpace) -> bool {
        self.terms.len() == space.len()
            && self
                .terms
                .iter()
                .zip(space.iter())
                .all(|(t, d)| d.range.coord_of(t).is_ok())
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} (", self.id)?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{term}")?;
        }
        write!(f, ")")
    }
}

/// A measured trial returned by the host pipeline.
#[derive(Debug, Clone)]
pub struct Trial {
    pub point: Point,
    pub perf: Perf,
}

impl Trial {
    pub fn new(point: Point, perf: Perf) -> Self {
        Self { point, perf }
    }
}
