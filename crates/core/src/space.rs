//! Search space definition: an ordered sequence of named dimensions.
//!
//! A dimension is either *finite* (an enumerated set of values indexed
//! `0..count-1`) or *continuous* (a real interval).  Geometry code works in
//! normalized coordinate space, where finite dimensions are addressed by
//! index and continuous dimensions by raw value; this module owns the
//! conversions between coordinates and concrete term values.

use crate::error::{Result, SearchError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One term of a configuration point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Real(f64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
        }
    }
}

/// The legal values of a single dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Range {
    Int { min: i64, max: i64, step: i64 },
    Enum { options: Vec<String> },
    Real { min: f64, max: f64 },
}

impl Range {
    pub fn is_finite(&self) -> bool {
        !matches!(self, Range::Real { .. })
    }

    /// Number of legal values for a finite range.
    pub fn limit(&self) -> Option<u64> {
        match self {
            Range::Int { min, max, step } => Some(((max - min) / step) as u64 + 1),
            Range::Enum { options } => Some(options.len() as u64),
            Range::Real { .. } => None,
        }
    }

    /// Lower bound in normalized coordinate space.
    pub fn coord_min(&self) -> f64 {
        match self {
            Range::Real { min, .. } => *min,
            _ => 0.0,
        }
    }

    /// Upper bound in normalized coordinate space.
    pub fn coord_max(&self) -> f64 {
        match self {
            Range::Real { max, .. } => *max,
            _ => (self.limit().unwrap_or(1) - 1) as f64,
        }
    }

    pub fn coord_inbounds(&self, coord: f64) -> bool {
        coord >= self.coord_min() && coord <= self.coord_max()
    }

    /// Project a coordinate onto the nearest legal value: finite dimensions
    /// round to the nearest index, continuous dimensions clamp.
    pub fn align(&self, coord: f64) -> f64 {
        match self {
            Range::Real { min, max } => coord.clamp(*min, *max),
            _ => coord.round().clamp(0.0, self.coord_max()),
        }
    }

    /// The term value at an aligned coordinate.
    pub fn value_at(&self, coord: f64) -> Value {
        match self {
            Range::Int { min, step, .. } => Value::Int(min + coord as i64 * step),
            Range::Enum { options } => Value::Str(options[coord as usize].clone()),
            Range::Real { .. } => Value::Real(coord),
        }
    }

    /// The coordinate of a term value, if the value is legal here.
    pub fn coord_of(&self, value: &Value) -> Result<f64> {
        match (self, value) {
            (Range::Int { min, max, step }, Value::Int(v)) => {
                if v < min || v > max || (v - min) % step != 0 {
                    Err(SearchError::PointParse(format!(
                        "{v} is not a legal value of [{min}, {max}] step {step}"
                    )))
                } else {
                    Ok(((v - min) / step) as f64)
                }
            }
            (Range::Enum { options }, Value::Str(v)) => options
                .iter()
                .position(|o| o == v)
                .map(|i| i as f64)
                .ok_or_else(|| {
                    SearchError::PointParse(format!("{v:?} is not a member of the enumeration"))
                }),
            (Range::Real { min, max }, Value::Real(v)) => {
                if v < min || v > max {
                    Err(SearchError::PointParse(format!(
                        "{v} is outside [{min}, {max}]"
                    )))
                } else {
                    Ok(*v)
                }
            }
            // Integer literals are accepted for real dimensions.
            (Range::Real { .. }, Value::Int(v)) => self.coord_of(&Value::Real(*v as f64)),
            _ => Err(SearchError::PointParse(
                "term type does not match dimension".into(),
            )),
        }
    }

    /// Parse a textual term belonging to this range.
    pub fn parse_value(&self, token: &str) -> Result<Value> {
        let token = token.trim();
        match self {
            Range::Int { .. } => token
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| SearchError::PointParse(format!("bad integer term {token:?}"))),
            Range::Real { .. } => token
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|_| SearchError::PointParse(format!("bad real term {token:?}"))),
            Range::Enum { .. } => Ok(Value::Str(token.to_owned())),
        }
    }

    /// Uniform random coordinate: finite dimensions sample an index,
    /// continuous dimensions sample the interval.
    pub fn random_coord<R: Rng>(&self, rng: &mut R) -> f64 {
        match self {
            Range::Real { min, max } => rng.random_range(*min..=*max),
            _ => rng.random_range(0..self.limit().unwrap_or(1)) as f64,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        match self {
            Range::Int { min, max, step } => {
                if max < min {
                    return Err(SearchError::Space(format!(
                        "dimension {name}: max {max} < min {min}"
                    )));
                }
                if *step < 1 {
                    return Err(SearchError::Space(format!(
                        "dimension {name}: step must be positive"
                    )));
                }
            }
            Range::Enum { options } => {
                if options.is_empty() {
                    return Err(SearchError::Space(format!(
                        "dimension {name}: empty enumeration"
                    )));
                }
            }
            Range::Real { min, max } => {
                if !min.is_finite() || !max.is_finite() || max < min {
                    return Err(SearchError::Space(format!(
                        "dimension {name}: bad interval [{min}, {max}]"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A named dimension of the search space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(flatten)]
    pub range: Range,
}

/// An ordered set of dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSpace {
    dims: Vec<Dimension>,
}

impl SearchSpace {
    pub fn new(dims: Vec<Dimension>) -> Result<Self> {
        let space = Self { dims };
        space.validate()?;
        Ok(space)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dims.is_empty() {
            return Err(SearchError::Space("search space has no dimensions".into()));
        }
        for dim in &self.dims {
            dim.range.validate(&dim.name)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn dim(&self, idx: usize) -> &Dimension {
        &self.dims[idx]
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dimension> {
        self.dims.iter()
    }

    /// True when every dimension is finite.
    pub fn all_finite(&self) -> bool {
        self.dims.iter().all(|d| d.range.is_finite())
    }
}
