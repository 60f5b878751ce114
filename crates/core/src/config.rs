//! String-keyed configuration map shared between the session and its host.
//!
//! The map is the adapter-boundary representation: strategies parse it once
//! at init into their own typed config structs and never touch it again.
//! Output-only keys (`CONVERGED`, `ANGEL_PHASE`) are written back by the
//! session after each analyze step.

use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known configuration keys.
pub mod keys {
    /// Session-level strategy selection: `pro`, `angel`, `random`, `exhaustive`.
    pub const STRATEGY: &str = "STRATEGY";

    /// Textual coordinate list used as the simplex centre (or start point).
    pub const INIT_POINT: &str = "INIT_POINT";
    /// ANGEL initial simplex radius, as a fraction of the space diameter.
    pub const INIT_RADIUS: &str = "INIT_RADIUS";
    /// PRO initial simplex radius, as a fraction of the space diameter.
    pub const PRO_INIT_PERCENT: &str = "PRO_INIT_PERCENT";
    /// PRO initial simplex construction: `random`, `point`, or `point_fast`.
    pub const PRO_INIT_METHOD: &str = "PRO_INIT_METHOD";
    /// PRO simplex cardinality (clamped up to `space.len + 1`).
    pub const PRO_SIMPLEX_SIZE: &str = "PRO_SIMPLEX_SIZE";

    pub const REFLECT: &str = "REFLECT";
    pub const EXPAND: &str = "EXPAND";
    pub const CONTRACT: &str = "CONTRACT";
    pub const SHRINK: &str = "SHRINK";

    /// Replacement policy for rejected points: `penalty` or `random`.
    pub const REJECT_METHOD: &str = "REJECT_METHOD";

    /// Convergence: variance of vertex performance values.
    pub const FVAL_TOL: &str = "FVAL_TOL";
    /// Convergence: simplex radius as a fraction of the space diameter.
    pub const SIZE_TOL: &str = "SIZE_TOL";
    /// Convergence: reflection travel distance as a fraction of the space
    /// diameter.  Overrides the fval/size method when set.
    pub const DIST_TOL: &str = "DIST_TOL";
    /// Consecutive below-tolerance reflections required by `DIST_TOL`.
    pub const TOL_CNT: &str = "TOL_CNT";

    /// Number of objectives in the performance vector.
    pub const PERF_COUNT: &str = "PERF_COUNT";
    /// Comma-separated per-phase leeway values in [0, 1].
    pub const ANGEL_LEEWAY: &str = "ANGEL_LEEWAY";
    pub const ANGEL_MULT: &str = "ANGEL_MULT";
    pub const ANGEL_LOOSE: &str = "ANGEL_LOOSE";
    pub const ANGEL_ANCHOR: &str = "ANGEL_ANCHOR";
    pub const ANGEL_SAMESIMPLEX: &str = "ANGEL_SAMESIMPLEX";

    /// RNG seed; wall clock when unset.
    pub const RANDOM_SEED: &str = "RANDOM_SEED";
    /// Exhaustive: number of full sweeps over the space.
    pub const PASSES: &str = "PASSES";

    /// Output-only: set to `1` when the search terminates.
    pub const CONVERGED: &str = "CONVERGED";
    /// Output-only: ANGEL's current phase index.
    pub const ANGEL_PHASE: &str = "ANGEL_PHASE";

    /// Written by the session for PRO: candidate simplexes must be fetched
    /// atomically by the host pipeline.
    pub const PREFETCH_ATOMIC: &str = "PREFETCH_ATOMIC";
    pub const PREFETCH_COUNT: &str = "PREFETCH_COUNT";
}

/// String-keyed configuration with typed accessors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMap {
    map: BTreeMap<String, String>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, val: impl Into<String>) {
        self.map.insert(key.to_owned(), val.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Real-valued key, or `None` when unset.
    pub fn real(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| bad_value(key, raw)),
        }
    }

    /// Real-valued key with a default for the unset case.
    pub fn real_or(&self, key: &str, default: f64) -> Result<f64> {
        Ok(self.real(key)?.unwrap_or(default))
    }

    pub fn int(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| bad_value(key, raw)),
        }
    }

    pub fn int_or(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self.int(key)?.unwrap_or(default))
    }

    /// Boolean key.  Accepts `1/0`, `true/false`, `yes/no`, `on/off`
    /// (case-insensitive).
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(bad_value(key, raw)),
            },
        }
    }

    /// Comma- or whitespace-separated list of reals, or `None` when unset.
    pub fn real_list(&self, key: &str) -> Result<Option<Vec<f64>>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        let mut vals = Vec::new();
        for tok in raw.split([',', ' ', '\t']).filter(|t| !t.is_empty()) {
            vals.push(tok.parse::<f64>().map_err(|_| bad_value(key, raw))?);
        }
        Ok(Some(vals))
    }
}

impl FromIterator<(String, String)> for KeyMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

fn bad_value(key: &str, raw: &str) -> SearchError {
    SearchError::Config(format!("invalid value {raw:?} for key {key}"))
}
