//! Search strategies and the contract they present to the host pipeline.

use crate::config::{keys, KeyMap};
use crate::error::{Result, SearchError};
use crate::perf::Perf;
use crate::point::{Point, Trial};
use crate::space::SearchSpace;

pub mod angel;
pub mod exhaustive;
pub mod pro;
pub mod random;

pub use angel::Angel;
pub use exhaustive::Exhaustive;
pub use pro::Pro;
pub use random::RandomSearch;

/// Outcome of a `generate` or `rejected` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// A candidate point ready for measurement.
    Accept(Point),
    /// Nothing to emit: previously generated candidates are outstanding (or
    /// the search has converged).
    Wait,
}

/// The interface every strategy provides to the host pipeline.
///
/// Calls are non-blocking and made in sequence by a single driver;
/// measurement of an emitted point happens outside the strategy.  Between a
/// `generate` and the matching `analyze`/`rejected`, asking again yields
/// [`Flow::Wait`] (PRO hands out a whole simplex of candidates before it
/// waits).
pub trait Strategy {
    /// Produce the next candidate point.
    fn generate(&mut self) -> Result<Flow>;

    /// Replace a candidate deemed invalid downstream.  With a hint, the
    /// hint's coordinates are adopted under the in-flight id; otherwise the
    /// configured reject policy (penalty or random) chooses the replacement.
    fn rejected(&mut self, point: &Point, hint: Option<&Point>) -> Result<Flow>;

    /// Record the measured performance for a previously generated point and
    /// advance the state machine.
    fn analyze(&mut self, trial: &Trial) -> Result<()>;

    /// Best point analysed so far (`None` before the first measurement).
    fn best(&self) -> Option<&Point>;

    /// Performance of [`Strategy::best`].
    fn best_perf(&self) -> Option<&Perf>;

    /// Reset the search state, retaining allocations.  Best-point history is
    /// cleared; the session preserves it across restarts when asked.
    fn restart(&mut self) -> Result<()>;

    fn converged(&self) -> bool;

    /// Current objective phase, for strategies that search in phases.
    fn phase(&self) -> Option<usize> {
        None
    }
}

/// Replacement policy for rejected points.
///
/// Penalty preserves the simplex shape by feeding an infinite measurement to
/// the algorithm; random trades shape for a lower risk of repeated
/// rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectMethod {
    Penalty,
    Random,
}

impl RejectMethod {
    pub fn from_config(cfg: &KeyMap) -> Result<Self> {
        match cfg.get(keys::REJECT_METHOD).unwrap_or("penalty") {
            m if m.eq_ignore_ascii_case("penalty") => Ok(Self::Penalty),
            m if m.eq_ignore_ascii_case("random") => Ok(Self::Random),
            other => Err(SearchError::Config(format!(
                "invalid value {other:?} for key {}",
                keys::REJECT_METHOD
            ))),
        }
    }
}

/// Strategy selection at the adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Pro,
    Angel,
    Random,
    Exhaustive,
}

impl StrategyKind {
    pub fn from_config(cfg: &KeyMap) -> Result<Self> {
        match cfg.get(keys::STRATEGY).unwrap_or("pro") {
            s if s.eq_ignore_ascii_case("pro") => Ok(Self::Pro),
            s if s.eq_ignore_ascii_case("angel") => Ok(Self::Angel),
            s if s.eq_ignore_ascii_case("random") => Ok(Self::Random),
            s if s.eq_ignore_ascii_case("exhaustive") => Ok(Self::Exhaustive),
            other => Err(SearchError::Config(format!(
                "unknown strategy {other:?}"
            ))),
        }
    }

    pub fn build(self, space: &SearchSpace, cfg: &KeyMap) -> Result<Box<dyn Strategy>> {
        Ok(match self {
            Self::Pro => Box::new(Pro::new(space, cfg)?),
            Self::Angel => Box::new(Angel::new(space, cfg)?),
            Self::Random => Box::new(RandomSearch::new(space, cfg)?),
            Self::Exhaustive => Box::new(Exhaustive::new(space, cfg)?),
        })
    }
}
