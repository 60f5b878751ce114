//! Exhaustive sweep of an all-finite search space.
//!
//! Dimensions are walked in row-major index order, least significant first.
//! The search converges once every point of the final pass has been
//! analysed.

use crate::config::{keys, KeyMap};
use crate::error::{Result, SearchError};
use crate::perf::{is_better, Perf};
use crate::point::{Point, Trial};
use crate::space::SearchSpace;
use crate::strategies::{Flow, Strategy};
use crate::vertex::Vertex;

pub struct Exhaustive {
    space: SearchSpace,
    perf_n: usize,
    passes: u64,

    /// Index odometer for the next point to emit.
    indices: Vec<u64>,
    limits: Vec<u64>,
    head: Vec<u64>,
    remaining_passes: u64,
    outstanding: u64,
    next_id: u64,
    converged: bool,

    best_point: Point,
    best_perf: Perf,
    has_best: bool,
}

impl Exhaustive {
    pub fn new(space: &SearchSpace, cfg: &KeyMap) -> Result<Self> {
        space.validate()?;
        if !space.all_finite() {
            return Err(SearchError::Space(
                "exhaustive search requires every dimension to be finite".into(),
            ));
        }
        let perf_n = cfg.int_or(keys::PERF_COUNT, 1)?.max(1) as usize;

        let passes = cfg.int_or(keys::PASSES, 1)?;
        if passes < 1 {
            return Err(SearchError::Config(format!(
                "{} must be at least 1",
                keys::PASSES
            )));
        }

        let limits: Vec<u64> = space
            .iter()
            .map(|d| d.range.limit().unwrap_or(1))
            .collect();

        // Optional starting corner for the first pass.
        let head = match cfg.get(keys::INIT_POINT) {
            Some(text) => {
                let vertex = Vertex::parse(text, space, perf_n)?;
                vertex.coords().iter().map(|c| *c as u64).collect()
            }
            None => vec![0; space.len()],
        };

        let mut sweep = Self {
            space: space.clone(),
            perf_n,
            passes: passes as u64,
            indices: head.clone(),
            limits,
            head,
            remaining_passes: passes as u64,
            outstanding: 0,
            next_id: 1,
            converged: false,
            best_point: Point::unset(),
            best_perf: Perf::new(perf_n),
            has_best: false,
        };
        sweep.reinit();
        Ok(sweep)
    }

    fn reinit(&mut self) {
        self.indices.copy_from_slice(&self.head);
        self.remaining_passes = self.passes;
        self.outstanding = 0;
        self.next_id = 1;
        self.converged = false;
        self.best_point = Point::unset();
        self.best_perf = Perf::new(self.perf_n);
        self.has_best = false;
    }

    fn make_point(&mut self) -> Point {
        let terms = self
            .indices
            .iter()
            .zip(self.space.iter())
            .map(|(idx, dim)| dim.range.value_at(*idx as f64))
            .collect();
        let point = Point {
            id: self.next_id,
            terms,
        };
        self.next_id += 1;
        point
    }

    /// Advance the odometer; decrements the pass counter on wrap-around.
    fn increment(&mut self) {
        for (idx, limit) in self.indices.iter_mut().zip(self.limits.iter()) {
            *idx += 1;
            if *idx < *limit {
                return;
            }
            *idx = 0;
        }
        self.remaining_passes = self.remaining_passes.saturating_sub(1);
    }
}

impl Strategy for Exhaustive {
    fn generate(&mut self) -> Result<Flow> {
        if self.remaining_passes == 0 {
            return Ok(Flow::Wait);
        }
        let point = self.make_point();
        self.increment();
        self.outstanding += 1;
        Ok(Flow::Accept(point))
    }

    fn rejected(&mut self, point: &Point, hint: Option<&Point>) -> Result<Flow> {
        if let Some(hint) = hint {
            let mut replacement = hint.clone();
            replacement.id = point.id;
            return Ok(Flow::Accept(replacement));
        }
        // Skip ahead: replace the rejected configuration with the next one
        // in the sweep, keeping the in-flight id.
        if self.remaining_passes == 0 {
            self.outstanding = self.outstanding.saturating_sub(1);
            return Ok(Flow::Wait);
        }
        let mut replacement = self.make_point();
        self.next_id -= 1;
        replacement.id = point.id;
        self.increment();
        Ok(Flow::Accept(replacement))
    }

    fn analyze(&mut self, trial: &Trial) -> Result<()> {
        let perf = trial.perf.unify();
        if !self.has_best || is_better(perf, self.best_perf.unify()) {
            self.best_perf.copy_from(&trial.perf);
            self.best_point = trial.point.clone();
            self.has_best = true;
        }

        self.outstanding = self.outstanding.saturating_sub(1);
        if self.remaining_passes == 0 && self.outstanding == 0 {
            self.converged = true;
        }
        Ok(())
    }

    fn best(&self) -> Option<&Point> {
        self.has_best.then_some(&self.best_point)
    }

    fn best_perf(&self) -> Option<&Perf> {
        self.has_best.then_some(&self.best_perf)
    }

    fn restart(&mut self) -> Result<()> {
        self.reinit();
        Ok(())
    }

    fn converged(&self) -> bool {
        self.converged
    }
}
