//! Uniform random search.
//!
//! Selects a value for each dimension according to its bounds, never
//! converges, and mainly serves as a basis of comparison for the simplex
//! strategies.

use crate::config::{keys, KeyMap};
use crate::error::Result;
use crate::perf::{is_better, Perf};
use crate::point::{Point, Trial};
use crate::rng;
use crate::space::SearchSpace;
use crate::strategies::{Flow, Strategy};
use crate::vertex::Vertex;
use rand_chacha::ChaCha8Rng;

pub struct RandomSearch {
    space: SearchSpace,
    rng: ChaCha8Rng,
    init_point: Option<Vertex>,
    perf_n: usize,

    next: Vertex,
    next_id: u64,

    best_point: Point,
    best_perf: Perf,
    has_best: bool,
}

impl RandomSearch {
    pub fn new(space: &SearchSpace, cfg: &KeyMap) -> Result<Self> {
        space.validate()?;
        let perf_n = cfg.int_or(keys::PERF_COUNT, 1)?.max(1) as usize;
        let init_point = match cfg.get(keys::INIT_POINT) {
            Some(text) => Some(Vertex::parse(text, space, perf_n)?),
            None => None,
        };

        let mut search = Self {
            space: space.clone(),
            rng: rng::from_config(cfg)?,
            init_point,
            perf_n,
            next: Vertex::new(space.len(), perf_n),
            next_id: 1,
            best_point: Point::unset(),
            best_perf: Perf::new(perf_n),
            has_best: false,
        };
        search.reinit();
        Ok(search)
    }

    fn reinit(&mut self) {
        match &self.init_point {
            Some(v) => self.next.copy_from(v),
            None => self.next.randomize(&self.space, &mut self.rng),
        }
        self.next_id = 1;
        self.best_point = Point::unset();
        self.best_perf = Perf::new(self.perf_n);
        self.has_best = false;
    }
}

impl Strategy for RandomSearch {
    fn generate(&mut self) -> Result<Flow> {
        self.next.id = self.next_id;
        let point = self.next.to_point(&self.space);

        // Prepare a fresh random vertex for the next call.
        self.next.randomize(&self.space, &mut self.rng);
        self.next_id += 1;

        Ok(Flow::Accept(point))
    }

    fn rejected(&mut self, point: &Point, hint: Option<&Point>) -> Result<Flow> {
        let mut replacement = Vertex::new(self.space.len(), self.perf_n);
        match hint {
            Some(hint) => replacement.set_from_point(&self.space, hint)?,
            None => replacement.randomize(&self.space, &mut self.rng),
        }
        replacement.id = point.id;
        Ok(Flow::Accept(replacement.to_point(&self.space)))
    }

    fn analyze(&mut self, trial: &Trial) -> Result<()> {
        let perf = trial.perf.unify();
        if !self.has_best || is_better(perf, self.best_perf.unify()) {
            self.best_perf.copy_from(&trial.perf);
            self.best_point = trial.point.clone();
            self.has_best = true;
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
        false
    }
}
