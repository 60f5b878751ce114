//! Parallel Rank-Ordering simplex search.
//!
//! PRO differs from classical Nelder-Mead by testing an entire candidate
//! simplex per generation step: the host pipeline fetches a whole simplex of
//! points before reporting any of them back (the atomic prefetch contract).
//! Reports may arrive in any order; the state machine advances once the
//! round is complete.

use crate::config::{keys, KeyMap};
use crate::error::{Result, SearchError};
use crate::perf::{is_better, Perf};
use crate::point::{Point, Trial};
use crate::simplex::Simplex;
use crate::space::SearchSpace;
use crate::rng;
use crate::strategies::{Flow, RejectMethod, Strategy};
use crate::vertex::{space_diameter, Vertex};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimplexInit {
    Random,
    Point,
    PointFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProState {
    /// Evaluating the initial simplex.
    Init,
    /// Evaluating the reflection of the whole simplex through the best
    /// known vertex.
    Reflect,
    /// Evaluating a single trial expansion of the best reflected vertex.
    ExpandOne,
    /// Evaluating the fully expanded simplex.
    ExpandAll,
    /// Evaluating a shrunken simplex.
    Shrink,
    Converged,
}

struct ProConfig {
    init_method: SimplexInit,
    init_point: Option<Vertex>,
    init_percent: f64,
    reflect: f64,
    expand: f64,
    shrink: f64,
    fval_tol: f64,
    size_tol: f64,
    simplex_size: usize,
    perf_n: usize,
    reject_method: RejectMethod,
}

impl ProConfig {
    fn parse(space: &SearchSpace, cfg: &KeyMap) -> Result<Self> {
        let perf_n = cfg.int_or(keys::PERF_COUNT, 1)?;
        if perf_n < 1 {
            return Err(SearchError::Config(format!(
                "{} must be at least 1",
                keys::PERF_COUNT
            )));
        }
        let perf_n = perf_n as usize;

        let mut simplex_size = cfg.int_or(keys::PRO_SIMPLEX_SIZE, 0)?.max(0) as usize;
        if simplex_size < space.len() + 1 {
            simplex_size = space.len() + 1;
        }

        let init_method = match cfg.get(keys::PRO_INIT_METHOD).unwrap_or("point") {
            m if m.eq_ignore_ascii_case("random") => SimplexInit::Random,
            m if m.eq_ignore_ascii_case("point") => SimplexInit::Point,
            m if m.eq_ignore_ascii_case("point_fast") => SimplexInit::PointFast,
            other => {
                return Err(SearchError::Config(format!(
                    "invalid value {other:?} for key {}",
                    keys::PRO_INIT_METHOD
                )))
            }
        };

        let init_point = match cfg.get(keys::INIT_POINT) {
            Some(text) => Some(Vertex::parse(text, space, perf_n)?),
            None => None,
        };

        let init_percent = cfg.real_or(keys::PRO_INIT_PERCENT, 0.35)?;
        if init_percent <= 0.0 || init_percent > 1.0 {
            return Err(SearchError::Config(format!(
                "{} must be in (0, 1]",
                keys::PRO_INIT_PERCENT
            )));
        }

        let reflect = cfg.real_or(keys::REFLECT, 1.0)?;
        if !(reflect > 0.0) {
            return Err(SearchError::Config(format!(
                "{} must be positive",
                keys::REFLECT
            )));
        }

        let expand = cfg.real_or(keys::EXPAND, 2.0)?;
        if !(expand > 1.0) {
            return Err(SearchError::Config(format!(
                "{} must be greater than 1.0",
                keys::EXPAND
            )));
        }

        let shrink = cfg.real_or(keys::SHRINK, 0.5)?;
        if !(shrink > 0.0 && shrink < 1.0) {
            return Err(SearchError::Config(format!(
                "{} must be in (0, 1)",
                keys::SHRINK
            )));
        }

        let fval_tol = cfg.real_or(keys::FVAL_TOL, 1e-4)?;
        if !fval_tol.is_finite() {
            return Err(SearchError::Config(format!(
                "invalid value for key {}",
                keys::FVAL_TOL
            )));
        }

        let size_frac = cfg.real_or(keys::SIZE_TOL, 0.005)?;
        if !(size_frac > 0.0 && size_frac < 1.0) {
            return Err(SearchError::Config(format!(
                "{} must be in (0, 1)",
                keys::SIZE_TOL
            )));
        }

        Ok(Self {
            init_method,
            init_point,
            init_percent,
            reflect,
            expand,
            shrink,
            fval_tol,
            size_tol: size_frac * space_diameter(space),
            simplex_size,
            perf_n,
            reject_method: RejectMethod::from_config(cfg)?,
        })
    }
}

/// PRO search instance.
pub struct Pro {
    space: SearchSpace,
    cfg: ProConfig,
    rng: ChaCha8Rng,

    state: ProState,
    /// Reference simplex.
    base: Simplex,
    /// Candidate simplex currently being handed out / measured.
    test: Simplex,
    best_base: usize,
    /// Index of the best reflected vertex, kept across the trial expansion
    /// so the revert path can restore it.
    best_stash: usize,

    next_id: u64,
    send_idx: usize,
    reported: usize,
    measured: Vec<bool>,

    best_point: Point,
    best_perf: Perf,
    has_best: bool,

    centroid: Vertex,
}

impl Pro {
    pub fn new(space: &SearchSpace, cfg: &KeyMap) -> Result<Self> {
        space.validate()?;
        let cfg_parsed = ProConfig::parse(space, cfg)?;
        let size = cfg_parsed.simplex_size;
        let perf_n = cfg_parsed.perf_n;

        let mut pro = Self {
            space: space.clone(),
            rng: rng::from_config(cfg)?,
            base: Simplex::new(size, space.len(), perf_n),
            test: Simplex::new(size, space.len(), perf_n),
            best_base: 0,
            best_stash: 0,
            next_id: 1,
            send_idx: 0,
            reported: 0,
            measured: vec![false; size],
            best_point: Point::unset(),
            best_perf: Perf::new(perf_n),
            has_best: false,
            centroid: Vertex::new(space.len(), perf_n),
            state: ProState::Init,
            cfg: cfg_parsed,
        };
        pro.reinit()?;
        Ok(pro)
    }

    fn reinit(&mut self) -> Result<()> {
        match self.cfg.init_method {
            SimplexInit::Random => {
                for vertex in self.base.vertices_mut() {
                    vertex.id = 0;
                    vertex.randomize(&self.space, &mut self.rng);
                }
            }
            SimplexInit::Point | SimplexInit::PointFast => {
                let center = match &self.cfg.init_point {
                    Some(v) => v.clone(),
                    None => Vertex::center(&self.space, self.cfg.perf_n),
                };
                let fast = self.cfg.init_method == SimplexInit::PointFast;
                self.base
                    .set(&self.space, &center, self.cfg.init_percent, &mut self.rng, fast)?;
            }
        }

        self.state = ProState::Init;
        self.best_base = 0;
        self.best_stash = 0;
        self.next_id = 1;
        self.send_idx = 0;
        self.reported = 0;
        self.measured.fill(false);
        self.best_point = Point::unset();
        self.has_best = false;
        self.next_simplex()?;
        Ok(())
    }

    /// Next candidate from the current round, if one is still unsent.
    fn emit_next(&mut self) -> Option<Point> {
        if self.state == ProState::Converged || self.send_idx == self.test.len() {
            return None;
        }
        self.test[self.send_idx].id = self.next_id;
        self.next_id += 1;
        let point = self.test[self.send_idx].to_point(&self.space);
        self.send_idx += 1;
        Some(point)
    }

    /// Index of the candidate vertex holding `id`, if it was handed out in
    /// the current round.
    fn sent_index(&self, id: u64) -> Option<usize> {
        (0..self.send_idx).find(|&i| self.test[i].id == id)
    }

    fn round_complete(&mut self) -> Result<()> {
        let best_test = self.best_of_test();
        self.advance(best_test)?;
        self.reported = 0;
        self.send_idx = 0;
        self.measured.fill(false);
        Ok(())
    }

    fn best_of_test(&self) -> usize {
        let mut best = 0;
        for i in 1..self.test.len() {
            if is_better(self.test[i].perf.obj(0), self.test[best].perf.obj(0)) {
                best = i;
            }
        }
        best
    }

    /// Advance the state machine until it produces an in-bounds candidate
    /// simplex (or converges).  A fully out-of-bounds candidate is treated
    /// as if it had measured all-infinite.
    fn advance(&mut self, mut best_test: usize) -> Result<()> {
        loop {
            if self.state == ProState::Converged {
                break;
            }

            self.next_state(best_test)?;

            if self.state == ProState::Reflect {
                self.check_convergence();
                if self.state == ProState::Converged {
                    break;
                }
            }

            self.next_simplex()?;

            if !self.test.out_of_bounds(&self.space) {
                break;
            }
            for vertex in self.test.vertices_mut() {
                vertex.perf.reset();
            }
            best_test = 0;
        }
        Ok(())
    }

    fn next_state(&mut self, best_test: usize) -> Result<()> {
        match self.state {
            ProState::Init | ProState::Shrink => {
                // Accept the candidate simplex and prepare to reflect.
                self.base.copy_from(&self.test);
                self.best_base = best_test;
                self.state = ProState::Reflect;
            }

            ProState::Reflect => {
                if is_better(
                    self.test[best_test].perf.obj(0),
                    self.base[self.best_base].perf.obj(0),
                ) {
                    // The reflected simplex holds the best known vertex.
                    // Accept it and probe a single trial expansion.  The
                    // reflection pivot is unchanged by the transform, so
                    // `best_base` still indexes the previous best vertex.
                    self.base.copy_from(&self.test);
                    self.best_stash = best_test;
                    self.state = ProState::ExpandOne;
                } else {
                    self.state = ProState::Shrink;
                }
            }

            ProState::ExpandOne => {
                if is_better(
                    self.test[0].perf.obj(0),
                    self.base[self.best_base].perf.obj(0),
                ) {
                    // The trial expansion found the best vertex so far;
                    // expand the whole reflected simplex.
                    self.state = ProState::ExpandAll;
                } else {
                    // Revert to the unexpanded reflected simplex.
                    self.best_base = self.best_stash;
                    self.state = ProState::Reflect;
                }
            }

            ProState::ExpandAll => {
                if is_better(
                    self.test[best_test].perf.obj(0),
                    self.base[self.best_base].perf.obj(0),
                ) {
                    self.base.copy_from(&self.test);
                    self.best_base = best_test;
                }
                // An expansion that did not improve falls through to
                // reflection either way.
                self.state = ProState::Reflect;
            }

            ProState::Converged => {}
        }
        tracing::trace!(state = ?self.state, "pro transition");
        Ok(())
    }

    fn next_simplex(&mut self) -> Result<()> {
        match self.state {
            ProState::Init => {
                // Bootstrap by testing the reference simplex itself.
                self.test.copy_from(&self.base);
            }

            ProState::Reflect => {
                let pivot = self.base[self.best_base].clone();
                self.base
                    .transform_into(&pivot, -self.cfg.reflect, &mut self.test);
            }

            ProState::ExpandOne => {
                // One vertex extends the best reflected vertex away from the
                // previous best; the rest re-test the previous best itself.
                let origin = self.base[self.best_base].clone();
                Vertex::transform_into(
                    &origin,
                    &self.base[self.best_stash],
                    self.cfg.expand,
                    &mut self.test[0],
                );
                for i in 1..self.test.len() {
                    self.test[i].copy_from(&origin);
                }
            }

            ProState::ExpandAll => {
                let pivot = self.base[self.best_base].clone();
                self.base
                    .transform_into(&pivot, self.cfg.expand, &mut self.test);
            }

            ProState::Shrink => {
                let pivot = self.base[self.best_base].clone();
                self.base
                    .transform_into(&pivot, self.cfg.shrink, &mut self.test);
            }

            ProState::Converged => {}
        }
        Ok(())
    }

    fn check_convergence(&mut self) {
        if self.base.collapsed(&self.space) {
            self.state = ProState::Converged;
            tracing::debug!("pro converged: simplex collapsed");
            return;
        }

        self.base.centroid_into(&mut self.centroid);
        let mid = self.centroid.perf.obj(0);

        let mut fval_err = 0.0;
        let mut size_max = 0.0_f64;
        for vertex in self.base.iter() {
            let delta = vertex.perf.obj(0) - mid;
            fval_err += delta * delta;
            size_max = size_max.max(vertex.norm(&self.centroid));
        }
        fval_err /= self.base.len() as f64;

        if fval_err < self.cfg.fval_tol && size_max < self.cfg.size_tol {
            self.state = ProState::Converged;
            tracing::debug!(fval_err, size_max, "pro converged");
        }
    }
}

impl Strategy for Pro {
    fn generate(&mut self) -> Result<Flow> {
        Ok(match self.emit_next() {
            Some(point) => Flow::Accept(point),
            None => Flow::Wait,
        })
    }

    fn rejected(&mut self, point: &Point, hint: Option<&Point>) -> Result<Flow> {
        let Some(idx) = self.sent_index(point.id) else {
            tracing::debug!(id = point.id, "ignoring rejection for unknown id");
            return Ok(Flow::Wait);
        };

        if let Some(hint) = hint {
            // Adopt the hint's coordinates under the in-flight id.
            let id = self.test[idx].id;
            self.test[idx].set_from_point(&self.space, hint)?;
            self.test[idx].id = id;
            return Ok(Flow::Accept(self.test[idx].to_point(&self.space)));
        }

        match self.cfg.reject_method {
            RejectMethod::Penalty => {
                // The vertex is consumed as an invalid measurement; hand out
                // the next candidate (possibly from the next round).
                self.test[idx].perf.reset();
                if !self.measured[idx] {
                    self.measured[idx] = true;
                    self.reported += 1;
                }
                if self.reported == self.test.len() {
                    self.round_complete()?;
                }
                Ok(match self.emit_next() {
                    Some(point) => Flow::Accept(point),
                    None => Flow::Wait,
                })
            }
            RejectMethod::Random => {
                let id = self.test[idx].id;
                self.test[idx].randomize(&self.space, &mut self.rng);
                self.test[idx].id = id;
                Ok(Flow::Accept(self.test[idx].to_point(&self.space)))
            }
        }
    }

    fn analyze(&mut self, trial: &Trial) -> Result<()> {
        let Some(idx) = self.sent_index(trial.point.id) else {
            // Rogue reports are dropped without touching the search state.
            tracing::debug!(id = trial.point.id, "ignoring rogue report");
            return Ok(());
        };
        if self.measured[idx] {
            tracing::debug!(id = trial.point.id, "ignoring duplicate report");
            return Ok(());
        }

        self.test[idx].perf.copy_from(&trial.perf);
        self.measured[idx] = true;
        self.reported += 1;

        if !self.has_best || is_better(trial.perf.unify(), self.best_perf.unify()) {
            self.best_perf.copy_from(&trial.perf);
            self.best_point = trial.point.clone();
            self.has_best = true;
        }

        if self.reported == self.test.len() {
            self.round_complete()?;
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
        self.reinit()
    }

    fn converged(&self) -> bool {
        self.state == ProState::Converged
    }
}
