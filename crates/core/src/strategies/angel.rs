//! ANGEL: Nelder-Mead extended with lexicographic multi-objective phases.
//!
//! With `P` objectives the search runs `P` ordered phases.  Phase `p`
//! minimises `obj[p]` while penalising configurations whose higher-priority
//! objectives stray beyond their leeway band, computed from the spans
//! observed during the earlier phases.  A single candidate vertex is in
//! flight at any time.

use crate::config::{keys, KeyMap};
use crate::error::{Result, SearchError};
use crate::perf::{is_better, Perf};
use crate::point::{Point, Trial};
use crate::rng;
use crate::simplex::Simplex;
use crate::space::SearchSpace;
use crate::strategies::{Flow, RejectMethod, Strategy};
use crate::vertex::{space_diameter, Vertex};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NmState {
    /// Measuring the vertices of the initial simplex one by one.
    Init,
    Reflect,
    Expand,
    Contract,
    /// Re-measuring the shrunken simplex one vertex at a time.
    Shrink,
    Converged,
}

/// Which vertex the next candidate comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Simplex(usize),
    Reflect,
    Expand,
    Contract,
    Best,
}

/// Observed range of one objective.
#[derive(Debug, Clone, Copy)]
struct Span {
    min: f64,
    max: f64,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

struct AngelConfig {
    init_point: Option<Vertex>,
    init_radius: f64,
    reject_method: RejectMethod,

    reflect: f64,
    expand: f64,
    contract: f64,
    shrink: f64,

    fval_tol: f64,
    /// Absolute size tolerance (fraction of the diameter, pre-scaled).
    size_tol: f64,
    /// Normalised reflection-travel tolerance; overrides fval/size.
    dist_tol: Option<f64>,
    tol_cnt: u32,

    perf_n: usize,
    leeway: Vec<f64>,
    mult: f64,
    loose: bool,
    anchor: bool,
    samesimplex: bool,
}

impl AngelConfig {
    fn parse(space: &SearchSpace, cfg: &KeyMap) -> Result<Self> {
        let perf_n = cfg.int_or(keys::PERF_COUNT, 1)?;
        if perf_n < 1 {
            return Err(SearchError::Config(format!(
                "{} must be at least 1",
                keys::PERF_COUNT
            )));
        }
        let perf_n = perf_n as usize;

        let init_point = match cfg.get(keys::INIT_POINT) {
            Some(text) => Some(Vertex::parse(text, space, perf_n)?),
            None => None,
        };

        let init_radius = cfg.real_or(keys::INIT_RADIUS, 0.50)?;
        if init_radius <= 0.0 || init_radius > 1.0 {
            return Err(SearchError::Config(format!(
                "{} must be in (0, 1]",
                keys::INIT_RADIUS
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
        if !(expand > reflect) {
            return Err(SearchError::Config(format!(
                "{} must be greater than the reflect coefficient",
                keys::EXPAND
            )));
        }

        let contract = cfg.real_or(keys::CONTRACT, 0.5)?;
        if !(contract > 0.0 && contract < 1.0) {
            return Err(SearchError::Config(format!(
                "{} must be in (0, 1)",
                keys::CONTRACT
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

        let dist_tol = cfg.real(keys::DIST_TOL)?;
        if let Some(tol) = dist_tol {
            if !(tol > 0.0 && tol < 1.0) {
                return Err(SearchError::Config(format!(
                    "{} must be in (0, 1)",
                    keys::DIST_TOL
                )));
            }
        }

        let tol_cnt = cfg.int_or(keys::TOL_CNT, 3)?;
        if tol_cnt < 1 {
            return Err(SearchError::Config(format!(
                "{} must be greater than zero",
                keys::TOL_CNT
            )));
        }

        let leeway = match cfg.real_list(keys::ANGEL_LEEWAY)? {
            Some(vals) => {
                if vals.len() != perf_n - 1 {
                    return Err(SearchError::Config(format!(
                        "{} must list {} values",
                        keys::ANGEL_LEEWAY,
                        perf_n - 1
                    )));
                }
                if vals.iter().any(|v| !(0.0..=1.0).contains(v)) {
                    return Err(SearchError::Config(format!(
                        "{} values must be in [0, 1]",
                        keys::ANGEL_LEEWAY
                    )));
                }
                vals
            }
            None if perf_n > 1 => {
                return Err(SearchError::Config(format!(
                    "{} must be defined for multi-objective searches",
                    keys::ANGEL_LEEWAY
                )))
            }
            None => Vec::new(),
        };

        let mult = cfg.real_or(keys::ANGEL_MULT, 1.0)?;
        if !mult.is_finite() {
            return Err(SearchError::Config(format!(
                "invalid value for key {}",
                keys::ANGEL_MULT
            )));
        }

        Ok(Self {
            init_point,
            init_radius,
            reject_method: RejectMethod::from_config(cfg)?,
            reflect,
            expand,
            contract,
            shrink,
            fval_tol,
            size_tol: size_frac * space_diameter(space),
            dist_tol,
            tol_cnt: tol_cnt as u32,
            perf_n,
            leeway,
            mult,
            loose: cfg.bool_or(keys::ANGEL_LOOSE, false)?,
            anchor: cfg.bool_or(keys::ANGEL_ANCHOR, true)?,
            samesimplex: cfg.bool_or(keys::ANGEL_SAMESIMPLEX, true)?,
        })
    }
}

/// ANGEL search instance.
pub struct Angel {
    space: SearchSpace,
    cfg: AngelConfig,
    rng: ChaCha8Rng,

    state: NmState,
    simplex: Simplex,
    init_simplex: Simplex,

    // Scratch vertices owned by the instance; no per-step allocation.
    centroid: Vertex,
    reflect: Vertex,
    expand: Vertex,
    contract: Vertex,

    next_slot: Slot,
    index_best: usize,
    index_worst: usize,
    index_curr: usize,
    shrink_pending: bool,
    next_id: u64,

    phase: usize,
    phase_active: bool,
    thresh: Vec<f64>,
    span: Vec<Span>,

    move_len: f64,
    flat_cnt: u32,
    dist_cnt: u32,
    space_size: f64,

    best_point: Point,
    best_perf: Perf,
    has_best: bool,
}

impl Angel {
    pub fn new(space: &SearchSpace, cfg: &KeyMap) -> Result<Self> {
        space.validate()?;
        let cfg_parsed = AngelConfig::parse(space, cfg)?;
        let n = space.len();
        let perf_n = cfg_parsed.perf_n;

        let mut angel = Self {
            space: space.clone(),
            rng: rng::from_config(cfg)?,
            state: NmState::Init,
            simplex: Simplex::new(n + 1, n, perf_n),
            init_simplex: Simplex::new(n + 1, n, perf_n),
            centroid: Vertex::new(n, perf_n),
            reflect: Vertex::new(n, perf_n),
            expand: Vertex::new(n, perf_n),
            contract: Vertex::new(n, perf_n),
            next_slot: Slot::Simplex(0),
            index_best: 0,
            index_worst: 0,
            index_curr: 0,
            shrink_pending: false,
            next_id: 1,
            phase: 0,
            phase_active: false,
            thresh: vec![0.0; perf_n.saturating_sub(1)],
            span: vec![Span::default(); perf_n],
            move_len: f64::INFINITY,
            flat_cnt: 0,
            dist_cnt: 0,
            space_size: space_diameter(space),
            best_point: Point::unset(),
            best_perf: Perf::new(perf_n),
            has_best: false,
            cfg: cfg_parsed,
        };
        angel.reinit()?;
        Ok(angel)
    }

    fn reinit(&mut self) -> Result<()> {
        self.make_initial_simplex()?;
        self.next_id = 1;
        self.phase = 0;
        self.phase_active = false;
        for span in &mut self.span {
            *span = Span::default();
        }
        self.thresh.fill(0.0);
        self.increment_phase()?;
        self.next_vertex()?;
        Ok(())
    }

    fn make_initial_simplex(&mut self) -> Result<()> {
        let center = match &self.cfg.init_point {
            Some(v) => v.clone(),
            None => Vertex::center(&self.space, self.cfg.perf_n),
        };
        self.init_simplex
            .set(&self.space, &center, self.cfg.init_radius, &mut self.rng, false)
    }

    /// Enter the next phase (or the first one): fix the threshold of the
    /// phase being left, reset the simplex, optionally anchor the previous
    /// best solution, and clear per-phase search state.
    fn increment_phase(&mut self) -> Result<()> {
        if self.phase_active {
            let span = self.span[self.phase];
            self.thresh[self.phase] =
                span.min + self.cfg.leeway[self.phase] * (span.max - span.min);
            self.phase += 1;
        } else {
            self.phase_active = true;
        }
        tracing::debug!(phase = self.phase, "angel phase");

        // The centroid scratch holds the previous phase's best vertex while
        // the simplex is rebuilt.
        let best = self.simplex[self.index_best].clone();
        self.centroid.copy_from(&best);

        if !self.cfg.samesimplex {
            self.make_initial_simplex()?;
        }
        self.simplex.copy_from(&self.init_simplex);

        if self.has_best && self.cfg.anchor {
            // Transfer the best known solution across phases by overwriting
            // the closest fresh vertex.
            let mut min_dist = f64::INFINITY;
            let mut idx = 0;
            for i in 0..self.simplex.len() {
                let dist = self.centroid.norm(&self.simplex[i]);
                if dist < min_dist {
                    min_dist = dist;
                    idx = i;
                }
            }
            let anchor = self.centroid.clone();
            self.simplex[idx].copy_from(&anchor);
        }

        self.best_perf = Perf::new(self.cfg.perf_n);
        self.best_point = Point::unset();
        self.has_best = false;

        self.index_best = 0;
        self.index_worst = 0;
        self.index_curr = 0;
        self.shrink_pending = false;
        self.flat_cnt = 0;
        self.dist_cnt = 0;
        self.move_len = f64::INFINITY;
        self.state = NmState::Init;
        Ok(())
    }

    fn slot_ref(&self) -> &Vertex {
        match self.next_slot {
            Slot::Simplex(i) => &self.simplex[i],
            Slot::Reflect => &self.reflect,
            Slot::Expand => &self.expand,
            Slot::Contract => &self.contract,
            Slot::Best => &self.simplex[self.index_best],
        }
    }

    fn slot_mut(&mut self) -> &mut Vertex {
        match self.next_slot {
            Slot::Simplex(i) => &mut self.simplex[i],
            Slot::Reflect => &mut self.reflect,
            Slot::Expand => &mut self.expand,
            Slot::Contract => &mut self.contract,
            Slot::Best => &mut self.simplex[self.index_best],
        }
    }

    /// Overwrite the slot vertex with a hint's coordinates.
    fn adopt_into_slot(&mut self, hint: &Point) -> Result<()> {
        match self.next_slot {
            Slot::Simplex(i) => self.simplex[i].set_from_point(&self.space, hint),
            Slot::Reflect => self.reflect.set_from_point(&self.space, hint),
            Slot::Expand => self.expand.set_from_point(&self.space, hint),
            Slot::Contract => self.contract.set_from_point(&self.space, hint),
            Slot::Best => {
                let i = self.index_best;
                self.simplex[i].set_from_point(&self.space, hint)
            }
        }
    }

    fn randomize_slot(&mut self) {
        match self.next_slot {
            Slot::Simplex(i) => self.simplex[i].randomize(&self.space, &mut self.rng),
            Slot::Reflect => self.reflect.randomize(&self.space, &mut self.rng),
            Slot::Expand => self.expand.randomize(&self.space, &mut self.rng),
            Slot::Contract => self.contract.randomize(&self.space, &mut self.rng),
            Slot::Best => {
                let i = self.index_best;
                self.simplex[i].randomize(&self.space, &mut self.rng)
            }
        }
    }

    /// Advance until the next candidate vertex is in bounds (an out-of-bounds
    /// candidate keeps its reset `+inf` performance and is fed straight back
    /// into the state machine) or the search converges.
    fn nm_algorithm(&mut self) -> Result<()> {
        loop {
            if self.state == NmState::Converged {
                break;
            }

            self.state_transition()?;

            if self.state == NmState::Reflect {
                self.update_centroid();
                self.check_convergence()?;
            }

            self.next_vertex()?;

            if self.state == NmState::Converged {
                break;
            }
            if self.slot_ref().is_inbounds(&self.space) {
                break;
            }
        }
        Ok(())
    }

    fn state_transition(&mut self) -> Result<()> {
        let phase = self.phase;
        match self.state {
            NmState::Init | NmState::Shrink => {
                // One more simplex vertex has been measured.
                self.index_curr += 1;
                if self.index_curr == self.space.len() + 1 {
                    self.update_centroid();
                    self.state = NmState::Reflect;
                    self.index_curr = 0;
                }
            }

            NmState::Reflect => {
                let reflected = self.reflect.perf.obj(phase);
                if is_better(reflected, self.simplex[self.index_best].perf.obj(phase)) {
                    // Better than every simplex vertex: attempt expansion.
                    self.state = NmState::Expand;
                } else if is_better(reflected, self.simplex[self.index_worst].perf.obj(phase))
                {
                    // Better than the worst vertex only: take it and
                    // reflect again.
                    let worst = self.index_worst;
                    let replacement = self.reflect.clone();
                    self.simplex[worst].copy_from(&replacement);
                    self.update_centroid();
                } else {
                    self.state = NmState::Contract;
                }
            }

            NmState::Expand => {
                let worst = self.index_worst;
                if is_better(
                    self.expand.perf.obj(phase),
                    self.simplex[self.index_best].perf.obj(phase),
                ) {
                    let replacement = self.expand.clone();
                    self.simplex[worst].copy_from(&replacement);
                } else {
                    // The expansion overshot; keep the reflected vertex.
                    let replacement = self.reflect.clone();
                    self.simplex[worst].copy_from(&replacement);
                }
                self.update_centroid();
                self.state = NmState::Reflect;
            }

            NmState::Contract => {
                let worst = self.index_worst;
                if is_better(
                    self.contract.perf.obj(phase),
                    self.simplex[worst].perf.obj(phase),
                ) {
                    let replacement = self.contract.clone();
                    self.simplex[worst].copy_from(&replacement);
                    self.update_centroid();
                    self.state = NmState::Reflect;
                } else {
                    // Nothing worked this round: shrink toward the best.
                    self.shrink_pending = true;
                    self.state = NmState::Shrink;
                }
            }

            NmState::Converged => {
                return Err(SearchError::Internal(
                    "state transition requested after convergence".into(),
                ))
            }
        }
        tracing::trace!(state = ?self.state, "angel transition");
        Ok(())
    }

    fn next_vertex(&mut self) -> Result<()> {
        match self.state {
            NmState::Init => {
                self.next_slot = Slot::Simplex(self.index_curr);
            }

            NmState::Reflect => {
                // r = centroid + rho * (centroid - worst)
                Vertex::transform_into(
                    &self.centroid,
                    &self.simplex[self.index_worst],
                    -self.cfg.reflect,
                    &mut self.reflect,
                );
                self.move_len =
                    self.simplex[self.index_worst].norm(&self.reflect) / self.space_size;
                self.next_slot = Slot::Reflect;
            }

            NmState::Expand => {
                // e = centroid + chi * (centroid - worst)
                Vertex::transform_into(
                    &self.centroid,
                    &self.simplex[self.index_worst],
                    -self.cfg.expand,
                    &mut self.expand,
                );
                self.next_slot = Slot::Expand;
            }

            NmState::Contract => {
                // c = worst + gamma * (centroid - worst)
                Vertex::transform_into(
                    &self.simplex[self.index_worst],
                    &self.centroid,
                    self.cfg.contract,
                    &mut self.contract,
                );
                self.next_slot = Slot::Contract;
            }

            NmState::Shrink => {
                if self.shrink_pending {
                    // Pull the whole simplex toward the best vertex, then
                    // re-measure it one vertex at a time.
                    self.simplex
                        .transform_about(self.index_best, self.cfg.shrink);
                    self.shrink_pending = false;
                    self.index_curr = 0;
                }
                self.next_slot = Slot::Simplex(self.index_curr);
            }

            NmState::Converged => {
                self.next_slot = Slot::Best;
            }
        }

        self.slot_mut().perf.reset();
        Ok(())
    }

    /// Recompute the best/worst indices and the centroid of every vertex
    /// except the worst (its id is cleared for the duration of the
    /// averaging).
    fn update_centroid(&mut self) {
        let phase = self.phase;
        self.index_best = 0;
        self.index_worst = 0;
        for i in 1..self.simplex.len() {
            if is_better(
                self.simplex[i].perf.obj(phase),
                self.simplex[self.index_best].perf.obj(phase),
            ) {
                self.index_best = i;
            }
            if is_better(
                self.simplex[self.index_worst].perf.obj(phase),
                self.simplex[i].perf.obj(phase),
            ) {
                self.index_worst = i;
            }
        }

        let worst = self.index_worst;
        let stash = self.simplex[worst].id;
        self.simplex[worst].id = 0;
        self.simplex.centroid_into(&mut self.centroid);
        self.simplex[worst].id = stash;
    }

    fn check_convergence(&mut self) -> Result<()> {
        let phase = self.phase;
        let mut converged = false;

        // All vertex objective values identical for 3 consecutive moves.
        let first = self.simplex[0].perf.obj(phase);
        let flat = self
            .simplex
            .iter()
            .skip(1)
            .all(|v| !(v.perf.obj(phase) < first || first < v.perf.obj(phase)));
        if flat {
            self.flat_cnt += 1;
            if self.flat_cnt >= 3 {
                self.flat_cnt = 0;
                converged = true;
            }
        } else {
            self.flat_cnt = 0;
        }

        // All vertices map to the same underlying point.
        if !converged && self.simplex.collapsed(&self.space) {
            converged = true;
        }

        if !converged {
            if let Some(dist_tol) = self.cfg.dist_tol {
                // Reflection travel distance below tolerance for TOL_CNT
                // consecutive steps.
                if self.move_len <= dist_tol {
                    self.dist_cnt += 1;
                    if self.dist_cnt >= self.cfg.tol_cnt {
                        self.dist_cnt = 0;
                        converged = true;
                    }
                } else {
                    self.dist_cnt = 0;
                }
            } else {
                let mid = self.centroid.perf.obj(phase);
                let mut fval_err = 0.0;
                let mut size_max = 0.0_f64;
                for vertex in self.simplex.iter() {
                    let delta = vertex.perf.obj(phase) - mid;
                    fval_err += delta * delta;
                    size_max = size_max.max(vertex.norm(&self.centroid));
                }
                fval_err /= self.simplex.len() as f64;

                if fval_err < self.cfg.fval_tol && size_max < self.cfg.size_tol {
                    converged = true;
                }
            }
        }

        if converged {
            if self.phase == self.cfg.perf_n - 1 {
                self.state = NmState::Converged;
                tracing::debug!(phase, "angel converged");
            } else {
                self.increment_phase()?;
            }
        }
        Ok(())
    }
}

impl Strategy for Angel {
    fn generate(&mut self) -> Result<Flow> {
        if self.state == NmState::Converged || self.slot_ref().id == self.next_id {
            return Ok(Flow::Wait);
        }
        let id = self.next_id;
        self.slot_mut().id = id;
        Ok(Flow::Accept(self.slot_ref().to_point(&self.space)))
    }

    fn rejected(&mut self, point: &Point, hint: Option<&Point>) -> Result<Flow> {
        if self.slot_ref().id != point.id {
            return Err(SearchError::RogueId(point.id));
        }

        if let Some(hint) = hint {
            self.adopt_into_slot(hint)?;
            self.slot_mut().id = point.id;
            return Ok(Flow::Accept(self.slot_ref().to_point(&self.space)));
        }

        match self.cfg.reject_method {
            RejectMethod::Penalty => {
                // Feed an infinite measurement to the algorithm and emit
                // whatever it asks for next.
                self.slot_mut().perf.reset();
                self.nm_algorithm()?;
                if self.state == NmState::Converged {
                    return Ok(Flow::Wait);
                }
                let id = self.next_id;
                self.slot_mut().id = id;
                Ok(Flow::Accept(self.slot_ref().to_point(&self.space)))
            }
            RejectMethod::Random => {
                self.randomize_slot();
                self.slot_mut().id = point.id;
                Ok(Flow::Accept(self.slot_ref().to_point(&self.space)))
            }
        }
    }

    fn analyze(&mut self, trial: &Trial) -> Result<()> {
        if trial.point.id != self.slot_ref().id {
            return Err(SearchError::RogueId(trial.point.id));
        }
        self.slot_mut().perf.copy_from(&trial.perf);

        // Track the observed range of every objective.
        for k in 0..self.cfg.perf_n {
            let val = self.slot_ref().perf.obj(k);
            if self.span[k].min > val {
                self.span[k].min = val;
            }
            if self.span[k].max < val && val < f64::INFINITY {
                self.span[k].max = val;
            }
        }

        // Penalise violations of the higher-priority leeway bands; walking
        // from low to high priority doubles the base so that higher
        // priorities dominate lexicographically.
        let phase = self.phase;
        let mut penalty = 0.0;
        let mut penalty_base = 1.0;
        for k in (0..phase).rev() {
            let val = self.slot_ref().perf.obj(k);
            if val > self.thresh[k] {
                if !self.cfg.loose {
                    penalty += penalty_base;
                }
                let fraction =
                    (val - self.thresh[k]) / (self.span[k].max - self.thresh[k]);
                penalty += 1.0 / (1.0 - fraction.ln());
            }
            penalty_base *= 2.0;
        }
        if penalty > 0.0 {
            if self.cfg.loose {
                penalty += 1.0;
            }
            let span = self.span[phase].max - self.span[phase].min;
            let surcharge = penalty * span * self.cfg.mult;
            *self.slot_mut().perf.obj_mut(phase) += surcharge;
        }

        // Update the best point for the current phase (penalised values).
        let measured = self.slot_ref().perf.obj(phase);
        if !self.has_best || is_better(measured, self.best_perf.obj(phase)) {
            let perf = self.slot_ref().perf.clone();
            self.best_perf.copy_from(&perf);
            self.best_point = trial.point.clone();
            self.has_best = true;
        }

        self.nm_algorithm()?;

        if self.state != NmState::Converged {
            self.next_id += 1;
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
        self.state == NmState::Converged
    }

    fn phase(&self) -> Option<usize> {
        Some(self.phase)
    }
}
