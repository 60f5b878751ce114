//! Strategy interface adapter.
//!
//! A `Session` is what the host pipeline talks to: it selects and owns the
//! strategy instance, mediates the string-keyed configuration, and mirrors
//! the convergence flag and phase index back into the map after every
//! analyze step.

use crate::config::{keys, KeyMap};
use crate::error::Result;
use crate::perf::{is_better, Perf};
use crate::point::{Point, Trial};
use crate::space::SearchSpace;
use crate::strategies::{Flow, Strategy, StrategyKind};

pub struct Session {
    space: SearchSpace,
    cfg: KeyMap,
    kind: StrategyKind,
    strategy: Box<dyn Strategy>,
    /// Best point carried across restarts, when the host asks for it.
    stash: Option<(Point, Perf)>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("space", &self.space)
            .field("cfg", &self.cfg)
            .field("kind", &self.kind)
            .field("stash", &self.stash)
            .finish()
    }
}

impl Session {
    pub fn new(space: SearchSpace, mut cfg: KeyMap) -> Result<Self> {
        space.validate()?;
        let kind = StrategyKind::from_config(&cfg)?;

        if kind == StrategyKind::Pro {
            // PRO requires the pipeline to prefetch whole simplexes
            // atomically, at most one simplex deep.
            cfg.set(keys::PREFETCH_ATOMIC, "1");
            if let Some(raw) = cfg.get(keys::PREFETCH_COUNT) {
                match raw.trim().parse::<i64>() {
                    Ok(n) if n > 1 => cfg.set(keys::PREFETCH_COUNT, "1"),
                    Ok(n) if n < 0 => cfg.set(keys::PREFETCH_COUNT, "0"),
                    Ok(_) => {}
                    Err(_) => cfg.set(keys::PREFETCH_COUNT, "1"),
                }
            }
        }

        let strategy = kind.build(&space, &cfg)?;
        cfg.set(keys::CONVERGED, "0");
        if let Some(phase) = strategy.phase() {
            cfg.set(keys::ANGEL_PHASE, phase.to_string());
        }

        tracing::debug!(?kind, dims = space.len(), "session initialized");
        Ok(Self {
            space,
            cfg,
            kind,
            strategy,
            stash: None,
        })
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn config(&self) -> &KeyMap {
        &self.cfg
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.kind
    }

    /// Fetch the next candidate point from the strategy.
    #[tracing::instrument(skip(self))]
    pub fn generate(&mut self) -> Result<Flow> {
        self.strategy.generate()
    }

    /// Hand a rejected point back for replacement.
    pub fn rejected(&mut self, point: &Point, hint: Option<&Point>) -> Result<Flow> {
        self.strategy.rejected(point, hint)
    }

    /// Report a measured trial and advance the strategy.
    #[tracing::instrument(skip(self, trial), fields(id = trial.point.id))]
    pub fn analyze(&mut self, trial: &Trial) -> Result<()> {
        self.strategy.analyze(trial)?;
        self.sync_outputs();
        Ok(())
    }

    /// Best point observed so far, including any best preserved across a
    /// restart (compared on the unified scalar).
    pub fn best(&self) -> Option<(&Point, &Perf)> {
        let current = self.strategy.best().zip(self.strategy.best_perf());
        match (current, &self.stash) {
            (Some((point, perf)), Some((spoint, sperf))) => {
                if is_better(sperf.unify(), perf.unify()) {
                    Some((spoint, sperf))
                } else {
                    Some((point, perf))
                }
            }
            (Some(current), None) => Some(current),
            (None, Some((spoint, sperf))) => Some((spoint, sperf)),
            (None, None) => None,
        }
    }

    pub fn converged(&self) -> bool {
        self.strategy.converged()
    }

    /// Re-initialise the search.  State resets but instance allocations are
    /// retained; with `preserve_best`, the pre-restart best keeps competing
    /// in [`Session::best`].
    pub fn restart(&mut self, preserve_best: bool) -> Result<()> {
        if preserve_best {
            // `best` already folds in any earlier stash.
            if let Some((point, perf)) = self.best() {
                let candidate = (point.clone(), perf.clone());
                self.stash = Some(candidate);
            }
        } else {
            self.stash = None;
        }

        self.strategy.restart()?;
        self.cfg.set(keys::CONVERGED, "0");
        self.sync_outputs();
        Ok(())
    }

    fn sync_outputs(&mut self) {
        if self.strategy.converged() {
            self.cfg.set(keys::CONVERGED, "1");
        }
        if let Some(phase) = self.strategy.phase() {
            self.cfg.set(keys::ANGEL_PHASE, phase.to_string());
        }
    }
}
