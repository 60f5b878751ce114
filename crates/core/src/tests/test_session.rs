//! Session adapter: strategy selection, output keys, restart semantics, and
//! the baseline strategies.

use super::{cfg, line, real_terms, run, square};
use crate::config::keys;
use crate::error::SearchError;
use crate::perf::Perf;
use crate::point::Trial;
use crate::session::Session;
use crate::space::{Dimension, Range, SearchSpace, Value};
use crate::strategies::{Flow, StrategyKind};

fn grid() -> SearchSpace {
    SearchSpace::new(vec![
        Dimension {
            name: "n".into(),
            range: Range::Int {
                min: 0,
                max: 2,
                step: 1,
            },
        },
        Dimension {
            name: "mode".into(),
            range: Range::Enum {
                options: vec!["seq".into(), "par".into()],
            },
        },
    ])
    .unwrap()
}

#[test]
fn default_strategy_is_pro() {
    let session = Session::new(square(-1.0, 1.0), cfg(&[])).unwrap();
    assert_eq!(session.strategy_kind(), StrategyKind::Pro);
    assert_eq!(session.config().get(keys::CONVERGED), Some("0"));
    // PRO requests atomic prefetch.
    assert_eq!(session.config().get(keys::PREFETCH_ATOMIC), Some("1"));
}

#[test]
fn prefetch_count_is_capped_for_pro() {
    let session = Session::new(
        square(-1.0, 1.0),
        cfg(&[("STRATEGY", "pro"), ("PREFETCH_COUNT", "8")]),
    )
    .unwrap();
    assert_eq!(session.config().get(keys::PREFETCH_COUNT), Some("1"));

    let session = Session::new(
        square(-1.0, 1.0),
        cfg(&[("STRATEGY", "pro"), ("PREFETCH_COUNT", "auto")]),
    )
    .unwrap();
    assert_eq!(session.config().get(keys::PREFETCH_COUNT), Some("1"));
}

#[test]
fn unknown_strategy_is_a_config_error() {
    let err = Session::new(square(-1.0, 1.0), cfg(&[("STRATEGY", "anneal")])).unwrap_err();
    assert!(matches!(err, SearchError::Config(_)));
}

#[test]
fn bad_coefficient_ranges_are_rejected() {
    for (key, val) in [
        ("REFLECT", "-1"),
        ("EXPAND", "0.5"),
        ("SHRINK", "1.5"),
        ("PRO_INIT_PERCENT", "0"),
        ("SIZE_TOL", "2"),
    ] {
        let err = Session::new(square(-1.0, 1.0), cfg(&[(key, val)])).unwrap_err();
        assert!(
            matches!(err, SearchError::Config(_)),
            "{key}={val} was accepted"
        );
    }
}

#[test]
fn random_search_tracks_best_and_never_converges() {
    let mut session = Session::new(
        square(-5.0, 5.0),
        cfg(&[("STRATEGY", "random"), ("RANDOM_SEED", "11")]),
    )
    .unwrap();

    let mut best_seen = f64::INFINITY;
    for _ in 0..50 {
        let Flow::Accept(point) = session.generate().unwrap() else {
            panic!("random search always generates");
        };
        let value: f64 = real_terms(&point).iter().map(|c| c * c).sum();
        best_seen = best_seen.min(value);
        session
            .analyze(&Trial::new(point, Perf::scalar(value)))
            .unwrap();
    }

    assert!(!session.converged());
    let (_, perf) = session.best().unwrap();
    assert_eq!(perf.obj(0), best_seen);
}

#[test]
fn exhaustive_sweeps_the_grid_once() {
    let mut session = Session::new(grid(), cfg(&[("STRATEGY", "exhaustive")])).unwrap();

    let mut seen = Vec::new();
    loop {
        match session.generate().unwrap() {
            Flow::Accept(point) => {
                // Prefer low n and the "par" mode.
                let n = match point.terms[0] {
                    Value::Int(v) => v as f64,
                    _ => unreachable!(),
                };
                let mode = match &point.terms[1] {
                    Value::Str(s) => if s == "par" { 0.0 } else { 1.0 },
                    _ => unreachable!(),
                };
                seen.push(point.terms.clone());
                session
                    .analyze(&Trial::new(point, Perf::scalar(n + mode)))
                    .unwrap();
            }
            Flow::Wait => break,
        }
    }

    assert_eq!(seen.len(), 6);
    assert!(session.converged());
    assert_eq!(session.config().get(keys::CONVERGED), Some("1"));

    let (best, _) = session.best().unwrap();
    assert_eq!(
        best.terms,
        vec![Value::Int(0), Value::Str("par".into())]
    );
}

#[test]
fn exhaustive_rejects_continuous_spaces() {
    let err = Session::new(line(0.0, 1.0), cfg(&[("STRATEGY", "exhaustive")])).unwrap_err();
    assert!(matches!(err, SearchError::Space(_)));
}

#[test]
fn converged_key_is_set_on_termination() {
    let mut session = Session::new(
        square(-10.0, 10.0),
        cfg(&[("STRATEGY", "angel"), ("RANDOM_SEED", "1")]),
    )
    .unwrap();

    run(&mut session, |c| vec![c.iter().map(|x| x * x).sum()], 2000);

    assert!(session.converged());
    assert_eq!(session.config().get(keys::CONVERGED), Some("1"));
}

#[test]
fn restart_preserves_best_on_request() {
    let mut session = Session::new(
        square(-10.0, 10.0),
        cfg(&[("STRATEGY", "angel"), ("RANDOM_SEED", "1")]),
    )
    .unwrap();

    // Shifted objective so the pre-restart best is far from the new one.
    run(&mut session, |c| vec![c.iter().map(|x| x * x).sum()], 2000);
    let (_, perf) = session.best().unwrap();
    let first_best = perf.obj(0);
    assert!(session.converged());

    session.restart(true).unwrap();
    assert!(!session.converged());
    assert_eq!(session.config().get(keys::CONVERGED), Some("0"));

    // Before any new measurement, the stashed best is still reported.
    let (_, perf) = session.best().unwrap();
    assert_eq!(perf.obj(0), first_best);

    // A worse follow-up search does not displace the stash.
    run(&mut session, |c| {
        vec![100.0 + c.iter().map(|x| x * x).sum::<f64>()]
    }, 2000);
    let (_, perf) = session.best().unwrap();
    assert_eq!(perf.obj(0), first_best);

    // Without preservation the stash is dropped.
    session.restart(false).unwrap();
    assert!(session.best().is_none());
}
