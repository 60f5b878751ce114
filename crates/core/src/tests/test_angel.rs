//! ANGEL strategy: single- and multi-objective convergence, phases, and
//! rejection handling.

use super::{cfg, line, real_terms, run, square};
use crate::config::keys;
use crate::error::SearchError;
use crate::perf::Perf;
use crate::point::Trial;
use crate::session::Session;
use crate::strategies::Flow;

fn sphere(coords: &[f64]) -> Vec<f64> {
    vec![coords.iter().map(|c| c * c).sum()]
}

#[test]
fn converges_on_sphere() {
    let mut session = Session::new(
        square(-10.0, 10.0),
        cfg(&[
            ("STRATEGY", "angel"),
            ("RANDOM_SEED", "1"),
            ("INIT_RADIUS", "0.35"),
            ("FVAL_TOL", "1e-6"),
            ("SIZE_TOL", "0.001"),
        ]),
    )
    .unwrap();

    let evals = run(&mut session, sphere, 2000);

    assert!(session.converged(), "no convergence after {evals} evals");
    let (best, _) = session.best().unwrap();
    let coords = real_terms(best);
    let dist = (coords[0] * coords[0] + coords[1] * coords[1]).sqrt();
    assert!(dist < 0.1, "best {coords:?} too far from the optimum");
}

#[test]
fn needs_fewer_evaluations_than_pro() {
    let common = [
        ("RANDOM_SEED", "1"),
        ("FVAL_TOL", "1e-6"),
        ("SIZE_TOL", "0.001"),
    ];

    let mut pro_cfg: Vec<(&str, &str)> = common.to_vec();
    pro_cfg.push(("STRATEGY", "pro"));
    pro_cfg.push(("PRO_INIT_PERCENT", "0.35"));
    let mut pro = Session::new(square(-10.0, 10.0), cfg(&pro_cfg)).unwrap();
    let pro_evals = run(&mut pro, sphere, 3000);
    assert!(pro.converged());

    let mut angel_cfg: Vec<(&str, &str)> = common.to_vec();
    angel_cfg.push(("STRATEGY", "angel"));
    angel_cfg.push(("INIT_RADIUS", "0.35"));
    let mut angel = Session::new(square(-10.0, 10.0), cfg(&angel_cfg)).unwrap();
    let angel_evals = run(&mut angel, sphere, 3000);
    assert!(angel.converged());

    // One candidate per step beats a whole simplex per step.
    assert!(
        angel_evals < pro_evals,
        "angel used {angel_evals}, pro used {pro_evals}"
    );
}

#[test]
fn one_dimensional_parabola_from_offset_start() {
    let mut session = Session::new(
        line(0.0, 100.0),
        cfg(&[
            ("STRATEGY", "angel"),
            ("RANDOM_SEED", "1"),
            ("INIT_POINT", "80"),
            ("INIT_RADIUS", "0.5"),
            ("FVAL_TOL", "1e-10"),
            ("SIZE_TOL", "0.001"),
        ]),
    )
    .unwrap();

    let evals = run(&mut session, |c| vec![(c[0] - 37.0) * (c[0] - 37.0)], 2000);

    assert!(session.converged(), "no convergence after {evals} evals");
    let (best, _) = session.best().unwrap();
    let x = real_terms(best)[0];
    assert!((x - 37.0).abs() < 0.2, "best x = {x}");
}

#[test]
fn second_phase_respects_first_phase_leeway() {
    // Phase 0 minimises x^2; phase 1 minimises (x - 5)^2 while keeping x^2
    // within the leeway band computed from the phase-0 span.
    let mut session = Session::new(
        line(-10.0, 10.0),
        cfg(&[
            ("STRATEGY", "angel"),
            ("RANDOM_SEED", "1"),
            ("PERF_COUNT", "2"),
            ("ANGEL_LEEWAY", "0.3"),
        ]),
    )
    .unwrap();
    assert_eq!(session.config().get(keys::ANGEL_PHASE), Some("0"));

    let evals = run(
        &mut session,
        |c| vec![c[0] * c[0], (c[0] - 5.0) * (c[0] - 5.0)],
        4000,
    );

    assert!(session.converged(), "no convergence after {evals} evals");
    assert_eq!(session.config().get(keys::ANGEL_PHASE), Some("1"));

    // The final best moved toward x = 5 without blowing the phase-0 band.
    let (best, perf) = session.best().unwrap();
    let x = real_terms(best)[0];
    assert!(x > 1.0, "phase 1 did not move off the phase-0 optimum: {x}");
    assert!(x < 8.0, "phase 1 overshot: {x}");
    assert!(perf.obj(1) < 25.0);
}

#[test]
fn generate_waits_while_a_candidate_is_outstanding() {
    let mut session = Session::new(
        square(-10.0, 10.0),
        cfg(&[("STRATEGY", "angel"), ("RANDOM_SEED", "1")]),
    )
    .unwrap();

    let Flow::Accept(point) = session.generate().unwrap() else {
        panic!("expected a candidate");
    };
    assert_eq!(session.generate().unwrap(), Flow::Wait);

    let perf = Perf::scalar(sphere(&real_terms(&point))[0]);
    session.analyze(&Trial::new(point, perf)).unwrap();
    assert!(matches!(session.generate().unwrap(), Flow::Accept(_)));
}

#[test]
fn rogue_report_is_an_error() {
    let mut session = Session::new(
        square(-10.0, 10.0),
        cfg(&[("STRATEGY", "angel"), ("RANDOM_SEED", "1")]),
    )
    .unwrap();

    let Flow::Accept(point) = session.generate().unwrap() else {
        panic!("expected a candidate");
    };
    let mut rogue = point.clone();
    rogue.id = 777;

    let err = session
        .analyze(&Trial::new(rogue, Perf::scalar(1.0)))
        .unwrap_err();
    assert!(matches!(err, SearchError::RogueId(777)));

    // The in-flight candidate is still valid.
    let perf = Perf::scalar(sphere(&real_terms(&point))[0]);
    session.analyze(&Trial::new(point, perf)).unwrap();
}

#[test]
fn rejection_penalty_moves_to_the_next_vertex() {
    let mut session = Session::new(
        square(-10.0, 10.0),
        cfg(&[("STRATEGY", "angel"), ("RANDOM_SEED", "1")]),
    )
    .unwrap();

    let Flow::Accept(first) = session.generate().unwrap() else {
        panic!("expected a candidate");
    };

    let Flow::Accept(replacement) = session.rejected(&first, None).unwrap() else {
        panic!("expected a replacement");
    };
    // The rejected vertex was consumed as an infinite measurement; the
    // replacement is the next simplex vertex under the same id.
    assert_eq!(replacement.id, first.id);
    assert_ne!(replacement.terms, first.terms);

    let perf = Perf::scalar(sphere(&real_terms(&replacement))[0]);
    session.analyze(&Trial::new(replacement, perf)).unwrap();
    assert!(matches!(session.generate().unwrap(), Flow::Accept(_)));
}

#[test]
fn rejection_random_keeps_the_id() {
    let mut session = Session::new(
        square(-10.0, 10.0),
        cfg(&[
            ("STRATEGY", "angel"),
            ("RANDOM_SEED", "1"),
            ("REJECT_METHOD", "random"),
        ]),
    )
    .unwrap();

    let Flow::Accept(first) = session.generate().unwrap() else {
        panic!("expected a candidate");
    };
    let Flow::Accept(replacement) = session.rejected(&first, None).unwrap() else {
        panic!("expected a replacement");
    };
    assert_eq!(replacement.id, first.id);
}

#[test]
fn missing_leeway_is_rejected_for_multi_objective() {
    let err = Session::new(
        line(-1.0, 1.0),
        cfg(&[("STRATEGY", "angel"), ("PERF_COUNT", "2")]),
    )
    .unwrap_err();
    assert!(matches!(err, SearchError::Config(_)));
}

#[test]
fn best_is_monotonic_within_a_phase() {
    let mut session = Session::new(
        square(-10.0, 10.0),
        cfg(&[("STRATEGY", "angel"), ("RANDOM_SEED", "3")]),
    )
    .unwrap();

    let mut last_best = f64::INFINITY;
    for _ in 0..120 {
        if session.converged() {
            break;
        }
        let Flow::Accept(point) = session.generate().unwrap() else {
            break;
        };
        let perf = Perf::scalar(sphere(&real_terms(&point))[0]);
        session.analyze(&Trial::new(point, perf)).unwrap();

        let (_, best_perf) = session.best().unwrap();
        assert!(best_perf.obj(0) <= last_best + 1e-12);
        last_best = best_perf.obj(0);
    }
}
