//! PRO strategy: convergence, report handling, and the prefetch contract.

use super::{cfg, real_terms, run, square};
use crate::config::keys;
use crate::perf::Perf;
use crate::point::Trial;
use crate::session::Session;
use crate::strategies::Flow;

fn sphere(coords: &[f64]) -> Vec<f64> {
    vec![coords.iter().map(|c| c * c).sum()]
}

fn pro_config() -> Vec<(&'static str, &'static str)> {
    vec![
        ("STRATEGY", "pro"),
        ("PRO_INIT_PERCENT", "0.35"),
        ("RANDOM_SEED", "1"),
        ("FVAL_TOL", "1e-6"),
        ("SIZE_TOL", "0.001"),
    ]
}

#[test]
fn converges_on_sphere_from_center() {
    let mut session = Session::new(square(-10.0, 10.0), cfg(&pro_config())).unwrap();

    let evals = run(&mut session, sphere, 3000);

    assert!(session.converged(), "no convergence after {evals} evals");
    assert_eq!(session.config().get(keys::CONVERGED), Some("1"));

    let (best, perf) = session.best().unwrap();
    let coords = real_terms(best);
    let dist = (coords[0] * coords[0] + coords[1] * coords[1]).sqrt();
    assert!(dist < 0.1, "best {coords:?} too far from the optimum");
    assert!(perf.obj(0) < 0.01);
}

#[test]
fn emits_whole_simplex_then_waits() {
    let mut session = Session::new(square(-10.0, 10.0), cfg(&pro_config())).unwrap();

    // A 2-D space means a simplex of three candidates per round.
    let mut outstanding = Vec::new();
    for _ in 0..3 {
        match session.generate().unwrap() {
            Flow::Accept(point) => outstanding.push(point),
            Flow::Wait => panic!("wait before the simplex was exhausted"),
        }
    }
    assert_eq!(session.generate().unwrap(), Flow::Wait);

    // Reports may return in any order.
    outstanding.reverse();
    for point in outstanding {
        let perf = Perf::scalar(sphere(&real_terms(&point))[0]);
        session.analyze(&Trial::new(point, perf)).unwrap();
    }

    // The round completed, so the next simplex is available.
    assert!(matches!(session.generate().unwrap(), Flow::Accept(_)));
}

#[test]
fn ids_are_strictly_increasing() {
    let mut session = Session::new(square(-10.0, 10.0), cfg(&pro_config())).unwrap();

    let mut last_id = 0;
    for _ in 0..15 {
        match session.generate().unwrap() {
            Flow::Accept(point) => {
                assert!(point.id > last_id, "id {} not above {last_id}", point.id);
                last_id = point.id;
                let perf = Perf::scalar(sphere(&real_terms(&point))[0]);
                session.analyze(&Trial::new(point, perf)).unwrap();
            }
            Flow::Wait => break,
        }
    }
    assert!(last_id >= 15);
}

#[test]
fn rogue_report_is_ignored() {
    let mut session = Session::new(square(-10.0, 10.0), cfg(&pro_config())).unwrap();

    let Flow::Accept(point) = session.generate().unwrap() else {
        panic!("expected a candidate");
    };

    // A report for an id the strategy never produced: accepted and dropped.
    let mut rogue = point.clone();
    rogue.id = 9999;
    session
        .analyze(&Trial::new(rogue, Perf::scalar(0.0)))
        .unwrap();

    // The round is still outstanding; the real reports drive it forward.
    let mut points = vec![point];
    while let Flow::Accept(p) = session.generate().unwrap() {
        points.push(p);
    }
    assert_eq!(points.len(), 3);
    for p in points {
        let perf = Perf::scalar(sphere(&real_terms(&p))[0]);
        session.analyze(&Trial::new(p, perf)).unwrap();
    }
    assert!(matches!(session.generate().unwrap(), Flow::Accept(_)));
}

#[test]
fn rejection_penalty_yields_a_different_point() {
    let mut session = Session::new(square(-10.0, 10.0), cfg(&pro_config())).unwrap();

    let Flow::Accept(first) = session.generate().unwrap() else {
        panic!("expected a candidate");
    };

    let Flow::Accept(replacement) = session.rejected(&first, None).unwrap() else {
        panic!("expected a replacement");
    };
    assert_ne!(replacement.terms, first.terms);
    assert!(replacement.id > first.id);

    // The search continues normally from the replacement.
    let perf = Perf::scalar(sphere(&real_terms(&replacement))[0]);
    session.analyze(&Trial::new(replacement, perf)).unwrap();
    assert!(matches!(session.generate().unwrap(), Flow::Accept(_)));
}

#[test]
fn rejection_hint_is_adopted() {
    let mut session = Session::new(square(-10.0, 10.0), cfg(&pro_config())).unwrap();

    let Flow::Accept(first) = session.generate().unwrap() else {
        panic!("expected a candidate");
    };
    let hint = crate::point::Point::parse("1.5, -2.0", session.space()).unwrap();

    let Flow::Accept(replacement) = session.rejected(&first, Some(&hint)).unwrap() else {
        panic!("expected a replacement");
    };
    assert_eq!(replacement.id, first.id);
    assert_eq!(real_terms(&replacement), vec![1.5, -2.0]);
}

#[test]
fn fixed_seed_reproduces_the_point_sequence() {
    let emit = || {
        let mut config = pro_config();
        config.push(("PRO_INIT_METHOD", "random"));
        let mut session = Session::new(square(-10.0, 10.0), cfg(&config)).unwrap();
        let mut points = Vec::new();
        for _ in 0..12 {
            if let Flow::Accept(point) = session.generate().unwrap() {
                let perf = Perf::scalar(sphere(&real_terms(&point))[0]);
                points.push(point.clone());
                session.analyze(&Trial::new(point, perf)).unwrap();
            }
        }
        points
    };

    assert_eq!(emit(), emit());
}

#[test]
fn oversized_simplex_is_honored() {
    let mut config = pro_config();
    config.push(("PRO_SIMPLEX_SIZE", "5"));
    let mut session = Session::new(square(-10.0, 10.0), cfg(&config)).unwrap();

    let mut count = 0;
    while let Flow::Accept(point) = session.generate().unwrap() {
        count += 1;
        let perf = Perf::scalar(sphere(&real_terms(&point))[0]);
        session.analyze(&Trial::new(point, perf)).unwrap();
        if count == 5 {
            break;
        }
    }
    assert_eq!(count, 5);
}
