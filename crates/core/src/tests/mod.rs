//! Scenario tests driving full search loops.

mod test_angel;
mod test_pro;
mod test_session;

use crate::config::KeyMap;
use crate::perf::Perf;
use crate::point::{Point, Trial};
use crate::session::Session;
use crate::space::{Dimension, Range, SearchSpace, Value};
use crate::strategies::Flow;

/// 2-D continuous square.
pub(crate) fn square(min: f64, max: f64) -> SearchSpace {
    SearchSpace::new(vec![
        Dimension {
            name: "x".into(),
            range: Range::Real { min, max },
        },
        Dimension {
            name: "y".into(),
            range: Range::Real { min, max },
        },
    ])
    .unwrap()
}

/// 1-D continuous interval.
pub(crate) fn line(min: f64, max: f64) -> SearchSpace {
    SearchSpace::new(vec![Dimension {
        name: "x".into(),
        range: Range::Real { min, max },
    }])
    .unwrap()
}

pub(crate) fn cfg(pairs: &[(&str, &str)]) -> KeyMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub(crate) fn real_terms(point: &Point) -> Vec<f64> {
    point
        .terms
        .iter()
        .map(|t| match t {
            Value::Real(v) => *v,
            Value::Int(v) => *v as f64,
            Value::Str(_) => panic!("expected numeric term"),
        })
        .collect()
}

/// Drive a session loop until convergence or the evaluation budget runs
/// out; returns the number of evaluations performed.
pub(crate) fn run<F>(session: &mut Session, mut objective: F, max_evals: usize) -> usize
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    let mut evals = 0;
    while !session.converged() && evals < max_evals {
        match session.generate().unwrap() {
            Flow::Accept(point) => {
                let obj = objective(&real_terms(&point));
                session
                    .analyze(&Trial::new(point, Perf::from_objectives(&obj)))
                    .unwrap();
                evals += 1;
            }
            Flow::Wait => break,
        }
    }
    evals
}
