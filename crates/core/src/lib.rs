//! Simplex-based auto-tuning search engine.
//!
//! A search session proposes candidate configuration points, receives
//! measured performance from its host pipeline, and converges on the best
//! configuration.  Two simplex strategies drive the search: PRO (parallel
//! rank-ordering, which tests a whole simplex per generation step) and ANGEL
//! (Nelder-Mead extended with lexicographic multi-objective phases), plus
//! random and exhaustive baselines behind the same interface.
//!
//! The host pipeline drives a [`Session`] in a simple loop:
//!
//! ```no_run
//! use attune_core::{Flow, KeyMap, Perf, Session, Trial};
//! # fn measure(point: &attune_core::Point) -> f64 { 0.0 }
//! # fn space() -> attune_core::SearchSpace { unimplemented!() }
//! # fn main() -> attune_core::Result<()> {
//! let mut session = Session::new(space(), KeyMap::new())?;
//! while !session.converged() {
//!     if let Flow::Accept(point) = session.generate()? {
//!         let perf = Perf::scalar(measure(&point));
//!         session.analyze(&Trial::new(point, perf))?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod perf;
pub mod point;
pub mod rng;
pub mod session;
pub mod simplex;
pub mod space;
pub mod strategies;
pub mod vertex;

#[cfg(test)]
mod tests;

pub use config::{keys, KeyMap};
pub use error::{Result, SearchError};
pub use perf::Perf;
pub use point::{Point, Trial};
pub use session::Session;
pub use simplex::Simplex;
pub use space::{Dimension, Range, SearchSpace, Value};
pub use strategies::{Flow, RejectMethod, Strategy, StrategyKind};
pub use vertex::Vertex;
