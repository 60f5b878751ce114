//! Vertex algebra in normalized coordinate space.
//!
//! A vertex carries one coordinate per dimension: finite dimensions are
//! addressed by (possibly fractional) index, continuous dimensions by raw
//! value.  Distances and tolerances are computed in this space, which keeps
//! them dimensionless relative to the space diameter.

use crate::error::Result;
use crate::perf::Perf;
use crate::point::Point;
use crate::space::SearchSpace;
use rand::Rng;
use smallvec::{smallvec, SmallVec};

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: u64,
    coords: SmallVec<[f64; 8]>,
    pub perf: Perf,
}

impl Vertex {
    pub fn new(space_len: usize, perf_n: usize) -> Self {
        Self {
            id: 0,
            coords: smallvec![0.0; space_len],
            perf: Perf::new(perf_n),
        }
    }

    /// Midpoint of every dimension.
    pub fn center(space: &SearchSpace, perf_n: usize) -> Self {
        let mut v = Self::new(space.len(), perf_n);
        for (c, dim) in v.coords.iter_mut().zip(space.iter()) {
            *c = (dim.range.coord_min() + dim.range.coord_max()) / 2.0;
        }
        v
    }

    /// Lower corner of the space.
    pub fn minimum(space: &SearchSpace, perf_n: usize) -> Self {
        let mut v = Self::new(space.len(), perf_n);
        for (c, dim) in v.coords.iter_mut().zip(space.iter()) {
            *c = dim.range.coord_min();
        }
        v
    }

    /// Upper corner of the space.
    pub fn maximum(space: &SearchSpace, perf_n: usize) -> Self {
        let mut v = Self::new(space.len(), perf_n);
        for (c, dim) in v.coords.iter_mut().zip(space.iter()) {
            *c = dim.range.coord_max();
        }
        v
    }

    /// Uniform sample of every dimension.
    pub fn randomize<R: Rng>(&mut self, space: &SearchSpace, rng: &mut R) {
        for (c, dim) in self.coords.iter_mut().zip(space.iter()) {
            *c = dim.range.random_coord(rng);
        }
    }

    pub fn random<R: Rng>(space: &SearchSpace, perf_n: usize, rng: &mut R) -> Self {
        let mut v = Self::new(space.len(), perf_n);
        v.randomize(space, rng);
        v
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn coords_mut(&mut self) -> &mut [f64] {
        &mut self.coords
    }

    /// Euclidean distance to `other` in coordinate space.
    pub fn norm(&self, other: &Vertex) -> f64 {
        self.coords
            .iter()
            .zip(other.coords.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    /// `out = origin + c * (v - origin)`.
    ///
    /// `c > 1` expands away from the origin, `0 < c < 1` contracts toward
    /// it, and `c < 0` reflects through it.  Only coordinates are written;
    /// the destination id and performance are left for the caller.
    pub fn transform_into(origin: &Vertex, v: &Vertex, c: f64, out: &mut Vertex) {
        out.coords.clear();
        out.coords.extend(
            origin
                .coords
                .iter()
                .zip(v.coords.iter())
                .map(|(o, x)| o + c * (x - o)),
        );
    }

    /// Project onto legal values in place.
    pub fn align(&mut self, space: &SearchSpace) {
        for (c, dim) in self.coords.iter_mut().zip(space.iter()) {
            *c = dim.range.align(*c);
        }
    }

    /// Project onto an aligned point suitable for the host pipeline,
    /// carrying this vertex's id.
    pub fn to_point(&self, space: &SearchSpace) -> Point {
        let terms = self
            .coords
            .iter()
            .zip(space.iter())
            .map(|(c, dim)| dim.range.value_at(dim.range.align(*c)))
            .collect();
        Point {
            id: self.id,
            terms,
        }
    }

    /// Adopt a point's coordinates (and id), leaving performance untouched.
    pub fn set_from_point(&mut self, space: &SearchSpace, point: &Point) -> Result<()> {
        self.coords.clear();
        for (term, dim) in point.terms.iter().zip(space.iter()) {
            self.coords.push(dim.range.coord_of(term)?);
        }
        self.id = point.id;
        Ok(())
    }

    /// Parse a textual coordinate list.
    pub fn parse(input: &str, space: &SearchSpace, perf_n: usize) -> Result<Self> {
        let point = Point::parse(input, space)?;
        let mut v = Self::new(space.len(), perf_n);
        v.set_from_point(space, &point)?;
        Ok(v)
    }

    pub fn is_inbounds(&self, space: &SearchSpace) -> bool {
        self.coords
            .iter()
            .zip(space.iter())
            .all(|(c, dim)| dim.range.coord_inbounds(*c))
    }

    pub fn copy_from(&mut self, other: &Vertex) {
        self.id = other.id;
        self.coords.clear();
        self.coords.extend_from_slice(&other.coords);
        self.perf.copy_from(&other.perf);
    }
}

/// Distance between the space's corner vertices.  Tolerances expressed as a
/// fraction of the space are scaled by this value.
pub fn space_diameter(space: &SearchSpace) -> f64 {
    Vertex::minimum(space, 0).norm(&Vertex::maximum(space, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{Dimension, Range, Value};

    fn space() -> SearchSpace {
        SearchSpace::new(vec![
            Dimension {
                name: "x".into(),
                range: Range::Real { min: 0.0, max: 4.0 },
            },
            Dimension {
                name: "n".into(),
                range: Range::Int {
                    min: 10,
                    max: 50,
                    step: 10,
                },
            },
        ])
        .unwrap()
    }

    #[test]
    fn corner_and_center_vertices() {
        let space = space();
        assert_eq!(Vertex::minimum(&space, 1).coords(), &[0.0, 0.0]);
        assert_eq!(Vertex::maximum(&space, 1).coords(), &[4.0, 4.0]);
        assert_eq!(Vertex::center(&space, 1).coords(), &[2.0, 2.0]);
        assert_eq!(space_diameter(&space), 32.0_f64.sqrt());
    }

    #[test]
    fn transform_expands_contracts_reflects() {
        let space = space();
        let mut origin = Vertex::new(2, 1);
        origin.coords_mut().copy_from_slice(&[1.0, 1.0]);
        let mut v = Vertex::new(2, 1);
        v.coords_mut().copy_from_slice(&[2.0, 3.0]);
        let mut out = Vertex::new(2, 1);

        Vertex::transform_into(&origin, &v, 2.0, &mut out);
        assert_eq!(out.coords(), &[3.0, 5.0]);

        Vertex::transform_into(&origin, &v, 0.5, &mut out);
        assert_eq!(out.coords(), &[1.5, 2.0]);

        Vertex::transform_into(&origin, &v, -1.0, &mut out);
        assert_eq!(out.coords(), &[0.0, -1.0]);
        assert!(!out.is_inbounds(&space));
    }

    #[test]
    fn point_projection_aligns_terms() {
        let space = space();
        let mut v = Vertex::new(2, 1);
        v.id = 7;
        v.coords_mut().copy_from_slice(&[1.26, 2.6]);

        let point = v.to_point(&space);
        assert_eq!(point.id, 7);
        assert_eq!(point.terms, vec![Value::Real(1.26), Value::Int(40)]);
    }

    #[test]
    fn point_round_trip_preserves_aligned_vertices() {
        let space = space();
        let mut v = Vertex::new(2, 1);
        v.id = 3;
        v.coords_mut().copy_from_slice(&[1.25, 2.0]);

        let point = v.to_point(&space);
        let mut back = Vertex::new(2, 1);
        back.set_from_point(&space, &point).unwrap();
        assert_eq!(back.coords(), v.coords());
        assert_eq!(back.id, 3);
    }

    #[test]
    fn parse_maps_values_to_coords() {
        let space = space();
        let v = Vertex::parse("2.5, 30", &space, 1).unwrap();
        assert_eq!(v.coords(), &[2.5, 2.0]);
        assert!(Vertex::parse("2.5, 35", &space, 1).is_err());
    }

    #[test]
    fn norm_is_euclidean_in_coord_space() {
        let mut a = Vertex::new(2, 1);
        a.coords_mut().copy_from_slice(&[0.0, 0.0]);
        let mut b = Vertex::new(2, 1);
        b.coords_mut().copy_from_slice(&[3.0, 4.0]);
        assert_eq!(a.norm(&b), 5.0);
    }
}
