//! Simplex construction and transformation.

use crate::error::{Result, SearchError};
use crate::vertex::{space_diameter, Vertex};
use crate::space::SearchSpace;
use rand::Rng;
use std::ops::{Index, IndexMut};

/// An ordered set of `K >= space.len() + 1` vertices.
#[derive(Debug, Clone)]
pub struct Simplex {
    vertices: Vec<Vertex>,
}

impl Simplex {
    pub fn new(size: usize, space_len: usize, perf_n: usize) -> Self {
        Self {
            vertices: (0..size).map(|_| Vertex::new(space_len, perf_n)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertices_mut(&mut self) -> &mut [Vertex] {
        &mut self.vertices
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }

    pub fn copy_from(&mut self, other: &Simplex) {
        for (dst, src) in self.vertices.iter_mut().zip(other.vertices.iter()) {
            dst.copy_from(src);
        }
    }

    /// Construct a regular simplex centred at `center` whose
    /// vertex-to-centroid distance is `radius_frac` of the space diameter.
    ///
    /// The first `len + 1` vertices follow the standard Nelder-Mead
    /// regular-simplex construction; any additional vertices are uniform
    /// random samples of the space.  Unless `fast` is set, every vertex is
    /// then projected onto legal values (which clamps into bounds).  Fails
    /// if the projected simplex is collapsed, i.e. the radius is below the
    /// space's resolution.
    pub fn set<R: Rng>(
        &mut self,
        space: &SearchSpace,
        center: &Vertex,
        radius_frac: f64,
        rng: &mut R,
        fast: bool,
    ) -> Result<()> {
        let n = space.len();
        if self.len() < n + 1 {
            return Err(SearchError::Internal(format!(
                "simplex of {} vertices in a {n}-dimensional space",
                self.len()
            )));
        }

        let radius = radius_frac * space_diameter(space);

        // Spendley's unit-edge construction: vertex 0 at the origin, vertex
        // i offset by q in every dimension plus an extra p - q along axis i.
        let nf = n as f64;
        let p = ((nf + 1.0).sqrt() + nf - 1.0) / (nf * 2.0_f64.sqrt());
        let q = ((nf + 1.0).sqrt() - 1.0) / (nf * 2.0_f64.sqrt());

        let mut unit: Vec<Vec<f64>> = vec![vec![0.0; n]];
        for i in 0..n {
            let mut coords = vec![q; n];
            coords[i] = p;
            unit.push(coords);
        }

        // Recentre on the construction centroid and rescale so every vertex
        // sits exactly `radius` from it.
        let mut centroid = vec![0.0; n];
        for coords in &unit {
            for (c, x) in centroid.iter_mut().zip(coords.iter()) {
                *c += x / (nf + 1.0);
            }
        }
        let circum = unit[0]
            .iter()
            .zip(centroid.iter())
            .map(|(x, c)| (x - c) * (x - c))
            .sum::<f64>()
            .sqrt();
        let scale = if circum > 0.0 { radius / circum } else { 0.0 };

        for (vertex, coords) in self.vertices.iter_mut().zip(unit.iter()) {
            vertex.id = 0;
            for ((dst, x), (c, base)) in vertex
                .coords_mut()
                .iter_mut()
                .zip(coords.iter())
                .zip(centroid.iter().zip(center.coords().iter()))
            {
                *dst = base + (x - c) * scale;
            }
        }

        // PRO permits oversized simplexes; fill the remainder randomly.
        for vertex in self.vertices.iter_mut().skip(n + 1) {
            vertex.id = 0;
            vertex.randomize(space, rng);
        }

        if !fast {
            for vertex in &mut self.vertices {
                vertex.align(space);
            }
        }

        if self.collapsed(space) {
            return Err(SearchError::Space(
                "initial simplex collapses to a single point".into(),
            ));
        }
        Ok(())
    }

    /// Arithmetic mean of the vertices whose id is not 0.  Skipping
    /// sentinels lets a caller exclude a vertex by temporarily clearing its
    /// id.  Coordinates and performance are both averaged.
    pub fn centroid_into(&self, out: &mut Vertex) {
        let included: Vec<&Vertex> = {
            let tagged: Vec<&Vertex> = self.vertices.iter().filter(|v| v.id != 0).collect();
            if tagged.is_empty() {
                self.vertices.iter().collect()
            } else {
                tagged
            }
        };
        let count = included.len() as f64;

        out.id = 0;
        out.coords_mut().fill(0.0);
        for vertex in &included {
            for (dst, c) in out.coords_mut().iter_mut().zip(vertex.coords().iter()) {
                *dst += c;
            }
        }
        for dst in out.coords_mut().iter_mut() {
            *dst /= count;
        }

        for k in 0..out.perf.len() {
            let sum: f64 = included.iter().map(|v| v.perf.obj(k)).sum();
            *out.perf.obj_mut(k) = sum / count;
        }
    }

    /// Apply `Vertex::transform_into(pivot, v, c)` element-wise into `out`.
    pub fn transform_into(&self, pivot: &Vertex, c: f64, out: &mut Simplex) {
        for (dst, src) in out.vertices.iter_mut().zip(self.vertices.iter()) {
            Vertex::transform_into(pivot, src, c, dst);
        }
    }

    /// In-place transform around one of this simplex's own vertices.
    pub fn transform_about(&mut self, pivot_idx: usize, c: f64) {
        let pivot = self.vertices[pivot_idx].clone();
        for vertex in &mut self.vertices {
            for (x, o) in vertex.coords_mut().iter_mut().zip(pivot.coords().iter()) {
                *x = o + c * (*x - o);
            }
        }
    }

    /// True iff every vertex projects onto the same aligned point.
    pub fn collapsed(&self, space: &SearchSpace) -> bool {
        let aligned = |v: &Vertex| -> Vec<f64> {
            v.coords()
                .iter()
                .zip(space.iter())
                .map(|(c, dim)| dim.range.align(*c))
                .collect()
        };
        let first = aligned(&self.vertices[0]);
        self.vertices.iter().skip(1).all(|v| aligned(v) == first)
    }

    /// True iff every vertex lies outside the space.
    pub fn out_of_bounds(&self, space: &SearchSpace) -> bool {
        self.vertices.iter().all(|v| !v.is_inbounds(space))
    }
}

impl Index<usize> for Simplex {
    type Output = Vertex;

    fn index(&self, idx: usize) -> &Vertex {
        &self.vertices[idx]
    }
}

impl IndexMut<usize> for Simplex {
    fn index_mut(&mut self, idx: usize) -> &mut Vertex {
        &mut self.vertices[idx]
    }
}
