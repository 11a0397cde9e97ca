// SPDX-License-Identifier: LGPL-3.0-or-later OR MPL-2.0
// This file is a part of `trigon`.
//
// `trigon` is free software: you can redistribute it and/or modify it under the terms of
// either:
//
// * GNU Lesser General Public License as published by the Free Software Foundation, either
// version 3 of the License, or (at your option) any later version.
// * Mozilla Public License as published by the Mozilla Foundation, version 2.
//
// `trigon` is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Lesser General Public License or the Mozilla Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License and the Mozilla
// Public License along with `trigon`. If not, see <https://www.gnu.org/licenses/> or
// <https://www.mozilla.org/en-US/MPL/2.0/>.

//! Triangle geometry shared between backends.

use crate::gpu_backend::Vertex;

use std::error::Error;
use std::fmt;

/// An ordered sequence of vertices, optionally paired with triangle indices.
///
/// Without indices, consecutive vertex triples form triangles. With indices,
/// each index triple selects vertices from the sequence, so shared corners
/// are stored once. Indexed construction validates every index against the
/// vertex count up front; a draw issued for a validated geometry can never
/// reach past its backing storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    vertices: Vec<Vertex>,
    indices: Option<Vec<u32>>,
}

impl Geometry {
    /// Create a non-indexed geometry.
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self {
            vertices,
            indices: None,
        }
    }

    /// Create a non-indexed geometry from raw positions.
    pub fn from_positions(positions: &[[f32; 3]]) -> Self {
        Self::new(positions.iter().map(|&[x, y, z]| Vertex::new(x, y, z)).collect())
    }

    /// Create an indexed geometry.
    ///
    /// Fails if any index refers past the end of the vertex sequence.
    pub fn indexed(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self, GeometryError> {
        let len = vertices.len();
        if let Some(&index) = indices.iter().find(|&&index| index as usize >= len) {
            return Err(GeometryError::IndexOutOfBounds { index, len });
        }

        Ok(Self {
            vertices,
            indices: Some(indices),
        })
    }

    /// The vertex sequence.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// The index sequence, if this geometry is indexed.
    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    /// The number of entries a draw of this geometry consumes.
    ///
    /// This is the index count for indexed geometry and the vertex count
    /// otherwise; it is derived from the data rather than supplied by the
    /// caller.
    pub fn draw_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.vertices.len(),
        }
    }

    /// The number of whole triangles a draw of this geometry produces.
    pub fn triangle_count(&self) -> usize {
        self.draw_count() / 3
    }
}

/// A failure to construct a [`Geometry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// An index refers past the end of the vertex sequence.
    IndexOutOfBounds {
        /// The offending index.
        index: u32,

        /// The number of vertices it was checked against.
        len: usize,
    },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} is out of bounds for {len} vertices")
            }
        }
    }
}

impl Error for GeometryError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_vertices() -> Vec<Vertex> {
        vec![
            Vertex::new(0.5, 0.5, 0.0),
            Vertex::new(0.5, -0.5, 0.0),
            Vertex::new(-0.5, -0.5, 0.0),
            Vertex::new(-0.5, 0.5, 0.0),
        ]
    }

    #[test]
    fn indexed_quad_draws_two_triangles() {
        let quad = Geometry::indexed(quad_vertices(), vec![0, 1, 3, 1, 2, 3]).unwrap();
        assert_eq!(quad.draw_count(), 6);
        assert_eq!(quad.triangle_count(), 2);
        assert_eq!(quad.indices().unwrap().len(), 6);
    }

    #[test]
    fn rejects_index_past_backing_storage() {
        // Four vertices drawn as six raw entries would read out of bounds;
        // the indexed form makes the same mistake detectable up front.
        let err = Geometry::indexed(quad_vertices(), vec![0, 1, 3, 1, 2, 4]).unwrap_err();
        assert_eq!(err, GeometryError::IndexOutOfBounds { index: 4, len: 4 });
    }

    #[test]
    fn non_indexed_count_follows_vertices() {
        let two = Geometry::from_positions(&[
            [-0.8, 0.5, 0.0],
            [-0.8, -0.5, 0.0],
            [-0.3, -0.5, 0.0],
            [-0.2, 0.5, 0.0],
            [-0.2, -0.5, 0.0],
            [0.3, -0.5, 0.0],
        ]);
        assert_eq!(two.draw_count(), 6);
        assert_eq!(two.triangle_count(), 2);
        assert!(two.indices().is_none());
    }
}
