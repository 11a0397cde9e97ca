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

//! Toolkit for creating GPU accelerated triangle rendering applications.
//!
//! This crate provides the common types and traits for drawing hand-written
//! triangle geometry through a hardware-accelerated backend like OpenGL or
//! WebGL, while leaving the actual GPU commands to the backend.
//!
//! To use, first implement the [`GpuContext`] trait on a type of your choice
//! that represents an active graphics context. Wrap this type in a
//! [`Renderer`], then set the scene up once at startup: request a program for
//! each vertex/fragment source pair with [`Renderer::program`] and upload each
//! [`Geometry`] with [`Renderer::upload`]. The handles that come back are
//! reusable across any number of frames; the frame loop only calls
//! [`Renderer::draw`].
//!
//! Compile and link failures are recoverable, reportable conditions: they
//! come back as [`ProgramError`] values carrying the driver's diagnostic
//! text, and nothing in this crate aborts on them.
//!
//! Note that this crate generally uses thread-unsafe primitives. This is
//! because drawing is usually pinned to one thread anyways, and it's a bad
//! idea to issue GPU commands outside of that thread.

#![forbid(unsafe_code, rust_2018_idioms)]

use ahash::RandomState;
use hashbrown::hash_map::{Entry, HashMap};

mod geometry;
mod gpu_backend;
mod resources;

pub use geometry::{Geometry, GeometryError};
pub use gpu_backend::{
    GpuContext, LinkError, ProgramError, ShaderError, ShaderStage, Vertex,
};

use resources::{Mesh, Program};

/// A handle to a linked, ready program.
///
/// Ready programs are terminal: a handle stays valid for the lifetime of the
/// renderer that issued it and may be drawn with any number of times.
/// Handles are only meaningful for the renderer that issued them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ProgramId(usize);

/// A handle to an uploaded mesh.
///
/// Handles are only meaningful for the renderer that issued them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MeshId(usize);

/// One draw: a mesh rendered with a program.
#[derive(Debug, Copy, Clone)]
pub struct DrawCommand {
    /// The mesh to bind.
    pub mesh: MeshId,

    /// The program to run over it.
    pub program: ProgramId,
}

/// The GPU renderer.
///
/// Owns the graphics context and every resource created through it. Programs
/// are cached by their source pair and meshes are uploaded once, so the
/// per-frame work reduces to bind-and-draw.
pub struct Renderer<C: GpuContext + ?Sized> {
    /// Ready programs, in creation order.
    programs: Vec<Program<C>>,

    /// Cache index over `programs`, keyed by the shader source pair.
    program_cache: HashMap<(String, String), ProgramId, RandomState>,

    /// Uploaded meshes, each with the draw call it takes.
    meshes: Vec<MeshEntry<C>>,

    /// The context to use for the GPU renderer.
    context: C,
}

struct MeshEntry<C: GpuContext + ?Sized> {
    mesh: Mesh<C>,
    draw: DrawKind,
}

#[derive(Debug, Copy, Clone)]
enum DrawKind {
    Arrays { count: i32 },
    Elements { count: i32 },
}

impl<C: GpuContext> Renderer<C> {
    /// Create a renderer that owns `context`.
    pub fn new(context: C) -> Self {
        Self {
            programs: Vec::new(),
            program_cache: HashMap::with_hasher(RandomState::new()),
            meshes: Vec::new(),
            context,
        }
    }

    /// Release every GPU resource this renderer created and hand the
    /// context back.
    pub fn dispose(mut self) -> C {
        for entry in self.meshes.drain(..) {
            self.context.delete_mesh(entry.mesh.into_raw());
        }
        for program in self.programs.drain(..) {
            self.context.delete_program(program.into_raw());
        }

        self.context
    }
}

impl<C: GpuContext + ?Sized> Renderer<C> {
    /// Get a reference to the context.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Get a mutable reference to the context.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Get the ready program for a vertex/fragment source pair.
    ///
    /// Each distinct pair is compiled and linked exactly once; later requests
    /// for the same pair return the existing handle. A pair that fails to
    /// compile or link is not cached, so a corrected retry starts fresh.
    pub fn program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, ProgramError> {
        let key = (vertex_source.to_owned(), fragment_source.to_owned());

        match self.program_cache.entry(key) {
            Entry::Occupied(entry) => {
                let id = *entry.get();
                tracing::debug!(?id, "program cache hit");
                Ok(id)
            }
            Entry::Vacant(entry) => {
                let program = Program::build(&mut self.context, vertex_source, fragment_source)?;
                let id = ProgramId(self.programs.len());
                self.programs.push(program);
                entry.insert(id);
                tracing::debug!(?id, "linked new program");
                Ok(id)
            }
        }
    }

    /// Upload a geometry once, for reuse across frames.
    ///
    /// Whether frames of this mesh draw raw vertices or indices is fixed
    /// here, by how the geometry was built.
    pub fn upload(&mut self, geometry: &Geometry) -> Result<MeshId, C::Error> {
        let mesh = Mesh::upload(&mut self.context, geometry)?;
        let draw = match geometry.indices() {
            Some(indices) => DrawKind::Elements {
                count: indices.len() as i32,
            },
            None => DrawKind::Arrays {
                count: geometry.vertices().len() as i32,
            },
        };

        let id = MeshId(self.meshes.len());
        self.meshes.push(MeshEntry { mesh, draw });
        tracing::debug!(?id, ?draw, "uploaded mesh");
        Ok(id)
    }

    /// Draw one frame.
    ///
    /// Clears to `clear_color`, then runs each command in order as bind mesh,
    /// use program, draw. A draw consumes whatever binding state was
    /// established immediately before it; nothing carries over between
    /// frames.
    ///
    /// # Panics
    ///
    /// Panics if a command holds a handle this renderer did not issue.
    pub fn draw(
        &mut self,
        clear_color: [f32; 4],
        commands: &[DrawCommand],
    ) -> Result<(), C::Error> {
        self.context.clear(clear_color);

        for command in commands {
            let entry = &self.meshes[command.mesh.0];
            self.context.bind_mesh(entry.mesh.resource());
            self.context
                .use_program(self.programs[command.program.0].resource());
            match entry.draw {
                DrawKind::Arrays { count } => self.context.draw_arrays(count),
                DrawKind::Elements { count } => self.context.draw_elements(count),
            }
        }

        self.context.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    const VERTEX_SOURCE: &str = "#version 330 core\n\
        layout (location = 0) in vec3 aPos;\n\
        void main()\n\
        {\n\
        gl_Position = vec4(aPos.x, aPos.y, aPos.z, 1.0);\n\
        }";

    const FRAGMENT_ORANGE: &str = "#version 330 core\n\
        out vec4 FragColor;\n\
        void main()\n\
        {\n\
        FragColor = vec4(1.0, 0.5, 0.2, 1.0);\n\
        }";

    const FRAGMENT_YELLOW: &str = "#version 330 core\n\
        out vec4 FragColor;\n\
        void main()\n\
        {\n\
        FragColor = vec4(0.9, 0.9, 0.05, 1.0);\n\
        }";

    /// What the fake driver records for each entry point.
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Compile(ShaderStage),
        Link,
        UseProgram(usize),
        CreateMesh { vertices: usize, indexed: bool },
        BindMesh(usize),
        Clear,
        Viewport(u32, u32),
        DrawArrays(i32),
        DrawElements(i32),
        Flush,
        DeleteShader,
        DeleteProgram,
        DeleteMesh,
    }

    /// A recording stand-in for a GPU driver.
    ///
    /// Handles are counters. Compilation rejects empty source the way a
    /// driver rejects malformed text; linking succeeds for any two compiled
    /// shaders unless a failure log has been injected through `fail_link`.
    #[derive(Default)]
    struct FakeContext {
        calls: Vec<Call>,
        fail_link: Option<String>,
        shaders: usize,
        programs: usize,
        meshes: usize,
    }

    impl FakeContext {
        fn take_calls(&mut self) -> Vec<Call> {
            std::mem::take(&mut self.calls)
        }
    }

    impl GpuContext for FakeContext {
        type Shader = usize;
        type Program = usize;
        type Mesh = usize;
        type Error = Infallible;

        fn compile_shader(
            &mut self,
            stage: ShaderStage,
            source: &str,
        ) -> Result<usize, ShaderError> {
            self.calls.push(Call::Compile(stage));
            if source.trim().is_empty() {
                return Err(ShaderError::new(stage, "0:0(1): error: empty source"));
            }

            self.shaders += 1;
            Ok(self.shaders)
        }

        fn link_program(&mut self, _vertex: usize, _fragment: usize) -> Result<usize, LinkError> {
            self.calls.push(Call::Link);
            if let Some(log) = self.fail_link.take() {
                return Err(LinkError::new(log));
            }

            self.programs += 1;
            Ok(self.programs)
        }

        fn use_program(&mut self, program: &usize) {
            self.calls.push(Call::UseProgram(*program));
        }

        fn create_mesh(
            &mut self,
            vertices: &[Vertex],
            indices: Option<&[u32]>,
        ) -> Result<usize, Infallible> {
            self.calls.push(Call::CreateMesh {
                vertices: vertices.len(),
                indexed: indices.is_some(),
            });
            self.meshes += 1;
            Ok(self.meshes)
        }

        fn bind_mesh(&mut self, mesh: &usize) {
            self.calls.push(Call::BindMesh(*mesh));
        }

        fn clear(&mut self, _color: [f32; 4]) {
            self.calls.push(Call::Clear);
        }

        fn viewport(&mut self, width: u32, height: u32) {
            self.calls.push(Call::Viewport(width, height));
        }

        fn draw_arrays(&mut self, count: i32) {
            self.calls.push(Call::DrawArrays(count));
        }

        fn draw_elements(&mut self, count: i32) {
            self.calls.push(Call::DrawElements(count));
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            self.calls.push(Call::Flush);
            Ok(())
        }

        fn delete_shader(&mut self, _shader: usize) {
            self.calls.push(Call::DeleteShader);
        }

        fn delete_program(&mut self, _program: usize) {
            self.calls.push(Call::DeleteProgram);
        }

        fn delete_mesh(&mut self, _mesh: usize) {
            self.calls.push(Call::DeleteMesh);
        }
    }

    fn quad() -> Geometry {
        Geometry::indexed(
            vec![
                Vertex::new(0.5, 0.5, 0.0),
                Vertex::new(0.5, -0.5, 0.0),
                Vertex::new(-0.5, -0.5, 0.0),
                Vertex::new(-0.5, 0.5, 0.0),
            ],
            vec![0, 1, 3, 1, 2, 3],
        )
        .unwrap()
    }

    #[test]
    fn valid_pair_compiles_then_links() {
        let mut renderer = Renderer::new(FakeContext::default());

        renderer.program(VERTEX_SOURCE, FRAGMENT_ORANGE).unwrap();
        assert_eq!(
            renderer.context_mut().take_calls(),
            vec![
                Call::Compile(ShaderStage::Vertex),
                Call::Compile(ShaderStage::Fragment),
                Call::Link,
            ],
        );
    }

    #[test]
    fn empty_fragment_source_is_a_compile_error() {
        let mut renderer = Renderer::new(FakeContext::default());

        let err = renderer.program(VERTEX_SOURCE, "").unwrap_err();
        let err = match err {
            ProgramError::Compile(err) => err,
            other => panic!("expected a compile error, got {other:?}"),
        };
        assert_eq!(err.stage(), ShaderStage::Fragment);
        assert!(!err.log().is_empty());

        // No program came out of the failed attempt, and the vertex shader
        // that did compile was released rather than left attached to nothing.
        let calls = renderer.context_mut().take_calls();
        assert!(!calls.contains(&Call::Link));
        assert!(calls.contains(&Call::DeleteShader));
    }

    #[test]
    fn compile_scenarios_from_observed_sources() {
        let mut context = FakeContext::default();

        context
            .compile_shader(
                ShaderStage::Vertex,
                "#version 330 core\nvoid main(){gl_Position=vec4(0,0,0,1);}",
            )
            .unwrap();
        let err = context.compile_shader(ShaderStage::Fragment, "").unwrap_err();
        assert_eq!(err.stage(), ShaderStage::Fragment);
        assert!(!err.log().is_empty());
    }

    #[test]
    fn mismatched_varyings_still_link() {
        // The vertex stage emits no varying the fragment stage consumes;
        // linking does not require varying usage, so this is not an error.
        let mut renderer = Renderer::new(FakeContext::default());
        renderer.program(VERTEX_SOURCE, FRAGMENT_ORANGE).unwrap();
    }

    #[test]
    fn program_cache_compiles_each_pair_once() {
        let mut renderer = Renderer::new(FakeContext::default());

        let first = renderer.program(VERTEX_SOURCE, FRAGMENT_ORANGE).unwrap();
        let again = renderer.program(VERTEX_SOURCE, FRAGMENT_ORANGE).unwrap();
        assert_eq!(first, again);

        let links = renderer
            .context_mut()
            .take_calls()
            .iter()
            .filter(|call| **call == Call::Link)
            .count();
        assert_eq!(links, 1);

        // A different fragment source is a different program.
        let yellow = renderer.program(VERTEX_SOURCE, FRAGMENT_YELLOW).unwrap();
        assert_ne!(first, yellow);
    }

    #[test]
    fn failed_link_is_not_cached() {
        let mut renderer = Renderer::new(FakeContext::default());
        renderer.context_mut().fail_link = Some("error: no main in fragment stage".into());

        let err = renderer.program(VERTEX_SOURCE, FRAGMENT_ORANGE).unwrap_err();
        assert!(matches!(err, ProgramError::Link(_)));

        // The attempt is terminal; retrying with the (here, corrected)
        // source starts over instead of handing back a broken handle.
        renderer.context_mut().take_calls();
        renderer.program(VERTEX_SOURCE, FRAGMENT_ORANGE).unwrap();
        assert!(renderer.context_mut().take_calls().contains(&Call::Link));
    }

    #[test]
    fn draw_binds_then_uses_then_draws() {
        let mut renderer = Renderer::new(FakeContext::default());

        let program = renderer.program(VERTEX_SOURCE, FRAGMENT_ORANGE).unwrap();
        let mesh = renderer.upload(&quad()).unwrap();
        renderer.context_mut().take_calls();

        renderer
            .draw([0.2, 0.3, 0.3, 1.0], &[DrawCommand { mesh, program }])
            .unwrap();
        assert_eq!(
            renderer.context_mut().take_calls(),
            vec![
                Call::Clear,
                Call::BindMesh(1),
                Call::UseProgram(1),
                Call::DrawElements(6),
                Call::Flush,
            ],
        );
    }

    #[test]
    fn draw_consumes_whatever_was_bound_last() {
        let mut renderer = Renderer::new(FakeContext::default());

        let orange = renderer.program(VERTEX_SOURCE, FRAGMENT_ORANGE).unwrap();
        let yellow = renderer.program(VERTEX_SOURCE, FRAGMENT_YELLOW).unwrap();
        let first = renderer
            .upload(&Geometry::from_positions(&[
                [-0.8, 0.5, 0.0],
                [-0.8, -0.5, 0.0],
                [-0.3, -0.5, 0.0],
            ]))
            .unwrap();
        let second = renderer
            .upload(&Geometry::from_positions(&[
                [-0.2, 0.5, 0.0],
                [-0.2, -0.5, 0.0],
                [0.3, -0.5, 0.0],
            ]))
            .unwrap();
        renderer.context_mut().take_calls();

        renderer
            .draw(
                [0.2, 0.3, 0.3, 1.0],
                &[
                    DrawCommand {
                        mesh: first,
                        program: orange,
                    },
                    DrawCommand {
                        mesh: second,
                        program: yellow,
                    },
                ],
            )
            .unwrap();

        // Each draw follows its own bind pair; the second command's state
        // fully replaces the first's.
        assert_eq!(
            renderer.context_mut().take_calls(),
            vec![
                Call::Clear,
                Call::BindMesh(1),
                Call::UseProgram(1),
                Call::DrawArrays(3),
                Call::BindMesh(2),
                Call::UseProgram(2),
                Call::DrawArrays(3),
                Call::Flush,
            ],
        );
    }

    #[test]
    fn indexed_and_raw_draws_take_their_counts_from_the_data() {
        let mut renderer = Renderer::new(FakeContext::default());

        let indexed = renderer.upload(&quad()).unwrap();
        let raw = renderer
            .upload(&Geometry::from_positions(&[
                [-0.5, -0.5, 0.0],
                [0.5, -0.5, 0.0],
                [0.0, 0.5, 0.0],
            ]))
            .unwrap();
        let program = renderer.program(VERTEX_SOURCE, FRAGMENT_ORANGE).unwrap();
        renderer.context_mut().take_calls();

        renderer
            .draw(
                [0.2, 0.3, 0.3, 1.0],
                &[
                    DrawCommand {
                        mesh: indexed,
                        program,
                    },
                    DrawCommand { mesh: raw, program },
                ],
            )
            .unwrap();

        let calls = renderer.context_mut().take_calls();
        assert!(calls.contains(&Call::DrawElements(6)));
        assert!(calls.contains(&Call::DrawArrays(3)));
    }

    #[test]
    fn viewport_passes_through_to_the_context() {
        let mut renderer = Renderer::new(FakeContext::default());

        renderer.context_mut().viewport(800, 600);
        assert_eq!(
            renderer.context_mut().take_calls(),
            vec![Call::Viewport(800, 600)],
        );
    }

    #[test]
    fn dispose_releases_every_resource() {
        let mut renderer = Renderer::new(FakeContext::default());

        renderer.program(VERTEX_SOURCE, FRAGMENT_ORANGE).unwrap();
        renderer.program(VERTEX_SOURCE, FRAGMENT_YELLOW).unwrap();
        renderer.upload(&quad()).unwrap();

        let mut context = renderer.dispose();
        let calls = context.take_calls();
        let deleted_programs = calls
            .iter()
            .filter(|call| **call == Call::DeleteProgram)
            .count();
        let deleted_meshes = calls.iter().filter(|call| **call == Call::DeleteMesh).count();
        assert_eq!(deleted_programs, 2);
        assert_eq!(deleted_meshes, 1);
    }
}
