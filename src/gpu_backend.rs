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

//! Defines the GPU backend for trigon.

use std::error::Error;
use std::fmt;

/// The backend for the GPU renderer.
///
/// The graphics context's "current program" and "current vertex-array binding"
/// are mutable state global to the context. Modeling the context as an explicit
/// object keeps that state visible to the [`Renderer`] that owns it, and lets
/// tests assert binding order without a real GPU.
///
/// [`Renderer`]: crate::Renderer
pub trait GpuContext {
    /// The type associated with a compiled shader stage.
    ///
    /// Owned exclusively by the caller until it is passed to
    /// [`link_program`], which consumes it.
    ///
    /// [`link_program`]: GpuContext::link_program
    type Shader;

    /// The type associated with a linked, bindable shader program.
    type Program;

    /// The type associated with an uploaded mesh.
    ///
    /// Contains the vertex buffer, the optional index buffer, and the
    /// vertex-array configuration mapping raw position floats to the
    /// shader's per-vertex input.
    type Mesh;

    /// The error type associated with this GPU context.
    type Error: Error + 'static;

    /// Compile a single shader stage from source.
    ///
    /// Compilation failure is a recoverable, reportable condition: the
    /// driver's diagnostic text is returned in full and no shader object
    /// survives the failure.
    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<Self::Shader, ShaderError>;

    /// Link a compiled vertex and fragment shader into a program.
    ///
    /// Both shaders are consumed; after the link attempt the program retains
    /// no dependency on them and the backend releases them, whether or not
    /// the link succeeded.
    fn link_program(
        &mut self,
        vertex: Self::Shader,
        fragment: Self::Shader,
    ) -> Result<Self::Program, LinkError>;

    /// Make `program` current for subsequent draw calls.
    fn use_program(&mut self, program: &Self::Program);

    /// Upload vertices, and optionally triangle indices, into a new mesh.
    fn create_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: Option<&[u32]>,
    ) -> Result<Self::Mesh, Self::Error>;

    /// Bind the mesh's vertex-array configuration and buffers.
    ///
    /// A draw call consumes whatever mesh is bound at call time, so this
    /// must precede the draw that depends on it.
    fn bind_mesh(&mut self, mesh: &Self::Mesh);

    /// Clear the screen with the given color.
    fn clear(&mut self, color: [f32; 4]);

    /// Set the drawable area to `width` by `height` pixels.
    fn viewport(&mut self, width: u32, height: u32);

    /// Draw `count` raw vertices from the bound mesh as triangles.
    fn draw_arrays(&mut self, count: i32);

    /// Draw `count` indices from the bound mesh's index buffer as triangles.
    fn draw_elements(&mut self, count: i32);

    /// Flush the GPU commands.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Delete a shader that was never attached to a program.
    fn delete_shader(&mut self, shader: Self::Shader);

    /// Delete a program.
    fn delete_program(&mut self, program: Self::Program);

    /// Delete a mesh.
    fn delete_mesh(&mut self, mesh: Self::Mesh);
}

impl<C: GpuContext + ?Sized> GpuContext for &mut C {
    type Shader = C::Shader;
    type Program = C::Program;
    type Mesh = C::Mesh;
    type Error = C::Error;

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<Self::Shader, ShaderError> {
        (**self).compile_shader(stage, source)
    }

    fn link_program(
        &mut self,
        vertex: Self::Shader,
        fragment: Self::Shader,
    ) -> Result<Self::Program, LinkError> {
        (**self).link_program(vertex, fragment)
    }

    fn use_program(&mut self, program: &Self::Program) {
        (**self).use_program(program)
    }

    fn create_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: Option<&[u32]>,
    ) -> Result<Self::Mesh, Self::Error> {
        (**self).create_mesh(vertices, indices)
    }

    fn bind_mesh(&mut self, mesh: &Self::Mesh) {
        (**self).bind_mesh(mesh)
    }

    fn clear(&mut self, color: [f32; 4]) {
        (**self).clear(color)
    }

    fn viewport(&mut self, width: u32, height: u32) {
        (**self).viewport(width, height)
    }

    fn draw_arrays(&mut self, count: i32) {
        (**self).draw_arrays(count)
    }

    fn draw_elements(&mut self, count: i32) {
        (**self).draw_elements(count)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }

    fn delete_shader(&mut self, shader: Self::Shader) {
        (**self).delete_shader(shader)
    }

    fn delete_program(&mut self, program: Self::Program) {
        (**self).delete_program(program)
    }

    fn delete_mesh(&mut self, mesh: Self::Mesh) {
        (**self).delete_mesh(mesh)
    }
}

/// The shader stages a program is linked from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Runs once per vertex and emits its clip-space position.
    Vertex,

    /// Runs once per fragment and emits its color.
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// The vertex type used by the GPU renderer.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// The position of the vertex, in normalized device coordinates.
    pub pos: [f32; 3],
}

impl Vertex {
    /// Create a vertex at the given position.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { pos: [x, y, z] }
    }
}

/// A failure to compile a single shader stage.
#[derive(Debug, Clone)]
pub struct ShaderError {
    stage: ShaderStage,
    log: String,
}

impl ShaderError {
    /// Create an error carrying the driver's compile diagnostic.
    pub fn new(stage: ShaderStage, log: impl Into<String>) -> Self {
        Self {
            stage,
            log: log.into(),
        }
    }

    /// The stage that failed to compile.
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// The driver's diagnostic text, unabridged.
    pub fn log(&self) -> &str {
        &self.log
    }
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to compile {} shader: {}", self.stage, self.log)
    }
}

impl Error for ShaderError {}

/// A failure to link compiled shaders into a program.
#[derive(Debug, Clone)]
pub struct LinkError {
    log: String,
}

impl LinkError {
    /// Create an error carrying the driver's link diagnostic.
    pub fn new(log: impl Into<String>) -> Self {
        Self { log: log.into() }
    }

    /// The driver's diagnostic text, unabridged.
    pub fn log(&self) -> &str {
        &self.log
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to link program: {}", self.log)
    }
}

impl Error for LinkError {}

/// A failure to turn shader source into a usable program.
///
/// A program attempt that fails is terminal; the caller discards it and
/// retries with corrected source.
#[derive(Debug, Clone)]
pub enum ProgramError {
    /// A stage failed to compile.
    Compile(ShaderError),

    /// The compiled stages failed to link.
    Link(LinkError),
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::Compile(e) => fmt::Display::fmt(e, f),
            ProgramError::Link(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl Error for ProgramError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProgramError::Compile(e) => Some(e),
            ProgramError::Link(e) => Some(e),
        }
    }
}

impl From<ShaderError> for ProgramError {
    fn from(e: ShaderError) -> Self {
        ProgramError::Compile(e)
    }
}

impl From<LinkError> for ProgramError {
    fn from(e: LinkError) -> Self {
        ProgramError::Link(e)
    }
}
