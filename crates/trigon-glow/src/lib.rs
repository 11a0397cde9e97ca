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

//! A trigon GPU backend that uses the [`glow`] crate.
//!
//! Works on any OpenGL 3.3 core or WebGL2-class context. Wrap an active
//! [`glow`] context in a [`GlContext`] and hand it to a
//! [`trigon::Renderer`].
//!
//! [`glow`]: https://crates.io/crates/glow

use glow::HasContext;

use trigon::{GpuContext, LinkError, ShaderError, ShaderStage, Vertex};

use std::fmt;
use std::mem;

/// The attribute index the vertex buffer feeds; shaders declare their input
/// with `layout (location = 0)`.
const POSITION_ATTRIBUTE: u32 = 0;

/// A wrapper around a `glow` context.
pub struct GlContext<H: HasContext + ?Sized> {
    /// The underlying context.
    context: H,
}

impl<H: HasContext> GlContext<H> {
    /// Wrap a `glow` context.
    ///
    /// # Safety
    ///
    /// The context must be current on this thread, and must remain current
    /// for as long as the wrapper is in use.
    pub unsafe fn new(context: H) -> Self {
        Self { context }
    }
}

impl<H: HasContext + ?Sized> GlContext<H> {
    /// Get a reference to the underlying context.
    pub fn context(&self) -> &H {
        &self.context
    }
}

/// A wrapper around a `glow` vertex-array configuration and its backing
/// buffers.
pub struct GlMesh<H: HasContext + ?Sized> {
    /// The vertex-array configuration.
    vao: H::VertexArray,

    /// The buffer holding vertex positions.
    vbo: H::Buffer,

    /// The buffer holding triangle indices, if the mesh is indexed.
    ebo: Option<H::Buffer>,
}

/// An error reported by the GL driver outside of compiling and linking.
#[derive(Debug)]
pub struct GlError(String);

impl From<String> for GlError {
    fn from(s: String) -> Self {
        GlError(s)
    }
}

impl fmt::Display for GlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gl error: {}", self.0)
    }
}

impl std::error::Error for GlError {}

impl<H: HasContext + ?Sized> GpuContext for GlContext<H> {
    type Shader = H::Shader;
    type Program = H::Program;
    type Mesh = GlMesh<H>;
    type Error = GlError;

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<Self::Shader, ShaderError> {
        unsafe { compile_stage(&self.context, stage, source) }
    }

    fn link_program(
        &mut self,
        vertex: Self::Shader,
        fragment: Self::Shader,
    ) -> Result<Self::Program, LinkError> {
        unsafe { link_stages(&self.context, vertex, fragment) }
    }

    fn use_program(&mut self, program: &Self::Program) {
        unsafe {
            self.context.use_program(Some(*program));
        }
    }

    fn create_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: Option<&[u32]>,
    ) -> Result<Self::Mesh, Self::Error> {
        unsafe { upload_mesh(&self.context, vertices, indices) }
    }

    fn bind_mesh(&mut self, mesh: &Self::Mesh) {
        // The index buffer binding is part of the vertex-array state, so
        // binding the VAO restores it as well.
        unsafe {
            self.context.bind_vertex_array(Some(mesh.vao));
        }
    }

    fn clear(&mut self, color: [f32; 4]) {
        let [r, g, b, a] = color;

        unsafe {
            self.context.clear_color(r, g, b, a);
            self.context.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    fn viewport(&mut self, width: u32, height: u32) {
        unsafe {
            self.context.viewport(0, 0, width as i32, height as i32);
        }
    }

    fn draw_arrays(&mut self, count: i32) {
        unsafe {
            self.context.draw_arrays(glow::TRIANGLES, 0, count);
        }
    }

    fn draw_elements(&mut self, count: i32) {
        unsafe {
            self.context
                .draw_elements(glow::TRIANGLES, count, glow::UNSIGNED_INT, 0);
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        unsafe {
            self.context.flush();
        }

        gl_error(&self.context);
        Ok(())
    }

    fn delete_shader(&mut self, shader: Self::Shader) {
        unsafe {
            self.context.delete_shader(shader);
        }
    }

    fn delete_program(&mut self, program: Self::Program) {
        unsafe {
            self.context.delete_program(program);
        }
    }

    fn delete_mesh(&mut self, mesh: Self::Mesh) {
        unsafe {
            self.context.delete_vertex_array(mesh.vao);
            self.context.delete_buffer(mesh.vbo);
            if let Some(ebo) = mesh.ebo {
                self.context.delete_buffer(ebo);
            }
        }
    }
}

fn gl_stage(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

unsafe fn compile_stage<H: HasContext + ?Sized>(
    context: &H,
    stage: ShaderStage,
    source: &str,
) -> Result<H::Shader, ShaderError> {
    let shader = context
        .create_shader(gl_stage(stage))
        .map_err(|log| ShaderError::new(stage, log))?;
    let _delete_shader = CallOnDrop(|| context.delete_shader(shader));

    context.shader_source(shader, source);
    context.compile_shader(shader);

    if !context.get_shader_compile_status(shader) {
        let log = context.get_shader_info_log(shader);
        return Err(ShaderError::new(stage, log));
    }

    mem::forget(_delete_shader);
    Ok(shader)
}

unsafe fn link_stages<H: HasContext + ?Sized>(
    context: &H,
    vertex: H::Shader,
    fragment: H::Shader,
) -> Result<H::Program, LinkError> {
    let program = context.create_program().map_err(LinkError::new)?;
    let _delete_program = CallOnDrop(|| context.delete_program(program));

    context.attach_shader(program, vertex);
    context.attach_shader(program, fragment);

    // The program retains no dependency on its shaders once the link attempt
    // is over, successful or not.
    let _release_shaders = CallOnDrop(|| {
        context.detach_shader(program, vertex);
        context.detach_shader(program, fragment);
        context.delete_shader(vertex);
        context.delete_shader(fragment);
    });
    context.link_program(program);

    if !context.get_program_link_status(program) {
        let log = context.get_program_info_log(program);
        return Err(LinkError::new(log));
    }

    mem::forget(_delete_program);
    Ok(program)
}

unsafe fn upload_mesh<H: HasContext + ?Sized>(
    context: &H,
    vertices: &[Vertex],
    indices: Option<&[u32]>,
) -> Result<GlMesh<H>, GlError> {
    let vao = context.create_vertex_array().gl_err()?;
    let _delete_vao = CallOnDrop(|| context.delete_vertex_array(vao));
    context.bind_vertex_array(Some(vao));

    let vbo = context.create_buffer().gl_err()?;
    let _delete_vbo = CallOnDrop(|| context.delete_buffer(vbo));
    context.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
    context.buffer_data_u8_slice(
        glow::ARRAY_BUFFER,
        bytemuck::cast_slice(vertices),
        glow::STATIC_DRAW,
    );

    let ebo = match indices {
        Some(indices) => {
            let ebo = context.create_buffer().gl_err()?;
            context.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            context.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
                glow::STATIC_DRAW,
            );
            Some(ebo)
        }
        None => None,
    };

    context.vertex_attrib_pointer_f32(
        POSITION_ATTRIBUTE,
        3,
        glow::FLOAT,
        false,
        mem::size_of::<Vertex>() as i32,
        0,
    );
    context.enable_vertex_attrib_array(POSITION_ATTRIBUTE);
    context.bind_vertex_array(None);

    mem::forget(_delete_vao);
    mem::forget(_delete_vbo);
    Ok(GlMesh { vao, vbo, ebo })
}

fn gl_error(h: &(impl HasContext + ?Sized)) {
    let err = unsafe { h.get_error() };

    if err != glow::NO_ERROR {
        let error_str = match err {
            glow::INVALID_ENUM => "GL_INVALID_ENUM",
            glow::INVALID_VALUE => "GL_INVALID_VALUE",
            glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
            glow::STACK_OVERFLOW => "GL_STACK_OVERFLOW",
            glow::STACK_UNDERFLOW => "GL_STACK_UNDERFLOW",
            glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
            glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
            glow::CONTEXT_LOST => "GL_CONTEXT_LOST",
            _ => "Unknown GL error",
        };

        tracing::error!("GL error: {}", error_str)
    }
}

trait ResultExt<T, E> {
    fn gl_err(self) -> Result<T, GlError>;
}

impl<T, E: Into<GlError>> ResultExt<T, E> for Result<T, E> {
    fn gl_err(self) -> Result<T, GlError> {
        self.map_err(Into::into)
    }
}

struct CallOnDrop<F: FnMut()>(F);

impl<F: FnMut()> Drop for CallOnDrop<F> {
    fn drop(&mut self) {
        (self.0)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_map_to_their_gl_enums() {
        assert_eq!(gl_stage(ShaderStage::Vertex), glow::VERTEX_SHADER);
        assert_eq!(gl_stage(ShaderStage::Fragment), glow::FRAGMENT_SHADER);
    }

    #[test]
    fn gl_error_display_carries_the_driver_text() {
        let err = GlError::from(String::from("out of memory"));
        assert_eq!(err.to_string(), "gl error: out of memory");
    }
}
