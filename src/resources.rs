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

//! Defines useful resource wrappers.

use crate::geometry::Geometry;
use crate::gpu_backend::{GpuContext, ProgramError, ShaderStage};

macro_rules! define_resource_wrappers {
    ($($name:ident($res:ident)),* $(,)?) => {
        $(
            pub(crate) struct $name<C: GpuContext + ?Sized> {
                resource: C::$res,
            }

            impl<C: GpuContext + ?Sized> $name<C> {
                pub(crate) fn from_raw(resource: C::$res) -> Self {
                    Self { resource }
                }

                pub(crate) fn resource(&self) -> &C::$res {
                    &self.resource
                }

                pub(crate) fn into_raw(self) -> C::$res {
                    self.resource
                }
            }
        )*
    };
}

define_resource_wrappers! {
    Program(Program),
    Mesh(Mesh),
}

impl<C: GpuContext + ?Sized> Program<C> {
    /// Compile both stages and link them.
    ///
    /// The two intermediate shaders live only for the duration of this call;
    /// `link_program` consumes them and the backend releases them once the
    /// link attempt is over.
    pub(crate) fn build(
        context: &mut C,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ProgramError> {
        let vertex = context.compile_shader(ShaderStage::Vertex, vertex_source)?;
        let fragment = match context.compile_shader(ShaderStage::Fragment, fragment_source) {
            Ok(fragment) => fragment,
            Err(e) => {
                context.delete_shader(vertex);
                return Err(e.into());
            }
        };
        let program = context.link_program(vertex, fragment)?;

        Ok(Self::from_raw(program))
    }
}

impl<C: GpuContext + ?Sized> Mesh<C> {
    pub(crate) fn upload(context: &mut C, geometry: &Geometry) -> Result<Self, C::Error> {
        context
            .create_mesh(geometry.vertices(), geometry.indices())
            .map(Self::from_raw)
    }
}
