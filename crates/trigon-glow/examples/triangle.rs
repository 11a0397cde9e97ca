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

//! The smallest possible scene: one orange triangle.

#[path = "util/setup_context.rs"]
mod util;

use trigon::{DrawCommand, Geometry};

const VERTEX_SHADER: &str = r#"#version 330 core
layout (location = 0) in vec3 aPos;
void main()
{
    gl_Position = vec4(aPos.x, aPos.y, aPos.z, 1.0);
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 330 core
out vec4 FragColor;
void main()
{
    FragColor = vec4(1.0, 0.5, 0.2, 1.0);
}
"#;

const CLEAR_COLOR: [f32; 4] = [0.2, 0.3, 0.3, 1.0];

fn main() {
    if let Err(err) = util::run_scene("trigon triangle example", |renderer| {
        let program = renderer.program(VERTEX_SHADER, FRAGMENT_SHADER)?;
        let mesh = renderer.upload(&Geometry::from_positions(&[
            [0.5, 0.5, 0.0],
            [0.5, -0.5, 0.0],
            [-0.5, -0.5, 0.0],
        ]))?;

        Ok(util::Scene {
            clear_color: CLEAR_COLOR,
            commands: vec![DrawCommand { mesh, program }],
        })
    }) {
        eprintln!("Failed to create a window: {err}");
        std::process::exit(-1);
    }
}
