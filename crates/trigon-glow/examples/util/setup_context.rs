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

// Easy module for setting up a window and a current GL context for the
// examples. The scene is built once, right after the context comes up; the
// event loop then redraws it until the window closes or Escape is pressed.

use trigon_glow::GlContext;

use trigon::{DrawCommand, GpuContext, Renderer};

use glutin::config::{Config, ConfigTemplateBuilder};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, NotCurrentContext, PossiblyCurrentContext, Version,
};
use glutin::display::{Display, GetGlDisplay};
use glutin::prelude::*;
use glutin::surface::{Surface, SwapInterval, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow};

use raw_window_handle::HasRawWindowHandle;

use std::error::Error;
use std::mem;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::{EventLoop, EventLoopWindowTarget};
use winit::window::{Window, WindowBuilder};

/// What an example draws every frame.
pub(crate) struct Scene {
    pub(crate) clear_color: [f32; 4],
    pub(crate) commands: Vec<DrawCommand>,
}

pub(crate) struct GlutinSetup {
    display: Display,
    config: Config,
    context: ContextType,
    window: Option<Window>,
}

enum ContextType {
    NotCurrent(NotCurrentContext),
    Current {
        context: PossiblyCurrentContext,
        window: Window,
        surface: Surface<WindowSurface>,
    },
    Hole,
}

impl Default for ContextType {
    fn default() -> Self {
        Self::Hole
    }
}

fn make_window_builder(title: &str) -> WindowBuilder {
    WindowBuilder::new()
        .with_title(title)
        .with_inner_size(LogicalSize::new(800.0, 600.0))
}

impl GlutinSetup {
    pub(crate) fn new<T>(
        event_loop: &EventLoopWindowTarget<T>,
        title: &str,
    ) -> Result<Self, Box<dyn Error>> {
        // Start building a window. Windows requires it up front.
        let window = if cfg!(windows) {
            Some(make_window_builder(title))
        } else {
            None
        };

        // Use the window builder to start building a display, and take the
        // config with the best sample count.
        let display = DisplayBuilder::new().with_window_builder(window);
        let (window, gl_config) =
            display.build(event_loop, ConfigTemplateBuilder::new(), |configs| {
                configs
                    .reduce(|accum, config| {
                        if config.num_samples() > accum.num_samples() {
                            config
                        } else {
                            accum
                        }
                    })
                    .unwrap()
            })?;

        // Try a 3.3 core context first, then whatever the platform offers.
        let window_handle = window.as_ref().map(|w| w.raw_window_handle());
        let contexts = [
            ContextAttributesBuilder::new()
                .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
                .build(window_handle),
            ContextAttributesBuilder::new().build(window_handle),
            ContextAttributesBuilder::new()
                .with_context_api(ContextApi::Gles(None))
                .build(window_handle),
        ];

        let display = gl_config.display();
        let gl_context = (|| {
            for attrs in &contexts {
                if let Ok(gl_context) = unsafe { display.create_context(&gl_config, attrs) } {
                    return Ok(gl_context);
                }
            }

            Err(Box::<dyn Error>::from("could not create a GL context"))
        })()?;

        Ok(Self {
            display,
            config: gl_config,
            context: ContextType::NotCurrent(gl_context),
            window,
        })
    }

    fn make_current<T>(
        &mut self,
        window_target: &EventLoopWindowTarget<T>,
        title: &str,
    ) -> glow::Context {
        let window = self.window.take().unwrap_or_else(|| {
            glutin_winit::finalize_window(window_target, make_window_builder(title), &self.config)
                .unwrap()
        });

        let attrs = window.build_surface_attributes(<_>::default());
        let gl_surface = unsafe {
            self.display
                .create_window_surface(&self.config, &attrs)
                .unwrap()
        };

        // Make it current.
        let gl_context = match mem::take(&mut self.context) {
            ContextType::NotCurrent(context) => context.make_current(&gl_surface).unwrap(),
            _ => panic!("Invalid state!"),
        };

        // Try setting vsync.
        if let Err(res) = gl_surface
            .set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::new(1).unwrap()))
        {
            eprintln!("Error setting vsync: {res:?}");
        }

        self.context = ContextType::Current {
            context: gl_context,
            window,
            surface: gl_surface,
        };

        // Set up the Glow context.
        let display = self.display.clone();
        let glow_context = unsafe {
            glow::Context::from_loader_function_cstr(|s| display.get_proc_address(s) as *const _)
        };

        #[cfg(not(target_vendor = "apple"))]
        unsafe {
            use glow::HasContext;

            glow_context.enable(glow::DEBUG_OUTPUT);
            glow_context.debug_message_callback(debug_message_callback);
        }

        glow_context
    }
}

/// Open the window, bring a context up, build the scene once, and redraw it
/// until the window closes or Escape is pressed.
///
/// Returns early only if the window or the GL context could not be created;
/// the caller reports that and exits with `-1`.
pub(crate) fn run_scene(
    title: &'static str,
    build: impl FnOnce(&mut Renderer<GlContext<glow::Context>>) -> Result<Scene, Box<dyn Error>>
        + 'static,
) -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let event_loop = EventLoop::new();
    let mut setup = GlutinSetup::new(&event_loop, title)?;

    let mut build = Some(build);
    let mut state = None;
    let mut next_render = Instant::now() + Duration::from_millis(16);

    event_loop.run(move |event, window_target, control_flow| {
        control_flow.set_wait_until(next_render);
        match event {
            Event::Resumed => {
                let glow_context = setup.make_current(window_target, title);

                if state.is_none() {
                    // SAFETY: the context was just made current and stays so
                    // for the lifetime of the loop.
                    let mut renderer = Renderer::new(unsafe { GlContext::new(glow_context) });

                    match (build.take().unwrap())(&mut renderer) {
                        Ok(scene) => state = Some((renderer, scene)),
                        Err(err) => {
                            eprintln!("Failed to set the scene up: {err}");
                            std::process::exit(-1);
                        }
                    }
                }
            }
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::Resized(size) => {
                    if size.width != 0 && size.height != 0 {
                        if let ContextType::Current {
                            context, surface, ..
                        } = &setup.context
                        {
                            surface.resize(
                                context,
                                NonZeroU32::new(size.width).unwrap(),
                                NonZeroU32::new(size.height).unwrap(),
                            );
                            if let Some((renderer, _)) = &mut state {
                                renderer.context_mut().viewport(size.width, size.height);
                            }
                        }
                    }
                }
                WindowEvent::CloseRequested => {
                    control_flow.set_exit();
                }
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(VirtualKeyCode::Escape),
                            ..
                        },
                    ..
                } => {
                    control_flow.set_exit();
                }
                _ => (),
            },
            Event::RedrawEventsCleared => {
                if let ContextType::Current {
                    context: gl_context,
                    window,
                    surface: gl_surface,
                } = &setup.context
                {
                    let (renderer, scene) = state.as_mut().unwrap();

                    if let Err(err) = renderer.draw(scene.clear_color, &scene.commands) {
                        tracing::error!("draw failed: {err}");
                    }

                    window.request_redraw();

                    gl_surface.swap_buffers(gl_context).unwrap();
                    next_render += Duration::from_millis(17);
                }
            }
            _ => (),
        }
    })
}

#[cfg(not(target_vendor = "apple"))]
fn debug_message_callback(source: u32, ty: u32, id: u32, severity: u32, message: &str) {
    let source = match source {
        glow::DEBUG_SOURCE_API => "API",
        glow::DEBUG_SOURCE_WINDOW_SYSTEM => "Window System",
        glow::DEBUG_SOURCE_SHADER_COMPILER => "Shader Compiler",
        glow::DEBUG_SOURCE_THIRD_PARTY => "Third Party",
        glow::DEBUG_SOURCE_APPLICATION => "Application",
        glow::DEBUG_SOURCE_OTHER => "Other",
        _ => "Unknown",
    };

    let ty = match ty {
        glow::DEBUG_TYPE_ERROR => "Error",
        glow::DEBUG_TYPE_DEPRECATED_BEHAVIOR => "Deprecated Behavior",
        glow::DEBUG_TYPE_UNDEFINED_BEHAVIOR => "Undefined Behavior",
        glow::DEBUG_TYPE_PORTABILITY => "Portability",
        glow::DEBUG_TYPE_PERFORMANCE => "Performance",
        glow::DEBUG_TYPE_MARKER => "Marker",
        glow::DEBUG_TYPE_OTHER => "Other",
        _ => "Unknown",
    };

    match severity {
        glow::DEBUG_SEVERITY_HIGH => {
            tracing::error!("{ty}-{id} ({source}): {message}");
        }
        glow::DEBUG_SEVERITY_MEDIUM => {
            tracing::warn!("{ty}-{id} ({source}): {message}");
        }
        glow::DEBUG_SEVERITY_LOW => {
            tracing::info!("{ty}-{id} ({source}): {message}");
        }
        glow::DEBUG_SEVERITY_NOTIFICATION => {
            tracing::debug!("{ty}-{id} ({source}): {message}");
        }
        _ => (),
    };
}
