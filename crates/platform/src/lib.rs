//! Platform layer: window, event loop and the redraw loop driving the renderer.
//!
//! - Redraws continuously; vsync paces frames.
//! - Resize and surface loss reconfigure the surface, nothing else is rebuilt.
//! - Overlay input flows through egui-winit when the overlay is enabled.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use renderer::{Renderer, RendererOptions, SceneKind};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

const APP_NAME: &str = "ObjView";

/// Everything needed to open the window and build the scene.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub renderer: RendererOptions,
    pub scene: SceneKind,
    /// OBJ file to show; the scene's built-in model when `None`.
    pub model: Option<PathBuf>,
    pub show_fps: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            renderer: RendererOptions::default(),
            scene: SceneKind::default(),
            model: None,
            show_fps: false,
            width: 1280,
            height: 720,
        }
    }
}

fn window_title(scene_title: &str, fps: Option<f32>) -> String {
    match fps {
        Some(fps) => format!("{} - {} - {:.1} fps", APP_NAME, scene_title, fps),
        None => format!("{} - {}", APP_NAME, scene_title),
    }
}

/// New rate to show, if the renderer measured one since `shown`.
fn fps_update(shown: f32, current: f32) -> Option<f32> {
    (current > 0.0 && current != shown).then_some(current)
}

struct App {
    options: RunOptions,
    model: Option<asset::ObjModel>,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    egui_state: Option<egui_winit::State>,
    /// Rate last shown in the title; the renderer refreshes it once a second.
    shown_fps: f32,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(options: RunOptions, model: asset::ObjModel) -> Self {
        Self {
            options,
            model: Some(model),
            window: None,
            renderer: None,
            egui_state: None,
            shown_fps: 0.0,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{:#}", err);
        self.error = Some(err);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let model = self
            .model
            .take()
            .context("renderer was already initialised")?;
        let scene = self.options.scene.create(model);

        let window = event_loop
            .create_window(
                WindowAttributes::default()
                    .with_title(window_title(scene.title(), None))
                    .with_inner_size(PhysicalSize::new(self.options.width, self.options.height)),
            )
            .context("failed to create window")?;
        let window = Arc::new(window);
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let renderer = pollster::block_on(Renderer::new(
            Arc::clone(&window),
            &self.options.renderer,
            scene,
        ))
        .context("failed to initialise renderer")?;
        log::info!(
            "Renderer ready: '{}', {} frame(s) in flight",
            renderer.title(),
            renderer.in_flight_buffers_count()
        );

        self.egui_state = renderer.overlay_context().map(|ctx| {
            egui_winit::State::new(
                ctx.clone(),
                egui::ViewportId::ROOT,
                &*window,
                Some(window.scale_factor() as f32),
                None,
                None,
            )
        });

        window.request_redraw();
        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(renderer)) = (self.window.as_ref(), self.renderer.as_mut()) else {
            return;
        };

        let raw_input = self
            .egui_state
            .as_mut()
            .map(|state| state.take_egui_input(window));

        match renderer.render(raw_input) {
            Ok(platform_output) => {
                if let (Some(state), Some(output)) = (self.egui_state.as_mut(), platform_output) {
                    state.handle_platform_output(window, output);
                }
                if self.options.show_fps {
                    if let Some(fps) = fps_update(self.shown_fps, renderer.fps()) {
                        self.shown_fps = fps;
                        log::info!("FPS: {:.1}", fps);
                        window.set_title(&window_title(renderer.title(), Some(fps)));
                    }
                }
            }
            Err(err) if Renderer::is_surface_lost(&err) => {
                log::warn!("Surface lost/outdated; reconfiguring");
                renderer.recreate_surface();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory; exiting");
                event_loop.exit();
            }
            Err(err) => log::warn!("Frame skipped: {:?}", err),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() || self.error.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }
        if let Some(state) = self.egui_state.as_mut() {
            let _ = state.on_window_event(window, &event);
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                log::info!("Resized: {}x{}", new_size.width, new_size.height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                log::info!("Scale factor changed: {:.3}", scale_factor);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Drain the GPU before the window goes away.
        self.egui_state = None;
        self.renderer = None;
    }
}

/// Open a window showing `options.scene` and run until it is closed.
pub fn run_with_renderer(options: RunOptions) -> Result<()> {
    let model = options
        .scene
        .load_model(options.model.as_deref())
        .with_context(|| match &options.model {
            Some(path) => format!("failed to load model {}", path.display()),
            None => format!("failed to load built-in model for '{}'", options.scene),
        })?;
    log::info!(
        "Model ready: {} group(s) for scene '{}'",
        model.len(),
        options.scene
    );

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(options, model);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow::anyhow!("Event loop error: {e:?}"))?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_shows_scene_and_fps() {
        assert_eq!(window_title("Lighting", None), "ObjView - Lighting");
        assert_eq!(
            window_title("Colored", Some(59.94)),
            "ObjView - Colored - 59.9 fps"
        );
    }

    #[test]
    fn title_follows_renderer_fps() {
        assert_eq!(fps_update(0.0, 0.0), None);
        assert_eq!(fps_update(0.0, 60.0), Some(60.0));
        assert_eq!(fps_update(60.0, 60.0), None);
        assert_eq!(fps_update(60.0, 58.5), Some(58.5));
    }

    #[test]
    fn default_options_match_cli_defaults() {
        let options = RunOptions::default();
        assert_eq!((options.width, options.height), (1280, 720));
        assert_eq!(options.scene, SceneKind::Lighting);
        assert!(options.model.is_none());
        assert!(!options.show_fps);
    }
}
