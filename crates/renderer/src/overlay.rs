//! Debug overlay drawn with egui on top of the scene.
//!
//! Device objects (the egui-wgpu renderer and its pipeline) and the font
//! texture are created and destroyed through paired calls. Every destroy
//! call is safe when the matching create never ran, so shutdown works after
//! a partial initialisation.

use std::collections::HashSet;

use egui_wgpu::ScreenDescriptor;

use crate::gpu::GpuContext;
use crate::scene::{DrawableSize, Scene};

/// Figures shown in the stats window.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayStats {
    pub title: String,
    pub fps: f32,
    pub frame_index: u64,
    pub in_flight_buffers_count: usize,
}

pub struct DebugOverlay {
    ctx: egui::Context,
    color_format: Option<wgpu::TextureFormat>,
    renderer: Option<egui_wgpu::Renderer>,
    /// Textures currently uploaded to `renderer` (font atlas included).
    textures: HashSet<egui::TextureId>,
    /// Set once the font texture was destroyed; the next frame starts a fresh
    /// context so egui uploads the atlas again.
    fonts_lost: bool,
    paint_jobs: Vec<egui::ClippedPrimitive>,
    textures_delta: egui::TexturesDelta,
    pixels_per_point: f32,
}

impl Default for DebugOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugOverlay {
    pub fn new() -> Self {
        Self {
            ctx: egui::Context::default(),
            color_format: None,
            renderer: None,
            textures: HashSet::new(),
            fonts_lost: false,
            paint_jobs: Vec::new(),
            textures_delta: egui::TexturesDelta::default(),
            pixels_per_point: 1.0,
        }
    }

    pub fn context(&self) -> &egui::Context {
        &self.ctx
    }

    pub fn is_initialized(&self) -> bool {
        self.renderer.is_some()
    }

    /// Bind to a device and target format. Calling it again is a no-op.
    pub fn init(&mut self, device: &wgpu::Device, color_format: wgpu::TextureFormat) {
        self.color_format = Some(color_format);
        self.create_device_objects(device);
    }

    /// Returns false when `init` was never called.
    pub fn create_device_objects(&mut self, device: &wgpu::Device) -> bool {
        let Some(color_format) = self.color_format else {
            log::warn!("Overlay device objects requested before init");
            return false;
        };
        if self.renderer.is_none() {
            self.renderer = Some(egui_wgpu::Renderer::new(
                device,
                color_format,
                None,
                1,
                false,
            ));
            log::debug!("Overlay device objects created ({:?})", color_format);
        }
        true
    }

    pub fn destroy_fonts_texture(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            for id in self.textures.drain() {
                renderer.free_texture(&id);
            }
        }
        if !self.fonts_lost {
            self.fonts_lost = true;
            self.textures.clear();
            self.textures_delta = egui::TexturesDelta::default();
            self.paint_jobs.clear();
        }
    }

    pub fn destroy_device_objects(&mut self) {
        if self.renderer.take().is_some() {
            log::debug!("Overlay device objects destroyed");
        }
        // Textures lived inside the renderer.
        self.destroy_fonts_texture();
    }

    pub fn shutdown(&mut self) {
        self.destroy_device_objects();
        self.color_format = None;
    }

    /// Build this frame's UI: the stats window plus whatever the scene adds.
    pub fn run(
        &mut self,
        raw_input: egui::RawInput,
        scene: &mut dyn Scene,
        size: DrawableSize,
        stats: &OverlayStats,
    ) -> egui::PlatformOutput {
        if self.fonts_lost {
            let memory = self.ctx.memory(|m| m.clone());
            self.ctx = egui::Context::default();
            self.ctx.memory_mut(|m| *m = memory);
            self.fonts_lost = false;
        }

        let output = self.ctx.run(raw_input, |ctx| {
            stats_window(ctx, stats);
            scene.render_debug_overlay(ctx, size);
        });

        self.pixels_per_point = output.pixels_per_point;
        self.paint_jobs = self.ctx.tessellate(output.shapes, output.pixels_per_point);
        // A frame may be skipped between run and record; keep its uploads.
        self.textures_delta.append(output.textures_delta);
        output.platform_output
    }

    /// Draw the last built frame over `view`. Returns command buffers that
    /// must be submitted before `encoder`.
    pub fn record(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        size: DrawableSize,
    ) -> Vec<wgpu::CommandBuffer> {
        let Some(renderer) = self.renderer.as_mut() else {
            self.paint_jobs.clear();
            return Vec::new();
        };

        let screen = ScreenDescriptor {
            size_in_pixels: [size.width.max(1), size.height.max(1)],
            pixels_per_point: self.pixels_per_point,
        };

        let delta = std::mem::take(&mut self.textures_delta);
        for (id, image_delta) in &delta.set {
            renderer.update_texture(&gpu.device, &gpu.queue, *id, image_delta);
            self.textures.insert(*id);
        }

        let user_buffers =
            renderer.update_buffers(&gpu.device, &gpu.queue, encoder, &self.paint_jobs, &screen);

        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("OverlayPass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                })
                .forget_lifetime();
            renderer.render(&mut pass, &self.paint_jobs, &screen);
        }

        for id in &delta.free {
            renderer.free_texture(id);
            self.textures.remove(id);
        }
        self.paint_jobs.clear();
        user_buffers
    }
}

impl Drop for DebugOverlay {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn stats_window(ctx: &egui::Context, stats: &OverlayStats) {
    egui::Window::new("Stats")
        .default_pos([12.0, 12.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(&stats.title);
            ui.label(format!("{:.1} fps", stats.fps));
            ui.label(format!("frame {}", stats.frame_index));
            ui.label(format!("{} frame(s) in flight", stats.in_flight_buffers_count));
        });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use corelib::CoreResult;

    use super::*;
    use crate::scene::RenderTargets;

    #[derive(Default)]
    struct OverlayOnlyScene {
        overlay_calls: usize,
    }

    impl Scene for OverlayOnlyScene {
        fn title(&self) -> &str {
            "Overlay only"
        }

        fn prepare(
            &mut self,
            _gpu: &Arc<GpuContext>,
            _targets: &RenderTargets,
            _in_flight_buffers_count: usize,
        ) -> CoreResult<()> {
            Ok(())
        }

        fn update(&mut self, _frame_index: u64, _elapsed_time: f32, _size: DrawableSize) {}

        fn render(&self, _gpu: &GpuContext, _pass: &mut wgpu::RenderPass<'_>, _frame_index: u64) {}

        fn render_debug_overlay(&mut self, ctx: &egui::Context, _size: DrawableSize) {
            self.overlay_calls += 1;
            egui::Window::new("Scene").show(ctx, |ui| ui.label("hello"));
        }
    }

    #[test]
    fn shutdown_without_init_is_safe_and_repeatable() {
        let mut overlay = DebugOverlay::new();
        assert!(!overlay.is_initialized());
        overlay.destroy_fonts_texture();
        overlay.destroy_fonts_texture();
        overlay.destroy_device_objects();
        overlay.shutdown();
        overlay.shutdown();
        assert!(!overlay.is_initialized());
    }

    #[test]
    fn run_calls_scene_hook_and_queues_fonts() {
        let mut overlay = DebugOverlay::new();
        let mut scene = OverlayOnlyScene::default();
        let stats = OverlayStats {
            title: "Overlay only".into(),
            fps: 60.0,
            frame_index: 1,
            in_flight_buffers_count: 2,
        };

        overlay.run(
            egui::RawInput::default(),
            &mut scene,
            DrawableSize::new(640, 480),
            &stats,
        );
        assert!(scene.overlay_calls >= 1);
        assert!(!overlay.textures_delta.set.is_empty());
    }

    #[test]
    fn lost_fonts_are_uploaded_again() {
        let mut overlay = DebugOverlay::new();
        let mut scene = OverlayOnlyScene::default();
        let size = DrawableSize::new(320, 240);
        let stats = OverlayStats::default();

        overlay.run(egui::RawInput::default(), &mut scene, size, &stats);
        let first_calls = scene.overlay_calls;
        overlay.destroy_fonts_texture();
        assert!(overlay.textures_delta.set.is_empty());

        overlay.run(egui::RawInput::default(), &mut scene, size, &stats);
        assert!(!overlay.textures_delta.set.is_empty());
        assert!(scene.overlay_calls > first_calls);
    }
}
