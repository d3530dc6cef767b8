//! Window renderer: wgpu surface + depth buffer, frame pacing and the scene
//! lifecycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use corelib::{CoreError, CoreResult};
use winit::{dpi::PhysicalSize, window::Window};

use crate::frames::{FrameToken, InFlightFrames};
use crate::gpu::GpuContext;
use crate::overlay::{DebugOverlay, OverlayStats};
use crate::scene::{DrawableSize, RenderTargets, Scene};

/// Upper bound for `in_flight_buffers_count`.
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.05,
    b: 0.08,
    a: 1.0,
};
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct RendererOptions {
    pub backends: wgpu::Backends,
    /// Frames the CPU may record ahead of the GPU (1..=3).
    pub in_flight_buffers_count: usize,
    pub overlay: bool,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            in_flight_buffers_count: 2,
            overlay: false,
        }
    }
}

/// Frames-per-second over a one second window.
#[derive(Debug)]
pub struct FrameStats {
    window_start: Instant,
    frames: u32,
    fps: f32,
}

impl FrameStats {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count a frame; returns the new rate whenever a window closes.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.duration_since(self.window_start);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        self.fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        Some(self.fps)
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

pub struct Renderer {
    // Surface
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,

    gpu: Arc<GpuContext>,
    scene: Box<dyn Scene>,
    overlay: Option<DebugOverlay>,

    // Frame pacing
    frames: Arc<InFlightFrames>,
    submissions: Vec<Option<wgpu::SubmissionIndex>>,
    frame_index: u64,
    start: Instant,
    stats: FrameStats,
}

impl Renderer {
    /// Create the device for `window` and prepare `scene` against it.
    pub async fn new(
        window: Arc<Window>,
        options: &RendererOptions,
        mut scene: Box<dyn Scene>,
    ) -> CoreResult<Self> {
        let in_flight = options.in_flight_buffers_count;
        if !(1..=MAX_FRAMES_IN_FLIGHT).contains(&in_flight) {
            return Err(CoreError::configuration(format!(
                "in-flight buffer count must be within 1..={}, got {}",
                MAX_FRAMES_IN_FLIGHT, in_flight
            )));
        }

        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .map_err(|e| CoreError::configuration(format!("create_surface failed: {}", e)))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| CoreError::configuration("no suitable GPU adapter"))?;
        let info = adapter.get_info();
        log::info!("Adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("ObjView Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| CoreError::ResourceAllocation(format!("request_device failed: {}", e)))?;

        // Prefer an sRGB surface format.
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| CoreError::configuration("surface reports no formats"))?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: in_flight as u32,
        };
        surface.configure(&device, &surface_config);
        let depth_view = create_depth_view(&device, &surface_config);

        let gpu = Arc::new(GpuContext::new(device, queue));
        let targets = RenderTargets {
            color_format: surface_format,
            depth_format: DEPTH_FORMAT,
        };
        scene.prepare(&gpu, &targets, in_flight)?;
        log::info!(
            "Scene '{}' prepared: {} frame(s) in flight, surface {:?} {}x{}",
            scene.title(),
            in_flight,
            surface_format,
            width,
            height
        );

        let overlay = options.overlay.then(|| {
            let mut overlay = DebugOverlay::new();
            overlay.init(&gpu.device, surface_format);
            overlay
        });

        let now = Instant::now();
        Ok(Self {
            surface,
            surface_config,
            depth_view,
            gpu,
            scene,
            overlay,
            frames: InFlightFrames::new(in_flight)?,
            submissions: (0..in_flight).map(|_| None).collect(),
            frame_index: 0,
            start: now,
            stats: FrameStats::new(now),
        })
    }

    pub fn title(&self) -> &str {
        self.scene.title()
    }

    pub fn in_flight_buffers_count(&self) -> usize {
        self.frames.count()
    }

    pub fn fps(&self) -> f32 {
        self.stats.fps()
    }

    pub fn overlay_context(&self) -> Option<&egui::Context> {
        self.overlay.as_ref().map(DebugOverlay::context)
    }

    pub fn drawable_size(&self) -> DrawableSize {
        DrawableSize::new(self.surface_config.width, self.surface_config.height)
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface_config.width = width.max(1);
        self.surface_config.height = height.max(1);
        self.surface.configure(&self.gpu.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.gpu.device, &self.surface_config);
    }

    /// Wait until the uniform slot of `frame_index` is no longer read by the GPU.
    fn acquire_frame(&mut self, frame_index: u64) -> FrameToken {
        let _ = self.gpu.device.poll(wgpu::Maintain::Poll);
        let slot = self.frames.slot_index(frame_index);
        if !self.frames.is_slot_free(slot) {
            if let Some(submission) = self.submissions[slot].take() {
                let _ = self.gpu.device.poll(wgpu::Maintain::wait_for(submission));
            }
        }
        self.frames.begin_frame(frame_index)
    }

    /// Render one frame: update the scene, draw it (and the overlay when
    /// `overlay_input` is given), submit and present.
    ///
    /// On error nothing is submitted and the frame index is not consumed.
    pub fn render(
        &mut self,
        overlay_input: Option<egui::RawInput>,
    ) -> Result<Option<egui::PlatformOutput>, wgpu::SurfaceError> {
        let frame_index = self.frame_index;
        let size = self.drawable_size();
        let token = self.acquire_frame(frame_index);

        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let elapsed = self.start.elapsed().as_secs_f32();
        self.scene.update(frame_index, elapsed, size);

        let platform_output = match (self.overlay.as_mut(), overlay_input) {
            (Some(overlay), Some(input)) => {
                let stats = OverlayStats {
                    title: self.scene.title().to_string(),
                    fps: self.stats.fps(),
                    frame_index,
                    in_flight_buffers_count: self.frames.count(),
                };
                Some(overlay.run(input, self.scene.as_mut(), size, &stats))
            }
            _ => None,
        };

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.scene.render(&self.gpu, &mut pass, frame_index);
        }

        let mut command_buffers = match self.overlay.as_mut() {
            Some(overlay) if platform_output.is_some() => {
                overlay.record(&self.gpu, &mut encoder, &view, size)
            }
            _ => Vec::new(),
        };
        command_buffers.push(encoder.finish());

        let submission = self.gpu.queue.submit(command_buffers);
        let frames = Arc::clone(&self.frames);
        self.gpu
            .queue
            .on_submitted_work_done(move || frames.complete(frame_index));
        token.submit();
        let slot = self.frames.slot_index(frame_index);
        self.submissions[slot] = Some(submission);

        frame.present();

        self.frame_index += 1;
        if let Some(fps) = self.stats.tick(Instant::now()) {
            log::debug!("{}: {:.1} fps", self.scene.title(), fps);
        }
        Ok(platform_output)
    }

    pub fn is_surface_lost(err: &wgpu::SurfaceError) -> bool {
        matches!(err, wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.surface_config.width, self.surface_config.height);
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Scene buffers must outlive the GPU work that reads them.
        let _ = self.gpu.device.poll(wgpu::Maintain::Wait);
        if !self.frames.wait_idle_timeout(DRAIN_TIMEOUT) {
            log::warn!("GPU did not finish in-flight frames within {:?}", DRAIN_TIMEOUT);
        }
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.shutdown();
        }
        log::info!("Renderer dropped after {} frame(s)", self.frame_index);
    }
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &wgpu::Device, sc: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let tex = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("DepthTex"),
        size: wgpu::Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_reported_once_per_second() {
        let start = Instant::now();
        let mut stats = FrameStats::new(start);
        for i in 1..60 {
            assert_eq!(stats.tick(start + Duration::from_millis(i * 10)), None);
        }
        let fps = stats.tick(start + Duration::from_secs(1)).unwrap();
        assert!((fps - 60.0).abs() < 1e-3);
        assert_eq!(stats.fps(), fps);
        assert_eq!(stats.tick(start + Duration::from_millis(1010)), None);
    }

    #[test]
    fn surface_loss_is_recoverable() {
        assert!(Renderer::is_surface_lost(&wgpu::SurfaceError::Lost));
        assert!(Renderer::is_surface_lost(&wgpu::SurfaceError::Outdated));
        assert!(!Renderer::is_surface_lost(&wgpu::SurfaceError::Timeout));
    }

    #[test]
    fn default_options_double_buffer() {
        let options = RendererOptions::default();
        assert_eq!(options.in_flight_buffers_count, 2);
        assert!(!options.overlay);
    }
}
