use std::sync::Arc;

use asset::{ObjModel, VertexFormatKind};
use corelib::camera::Camera;
use corelib::transform::Transform;
use corelib::{CoreResult, Vec3};

use super::{DrawableSize, MeshPass, MeshPassDesc, RenderTargets, Scene};
use crate::gpu::GpuContext;
use crate::uniforms::SharedData;

const CAMERA_DISTANCE: f32 = 5.0;

/// Diffuse lighting from one directional light; normals are generated at
/// load time when the model has none.
pub struct LightingScene {
    model: ObjModel,
    pass: Option<MeshPass>,
    uniforms: SharedData,
    /// World-space direction towards the light, as azimuth/elevation degrees.
    light_azimuth: f32,
    light_elevation: f32,
    spin_speed: f32,
}

impl LightingScene {
    pub fn new(model: ObjModel) -> Self {
        Self {
            model,
            pass: None,
            uniforms: SharedData::default(),
            light_azimuth: 30.0,
            light_elevation: 45.0,
            spin_speed: 0.6,
        }
    }

    pub fn uniforms(&self) -> &SharedData {
        &self.uniforms
    }

    pub fn light_direction(&self) -> Vec3 {
        let azimuth = self.light_azimuth.to_radians();
        let elevation = self.light_elevation.to_radians();
        Vec3::new(
            elevation.cos() * azimuth.sin(),
            elevation.sin(),
            elevation.cos() * azimuth.cos(),
        )
    }

    fn compute(&self, frame_index: u64, elapsed_time: f32, size: DrawableSize) -> SharedData {
        let camera = Camera::looking_at_origin(CAMERA_DISTANCE, size.aspect());
        let spin = Vec3::new(0.4, 1.0, 0.0) * self.spin_speed;
        let model = Transform::spinning(Vec3::ZERO, spin, elapsed_time).matrix();
        SharedData::compute(
            model,
            &camera,
            self.light_direction(),
            frame_index,
            elapsed_time,
        )
    }
}

impl Scene for LightingScene {
    fn title(&self) -> &str {
        "Lighting"
    }

    fn prepare(
        &mut self,
        gpu: &Arc<GpuContext>,
        targets: &RenderTargets,
        in_flight_buffers_count: usize,
    ) -> CoreResult<()> {
        self.pass = Some(MeshPass::new(
            gpu,
            targets,
            in_flight_buffers_count,
            &self.model,
            MeshPassDesc {
                label: "Lighting",
                shader: include_str!("../shaders/lighting.wgsl"),
                vertex_format: VertexFormatKind::PositionNormal,
                extra_layouts: &[],
            },
        )?);
        Ok(())
    }

    fn update(&mut self, frame_index: u64, elapsed_time: f32, size: DrawableSize) {
        self.uniforms = self.compute(frame_index, elapsed_time, size);
        if let Some(pass) = &self.pass {
            pass.write_uniforms(frame_index, &self.uniforms);
        }
    }

    fn render(&self, _gpu: &GpuContext, pass: &mut wgpu::RenderPass<'_>, frame_index: u64) {
        if let Some(mesh_pass) = &self.pass {
            mesh_pass.draw(pass, frame_index, &[]);
        }
    }

    fn render_debug_overlay(&mut self, ctx: &egui::Context, _size: DrawableSize) {
        egui::Window::new("Light")
            .default_pos([12.0, 96.0])
            .resizable(false)
            .show(ctx, |ui| {
                ui.add(
                    egui::Slider::new(&mut self.light_azimuth, -180.0..=180.0).text("azimuth"),
                );
                ui.add(
                    egui::Slider::new(&mut self.light_elevation, -90.0..=90.0).text("elevation"),
                );
                ui.add(egui::Slider::new(&mut self.spin_speed, 0.0..=3.0).text("spin"));
            });
    }
}

#[cfg(test)]
mod tests {
    use corelib::Mat4;

    use super::*;
    use crate::scene::SceneKind;

    fn scene() -> LightingScene {
        LightingScene::new(SceneKind::Lighting.load_model(None).unwrap())
    }

    #[test]
    fn light_direction_is_unit_length() {
        let mut scene = scene();
        for (azimuth, elevation) in [(0.0, 0.0), (30.0, 45.0), (-170.0, -80.0)] {
            scene.light_azimuth = azimuth;
            scene.light_elevation = elevation;
            assert!((scene.light_direction().length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn uniforms_carry_view_space_light_and_normal_matrix() {
        let mut scene = scene();
        scene.update(2, 1.5, DrawableSize::new(1280, 720));
        let data = *scene.uniforms();

        let light = Vec3::from_slice(&data.light_direction[..3]);
        assert!((light.length() - 1.0).abs() < 1e-5);
        assert_eq!(data.light_direction[3], 0.0);

        let normal = Mat4::from_cols_array_2d(&data.normal_matrix);
        assert!(normal.determinant().abs() > 1e-6);
        assert!(data.normal_matrix.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn overlay_runs_without_gpu() {
        let mut scene = scene();
        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            scene.render_debug_overlay(ctx, DrawableSize::new(800, 600));
        });
    }
}
