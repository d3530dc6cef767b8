use std::sync::Arc;

use asset::{ObjModel, VertexFormatKind};
use corelib::camera::Camera;
use corelib::transform::Transform;
use corelib::{CoreResult, Vec3};

use super::{DrawableSize, MeshPass, MeshPassDesc, RenderTargets, Scene};
use crate::gpu::GpuContext;
use crate::uniforms::SharedData;

const SPIN: Vec3 = Vec3::new(0.5, 1.0, 0.0);
const CAMERA_DISTANCE: f32 = 5.0;

/// Spinning model with per-vertex colours, no lighting.
pub struct ColoredScene {
    model: ObjModel,
    pass: Option<MeshPass>,
    uniforms: SharedData,
}

impl ColoredScene {
    pub fn new(model: ObjModel) -> Self {
        Self {
            model,
            pass: None,
            uniforms: SharedData::default(),
        }
    }

    /// Uniforms computed by the last `update`.
    pub fn uniforms(&self) -> &SharedData {
        &self.uniforms
    }

    fn compute(frame_index: u64, elapsed_time: f32, size: DrawableSize) -> SharedData {
        let camera = Camera::looking_at_origin(CAMERA_DISTANCE, size.aspect());
        let model = Transform::spinning(Vec3::ZERO, SPIN, elapsed_time).matrix();
        SharedData::compute(model, &camera, Vec3::Z, frame_index, elapsed_time)
    }
}

impl Scene for ColoredScene {
    fn title(&self) -> &str {
        "Colored"
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
                label: "Colored",
                shader: include_str!("../shaders/colored.wgsl"),
                vertex_format: VertexFormatKind::PositionColor,
                extra_layouts: &[],
            },
        )?);
        Ok(())
    }

    fn update(&mut self, frame_index: u64, elapsed_time: f32, size: DrawableSize) {
        self.uniforms = Self::compute(frame_index, elapsed_time, size);
        if let Some(pass) = &self.pass {
            pass.write_uniforms(frame_index, &self.uniforms);
        }
    }

    fn render(&self, _gpu: &GpuContext, pass: &mut wgpu::RenderPass<'_>, frame_index: u64) {
        if let Some(mesh_pass) = &self.pass {
            mesh_pass.draw(pass, frame_index, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneKind;

    #[test]
    fn update_without_gpu_only_computes() {
        let model = SceneKind::Colored.load_model(None).unwrap();
        let mut scene = ColoredScene::new(model);
        assert_eq!(scene.title(), "Colored");

        scene.update(4, 0.5, DrawableSize::new(640, 480));
        let data = scene.uniforms();
        assert_eq!(data.frame_index, 4);
        assert_eq!(data.time, 0.5);
        assert!(data.model_view_projection.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn model_spins_over_time() {
        let size = DrawableSize::new(100, 100);
        let a = ColoredScene::compute(0, 0.0, size);
        let b = ColoredScene::compute(1, 1.0, size);
        assert_ne!(a.model_view_projection, b.model_view_projection);
    }
}
