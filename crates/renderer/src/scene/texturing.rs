use std::sync::Arc;

use asset::texture::TextureData;
use asset::{ObjModel, VertexFormatKind};
use corelib::camera::Camera;
use corelib::transform::Transform;
use corelib::{CoreResult, Vec3};

use super::{DrawableSize, MeshPass, MeshPassDesc, RenderTargets, Scene};
use crate::gpu::GpuContext;
use crate::uniforms::SharedData;

const TEXTURE_SIZE: u32 = 256;
const TEXTURE_CELL: u32 = 32;
const CAMERA_DISTANCE: f32 = 5.0;
const SPIN: Vec3 = Vec3::new(0.3, 0.8, 0.0);

/// Material bound at group 1: checkerboard texture + sampler.
struct Material {
    bind_group: wgpu::BindGroup,
}

impl Material {
    fn layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texturing material BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    fn new(
        gpu: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        texture: &TextureData,
    ) -> CoreResult<Self> {
        let gpu_texture = gpu.create_texture_with_data("Checkerboard", texture)?;
        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Checkerboard sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Texturing material BG"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });
        Ok(Self { bind_group })
    }
}

/// Model textured with a procedural checkerboard.
pub struct TexturingScene {
    model: ObjModel,
    pass: Option<(MeshPass, Material)>,
    uniforms: SharedData,
}

impl TexturingScene {
    pub fn new(model: ObjModel) -> Self {
        Self {
            model,
            pass: None,
            uniforms: SharedData::default(),
        }
    }

    pub fn uniforms(&self) -> &SharedData {
        &self.uniforms
    }

    fn compute(frame_index: u64, elapsed_time: f32, size: DrawableSize) -> SharedData {
        let camera = Camera::looking_at_origin(CAMERA_DISTANCE, size.aspect());
        let model = Transform::spinning(Vec3::ZERO, SPIN, elapsed_time).matrix();
        SharedData::compute(model, &camera, Vec3::Z, frame_index, elapsed_time)
    }
}

impl Scene for TexturingScene {
    fn title(&self) -> &str {
        "Texturing"
    }

    fn prepare(
        &mut self,
        gpu: &Arc<GpuContext>,
        targets: &RenderTargets,
        in_flight_buffers_count: usize,
    ) -> CoreResult<()> {
        let texture = TextureData::checkerboard(
            TEXTURE_SIZE,
            TEXTURE_CELL,
            [235, 235, 235, 255],
            [40, 90, 160, 255],
        )?;
        let layout = Material::layout(&gpu.device);
        let material = Material::new(gpu, &layout, &texture)?;
        let mesh_pass = MeshPass::new(
            gpu,
            targets,
            in_flight_buffers_count,
            &self.model,
            MeshPassDesc {
                label: "Texturing",
                shader: include_str!("../shaders/texturing.wgsl"),
                vertex_format: VertexFormatKind::PositionTexcoord,
                extra_layouts: &[&layout],
            },
        )?;
        self.pass = Some((mesh_pass, material));
        Ok(())
    }

    fn update(&mut self, frame_index: u64, elapsed_time: f32, size: DrawableSize) {
        self.uniforms = Self::compute(frame_index, elapsed_time, size);
        if let Some((pass, _)) = &self.pass {
            pass.write_uniforms(frame_index, &self.uniforms);
        }
    }

    fn render(&self, _gpu: &GpuContext, pass: &mut wgpu::RenderPass<'_>, frame_index: u64) {
        if let Some((mesh_pass, material)) = &self.pass {
            mesh_pass.draw(pass, frame_index, &[&material.bind_group]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneKind;

    #[test]
    fn update_records_frame_and_time() {
        let mut scene = TexturingScene::new(SceneKind::Texturing.load_model(None).unwrap());
        scene.update(11, 3.0, DrawableSize::new(300, 200));
        assert_eq!(scene.uniforms().frame_index, 11);
        assert_eq!(scene.uniforms().time, 3.0);
        assert!(scene.uniforms().model_view_projection.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn aspect_changes_projection() {
        let wide = TexturingScene::compute(0, 0.0, DrawableSize::new(1600, 400));
        let square = TexturingScene::compute(0, 0.0, DrawableSize::new(400, 400));
        assert_ne!(wide.model_view_projection, square.model_view_projection);
        assert_eq!(wide.normal_matrix, square.normal_matrix);
    }
}
