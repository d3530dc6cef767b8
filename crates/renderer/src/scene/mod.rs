//! Scenes: self-contained demos driven by the [`Renderer`](crate::Renderer).
//!
//! A scene is prepared once against a device, then updated and rendered
//! every frame. Per-frame uniforms live in a [`UniformRing`] with one slot
//! per in-flight frame; frame `n` always writes and binds slot
//! `n % in_flight_buffers_count`.

mod colored;
mod lighting;
mod texturing;

pub use colored::ColoredScene;
pub use lighting::LightingScene;
pub use texturing::TexturingScene;

use std::{fmt, num::NonZeroU64, path::Path, str::FromStr, sync::Arc};

use asset::{AttributeKind, ObjModel, VertexFormatKind};
use corelib::{CoreError, CoreResult};

use crate::gpu::GpuContext;
use crate::mesh::ObjMesh;
use crate::uniforms::{SharedData, UniformRing};

/// Size of the surface being drawn into, in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawableSize {
    pub width: u32,
    pub height: u32,
}

impl DrawableSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// Attachment formats scene pipelines must be compatible with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTargets {
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
}

/// Lifecycle driven by the renderer: `prepare` once, then `update` and
/// `render` for every frame, in that order.
pub trait Scene {
    fn title(&self) -> &str;

    /// Build meshes, pipelines and `in_flight_buffers_count` uniform slots.
    fn prepare(
        &mut self,
        gpu: &Arc<GpuContext>,
        targets: &RenderTargets,
        in_flight_buffers_count: usize,
    ) -> CoreResult<()>;

    /// Recompute per-frame data and write it to the frame's uniform slot.
    fn update(&mut self, frame_index: u64, elapsed_time: f32, size: DrawableSize);

    /// Record draws for `frame_index` into a pass that is already begun.
    /// Only reads state; the slot for this frame was filled by `update`.
    fn render(&self, gpu: &GpuContext, pass: &mut wgpu::RenderPass<'_>, frame_index: u64);

    /// Optional diagnostics drawn into the overlay.
    fn render_debug_overlay(&mut self, _ctx: &egui::Context, _size: DrawableSize) {}
}

/// Built-in scenes, selectable by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SceneKind {
    Colored,
    #[default]
    Lighting,
    Texturing,
}

const CUBE_OBJ: &str = include_str!("../../assets/cube.obj");
const COLORED_CUBE_OBJ: &str = include_str!("../../assets/colored_cube.obj");

impl SceneKind {
    pub const ALL: [SceneKind; 3] = [SceneKind::Colored, SceneKind::Lighting, SceneKind::Texturing];

    pub fn name(self) -> &'static str {
        match self {
            SceneKind::Colored => "colored",
            SceneKind::Lighting => "lighting",
            SceneKind::Texturing => "texturing",
        }
    }

    pub fn vertex_format(self) -> VertexFormatKind {
        match self {
            SceneKind::Colored => VertexFormatKind::PositionColor,
            SceneKind::Lighting => VertexFormatKind::PositionNormal,
            SceneKind::Texturing => VertexFormatKind::PositionTexcoord,
        }
    }

    pub fn wants_generated_normals(self) -> bool {
        self.vertex_format()
            .attributes()
            .iter()
            .any(|a| a.kind == AttributeKind::Normal)
    }

    /// Load `path`, or the built-in model for this scene when `None`.
    pub fn load_model(self, path: Option<&Path>) -> CoreResult<ObjModel> {
        let generate_normals = self.wants_generated_normals();
        match path {
            Some(path) => ObjModel::load(path, generate_normals),
            None => {
                let source = match self {
                    SceneKind::Colored => COLORED_CUBE_OBJ,
                    SceneKind::Lighting | SceneKind::Texturing => CUBE_OBJ,
                };
                ObjModel::parse_str(source, generate_normals)
            }
        }
    }

    pub fn create(self, model: ObjModel) -> Box<dyn Scene> {
        match self {
            SceneKind::Colored => Box::new(ColoredScene::new(model)),
            SceneKind::Lighting => Box::new(LightingScene::new(model)),
            SceneKind::Texturing => Box::new(TexturingScene::new(model)),
        }
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SceneKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        SceneKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| CoreError::configuration(format!("unknown scene '{}'", s)))
    }
}

static POSITION_COLOR_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];
static POSITION_NORMAL_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];
static POSITION_TEXCOORD_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x2];

/// wgpu layout of the records a [`VertexFormatKind`] encodes.
pub fn vertex_buffer_layout(kind: VertexFormatKind) -> wgpu::VertexBufferLayout<'static> {
    let attributes: &'static [wgpu::VertexAttribute] = match kind {
        VertexFormatKind::PositionColor => &POSITION_COLOR_ATTRIBUTES,
        VertexFormatKind::PositionNormal => &POSITION_NORMAL_ATTRIBUTES,
        VertexFormatKind::PositionTexcoord => &POSITION_TEXCOORD_ATTRIBUTES,
    };
    wgpu::VertexBufferLayout {
        array_stride: kind.stride() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

/// Upload every non-empty group of `model`.
fn build_meshes(
    gpu: &GpuContext,
    model: &ObjModel,
    kind: VertexFormatKind,
) -> CoreResult<Vec<ObjMesh<wgpu::Buffer>>> {
    let mut meshes = Vec::with_capacity(model.len());
    for group in model.groups() {
        if group.is_empty() || group.index_count() == 0 {
            log::warn!("Skipping empty group '{}'", group.name());
            continue;
        }
        meshes.push(ObjMesh::with_format_kind(group, gpu, kind)?);
    }
    if meshes.is_empty() {
        return Err(CoreError::configuration("model has no drawable groups"));
    }
    Ok(meshes)
}

/// Uniform ring plus one bind group per slot, all at group 0 binding 0.
struct UniformBindings {
    layout: wgpu::BindGroupLayout,
    ring: UniformRing<wgpu::Buffer>,
    bind_groups: Vec<wgpu::BindGroup>,
}

impl UniformBindings {
    fn new(gpu: &GpuContext, label: &str, in_flight_buffers_count: usize) -> CoreResult<Self> {
        let layout = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{} uniforms BGL", label)),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(SharedData::SIZE),
                    },
                    count: None,
                }],
            });
        let ring = UniformRing::new(
            gpu,
            &format!("{} uniforms", label),
            SharedData::SIZE,
            in_flight_buffers_count,
        )?;
        let bind_groups = ring
            .slots()
            .iter()
            .enumerate()
            .map(|(i, buffer)| {
                gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("{} uniforms BG #{}", label, i)),
                    layout: &layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            })
            .collect();
        Ok(Self {
            layout,
            ring,
            bind_groups,
        })
    }

    fn bind_group(&self, frame_index: u64) -> &wgpu::BindGroup {
        &self.bind_groups[self.ring.slot_index(frame_index)]
    }
}

/// What a [`MeshPass`] draws and with which shader.
struct MeshPassDesc<'a> {
    label: &'a str,
    shader: &'a str,
    vertex_format: VertexFormatKind,
    /// Layouts for bind groups 1.., after the uniforms at group 0.
    extra_layouts: &'a [&'a wgpu::BindGroupLayout],
}

/// GPU state shared by the built-in scenes: one pipeline drawing every mesh
/// of a model with per-frame uniforms.
struct MeshPass {
    gpu: Arc<GpuContext>,
    pipeline: wgpu::RenderPipeline,
    meshes: Vec<ObjMesh<wgpu::Buffer>>,
    uniforms: UniformBindings,
}

impl MeshPass {
    fn new(
        gpu: &Arc<GpuContext>,
        targets: &RenderTargets,
        in_flight_buffers_count: usize,
        model: &ObjModel,
        desc: MeshPassDesc<'_>,
    ) -> CoreResult<Self> {
        let meshes = build_meshes(gpu, model, desc.vertex_format)?;
        let uniforms = UniformBindings::new(gpu, desc.label, in_flight_buffers_count)?;

        let device = &gpu.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.shader.into()),
        });

        let mut bind_group_layouts = vec![&uniforms.layout];
        bind_group_layouts.extend_from_slice(desc.extra_layouts);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} PipelineLayout", desc.label)),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} Pipeline", desc.label)),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[vertex_buffer_layout(desc.vertex_format)],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: targets.color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: targets.depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        log::info!(
            "Prepared {}: {} mesh(es), {} uniform slot(s)",
            desc.label,
            meshes.len(),
            uniforms.ring.len()
        );

        Ok(Self {
            gpu: Arc::clone(gpu),
            pipeline,
            meshes,
            uniforms,
        })
    }

    fn write_uniforms(&self, frame_index: u64, data: &SharedData) {
        self.uniforms.ring.write(self.gpu.as_ref(), frame_index, data);
    }

    fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        frame_index: u64,
        extra_groups: &[&wgpu::BindGroup],
    ) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, self.uniforms.bind_group(frame_index), &[]);
        for (i, group) in extra_groups.iter().enumerate() {
            pass.set_bind_group(i as u32 + 1, *group, &[]);
        }
        for mesh in &self.meshes {
            mesh.draw(pass);
        }
    }
}

#[cfg(test)]
mod tests {
    use asset::vertex_format::AttributeLayout;

    use super::*;

    #[test]
    fn scene_kind_parses_names() {
        assert_eq!("colored".parse::<SceneKind>().unwrap(), SceneKind::Colored);
        assert_eq!(" Lighting ".parse::<SceneKind>().unwrap(), SceneKind::Lighting);
        assert_eq!("texturing".parse::<SceneKind>().unwrap(), SceneKind::Texturing);
        assert!(matches!(
            "wireframe".parse::<SceneKind>(),
            Err(CoreError::Configuration(_))
        ));
        assert_eq!(SceneKind::Texturing.to_string(), "texturing");
    }

    #[test]
    fn only_lighting_generates_normals() {
        assert!(SceneKind::Lighting.wants_generated_normals());
        assert!(!SceneKind::Colored.wants_generated_normals());
        assert!(!SceneKind::Texturing.wants_generated_normals());
    }

    #[test]
    fn built_in_models_feed_their_scene_format() {
        for kind in SceneKind::ALL {
            let model = kind.load_model(None).unwrap();
            assert_eq!(model.len(), 1, "{}", kind);
            let group = model.group_at_index(0).unwrap();
            assert_eq!(group.index_count(), 36, "{}", kind);
            for layout in kind.vertex_format().attributes() {
                assert!(
                    group.attribute_data(layout.kind).is_some(),
                    "{} lacks {}",
                    kind,
                    layout.kind.name()
                );
            }
        }
    }

    #[test]
    fn cube_normals_point_outwards() {
        let model = SceneKind::Lighting.load_model(None).unwrap();
        let group = model.group_at_index(0).unwrap();
        let normals = group.normals().unwrap();
        for (p, n) in group.positions().iter().zip(normals) {
            let dot = p[0] * n[0] + p[1] * n[1] + p[2] * n[2];
            assert!((dot - 1.0).abs() < 1e-5, "{:?} vs {:?}", p, n);
        }
    }

    #[test]
    fn wgpu_layouts_match_encoded_records() {
        for kind in SceneKind::ALL.map(SceneKind::vertex_format) {
            let layout = vertex_buffer_layout(kind);
            assert_eq!(layout.array_stride as usize, kind.stride());
            let records: &[AttributeLayout] = kind.attributes();
            assert_eq!(layout.attributes.len(), records.len());
            for (i, (gpu, record)) in layout.attributes.iter().zip(records).enumerate() {
                assert_eq!(gpu.shader_location, i as u32);
                assert_eq!(gpu.offset as usize, record.offset);
                assert_eq!(gpu.format.size() as usize, record.kind.element_size());
            }
        }
    }

    #[test]
    fn aspect_never_divides_by_zero() {
        assert_eq!(DrawableSize::new(800, 400).aspect(), 2.0);
        assert!(DrawableSize::new(0, 0).aspect().is_finite());
    }
}
