//! GPU meshes built from OBJ groups.

use asset::{ObjGroup, VertexFormat, VertexFormatKind};
use corelib::{CoreError, CoreResult};

use crate::gpu::{BufferKind, GpuDevice};

/// Owns one vertex buffer and one index buffer (u32 indices).
pub trait Mesh {
    type Buffer;

    fn vertex_buffer(&self) -> &Self::Buffer;
    fn index_buffer(&self) -> &Self::Buffer;
    fn index_count(&self) -> u32;
}

/// Mesh uploaded from one [`ObjGroup`] through a [`VertexFormat`].
///
/// Empty groups (no vertices or no triangles) are rejected with a
/// configuration error rather than producing a mesh that draws nothing.
#[derive(Debug)]
pub struct ObjMesh<B> {
    name: String,
    vertex_buffer: B,
    index_buffer: B,
    vertex_count: u32,
    index_count: u32,
    stride: usize,
}

impl<B> ObjMesh<B> {
    pub fn new<D>(group: &ObjGroup, device: &D, format: &mut dyn VertexFormat) -> CoreResult<Self>
    where
        D: GpuDevice<Buffer = B>,
    {
        if group.is_empty() || group.index_count() == 0 {
            return Err(CoreError::configuration(format!(
                "group '{}' has no triangles",
                group.name()
            )));
        }
        if format.vertex_count() != group.vertex_count() as usize {
            return Err(CoreError::configuration(format!(
                "vertex format sized for {} vertices, group '{}' has {}",
                format.vertex_count(),
                group.name(),
                group.vertex_count()
            )));
        }

        for layout in format.attributes() {
            let data = group.attribute_data(layout.kind).ok_or_else(|| {
                CoreError::configuration(format!(
                    "group '{}' has no {} data required by the vertex format",
                    group.name(),
                    layout.kind.name()
                ))
            })?;
            format.set_attribute_bytes(layout.kind, data)?;
        }
        let vertices = format.encode()?;

        let vertex_buffer = device.create_buffer_init(
            &format!("{} VB", group.name()),
            BufferKind::Vertex,
            &vertices,
        )?;
        let index_buffer = device.create_buffer_init(
            &format!("{} IB", group.name()),
            BufferKind::Index,
            group.index_data(),
        )?;

        log::debug!(
            "Uploaded mesh '{}': {} vertices ({} B stride), {} indices",
            group.name(),
            group.vertex_count(),
            format.stride(),
            group.index_count()
        );

        Ok(Self {
            name: group.name().to_string(),
            vertex_buffer,
            index_buffer,
            vertex_count: group.vertex_count(),
            index_count: group.index_count(),
            stride: format.stride(),
        })
    }

    /// Build with a freshly created format of the given kind.
    pub fn with_format_kind<D>(
        group: &ObjGroup,
        device: &D,
        kind: VertexFormatKind,
    ) -> CoreResult<Self>
    where
        D: GpuDevice<Buffer = B>,
    {
        let mut format = kind.create(group.vertex_count() as usize);
        Self::new(group, device, format.as_mut())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl<B> Mesh for ObjMesh<B> {
    type Buffer = B;

    fn vertex_buffer(&self) -> &B {
        &self.vertex_buffer
    }

    fn index_buffer(&self) -> &B {
        &self.index_buffer
    }

    fn index_count(&self) -> u32 {
        self.index_count
    }
}

impl ObjMesh<wgpu::Buffer> {
    /// Bind both buffers at slot 0 and issue one indexed draw.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use asset::vertex_format::{PositionNormalVertex, PositionNormalVertexFormat};
    use asset::ObjModel;

    use super::*;
    use crate::gpu::mock::MockDevice;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn triangle(generate_normals: bool) -> ObjGroup {
        ObjModel::parse_str(TRIANGLE, generate_normals)
            .unwrap()
            .into_groups()
            .remove(0)
    }

    #[test]
    fn uploads_encoded_vertices_and_verbatim_indices() {
        let group = triangle(true);
        let device = MockDevice::default();
        let mesh = ObjMesh::with_format_kind(&group, &device, VertexFormatKind::PositionNormal)
            .expect("build mesh");

        assert_eq!(mesh.index_count(), 3);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.stride(), 32);
        assert_eq!(mesh.index_buffer().contents, group.index_data());
        assert_eq!(mesh.index_buffer().kind, BufferKind::Index);
        assert_eq!(mesh.vertex_buffer().kind, BufferKind::Vertex);

        let records: Vec<PositionNormalVertex> =
            bytemuck::pod_collect_to_vec(&mesh.vertex_buffer().contents);
        assert_eq!(records[1].position, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(records[1].normal, [0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn missing_attribute_is_configuration_error() {
        let group = triangle(false);
        let device = MockDevice::default();
        let err = ObjMesh::with_format_kind(&group, &device, VertexFormatKind::PositionNormal)
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration(ref m) if m.contains("normal")));
        assert_eq!(device.allocated(), 0);
    }

    #[test]
    fn empty_group_is_rejected() {
        let group = ObjGroup::new("nothing");
        let device = MockDevice::default();
        let err = ObjMesh::with_format_kind(&group, &device, VertexFormatKind::PositionColor)
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn format_size_must_match_group() {
        let group = triangle(true);
        let device = MockDevice::default();
        let mut format = PositionNormalVertexFormat::new(4);
        let err = ObjMesh::new(&group, &device, &mut format).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn allocation_failure_propagates() {
        let group = triangle(true);
        let device = MockDevice::failing();
        let err = ObjMesh::with_format_kind(&group, &device, VertexFormatKind::PositionNormal)
            .unwrap_err();
        assert!(matches!(err, CoreError::ResourceAllocation(_)));
    }
}
