//! GPU device capability used by meshes, uniform rings and scenes.

use corelib::{CoreError, CoreResult};
use wgpu::util::DeviceExt;

use asset::texture::TextureData;

/// What a buffer is bound as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
}

impl BufferKind {
    pub fn usages(self) -> wgpu::BufferUsages {
        match self {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
            BufferKind::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        }
    }
}

/// Allocates GPU buffers and writes into them.
///
/// Vertex and index buffers are created once from their contents and never
/// written again; uniform buffers are created empty and written per frame.
pub trait GpuDevice {
    type Buffer;

    fn create_buffer_init(
        &self,
        label: &str,
        kind: BufferKind,
        contents: &[u8],
    ) -> CoreResult<Self::Buffer>;

    fn create_buffer(&self, label: &str, kind: BufferKind, size: u64) -> CoreResult<Self::Buffer>;

    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]);
}

/// wgpu device + queue pair.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    /// Run `create` inside an out-of-memory error scope.
    fn allocation_scope<T>(
        &self,
        what: &str,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> CoreResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let value = create(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(CoreError::ResourceAllocation(format!("{}: {}", what, err))),
            None => Ok(value),
        }
    }

    /// Upload an RGBA8 texture (single mip, sRGB).
    pub fn create_texture_with_data(
        &self,
        label: &str,
        texture: &TextureData,
    ) -> CoreResult<wgpu::Texture> {
        let size = wgpu::Extent3d {
            width: texture.width,
            height: texture.height,
            depth_or_array_layers: 1,
        };
        let gpu_texture = self.allocation_scope(label, |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        })?;

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &gpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &texture.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(texture.bytes_per_row()),
                rows_per_image: Some(texture.height),
            },
            size,
        );
        Ok(gpu_texture)
    }
}

impl GpuDevice for GpuContext {
    type Buffer = wgpu::Buffer;

    fn create_buffer_init(
        &self,
        label: &str,
        kind: BufferKind,
        contents: &[u8],
    ) -> CoreResult<wgpu::Buffer> {
        self.allocation_scope(label, |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: kind.usages(),
            })
        })
    }

    fn create_buffer(&self, label: &str, kind: BufferKind, size: u64) -> CoreResult<wgpu::Buffer> {
        self.allocation_scope(label, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: kind.usages(),
                mapped_at_creation: false,
            })
        })
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }
}

/// Recording device for tests that never touch a real GPU.
#[cfg(test)]
pub(crate) mod mock {
    use std::cell::{Cell, RefCell};

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) struct MockBuffer {
        pub id: usize,
        pub label: String,
        pub kind: BufferKind,
        pub contents: Vec<u8>,
    }

    #[derive(Default)]
    pub(crate) struct MockDevice {
        pub fail_allocations: bool,
        next_id: Cell<usize>,
        pub writes: RefCell<Vec<(usize, u64, Vec<u8>)>>,
    }

    impl MockDevice {
        pub fn failing() -> Self {
            Self {
                fail_allocations: true,
                ..Self::default()
            }
        }

        pub fn allocated(&self) -> usize {
            self.next_id.get()
        }

        fn alloc(
            &self,
            label: &str,
            kind: BufferKind,
            contents: Vec<u8>,
        ) -> CoreResult<MockBuffer> {
            if self.fail_allocations {
                return Err(CoreError::ResourceAllocation(format!(
                    "{}: out of memory",
                    label
                )));
            }
            let id = self.next_id.get();
            self.next_id.set(id + 1);
            Ok(MockBuffer {
                id,
                label: label.to_string(),
                kind,
                contents,
            })
        }
    }

    impl GpuDevice for MockDevice {
        type Buffer = MockBuffer;

        fn create_buffer_init(
            &self,
            label: &str,
            kind: BufferKind,
            contents: &[u8],
        ) -> CoreResult<MockBuffer> {
            self.alloc(label, kind, contents.to_vec())
        }

        fn create_buffer(
            &self,
            label: &str,
            kind: BufferKind,
            size: u64,
        ) -> CoreResult<MockBuffer> {
            self.alloc(label, kind, vec![0; size as usize])
        }

        fn write_buffer(&self, buffer: &MockBuffer, offset: u64, data: &[u8]) {
            self.writes
                .borrow_mut()
                .push((buffer.id, offset, data.to_vec()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_buffers_are_writable() {
        assert!(BufferKind::Uniform.usages().contains(wgpu::BufferUsages::COPY_DST));
        assert!(!BufferKind::Vertex.usages().contains(wgpu::BufferUsages::COPY_DST));
        assert_eq!(BufferKind::Index.usages(), wgpu::BufferUsages::INDEX);
    }
}
