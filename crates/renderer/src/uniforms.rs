//! Per-frame uniform data and the ring of uniform buffers it is written to.

use bytemuck::{Pod, Zeroable};
use corelib::camera::Camera;
use corelib::{CoreError, CoreResult};
use glam::{Mat4, Vec3};

use crate::gpu::{BufferKind, GpuDevice};

/// Uniform block shared by every scene shader (160 bytes, 16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SharedData {
    pub model_view_projection: [[f32; 4]; 4],
    /// Inverse-transpose of model-view; transforms normals into view space.
    pub normal_matrix: [[f32; 4]; 4],
    /// Direction towards the light, view space, w = 0.
    pub light_direction: [f32; 4],
    pub frame_index: u32,
    pub time: f32,
    pub _pad: [f32; 2],
}

impl SharedData {
    pub const SIZE: u64 = std::mem::size_of::<SharedData>() as u64;

    pub fn compute(
        model: Mat4,
        camera: &Camera,
        light_direction: Vec3,
        frame_index: u64,
        elapsed_time: f32,
    ) -> Self {
        let view = camera.view();
        let model_view = view * model;
        let normal_matrix = model_view.inverse().transpose();
        let light = view
            .transform_vector3(light_direction)
            .normalize_or_zero();

        Self {
            model_view_projection: (camera.proj() * model_view).to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            light_direction: light.extend(0.0).to_array(),
            frame_index: frame_index as u32,
            time: elapsed_time,
            _pad: [0.0; 2],
        }
    }
}

/// One uniform buffer per in-flight frame; frame `n` uses slot `n % len`.
pub struct UniformRing<B> {
    slots: Vec<B>,
    slot_size: u64,
}

impl<B> UniformRing<B> {
    pub fn new<D>(device: &D, label: &str, slot_size: u64, count: usize) -> CoreResult<Self>
    where
        D: GpuDevice<Buffer = B>,
    {
        if count == 0 {
            return Err(CoreError::configuration(
                "uniform ring needs at least one slot",
            ));
        }
        let slots = (0..count)
            .map(|i| {
                device.create_buffer(&format!("{} #{}", label, i), BufferKind::Uniform, slot_size)
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self { slots, slot_size })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_size(&self) -> u64 {
        self.slot_size
    }

    pub fn slot_index(&self, frame_index: u64) -> usize {
        (frame_index % self.slots.len() as u64) as usize
    }

    pub fn slot(&self, frame_index: u64) -> &B {
        &self.slots[self.slot_index(frame_index)]
    }

    pub fn slots(&self) -> &[B] {
        &self.slots
    }

    /// Write `value` into the slot for `frame_index`; returns the slot used.
    pub fn write<D, T>(&self, device: &D, frame_index: u64, value: &T) -> usize
    where
        D: GpuDevice<Buffer = B>,
        T: Pod,
    {
        let slot = self.slot_index(frame_index);
        device.write_buffer(&self.slots[slot], 0, bytemuck::bytes_of(value));
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::mock::MockDevice;

    #[test]
    fn shared_data_layout() {
        assert_eq!(SharedData::SIZE, 160);
        assert_eq!(SharedData::SIZE % 16, 0);
    }

    #[test]
    fn ring_writes_to_frame_slot() {
        let device = MockDevice::default();
        let ring = UniformRing::new(&device, "Uniforms", SharedData::SIZE, 3).unwrap();
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.slot(0).contents.len(), 160);

        let data = SharedData {
            frame_index: 7,
            ..SharedData::default()
        };
        assert_eq!(ring.write(&device, 7, &data), 1);
        assert_eq!(ring.write(&device, 9, &data), 0);

        let writes = device.writes.borrow();
        assert_eq!(writes[0].0, ring.slots()[1].id);
        assert_eq!(writes[1].0, ring.slots()[0].id);
        assert_eq!(writes[0].2, bytemuck::bytes_of(&data));
    }

    #[test]
    fn empty_ring_is_rejected() {
        let device = MockDevice::default();
        assert!(UniformRing::new(&device, "Uniforms", 16, 0).is_err());
    }

    #[test]
    fn normal_matrix_is_inverse_transpose_of_model_view() {
        let camera = Camera::looking_at_origin(4.0, 1.5);
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 0.5)) * Mat4::from_rotation_y(0.3);
        let data = SharedData::compute(model, &camera, Vec3::new(0.0, 1.0, 1.0), 3, 1.25);

        let model_view = camera.view() * model;
        let normal = Mat4::from_cols_array_2d(&data.normal_matrix);
        let product = (normal.transpose() * model_view).to_cols_array();
        for (got, want) in product.iter().zip(Mat4::IDENTITY.to_cols_array()) {
            assert!((got - want).abs() < 1e-4);
        }

        assert!(data.model_view_projection.iter().flatten().all(|v| v.is_finite()));
        assert_eq!(data.frame_index, 3);
        assert_eq!(data.time, 1.25);
        assert_eq!(data.light_direction[3], 0.0);
    }
}
