//! Interleaved vertex formats.
//!
//! A vertex format takes one byte stream per attribute (as stored in an
//! [`ObjGroup`](crate::group::ObjGroup)) and packs them into a single buffer
//! of fixed-size records, ready to upload as a GPU vertex buffer.
//!
//! Record layouts are `#[repr(C)]` structs, so strides and offsets are
//! compile-time constants and match what the shaders declare. Float data is
//! copied byte for byte in native byte order (little-endian on every wgpu
//! target).
//!
//! All formats are reusable: setting an attribute again replaces the previous
//! stream and `encode` may be called any number of times.

use std::marker::PhantomData;
use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};
use corelib::{CoreError, CoreResult};

/// Per-vertex attribute kinds carried by OBJ groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// `float4`, w = 1.
    Position,
    /// `float4`, w = 0.
    Normal,
    /// `float2`.
    Texcoord,
    /// `float4` RGBA.
    Color,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 4] = [
        AttributeKind::Position,
        AttributeKind::Normal,
        AttributeKind::Texcoord,
        AttributeKind::Color,
    ];

    /// Size in bytes of one record of this attribute.
    pub const fn element_size(self) -> usize {
        match self {
            AttributeKind::Position | AttributeKind::Normal | AttributeKind::Color => 16,
            AttributeKind::Texcoord => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            AttributeKind::Position => "position",
            AttributeKind::Normal => "normal",
            AttributeKind::Texcoord => "texcoord",
            AttributeKind::Color => "color",
        }
    }

    const fn slot(self) -> usize {
        match self {
            AttributeKind::Position => 0,
            AttributeKind::Normal => 1,
            AttributeKind::Texcoord => 2,
            AttributeKind::Color => 3,
        }
    }
}

/// Where an attribute lives inside one interleaved record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeLayout {
    pub kind: AttributeKind,
    pub offset: usize,
}

impl AttributeLayout {
    pub const fn new(kind: AttributeKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

/// Packs attribute streams for a fixed number of vertices into one buffer.
pub trait VertexFormat {
    fn vertex_count(&self) -> usize;

    /// Size of one record in bytes.
    fn stride(&self) -> usize;

    /// Attributes this format requires, in record order.
    fn attributes(&self) -> &'static [AttributeLayout];

    /// Supply the stream for `kind`. Must be exactly
    /// `vertex_count * kind.element_size()` bytes.
    fn set_attribute_bytes(&mut self, kind: AttributeKind, data: &[u8]) -> CoreResult<()>;

    /// Produce `vertex_count * stride` bytes. Fails until every required
    /// attribute has been set.
    fn encode(&self) -> CoreResult<Vec<u8>>;

    fn encoded_len(&self) -> usize {
        self.vertex_count() * self.stride()
    }

    fn requires(&self, kind: AttributeKind) -> bool {
        self.attributes().iter().any(|a| a.kind == kind)
    }
}

/// A `#[repr(C)]` record type with a static attribute table.
pub trait InterleavedVertex: Pod {
    const ATTRIBUTES: &'static [AttributeLayout];
    const STRIDE: usize = size_of::<Self>();
}

/// Position + colour, 32-byte stride.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PositionColorVertex {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

impl InterleavedVertex for PositionColorVertex {
    const ATTRIBUTES: &'static [AttributeLayout] = &[
        AttributeLayout::new(AttributeKind::Position, offset_of!(Self, position)),
        AttributeLayout::new(AttributeKind::Color, offset_of!(Self, color)),
    ];
}

/// Position + normal, 32-byte stride.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PositionNormalVertex {
    pub position: [f32; 4],
    pub normal: [f32; 4],
}

impl InterleavedVertex for PositionNormalVertex {
    const ATTRIBUTES: &'static [AttributeLayout] = &[
        AttributeLayout::new(AttributeKind::Position, offset_of!(Self, position)),
        AttributeLayout::new(AttributeKind::Normal, offset_of!(Self, normal)),
    ];
}

/// Position + texcoord, 24-byte stride.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PositionTexcoordVertex {
    pub position: [f32; 4],
    pub texcoord: [f32; 2],
}

impl InterleavedVertex for PositionTexcoordVertex {
    const ATTRIBUTES: &'static [AttributeLayout] = &[
        AttributeLayout::new(AttributeKind::Position, offset_of!(Self, position)),
        AttributeLayout::new(AttributeKind::Texcoord, offset_of!(Self, texcoord)),
    ];
}

/// Generic interleaver over a record type `V`.
#[derive(Clone, Debug)]
pub struct InterleavedFormat<V> {
    vertex_count: usize,
    streams: [Option<Vec<u8>>; 4],
    _record: PhantomData<V>,
}

pub type PositionColorVertexFormat = InterleavedFormat<PositionColorVertex>;
pub type PositionNormalVertexFormat = InterleavedFormat<PositionNormalVertex>;
pub type PositionTexcoordVertexFormat = InterleavedFormat<PositionTexcoordVertex>;

impl<V: InterleavedVertex> InterleavedFormat<V> {
    pub fn new(vertex_count: usize) -> Self {
        Self {
            vertex_count,
            streams: Default::default(),
            _record: PhantomData,
        }
    }

    /// Typed convenience over `set_attribute_bytes`.
    pub fn set_attribute<T: Pod>(&mut self, kind: AttributeKind, values: &[T]) -> CoreResult<()> {
        self.set_attribute_bytes(kind, bytemuck::cast_slice(values))
    }

    /// Encode and reinterpret as records.
    pub fn encode_records(&self) -> CoreResult<Vec<V>> {
        Ok(bytemuck::pod_collect_to_vec(&self.encode()?))
    }
}

impl<V: InterleavedVertex> VertexFormat for InterleavedFormat<V> {
    fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    fn stride(&self) -> usize {
        V::STRIDE
    }

    fn attributes(&self) -> &'static [AttributeLayout] {
        V::ATTRIBUTES
    }

    fn set_attribute_bytes(&mut self, kind: AttributeKind, data: &[u8]) -> CoreResult<()> {
        if !self.requires(kind) {
            return Err(CoreError::configuration(format!(
                "vertex format has no {} attribute",
                kind.name()
            )));
        }
        let expected = self.vertex_count * kind.element_size();
        if data.len() != expected {
            return Err(CoreError::configuration(format!(
                "{} stream size mismatch: expected {} bytes for {} vertices, got {}",
                kind.name(),
                expected,
                self.vertex_count,
                data.len()
            )));
        }
        self.streams[kind.slot()] = Some(data.to_vec());
        Ok(())
    }

    fn encode(&self) -> CoreResult<Vec<u8>> {
        let stride = V::STRIDE;
        let mut out = vec![0u8; self.vertex_count * stride];

        for layout in V::ATTRIBUTES {
            let size = layout.kind.element_size();
            let stream = self.streams[layout.kind.slot()].as_deref().ok_or_else(|| {
                CoreError::configuration(format!(
                    "missing {} attribute; set it before encoding",
                    layout.kind.name()
                ))
            })?;

            for (record, element) in out.chunks_exact_mut(stride).zip(stream.chunks_exact(size)) {
                record[layout.offset..layout.offset + size].copy_from_slice(element);
            }
        }

        Ok(out)
    }
}

/// Selects a concrete vertex format at set-up time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexFormatKind {
    PositionColor,
    PositionNormal,
    PositionTexcoord,
}

impl VertexFormatKind {
    pub fn create(self, vertex_count: usize) -> Box<dyn VertexFormat> {
        match self {
            VertexFormatKind::PositionColor => {
                Box::new(PositionColorVertexFormat::new(vertex_count))
            }
            VertexFormatKind::PositionNormal => {
                Box::new(PositionNormalVertexFormat::new(vertex_count))
            }
            VertexFormatKind::PositionTexcoord => {
                Box::new(PositionTexcoordVertexFormat::new(vertex_count))
            }
        }
    }

    pub const fn stride(self) -> usize {
        match self {
            VertexFormatKind::PositionColor => PositionColorVertex::STRIDE,
            VertexFormatKind::PositionNormal => PositionNormalVertex::STRIDE,
            VertexFormatKind::PositionTexcoord => PositionTexcoordVertex::STRIDE,
        }
    }

    pub const fn attributes(self) -> &'static [AttributeLayout] {
        match self {
            VertexFormatKind::PositionColor => PositionColorVertex::ATTRIBUTES,
            VertexFormatKind::PositionNormal => PositionNormalVertex::ATTRIBUTES,
            VertexFormatKind::PositionTexcoord => PositionTexcoordVertex::ATTRIBUTES,
        }
    }
}
