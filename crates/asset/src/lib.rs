//! Asset loading: OBJ models split into groups, interleaved vertex formats
//! and procedural textures.

pub mod group;
pub mod obj;
pub mod texture;
pub mod vertex_format;

pub use group::ObjGroup;
pub use obj::{DEFAULT_GROUP_NAME, ObjModel};
pub use vertex_format::{AttributeKind, VertexFormat, VertexFormatKind};
