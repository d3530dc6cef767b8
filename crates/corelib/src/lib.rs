//! Core types shared by every crate: math re-exports, the error taxonomy,
//! model transforms and the camera.

pub use glam::{EulerRot, Mat4, Quat, Vec3, vec3};

pub mod camera;
pub mod error;
pub mod transform;

pub use error::{CoreError, CoreResult};
