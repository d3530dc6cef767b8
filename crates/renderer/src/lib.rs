//! Renderer: wgpu device set-up, GPU meshes built from OBJ groups, per-frame
//! uniform rings, frame pacing and the built-in scenes.

pub mod frames;
pub mod gpu;
pub mod mesh;
pub mod overlay;
mod renderer;
pub mod scene;
pub mod uniforms;

pub use frames::{FrameToken, InFlightFrames};
pub use gpu::{BufferKind, GpuContext, GpuDevice};
pub use mesh::{Mesh, ObjMesh};
pub use overlay::{DebugOverlay, OverlayStats};
pub use renderer::{FrameStats, MAX_FRAMES_IN_FLIGHT, Renderer, RendererOptions};
pub use scene::{DrawableSize, RenderTargets, Scene, SceneKind};
pub use uniforms::{SharedData, UniformRing};
