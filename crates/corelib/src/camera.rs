use crate::{Mat4, Vec3};

/// Perspective camera orbiting a target (right-handed, depth in [0, 1]).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub aspect: f32,
}

impl Camera {
    const FOV_Y_DEG: f32 = 60.0;
    const Z_NEAR: f32 = 0.1;
    const Z_FAR: f32 = 100.0;

    /// Camera `distance` away from `target`, rotated by `yaw` around Y and
    /// `pitch` above the horizon (radians). Zero angles look down -Z.
    pub fn orbit(target: Vec3, distance: f32, yaw: f32, pitch: f32, aspect: f32) -> Self {
        let pitch = pitch.clamp(-1.5, 1.5);
        let offset = Vec3::new(
            pitch.cos() * yaw.sin(),
            pitch.sin(),
            pitch.cos() * yaw.cos(),
        ) * distance;
        Self {
            eye: target + offset,
            target,
            up: Vec3::Y,
            fov_y_rad: Self::FOV_Y_DEG.to_radians(),
            z_near: Self::Z_NEAR,
            z_far: Self::Z_FAR,
            aspect,
        }
    }

    /// Camera on the +Z axis at `distance`, looking at the origin.
    pub fn looking_at_origin(distance: f32, aspect: f32) -> Self {
        Self::orbit(Vec3::ZERO, distance, 0.0, 0.0, aspect)
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    #[inline]
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_rad,
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    #[inline]
    pub fn proj_view(&self) -> Mat4 {
        self.proj() * self.view()
    }
}
