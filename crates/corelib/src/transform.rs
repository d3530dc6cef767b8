use crate::{EulerRot, Mat4, Quat, Vec3};

/// Model transform: translation, rotation, non-uniform scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Rotation from XYZ Euler angles in radians.
    pub fn from_euler(translation: Vec3, euler_xyz: Vec3, scale: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::from_euler(EulerRot::XYZ, euler_xyz.x, euler_xyz.y, euler_xyz.z),
            scale,
        }
    }

    /// Unit-scale model at `translation` spun by `speed_xyz` rad/s for `seconds`.
    pub fn spinning(translation: Vec3, speed_xyz: Vec3, seconds: f32) -> Self {
        Self::from_euler(translation, speed_xyz * seconds, Vec3::ONE)
    }

    /// T * R * S.
    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
