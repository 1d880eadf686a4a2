// Per-frame uniform data: model/view/projection matrices

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use crate::config::SceneConfig;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct UniformBufferObject {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl UniformBufferObject {
    /// Model spinning about +Z, seen from `scene.eye` looking at the origin.
    pub fn new(elapsed_secs: f32, aspect: f32, scene: &SceneConfig) -> Self {
        let angle = (elapsed_secs * scene.rotation_degrees_per_second).to_radians();
        let model = Mat4::from_rotation_z(angle);

        let view = Mat4::look_at_rh(Vec3::from(scene.eye), Vec3::ZERO, Vec3::Z);

        // glam targets a 0..1 depth range already; only Y needs flipping for Vulkan
        let mut proj = Mat4::perspective_rh(
            scene.fov_degrees.to_radians(),
            aspect,
            scene.near,
            scene.far,
        );
        proj.y_axis.y *= -1.0;

        Self { model, view, proj }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_size_is_three_matrices() {
        assert_eq!(std::mem::size_of::<UniformBufferObject>(), 3 * 64);
    }

    #[test]
    fn test_model_starts_unrotated() {
        let ubo = UniformBufferObject::new(0.0, 4.0 / 3.0, &SceneConfig::default());
        assert!(ubo.model.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_one_second_is_a_quarter_turn() {
        let ubo = UniformBufferObject::new(1.0, 1.0, &SceneConfig::default());
        let x = ubo.model * Vec4::X;
        assert!(x.abs_diff_eq(Vec4::Y, 1e-5));
    }

    #[test]
    fn test_projection_flips_y() {
        let scene = SceneConfig::default();
        let ubo = UniformBufferObject::new(0.0, 1.0, &scene);
        let unflipped = Mat4::perspective_rh(scene.fov_degrees.to_radians(), 1.0, scene.near, scene.far);

        assert!(ubo.proj.y_axis.y < 0.0);
        assert_eq!(ubo.proj.y_axis.y, -unflipped.y_axis.y);
        assert_eq!(ubo.proj.x_axis, unflipped.x_axis);
    }

    #[test]
    fn test_origin_lands_inside_depth_range() {
        let ubo = UniformBufferObject::new(0.0, 800.0 / 600.0, &SceneConfig::default());
        let clip = ubo.proj * ubo.view * ubo.model * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;

        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
