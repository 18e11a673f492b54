/*!
Core math aliases and the host-space transform type shared by every module.

This module intentionally contains no algorithms. It defines the data exchanged
between:
- space (host-world ↔ simulation-local conversion)
- geometry extraction (accumulated relative transforms)
- the motion state bridge (host actor poses)
- the body registry / world driver (body poses and kinematic state)
*/

use nalgebra as na;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// A rigid transform (no scale/shear) in host world space, host units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Transform {
    #[inline]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    #[inline]
    pub fn identity() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }

    /// Convert to a nalgebra `Isometry3`. Note this does **not** change units;
    /// use [`crate::space::to_sim_space`] for host → simulation conversion.
    #[inline]
    pub fn iso(&self) -> Iso {
        Iso::from_parts(
            na::Translation3::new(self.translation.x, self.translation.y, self.translation.z),
            self.rotation,
        )
    }

    /// Composition `self ∘ inner`: the result maps a point through `inner`
    /// first, then through `self`. Matches isometry multiplication order.
    #[inline]
    pub fn compose(&self, inner: &Transform) -> Transform {
        Transform {
            translation: self.translation + self.rotation * inner.translation,
            rotation: self.rotation * inner.rotation,
        }
    }

    #[inline]
    pub fn inverse(&self) -> Transform {
        let inv_rot = self.rotation.inverse();
        Transform {
            translation: -(inv_rot * self.translation),
            rotation: inv_rot,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Transform {
        Transform::new(
            Vec3::new(120.0, -35.0, 7.5),
            Quat::from_euler_angles(0.3, -1.1, 0.7),
        )
    }

    #[test]
    fn compose_with_identity_is_noop() {
        let t = sample();
        let composed = t.compose(&Transform::identity());
        assert_relative_eq!(composed.translation, t.translation, epsilon = 1.0e-5);
        assert_relative_eq!(
            composed.rotation.into_inner(),
            t.rotation.into_inner(),
            epsilon = 1.0e-5
        );
    }

    #[test]
    fn compose_with_inverse_is_identity() {
        let t = sample();
        let id = t.compose(&t.inverse());
        assert_relative_eq!(id.translation, Vec3::zeros(), epsilon = 1.0e-4);
        assert_relative_eq!(id.rotation.angle(), 0.0, epsilon = 1.0e-4);
    }

    #[test]
    fn compose_matches_isometry_multiplication() {
        let a = sample();
        let b = Transform::new(
            Vec3::new(-4.0, 9.0, 0.25),
            Quat::from_euler_angles(-0.2, 0.4, 1.9),
        );

        let composed = a.compose(&b).iso();
        let expected = a.iso() * b.iso();
        assert_relative_eq!(
            composed.translation.vector,
            expected.translation.vector,
            epsilon = 1.0e-4
        );
        assert_relative_eq!(
            composed.rotation.into_inner(),
            expected.rotation.into_inner(),
            epsilon = 1.0e-5
        );
    }
}
