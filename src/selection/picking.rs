//! Pointer hit-testing against halo spheres
//!
//! Each halo is treated as a sphere around its position. A pick casts a ray
//! from the camera through the cursor and returns the halo whose sphere the
//! ray enters first, so overlapping halos resolve to the one nearest the
//! viewer. Equal distances keep the lower row offset.

use crate::catalog::halo::NVec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickRay {
    pub origin: NVec3,
    pub direction: NVec3, // unit length
}

impl PickRay {
    /// `None` if `direction` has no length
    pub fn new(origin: NVec3, direction: NVec3) -> Option<Self> {
        let direction = direction.try_normalize(f64::EPSILON)?;
        Some(Self { origin, direction })
    }

    /// Distance along the ray to where it enters the sphere, if it does
    pub fn hit_sphere(&self, center: &NVec3, radius: f64) -> Option<f64> {
        let oc = self.origin - center;
        let b = oc.dot(&self.direction);
        let c = oc.dot(&oc) - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t_near = -b - sqrt_disc;
        let t_far = -b + sqrt_disc;

        if t_near >= 0.0 {
            Some(t_near)
        } else if t_far >= 0.0 {
            // origin inside the sphere
            Some(0.0)
        } else {
            None
        }
    }
}

/// Row offset of the nearest halo hit by `ray`
pub fn pick_nearest<F>(ray: &PickRay, positions: &[NVec3], radius_of: F) -> Option<usize>
where
    F: Fn(usize) -> f64,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in positions.iter().enumerate() {
        if let Some(t) = ray.hit_sphere(p, radius_of(i)) {
            if best.map_or(true, |(_, bt)| t < bt) {
                best = Some((i, t));
            }
        }
    }
    best.map(|(i, _)| i)
}
