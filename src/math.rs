use glam::{Quat, Vec2, Vec3};

/// Rays shorter than this are treated as parallel to a plane.
const PARALLEL_EPSILON: f32 = 1e-4;

/// Position + orientation reported by perception (markers, planes, raycasts).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }
}

/// World ray. `direction` is always normalized.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Distance along the ray to a plane, if it is hit in front of the origin.
    pub fn intersect_plane(&self, plane_origin: Vec3, plane_normal: Vec3) -> Option<f32> {
        let denom = plane_normal.dot(self.direction);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }
        let t = (plane_origin - self.origin).dot(plane_normal) / denom;
        if t < 0.0 {
            return None;
        }
        Some(t)
    }

    /// Intersect the horizontal (Y-up) plane passing through `through`.
    pub fn intersect_ground(&self, through: Vec3) -> Option<Vec3> {
        self.intersect_plane(through, Vec3::Y)
            .map(|t| self.point_at(t))
    }
}

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_half_extents(center: Vec3, half: Vec3) -> Self {
        let half = half.abs();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Slab test. Returns the entry distance, or 0 when the origin is inside.
    pub fn ray_distance(&self, ray: &Ray, max_distance: f32) -> Option<f32> {
        let mut t_min = 0.0f32;
        let mut t_max = max_distance;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let dir = ray.direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if dir.abs() < f32::EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let mut t0 = (lo - origin) * inv;
            let mut t1 = (hi - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }

        Some(t_min)
    }
}

/// Pinhole camera used for screen-space picking. Screen coordinates are pixels
/// with the origin at the top-left corner and Y pointing down. The camera looks
/// down its local -Z axis.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub pose: Pose,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Screen size in pixels.
    pub viewport: Vec2,
}

impl Camera {
    pub fn new(pose: Pose, fov_y: f32, viewport: Vec2) -> Self {
        Self {
            pose,
            fov_y,
            viewport,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    pub fn screen_center(&self) -> Vec2 {
        self.viewport * 0.5
    }

    fn aspect(&self) -> f32 {
        self.viewport.x / self.viewport.y.max(1.0)
    }

    pub fn screen_point_to_ray(&self, screen: Vec2) -> Ray {
        let ndc_x = 2.0 * screen.x / self.viewport.x.max(1.0) - 1.0;
        let ndc_y = 1.0 - 2.0 * screen.y / self.viewport.y.max(1.0);
        let tan_half = (self.fov_y * 0.5).tan();
        let local = Vec3::new(ndc_x * tan_half * self.aspect(), ndc_y * tan_half, -1.0);
        Ray::new(self.pose.position, self.pose.rotation * local)
    }

    /// Project a world point to screen pixels. `None` when behind the camera.
    pub fn world_to_screen(&self, point: Vec3) -> Option<Vec2> {
        let local = self.pose.rotation.inverse() * (point - self.pose.position);
        if local.z >= -f32::EPSILON {
            return None;
        }
        let tan_half = (self.fov_y * 0.5).tan();
        let ndc_x = (local.x / -local.z) / (tan_half * self.aspect());
        let ndc_y = (local.y / -local.z) / tan_half;
        Some(Vec2::new(
            (ndc_x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - ndc_y) * 0.5 * self.viewport.y,
        ))
    }
}

/// Yaw-only rotation that faces `direction` (ignoring its vertical part),
/// with +Z as the forward axis.
pub fn yaw_towards(direction: Vec3) -> Option<Quat> {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() < 1e-8 {
        return None;
    }
    Some(Quat::from_rotation_y(flat.x.atan2(flat.z)))
}

/// Rotation from template Euler angles given in degrees (X, then Y, then Z).
pub fn rotation_from_euler_degrees(euler: [f32; 3]) -> Quat {
    Quat::from_euler(
        glam::EulerRot::YXZ,
        euler[1].to_radians(),
        euler[0].to_radians(),
        euler[2].to_radians(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_camera() -> Camera {
        Camera::new(
            Pose::at(Vec3::new(0.0, 1.0, 0.0)),
            60f32.to_radians(),
            Vec2::new(800.0, 600.0),
        )
    }

    #[test]
    fn center_ray_points_forward() {
        let cam = test_camera();
        let ray = cam.screen_point_to_ray(cam.screen_center());
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn projection_and_picking_agree() {
        let cam = test_camera();
        let target = Vec3::new(0.7, 0.0, -6.0);
        let screen = cam.world_to_screen(target).unwrap();
        let ray = cam.screen_point_to_ray(screen);
        let hit = ray.intersect_ground(Vec3::ZERO).unwrap();
        assert!((hit - target).length() < 1e-3);
    }

    #[test]
    fn ray_hits_box_in_front_only() {
        let aabb = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, -5.0), Vec3::splat(0.5));
        let forward = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let backward = Ray::new(Vec3::ZERO, Vec3::Z);
        let t = aabb.ray_distance(&forward, 100.0).unwrap();
        assert!((t - 4.5).abs() < 1e-5);
        assert!(aabb.ray_distance(&backward, 100.0).is_none());
        assert!(aabb.ray_distance(&forward, 3.0).is_none());
    }

    #[test]
    fn parallel_ray_misses_ground() {
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Z);
        assert!(ray.intersect_ground(Vec3::ZERO).is_none());
    }

    #[test]
    fn yaw_faces_direction() {
        let q = yaw_towards(Vec3::new(1.0, 5.0, 0.0)).unwrap();
        assert!((q * Vec3::Z - Vec3::X).length() < 1e-5);
        assert!(yaw_towards(Vec3::Y).is_none());
    }
}
