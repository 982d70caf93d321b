//! Intersection helpers for ray casting and contact generation
//!
//! Segment queries take the segment end points and report hits as a
//! fraction `t` in `[0, 1]` of the way from `from` to `to`.

use crate::vector::Vec3;

/// Barycentric containment test for a point in the plane of a triangle.
///
/// Accepts `u >= 0`, `v >= 0`, `u + v < 1` where `u` weights `c - a` and `v`
/// weights `b - a`. The shared edge of two fan triangles is therefore only
/// accepted by one of them.
pub fn point_in_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let dot00 = v0.dot(v0);
    let dot01 = v0.dot(v1);
    let dot02 = v0.dot(v2);
    let dot11 = v1.dot(v1);
    let dot12 = v1.dot(v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom == 0.0 {
        return false;
    }
    let inv = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv;
    let v = (dot00 * dot12 - dot01 * dot02) * inv;

    u >= 0.0 && v >= 0.0 && u + v < 1.0
}

/// Segment-sphere intersection.
///
/// Returns the fractions along `from -> to` (ascending) at which the segment
/// crosses the sphere surface. Roots outside `[0, 1]` are dropped.
pub fn ray_sphere_segment(from: Vec3, to: Vec3, center: Vec3, radius: f64) -> Vec<f64> {
    let d = to - from;
    let a = d.length_squared();
    if a == 0.0 {
        return Vec::new();
    }
    let f = from - center;
    let b = 2.0 * d.dot(f);
    let c = f.length_squared() - radius * radius;
    let disc = b * b - 4.0 * a * c;

    if disc < 0.0 {
        return Vec::new();
    }
    if disc == 0.0 {
        let t = -b / (2.0 * a);
        return if (0.0..=1.0).contains(&t) { vec![t] } else { Vec::new() };
    }

    let sq = disc.sqrt();
    [(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)]
        .into_iter()
        .filter(|t| (0.0..=1.0).contains(t))
        .collect()
}

/// Segment-plane intersection.
///
/// Returns the fraction along `from -> to` where the segment crosses the
/// plane through `plane_point` with normal `plane_normal`, or `None` if the
/// segment is parallel or does not reach it.
pub fn ray_plane(from: Vec3, to: Vec3, plane_point: Vec3, plane_normal: Vec3) -> Option<f64> {
    let d = to - from;
    let denom = plane_normal.dot(d);
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = (plane_point - from).dot(plane_normal) / denom;
    (0.0..=1.0).contains(&t).then_some(t)
}
