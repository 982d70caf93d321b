//! Convex polyhedra: separating-axis test and face clipping
//!
//! Faces are vertex index lists wound counter-clockwise around their outward
//! normal. Contact generation between two hulls runs in two passes:
//!
//! 1. [`ConvexPolyhedron::find_separating_axis`] projects both hulls on the
//!    face axes of A, then of B, then on the cross products of their edge
//!    directions, and keeps the axis of least overlap. Any axis without
//!    overlap proves the hulls disjoint.
//! 2. [`ConvexPolyhedron::clip_against_hull`] takes B's face most aligned
//!    with that axis, clips it against the side planes of A's face most
//!    opposed to it, and keeps the points lying behind A's face.

use log::warn;
use serde::{Deserialize, Serialize};
use tumble_math::{Quat, Vec3, AABB};

use crate::error::{PhysicsError, Result};

/// Tolerance used when deduplicating edge directions and axes
const DIRECTION_EPSILON: f64 = 1e-6;

/// Convex hull described by vertices and faces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvexPolyhedron {
    vertices: Vec<Vec3>,
    faces: Vec<Vec<usize>>,
    face_normals: Vec<Vec3>,
    unique_edges: Vec<Vec3>,
    unique_axes: Vec<Vec3>,
    bounding_radius: f64,
}

/// A point produced by clipping, in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPoint {
    pub point: Vec3,
    /// World normal of the reference face it was clipped against
    pub normal: Vec3,
    /// Signed distance above the reference face; negative when penetrating
    pub depth: f64,
}

impl ConvexPolyhedron {
    /// Build a hull and derive its normals, unique edges and unique axes.
    ///
    /// Faces need at least three vertices and every index must name a
    /// vertex. A face whose normal points towards the local origin is
    /// reported with a warning and kept as given.
    pub fn new(vertices: Vec<Vec3>, faces: Vec<Vec<usize>>) -> Result<Self> {
        if vertices.is_empty() || faces.is_empty() {
            return Err(PhysicsError::InvalidShape(format!(
                "convex hull needs vertices and faces, got {} and {}",
                vertices.len(),
                faces.len()
            )));
        }
        for (i, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(PhysicsError::InvalidShape(format!(
                    "convex face {i} has {} vertices, at least 3 are needed",
                    face.len()
                )));
            }
            if let Some(&v) = face.iter().find(|&&v| v >= vertices.len()) {
                return Err(PhysicsError::InvalidShape(format!(
                    "convex face {i} references vertex {v} of {}",
                    vertices.len()
                )));
            }
        }
        Ok(Self::from_checked(vertices, faces))
    }

    fn from_checked(vertices: Vec<Vec3>, faces: Vec<Vec<usize>>) -> Self {
        let mut hull = Self {
            vertices,
            faces,
            face_normals: Vec::new(),
            unique_edges: Vec::new(),
            unique_axes: Vec::new(),
            bounding_radius: 0.0,
        };
        hull.compute_normals();
        hull.compute_unique_edges();
        hull.unique_axes = dedup_directions(hull.face_normals.iter().copied());
        hull.update_bounding_radius();
        hull
    }

    /// Replace the face axes tested by the separating-axis pass
    pub fn with_unique_axes(mut self, axes: Vec<Vec3>) -> Self {
        self.unique_axes = axes;
        self
    }

    /// Axis-aligned box centered on the origin
    pub fn cuboid(half_extents: Vec3) -> Self {
        let Vec3 { x, y, z } = half_extents;
        let vertices = vec![
            Vec3::new(-x, -y, -z),
            Vec3::new(x, -y, -z),
            Vec3::new(x, y, -z),
            Vec3::new(-x, y, -z),
            Vec3::new(-x, -y, z),
            Vec3::new(x, -y, z),
            Vec3::new(x, y, z),
            Vec3::new(-x, y, z),
        ];
        let faces = vec![
            vec![3, 2, 1, 0], // -z
            vec![4, 5, 6, 7], // +z
            vec![5, 4, 0, 1], // -y
            vec![2, 3, 7, 6], // +y
            vec![0, 4, 7, 3], // -x
            vec![1, 2, 6, 5], // +x
        ];
        Self::from_checked(vertices, faces).with_unique_axes(vec![Vec3::X, Vec3::Y, Vec3::Z])
    }

    /// Regular icosahedron with the given circumradius
    pub fn icosahedron(radius: f64) -> Self {
        let phi = (1.0 + 5f64.sqrt()) * 0.5;
        let scale = radius / (1.0 + phi * phi).sqrt();
        let vertices: Vec<Vec3> = [
            (-1.0, phi, 0.0), (1.0, phi, 0.0), (-1.0, -phi, 0.0), (1.0, -phi, 0.0),
            (0.0, -1.0, phi), (0.0, 1.0, phi), (0.0, -1.0, -phi), (0.0, 1.0, -phi),
            (phi, 0.0, -1.0), (phi, 0.0, 1.0), (-phi, 0.0, -1.0), (-phi, 0.0, 1.0),
        ]
        .iter()
        .map(|&(x, y, z)| Vec3::new(x, y, z) * scale)
        .collect();

        let triangles: [[usize; 3]; 20] = [
            [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
            [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
            [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
            [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
        ];
        let faces = triangles
            .iter()
            .map(|t| {
                let n = face_normal(vertices[t[0]], vertices[t[1]], vertices[t[2]]);
                let centroid = vertices[t[0]] + vertices[t[1]] + vertices[t[2]];
                if n.dot(centroid) < 0.0 {
                    vec![t[2], t[1], t[0]]
                } else {
                    t.to_vec()
                }
            })
            .collect();
        Self::from_checked(vertices, faces)
    }

    fn compute_normals(&mut self) {
        let vertices = &self.vertices;
        self.face_normals = self
            .faces
            .iter()
            .enumerate()
            .map(|(i, face)| {
                let v0 = vertices[face[0]];
                let n = face_normal(v0, vertices[face[1]], vertices[face[2]]);
                if n.dot(v0) < 0.0 {
                    warn!(
                        "Convex face {i} normal {n:?} points into the shape; \
                         check that the face vertices are wound counter-clockwise"
                    );
                }
                n
            })
            .collect();
    }

    fn compute_unique_edges(&mut self) {
        let vertices = &self.vertices;
        let edges = self.faces.iter().flat_map(|face| {
            (0..face.len()).map(move |j| {
                let a = vertices[face[j]];
                let b = vertices[face[(j + 1) % face.len()]];
                (b - a).normalize()
            })
        });
        let unique = dedup_directions(edges);
        self.unique_edges = unique;
    }

    /// Recompute the bounding radius from the vertices
    pub fn update_bounding_radius(&mut self) {
        self.bounding_radius = self
            .vertices
            .iter()
            .map(|v| v.length())
            .fold(0.0, f64::max);
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    #[inline]
    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    #[inline]
    pub fn face_normals(&self) -> &[Vec3] {
        &self.face_normals
    }

    #[inline]
    pub fn unique_edges(&self) -> &[Vec3] {
        &self.unique_edges
    }

    #[inline]
    pub fn unique_axes(&self) -> &[Vec3] {
        &self.unique_axes
    }

    #[inline]
    pub fn bounding_radius(&self) -> f64 {
        self.bounding_radius
    }

    /// Plane constant `c` of face `i` such that `n . p + c = 0` on the face
    pub fn face_plane_constant(&self, i: usize) -> f64 {
        -self.face_normals[i].dot(self.vertices[self.faces[i][0]])
    }

    /// Face `i` transformed to world space
    pub fn world_face(&self, i: usize, position: Vec3, rotation: Quat) -> Vec<Vec3> {
        self.faces[i]
            .iter()
            .map(|&v| rotation * self.vertices[v] + position)
            .collect()
    }

    pub fn world_vertices(&self, position: Vec3, rotation: Quat) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices.iter().map(move |&v| rotation * v + position)
    }

    pub fn local_aabb(&self) -> AABB {
        AABB::from_points(&self.vertices)
    }

    pub fn world_aabb(&self, position: Vec3, rotation: Quat) -> AABB {
        self.world_vertices(position, rotation)
            .fold(AABB::EMPTY, |aabb, v| aabb.expand_to_include(v))
    }

    /// Mean of the vertices
    pub fn average_point_local(&self) -> Vec3 {
        if self.vertices.is_empty() {
            return Vec3::ZERO;
        }
        let sum = self.vertices.iter().fold(Vec3::ZERO, |acc, &v| acc + v);
        sum / self.vertices.len() as f64
    }

    /// True if a local-space point lies inside or on the hull
    pub fn point_is_inside(&self, p: Vec3) -> bool {
        self.faces.iter().zip(&self.face_normals).all(|(face, n)| {
            n.dot(p - self.vertices[face[0]]) <= 0.0
        })
    }

    /// Project the world-space hull onto `axis`, returning `(min, max)`
    pub fn project(&self, axis: Vec3, position: Vec3, rotation: Quat) -> (f64, f64) {
        let local_axis = rotation.conjugate() * axis;
        let offset = position.dot(axis);
        let (min, max) = self
            .vertices
            .iter()
            .map(|v| v.dot(local_axis))
            .fold((f64::MAX, f64::MIN), |(lo, hi), d| (lo.min(d), hi.max(d)));
        (min + offset, max + offset)
    }

    /// Overlap of the two hulls along `axis`, or `None` if they are apart on it
    pub fn test_sep_axis(
        &self,
        axis: Vec3,
        other: &ConvexPolyhedron,
        pos_a: Vec3,
        quat_a: Quat,
        pos_b: Vec3,
        quat_b: Quat,
    ) -> Option<f64> {
        self.overlap_within(axis, other, pos_a, quat_a, pos_b, quat_b, 0.0)
    }

    /// Overlap along `axis`, negative when the hulls are up to `margin` apart
    #[allow(clippy::too_many_arguments)]
    fn overlap_within(
        &self,
        axis: Vec3,
        other: &ConvexPolyhedron,
        pos_a: Vec3,
        quat_a: Quat,
        pos_b: Vec3,
        quat_b: Quat,
        margin: f64,
    ) -> Option<f64> {
        let (min_a, max_a) = self.project(axis, pos_a, quat_a);
        let (min_b, max_b) = other.project(axis, pos_b, quat_b);
        if max_a + margin < min_b || max_b + margin < min_a {
            return None;
        }
        let d0 = max_a - min_b;
        let d1 = max_b - min_a;
        Some(if d0 < d1 { d0 } else { d1 })
    }

    /// Axis of least penetration between this hull (A) and `other` (B).
    ///
    /// Candidate order: A's face axes, B's face axes, then edge cross
    /// products. Ties keep the earliest candidate. The returned axis points
    /// from B towards A. Returns `None` if a separating axis exists.
    pub fn find_separating_axis(
        &self,
        other: &ConvexPolyhedron,
        pos_a: Vec3,
        quat_a: Quat,
        pos_b: Vec3,
        quat_b: Quat,
    ) -> Option<Vec3> {
        self.find_separating_axis_within(other, pos_a, quat_a, pos_b, quat_b, 0.0)
    }

    /// Like [`Self::find_separating_axis`], but hulls less than `margin`
    /// apart still yield the axis of least separation.
    pub fn find_separating_axis_within(
        &self,
        other: &ConvexPolyhedron,
        pos_a: Vec3,
        quat_a: Quat,
        pos_b: Vec3,
        quat_b: Quat,
        margin: f64,
    ) -> Option<Vec3> {
        let mut best: Option<(f64, Vec3)> = None;
        let mut consider = |axis: Vec3| -> bool {
            match self.overlap_within(axis, other, pos_a, quat_a, pos_b, quat_b, margin) {
                None => false,
                Some(d) => {
                    if best.map_or(true, |(dmin, _)| d < dmin) {
                        best = Some((d, axis));
                    }
                    true
                }
            }
        };

        for &axis in &self.unique_axes {
            if !consider(quat_a * axis) {
                return None;
            }
        }
        for &axis in &other.unique_axes {
            if !consider(quat_b * axis) {
                return None;
            }
        }
        for &edge_a in &self.unique_edges {
            let world_a = quat_a * edge_a;
            for &edge_b in &other.unique_edges {
                let cross = world_a.cross(quat_b * edge_b);
                if cross.almost_zero(DIRECTION_EPSILON) {
                    continue;
                }
                if !consider(cross.normalize()) {
                    return None;
                }
            }
        }

        let (_, axis) = best?;
        if (pos_b - pos_a).dot(axis) > 0.0 {
            Some(-axis)
        } else {
            Some(axis)
        }
    }

    /// Contact points between this hull (A) and `other` (B) along
    /// `separating_normal`, which must point from B towards A.
    #[allow(clippy::too_many_arguments)]
    pub fn clip_against_hull(
        &self,
        pos_a: Vec3,
        quat_a: Quat,
        other: &ConvexPolyhedron,
        pos_b: Vec3,
        quat_b: Quat,
        separating_normal: Vec3,
        min_dist: f64,
        max_dist: f64,
        epsilon: f64,
    ) -> Vec<ClipPoint> {
        let mut incident = None;
        let mut dmax = f64::MIN;
        for (i, n) in other.face_normals.iter().enumerate() {
            let d = (quat_b * *n).dot(separating_normal);
            if d > dmax {
                dmax = d;
                incident = Some(i);
            }
        }
        match incident {
            Some(i) => {
                let face = other.world_face(i, pos_b, quat_b);
                self.clip_face_against_hull(separating_normal, pos_a, quat_a, face, min_dist, max_dist, epsilon)
            }
            None => Vec::new(),
        }
    }

    /// Clip a world-space polygon against the side planes of this hull's
    /// face most opposed to `separating_normal`, keeping points that lie
    /// behind that face.
    #[allow(clippy::too_many_arguments)]
    pub fn clip_face_against_hull(
        &self,
        separating_normal: Vec3,
        pos_a: Vec3,
        quat_a: Quat,
        incident: Vec<Vec3>,
        min_dist: f64,
        max_dist: f64,
        epsilon: f64,
    ) -> Vec<ClipPoint> {
        let mut reference = None;
        let mut dmin = f64::MAX;
        for (i, n) in self.face_normals.iter().enumerate() {
            let d = (quat_a * *n).dot(separating_normal);
            if d < dmin {
                dmin = d;
                reference = Some(i);
            }
        }
        let Some(reference) = reference else {
            return Vec::new();
        };

        let ref_face = self.world_face(reference, pos_a, quat_a);
        let ref_normal = quat_a * self.face_normals[reference];

        let mut polygon = incident;
        for i in 0..ref_face.len() {
            let a = ref_face[i];
            let b = ref_face[(i + 1) % ref_face.len()];
            let side_normal = (b - a).cross(ref_normal).normalize();
            polygon = clip_face_against_plane(&polygon, side_normal, -side_normal.dot(a));
            if polygon.is_empty() {
                return Vec::new();
            }
        }

        let plane_offset = ref_normal.dot(ref_face[0]);
        polygon
            .into_iter()
            .filter_map(|point| {
                let depth = (ref_normal.dot(point) - plane_offset).max(min_dist);
                (depth <= max_dist && depth <= epsilon).then_some(ClipPoint {
                    point,
                    normal: ref_normal,
                    depth,
                })
            })
            .collect()
    }
}

/// Sutherland-Hodgman clip of a polygon against the plane `n . p + c = 0`,
/// keeping the part with `n . p + c < 0`.
pub fn clip_face_against_plane(polygon: &[Vec3], normal: Vec3, constant: f64) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(polygon.len() + 1);
    let Some(&last) = polygon.last() else {
        return out;
    };
    if polygon.len() < 2 {
        return out;
    }

    let mut first = last;
    let mut d_first = normal.dot(first) + constant;
    for &current in polygon {
        let d_current = normal.dot(current) + constant;
        if d_first < 0.0 {
            if d_current < 0.0 {
                out.push(current);
            } else {
                out.push(first.lerp(current, d_first / (d_first - d_current)));
            }
        } else if d_current < 0.0 {
            out.push(first.lerp(current, d_first / (d_first - d_current)));
            out.push(current);
        }
        first = current;
        d_first = d_current;
    }
    out
}

/// True if `p`, assumed in the polygon's plane, is inside the polygon
pub fn point_in_polygon(vertices: &[Vec3], normal: Vec3, p: Vec3) -> bool {
    let mut positive: Option<bool> = None;
    let n = vertices.len();
    for i in 0..n {
        let v = vertices[i];
        let edge = vertices[(i + 1) % n] - v;
        let r = edge.cross(normal).dot(p - v);
        match positive {
            None => positive = Some(r > 0.0),
            Some(true) if r > 0.0 => {}
            Some(false) if r <= 0.0 => {}
            Some(_) => return false,
        }
    }
    true
}

/// Outward normal of a counter-clockwise triangle
fn face_normal(va: Vec3, vb: Vec3, vc: Vec3) -> Vec3 {
    (vc - vb).cross(va - vb).normalize()
}

/// Keep one representative per direction, treating opposite directions as equal
fn dedup_directions(directions: impl Iterator<Item = Vec3>) -> Vec<Vec3> {
    let mut unique: Vec<Vec3> = Vec::new();
    for d in directions {
        if d.is_zero() {
            continue;
        }
        let seen = unique.iter().any(|u| {
            u.almost_equals(d, DIRECTION_EPSILON) || u.is_antiparallel_to(d, DIRECTION_EPSILON)
        });
        if !seen {
            unique.push(d);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> ConvexPolyhedron {
        ConvexPolyhedron::cuboid(Vec3::splat(0.5))
    }

    #[test]
    fn test_box_normals_point_outwards() {
        let hull = unit_box();
        let expected = [Vec3::NEG_Z, Vec3::Z, Vec3::NEG_Y, Vec3::Y, Vec3::NEG_X, Vec3::X];
        for (n, e) in hull.face_normals().iter().zip(expected) {
            assert!(n.almost_equals(e, 1e-12), "{n:?} != {e:?}");
        }
        assert_eq!(hull.unique_edges().len(), 3);
        assert_eq!(hull.unique_axes().len(), 3);
        assert!((hull.bounding_radius() - 0.75f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_icosahedron_is_closed_and_outward() {
        let hull = ConvexPolyhedron::icosahedron(1.0);
        assert_eq!(hull.vertices().len(), 12);
        assert_eq!(hull.faces().len(), 20);
        for (face, n) in hull.faces().iter().zip(hull.face_normals()) {
            assert!(n.dot(hull.vertices()[face[0]]) > 0.0);
        }
        assert!((hull.bounding_radius() - 1.0).abs() < 1e-12);
        assert!(hull.point_is_inside(Vec3::ZERO));
        assert!(!hull.point_is_inside(Vec3::new(0.0, 1.01, 0.0)));
    }

    #[test]
    fn test_point_is_inside_box() {
        let hull = unit_box();
        assert!(hull.point_is_inside(Vec3::new(0.4, -0.4, 0.1)));
        assert!(!hull.point_is_inside(Vec3::new(0.6, 0.0, 0.0)));
    }

    #[test]
    fn test_tetrahedron_from_parts() {
        let vertices = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
        let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]];
        let hull = ConvexPolyhedron::new(vertices, faces).unwrap();
        assert_eq!(hull.face_normals().len(), 4);
        assert!(hull.face_normals()[0].almost_equals(Vec3::NEG_Z, 1e-12));
        assert_eq!(hull.unique_edges().len(), 6);
    }

    #[test]
    fn test_malformed_faces_are_rejected() {
        let vertices = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let short = ConvexPolyhedron::new(vertices.clone(), vec![vec![0, 1]]);
        assert!(matches!(short, Err(PhysicsError::InvalidShape(_))));
        let dangling = ConvexPolyhedron::new(vertices.clone(), vec![vec![0, 1, 7]]);
        assert!(matches!(dangling, Err(PhysicsError::InvalidShape(_))));
        let empty = ConvexPolyhedron::new(vertices, Vec::new());
        assert!(matches!(empty, Err(PhysicsError::InvalidShape(_))));
    }

    #[test]
    fn test_project_translated_rotated() {
        let hull = unit_box();
        let q = Quat::from_rotation_z(core::f64::consts::FRAC_PI_4);
        let (min, max) = hull.project(Vec3::X, Vec3::new(2.0, 0.0, 0.0), q);
        let half_diag = 0.5 * 2f64.sqrt();
        assert!((min - (2.0 - half_diag)).abs() < 1e-12);
        assert!((max - (2.0 + half_diag)).abs() < 1e-12);
    }

    #[test]
    fn test_separated_boxes_have_no_axis() {
        let hull = unit_box();
        // Bounding spheres overlap (distance 1.556 < 1.732) but the boxes do not.
        let axis = hull.find_separating_axis(
            &hull,
            Vec3::ZERO,
            Quat::IDENTITY,
            Vec3::new(1.1, 1.1, 0.0),
            Quat::IDENTITY,
        );
        assert!(axis.is_none());
    }

    #[test]
    fn test_separating_axis_points_from_b_to_a() {
        let hull = unit_box();
        let axis = hull
            .find_separating_axis(&hull, Vec3::ZERO, Quat::IDENTITY, Vec3::new(0.0, 0.9, 0.0), Quat::IDENTITY)
            .unwrap();
        assert!(axis.almost_equals(Vec3::NEG_Y, 1e-12));
    }

    #[test]
    fn test_separating_axis_tie_keeps_first_candidate() {
        // Equal overlap on x and y: the first face axis of A (x) wins.
        let hull = unit_box();
        let axis = hull
            .find_separating_axis(&hull, Vec3::ZERO, Quat::IDENTITY, Vec3::new(0.9, 0.9, 0.0), Quat::IDENTITY)
            .unwrap();
        assert!(axis.almost_equals(Vec3::NEG_X, 1e-12));
    }

    #[test]
    fn test_clip_stacked_boxes() {
        let hull = unit_box();
        let pos_b = Vec3::new(0.0, 0.9, 0.0);
        let axis = hull
            .find_separating_axis(&hull, Vec3::ZERO, Quat::IDENTITY, pos_b, Quat::IDENTITY)
            .unwrap();
        let points = hull.clip_against_hull(
            Vec3::ZERO, Quat::IDENTITY, &hull, pos_b, Quat::IDENTITY, axis, -100.0, 100.0, 1e-6,
        );
        assert_eq!(points.len(), 4);
        for p in &points {
            assert!((p.depth + 0.1).abs() < 1e-9);
            assert!((p.point.y - 0.4).abs() < 1e-9);
            assert!(p.normal.almost_equals(Vec3::Y, 1e-12));
        }
    }

    #[test]
    fn test_clip_face_against_plane_halves_square() {
        let square = [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ];
        let clipped = clip_face_against_plane(&square, Vec3::X, 0.0);
        assert_eq!(clipped.len(), 4);
        assert!(clipped.iter().all(|p| p.x <= 1e-12));
    }

    #[test]
    fn test_point_in_polygon() {
        let square = [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ];
        assert!(point_in_polygon(&square, Vec3::Z, Vec3::new(0.2, 0.3, 0.0)));
        assert!(!point_in_polygon(&square, Vec3::Z, Vec3::new(1.2, 0.3, 0.0)));
    }
}
