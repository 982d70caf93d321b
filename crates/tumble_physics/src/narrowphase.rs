//! Narrowphase: contact generation for candidate body pairs
//!
//! Every shape of one body is tested against every shape of the other. The
//! pair is put in canonical order (lower [`ShapeType`] first) and dispatched
//! to a per-pair routine that writes contacts as `(ri, rj, ni)` triples:
//! `ni` points out of the first shape into the second, `ri`/`rj` are world
//! offsets from each shape's center to its contact point. The triples are
//! then turned into contact and friction [`Equation`]s.

use std::collections::HashSet;

use log::debug;
use tumble_math::{Quat, Vec3};

use crate::body::{Body, BodyShape, BodyType, ShapeId};
use crate::config::NarrowphaseConfig;
use crate::convex::{point_in_polygon, ConvexPolyhedron};
use crate::equation::{Equation, EquationKind};
use crate::events::ContactPoint;
use crate::material::{ContactMaterialTable, ContactParams, Material, MaterialId};
use crate::shape::{ShapeKind, ShapeType};

/// Two shapes found overlapping without generating equations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeOverlap {
    pub body_i: usize,
    pub shape_i: ShapeId,
    pub body_j: usize,
    pub shape_j: ShapeId,
}

/// World state the narrowphase reads
pub struct NarrowphaseContext<'a> {
    pub bodies: &'a [Body],
    pub materials: &'a [Material],
    pub contact_materials: &'a ContactMaterialTable,
    pub default_contact: ContactParams,
    pub gravity: Vec3,
    pub dt: f64,
}

#[derive(Debug, Clone, Copy)]
struct RawContact {
    ri: Vec3,
    rj: Vec3,
    ni: Vec3,
}

/// A shape placed in the world
struct Placed<'a> {
    body: usize,
    shape: &'a BodyShape,
    position: Vec3,
    rotation: Quat,
}

/// Contact and friction equation generator
#[derive(Debug, Default)]
pub struct Narrowphase {
    pub config: NarrowphaseConfig,
    /// Contact rows of the last run
    pub contacts: Vec<Equation>,
    /// Friction rows of the last run
    pub frictions: Vec<Equation>,
    /// Overlaps between kinematic and static or kinematic bodies
    pub overlaps: Vec<ShapeOverlap>,
    raw: Vec<RawContact>,
    reported_unsupported: HashSet<(ShapeType, ShapeType)>,
}

impl Narrowphase {
    pub fn new(config: NarrowphaseConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Generate contacts for the body pairs `(pairs_a[k], pairs_b[k])`
    pub fn get_contacts(&mut self, pairs_a: &[usize], pairs_b: &[usize], ctx: &NarrowphaseContext<'_>) {
        self.contacts.clear();
        self.frictions.clear();
        self.overlaps.clear();

        for (&ia, &ib) in pairs_a.iter().zip(pairs_b) {
            self.body_pair(ia, ib, ctx);
        }
    }

    fn body_pair(&mut self, ia: usize, ib: usize, ctx: &NarrowphaseContext<'_>) {
        let (ba, bb) = (&ctx.bodies[ia], &ctx.bodies[ib]);
        let just_test = (ba.body_type() == BodyType::Kinematic && !bb.is_dynamic())
            || (bb.body_type() == BodyType::Kinematic && !ba.is_dynamic());

        for sa in ba.shapes() {
            for sb in bb.shapes() {
                if !sa.shape.filter.can_collide(&sb.shape.filter) {
                    continue;
                }
                let (pa, qa) = ba.shape_world_pose(sa);
                let (pb, qb) = bb.shape_world_pose(sb);
                if pa.distance(pb) > sa.shape.bounding_radius() + sb.shape.bounding_radius() {
                    continue;
                }

                let a = Placed { body: ia, shape: sa, position: pa, rotation: qa };
                let b = Placed { body: ib, shape: sb, position: pb, rotation: qb };
                let (first, second) = if sa.shape.shape_type() <= sb.shape.shape_type() { (a, b) } else { (b, a) };

                self.raw.clear();
                let reducible = self.dispatch(&first, &second);
                if self.raw.is_empty() {
                    continue;
                }

                if just_test {
                    self.overlaps.push(ShapeOverlap {
                        body_i: first.body,
                        shape_i: first.shape.id,
                        body_j: second.body,
                        shape_j: second.shape.id,
                    });
                    continue;
                }
                self.create_equations(&first, &second, reducible, ctx);
            }
        }
    }

    /// Fill `self.raw` for a canonically ordered pair. Returns true if the
    /// pair's friction may be reduced to one averaged pair of rows.
    fn dispatch(&mut self, a: &Placed<'_>, b: &Placed<'_>) -> bool {
        let out = &mut self.raw;
        let (xa, qa, xb, qb) = (a.position, a.rotation, b.position, b.rotation);

        match (a.shape.shape.kind(), b.shape.shape.kind()) {
            (ShapeKind::Sphere { radius: ra }, ShapeKind::Sphere { radius: rb }) => {
                sphere_sphere(out, xa, *ra, xb, *rb);
                false
            }
            (ShapeKind::Sphere { radius }, ShapeKind::Plane) => {
                sphere_plane(out, xa, *radius, xb, qb);
                false
            }
            (ShapeKind::Sphere { radius }, ShapeKind::Box(bx)) => {
                sphere_convex(out, xa, *radius, bx.convex(), xb, qb);
                false
            }
            (ShapeKind::Sphere { radius }, ShapeKind::ConvexPolyhedron(hull)) => {
                sphere_convex(out, xa, *radius, hull, xb, qb);
                false
            }
            (ShapeKind::Sphere { radius }, ShapeKind::Particle) => {
                sphere_particle(out, xa, *radius, xb);
                false
            }
            (ShapeKind::Plane, ShapeKind::Box(bx)) => {
                plane_convex(out, xa, qa, bx.convex(), xb, qb, self.config.contact_margin);
                true
            }
            (ShapeKind::Plane, ShapeKind::ConvexPolyhedron(hull)) => {
                plane_convex(out, xa, qa, hull, xb, qb, self.config.contact_margin);
                true
            }
            (ShapeKind::Plane, ShapeKind::Particle) => {
                plane_particle(out, xa, qa, xb);
                false
            }
            (
                ShapeKind::Box(_) | ShapeKind::ConvexPolyhedron(_),
                ShapeKind::Box(_) | ShapeKind::ConvexPolyhedron(_),
            ) => {
                if let (Some(ha), Some(hb)) = (a.shape.shape.hull(), b.shape.shape.hull()) {
                    convex_convex(out, ha, xa, qa, hb, xb, qb, &self.config);
                }
                true
            }
            (ShapeKind::Box(_) | ShapeKind::ConvexPolyhedron(_), ShapeKind::Particle) => {
                if let Some(hull) = a.shape.shape.hull() {
                    convex_particle(out, hull, xa, qa, xb);
                }
                false
            }
            // Plane-plane, particle-particle; other orders never reach here
            _ => {
                let key = (a.shape.shape.shape_type(), b.shape.shape.shape_type());
                if self.reported_unsupported.insert(key) {
                    debug!("No contact generation for {:?}-{:?} shape pairs", key.0, key.1);
                }
                false
            }
        }
    }

    fn create_equations(&mut self, a: &Placed<'_>, b: &Placed<'_>, reducible: bool, ctx: &NarrowphaseContext<'_>) {
        let (bi, bj) = (&ctx.bodies[a.body], &ctx.bodies[b.body]);
        let params = resolve_contact_params(a.shape, b.shape, bi, bj, ctx);
        let enabled = bi.collision_response
            && bj.collision_response
            && a.shape.shape.collision_response
            && b.shape.shape.collision_response;

        // Shape-center offsets to body-center offsets
        let offset_i = a.position - bi.position();
        let offset_j = b.position - bj.position();
        let reduce = reducible && self.config.enable_friction_reduction;

        let mut sum_ri = Vec3::ZERO;
        let mut sum_rj = Vec3::ZERO;
        let mut sum_ni = Vec3::ZERO;

        for k in 0..self.raw.len() {
            let RawContact { ri, rj, ni } = self.raw[k];
            let (ri, rj) = (ri + offset_i, rj + offset_j);

            let mut eq = Equation::contact(a.body, b.body, ri, rj, ni, params.restitution, a.shape.id, b.shape.id);
            eq.set_spook_params(params.contact_equation_stiffness, params.contact_equation_relaxation, ctx.dt);
            eq.enabled = enabled;
            self.contacts.push(eq);

            if reduce {
                sum_ri += ri;
                sum_rj += rj;
                sum_ni += ni;
            } else {
                self.push_friction_pair(a.body, b.body, ri, rj, ni, &params, enabled, ctx);
            }
        }

        if reduce {
            let n = self.raw.len() as f64;
            self.push_friction_pair(
                a.body,
                b.body,
                sum_ri / n,
                sum_rj / n,
                sum_ni.normalize(),
                &params,
                enabled,
                ctx,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_friction_pair(
        &mut self,
        i: usize,
        j: usize,
        ri: Vec3,
        rj: Vec3,
        ni: Vec3,
        params: &ContactParams,
        enabled: bool,
        ctx: &NarrowphaseContext<'_>,
    ) {
        if params.friction <= 0.0 {
            return;
        }
        let inv_mass_sum = ctx.bodies[i].inv_mass() + ctx.bodies[j].inv_mass();
        let reduced_mass = if inv_mass_sum > 0.0 { 1.0 / inv_mass_sum } else { 0.0 };
        let slip_force = params.friction * ctx.gravity.length() * reduced_mass;

        let (t1, t2) = ni.tangents();
        for t in [t1, t2] {
            let mut eq = Equation::friction(i, j, ri, rj, t, slip_force);
            eq.set_spook_params(params.friction_equation_stiffness, params.friction_equation_relaxation, ctx.dt);
            eq.enabled = enabled;
            self.frictions.push(eq);
        }
    }
}

/// Contact material of the shape materials, else of the body materials,
/// else the default; then overridden by the product of the two materials'
/// own coefficients where both are set
fn resolve_contact_params(
    sa: &BodyShape,
    sb: &BodyShape,
    ba: &Body,
    bb: &Body,
    ctx: &NarrowphaseContext<'_>,
) -> ContactParams {
    let lookup = |a: Option<MaterialId>, b: Option<MaterialId>| {
        a.zip(b).and_then(|(a, b)| ctx.contact_materials.get(a, b)).map(|cm| cm.params)
    };
    let mut params = lookup(sa.shape.material, sb.shape.material)
        .or_else(|| lookup(ba.material, bb.material))
        .unwrap_or(ctx.default_contact);

    let material = |id: Option<MaterialId>| id.and_then(|id| ctx.materials.get(id.0 as usize));
    if let (Some(ma), Some(mb)) = (material(sa.shape.material.or(ba.material)), material(sb.shape.material.or(bb.material))) {
        if let Some(friction) = ma.combined_friction(mb) {
            params.friction = friction;
        }
        if let Some(restitution) = ma.combined_restitution(mb) {
            params.restitution = restitution;
        }
    }
    params
}

/// Public view of a contact row
pub(crate) fn contact_point(eq: &Equation, bodies: &[Body]) -> Option<ContactPoint> {
    let EquationKind::Contact { ri, rj, ni, shape_i, shape_j, .. } = eq.kind else {
        return None;
    };
    let bi = &bodies[eq.body_i];
    let bj = &bodies[eq.body_j];
    let point_i = bi.position() + ri;
    let point_j = bj.position() + rj;
    Some(ContactPoint {
        body_a: bi.id(),
        shape_a: shape_i,
        body_b: bj.id(),
        shape_b: shape_j,
        point: point_j,
        normal: -ni,
        depth: -ni.dot(point_j - point_i),
        impact_velocity: eq.impact_velocity_along_normal(bodies),
    })
}

// ==================== Pair routines ====================

fn sphere_sphere(out: &mut Vec<RawContact>, xa: Vec3, ra: f64, xb: Vec3, rb: f64) {
    let d = xb - xa;
    let r = ra + rb;
    if d.length_squared() >= r * r {
        return;
    }
    let ni = if d.is_zero() { Vec3::Y } else { d.normalize() };
    out.push(RawContact { ri: ni * ra, rj: -ni * rb, ni });
}

fn sphere_plane(out: &mut Vec<RawContact>, xs: Vec3, radius: f64, xp: Vec3, qp: Quat) {
    let n = qp * Vec3::Z;
    let ni = -n;
    let plane_to_sphere = xs - xp;
    if plane_to_sphere.dot(n) > radius {
        return;
    }
    let ortho = ni * ni.dot(plane_to_sphere);
    out.push(RawContact { ri: ni * radius, rj: plane_to_sphere - ortho, ni });
}

/// Corner, then face, then edge test; at most one contact
fn sphere_convex(out: &mut Vec<RawContact>, xs: Vec3, radius: f64, hull: &ConvexPolyhedron, xc: Vec3, qc: Quat) {
    let r2 = radius * radius;

    for corner in hull.world_vertices(xc, qc) {
        let to_corner = corner - xs;
        if to_corner.length_squared() < r2 {
            let ni = to_corner.normalize();
            out.push(RawContact { ri: ni * radius, rj: corner - xc, ni });
            return;
        }
    }

    for (i, &local_normal) in hull.face_normals().iter().enumerate() {
        let normal = qc * local_normal;
        let face = hull.world_face(i, xc, qc);
        let v0 = face[0];

        let closest_on_sphere = xs - normal * radius;
        let penetration = (closest_on_sphere - v0).dot(normal);
        if penetration >= 0.0 || (xs - v0).dot(normal) <= 0.0 {
            continue;
        }

        if point_in_polygon(&face, normal, xs) {
            out.push(RawContact {
                ri: -normal * radius,
                rj: xs - xc - normal * radius - normal * penetration,
                ni: -normal,
            });
            return;
        }

        let n = face.len();
        for j in 0..n {
            let v1 = face[(j + 1) % n];
            let v2 = face[(j + 2) % n];
            let edge = v2 - v1;
            let edge_unit = edge.normalize();
            let along = (xs - v1).dot(edge_unit);
            if along > 0.0 && along * along < edge.length_squared() {
                let p = v1 + edge_unit * along;
                let to_p = p - xs;
                if to_p.length_squared() < r2 {
                    let ni = to_p.normalize();
                    out.push(RawContact { ri: ni * radius, rj: p - xc, ni });
                    return;
                }
            }
        }
    }
}

fn sphere_particle(out: &mut Vec<RawContact>, xs: Vec3, radius: f64, xp: Vec3) {
    let d = xp - xs;
    if d.length_squared() >= radius * radius {
        return;
    }
    let ni = if d.is_zero() { Vec3::Y } else { d.normalize() };
    out.push(RawContact { ri: ni * radius, rj: Vec3::ZERO, ni });
}

/// Every hull vertex below the plane, or within `margin` above it
fn plane_convex(
    out: &mut Vec<RawContact>,
    xp: Vec3,
    qp: Quat,
    hull: &ConvexPolyhedron,
    xc: Vec3,
    qc: Quat,
    margin: f64,
) {
    let n = qp * Vec3::Z;
    for v in hull.world_vertices(xc, qc) {
        let dot = n.dot(v - xp);
        if dot <= margin {
            let projected = v - n * dot;
            out.push(RawContact { ri: projected - xp, rj: v - xc, ni: n });
        }
    }
}

fn plane_particle(out: &mut Vec<RawContact>, xp: Vec3, qp: Quat, particle: Vec3) {
    let n = qp * Vec3::Z;
    let dot = n.dot(particle - xp);
    if dot <= 0.0 {
        let projected = particle - n * dot;
        out.push(RawContact { ri: projected - xp, rj: Vec3::ZERO, ni: n });
    }
}

#[allow(clippy::too_many_arguments)]
fn convex_convex(
    out: &mut Vec<RawContact>,
    ha: &ConvexPolyhedron,
    xa: Vec3,
    qa: Quat,
    hb: &ConvexPolyhedron,
    xb: Vec3,
    qb: Quat,
    config: &NarrowphaseConfig,
) {
    let margin = config.contact_margin;
    let Some(axis) = ha.find_separating_axis_within(hb, xa, qa, xb, qb, margin) else {
        return;
    };
    let points = ha.clip_against_hull(
        xa,
        qa,
        hb,
        xb,
        qb,
        axis,
        config.clip_min_dist,
        config.clip_max_dist,
        config.contact_epsilon.max(margin),
    );
    for p in points {
        out.push(RawContact {
            ri: p.point - p.normal * p.depth - xa,
            rj: p.point - xb,
            ni: -axis,
        });
    }
}

/// Particle inside the hull: push it out through the nearest face
fn convex_particle(out: &mut Vec<RawContact>, hull: &ConvexPolyhedron, xc: Vec3, qc: Quat, particle: Vec3) {
    let local = qc.conjugate() * (particle - xc);
    if !hull.point_is_inside(local) {
        return;
    }
    let mut nearest: Option<(f64, Vec3)> = None;
    for (face, &n) in hull.faces().iter().zip(hull.face_normals()) {
        let depth = -n.dot(local - hull.vertices()[face[0]]);
        if nearest.map_or(true, |(d, _)| depth.abs() < d.abs()) {
            nearest = Some((depth, n));
        }
    }
    if let Some((depth, local_normal)) = nearest {
        let n = qc * local_normal;
        out.push(RawContact { ri: particle + n * depth - xc, rj: Vec3::ZERO, ni: n });
    }
}
