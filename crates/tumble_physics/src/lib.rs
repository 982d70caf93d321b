//! Tumble Physics - rigid-body dynamics core
//!
//! Iterative impulse-based rigid-body simulation with convex collision
//! detection and a projected Gauss-Seidel constraint solver.
//!
//! # Features
//!
//! - Rigid body dynamics (dynamic, static, kinematic)
//! - Spheres, planes, boxes, convex polyhedra and particles
//! - Separating-axis tests with face clipping for convex pairs
//! - SPOOK-stabilized contact and friction constraints
//! - Sleeping with contact-driven wake-up
//! - Ray casting, collision filtering and materials
//! - Contact and sleep events over channels
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                       World                          │
//! │  ┌──────────┐  ┌───────────┐  ┌───────────────────┐ │
//! │  │  Bodies  │  │ Materials │  │ Events / Raycasts │ │
//! │  └──────────┘  └───────────┘  └───────────────────┘ │
//! │  ┌─────────────────────────────────────────────────┐│
//! │  │                 internal step                    ││
//! │  │  broadphase → narrowphase → solver → integrate   ││
//! │  └─────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────┘
//!                          │
//!          ┌───────────────┼───────────────┐
//!          ▼               ▼               ▼
//!     ┌─────────┐    ┌──────────┐    ┌──────────┐
//!     │  Body   │    │ Equation │    │  Shape   │
//!     │ (state) │    │  (rows)  │    │ (convex) │
//!     └─────────┘    └──────────┘    └──────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use tumble_physics::prelude::*;
//!
//! let mut world = World::new(WorldConfig::default()).unwrap();
//!
//! world.add_body(
//!     BodyDesc::fixed()
//!         .with_quaternion(Quat::from_rotation_x(-std::f64::consts::FRAC_PI_2))
//!         .with_shape(Shape::plane()),
//! );
//! let crate_id = world.add_body(
//!     BodyDesc::dynamic(1.0)
//!         .with_position(0.0, 2.0, 0.0)
//!         .with_shape(Shape::cuboid(Vec3::splat(0.5))),
//! );
//!
//! for _ in 0..120 {
//!     world.step(1.0 / 60.0, None, None).unwrap();
//! }
//! assert!(world.body(crate_id).unwrap().position().y < 2.0);
//! ```

pub mod body;
pub mod broadphase;
pub mod collision_matrix;
pub mod config;
pub mod convex;
pub mod equation;
pub mod error;
pub mod events;
pub mod layers;
pub mod material;
pub mod narrowphase;
pub mod raycast;
pub mod shape;
pub mod solver;
pub mod world;

pub mod prelude {
    //! Common imports for physics functionality
    pub use crate::body::{Body, BodyDesc, BodyId, BodyShape, BodyType, ShapeId, SleepState};
    pub use crate::broadphase::{Broadphase, NaiveBroadphase};
    pub use crate::config::{BroadphaseMode, NarrowphaseConfig, SolverConfig, WorldConfig};
    pub use crate::convex::ConvexPolyhedron;
    pub use crate::error::{PhysicsError, Result};
    pub use crate::events::{ContactPoint, EventCollector, PhysicsEvent};
    pub use crate::layers::CollisionFilter;
    pub use crate::material::{ContactMaterial, ContactParams, Material, MaterialId};
    pub use crate::raycast::{RaycastHit, RaycastMode, RaycastOptions};
    pub use crate::shape::{BoxShape, Shape, ShapeKind, ShapeType};
    pub use crate::solver::{GsSolver, Solver};
    pub use crate::world::{Subsystem, World};
    pub use tumble_math::prelude::*;
}

pub use prelude::*;
