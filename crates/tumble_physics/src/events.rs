//! Physics events (contacts, sleep transitions, body lifecycle)

use crossbeam_channel::{unbounded, Receiver, Sender};
use tumble_math::Vec3;

use crate::body::{BodyId, ShapeId};

/// Contact data from a collision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    pub body_a: BodyId,
    pub shape_a: ShapeId,
    pub body_b: BodyId,
    pub shape_b: ShapeId,
    /// Contact point on B, world space
    pub point: Vec3,
    /// Contact normal, pointing from B towards A
    pub normal: Vec3,
    /// Penetration depth; positive when overlapping
    pub depth: f64,
    /// Relative normal velocity at the contact; negative when approaching
    pub impact_velocity: f64,
}

/// Event emitted by the world during a step
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsEvent {
    BodyAdded { body: BodyId },
    BodyRemoved { body: BodyId },
    /// First step a body touches another; sent once for each body of the pair
    Collide { body: BodyId, other: BodyId, contact: ContactPoint },
    BeginContact { body_a: BodyId, body_b: BodyId },
    EndContact { body_a: BodyId, body_b: BodyId },
    BeginShapeContact { body_a: BodyId, shape_a: ShapeId, body_b: BodyId, shape_b: ShapeId },
    EndShapeContact { body_a: BodyId, shape_a: ShapeId, body_b: BodyId, shape_b: ShapeId },
    Sleepy { body: BodyId },
    Sleep { body: BodyId },
    WakeUp { body: BodyId },
}

impl PhysicsEvent {
    /// True for the sleep state transitions
    pub fn is_sleep_event(&self) -> bool {
        matches!(self, Self::Sleepy { .. } | Self::Sleep { .. } | Self::WakeUp { .. })
    }

    /// True if the event concerns `body`
    pub fn involves(&self, body: BodyId) -> bool {
        match *self {
            Self::BodyAdded { body: b }
            | Self::BodyRemoved { body: b }
            | Self::Sleepy { body: b }
            | Self::Sleep { body: b }
            | Self::WakeUp { body: b } => b == body,
            Self::Collide { body: b, other, .. } => b == body || other == body,
            Self::BeginContact { body_a, body_b }
            | Self::EndContact { body_a, body_b }
            | Self::BeginShapeContact { body_a, body_b, .. }
            | Self::EndShapeContact { body_a, body_b, .. } => body_a == body || body_b == body,
        }
    }
}

/// Events of the current step
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<PhysicsEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all collected events
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn push(&mut self, event: PhysicsEvent) {
        self.events.push(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhysicsEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// `Collide` events as `(body, other, contact)`
    pub fn collisions(&self) -> impl Iterator<Item = (BodyId, BodyId, &ContactPoint)> {
        self.events.iter().filter_map(|e| match e {
            PhysicsEvent::Collide { body, other, contact } => Some((*body, *other, contact)),
            _ => None,
        })
    }

    pub fn begin_contacts(&self) -> impl Iterator<Item = (BodyId, BodyId)> + '_ {
        self.events.iter().filter_map(|e| match *e {
            PhysicsEvent::BeginContact { body_a, body_b } => Some((body_a, body_b)),
            _ => None,
        })
    }

    pub fn end_contacts(&self) -> impl Iterator<Item = (BodyId, BodyId)> + '_ {
        self.events.iter().filter_map(|e| match *e {
            PhysicsEvent::EndContact { body_a, body_b } => Some((body_a, body_b)),
            _ => None,
        })
    }

    pub fn sleep_events(&self) -> impl Iterator<Item = &PhysicsEvent> {
        self.events.iter().filter(|e| e.is_sleep_event())
    }
}

/// Fans events out to the step collector and channel subscribers
#[derive(Debug, Default)]
pub(crate) struct EventBus {
    pub(crate) collector: EventCollector,
    subscribers: Vec<Sender<PhysicsEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<PhysicsEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: PhysicsEvent) {
        // Drop subscribers whose receiver is gone
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        self.collector.push(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
