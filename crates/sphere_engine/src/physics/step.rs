//! Per-body frame update
//!
//! Resolves a moving body against the frozen start-of-frame world and
//! computes its next position and velocity. Damage and event logging happen
//! here as side effects on the shared presentation records; position and
//! velocity are returned, never written, so any number of bodies can be
//! stepped in parallel against the same world.

use std::ops::Range;

use crate::bodies::BodyRef;
use crate::events::{CollisionEvent, EventLog};
use crate::foundation::math::{reflect, Vec2};

use super::contact::Contact;
use super::resolver::{resolve, CollisionResolver, ResolveContext};

/// Per-frame constants for the step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    /// Seconds elapsed this frame
    pub dt: f32,
    /// Health lost per body contact
    pub damage: i32,
    /// Emit a collision event per body contact
    pub log_events: bool,
    /// Timestamp stamped on this frame's events
    pub timestamp: u64,
}

/// What happened to a body this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Integrated without contact
    Free,
    /// Bounced off a wall
    Wall,
    /// Bounced off another body
    Body(BodyRef),
}

/// New state of one moving body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Moving body slot
    pub slot: usize,
    /// Position at the end of the frame
    pub position: Vec2,
    /// Velocity at the end of the frame
    pub velocity: Vec2,
    /// Contact that shaped the outcome
    pub kind: StepKind,
}

/// Outcomes of a contiguous run of moving bodies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkOutcome {
    /// One outcome per body, in slot order
    pub outcomes: Vec<StepOutcome>,
    /// Wall bounces in the chunk
    pub wall_contacts: usize,
    /// Body contacts in the chunk
    pub body_contacts: usize,
}

/// Step one moving body
///
/// On a body contact the frame's displacement is undone (the body steps back
/// by `velocity * dt`) and the velocity is reflected about the contact
/// normal. Both participants take `damage`, whatever kind the other body
/// is. The event records health after the damage.
///
/// A wall contact bounces the same way, but only while the body still heads
/// into the wall, and costs no health.
pub fn step_body(
    ctx: &ResolveContext<'_>,
    resolver: &dyn CollisionResolver,
    slot: usize,
    params: &StepParams,
    events: &mut Vec<CollisionEvent>,
) -> StepOutcome {
    let subject = BodyRef::moving(slot);
    let body = ctx.registry.body(subject);
    let bounce = |normal: &Vec2| (body.position - body.velocity * params.dt, reflect(&body.velocity, normal));

    let (position, velocity, kind) = match resolve(ctx, resolver, subject) {
        Contact::None => (body.advanced(params.dt), body.velocity, StepKind::Free),
        Contact::Wall { normal } if body.velocity.dot(&normal) > 0.0 => {
            let (position, velocity) = bounce(&normal);
            (position, velocity, StepKind::Wall)
        }
        Contact::Wall { .. } => (body.advanced(params.dt), body.velocity, StepKind::Free),
        Contact::Body { other, normal } => {
            let (position, velocity) = bounce(&normal);
            apply_damage(ctx, subject, other, params, events);
            (position, velocity, StepKind::Body(other))
        }
    };

    StepOutcome {
        slot,
        position,
        velocity,
        kind,
    }
}

/// Step every moving body in `range`, in slot order
///
/// Events are gathered locally and appended to `log` in one batch.
pub fn step_range(
    ctx: &ResolveContext<'_>,
    resolver: &dyn CollisionResolver,
    range: Range<usize>,
    params: &StepParams,
    log: Option<&EventLog>,
) -> ChunkOutcome {
    let mut events = Vec::new();
    let mut chunk = ChunkOutcome {
        outcomes: Vec::with_capacity(range.len()),
        ..ChunkOutcome::default()
    };
    for slot in range {
        let outcome = step_body(ctx, resolver, slot, params, &mut events);
        match outcome.kind {
            StepKind::Free => {}
            StepKind::Wall => chunk.wall_contacts += 1,
            StepKind::Body(_) => chunk.body_contacts += 1,
        }
        chunk.outcomes.push(outcome);
    }
    if let Some(log) = log {
        if !events.is_empty() {
            log.extend(events);
        }
    }
    chunk
}

fn apply_damage(
    ctx: &ResolveContext<'_>,
    subject: BodyRef,
    other: BodyRef,
    params: &StepParams,
    events: &mut Vec<CollisionEvent>,
) {
    let own = ctx.registry.info(subject);
    let theirs = ctx.registry.info(other);
    let own_health = own.health.damage(params.damage);
    let their_health = theirs.health.damage(params.damage);
    if params.log_events {
        events.push(CollisionEvent::new(
            params.timestamp,
            (own.name.as_str(), own_health),
            (theirs.name.as_str(), their_health),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::{Body, BodyRegistry, Presentation};
    use crate::core::BoundaryMode;
    use crate::foundation::math::Vec3;
    use crate::physics::contact::ContactRule;
    use crate::physics::resolver::GridResolver;
    use crate::spatial::{GridLayout, SweepIndex, UniformGrid};
    use approx::assert_relative_eq;

    fn params() -> StepParams {
        StepParams {
            dt: 0.5,
            damage: 20,
            log_events: true,
            timestamp: 42,
        }
    }

    fn world(blocking: &[(Vec2, f32)], moving: &[(Vec2, Vec2, f32)]) -> (BodyRegistry, UniformGrid, SweepIndex) {
        let mut registry = BodyRegistry::new();
        for (i, &(p, r)) in blocking.iter().enumerate() {
            registry.push_blocking(Body::stationary(p, r), Presentation::new(format!("-{i}"), Vec3::zeros(), 100));
        }
        for (i, &(p, v, r)) in moving.iter().enumerate() {
            registry.push_moving(Body::new(p, v, r), Presentation::new(i.to_string(), Vec3::zeros(), 100));
        }
        let grid = UniformGrid::populated(GridLayout::new(20, 2000.0, BoundaryMode::Clamp), &registry);
        let sweep = SweepIndex::build(&registry);
        (registry, grid, sweep)
    }

    fn ctx<'a>(registry: &'a BodyRegistry, grid: &'a UniformGrid, sweep: &'a SweepIndex) -> ResolveContext<'a> {
        ResolveContext {
            registry,
            grid,
            sweep,
            rule: ContactRule::new(2000.0, 100.0),
        }
    }

    #[test]
    fn test_free_body_integrates() {
        let (registry, grid, sweep) = world(&[], &[(Vec2::new(10.0, 10.0), Vec2::new(2.0, -4.0), 1.0)]);
        let mut events = Vec::new();
        let outcome = step_body(&ctx(&registry, &grid, &sweep), &GridResolver, 0, &params(), &mut events);
        assert_eq!(outcome.kind, StepKind::Free);
        assert_relative_eq!(outcome.position, Vec2::new(11.0, 8.0));
        assert_eq!(outcome.velocity, Vec2::new(2.0, -4.0));
        assert!(events.is_empty());
    }

    #[test]
    fn test_blocker_contact_reflects_and_damages_both() {
        let (registry, grid, sweep) = world(
            &[(Vec2::new(3.0, 0.0), 1.0)],
            &[(Vec2::zeros(), Vec2::new(1.0, 0.0), 1.0)],
        );
        let mut events = Vec::new();
        let outcome = step_body(&ctx(&registry, &grid, &sweep), &GridResolver, 0, &params(), &mut events);

        assert_eq!(outcome.kind, StepKind::Body(BodyRef::blocking(0)));
        assert_relative_eq!(outcome.position, Vec2::new(-0.5, 0.0));
        assert_relative_eq!(outcome.velocity, Vec2::new(-1.0, 0.0));
        assert_eq!(registry.moving_info()[0].health.get(), 80);
        assert_eq!(registry.blocking_info()[0].health.get(), 80);
        assert_eq!(events, vec![CollisionEvent::new(42, ("0", 80), ("-0", 80))]);
    }

    #[test]
    fn test_moving_contact_damages_both() {
        let (registry, grid, sweep) = world(&[], &[
            (Vec2::zeros(), Vec2::new(1.0, 0.0), 1.0),
            (Vec2::new(1.0, 0.0), Vec2::new(-1.0, 0.0), 1.0),
        ]);
        let mut events = Vec::new();
        step_body(&ctx(&registry, &grid, &sweep), &GridResolver, 0, &params(), &mut events);
        assert_eq!(registry.moving_info()[0].health.get(), 80);
        assert_eq!(registry.moving_info()[1].health.get(), 80);
        assert_eq!(events[0].to_string(), "[42] Collision: 0, Health : 80 with 1, Health : 80");
    }

    #[test]
    fn test_hit_body_loses_health_when_it_hits_something_else() {
        // 1 reaches 0 first (blockers come first in the cell); 0 only reaches 1
        let (registry, grid, sweep) = world(
            &[(Vec2::new(30.0, 0.0), 1.0)],
            &[(Vec2::zeros(), Vec2::zeros(), 1.0), (Vec2::new(15.0, 0.0), Vec2::zeros(), 1.0)],
        );
        let log = EventLog::new();
        step_range(&ctx(&registry, &grid, &sweep), &GridResolver, 0..2, &params(), Some(&log));

        assert_eq!(registry.moving_info()[0].health.get(), 80);
        assert_eq!(registry.moving_info()[1].health.get(), 60);
        assert_eq!(registry.blocking_info()[0].health.get(), 80);
        let lines: Vec<String> = log.drain().iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "[42] Collision: 0, Health : 80 with 1, Health : 80".to_owned(),
                "[42] Collision: 1, Health : 60 with -0, Health : 80".to_owned(),
            ]
        );
    }

    #[test]
    fn test_wall_bounce_only_when_heading_out() {
        let (registry, grid, sweep) = world(&[], &[
            (Vec2::new(2000.0, 0.0), Vec2::new(1.0, 0.5), 1.0),
            (Vec2::new(2000.0, 0.0), Vec2::new(-1.0, 0.5), 1.0),
        ]);
        let ctx = ctx(&registry, &grid, &sweep);
        let mut events = Vec::new();

        let heading_out = step_body(&ctx, &GridResolver, 0, &params(), &mut events);
        assert_eq!(heading_out.kind, StepKind::Wall);
        assert_relative_eq!(heading_out.velocity, Vec2::new(-1.0, 0.5));
        assert_relative_eq!(heading_out.position, Vec2::new(1999.5, -0.25));

        let heading_in = step_body(&ctx, &GridResolver, 1, &params(), &mut events);
        assert_eq!(heading_in.kind, StepKind::Free);
        assert_relative_eq!(heading_in.position, Vec2::new(1999.5, 0.25));

        assert!(events.is_empty());
        assert_eq!(registry.moving_info()[0].health.get(), 100);
    }

    #[test]
    fn test_step_range_counts_and_logs() {
        let (registry, grid, sweep) = world(
            &[(Vec2::new(-500.0, -500.0), 1.0)],
            &[
                (Vec2::new(-501.0, -500.0), Vec2::new(1.0, 0.0), 1.0),
                (Vec2::new(700.0, 700.0), Vec2::new(1.0, 0.0), 1.0),
                (Vec2::new(-2000.0, 700.0), Vec2::new(-1.0, 0.0), 1.0),
            ],
        );
        let log = EventLog::new();
        let chunk = step_range(&ctx(&registry, &grid, &sweep), &GridResolver, 0..3, &params(), Some(&log));

        assert_eq!(chunk.outcomes.len(), 3);
        assert_eq!(chunk.outcomes.iter().map(|o| o.slot).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(chunk.body_contacts, 1);
        assert_eq!(chunk.wall_contacts, 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_logging_disabled_still_damages() {
        let (registry, grid, sweep) = world(&[(Vec2::new(1.0, 0.0), 1.0)], &[(Vec2::zeros(), Vec2::zeros(), 1.0)]);
        let quiet = StepParams {
            log_events: false,
            ..params()
        };
        let log = EventLog::new();
        step_range(&ctx(&registry, &grid, &sweep), &GridResolver, 0..1, &quiet, Some(&log));
        assert!(log.is_empty());
        assert_eq!(registry.blocking_info()[0].health.get(), 80);
    }
}
