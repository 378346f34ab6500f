//! Collision resolution for one moving body
//!
//! Every strategy shares the wall check and the contact rule; they differ
//! only in which bodies they test and in what order. The first body that
//! passes the contact test wins, there is no nearest-hit tie break.

use crate::bodies::{Body, BodyRef, BodyRegistry};
use crate::core::CollisionStrategy;
use crate::foundation::math::Vec2;
use crate::spatial::{SweepIndex, UniformGrid};

use super::contact::{Contact, ContactRule};

/// Read-only world view a resolver works against
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// All bodies at the start of the frame
    pub registry: &'a BodyRegistry,
    /// Cell membership matching `registry`
    pub grid: &'a UniformGrid,
    /// Blocking bodies sorted by x
    pub sweep: &'a SweepIndex,
    /// Walls and contact threshold
    pub rule: ContactRule,
}

/// Source of candidate bodies for the contact test
pub trait CollisionResolver: Send + Sync + std::fmt::Debug {
    /// First body touching `subject`, with the contact normal
    fn first_body_contact(&self, ctx: &ResolveContext<'_>, subject: BodyRef) -> Option<(BodyRef, Vec2)>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Owner cell, then the eight neighbouring cells
#[derive(Debug, Clone, Copy, Default)]
pub struct GridResolver;

impl CollisionResolver for GridResolver {
    fn first_body_contact(&self, ctx: &ResolveContext<'_>, subject: BodyRef) -> Option<(BodyRef, Vec2)> {
        let body = ctx.registry.body(subject);
        let owner = ctx.grid.cell_index_of(&body.position);
        let hit = first_touching(ctx, subject, body, ctx.grid.query_cell(owner).iter().copied());
        if hit.is_some() {
            return hit;
        }
        ctx.grid
            .neighbours(owner)
            .find_map(|cell| first_touching(ctx, subject, body, ctx.grid.query_cell(cell).iter().copied()))
    }

    fn name(&self) -> &'static str {
        "grid"
    }
}

/// Blocking bodies in the reachable x window, then every moving body
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepResolver;

impl CollisionResolver for SweepResolver {
    fn first_body_contact(&self, ctx: &ResolveContext<'_>, subject: BodyRef) -> Option<(BodyRef, Vec2)> {
        let body = ctx.registry.body(subject);
        let reach = ctx.rule.reach(body.radius + ctx.sweep.max_radius());
        let x = body.position.x;
        first_touching(ctx, subject, body, ctx.sweep.window(x - reach, x + reach))
            .or_else(|| first_touching(ctx, subject, body, moving_handles(ctx.registry)))
    }

    fn name(&self) -> &'static str {
        "sweep"
    }
}

/// Every blocking body, then every moving body
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceResolver;

impl CollisionResolver for BruteForceResolver {
    fn first_body_contact(&self, ctx: &ResolveContext<'_>, subject: BodyRef) -> Option<(BodyRef, Vec2)> {
        let body = ctx.registry.body(subject);
        first_touching(ctx, subject, body, ctx.registry.handles())
    }

    fn name(&self) -> &'static str {
        "brute_force"
    }
}

/// Resolver implementing `strategy`
pub fn resolver_for(strategy: CollisionStrategy) -> &'static dyn CollisionResolver {
    match strategy {
        CollisionStrategy::Grid => &GridResolver,
        CollisionStrategy::Sweep => &SweepResolver,
        CollisionStrategy::BruteForce => &BruteForceResolver,
    }
}

/// Determine what `subject` collides with this frame
///
/// Walls take precedence over bodies.
pub fn resolve(ctx: &ResolveContext<'_>, resolver: &dyn CollisionResolver, subject: BodyRef) -> Contact {
    if let Some(normal) = ctx.rule.wall(ctx.registry.body(subject)) {
        return Contact::Wall { normal };
    }
    resolver
        .first_body_contact(ctx, subject)
        .map_or(Contact::None, |(other, normal)| Contact::Body { other, normal })
}

fn first_touching(
    ctx: &ResolveContext<'_>,
    subject: BodyRef,
    body: &Body,
    candidates: impl IntoIterator<Item = BodyRef>,
) -> Option<(BodyRef, Vec2)> {
    candidates
        .into_iter()
        .filter(|&other| other != subject)
        .find_map(|other| ctx.rule.touching(body, ctx.registry.body(other)).map(|normal| (other, normal)))
}

fn moving_handles(registry: &BodyRegistry) -> impl Iterator<Item = BodyRef> {
    (0..registry.moving().len()).map(BodyRef::moving)
}
