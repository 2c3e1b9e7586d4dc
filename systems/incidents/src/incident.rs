//! Incident records and their resource lifecycle.

use std::time::Duration;

use ambient_traffic_core::{
    EntityId, IncidentId, IncidentKind, IncidentSnapshot, StreetPoint, Vec3, WorldAdapter,
};
use tracing::{debug, warn};

/// One active ambient incident and the entities its scene owns.
#[derive(Debug)]
pub struct Incident {
    id: IncidentId,
    kind: IncidentKind,
    origin: StreetPoint,
    created: Duration,
    duration: Duration,
    affected_lanes: u8,
    pub(crate) vehicles: Vec<EntityId>,
    pub(crate) actors: Vec<EntityId>,
    pub(crate) props: Vec<EntityId>,
    pub(crate) marker: Option<EntityId>,
    released: bool,
}

impl Incident {
    pub(crate) fn new(
        id: IncidentId,
        kind: IncidentKind,
        origin: StreetPoint,
        created: Duration,
        affected_lanes: u8,
    ) -> Self {
        Self {
            id,
            kind,
            origin,
            created,
            duration: kind.duration(),
            affected_lanes,
            vehicles: Vec::new(),
            actors: Vec::new(),
            props: Vec::new(),
            marker: None,
            released: false,
        }
    }

    /// Identifier allocated by the scheduler.
    #[must_use]
    pub const fn id(&self) -> IncidentId {
        self.id
    }

    /// Kind of incident.
    #[must_use]
    pub const fn kind(&self) -> IncidentKind {
        self.kind
    }

    /// Street point the scene is anchored to.
    #[must_use]
    pub const fn origin(&self) -> StreetPoint {
        self.origin
    }

    /// Anchor position of the scene.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.origin.position
    }

    /// Session time at which the incident was created.
    #[must_use]
    pub const fn created(&self) -> Duration {
        self.created
    }

    /// Lifetime of the incident.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Session time from which the incident counts as expired.
    #[must_use]
    pub fn expires_at(&self) -> Duration {
        self.created.saturating_add(self.duration)
    }

    /// Number of lanes the scene blocks.
    #[must_use]
    pub const fn affected_lanes(&self) -> u8 {
        self.affected_lanes
    }

    /// Vehicles owned by the scene.
    #[must_use]
    pub fn vehicles(&self) -> &[EntityId] {
        &self.vehicles
    }

    /// Actors owned by the scene.
    #[must_use]
    pub fn actors(&self) -> &[EntityId] {
        &self.actors
    }

    /// Props owned by the scene.
    #[must_use]
    pub fn props(&self) -> &[EntityId] {
        &self.props
    }

    /// Map marker owned by the scene.
    #[must_use]
    pub const fn marker(&self) -> Option<EntityId> {
        self.marker
    }

    /// Reports whether the lifetime has fully elapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Duration) -> bool {
        now.saturating_sub(self.created) >= self.duration
    }

    /// Captures the read-only view consumed by reactive systems.
    #[must_use]
    pub fn snapshot(&self) -> IncidentSnapshot {
        IncidentSnapshot {
            id: self.id,
            kind: self.kind,
            position: self.origin.position,
            vehicles: self.vehicles.clone(),
        }
    }

    /// Runs per-kind behavior while the incident is still active.
    pub(crate) fn update(&mut self, _now: Duration) {
        // No kind has mid-life behavior yet; new behavior plugs in per arm.
        match self.kind {
            IncidentKind::Breakdown
            | IncidentKind::Delivery
            | IncidentKind::Construction
            | IncidentKind::PoliceStop
            | IncidentKind::ConvoyEscort => {}
        }
    }

    /// Deletes every owned entity exactly once and returns how many were removed.
    ///
    /// Handles the host already dropped are treated as cleaned up, and an entity
    /// the host refuses to delete is released so it still ages out. Calling this
    /// again after a release is a no-op.
    pub(crate) fn release<W>(&mut self, world: &mut W) -> usize
    where
        W: WorldAdapter + ?Sized,
    {
        if self.released {
            return 0;
        }
        self.released = true;

        let handles: Vec<EntityId> = self
            .actors
            .drain(..)
            .chain(self.vehicles.drain(..))
            .chain(self.props.drain(..))
            .chain(self.marker.take())
            .collect();

        let mut removed = 0;
        for handle in handles {
            match world.delete(handle) {
                Ok(()) => removed += 1,
                Err(error) if error.is_missing_entity() => {
                    debug!(incident = %self.id, entity = handle.get(), "entity already gone");
                }
                Err(error) => match world.release(handle) {
                    Ok(()) => {
                        debug!(incident = %self.id, entity = handle.get(), %error, "entity handed back instead of deleted");
                    }
                    Err(fallback) => {
                        warn!(incident = %self.id, entity = handle.get(), %error, %fallback, "entity could not be deleted or released");
                    }
                },
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incident(kind: IncidentKind, created_secs: u64) -> Incident {
        Incident::new(
            IncidentId::new(1),
            kind,
            StreetPoint::new(Vec3::ZERO, 0.0),
            Duration::from_secs(created_secs),
            1,
        )
    }

    #[test]
    fn expiry_is_inclusive_of_the_full_duration() {
        let incident = incident(IncidentKind::Breakdown, 60);
        let expires = Duration::from_secs(60 + 300);

        assert_eq!(incident.expires_at(), expires);
        assert!(!incident.is_expired(expires - Duration::from_millis(1)));
        assert!(incident.is_expired(expires));
    }

    #[test]
    fn clock_before_creation_never_expires() {
        let incident = incident(IncidentKind::Delivery, 600);
        assert!(!incident.is_expired(Duration::from_secs(10)));
    }

    #[test]
    fn snapshot_lists_owned_vehicles() {
        let mut incident = incident(IncidentKind::PoliceStop, 0);
        incident.vehicles.push(EntityId::new(4));
        incident.vehicles.push(EntityId::new(5));

        let snapshot = incident.snapshot();
        assert_eq!(snapshot.kind, IncidentKind::PoliceStop);
        assert_eq!(snapshot.vehicles, vec![EntityId::new(4), EntityId::new(5)]);
    }
}
