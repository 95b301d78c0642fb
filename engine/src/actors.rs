//! Actor registry and role gates.
//!
//! Every mutating operation names the role it requires; [`ActorRegistry::require_role`]
//! is the single gate. Registration is append-only and roles are fixed at
//! registration time.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::errors::{EngineError, Result};
use crate::types::{Actor, ActorId, GeoPoint, Role};

pub struct ActorRegistry {
    actors: DashMap<ActorId, Actor>,
    next_id: AtomicU64,
}

impl Default for ActorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self {
            actors: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a new actor with a fixed role and optional position.
    pub fn register(
        &self,
        name: impl Into<String>,
        role: Role,
        location: Option<GeoPoint>,
        now: DateTime<Utc>,
    ) -> Actor {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let actor = Actor {
            id,
            name: name.into(),
            role,
            location,
            registered_at: now,
        };
        self.actors.insert(id, actor.clone());
        actor
    }

    pub fn get(&self, id: ActorId) -> Result<Actor> {
        self.actors
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::NotFound("actor", id))
    }

    pub fn role_of(&self, id: ActorId) -> Result<Role> {
        Ok(self.get(id)?.role)
    }

    /// Fail with [`EngineError::RoleMismatch`] unless `id` holds `required`.
    pub fn require_role(&self, id: ActorId, required: Role) -> Result<Actor> {
        let actor = self.get(id)?;
        if actor.role == required {
            Ok(actor)
        } else {
            Err(EngineError::RoleMismatch {
                actor: id,
                required,
            })
        }
    }

    /// Like [`Self::require_role`] but accepting any of the listed roles.
    pub fn require_any_role(&self, id: ActorId, allowed: &[Role]) -> Result<Actor> {
        let actor = self.get(id)?;
        if allowed.contains(&actor.role) {
            Ok(actor)
        } else {
            Err(EngineError::RoleMismatch {
                actor: id,
                required: allowed[0],
            })
        }
    }

    /// Great-circle distance between two registered actors, when both have a
    /// position on file.
    pub fn distance_between(&self, a: ActorId, b: ActorId) -> Option<f64> {
        let a = self.actors.get(&a)?.location?;
        let b = self.actors.get(&b)?.location?;
        Some(haversine_km(a, b))
    }
}

/// Haversine great-circle distance in kilometres.
fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
