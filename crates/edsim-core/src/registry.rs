//! Patient store backed by a `hecs` world.
//!
//! Patients are entities; ids are dense and ascending, so the id doubles as
//! an index into the entity table.

use hecs::{Component, Entity, World};

use crate::components::*;
use crate::source::Arrival;
use edsim_logic::resources::PatientId;

#[derive(Default)]
pub struct PatientRegistry {
    world: World,
    entities: Vec<Entity>,
}

impl PatientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a patient and hand out the next id.
    pub fn admit(&mut self, arrival: Arrival) -> PatientId {
        let id = PatientId(self.entities.len() as u64);
        let entity = self.world.spawn((
            Admission {
                id,
                arrived_at: arrival.at,
            },
            Presentation {
                record: arrival.record,
            },
            arrival.service_minutes,
            Journey::default(),
        ));
        self.entities.push(entity);
        id
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PatientId> {
        (0..self.entities.len() as u64).map(PatientId)
    }

    fn entity(&self, id: PatientId) -> Option<Entity> {
        self.entities.get(id.0 as usize).copied()
    }

    /// Copy of a component.
    pub fn get<T: Component + Clone>(&self, id: PatientId) -> Option<T> {
        let entity = self.entity(id)?;
        self.world.get::<&T>(entity).ok().map(|c| (*c).clone())
    }

    /// Run `f` against a component in place.
    pub fn update<T: Component, R>(&self, id: PatientId, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let entity = self.entity(id)?;
        let mut component = self.world.get::<&mut T>(entity).ok()?;
        Some(f(&mut component))
    }

    /// Attach a component. Returns false for an unknown id.
    pub fn insert<T: Component>(&mut self, id: PatientId, component: T) -> bool {
        match self.entity(id) {
            Some(entity) => self.world.insert_one(entity, component).is_ok(),
            None => false,
        }
    }

    /// Patients that carry component `T`, in id order.
    pub fn count_with<T: Component>(&self) -> usize {
        self.world.query::<&T>().iter().count()
    }
}
