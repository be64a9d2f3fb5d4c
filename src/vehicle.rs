//! Vehicle records and the access port the engine validates against
use crate::error::TradeError;
use crate::utils::{from_cbor, to_cbor};

/// The slice of a vehicle listing the engine cares about. `available` is
/// true iff the vehicle may be offered in a new proposal.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Vehicle {
    #[n(0)]
    pub vehicle_id: u64,
    #[n(1)]
    pub owner_id: u64,
    #[n(2)]
    pub available: bool,
    #[n(3)]
    pub model: String,
}

/// Result of a conditional ownership reassignment. `Conflict` signals the
/// vehicle no longer matched the expected owner, i.e. it was already
/// reassigned by someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassignOutcome {
    Done,
    Conflict,
    NotFound,
}

/// Thin capability the engine consumes to read a vehicle's owner and
/// availability and to reassign them conditionally. The listing CRUD
/// service owns the rest of the vehicle schema.
pub trait VehicleAccess {
    fn get(&self, vehicle_id: u64) -> Result<Option<Vehicle>, TradeError>;

    /// Reassign ownership only if the vehicle is still owned by
    /// `expected_owner_id`. Never partially applies.
    fn reassign(
        &self,
        vehicle_id: u64,
        expected_owner_id: u64,
        new_owner_id: u64,
        new_available: bool,
    ) -> Result<ReassignOutcome, TradeError>;
}

/// Sled-backed vehicle registry sharing the engine's database, which lets
/// trade approval coordinate vehicle mutations and the status flip under
/// one transactional scope.
pub struct VehicleRegistry {
    tree: sled::Tree,
}

impl VehicleRegistry {
    pub const TREE_NAME: &'static str = "vehicles";

    pub fn open(db: &sled::Db) -> Result<Self, TradeError> {
        Ok(Self {
            tree: db.open_tree(Self::TREE_NAME)?,
        })
    }

    pub fn key(vehicle_id: u64) -> [u8; 8] {
        vehicle_id.to_be_bytes()
    }

    /// Insert or replace a listing. Exposed for the listing collaborator
    /// and for test fixtures.
    pub fn register(&self, vehicle: &Vehicle) -> Result<(), TradeError> {
        self.tree
            .insert(Self::key(vehicle.vehicle_id), to_cbor(vehicle)?)?;
        Ok(())
    }

    pub(crate) fn tree(&self) -> &sled::Tree {
        &self.tree
    }
}

impl VehicleAccess for VehicleRegistry {
    fn get(&self, vehicle_id: u64) -> Result<Option<Vehicle>, TradeError> {
        match self.tree.get(Self::key(vehicle_id))? {
            Some(raw) => Ok(Some(from_cbor(&raw)?)),
            None => Ok(None),
        }
    }

    fn reassign(
        &self,
        vehicle_id: u64,
        expected_owner_id: u64,
        new_owner_id: u64,
        new_available: bool,
    ) -> Result<ReassignOutcome, TradeError> {
        let key = Self::key(vehicle_id);
        let Some(raw) = self.tree.get(key)? else {
            return Ok(ReassignOutcome::NotFound);
        };
        let current: Vehicle = from_cbor(&raw)?;
        if current.owner_id != expected_owner_id {
            return Ok(ReassignOutcome::Conflict);
        }

        let updated = Vehicle {
            owner_id: new_owner_id,
            available: new_available,
            ..current
        };
        // compare against the exact bytes we read so a concurrent writer
        // surfaces as a conflict instead of being overwritten
        match self
            .tree
            .compare_and_swap(key, Some(raw), Some(to_cbor(&updated)?))?
        {
            Ok(()) => Ok(ReassignOutcome::Done),
            Err(_) => Ok(ReassignOutcome::Conflict),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> VehicleRegistry {
        let db = sled::Config::new().temporary(true).open().unwrap();
        VehicleRegistry::open(&db).unwrap()
    }

    fn corolla(owner_id: u64) -> Vehicle {
        Vehicle {
            vehicle_id: 1,
            owner_id,
            available: true,
            model: "Toyota Corolla".into(),
        }
    }

    #[test]
    fn get_returns_registered_vehicle() {
        let reg = registry();
        reg.register(&corolla(10)).unwrap();

        let found = reg.get(1).unwrap().unwrap();
        assert_eq!(found.owner_id, 10);
        assert!(found.available);
    }

    #[test]
    fn get_unknown_vehicle_is_none() {
        let reg = registry();
        assert!(reg.get(404).unwrap().is_none());
    }

    #[test]
    fn reassign_moves_ownership_and_availability() {
        let reg = registry();
        reg.register(&corolla(10)).unwrap();

        let outcome = reg.reassign(1, 10, 20, false).unwrap();
        assert_eq!(outcome, ReassignOutcome::Done);

        let updated = reg.get(1).unwrap().unwrap();
        assert_eq!(updated.owner_id, 20);
        assert!(!updated.available);
        assert_eq!(updated.model, "Toyota Corolla");
    }

    #[test]
    fn reassign_with_wrong_expected_owner_conflicts() {
        let reg = registry();
        reg.register(&corolla(10)).unwrap();

        let outcome = reg.reassign(1, 99, 20, false).unwrap();
        assert_eq!(outcome, ReassignOutcome::Conflict);

        // untouched
        assert_eq!(reg.get(1).unwrap().unwrap().owner_id, 10);
    }

    #[test]
    fn reassign_unknown_vehicle_is_not_found() {
        let reg = registry();
        assert_eq!(
            reg.reassign(404, 10, 20, false).unwrap(),
            ReassignOutcome::NotFound
        );
    }
}
