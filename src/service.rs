//! Service layer API for the trade lifecycle and settlement workflow
use std::sync::Arc;

use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError, abort};

use crate::error::TradeError;
use crate::report::{self, ReportKind, ReportRow};
use crate::store::TradeStore;
use crate::trade::{
    Actor, Decision, Payment, PaymentMethod, PaymentStatus, TimeStamp, Trade, TradeStatus,
    can_decide, can_settle,
};
use crate::utils::{new_payment_id, new_trade_id};
use crate::vehicle::{Vehicle, VehicleAccess, VehicleRegistry};

/// The trade lifecycle engine. It is the only writer of trade status
/// transitions; vehicle mutation goes through the registry, under the
/// approval transaction.
pub struct TradeService {
    store: TradeStore,
    registry: VehicleRegistry,
}

impl TradeService {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, TradeError> {
        Ok(Self {
            store: TradeStore::open(&instance)?,
            registry: VehicleRegistry::open(&instance)?,
        })
    }

    /// Vehicle registry handle, for the listing collaborator and fixtures.
    pub fn registry(&self) -> &VehicleRegistry {
        &self.registry
    }

    /// Fetch a trade as currently persisted.
    pub fn trade(&self, trade_id: &str) -> Result<Trade, TradeError> {
        self.store
            .fetch(trade_id)?
            .ok_or(TradeError::InvalidReference("trade"))
    }

    /// Propose exchanging `proposer_vehicle_id` for `target_vehicle_id`,
    /// optionally topped up with cash. The target party is derived from
    /// the target vehicle's current owner. Vehicles are untouched until
    /// approval.
    pub fn propose(
        &self,
        proposer_vehicle_id: u64,
        target_vehicle_id: u64,
        cash_top_up: u64,
        proposer_user_id: u64,
    ) -> Result<String, TradeError> {
        let proposer_vehicle = self
            .registry
            .get(proposer_vehicle_id)?
            .ok_or(TradeError::InvalidReference("vehicle"))?;
        let target_vehicle = self
            .registry
            .get(target_vehicle_id)?
            .ok_or(TradeError::InvalidReference("vehicle"))?;

        if !proposer_vehicle.available {
            return Err(TradeError::NotAvailable(proposer_vehicle_id));
        }
        if !target_vehicle.available {
            return Err(TradeError::NotAvailable(target_vehicle_id));
        }
        if proposer_vehicle.owner_id != proposer_user_id {
            return Err(TradeError::NotOwner(proposer_vehicle_id));
        }

        let target_user_id = target_vehicle.owner_id;
        if proposer_user_id == target_user_id {
            return Err(TradeError::SelfTrade);
        }

        let trade = Trade {
            trade_id: new_trade_id()?,
            proposer_vehicle_id,
            target_vehicle_id,
            proposer_user_id,
            target_user_id,
            cash_top_up,
            status: TradeStatus::Pending,
            created_at: TimeStamp::new(),
        };
        self.store.create(&trade)?;

        Ok(trade.trade_id)
    }

    /// Approve or reject a pending trade. Only the target owner or an
    /// admin may decide. Approval swaps both vehicles' owners and marks
    /// them unavailable, atomically with the status flip.
    pub fn decide(
        &self,
        trade_id: &str,
        decision: Decision,
        actor: Actor,
    ) -> Result<(), TradeError> {
        let trade = self
            .store
            .fetch(trade_id)?
            .ok_or(TradeError::InvalidReference("trade"))?;

        if !can_decide(actor, &trade) {
            return Err(TradeError::Unauthorized);
        }
        if trade.status != TradeStatus::Pending {
            return Err(TradeError::NotPending);
        }

        match decision {
            Decision::Rejected => {
                self.store.transition(trade_id, TradeStatus::Rejected)?;
                Ok(())
            }
            Decision::Approved => self.approve(trade_id),
        }
    }

    /// The approval unit: status flip plus both reassignments commit
    /// together or not at all. Pending status and vehicle ownership are
    /// re-read inside the transaction, so of two racing decisions exactly
    /// one lands, and a trade whose vehicle was traded away by a different
    /// approval aborts as stale instead of re-swapping.
    fn approve(&self, trade_id: &str) -> Result<(), TradeError> {
        let result = (self.store.trades_tree(), self.registry.tree()).transaction(
            |(trades, vehicles)| {
                let raw = trades.get(trade_id.as_bytes())?.ok_or(
                    ConflictableTransactionError::Abort(TradeError::InvalidReference("trade")),
                )?;
                let current: Trade = decode_in_tx(&raw)?;
                if current.status != TradeStatus::Pending {
                    return abort(TradeError::NotPending);
                }

                let offered = fetch_vehicle_in_tx(vehicles, current.proposer_vehicle_id)?;
                let wanted = fetch_vehicle_in_tx(vehicles, current.target_vehicle_id)?;
                if offered.owner_id != current.proposer_user_id || !offered.available {
                    return abort(TradeError::StaleReference(current.proposer_vehicle_id));
                }
                if wanted.owner_id != current.target_user_id || !wanted.available {
                    return abort(TradeError::StaleReference(current.target_vehicle_id));
                }

                let approved = Trade {
                    status: TradeStatus::Approved,
                    ..current.clone()
                };
                trades.insert(trade_id.as_bytes(), encode_in_tx(&approved)?)?;

                let offered_key = VehicleRegistry::key(current.proposer_vehicle_id);
                vehicles.insert(
                    &offered_key[..],
                    encode_in_tx(&Vehicle {
                        owner_id: current.target_user_id,
                        available: false,
                        ..offered
                    })?,
                )?;
                let wanted_key = VehicleRegistry::key(current.target_vehicle_id);
                vehicles.insert(
                    &wanted_key[..],
                    encode_in_tx(&Vehicle {
                        owner_id: current.proposer_user_id,
                        available: false,
                        ..wanted
                    })?,
                )?;

                Ok(())
            },
        );

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(TradeError::Storage(err)),
        }
    }

    /// Record settlement of an approved trade's cash top-up. The trade is
    /// re-fetched here rather than trusted from the caller, so a stale
    /// view of its status cannot produce a payment for a rejected trade.
    pub fn settle(
        &self,
        trade_id: &str,
        amount: u64,
        method: &str,
        actor_user_id: u64,
        transaction_reference: Option<String>,
    ) -> Result<String, TradeError> {
        let trade = self
            .store
            .fetch(trade_id)?
            .ok_or(TradeError::InvalidReference("trade"))?;

        if trade.status != TradeStatus::Approved {
            return Err(TradeError::NotApproved);
        }
        if !can_settle(actor_user_id, &trade) {
            return Err(TradeError::Unauthorized);
        }
        if amount == 0 {
            return Err(TradeError::InvalidAmount);
        }
        let method = PaymentMethod::parse(method)?;
        if amount != trade.cash_top_up {
            return Err(TradeError::AmountMismatch {
                expected: trade.cash_top_up,
                got: amount,
            });
        }

        let payment = Payment {
            payment_id: new_payment_id()?,
            trade_id: trade.trade_id,
            amount,
            method,
            transaction_reference,
            status: PaymentStatus::Completed,
            created_at: TimeStamp::new(),
        };
        self.store.record_payment(&payment)?;

        Ok(payment.payment_id)
    }

    /// Read-only aggregation over persisted trades and payments.
    pub fn report(&self, kind: ReportKind) -> Result<Vec<ReportRow>, TradeError> {
        report::generate(kind, &self.store, &self.registry)
    }
}

fn decode_in_tx<T: for<'a> minicbor::Decode<'a, ()>>(
    raw: &sled::IVec,
) -> Result<T, ConflictableTransactionError<TradeError>> {
    minicbor::decode(raw)
        .map_err(|e| ConflictableTransactionError::Abort(TradeError::Codec(e.to_string())))
}

fn encode_in_tx<T: minicbor::Encode<()>>(
    value: &T,
) -> Result<Vec<u8>, ConflictableTransactionError<TradeError>> {
    minicbor::to_vec(value)
        .map_err(|e| ConflictableTransactionError::Abort(TradeError::Codec(e.to_string())))
}

fn fetch_vehicle_in_tx(
    vehicles: &sled::transaction::TransactionalTree,
    vehicle_id: u64,
) -> Result<Vehicle, ConflictableTransactionError<TradeError>> {
    let key = VehicleRegistry::key(vehicle_id);
    let raw = vehicles
        .get(&key[..])?
        .ok_or(ConflictableTransactionError::Abort(
            TradeError::InvalidReference("vehicle"),
        ))?;
    decode_in_tx(&raw)
}
