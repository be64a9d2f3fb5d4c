//! Property-based tests for the trade state machine and settlement rules
//!
//! These verify the invariants that must hold for all inputs: a trade's
//! status moves out of pending at most once, approval swaps owners exactly,
//! and a payment row exists iff the trade was approved and the amount
//! matched its cash top-up.

use std::sync::Arc;

use proptest::prelude::*;

use car_barter::{
    error::TradeError,
    service::TradeService,
    store::TradeStore,
    trade::{Actor, Decision, Role, TradeStatus},
    vehicle::{Vehicle, VehicleAccess},
};

const U1: u64 = 10;
const U2: u64 = 20;

struct Fixture {
    service: TradeService,
    store: TradeStore,
}

// each case gets its own temporary db; sled cleans it up on drop
fn fixture() -> Fixture {
    let db = Arc::new(sled::Config::new().temporary(true).open().unwrap());
    let store = TradeStore::open(&db).unwrap();
    let service = TradeService::new(db).unwrap();
    for (vehicle_id, owner_id) in [(1, U1), (2, U2)] {
        service
            .registry()
            .register(&Vehicle {
                vehicle_id,
                owner_id,
                available: true,
                model: format!("model-{vehicle_id}"),
            })
            .unwrap();
    }
    Fixture { service, store }
}

fn target() -> Actor {
    Actor {
        id: U2,
        role: Role::Client,
    }
}

fn method_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("mpesa"), Just("bank_transfer"), Just("crypto")]
}

fn decision_strategy() -> impl Strategy<Value = Decision> {
    prop::bool::ANY.prop_map(|b| {
        if b {
            Decision::Approved
        } else {
            Decision::Rejected
        }
    })
}

proptest! {
    // every case opens a fresh database, keep the run bounded
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// A payment row exists after settlement iff the amount equals the
    /// trade's cash top-up exactly; any other amount is a mismatch with
    /// no partial effect.
    #[test]
    fn prop_settlement_records_exact_amounts_only(
        cash_top_up in 1u64..=10_000,
        amount in 1u64..=10_000,
        method in method_strategy(),
    ) {
        let f = fixture();
        let trade_id = f.service.propose(1, 2, cash_top_up, U1).unwrap();
        f.service.decide(&trade_id, Decision::Approved, target()).unwrap();

        let result = f.service.settle(&trade_id, amount, method, U1, None);
        let payments = f.store.payments().unwrap();

        if amount == cash_top_up {
            prop_assert!(result.is_ok());
            prop_assert_eq!(payments.len(), 1);
            prop_assert_eq!(payments[0].amount, cash_top_up);
        } else {
            // bound to a local: the condition doubles as prop_assert's
            // format string, and struct-pattern braces break it
            let mismatch = matches!(
                result,
                Err(TradeError::AmountMismatch { expected, got })
                    if expected == cash_top_up && got == amount
            );
            prop_assert!(mismatch, "expected AmountMismatch, got {:?}", result);
            prop_assert!(payments.is_empty());
        }
    }

    /// No payment can be recorded against a trade that is not approved,
    /// whatever the decision history.
    #[test]
    fn prop_payments_exist_only_for_approved_trades(
        decision in decision_strategy(),
        cash_top_up in 1u64..=10_000,
        method in method_strategy(),
    ) {
        let f = fixture();
        let trade_id = f.service.propose(1, 2, cash_top_up, U1).unwrap();
        f.service.decide(&trade_id, decision, target()).unwrap();

        let result = f.service.settle(&trade_id, cash_top_up, method, U2, None);

        match decision {
            Decision::Approved => prop_assert!(result.is_ok()),
            Decision::Rejected => {
                prop_assert!(matches!(result, Err(TradeError::NotApproved)));
                prop_assert!(f.store.payments().unwrap().is_empty());
            }
        }
    }

    /// The first decision wins and every later one fails with NotPending;
    /// the persisted status never moves again.
    #[test]
    fn prop_status_leaves_pending_at_most_once(
        decisions in prop::collection::vec(decision_strategy(), 1..5),
    ) {
        let f = fixture();
        let trade_id = f.service.propose(1, 2, 100, U1).unwrap();

        let mut outcomes = decisions.iter().map(|&d| (d, f.service.decide(&trade_id, d, target())));

        let (first, first_result) = outcomes.next().unwrap();
        prop_assert!(first_result.is_ok());
        let settled_status = match first {
            Decision::Approved => TradeStatus::Approved,
            Decision::Rejected => TradeStatus::Rejected,
        };

        for (_, later) in outcomes {
            prop_assert!(matches!(later, Err(TradeError::NotPending)));
        }

        prop_assert_eq!(f.service.trade(&trade_id).unwrap().status, settled_status);
    }

    /// Approval swaps the two owners exactly and takes both vehicles off
    /// the market, atomically with the status flip.
    #[test]
    fn prop_approval_swaps_owners_exactly(cash_top_up in 0u64..=10_000) {
        let f = fixture();
        let trade_id = f.service.propose(1, 2, cash_top_up, U1).unwrap();
        f.service.decide(&trade_id, Decision::Approved, target()).unwrap();

        let offered = f.service.registry().get(1).unwrap().unwrap();
        let wanted = f.service.registry().get(2).unwrap().unwrap();

        prop_assert_eq!(offered.owner_id, U2);
        prop_assert_eq!(wanted.owner_id, U1);
        prop_assert!(!offered.available);
        prop_assert!(!wanted.available);
        prop_assert_eq!(
            f.service.trade(&trade_id).unwrap().status,
            TradeStatus::Approved
        );
    }
}
