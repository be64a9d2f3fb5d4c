//! Read-only projections over settled trades for reporting
//!
//! No mutation path and no authorization logic here; gating report access
//! to administrators is the boundary layer's job.
use std::collections::BTreeMap;

use crate::error::TradeError;
use crate::store::TradeStore;
use crate::trade::{PaymentStatus, TradeStatus};
use crate::vehicle::VehicleAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    MostTradedModels,
    ClientActivity,
    CashFlow,
}

impl ReportKind {
    /// Parse a report kind from its wire name, as the routing layer
    /// receives it.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "most_traded_models" => Some(Self::MostTradedModels),
            "client_activity" => Some(Self::ClientActivity),
            "cash_flow" => Some(Self::CashFlow),
            _ => None,
        }
    }
}

/// One aggregated row. `count` is the number of contributing records and
/// `amount` the cash volume in minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub key: String,
    pub count: u64,
    pub amount: u64,
}

pub fn generate(
    kind: ReportKind,
    store: &TradeStore,
    vehicles: &impl VehicleAccess,
) -> Result<Vec<ReportRow>, TradeError> {
    match kind {
        ReportKind::MostTradedModels => most_traded_models(store, vehicles),
        ReportKind::ClientActivity => client_activity(store),
        ReportKind::CashFlow => cash_flow(store),
    }
}

/// Approved-trade count per vehicle model; both sides of a trade count,
/// while the trade's cash is attributed to each involved model only once.
fn most_traded_models(
    store: &TradeStore,
    vehicles: &impl VehicleAccess,
) -> Result<Vec<ReportRow>, TradeError> {
    let mut rows: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    for trade in store.trades()? {
        if trade.status != TradeStatus::Approved {
            continue;
        }
        let offered_model = model_of(vehicles, trade.proposer_vehicle_id)?;
        let wanted_model = model_of(vehicles, trade.target_vehicle_id)?;

        rows.entry(offered_model.clone()).or_default().0 += 1;
        rows.entry(wanted_model.clone()).or_default().0 += 1;

        rows.entry(offered_model.clone()).or_default().1 += trade.cash_top_up;
        if wanted_model != offered_model {
            rows.entry(wanted_model).or_default().1 += trade.cash_top_up;
        }
    }
    Ok(sorted(rows))
}

fn model_of(vehicles: &impl VehicleAccess, vehicle_id: u64) -> Result<String, TradeError> {
    Ok(match vehicles.get(vehicle_id)? {
        Some(vehicle) => vehicle.model,
        None => "unknown".to_string(), // listing withdrawn after settlement
    })
}

/// Approved-trade count and cash volume per participating principal.
fn client_activity(store: &TradeStore) -> Result<Vec<ReportRow>, TradeError> {
    let mut rows: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    for trade in store.trades()? {
        if trade.status != TradeStatus::Approved {
            continue;
        }
        for user_id in [trade.proposer_user_id, trade.target_user_id] {
            let entry = rows.entry(user_id.to_string()).or_default();
            entry.0 += 1;
            entry.1 += trade.cash_top_up;
        }
    }
    Ok(sorted(rows))
}

/// Completed-payment count and amount per settlement channel.
fn cash_flow(store: &TradeStore) -> Result<Vec<ReportRow>, TradeError> {
    let mut rows: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    for payment in store.payments()? {
        if payment.status != PaymentStatus::Completed {
            continue;
        }
        let entry = rows.entry(payment.method.as_str().to_string()).or_default();
        entry.0 += 1;
        entry.1 += payment.amount;
    }
    Ok(sorted(rows))
}

// highest count first, key order breaking ties
fn sorted(rows: BTreeMap<String, (u64, u64)>) -> Vec<ReportRow> {
    let mut out: Vec<ReportRow> = rows
        .into_iter()
        .map(|(key, (count, amount))| ReportRow { key, count, amount })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    out
}
