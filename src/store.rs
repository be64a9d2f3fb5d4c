//! Persistence for trade and payment records
//!
//! Trades and payments live in their own sled trees. Both tables are
//! append-mostly: a trade row changes exactly once, through the guarded
//! status transition below or the approval transaction in the service;
//! payment rows never change.
use crate::error::TradeError;
use crate::trade::{Payment, Trade, TradeStatus};
use crate::utils::{from_cbor, to_cbor};

pub struct TradeStore {
    trades: sled::Tree,
    payments: sled::Tree,
}

impl TradeStore {
    pub const TRADES_TREE: &'static str = "trades";
    pub const PAYMENTS_TREE: &'static str = "payments";

    pub fn open(db: &sled::Db) -> Result<Self, TradeError> {
        Ok(Self {
            trades: db.open_tree(Self::TRADES_TREE)?,
            payments: db.open_tree(Self::PAYMENTS_TREE)?,
        })
    }

    /// Persist a freshly proposed trade under its id.
    pub fn create(&self, trade: &Trade) -> Result<(), TradeError> {
        self.trades
            .insert(trade.trade_id.as_bytes(), to_cbor(trade)?)?;
        Ok(())
    }

    pub fn fetch(&self, trade_id: &str) -> Result<Option<Trade>, TradeError> {
        match self.trades.get(trade_id.as_bytes())? {
            Some(raw) => Ok(Some(from_cbor(&raw)?)),
            None => Ok(None),
        }
    }

    /// Move a pending trade into a terminal status. The swap is compared
    /// against the exact bytes read, so of two concurrent decisions
    /// exactly one lands and the other reports `NotPending`.
    pub fn transition(&self, trade_id: &str, to: TradeStatus) -> Result<Trade, TradeError> {
        let key = trade_id.as_bytes();
        let Some(raw) = self.trades.get(key)? else {
            return Err(TradeError::InvalidReference("trade"));
        };
        let current: Trade = from_cbor(&raw)?;
        if current.status != TradeStatus::Pending {
            return Err(TradeError::NotPending);
        }

        let updated = Trade {
            status: to,
            ..current
        };
        match self
            .trades
            .compare_and_swap(key, Some(raw), Some(to_cbor(&updated)?))?
        {
            Ok(()) => Ok(updated),
            Err(_) => Err(TradeError::NotPending),
        }
    }

    pub fn record_payment(&self, payment: &Payment) -> Result<(), TradeError> {
        self.payments
            .insert(payment.payment_id.as_bytes(), to_cbor(payment)?)?;
        Ok(())
    }

    /// All persisted trades, for the read model.
    pub fn trades(&self) -> Result<Vec<Trade>, TradeError> {
        let mut out = Vec::new();
        for entry in self.trades.iter() {
            let (_, raw) = entry?;
            out.push(from_cbor(&raw)?);
        }
        Ok(out)
    }

    /// All persisted payments, for the read model.
    pub fn payments(&self) -> Result<Vec<Payment>, TradeError> {
        let mut out = Vec::new();
        for entry in self.payments.iter() {
            let (_, raw) = entry?;
            out.push(from_cbor(&raw)?);
        }
        Ok(out)
    }

    pub(crate) fn trades_tree(&self) -> &sled::Tree {
        &self.trades
    }
}
