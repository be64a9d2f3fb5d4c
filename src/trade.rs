//! Core trade and payment record types
use chrono::{DateTime, TimeZone, Utc};

use crate::error::TradeError;

/// Lifecycle state of a trade. `Pending` is the only initial state;
/// `Approved` and `Rejected` are terminal.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

/// Outcome requested by the deciding party.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Dealer,
    Client,
}

/// An authenticated principal as handed over by the identity provider.
/// The engine trusts this pair and performs no credential logic itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: u64,
    pub role: Role,
}

/// A proposed or settled exchange of two vehicles plus an optional cash
/// differential. Amounts are in minor currency units.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    #[n(0)]
    pub trade_id: String, // uuid7, bech32 encoded
    #[n(1)]
    pub proposer_vehicle_id: u64,
    #[n(2)]
    pub target_vehicle_id: u64,
    #[n(3)]
    pub proposer_user_id: u64,
    #[n(4)]
    pub target_user_id: u64,
    #[n(5)]
    pub cash_top_up: u64,
    #[n(6)]
    pub status: TradeStatus,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    #[n(0)]
    Mpesa,
    #[n(1)]
    BankTransfer,
    #[n(2)]
    Crypto,
}

impl PaymentMethod {
    /// Parse a settlement channel from its wire name.
    pub fn parse(s: &str) -> Result<Self, TradeError> {
        match s {
            "mpesa" => Ok(Self::Mpesa),
            "bank_transfer" => Ok(Self::BankTransfer),
            "crypto" => Ok(Self::Crypto),
            other => Err(TradeError::InvalidMethod(other.to_string())),
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mpesa => "mpesa",
            Self::BankTransfer => "bank_transfer",
            Self::Crypto => "crypto",
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Completed,
    #[n(2)]
    Failed,
}

/// A recorded settlement of a trade's cash top-up. Immutable once written.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    #[n(0)]
    pub payment_id: String, // uuid7, bech32 encoded
    #[n(1)]
    pub trade_id: String,
    #[n(2)]
    pub amount: u64,
    #[n(3)]
    pub method: PaymentMethod,
    #[n(4)]
    pub transaction_reference: Option<String>, // e.g. M-Pesa id or bank reference
    #[n(5)]
    pub status: PaymentStatus,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

/// An admin or the target owner may decide a trade.
pub fn can_decide(actor: Actor, trade: &Trade) -> bool {
    actor.role == Role::Admin || actor.id == trade.target_user_id
}

/// Either party to the trade may settle its cash top-up.
pub fn can_settle(actor_user_id: u64, trade: &Trade) -> bool {
    actor_user_id == trade.proposer_user_id || actor_user_id == trade.target_user_id
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
