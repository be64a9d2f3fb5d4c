#[derive(thiserror::Error, Debug)]
pub enum TradeError {
    #[error("unknown {0} id")]
    InvalidReference(&'static str),
    #[error("vehicle {0} is not available for trade")]
    NotAvailable(u64),
    #[error("caller does not own vehicle {0}")]
    NotOwner(u64),
    #[error("proposer and target owner are the same principal")]
    SelfTrade,
    #[error("actor is not permitted to perform this operation")]
    Unauthorized,
    #[error("trade is not pending")]
    NotPending,
    #[error("trade is not approved")]
    NotApproved,
    #[error("payment amount {got} does not match the trade's cash top-up {expected}")]
    AmountMismatch { expected: u64, got: u64 },
    #[error("payment amount must be positive")]
    InvalidAmount,
    #[error("unrecognised payment method: {0}")]
    InvalidMethod(String),
    #[error("vehicle {0} changed hands under a concurrent approval")]
    StaleReference(u64),
    #[error("storage failure")]
    Storage(#[from] sled::Error),
    #[error("codec failure: {0}")]
    Codec(String),
}

impl TradeError {
    pub(crate) fn decode(err: minicbor::decode::Error) -> Self {
        Self::Codec(err.to_string())
    }
    pub(crate) fn encode<E: std::fmt::Display>(err: minicbor::encode::Error<E>) -> Self {
        Self::Codec(err.to_string())
    }
}
