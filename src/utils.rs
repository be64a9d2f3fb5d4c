//! Identifier minting and record serialization helpers

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::TradeError;

pub(crate) fn to_cbor<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, TradeError> {
    minicbor::to_vec(value).map_err(TradeError::encode)
}

pub(crate) fn from_cbor<T: for<'a> minicbor::Decode<'a, ()>>(
    bytes: &[u8],
) -> Result<T, TradeError> {
    minicbor::decode(bytes).map_err(TradeError::decode)
}

// construct a unique uuid7 then encode using bech32 under the given prefix
fn mint_id(hrp: &str) -> Result<String, TradeError> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| TradeError::Codec(e.to_string()))?;
    let encoded = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| TradeError::Codec(e.to_string()))?;
    Ok(encoded)
}

/// Fresh trade identifier, e.g. `trade_1...`
pub fn new_trade_id() -> Result<String, TradeError> {
    mint_id("trade_")
}

/// Fresh payment identifier, e.g. `pay_1...`
pub fn new_payment_id() -> Result<String, TradeError> {
    mint_id("pay_")
}
