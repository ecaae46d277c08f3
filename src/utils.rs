//! Identifier minting and serialization helpers

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::ApprovalError;

/// Human-readable prefixes for the entity kinds the engine persists.
/// Ids carry their kind, which keeps logs and error messages legible.
pub const DOCUMENT_HRP: &str = "doc_";
pub const USER_HRP: &str = "user_";
pub const ROUTE_HRP: &str = "route_";
pub const INSTANCE_HRP: &str = "apr_";

// construct a unique id then encode using bech32
pub fn mint_id(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

pub(crate) fn to_cbor<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, ApprovalError> {
    minicbor::to_vec(value).map_err(|e| ApprovalError::Encode(e.to_string()))
}
