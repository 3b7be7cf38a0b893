//! Request signature schemes
//!
//! Each operation family authenticates differently:
//!
//! | Family    | Scheme          | Digest                                         |
//! |-----------|-----------------|------------------------------------------------|
//! | `Qrcode`  | batch           | `MD5(accountId + authToken + batch)`, upper hex |
//! | `Qrm`     | concatenation   | `MD5(values in order + authToken)`, lower hex   |
//! | `Records` | canonical query | `SHA1(canonical(fields + authToken))`, lower hex |
//!
//! All functions here are pure.

use base64::Engine;
use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use std::fmt;

use crate::encoding::{canonical_encode, FieldMapping, OrderedFields};
use crate::types::ClientIdentity;

/// Field excluded from the concatenation digest
pub const SIGNATURE_FIELD: &str = "sig";

/// Field injected into the canonical-query digest
pub const AUTH_TOKEN_FIELD: &str = "authToken";

/// Per-request `YYYYMMDDHHmmss` UTC nonce for the batch scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchId(String);

impl BatchId {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant.format("%Y%m%d%H%M%S").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `upper_hex(MD5(accountId + authToken + batch))`
pub fn batch_signature(identity: &ClientIdentity, batch: &BatchId) -> String {
    let message = format!("{}{}{}", identity.account_id(), identity.auth_token(), batch);
    hex::encode_upper(md5::compute(message.as_bytes()).0)
}

/// `Base64(accountId + ":" + batch)`, the `Authorization` header value
pub fn batch_auth_header(identity: &ClientIdentity, batch: &BatchId) -> String {
    base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", identity.account_id(), batch))
}

/// `lower_hex(MD5(values in insertion order + authToken))`, skipping `sig`
pub fn concat_signature(fields: &OrderedFields, auth_token: &str) -> String {
    let mut message: String = fields
        .iter()
        .filter(|(k, _)| *k != SIGNATURE_FIELD)
        .map(|(_, v)| v.to_string())
        .collect();
    message.push_str(auth_token);
    hex::encode(md5::compute(message.as_bytes()).0)
}

/// `lower_hex(SHA1(canonical_encode(fields ∪ {authToken})))`
pub fn canonical_query_signature(mapping: &FieldMapping, auth_token: &str) -> String {
    let signed = mapping.clone().with(AUTH_TOKEN_FIELD, auth_token);
    hex::encode(Sha1::digest(canonical_encode(&signed).as_bytes()))
}
