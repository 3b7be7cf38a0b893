//! Rust client for the community gate-key access-control API
//!
//! Turns logical operations (issue a room key, cancel a card, query access
//! records) into signed HTTP requests and normalizes the replies into typed
//! results or [`GateKeyError`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use gatekey_client::{ClientConfig, GateKeyClient, LinkRequest, ROOM_CARD_TYPE};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = GateKeyClient::new(ClientConfig::from_env()?)?;
//! client.set_community_no(1001);
//!
//! let link = client.get_link(&LinkRequest {
//!     mobile: "13800000000".into(),
//!     area_code: "021".into(),
//!     card_no: String::new(),
//!     card_type: ROOM_CARD_TYPE,
//! })?;
//! println!("{}", link);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod operations;
pub mod response;
pub mod signing;
pub mod time;
pub mod transport;
pub mod types;

// Re-export main types
pub use client::GateKeyClient;
pub use config::ClientConfig;
pub use crypto::LinkEncryptor;
pub use encoding::{canonical_encode, FieldMapping, FieldValue, OrderedFields};
pub use error::{GateKeyError, Result};
pub use operations::{PreparedRequest, RequestBuilder};
pub use response::Expectation;
pub use signing::BatchId;
pub use time::TimeNormalizer;
pub use transport::{HttpTransport, Transport, TransportConfig};
pub use types::*;
