//! Types for the gate-key client API

use reqwest::Url;
use std::fmt;
use std::num::NonZeroU32;

use crate::error::{GateKeyError, Result};
use crate::time::TimeNormalizer;

/// Default timezone for both community and operator
pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";

/// `cardType` for a key opening a single room
pub const ROOM_CARD_TYPE: u8 = 0;
/// `cardType` for a key opening every door on a floor
pub const FLOOR_CARD_TYPE: u8 = 1;
/// `cardType` for a key opening a whole building
pub const BUILDING_CARD_TYPE: u8 = 2;

// ==================== Client state ====================

/// Account credentials issued by the service
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    account_id: String,
    auth_token: String,
}

impl ClientIdentity {
    pub fn new(account_id: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        let account_id = account_id.into();
        let auth_token = auth_token.into();
        if account_id.trim().is_empty() {
            return Err(GateKeyError::Configuration("account id is empty".into()));
        }
        if auth_token.trim().is_empty() {
            return Err(GateKeyError::Configuration("auth token is empty".into()));
        }
        Ok(Self {
            account_id,
            auth_token,
        })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("account_id", &self.account_id)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// API and card host base URLs, each ending in `/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    api_host: Url,
    card_host: Url,
}

impl ServiceEndpoints {
    pub fn new(api_host: &str, card_host: &str) -> Result<Self> {
        Ok(Self {
            api_host: parse_host("api host", api_host)?,
            card_host: parse_host("card host", card_host)?,
        })
    }

    pub fn api_host(&self) -> &Url {
        &self.api_host
    }

    pub fn card_host(&self) -> &Url {
        &self.card_host
    }

    /// `{api_host}{suffix}` with the suffix appended verbatim
    pub fn api_url(&self, suffix: &str) -> String {
        format!("{}{}", self.api_host, suffix)
    }

    /// `{card_host}{suffix}` with the suffix appended verbatim
    pub fn card_url(&self, suffix: &str) -> String {
        format!("{}{}", self.card_host, suffix)
    }
}

fn parse_host(label: &str, raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| GateKeyError::Configuration(format!("invalid {} {:?}: {}", label, raw, e)))?;

    if url.cannot_be_a_base() || url.host_str().map_or(true, str::is_empty) {
        return Err(GateKeyError::Configuration(format!(
            "{} {:?} has no host",
            label, raw
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(GateKeyError::Configuration(format!(
            "{} {:?} must not carry a query or fragment",
            label, raw
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Community selection and timezones, mutable between calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityContext {
    community_id: Option<u32>,
    times: TimeNormalizer,
}

impl CommunityContext {
    pub fn new(community_timezone: &str, operator_timezone: &str) -> Result<Self> {
        Ok(Self {
            community_id: None,
            times: TimeNormalizer::new(community_timezone, operator_timezone)?,
        })
    }

    pub fn community_id(&self) -> Option<u32> {
        self.community_id
    }

    pub fn times(&self) -> &TimeNormalizer {
        &self.times
    }

    pub fn set_community_no(&mut self, community_id: u32) {
        self.community_id = Some(community_id);
    }

    pub fn set_community_timezone(&mut self, timezone: &str) -> Result<()> {
        self.times = TimeNormalizer::new(timezone, self.times.operator().name())?;
        Ok(())
    }

    pub fn set_operator_timezone(&mut self, timezone: &str) -> Result<()> {
        self.times = TimeNormalizer::new(self.times.community().name(), timezone)?;
        Ok(())
    }

    /// Snapshot for one call; fails if no community has been selected.
    pub fn resolve(&self) -> Result<OperationContext> {
        let community_id = self.community_id.ok_or_else(|| {
            GateKeyError::Configuration("community id is not set".into())
        })?;
        OperationContext::new(community_id, self.times)
    }
}

/// Immutable per-call context; always carries a non-zero community id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationContext {
    community_id: NonZeroU32,
    times: TimeNormalizer,
}

impl OperationContext {
    pub fn new(community_id: u32, times: TimeNormalizer) -> Result<Self> {
        let community_id = NonZeroU32::new(community_id)
            .ok_or_else(|| GateKeyError::Configuration("community id must be non-zero".into()))?;
        Ok(Self {
            community_id,
            times,
        })
    }

    pub fn community_id(&self) -> u32 {
        self.community_id.get()
    }

    pub fn times(&self) -> &TimeNormalizer {
        &self.times
    }
}

// ==================== Requests ====================

/// Request body as handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded`, pairs in send order
    Form(Vec<(String, String)>),
    /// `application/json`
    Json(serde_json::Value),
}

impl RequestBody {
    pub fn content_type(&self) -> &'static str {
        match self {
            RequestBody::Form(_) => "application/x-www-form-urlencoded",
            RequestBody::Json(_) => "application/json",
        }
    }

    /// Look up a field by name in either encoding
    pub fn field(&self, name: &str) -> Option<String> {
        match self {
            RequestBody::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            RequestBody::Json(value) => value.get(name).map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }
}

/// A fully signed POST, ready for the transport
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    pub url: String,
    /// `Authorization` header value, batch-signed requests only
    pub authorization: Option<String>,
    pub body: RequestBody,
}

/// Raw reply from the transport
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub http_status: u16,
    pub body: serde_json::Value,
}

// ==================== Operation parameters ====================

/// Scope of an issued key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Room,
    Floor,
    Building,
}

impl KeyKind {
    /// Wire `cardType` value
    pub fn card_type(self) -> u8 {
        match self {
            KeyKind::Room => ROOM_CARD_TYPE,
            KeyKind::Floor => FLOOR_CARD_TYPE,
            KeyKind::Building => BUILDING_CARD_TYPE,
        }
    }

    pub fn from_card_type(card_type: u8) -> Option<Self> {
        match card_type {
            ROOM_CARD_TYPE => Some(KeyKind::Room),
            FLOOR_CARD_TYPE => Some(KeyKind::Floor),
            BUILDING_CARD_TYPE => Some(KeyKind::Building),
            _ => None,
        }
    }
}

/// Selects one of the key-issuing presets over the shared builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyVariant {
    pub kind: KeyKind,
    /// Replacement for a card reported lost
    pub lost: bool,
    /// Return the Bluetooth cipher instead of a card number
    pub cipher: bool,
}

impl KeyVariant {
    pub const ROOM: KeyVariant = KeyVariant {
        kind: KeyKind::Room,
        lost: false,
        cipher: false,
    };
    pub const FLOOR: KeyVariant = KeyVariant {
        kind: KeyKind::Floor,
        lost: false,
        cipher: false,
    };
    pub const BUILDING: KeyVariant = KeyVariant {
        kind: KeyKind::Building,
        lost: false,
        cipher: false,
    };
    pub const ROOM_LOST: KeyVariant = KeyVariant {
        kind: KeyKind::Room,
        lost: true,
        cipher: false,
    };
    pub const ROOM_CIPHER: KeyVariant = KeyVariant {
        kind: KeyKind::Room,
        lost: false,
        cipher: true,
    };
}

/// Building / floor / room address inside a community
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomRef {
    pub building_no: u32,
    pub floor_no: u32,
    pub room_no: u32,
}

impl RoomRef {
    pub fn new(building_no: u32, floor_no: u32, room_no: u32) -> Self {
        Self {
            building_no,
            floor_no,
            room_no,
        }
    }
}

/// Parameters for issuing a key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRequest {
    pub room: RoomRef,
    /// Operator-local `YYMMDDHHmm`
    pub start_time: String,
    /// Operator-local `YYMMDDHHmm`
    pub end_time: String,
    pub mobile: String,
    pub area_code: String,
    /// Card being replaced; required for lost variants
    pub lost_card_no: Option<String>,
}

/// Parameters for an access link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkRequest {
    pub mobile: String,
    pub area_code: String,
    /// Empty for a link not bound to an existing card
    pub card_no: String,
    pub card_type: u8,
}

/// Rendering requested from `getCard`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardFormat {
    Share,
    Image,
    String,
    Cipher,
}

impl CardFormat {
    /// Wire `type` value
    pub fn wire_type(self) -> &'static str {
        match self {
            CardFormat::Share => "share",
            CardFormat::Image => "img",
            CardFormat::String => "str",
            CardFormat::Cipher => "cipher",
        }
    }

    /// Reply field carrying the rendering
    pub fn reply_field(self) -> &'static str {
        match self {
            CardFormat::Share | CardFormat::Image => "baseImg",
            CardFormat::String => "bleStr",
            CardFormat::Cipher => "cipher",
        }
    }
}

/// Whether a device card replaces a lost one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCardMode {
    Normal,
    /// Sends `isLost` = the creator email. The service has only been observed
    /// accepting this shape; keep it until the wire contract is confirmed.
    Lost,
}

/// Parameters for writing a physical card on a device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceCardRequest {
    pub mac: String,
    pub room: RoomRef,
    pub card_type: u8,
    /// Operator-local `YYMMDDHHmm`
    pub start_time: String,
    /// Operator-local `YYMMDDHHmm`
    pub end_time: String,
    pub creator_email: String,
}

/// Paged access-record query for one room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordsQuery {
    pub room: RoomRef,
    /// Operator-local `YYMMDDHHmm`, empty for unbounded
    pub start_time: String,
    /// Operator-local `YYMMDDHHmm`, empty for unbounded
    pub end_time: String,
    pub page: u32,
    pub page_size: u32,
}

impl Default for RecordsQuery {
    fn default() -> Self {
        Self {
            room: RoomRef::default(),
            start_time: String::new(),
            end_time: String::new(),
            page: 1,
            page_size: 20,
        }
    }
}
