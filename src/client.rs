//! Gate-key API client

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::crypto::LinkEncryptor;
use crate::error::Result;
use crate::operations::{PreparedRequest, RequestBuilder};
use crate::response;
use crate::signing::BatchId;
use crate::transport::{HttpTransport, Transport};
use crate::types::*;

/// Client for the gate-key access-control API
///
/// Operations take `&self` and may run concurrently. Community and timezone
/// setters take `&mut self`, so the context cannot change while a call is
/// in flight.
///
/// # Example
///
/// ```rust,no_run
/// use gatekey_client::{ClientConfig, GateKeyClient, KeyRequest, RoomRef};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut client = GateKeyClient::new(ClientConfig {
///     account_id: "acct".into(),
///     auth_token: "token".into(),
///     api_host: "https://api.example.com/".into(),
///     card_host: "https://card.example.com/".into(),
///     public_key_pem: Some(std::fs::read_to_string("link_public_key.pem")?),
///     ..Default::default()
/// })?;
/// client.set_community_no(1001);
///
/// let card_no = client
///     .create_room_key(&KeyRequest {
///         room: RoomRef::new(3, 12, 1201),
///         start_time: "2401010800".into(),
///         end_time: "2401312000".into(),
///         mobile: "13800000000".into(),
///         area_code: "86".into(),
///         ..Default::default()
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct GateKeyClient<T = HttpTransport> {
    identity: ClientIdentity,
    endpoints: ServiceEndpoints,
    context: CommunityContext,
    encryptor: LinkEncryptor,
    transport: T,
}

impl GateKeyClient<HttpTransport> {
    /// Create a client over HTTP
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.transport)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> GateKeyClient<T> {
    /// Create a client over a custom transport
    ///
    /// Fails with an [`Encryption`](crate::GateKeyError::Encryption) error
    /// when no link public key is configured and none is bundled.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        let encryptor = match config.public_key_pem {
            Some(ref pem) => LinkEncryptor::from_pem(pem)?,
            None => LinkEncryptor::embedded()?,
        };

        Ok(Self {
            identity: config.identity()?,
            endpoints: config.endpoints()?,
            context: config.community_context()?,
            encryptor,
            transport,
        })
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    pub fn context(&self) -> &CommunityContext {
        &self.context
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ==================== Context ====================

    pub fn set_community_no(&mut self, community_id: u32) {
        self.context.set_community_no(community_id);
    }

    pub fn set_community_timezone(&mut self, timezone: &str) -> Result<()> {
        self.context.set_community_timezone(timezone)
    }

    pub fn set_operator_timezone(&mut self, timezone: &str) -> Result<()> {
        self.context.set_operator_timezone(timezone)
    }

    // ==================== Keys ====================

    /// Issue a key and return its card number (or cipher, in cipher mode)
    pub async fn issue_key(&self, variant: KeyVariant, request: &KeyRequest) -> Result<String> {
        let ctx = self.context.resolve()?;
        let prepared = self
            .builder()
            .issue_key(&ctx, variant, request, &BatchId::now())?;
        let expectation = prepared.expectation;
        let issued = response::validate_string(self.dispatch(prepared).await?, expectation)?;
        info!(kind = ?variant.kind, lost = variant.lost, cipher = variant.cipher, "key issued");
        Ok(issued)
    }

    pub async fn create_room_key(&self, request: &KeyRequest) -> Result<String> {
        self.issue_key(KeyVariant::ROOM, request).await
    }

    pub async fn create_floor_key(&self, request: &KeyRequest) -> Result<String> {
        self.issue_key(KeyVariant::FLOOR, request).await
    }

    pub async fn create_building_key(&self, request: &KeyRequest) -> Result<String> {
        self.issue_key(KeyVariant::BUILDING, request).await
    }

    /// Replace a lost room card; `request.lost_card_no` is required
    pub async fn create_room_lost_key(&self, request: &KeyRequest) -> Result<String> {
        self.issue_key(KeyVariant::ROOM_LOST, request).await
    }

    /// Issue a room key and return its Bluetooth cipher
    pub async fn generate_room_cipher(&self, request: &KeyRequest) -> Result<String> {
        self.issue_key(KeyVariant::ROOM_CIPHER, request).await
    }

    pub async fn report_card_lost(&self, card_no: &str) -> Result<()> {
        let ctx = self.context.resolve()?;
        let prepared = self.builder().report_lost(&ctx, card_no, &BatchId::now())?;
        self.execute(prepared).await?;
        Ok(())
    }

    /// Build an access link. No request is sent.
    pub fn get_link(&self, request: &LinkRequest) -> Result<String> {
        let ctx = self.context.resolve()?;
        let link = self.builder().access_link(
            &ctx,
            request,
            &self.encryptor,
            Utc::now().timestamp(),
        )?;
        debug!(card_type = request.card_type, "access link built");
        Ok(link)
    }

    // ==================== Cards ====================

    /// Fetch a card rendering by card number
    pub async fn get_card(&self, card_no: &str, format: CardFormat) -> Result<String> {
        let prepared = self.builder().get_card(card_no, format, &BatchId::now())?;
        let expectation = prepared.expectation;
        response::validate_string(self.dispatch(prepared).await?, expectation)
    }

    pub async fn get_share_card(&self, card_no: &str) -> Result<String> {
        self.get_card(card_no, CardFormat::Share).await
    }

    pub async fn get_card_image(&self, card_no: &str) -> Result<String> {
        self.get_card(card_no, CardFormat::Image).await
    }

    pub async fn get_card_string(&self, card_no: &str) -> Result<String> {
        self.get_card(card_no, CardFormat::String).await
    }

    pub async fn get_card_cipher(&self, card_no: &str) -> Result<String> {
        self.get_card(card_no, CardFormat::Cipher).await
    }

    pub async fn cancel_card(&self, card_no: &str) -> Result<()> {
        let ctx = self.context.resolve()?;
        let prepared = self.builder().cancel_card(&ctx, card_no, &BatchId::now())?;
        self.execute(prepared).await?;
        Ok(())
    }

    pub async fn room_card_info(&self, room: RoomRef) -> Result<Value> {
        let ctx = self.context.resolve()?;
        let prepared = self.builder().room_card_info(&ctx, room, &BatchId::now())?;
        self.execute(prepared).await
    }

    // ==================== Devices ====================

    pub async fn device_mac_list(&self) -> Result<Value> {
        let ctx = self.context.resolve()?;
        let prepared = self.builder().mac_list(&ctx)?;
        self.execute(prepared).await
    }

    pub async fn make_card(&self, request: &DeviceCardRequest) -> Result<()> {
        let ctx = self.context.resolve()?;
        let prepared = self
            .builder()
            .make_device_card(&ctx, DeviceCardMode::Normal, request)?;
        self.execute(prepared).await?;
        Ok(())
    }

    pub async fn make_lost_card(&self, request: &DeviceCardRequest) -> Result<()> {
        let ctx = self.context.resolve()?;
        let prepared = self
            .builder()
            .make_device_card(&ctx, DeviceCardMode::Lost, request)?;
        self.execute(prepared).await?;
        Ok(())
    }

    /// Read the card on a device; `Value::Null` when the reply has no data
    pub async fn read_card(&self, mac: &str) -> Result<Value> {
        let ctx = self.context.resolve()?;
        let prepared = self.builder().read_device_card(&ctx, mac)?;
        self.execute(prepared).await
    }

    pub async fn cancel_device_card(&self, mac: &str, card_no: &str) -> Result<()> {
        let ctx = self.context.resolve()?;
        let prepared = self.builder().cancel_device_card(&ctx, mac, card_no)?;
        self.execute(prepared).await?;
        Ok(())
    }

    // ==================== Records ====================

    pub async fn records_by_room(&self, query: &RecordsQuery) -> Result<Value> {
        let ctx = self.context.resolve()?;
        let prepared = self.builder().records_by_room(&ctx, query)?;
        self.execute(prepared).await
    }

    pub async fn fetch_room_info(&self, room: RoomRef) -> Result<Value> {
        let ctx = self.context.resolve()?;
        let prepared = self.builder().fetch_room_info(&ctx, room)?;
        self.execute(prepared).await
    }

    pub async fn box_info(&self, mac: &str) -> Result<Value> {
        let ctx = self.context.resolve()?;
        let prepared = self.builder().box_info(&ctx, mac)?;
        self.execute(prepared).await
    }

    // ==================== Helper Methods ====================

    fn builder(&self) -> RequestBuilder<'_> {
        RequestBuilder::new(&self.identity, &self.endpoints)
    }

    async fn dispatch(&self, prepared: PreparedRequest) -> Result<Reply> {
        debug!(operation = prepared.operation, "sending request");
        self.transport.send(prepared.request).await
    }

    async fn execute(&self, prepared: PreparedRequest) -> Result<Value> {
        let expectation = prepared.expectation;
        response::validate(self.dispatch(prepared).await?, expectation)
    }
}

impl<T> std::fmt::Debug for GateKeyClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateKeyClient")
            .field("identity", &self.identity)
            .field("api_host", &self.endpoints.api_host().as_str())
            .field("community_id", &self.context.community_id())
            .finish()
    }
}
