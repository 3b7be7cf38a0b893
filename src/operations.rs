//! Per-operation request builders
//!
//! Builders are pure: they validate arguments, normalize times, lay out the
//! wire fields, and sign. The result is a [`PreparedRequest`] pairing the
//! signed request with the [`Expectation`] its reply must meet. Nothing here
//! performs I/O, so every wire detail can be asserted directly.

use crate::crypto::LinkEncryptor;
use crate::encoding::{FieldMapping, FieldValue, OrderedFields};
use crate::error::{GateKeyError, Result};
use crate::response::Expectation;
use crate::signing::{
    batch_auth_header, batch_signature, canonical_query_signature, concat_signature, BatchId,
    SIGNATURE_FIELD,
};
use crate::time::truncate_to_hour;
use crate::types::*;

// ==================== Paths ====================

pub const ACTION_GET_LINK: &str = "getLink";
pub const ACTION_REPORT_LOST: &str = "reportLost";
pub const ACTION_GET_CARD: &str = "getCard";
pub const ACTION_CANCEL_CARD: &str = "cancelCard";
pub const ACTION_ROOM_CARD_INFO: &str = "getRoomCardInfo";

pub const PATH_MAC_LIST: &str = "Home/Qrm/getMacList";
pub const PATH_MAKE_ROOM_CARD: &str = "Home/Qrm/makeRoomCard";
pub const PATH_READ_CARD: &str = "Home/Qrm/readCard";
pub const PATH_CANCEL_DEVICE_CARD: &str = "Home/Qrm/cancelCard";

pub const PATH_RECORDS_BY_ROOM: &str = "Home/Records/queryByRoom";
pub const PATH_FETCH_ROOM_INFO: &str = "Home/Records/fetchRoomInfo";
pub const PATH_BOX_INFO: &str = "Home/Records/getBoxInfo";

/// Card-host path of the access-link landing page
pub const PATH_API_LOGIN: &str = "apiLogin/";

/// A signed request and the reply shape it expects
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    /// Action or path name, for logging
    pub operation: &'static str,
    pub request: SignedRequest,
    pub expectation: Expectation,
}

/// Builds signed requests for one identity and endpoint pair
#[derive(Debug, Clone, Copy)]
pub struct RequestBuilder<'a> {
    identity: &'a ClientIdentity,
    endpoints: &'a ServiceEndpoints,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(identity: &'a ClientIdentity, endpoints: &'a ServiceEndpoints) -> Self {
        Self {
            identity,
            endpoints,
        }
    }

    // ==================== Qrcode (batch signature) ====================

    /// Issue a room, floor, or building key, optionally as a lost-card
    /// replacement or as a Bluetooth cipher.
    pub fn issue_key(
        &self,
        ctx: &OperationContext,
        variant: KeyVariant,
        request: &KeyRequest,
        batch: &BatchId,
    ) -> Result<PreparedRequest> {
        require("mobile", &request.mobile)?;
        require("end time", &request.end_time)?;

        let lost_card_no = if variant.lost {
            let card_no = request.lost_card_no.as_deref().unwrap_or_default();
            require("lost card number", card_no)?;
            Some(card_no)
        } else {
            None
        };

        // Cipher keys only resolve to the hour
        let end_time = if variant.cipher {
            truncate_to_hour(&request.end_time)?
        } else {
            request.end_time.clone()
        };

        let times = ctx.times();
        let mut fields = FieldMapping::new()
            .with("communityNo", ctx.community_id())
            .with("buildingNo", request.room.building_no)
            .with("floorNo", request.room.floor_no)
            .with("roomNo", request.room.room_no)
            .with("cardType", variant.kind.card_type())
            .with("startTime", times.to_community_time(&request.start_time)?)
            .with("endTime", times.to_community_time(&end_time)?)
            .with("mobile", &request.mobile)
            .with("areaCode", &request.area_code);

        if let Some(card_no) = lost_card_no {
            fields.insert("isLost", true).insert("lostCardNo", card_no);
        }

        let expectation = if variant.cipher {
            fields.insert("type", CardFormat::Cipher.wire_type());
            Expectation::Field(CardFormat::Cipher.reply_field())
        } else {
            Expectation::Field("cardNo")
        };

        self.batch_request(ACTION_GET_LINK, &fields, batch, expectation)
    }

    /// Report a card lost; the reply carries no payload.
    pub fn report_lost(
        &self,
        ctx: &OperationContext,
        card_no: &str,
        batch: &BatchId,
    ) -> Result<PreparedRequest> {
        require("card number", card_no)?;
        let fields = FieldMapping::new()
            .with("communityNo", ctx.community_id())
            .with("cardNo", card_no);
        self.batch_request(ACTION_REPORT_LOST, &fields, batch, Expectation::Status)
    }

    /// Fetch a card rendering. Needs no community.
    pub fn get_card(
        &self,
        card_no: &str,
        format: CardFormat,
        batch: &BatchId,
    ) -> Result<PreparedRequest> {
        require("card number", card_no)?;
        let fields = FieldMapping::new()
            .with("cardNo", card_no)
            .with("type", format.wire_type());
        let expectation = Expectation::Field(format.reply_field());
        self.batch_request(ACTION_GET_CARD, &fields, batch, expectation)
    }

    pub fn cancel_card(
        &self,
        ctx: &OperationContext,
        card_no: &str,
        batch: &BatchId,
    ) -> Result<PreparedRequest> {
        require("card number", card_no)?;
        let fields = FieldMapping::new()
            .with("communityNo", ctx.community_id())
            .with("cardNo", card_no);
        self.batch_request(ACTION_CANCEL_CARD, &fields, batch, Expectation::Success)
    }

    pub fn room_card_info(
        &self,
        ctx: &OperationContext,
        room: RoomRef,
        batch: &BatchId,
    ) -> Result<PreparedRequest> {
        let fields = FieldMapping::new()
            .with("communityNo", ctx.community_id())
            .with("buildingNo", room.building_no)
            .with("floorNo", room.floor_no)
            .with("roomNo", room.room_no);
        self.batch_request(ACTION_ROOM_CARD_INFO, &fields, batch, Expectation::SuccessWithData)
    }

    // ==================== Access links (encryption) ====================

    /// Build `{card_host}apiLogin/?data=<url-encoded ciphertext>`.
    ///
    /// `timestamp` is unix seconds and lets the service expire stale links.
    pub fn access_link(
        &self,
        ctx: &OperationContext,
        request: &LinkRequest,
        encryptor: &LinkEncryptor,
        timestamp: i64,
    ) -> Result<String> {
        require("mobile", &request.mobile)?;
        if KeyKind::from_card_type(request.card_type).is_none() {
            return Err(GateKeyError::InvalidArgument(format!(
                "unknown card type {}",
                request.card_type
            )));
        }

        let fields = FieldMapping::new()
            .with("accountId", self.identity.account_id())
            .with("areaCode", &request.area_code)
            .with("cardNo", &request.card_no)
            .with("cardType", request.card_type)
            .with("communityNo", ctx.community_id())
            .with("mobile", &request.mobile)
            .with("timestamp", timestamp);

        let data = encryptor.encrypt_link(&fields)?;
        Ok(self.endpoints.card_url(&format!(
            "{}?data={}",
            PATH_API_LOGIN,
            urlencoding::encode(&data)
        )))
    }

    // ==================== Qrm (concatenation signature) ====================
    //
    // Field order below is part of the signature. Do not reorder.

    pub fn mac_list(&self, ctx: &OperationContext) -> Result<PreparedRequest> {
        let fields = OrderedFields::new()
            .with("accountId", self.identity.account_id())
            .with("communityNo", ctx.community_id());
        Ok(self.concat_request(PATH_MAC_LIST, fields, Expectation::Field("data")))
    }

    /// Write a physical card on a device.
    ///
    /// In [`DeviceCardMode::Lost`] the `isLost` field carries the creator
    /// email rather than a flag.
    pub fn make_device_card(
        &self,
        ctx: &OperationContext,
        mode: DeviceCardMode,
        request: &DeviceCardRequest,
    ) -> Result<PreparedRequest> {
        require("device mac", &request.mac)?;
        require("creator email", &request.creator_email)?;
        if KeyKind::from_card_type(request.card_type).is_none() {
            return Err(GateKeyError::InvalidArgument(format!(
                "unknown card type {}",
                request.card_type
            )));
        }

        let is_lost = match mode {
            DeviceCardMode::Normal => FieldValue::Flag(false),
            DeviceCardMode::Lost => FieldValue::from(&request.creator_email),
        };

        let times = ctx.times();
        let fields = OrderedFields::new()
            .with("accountId", self.identity.account_id())
            .with("communityNo", ctx.community_id())
            .with("mac", &request.mac)
            .with("buildingNo", request.room.building_no)
            .with("floorNo", request.room.floor_no)
            .with("roomNo", request.room.room_no)
            .with("cardType", request.card_type)
            .with("startTime", times.to_community_time(&request.start_time)?)
            .with("endTime", times.to_community_time(&request.end_time)?)
            .with("creatorEmail", &request.creator_email)
            .with("isLost", is_lost);

        Ok(self.concat_request(PATH_MAKE_ROOM_CARD, fields, Expectation::Success))
    }

    pub fn read_device_card(&self, ctx: &OperationContext, mac: &str) -> Result<PreparedRequest> {
        require("device mac", mac)?;
        let fields = OrderedFields::new()
            .with("accountId", self.identity.account_id())
            .with("communityNo", ctx.community_id())
            .with("mac", mac);
        Ok(self.concat_request(PATH_READ_CARD, fields, Expectation::Success))
    }

    pub fn cancel_device_card(
        &self,
        ctx: &OperationContext,
        mac: &str,
        card_no: &str,
    ) -> Result<PreparedRequest> {
        require("device mac", mac)?;
        require("card number", card_no)?;
        let fields = OrderedFields::new()
            .with("accountId", self.identity.account_id())
            .with("communityNo", ctx.community_id())
            .with("mac", mac)
            .with("cardNo", card_no);
        Ok(self.concat_request(PATH_CANCEL_DEVICE_CARD, fields, Expectation::Success))
    }

    // ==================== Records (canonical-query signature) ====================

    pub fn records_by_room(
        &self,
        ctx: &OperationContext,
        query: &RecordsQuery,
    ) -> Result<PreparedRequest> {
        if query.page == 0 || query.page_size == 0 {
            return Err(GateKeyError::InvalidArgument(
                "page and page size start at 1".into(),
            ));
        }

        let times = ctx.times();
        let fields = FieldMapping::new()
            .with("accountId", self.identity.account_id())
            .with("communityNo", ctx.community_id())
            .with("buildingNo", query.room.building_no)
            .with("floorNo", query.room.floor_no)
            .with("roomNo", query.room.room_no)
            .with("startTime", times.to_community_time(&query.start_time)?)
            .with("endTime", times.to_community_time(&query.end_time)?)
            .with("page", query.page)
            .with("pageSize", query.page_size);
        Ok(self.records_request(PATH_RECORDS_BY_ROOM, &fields))
    }

    pub fn fetch_room_info(
        &self,
        ctx: &OperationContext,
        room: RoomRef,
    ) -> Result<PreparedRequest> {
        let fields = FieldMapping::new()
            .with("accountId", self.identity.account_id())
            .with("communityNo", ctx.community_id())
            .with("buildingNo", room.building_no)
            .with("floorNo", room.floor_no)
            .with("roomNo", room.room_no);
        Ok(self.records_request(PATH_FETCH_ROOM_INFO, &fields))
    }

    pub fn box_info(&self, ctx: &OperationContext, mac: &str) -> Result<PreparedRequest> {
        require("device mac", mac)?;
        let fields = FieldMapping::new()
            .with("accountId", self.identity.account_id())
            .with("communityNo", ctx.community_id())
            .with("mac", mac);
        Ok(self.records_request(PATH_BOX_INFO, &fields))
    }

    // ==================== Helper Methods ====================

    fn batch_request(
        &self,
        action: &'static str,
        fields: &FieldMapping,
        batch: &BatchId,
        expectation: Expectation,
    ) -> Result<PreparedRequest> {
        let sig = batch_signature(self.identity, batch);
        Ok(PreparedRequest {
            operation: action,
            request: SignedRequest {
                url: self
                    .endpoints
                    .api_url(&format!("?c=Qrcode&a={}&sig={}", action, sig)),
                authorization: Some(batch_auth_header(self.identity, batch)),
                body: RequestBody::Json(serde_json::to_value(fields)?),
            },
            expectation,
        })
    }

    fn concat_request(
        &self,
        path: &'static str,
        mut fields: OrderedFields,
        expectation: Expectation,
    ) -> PreparedRequest {
        let sig = concat_signature(&fields, self.identity.auth_token());
        fields.push(SIGNATURE_FIELD, sig);
        PreparedRequest {
            operation: path,
            request: SignedRequest {
                url: self.endpoints.api_url(path),
                authorization: None,
                body: RequestBody::Form(fields.to_form_pairs()),
            },
            expectation,
        }
    }

    /// The auth token joins the digest only; it is never sent.
    fn records_request(&self, path: &'static str, fields: &FieldMapping) -> PreparedRequest {
        let sig = canonical_query_signature(fields, self.identity.auth_token());
        PreparedRequest {
            operation: path,
            request: SignedRequest {
                url: self.endpoints.api_url(&format!("{}?sig={}", path, sig)),
                authorization: None,
                body: RequestBody::Form(fields.to_form_pairs()),
            },
            expectation: Expectation::Field("data"),
        }
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GateKeyError::InvalidArgument(format!("{} is required", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_key;
    use crate::encoding::canonical_encode;
    use crate::time::TimeNormalizer;
    use chrono::{TimeZone, Utc};

    fn identity() -> ClientIdentity {
        ClientIdentity::new("A", "T").unwrap()
    }

    fn endpoints() -> ServiceEndpoints {
        ServiceEndpoints::new("https://api.example.com/", "https://card.example.com/")
            .unwrap()
    }

    fn ctx(community: &str, operator: &str) -> OperationContext {
        OperationContext::new(7, TimeNormalizer::new(community, operator).unwrap())
            .unwrap()
    }

    fn batch() -> BatchId {
        BatchId::at(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
    }

    fn key_request() -> KeyRequest {
        KeyRequest {
            room: RoomRef::new(3, 12, 1201),
            start_time: "2401010800".into(),
            end_time: "2401312045".into(),
            mobile: "13800000000".into(),
            area_code: "86".into(),
            lost_card_no: None,
        }
    }

    fn form_keys(request: &SignedRequest) -> Vec<String> {
        match &request.body {
            RequestBody::Form(pairs) => pairs.iter().map(|(k, _)| k.clone()).collect(),
            RequestBody::Json(_) => panic!("expected form body"),
        }
    }

    #[test]
    fn test_issue_room_key_wire_shape() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);

        let ctx = ctx("Asia/Shanghai", "Asia/Shanghai");
        let prepared = builder
            .issue_key(&ctx, KeyVariant::ROOM, &key_request(), &batch())
            .unwrap();

        assert_eq!(
            prepared.request.url,
            "https://api.example.com/?c=Qrcode&a=getLink&sig=2C40E3DC55AD07D8D580329923C72163"
        );
        assert_eq!(prepared.request.authorization.as_deref(), Some("QToyMDI0MDEwMTEyMDAwMA=="));
        assert_eq!(prepared.expectation, Expectation::Field("cardNo"));
        assert_eq!(
            prepared.request.body,
            RequestBody::Json(serde_json::json!({
                "communityNo": 7,
                "buildingNo": 3,
                "floorNo": 12,
                "roomNo": 1201,
                "cardType": 0,
                "startTime": "2401010800",
                "endTime": "2401312045",
                "mobile": "13800000000",
                "areaCode": "86",
            }))
        );
    }

    #[test]
    fn test_key_kinds_set_card_type() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);
        let ctx = ctx("UTC", "UTC");

        for (variant, expected) in [
            (KeyVariant::ROOM, "0"),
            (KeyVariant::FLOOR, "1"),
            (KeyVariant::BUILDING, "2"),
        ] {
            let prepared = builder
                .issue_key(&ctx, variant, &key_request(), &batch())
                .unwrap();
            assert_eq!(prepared.request.body.field("cardType").as_deref(), Some(expected));
            assert_eq!(prepared.request.body.field("isLost"), None);
        }
    }

    #[test]
    fn test_lost_key_requires_card_and_sets_flag() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);
        let ctx = ctx("UTC", "UTC");

        let err = builder
            .issue_key(&ctx, KeyVariant::ROOM_LOST, &key_request(), &batch())
            .unwrap_err();
        assert!(matches!(err, GateKeyError::InvalidArgument(_)));

        let request = KeyRequest {
            lost_card_no: Some("C-1".into()),
            ..key_request()
        };
        let prepared = builder
            .issue_key(&ctx, KeyVariant::ROOM_LOST, &request, &batch())
            .unwrap();
        assert_eq!(prepared.request.body.field("isLost").as_deref(), Some("1"));
        assert_eq!(prepared.request.body.field("lostCardNo").as_deref(), Some("C-1"));
    }

    #[test]
    fn test_cipher_key_truncates_end_hour_then_converts() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);

        let ctx = ctx("Asia/Shanghai", "UTC");
        let prepared = builder
            .issue_key(&ctx, KeyVariant::ROOM_CIPHER, &key_request(), &batch())
            .unwrap();

        assert_eq!(prepared.expectation, Expectation::Field("cipher"));
        assert_eq!(prepared.request.body.field("type").as_deref(), Some("cipher"));
        // 20:45 UTC → 20:00 UTC → 04:00 next day in Shanghai
        assert_eq!(prepared.request.body.field("endTime").as_deref(), Some("2402010400"));
        assert_eq!(prepared.request.body.field("startTime").as_deref(), Some("2401011600"));
    }

    #[test]
    fn test_issue_key_rejects_bad_input() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);
        let ctx = ctx("Asia/Shanghai", "UTC");

        let request = KeyRequest {
            mobile: String::new(),
            ..key_request()
        };
        assert!(matches!(
            builder.issue_key(&ctx, KeyVariant::ROOM, &request, &batch()),
            Err(GateKeyError::InvalidArgument(_))
        ));

        let request = KeyRequest {
            start_time: "24010108".into(),
            ..key_request()
        };
        assert!(matches!(
            builder.issue_key(&ctx, KeyVariant::ROOM, &request, &batch()),
            Err(GateKeyError::Format(_))
        ));
    }

    #[test]
    fn test_get_card_formats() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);

        for (format, wire, field) in [
            (CardFormat::Share, "share", "baseImg"),
            (CardFormat::Image, "img", "baseImg"),
            (CardFormat::String, "str", "bleStr"),
            (CardFormat::Cipher, "cipher", "cipher"),
        ] {
            let prepared = builder.get_card("C-9", format, &batch()).unwrap();
            assert!(prepared.request.url.contains("?c=Qrcode&a=getCard&sig="));
            assert_eq!(prepared.request.body.field("type").as_deref(), Some(wire));
            assert_eq!(prepared.expectation, Expectation::Field(field));
        }
    }

    #[test]
    fn test_batch_actions_and_expectations() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);
        let ctx = ctx("UTC", "UTC");

        let lost = builder.report_lost(&ctx, "C-1", &batch()).unwrap();
        assert!(lost.request.url.contains("a=reportLost&"));
        assert_eq!(lost.expectation, Expectation::Status);

        let cancel = builder.cancel_card(&ctx, "C-1", &batch()).unwrap();
        assert!(cancel.request.url.contains("a=cancelCard&"));
        assert_eq!(cancel.expectation, Expectation::Success);

        let info = builder
            .room_card_info(&ctx, RoomRef::new(1, 2, 3), &batch())
            .unwrap();
        assert!(info.request.url.contains("a=getRoomCardInfo&"));
        assert_eq!(info.expectation, Expectation::SuccessWithData);
        assert_eq!(info.request.body.field("roomNo").as_deref(), Some("3"));
    }

    #[test]
    fn test_mac_list_concat_signature() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);

        let prepared = builder.mac_list(&ctx("UTC", "UTC")).unwrap();
        assert_eq!(prepared.request.url, "https://api.example.com/Home/Qrm/getMacList");
        assert_eq!(prepared.request.authorization, None);
        assert_eq!(form_keys(&prepared.request), vec!["accountId", "communityNo", "sig"]);

        let expected = hex::encode(md5::compute(b"A7T").0);
        assert_eq!(prepared.request.body.field("sig"), Some(expected));
    }

    #[test]
    fn test_make_device_card_field_order() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);
        let request = DeviceCardRequest {
            mac: "AA:BB".into(),
            room: RoomRef::new(1, 2, 201),
            card_type: ROOM_CARD_TYPE,
            start_time: "2401010000".into(),
            end_time: "2402010000".into(),
            creator_email: "ops@example.com".into(),
        };

        let prepared = builder
            .make_device_card(&ctx("UTC", "UTC"), DeviceCardMode::Normal, &request)
            .unwrap();
        assert_eq!(
            form_keys(&prepared.request),
            vec![
                "accountId", "communityNo", "mac", "buildingNo", "floorNo", "roomNo", "cardType",
                "startTime", "endTime", "creatorEmail", "isLost", "sig"
            ]
        );
        assert_eq!(prepared.request.body.field("isLost").as_deref(), Some("0"));

        let concatenated = "A7AA:BB12201024010100002402010000ops@example.com0T";
        let expected = hex::encode(md5::compute(concatenated.as_bytes()).0);
        assert_eq!(prepared.request.body.field("sig"), Some(expected));
    }

    #[test]
    fn test_make_lost_device_card_sends_email_as_lost_flag() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);
        let request = DeviceCardRequest {
            mac: "AA:BB".into(),
            creator_email: "ops@example.com".into(),
            start_time: "2401010000".into(),
            end_time: "2402010000".into(),
            ..Default::default()
        };

        let prepared = builder
            .make_device_card(&ctx("UTC", "UTC"), DeviceCardMode::Lost, &request)
            .unwrap();
        assert_eq!(prepared.request.body.field("isLost").as_deref(), Some("ops@example.com"));
        assert_eq!(prepared.expectation, Expectation::Success);
    }

    #[test]
    fn test_device_card_paths() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);
        let ctx = ctx("UTC", "UTC");

        let read = builder.read_device_card(&ctx, "AA:BB").unwrap();
        assert_eq!(read.request.url, "https://api.example.com/Home/Qrm/readCard");
        assert_eq!(form_keys(&read.request), vec!["accountId", "communityNo", "mac", "sig"]);

        let cancel = builder.cancel_device_card(&ctx, "AA:BB", "C-1").unwrap();
        assert_eq!(cancel.request.url, "https://api.example.com/Home/Qrm/cancelCard");
        assert_eq!(
            form_keys(&cancel.request),
            vec!["accountId", "communityNo", "mac", "cardNo", "sig"]
        );

        assert!(matches!(
            builder.read_device_card(&ctx, ""),
            Err(GateKeyError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_records_sign_without_sending_token() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);
        let ctx = ctx("UTC", "UTC");

        let prepared = builder.box_info(&ctx, "AA:BB").unwrap();
        let plain = FieldMapping::new()
            .with("accountId", "A")
            .with("communityNo", 7u32)
            .with("mac", "AA:BB");
        let expected = canonical_query_signature(&plain, "T");

        assert_eq!(
            prepared.request.url,
            format!("https://api.example.com/Home/Records/getBoxInfo?sig={}", expected)
        );
        assert_eq!(prepared.request.body.field("authToken"), None);
        assert_eq!(prepared.expectation, Expectation::Field("data"));
        assert_eq!(canonical_encode(&plain), "accountId=A&communityNo=7&mac=AA:BB");
    }

    #[test]
    fn test_records_by_room_normalizes_times() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);

        let query = RecordsQuery {
            room: RoomRef::new(1, 1, 101),
            start_time: "2401010000".into(),
            end_time: String::new(),
            ..Default::default()
        };
        let prepared = builder
            .records_by_room(&ctx("Asia/Shanghai", "UTC"), &query)
            .unwrap();
        let prefix = "https://api.example.com/Home/Records/queryByRoom?sig=";
        assert!(prepared.request.url.starts_with(prefix));
        assert_eq!(prepared.request.body.field("startTime").as_deref(), Some("2401010800"));
        assert_eq!(prepared.request.body.field("endTime").as_deref(), Some(""));
        assert_eq!(prepared.request.body.field("page").as_deref(), Some("1"));

        let bad = RecordsQuery { page: 0, ..query };
        assert!(builder.records_by_room(&ctx("UTC", "UTC"), &bad).is_err());
    }

    #[test]
    fn test_fetch_room_info_path() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);

        let prepared = builder
            .fetch_room_info(&ctx("UTC", "UTC"), RoomRef::new(1, 2, 3))
            .unwrap();
        assert!(prepared.request.url.contains("Home/Records/fetchRoomInfo?sig="));
    }

    #[test]
    fn test_access_link_shape() {
        let identity = identity();
        let endpoints = endpoints();
        let builder = RequestBuilder::new(&identity, &endpoints);
        let encryptor = LinkEncryptor::from_pem(&test_key::public_pem()).unwrap();

        let request = LinkRequest {
            mobile: "13800000000".into(),
            area_code: "021".into(),
            card_no: String::new(),
            card_type: ROOM_CARD_TYPE,
        };
        let link = builder
            .access_link(&ctx("UTC", "UTC"), &request, &encryptor, 1_700_000_000)
            .unwrap();

        let prefix = "https://card.example.com/apiLogin/?data=";
        assert!(link.starts_with(prefix));
        let data = &link[prefix.len()..];
        assert!(!data.contains('+') && !data.contains('/') && !data.contains('='));

        let bad = LinkRequest {
            card_type: 9,
            ..request
        };
        assert!(matches!(
            builder.access_link(&ctx("UTC", "UTC"), &bad, &encryptor, 0),
            Err(GateKeyError::InvalidArgument(_))
        ));
    }
}
