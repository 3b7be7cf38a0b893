//! gatekey - command line for the community gate-key API

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatekey_client::{
    CardFormat, ClientConfig, DeviceCardRequest, GateKeyClient, KeyKind, KeyRequest, KeyVariant,
    LinkRequest, RecordsQuery, RoomRef, TransportConfig, DEFAULT_TIMEZONE,
};

/// gatekey - issue and manage community access keys
#[derive(Parser, Debug)]
#[command(name = "gatekey")]
#[command(about = "Issue and manage community door keys")]
struct Args {
    /// Account id issued by the service
    #[arg(long, env = "GATEKEY_ACCOUNT_ID")]
    account_id: String,

    /// Auth token issued by the service
    #[arg(long, env = "GATEKEY_AUTH_TOKEN", hide_env_values = true)]
    auth_token: String,

    /// API base URL
    #[arg(long, env = "GATEKEY_API_HOST")]
    api_host: String,

    /// Base URL serving access links
    #[arg(long, env = "GATEKEY_CARD_HOST")]
    card_host: String,

    /// Community to act on
    #[arg(long, env = "GATEKEY_COMMUNITY_ID")]
    community_id: Option<u32>,

    /// IANA timezone of the community
    #[arg(long, env = "GATEKEY_COMMUNITY_TZ", default_value = DEFAULT_TIMEZONE)]
    community_tz: String,

    /// IANA timezone times are given in
    #[arg(long, env = "GATEKEY_OPERATOR_TZ", default_value = DEFAULT_TIMEZONE)]
    operator_tz: String,

    /// PEM file with the service's link public key
    #[arg(long, env = "GATEKEY_PUBLIC_KEY_PATH")]
    public_key_path: Option<String>,

    /// Request timeout in seconds (unbounded when unset)
    #[arg(long, env = "GATEKEY_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Skip TLS certificate verification
    #[arg(long, env = "GATEKEY_ACCEPT_INVALID_CERTS", default_value = "false")]
    accept_invalid_certs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug, Clone, Copy)]
struct RoomArgs {
    #[arg(long, default_value_t = 0)]
    building: u32,
    #[arg(long, default_value_t = 0)]
    floor: u32,
    #[arg(long, default_value_t = 0)]
    room: u32,
}

impl From<RoomArgs> for RoomRef {
    fn from(args: RoomArgs) -> Self {
        RoomRef::new(args.building, args.floor, args.room)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build an access link (no request is sent)
    Link {
        #[arg(long)]
        mobile: String,
        #[arg(long, default_value = "")]
        area_code: String,
        #[arg(long, default_value = "")]
        card_no: String,
        #[arg(long, default_value_t = 0)]
        card_type: u8,
    },
    /// Issue a room, floor, or building key
    IssueKey {
        #[command(flatten)]
        room: RoomArgs,
        /// 0 = room, 1 = floor, 2 = building
        #[arg(long, default_value_t = 0)]
        card_type: u8,
        /// YYMMDDHHmm in the operator timezone
        #[arg(long, default_value = "")]
        start: String,
        /// YYMMDDHHmm in the operator timezone
        #[arg(long)]
        end: String,
        #[arg(long)]
        mobile: String,
        #[arg(long, default_value = "")]
        area_code: String,
        /// Replace this lost card
        #[arg(long)]
        lost_card_no: Option<String>,
        /// Return the Bluetooth cipher instead of a card number
        #[arg(long)]
        cipher: bool,
    },
    /// Report a card lost
    ReportLost { card_no: String },
    /// Fetch a card rendering (share, img, str, cipher)
    Card {
        card_no: String,
        #[arg(long, default_value = "share")]
        format: String,
    },
    /// Cancel a card
    Cancel { card_no: String },
    /// Card info for a room
    RoomCardInfo {
        #[command(flatten)]
        room: RoomArgs,
    },
    /// List device MACs in the community
    Macs,
    /// Write a physical card on a device
    MakeCard {
        #[arg(long)]
        mac: String,
        #[command(flatten)]
        room: RoomArgs,
        #[arg(long, default_value_t = 0)]
        card_type: u8,
        #[arg(long, default_value = "")]
        start: String,
        #[arg(long, default_value = "")]
        end: String,
        #[arg(long)]
        creator_email: String,
        /// Replace a lost card
        #[arg(long)]
        lost: bool,
    },
    /// Read the card on a device
    ReadCard { mac: String },
    /// Cancel a card on a device
    CancelDeviceCard { mac: String, card_no: String },
    /// Access records for a room
    Records {
        #[command(flatten)]
        room: RoomArgs,
        #[arg(long, default_value = "")]
        start: String,
        #[arg(long, default_value = "")]
        end: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Room details
    RoomInfo {
        #[command(flatten)]
        room: RoomArgs,
    },
    /// Controller box details for a device
    BoxInfo { mac: String },
}

impl Args {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let public_key_pem = match self.public_key_path {
            Some(ref path) => Some(std::fs::read_to_string(path)?),
            None => None,
        };

        Ok(ClientConfig {
            account_id: self.account_id.clone(),
            auth_token: self.auth_token.clone(),
            api_host: self.api_host.clone(),
            card_host: self.card_host.clone(),
            community_id: self.community_id,
            community_timezone: self.community_tz.clone(),
            operator_timezone: self.operator_tz.clone(),
            public_key_pem,
            transport: TransportConfig {
                timeout: self.timeout_secs.map(Duration::from_secs),
                accept_invalid_certs: self.accept_invalid_certs,
                ..Default::default()
            },
        })
    }
}

fn parse_format(format: &str) -> anyhow::Result<CardFormat> {
    match format {
        "share" => Ok(CardFormat::Share),
        "img" | "image" => Ok(CardFormat::Image),
        "str" | "string" => Ok(CardFormat::String),
        "cipher" => Ok(CardFormat::Cipher),
        other => anyhow::bail!("unknown card format {:?}", other),
    }
}

async fn run(client: &GateKeyClient, command: Command) -> anyhow::Result<Value> {
    let value = match command {
        Command::Link {
            mobile,
            area_code,
            card_no,
            card_type,
        } => {
            let link = client.get_link(&LinkRequest {
                mobile,
                area_code,
                card_no,
                card_type,
            })?;
            json!({ "link": link })
        }
        Command::IssueKey {
            room,
            card_type,
            start,
            end,
            mobile,
            area_code,
            lost_card_no,
            cipher,
        } => {
            let kind = KeyKind::from_card_type(card_type)
                .ok_or_else(|| anyhow::anyhow!("unknown card type {}", card_type))?;
            let variant = KeyVariant {
                kind,
                lost: lost_card_no.is_some(),
                cipher,
            };
            let request = KeyRequest {
                room: room.into(),
                start_time: start,
                end_time: end,
                mobile,
                area_code,
                lost_card_no,
            };
            let issued = client.issue_key(variant, &request).await?;
            if cipher {
                json!({ "cipher": issued })
            } else {
                json!({ "cardNo": issued })
            }
        }
        Command::ReportLost { card_no } => {
            client.report_card_lost(&card_no).await?;
            json!({ "reported": card_no })
        }
        Command::Card { card_no, format } => {
            let format = parse_format(&format)?;
            let rendered = client.get_card(&card_no, format).await?;
            json!({ "format": format.wire_type(), "value": rendered })
        }
        Command::Cancel { card_no } => {
            client.cancel_card(&card_no).await?;
            json!({ "cancelled": card_no })
        }
        Command::RoomCardInfo { room } => client.room_card_info(room.into()).await?,
        Command::Macs => client.device_mac_list().await?,
        Command::MakeCard {
            mac,
            room,
            card_type,
            start,
            end,
            creator_email,
            lost,
        } => {
            let request = DeviceCardRequest {
                mac,
                room: room.into(),
                card_type,
                start_time: start,
                end_time: end,
                creator_email,
            };
            if lost {
                client.make_lost_card(&request).await?;
            } else {
                client.make_card(&request).await?;
            }
            json!({ "written": request.mac })
        }
        Command::ReadCard { mac } => client.read_card(&mac).await?,
        Command::CancelDeviceCard { mac, card_no } => {
            client.cancel_device_card(&mac, &card_no).await?;
            json!({ "cancelled": card_no, "mac": mac })
        }
        Command::Records {
            room,
            start,
            end,
            page,
            page_size,
        } => {
            let query = RecordsQuery {
                room: room.into(),
                start_time: start,
                end_time: end,
                page,
                page_size,
            };
            client.records_by_room(&query).await?
        }
        Command::RoomInfo { room } => client.fetch_room_info(room.into()).await?,
        Command::BoxInfo { mac } => client.box_info(&mac).await?,
    };
    Ok(value)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    format!("gatekey={0},gatekey_client={0},warn", args.log_level).into()
                }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = args.client_config()?;
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let client = GateKeyClient::new(config)?;
    let value = run(&client, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: [&str; 9] = [
        "gatekey",
        "--account-id",
        "A",
        "--auth-token",
        "T",
        "--api-host",
        "https://api.example.com/",
        "--card-host",
        "https://card.example.com/",
    ];

    fn parse(rest: &[&str]) -> Args {
        Args::try_parse_from(BASE.iter().chain(rest)).unwrap()
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("share").unwrap(), CardFormat::Share);
        assert_eq!(parse_format("img").unwrap(), CardFormat::Image);
        assert_eq!(parse_format("image").unwrap(), CardFormat::Image);
        assert_eq!(parse_format("str").unwrap(), CardFormat::String);
        assert_eq!(parse_format("cipher").unwrap(), CardFormat::Cipher);
        assert!(parse_format("png").is_err());
    }

    #[test]
    fn test_issue_key_args() {
        let args = parse(&[
            "--community-id",
            "1001",
            "issue-key",
            "--building",
            "3",
            "--floor",
            "12",
            "--room",
            "1201",
            "--end",
            "2401311200",
            "--mobile",
            "13800000000",
            "--cipher",
        ]);
        assert_eq!(args.community_id, Some(1001));

        match args.command {
            Command::IssueKey {
                room,
                card_type,
                start,
                end,
                cipher,
                lost_card_no,
                ..
            } => {
                assert_eq!(RoomRef::from(room), RoomRef::new(3, 12, 1201));
                assert_eq!(card_type, 0);
                assert_eq!(start, "");
                assert_eq!(end, "2401311200");
                assert!(cipher);
                assert!(lost_card_no.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_issue_key_requires_end() {
        let argv = BASE.iter().chain(&["issue-key", "--mobile", "138"]);
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_client_config_from_args() {
        let args = parse(&["--timeout-secs", "5", "box-info", "AA:BB"]);
        let config = args.client_config().unwrap();
        assert_eq!(config.account_id, "A");
        assert_eq!(config.transport.timeout, Some(Duration::from_secs(5)));
        assert!(config.public_key_pem.is_none());
        assert!(matches!(args.command, Command::BoxInfo { ref mac } if mac == "AA:BB"));
    }
}
