//! Real-time contract events over WebSocket
//!
//! `EventStream` opens an `eth_subscribe("logs")` subscription for the
//! configured contracts, decodes each notification into a `VaultEvent` and
//! fans it out on a broadcast channel.

use alloy_primitives::{Address, B256};
use alloy_sol_types::SolEvent;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use vaultline_core::{ReleaseType, RequestId, Result, SdkConfig, VaultId, VaultlineError};

use crate::contracts::{IAIVaultManager, IAttestationHub, ITimeLockManager, IVaultFactory};
use crate::provider::Log;

const EVENT_CHANNEL_CAPACITY: usize = 1000;
const HEARTBEAT_SECS: u64 = 30;

/// Contract events the SDK understands
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VaultEvent {
    VaultCreated {
        vault_id: VaultId,
        owner: Address,
        cid: String,
    },
    VaultUpdated {
        vault_id: VaultId,
        cid: String,
    },
    VaultDeactivated {
        vault_id: VaultId,
    },
    ReleaseConfigured {
        vault_id: VaultId,
        release_type: ReleaseType,
        release_time: u64,
        check_in_interval: u64,
    },
    CheckedIn {
        vault_id: VaultId,
        timestamp: u64,
    },
    VaultReleased {
        vault_id: VaultId,
        timestamp: u64,
    },
    AttestationRequested {
        request_id: RequestId,
        vault_id: VaultId,
        condition_hash: B256,
    },
    AttestationFinalized {
        request_id: RequestId,
        approved: bool,
        approvals: u32,
        rejections: u32,
    },
    AiStateUpdated {
        vault_id: VaultId,
        risk_score: u16,
        recommendation: u8,
    },

    /// Subscription established
    Connected,

    /// Socket closed or failed; no further events will arrive
    ConnectionLost {
        reason: String,
    },
}

impl VaultEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            VaultEvent::VaultCreated { .. } => "VaultCreated",
            VaultEvent::VaultUpdated { .. } => "VaultUpdated",
            VaultEvent::VaultDeactivated { .. } => "VaultDeactivated",
            VaultEvent::ReleaseConfigured { .. } => "ReleaseConfigured",
            VaultEvent::CheckedIn { .. } => "CheckedIn",
            VaultEvent::VaultReleased { .. } => "VaultReleased",
            VaultEvent::AttestationRequested { .. } => "AttestationRequested",
            VaultEvent::AttestationFinalized { .. } => "AttestationFinalized",
            VaultEvent::AiStateUpdated { .. } => "AiStateUpdated",
            VaultEvent::Connected | VaultEvent::ConnectionLost { .. } => "Connection",
        }
    }

    /// Vault the event concerns, when it names one
    pub fn vault_id(&self) -> Option<VaultId> {
        match self {
            VaultEvent::VaultCreated { vault_id, .. }
            | VaultEvent::VaultUpdated { vault_id, .. }
            | VaultEvent::VaultDeactivated { vault_id }
            | VaultEvent::ReleaseConfigured { vault_id, .. }
            | VaultEvent::CheckedIn { vault_id, .. }
            | VaultEvent::VaultReleased { vault_id, .. }
            | VaultEvent::AttestationRequested { vault_id, .. }
            | VaultEvent::AiStateUpdated { vault_id, .. } => Some(*vault_id),
            _ => None,
        }
    }
}

fn decode<E: SolEvent>(log: &Log) -> Option<E> {
    E::decode_raw_log(log.topics.iter().copied(), &log.data, true).ok()
}

/// Decode a raw log by its first topic. Unknown or malformed logs give `None`.
pub fn decode_log(log: &Log) -> Option<VaultEvent> {
    let topic0 = *log.topics.first()?;

    let event = if topic0 == IVaultFactory::VaultCreated::SIGNATURE_HASH {
        let e: IVaultFactory::VaultCreated = decode(log)?;
        VaultEvent::VaultCreated {
            vault_id: e.vaultId,
            owner: e.owner,
            cid: e.cid,
        }
    } else if topic0 == IVaultFactory::VaultUpdated::SIGNATURE_HASH {
        let e: IVaultFactory::VaultUpdated = decode(log)?;
        VaultEvent::VaultUpdated {
            vault_id: e.vaultId,
            cid: e.cid,
        }
    } else if topic0 == IVaultFactory::VaultDeactivated::SIGNATURE_HASH {
        let e: IVaultFactory::VaultDeactivated = decode(log)?;
        VaultEvent::VaultDeactivated { vault_id: e.vaultId }
    } else if topic0 == ITimeLockManager::ReleaseConfigured::SIGNATURE_HASH {
        let e: ITimeLockManager::ReleaseConfigured = decode(log)?;
        VaultEvent::ReleaseConfigured {
            vault_id: e.vaultId,
            release_type: ReleaseType::try_from(e.releaseType).ok()?,
            release_time: e.releaseTime,
            check_in_interval: e.checkInInterval,
        }
    } else if topic0 == ITimeLockManager::CheckedIn::SIGNATURE_HASH {
        let e: ITimeLockManager::CheckedIn = decode(log)?;
        VaultEvent::CheckedIn {
            vault_id: e.vaultId,
            timestamp: e.timestamp,
        }
    } else if topic0 == ITimeLockManager::VaultReleased::SIGNATURE_HASH {
        let e: ITimeLockManager::VaultReleased = decode(log)?;
        VaultEvent::VaultReleased {
            vault_id: e.vaultId,
            timestamp: e.timestamp,
        }
    } else if topic0 == IAttestationHub::AttestationRequested::SIGNATURE_HASH {
        let e: IAttestationHub::AttestationRequested = decode(log)?;
        VaultEvent::AttestationRequested {
            request_id: e.requestId,
            vault_id: e.vaultId,
            condition_hash: e.conditionHash,
        }
    } else if topic0 == IAttestationHub::AttestationFinalized::SIGNATURE_HASH {
        let e: IAttestationHub::AttestationFinalized = decode(log)?;
        VaultEvent::AttestationFinalized {
            request_id: e.requestId,
            approved: e.approved,
            approvals: e.approvals,
            rejections: e.rejections,
        }
    } else if topic0 == IAIVaultManager::AIStateUpdated::SIGNATURE_HASH {
        let e: IAIVaultManager::AIStateUpdated = decode(log)?;
        VaultEvent::AiStateUpdated {
            vault_id: e.vaultId,
            risk_score: e.riskScore,
            recommendation: e.recommendation,
        }
    } else {
        return None;
    };

    Some(event)
}

/// Event-kind filter. Empty or containing `*` accepts everything.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    kinds: HashSet<String>,
    vaults: HashSet<VaultId>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: &str) {
        self.kinds.insert(kind.to_string());
    }

    pub fn unsubscribe(&mut self, kind: &str) {
        self.kinds.remove(kind);
    }

    /// Restrict to events about `vault_id`. Connection events always pass.
    pub fn only_vault(&mut self, vault_id: VaultId) {
        self.vaults.insert(vault_id);
    }

    pub fn should_emit(&self, event: &VaultEvent) -> bool {
        if event.kind() == "Connection" {
            return true;
        }

        let kind_ok =
            self.kinds.is_empty() || self.kinds.contains("*") || self.kinds.contains(event.kind());
        let vault_ok = self.vaults.is_empty()
            || event.vault_id().map_or(true, |id| self.vaults.contains(&id));

        kind_ok && vault_ok
    }
}

/// Parsed WebSocket frame
#[derive(Debug, PartialEq)]
enum Frame {
    Subscribed(String),
    Log(Box<Log>),
    Error(String),
    Ignored,
}

fn parse_frame(text: &str) -> Frame {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Frame::Ignored;
    };

    if value.get("method").and_then(Value::as_str) == Some("eth_subscription") {
        return match value
            .pointer("/params/result")
            .cloned()
            .map(serde_json::from_value::<Log>)
        {
            Some(Ok(log)) => Frame::Log(Box::new(log)),
            _ => Frame::Ignored,
        };
    }

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Frame::Error(message.to_string());
    }

    match value.get("result").and_then(Value::as_str) {
        Some(id) => Frame::Subscribed(id.to_string()),
        None => Frame::Ignored,
    }
}

/// WebSocket subscription to the vault contracts
pub struct EventStream {
    url: String,
    addresses: Vec<Address>,
    filter: Arc<RwLock<EventFilter>>,
    event_tx: broadcast::Sender<VaultEvent>,
    command_tx: Option<mpsc::Sender<tokio_tungstenite::tungstenite::Message>>,
    connected: Arc<AtomicBool>,
    subscription_id: Arc<RwLock<Option<String>>>,
}

impl EventStream {
    pub fn new(url: &str, addresses: Vec<Address>) -> Result<Self> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(VaultlineError::Config(format!(
                "websocket url must start with ws:// or wss://, got {}",
                url
            )));
        }
        if addresses.is_empty() {
            return Err(VaultlineError::Config(
                "no contract addresses configured to watch".to_string(),
            ));
        }

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            url: url.to_string(),
            addresses,
            filter: Arc::new(RwLock::new(EventFilter::new())),
            event_tx,
            command_tx: None,
            connected: Arc::new(AtomicBool::new(false)),
            subscription_id: Arc::new(RwLock::new(None)),
        })
    }

    /// Watch every configured contract on `network.ws_url`
    pub fn from_config(config: &SdkConfig) -> Result<Self> {
        Self::new(&config.network.ws_url, config.contracts.configured())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VaultEvent> {
        self.event_tx.subscribe()
    }

    pub fn set_filter(&self, filter: EventFilter) {
        *self.filter.write() = filter;
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Node-assigned subscription id, once acknowledged
    pub fn subscription_id(&self) -> Option<String> {
        self.subscription_id.read().clone()
    }

    pub async fn connect(&mut self) -> Result<()> {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::{connect_async, tungstenite::Message};

        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| VaultlineError::WebSocket(format!("connect {}: {}", self.url, e)))?;

        let (mut write, mut read) = ws_stream.split();

        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["logs", { "address": self.addresses }],
        });
        write
            .send(Message::Text(request.to_string()))
            .await
            .map_err(|e| VaultlineError::WebSocket(e.to_string()))?;

        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(url = %self.url, contracts = self.addresses.len(), "event stream connected");

        let (cmd_tx, mut cmd_rx) = mpsc::channel::<Message>(100);
        self.command_tx = Some(cmd_tx.clone());

        let event_tx = self.event_tx.clone();
        let connected = self.connected.clone();
        let filter = self.filter.clone();
        let subscription_id = self.subscription_id.clone();

        tokio::spawn(async move {
            // `disconnect` clears the flag before closing
            let lost = |reason: String| {
                let reason = if connected.swap(false, Ordering::SeqCst) {
                    tracing::warn!(%reason, "event stream closed");
                    reason
                } else {
                    tracing::debug!("event stream disconnected");
                    "disconnected by client".to_string()
                };
                let _ = event_tx.send(VaultEvent::ConnectionLost { reason });
            };

            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => match parse_frame(&text) {
                        Frame::Subscribed(id) => {
                            tracing::debug!(subscription = %id, "log subscription active");
                            *subscription_id.write() = Some(id);
                            let _ = event_tx.send(VaultEvent::Connected);
                        }
                        Frame::Log(log) => match decode_log(&log) {
                            Some(event) if filter.read().should_emit(&event) => {
                                let _ = event_tx.send(event);
                            }
                            Some(_) => {}
                            None => tracing::debug!(address = %log.address, "undecodable log skipped"),
                        },
                        Frame::Error(message) => {
                            lost(format!("subscription rejected: {}", message));
                            return;
                        }
                        Frame::Ignored => {}
                    },
                    Ok(Message::Close(_)) => {
                        lost("closed by server".to_string());
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        lost(e.to_string());
                        return;
                    }
                }
            }
            lost("stream ended".to_string());
        });

        tokio::spawn(async move {
            while let Some(msg) = cmd_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if write.send(msg).await.is_err() || closing {
                    break;
                }
            }
        });

        let connected_heartbeat = self.connected.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(HEARTBEAT_SECS));
            loop {
                interval.tick().await;
                if !connected_heartbeat.load(Ordering::SeqCst) {
                    break;
                }
                if cmd_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        });

        Ok(())
    }

    pub fn disconnect(&self) {
        use tokio_tungstenite::tungstenite::Message;

        self.connected.store(false, Ordering::SeqCst);
        if let Some(tx) = &self.command_tx {
            let _ = tx.try_send(Message::Close(None));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, U256};
    use alloy_sol_types::sol_data::Uint;
    use alloy_sol_types::{SolType, SolValue};

    fn vault_created_log(vault_id: u64, owner: Address) -> Log {
        Log {
            address: Address::repeat_byte(0xfa),
            topics: vec![
                IVaultFactory::VaultCreated::SIGNATURE_HASH,
                B256::from(U256::from(vault_id).to_be_bytes::<32>()),
                owner.into_word(),
            ],
            data: Bytes::from(("ipfs://bafy".to_string(),).abi_encode_params()),
            block_number: None,
            transaction_hash: None,
            log_index: None,
        }
    }

    #[test]
    fn test_decode_vault_created() {
        let owner = Address::repeat_byte(0x42);
        let event = decode_log(&vault_created_log(7, owner)).unwrap();
        assert_eq!(
            event,
            VaultEvent::VaultCreated {
                vault_id: U256::from(7),
                owner,
                cid: "ipfs://bafy".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_unknown_topic() {
        let mut log = vault_created_log(1, Address::ZERO);
        log.topics[0] = B256::repeat_byte(0x01);
        assert!(decode_log(&log).is_none());

        log.topics.clear();
        assert!(decode_log(&log).is_none());
    }

    #[test]
    fn test_decode_ai_state() {
        let log = Log {
            address: Address::repeat_byte(0xaa),
            topics: vec![
                IAIVaultManager::AIStateUpdated::SIGNATURE_HASH,
                B256::from(U256::from(3).to_be_bytes::<32>()),
            ],
            data: Bytes::from(<(Uint<16>, Uint<8>)>::abi_encode_params(&(8_000u16, 2u8))),
            block_number: None,
            transaction_hash: None,
            log_index: None,
        };
        assert_eq!(
            decode_log(&log),
            Some(VaultEvent::AiStateUpdated {
                vault_id: U256::from(3),
                risk_score: 8_000,
                recommendation: 2,
            })
        );
    }

    #[test]
    fn test_event_filter() {
        let mut filter = EventFilter::new();
        let created = VaultEvent::VaultCreated {
            vault_id: U256::from(1),
            owner: Address::ZERO,
            cid: "x".to_string(),
        };
        let released = VaultEvent::VaultReleased {
            vault_id: U256::from(2),
            timestamp: 0,
        };

        // Empty filter accepts all
        assert!(filter.should_emit(&created));

        filter.subscribe("VaultReleased");
        assert!(!filter.should_emit(&created));
        assert!(filter.should_emit(&released));

        filter.subscribe("*");
        assert!(filter.should_emit(&created));

        filter.only_vault(U256::from(2));
        assert!(!filter.should_emit(&created));
        assert!(filter.should_emit(&released));
        assert!(filter.should_emit(&VaultEvent::ConnectionLost {
            reason: "test".to_string()
        }));
    }

    #[test]
    fn test_parse_frames() {
        assert_eq!(
            parse_frame(r#"{"jsonrpc":"2.0","id":1,"result":"0xabc"}"#),
            Frame::Subscribed("0xabc".to_string())
        );
        assert_eq!(
            parse_frame(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"nope"}}"#),
            Frame::Error("nope".to_string())
        );
        assert_eq!(parse_frame("not json"), Frame::Ignored);

        let log = vault_created_log(9, Address::repeat_byte(1));
        let notification = json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": { "subscription": "0xabc", "result": log },
        });
        assert_eq!(
            parse_frame(&notification.to_string()),
            Frame::Log(Box::new(log))
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = VaultEvent::AttestationFinalized {
            request_id: U256::from(5),
            approved: true,
            approvals: 4,
            rejections: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("AttestationFinalized"));

        let parsed: VaultEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    type Server = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Accept one WebSocket client and return the first text frame it sends
    async fn accept_subscriber(listener: tokio::net::TcpListener) -> (Server, Value) {
        use futures_util::StreamExt;
        use tokio_tungstenite::tungstenite::Message;

        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        loop {
            if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
                return (ws, serde_json::from_str(&text).unwrap());
            }
        }
    }

    async fn send_json(ws: &mut Server, value: Value) {
        use futures_util::SinkExt;
        ws.send(tokio_tungstenite::tungstenite::Message::Text(value.to_string()))
            .await
            .unwrap();
    }

    /// Read events until the connection is reported lost
    async fn drain(rx: &mut broadcast::Receiver<VaultEvent>) -> Vec<VaultEvent> {
        let mut events = Vec::new();
        loop {
            let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
                .await
                .expect("event within timeout")
                .unwrap();
            let done = matches!(event, VaultEvent::ConnectionLost { .. });
            events.push(event);
            if done {
                return events;
            }
        }
    }

    #[tokio::test]
    async fn test_stream_fans_out_filtered_logs() {
        use futures_util::StreamExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let contract = Address::repeat_byte(0xfa);
        let owner = Address::repeat_byte(0x42);

        let server = tokio::spawn(async move {
            let (mut ws, request) = accept_subscriber(listener).await;
            send_json(&mut ws, json!({ "jsonrpc": "2.0", "id": 1, "result": "0xfeed" })).await;
            for vault in [1, 2] {
                let notification = json!({
                    "jsonrpc": "2.0",
                    "method": "eth_subscription",
                    "params": { "subscription": "0xfeed", "result": vault_created_log(vault, owner) },
                });
                send_json(&mut ws, notification).await;
            }
            ws.close(None).await.unwrap();
            let _ = tokio::time::timeout(std::time::Duration::from_secs(2), async {
                while let Some(Ok(_)) = ws.next().await {}
            })
            .await;
            request
        });

        let mut stream = EventStream::new(&url, vec![contract]).unwrap();
        let mut filter = EventFilter::new();
        filter.only_vault(U256::from(2));
        stream.set_filter(filter);
        let mut first = stream.subscribe();
        let mut second = stream.subscribe();

        stream.connect().await.unwrap();

        let expected = vec![
            VaultEvent::Connected,
            VaultEvent::VaultCreated {
                vault_id: U256::from(2),
                owner,
                cid: "ipfs://bafy".to_string(),
            },
            VaultEvent::ConnectionLost {
                reason: "closed by server".to_string(),
            },
        ];
        assert_eq!(drain(&mut first).await, expected);
        assert_eq!(drain(&mut second).await, expected);

        assert!(!stream.is_connected());
        assert_eq!(stream.subscription_id().as_deref(), Some("0xfeed"));

        let request = server.await.unwrap();
        assert_eq!(request["method"], json!("eth_subscribe"));
        assert_eq!(request["params"][0], json!("logs"));
        assert_eq!(request["params"][1]["address"], json!([contract]));
    }

    #[tokio::test]
    async fn test_local_disconnect_reason() {
        use futures_util::StreamExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut ws, _) = accept_subscriber(listener).await;
            send_json(&mut ws, json!({ "jsonrpc": "2.0", "id": 1, "result": "0x1" })).await;
            // Reading answers the client's Close frame
            let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
                while let Some(Ok(_)) = ws.next().await {}
            })
            .await;
        });

        let mut stream = EventStream::new(&url, vec![Address::repeat_byte(1)]).unwrap();
        let mut events = stream.subscribe();
        stream.connect().await.unwrap();

        let connected = tokio::time::timeout(std::time::Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(connected, VaultEvent::Connected);
        assert!(stream.is_connected());

        stream.disconnect();
        assert_eq!(
            drain(&mut events).await,
            vec![VaultEvent::ConnectionLost {
                reason: "disconnected by client".to_string()
            }]
        );
        assert!(!stream.is_connected());
        server.await.unwrap();
    }

    #[test]
    fn test_stream_requires_ws_url() {
        assert!(EventStream::new("http://localhost:8545", vec![Address::repeat_byte(1)]).is_err());
        assert!(EventStream::new("ws://localhost:8546", Vec::new()).is_err());

        let stream = EventStream::new("ws://localhost:8546", vec![Address::repeat_byte(1)]).unwrap();
        assert!(!stream.is_connected());
        assert!(stream.subscription_id().is_none());
    }
}
