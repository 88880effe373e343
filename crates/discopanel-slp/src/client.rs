use std::time::{Duration, Instant};

use discopanel_proto::packet::{read_packet, send_packet};
use discopanel_proto::varint::{decode_varint, encode_varint_into};
use discopanel_types::SlpResult;
use serde_json::Value;
use tokio::net::TcpStream;

use crate::chat::flatten_description;
use crate::error::{Result, SlpUnavailable};
use crate::protocol_version::protocol_version_for;

/// Maximum accepted size of the status response's JSON payload.
const MAX_STATUS_RESPONSE_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SlpRequest {
    pub host: String,
    pub port: u16,
    pub game_version: String,
    pub timeout: Duration,
}

impl SlpRequest {
    pub fn new(host: impl Into<String>, port: u16, game_version: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            game_version: game_version.into(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Runs the full Server List Ping exchange against a backend and returns a
/// parsed result, or a single `SlpUnavailable` outcome on any failure.
pub async fn ping(request: &SlpRequest) -> Result<SlpResult> {
    tokio::time::timeout(request.timeout, ping_inner(request))
        .await
        .map_err(|_| SlpUnavailable("connection timed out".to_owned()))?
}

async fn ping_inner(request: &SlpRequest) -> Result<SlpResult> {
    let mut stream = TcpStream::connect((request.host.as_str(), request.port)).await?;

    let protocol_version = protocol_version_for(&request.game_version);
    send_handshake(&mut stream, protocol_version, &request.host, request.port).await?;
    send_packet(&mut stream, 0x00, &[]).await?;

    let (_id, body) = read_packet(&mut stream, MAX_STATUS_RESPONSE_SIZE).await?;
    let json_str = decode_length_prefixed_string(&body)?;
    let parsed: Value = serde_json::from_str(&json_str)?;

    let start = Instant::now();
    let ping_payload = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    send_packet(&mut stream, 0x01, &ping_payload.to_be_bytes()).await?;
    let (_pong_id, _pong_body) = read_packet(&mut stream, 16).await?;
    let latency_ms = start.elapsed().as_millis() as u64;

    parse_status(parsed, latency_ms)
}

async fn send_handshake(stream: &mut TcpStream, protocol_version: i32, host: &str, port: u16) -> Result<()> {
    let mut body = Vec::new();
    encode_varint_into(protocol_version, &mut body);
    encode_varint_into(host.len() as i32, &mut body);
    body.extend_from_slice(host.as_bytes());
    body.extend_from_slice(&port.to_be_bytes());
    encode_varint_into(1, &mut body); // next_state = status
    send_packet(stream, 0x00, &body).await?;
    Ok(())
}

fn decode_length_prefixed_string(body: &[u8]) -> Result<String> {
    let (len, consumed) = decode_varint(body)?;
    let len = len as usize;
    let bytes = body
        .get(consumed..consumed + len)
        .ok_or_else(|| SlpUnavailable("truncated status response".to_owned()))?;
    String::from_utf8(bytes.to_vec()).map_err(|e| SlpUnavailable(e.to_string()))
}

fn parse_status(value: Value, latency_ms: u64) -> Result<SlpResult> {
    let version_name = value["version"]["name"].as_str().unwrap_or("unknown").to_owned();
    let protocol_version = value["version"]["protocol"].as_i64().unwrap_or(0) as i32;
    let max_players = value["players"]["max"].as_i64().unwrap_or(0) as i32;
    let online_players = value["players"]["online"].as_i64().unwrap_or(0) as i32;

    let player_sample = value["players"]["sample"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|p| p["name"].as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default();

    let motd = flatten_description(&value["description"]);
    let favicon = value["favicon"].as_str().map(str::to_owned);

    Ok(SlpResult {
        version_name,
        protocol_version,
        online_players,
        max_players,
        player_sample,
        motd,
        favicon,
        latency_ms,
    })
}
