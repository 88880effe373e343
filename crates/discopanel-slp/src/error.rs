use thiserror::Error;

/// Every failure mode of a ping — connect failure, short read, invalid
/// varint, oversize string, JSON parse — is reported as this single
/// outcome at the caller's level, per the SLP client's design.
#[derive(Debug, Error)]
#[error("server list ping unavailable: {0}")]
pub struct SlpUnavailable(pub String);

impl From<std::io::Error> for SlpUnavailable {
    fn from(e: std::io::Error) -> Self {
        SlpUnavailable(e.to_string())
    }
}

impl From<discopanel_proto::ProtoError> for SlpUnavailable {
    fn from(e: discopanel_proto::ProtoError) -> Self {
        SlpUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for SlpUnavailable {
    fn from(e: serde_json::Error) -> Self {
        SlpUnavailable(format!("invalid status json: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, SlpUnavailable>;
