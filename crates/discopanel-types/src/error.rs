use thiserror::Error;

/// The error kinds surfaced distinctly to callers of the core, per the
/// error handling design: background loops never abort on these, they log
/// and continue; only the Controller and Module Manager propagate them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("image unavailable: {0}")]
    ImageUnavailable(String),

    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("port {port} already in use")]
    PortInUse { port: u16 },

    #[error("module dependency {dependency} is unhealthy")]
    DependencyUnhealthy { dependency: String },

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transient error: {0}")]
    Transient(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        Error::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    /// `NotFound` during a stop/inspect is non-fatal by policy; callers use
    /// this to decide whether to treat the error as a successful no-op.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Classifies a Docker Engine API error into a core `Error` kind. HTTP 404
/// maps to `NotFound`, 409 to `AlreadyExists`, and connection-level failures
/// (the daemon socket is unreachable) to `RuntimeUnavailable`; anything else
/// is `Transient` since the caller may reasonably retry.
impl From<bollard::errors::Error> for Error {
    fn from(e: bollard::errors::Error) -> Self {
        use bollard::errors::Error as BErr;

        match &e {
            BErr::DockerResponseServerError { status_code, .. } => match *status_code {
                404 => Error::NotFound {
                    kind: "container",
                    id: e.to_string(),
                },
                409 => Error::AlreadyExists {
                    kind: "container",
                    id: e.to_string(),
                },
                _ => Error::Transient(e.to_string()),
            },
            BErr::HyperResponseError { .. } | BErr::IOError { .. } => {
                Error::RuntimeUnavailable(e.to_string())
            }
            _ => Error::Transient(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
