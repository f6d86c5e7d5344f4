/// Failure of an external dependency (message bus, presign gateway,
/// object store, memory API).
///
/// Returned by the bus adapter traits. The entry points (`EventPublisher`,
/// `Archiver`) log it at `debug` and return `None` / no-op instead.
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("{0} not configured")]
    Unconfigured(&'static str),

    #[error("connect {url}: {detail}")]
    Connect { url: String, detail: String },

    #[error("bus ({op}): {detail}")]
    Bus { op: &'static str, detail: String },

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("presign response has no url")]
    MissingUrl,
}

/// Errors that are allowed to reach the caller: local misconfiguration,
/// not a degraded remote.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },

    #[error("http client: {0}")]
    Client(reqwest::Error),

    #[error("runtime: {0}")]
    Runtime(std::io::Error),

    #[error("serve: {0}")]
    Serve(std::io::Error),
}
