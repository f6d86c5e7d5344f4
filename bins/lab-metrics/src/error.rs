#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Bridge(#[from] lab_bridge::BridgeError),

    #[error("--best is not a JSON object: {0}")]
    BestJson(String),

    #[error("{0} unavailable")]
    Unavailable(&'static str),
}
