use clap::{Args, Parser, Subcommand};

use lab_bridge::BridgeConfig;

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "lab-metrics", about = "Telemetry side channels for llama-throughput-lab")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve /metrics and /healthz until interrupted
    Serve(ServeArgs),
    /// Upload a sweep CSV via the presign service and print its download URL
    Archive(ArchiveArgs),
    /// Store a sweep's best configuration in the memory API
    StoreReasoning(ReasoningArgs),
}

/// Settings shared by every subcommand. Precedence: config file < env/CLI.
#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    /// Optional TOML file with bridge settings
    #[arg(long, env = "LAB_BRIDGE_CONFIG")]
    pub config: Option<String>,

    #[arg(long, env = "CIPHER_MEMORY_URL")]
    pub memory_url: Option<String>,

    #[arg(long, env = "PRESIGN_URL")]
    pub presign_url: Option<String>,

    #[arg(long, env = "PRESIGN_SHARED_SECRET", hide_env_values = true)]
    pub presign_secret: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(long, env = "METRICS_PORT")]
    pub port: Option<u16>,

    /// Listen address
    #[arg(long, env = "METRICS_BIND")]
    pub bind: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct ArchiveArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// CSV file to upload
    pub csv: String,

    #[arg(long, default_value = lab_bridge::DEFAULT_BUCKET)]
    pub bucket: String,

    /// Object key (default: llama-throughput-lab/<file name>)
    #[arg(long)]
    pub key: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct ReasoningArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(long)]
    pub sweep_type: String,

    /// Model path
    #[arg(long)]
    pub model: String,

    /// Best row as a JSON object, e.g. '{"throughput":42.5,"batch":8}'
    #[arg(long)]
    pub best: String,

    #[arg(long)]
    pub csv: String,

    #[arg(long)]
    pub gpu_type: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

impl CommonArgs {
    /// Config file (or the environment when none is given) overlaid
    /// with env/CLI values.
    pub fn effective(&self) -> Result<BridgeConfig, CliError> {
        let mut cfg = match &self.config {
            Some(path) => BridgeConfig::load(path)?,
            None => BridgeConfig::from_env()?,
        };
        if let Some(v) = &self.memory_url {
            cfg.memory_url = v.clone();
        }
        if let Some(v) = &self.presign_url {
            cfg.presign_url = v.clone();
        }
        if let Some(v) = &self.presign_secret {
            cfg.presign_secret = Some(v.clone()).filter(|s| !s.is_empty());
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_every_subcommand() {
        let cli = Cli::try_parse_from(["lab-metrics", "serve", "--port", "9100", "--bind", "127.0.0.1"]).unwrap();
        let Commands::Serve(args) = cli.command else { panic!("expected serve") };
        assert_eq!(args.port, Some(9100));
        assert_eq!(args.bind.as_deref(), Some("127.0.0.1"));

        let cli = Cli::try_parse_from(["lab-metrics", "archive", "/tmp/run.csv", "--key", "k.csv"]).unwrap();
        let Commands::Archive(args) = cli.command else { panic!("expected archive") };
        assert_eq!(args.csv, "/tmp/run.csv");
        assert_eq!(args.bucket, "outputs");
        assert_eq!(args.key.as_deref(), Some("k.csv"));

        let cli = Cli::try_parse_from([
            "lab-metrics", "store-reasoning",
            "--sweep-type", "batch", "--model", "m.gguf",
            "--best", r#"{"throughput":1}"#, "--csv", "c.csv",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::StoreReasoning(_)));
    }

    #[test]
    fn cli_values_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "presign_url = \"http://file:1\"\nmemory_url = \"http://file:2\"\n").unwrap();

        let args = CommonArgs {
            config: Some(path.to_string_lossy().into_owned()),
            memory_url: Some("http://cli:3".into()),
            presign_url: None,
            presign_secret: Some(String::new()),
        };
        let cfg = args.effective().unwrap();
        assert_eq!(cfg.presign_url, "http://file:1");
        assert_eq!(cfg.memory_url, "http://cli:3");
        assert!(cfg.presign_secret.is_none());
    }
}
