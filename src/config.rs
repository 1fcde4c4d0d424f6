// CLI Configuration
use crate::decryptor::{InProcessDecryptor, NodeDecryptor, SecretDecryptor};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Secrets tried when none are given on the command line.
pub const DEFAULT_CANDIDATES: [&str; 5] = [
    "test_secret_abcdef",
    "test_api_key_67890",
    "test_merchant_12345",
    "",
    "production",
];

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/pubg_uc_store";

#[derive(Debug, Parser)]
#[command(
    name = "payment-secret-check",
    version,
    about = "Find which secret signed a stored order hash"
)]
pub struct Cli {
    /// Passphrase the provider credentials are encrypted under
    #[arg(long, env = "MASTER_ENCRYPTION_KEY", hide_env_values = true, global = true)]
    pub master_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compare candidate secrets and the decrypted apiSecret against an order's expected hash
    Check(CheckArgs),
    /// Encrypt a value the way provider credentials are stored
    Seal(SealArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DecryptorKind {
    InProcess,
    Node,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[arg(long, env = "ORDER_ID")]
    pub order_id: String,

    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Read documents from a JSON export instead of the database
    #[arg(long, env = "FIXTURE_FILE")]
    pub fixture: Option<PathBuf>,

    /// Candidate secret; repeat the flag or pass a comma separated list
    #[arg(long = "candidate", env = "CANDIDATE_SECRETS", value_delimiter = ',')]
    pub candidates: Vec<String>,

    #[arg(long, value_enum, default_value_t = DecryptorKind::InProcess)]
    pub decryptor: DecryptorKind,

    #[arg(long, default_value = "node")]
    pub node_bin: String,

    #[arg(long, default_value = "/app")]
    pub node_workdir: PathBuf,

    #[arg(long, default_value_t = 30)]
    pub node_timeout_secs: u64,
}

#[derive(Debug, Args)]
pub struct SealArgs {
    #[arg(long)]
    pub plaintext: String,
}

impl CheckArgs {
    pub fn candidates(&self) -> Vec<String> {
        if self.candidates.is_empty() {
            DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect()
        } else {
            self.candidates.clone()
        }
    }

    pub fn build_decryptor(&self, master_key: Option<&str>) -> Box<dyn SecretDecryptor> {
        match self.decryptor {
            DecryptorKind::InProcess => Box::new(InProcessDecryptor::new(master_key)),
            DecryptorKind::Node => Box::new(NodeDecryptor {
                program: self.node_bin.clone(),
                master_key: master_key.map(str::to_string),
                workdir: self.node_workdir.clone(),
                timeout: Duration::from_secs(self.node_timeout_secs),
            }),
        }
    }
}
