// Payment Secret Check
// Works out which secret the payment backend used to sign an order hash.

mod check;
mod config;
mod crypto;
mod datastore;
mod decryptor;
mod hashing;
mod models;

use anyhow::{Context, Result};
use clap::Parser;
use config::{CheckArgs, Cli, Command, SealArgs};
use crypto::MasterKey;
use datastore::{Datastore, MemoryStore, PgDocumentStore};
use tracing_subscriber::EnvFilter;

async fn run_check_command(args: CheckArgs, master_key: Option<&str>) -> Result<i32> {
    let store: Box<dyn Datastore> = match &args.fixture {
        Some(path) => Box::new(
            MemoryStore::from_json_file(path)
                .with_context(|| format!("failed to load fixture {}", path.display()))?,
        ),
        None => Box::new(
            PgDocumentStore::connect(&args.database_url)
                .await
                .context("failed to connect to datastore")?,
        ),
    };

    if master_key.is_none() {
        tracing::warn!("⚠️ MASTER_ENCRYPTION_KEY not set, apiSecret cannot be decrypted");
    }
    let decryptor = args.build_decryptor(master_key);
    let candidates = args.candidates();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome =
        check::run_check(store.as_ref(), decryptor.as_ref(), &args.order_id, &candidates, &mut out)
            .await?;

    tracing::info!("Check finished: {}", outcome.summary());
    Ok(outcome.exit_code())
}

fn run_seal_command(args: SealArgs, master_key: Option<&str>) -> Result<i32> {
    let passphrase = master_key.context("MASTER_ENCRYPTION_KEY must be set to seal a value")?;
    let sealed = MasterKey::derive(passphrase).encrypt(args.plaintext.as_bytes())?;
    println!("{}", sealed);
    Ok(0)
}

// ==================== MAIN ====================
#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    // Logs go to stderr; stdout carries the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let master_key = cli.master_key.as_deref();

    let result = match cli.command {
        Command::Check(args) => run_check_command(args, master_key).await,
        Command::Seal(args) => run_seal_command(args, master_key),
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("❌ {:#}", e);
            1
        }
    };
    std::process::exit(code);
}
