//! Vaultline CLI
//!
//! Encrypt, store and govern vaults from the command line.

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vaultline_chain::{EventFilter, EventStream, VaultEvent, VaultlineClient, Wallet};
use vaultline_core::{
    Address, Cid, LoggingConfig, ReleasePolicy, SdkConfig, VaultId, U256,
};
use vaultline_crypto::{content_digest, EncryptedPayload, SecretKey};
use vaultline_storage::{storage_from_config, StorageProvider};

#[derive(Parser)]
#[command(name = "vaultline")]
#[command(author = "Vaultline Contributors")]
#[command(version)]
#[command(about = "Encrypted vaults with on-chain release policies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "VAULTLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Account private key (hex) used to sign transactions
    #[arg(long, global = true, env = "VAULTLINE_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an account key and a vault encryption key
    Keygen {
        /// Output directory for keys
        #[arg(short, long, default_value = "~/.vaultline/keys")]
        output: PathBuf,
    },

    /// Encrypt a file with a vault key
    Encrypt {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Decrypt a file produced by `encrypt`
    Decrypt {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Vault factory operations
    Vault {
        #[command(subcommand)]
        vault: VaultCommands,
    },

    /// Release policy operations
    Timelock {
        #[command(subcommand)]
        timelock: TimelockCommands,
    },

    /// Oracle attestations
    Attest {
        #[command(subcommand)]
        attest: AttestCommands,
    },

    /// AI guardian operations
    Ai {
        #[command(subcommand)]
        ai: AiCommands,
    },

    /// Contract event subscriptions
    Events {
        #[command(subcommand)]
        events: EventCommands,
    },

    /// Show configuration and node status
    Info,
}

#[derive(Args)]
struct KeyArgs {
    /// Vault key (hex)
    #[arg(long = "key", env = "VAULTLINE_VAULT_KEY", hide_env_values = true)]
    hex: Option<String>,

    /// File holding the vault key (hex)
    #[arg(long, conflicts_with = "hex")]
    key_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum VaultCommands {
    /// Encrypt a file, upload it and record a new vault
    Create {
        file: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Show a vault; with --output, download and decrypt its content
    Get {
        #[arg(value_parser = parse_u256)]
        id: VaultId,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// List vault ids owned by an address (defaults to the signer)
    List {
        #[arg(value_parser = parse_address)]
        owner: Option<Address>,
    },
    /// Replace a vault's content
    Update {
        #[arg(value_parser = parse_u256)]
        id: VaultId,
        file: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Deactivate a vault
    Deactivate {
        #[arg(value_parser = parse_u256)]
        id: VaultId,
    },
}

#[derive(Subcommand)]
enum TimelockCommands {
    /// Set the release policy. Give --release-at, --check-in-interval or both (hybrid).
    Configure {
        #[arg(value_parser = parse_u256)]
        id: VaultId,
        /// Release time, RFC 3339 (e.g. 2030-01-01T00:00:00Z)
        #[arg(long)]
        release_at: Option<chrono::DateTime<chrono::Utc>>,
        /// Deadman check-in interval in seconds
        #[arg(long)]
        check_in_interval: Option<u64>,
    },
    /// Prove liveness for a deadman vault
    CheckIn {
        #[arg(value_parser = parse_u256)]
        id: VaultId,
    },
    /// Show the release policy and time remaining
    Status {
        #[arg(value_parser = parse_u256)]
        id: VaultId,
    },
    /// Release a vault whose conditions are met
    Trigger {
        #[arg(value_parser = parse_u256)]
        id: VaultId,
    },
}

#[derive(Subcommand)]
enum AttestCommands {
    /// Ask the oracle network to attest a condition
    Request {
        #[arg(value_parser = parse_u256)]
        vault_id: VaultId,
        condition: String,
        /// CID of supporting evidence
        #[arg(long)]
        evidence: Cid,
    },
    /// Show an attestation (or the latest for --vault)
    Status {
        #[arg(value_parser = parse_u256, required_unless_present = "vault")]
        request_id: Option<U256>,
        #[arg(long, value_parser = parse_u256)]
        vault: Option<VaultId>,
    },
    /// Wait for an attestation to be decided
    Wait {
        #[arg(value_parser = parse_u256)]
        request_id: U256,
        #[arg(long, default_value = "600")]
        timeout_secs: u64,
        #[arg(long, default_value = "5000")]
        poll_ms: u64,
    },
}

#[derive(Subcommand)]
enum AiCommands {
    /// Attach an AI guardian to a vault
    Enable {
        #[arg(value_parser = parse_u256)]
        vault_id: VaultId,
        model_cid: Cid,
        /// Risk threshold in basis points (0-10000)
        #[arg(long, default_value = "7500")]
        threshold: u16,
    },
    /// Request a fresh evaluation
    Evaluate {
        #[arg(value_parser = parse_u256)]
        vault_id: VaultId,
    },
    /// Show guardian state
    Status {
        #[arg(value_parser = parse_u256)]
        vault_id: VaultId,
    },
}

#[derive(Subcommand)]
enum EventCommands {
    /// Stream contract events as JSON lines
    Watch {
        /// Event kinds to show (repeatable); all when omitted
        #[arg(long = "kind")]
        kinds: Vec<String>,
        /// Only events about this vault
        #[arg(long, value_parser = parse_u256)]
        vault: Option<VaultId>,
    },
}

fn parse_u256(s: &str) -> Result<U256, String> {
    U256::from_str(s.trim()).map_err(|e| format!("invalid number {:?}: {}", s, e))
}

fn parse_address(s: &str) -> Result<Address, String> {
    Address::from_str(s.trim()).map_err(|e| format!("invalid address {:?}: {}", s, e))
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false),
            )
            .init();
    }
}

fn expand_path(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SdkConfig> {
    match path {
        Some(path) => SdkConfig::load(Some(&expand_path(path)))
            .with_context(|| format!("loading {}", path.display())),
        None => {
            let default_path = expand_path(Path::new("~/.vaultline/config.toml"));
            let found = default_path.exists().then_some(default_path);
            Ok(SdkConfig::load(found.as_deref())?)
        }
    }
}

fn load_key(args: &KeyArgs) -> anyhow::Result<SecretKey> {
    let encoded = match (&args.hex, &args.key_file) {
        (Some(hex), _) => hex.clone(),
        (None, Some(path)) => {
            let path = expand_path(path);
            std::fs::read_to_string(&path)
                .with_context(|| format!("reading key file {}", path.display()))?
        }
        (None, None) => bail!("a vault key is required (--key, --key-file or VAULTLINE_VAULT_KEY)"),
    };
    Ok(SecretKey::from_hex(encoded.trim())?)
}

fn seal(key: &SecretKey, path: &Path) -> anyhow::Result<Vec<u8>> {
    let plaintext =
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(vaultline_crypto::encrypt(key, &plaintext)?.to_bytes())
}

fn open(key: &SecretKey, sealed: &[u8]) -> anyhow::Result<Vec<u8>> {
    let payload = EncryptedPayload::from_bytes(sealed)?;
    Ok(vaultline_crypto::decrypt(key, &payload)?)
}

struct App {
    config: SdkConfig,
    private_key: Option<String>,
}

impl App {
    fn client(&self) -> anyhow::Result<VaultlineClient> {
        let client = VaultlineClient::connect(&self.config)?;
        match &self.private_key {
            Some(key) => Ok(client.with_wallet(Wallet::from_private_key(key)?)),
            None => Ok(client),
        }
    }

    fn signer(&self) -> anyhow::Result<VaultlineClient> {
        if self.private_key.is_none() {
            bail!("this command sends a transaction; pass --private-key or set VAULTLINE_PRIVATE_KEY");
        }
        self.client()
    }

    fn storage(&self) -> anyhow::Result<Arc<dyn StorageProvider>> {
        Ok(storage_from_config(&self.config.storage)?)
    }

    /// Encrypt `file` and upload it, pinning where supported
    async fn store(&self, file: &Path, key: &KeyArgs) -> anyhow::Result<Cid> {
        let sealed = seal(&load_key(key)?, file)?;
        let storage = self.storage()?;
        tracing::debug!(digest = %hex::encode(content_digest(&sealed)), bytes = sealed.len(), "vault payload sealed");
        let cid = storage.upload(&sealed).await?;
        if let Err(e) = storage.pin(&cid).await {
            tracing::warn!(cid = %cid, error = %e, "pinning failed; content may be garbage collected");
        }
        println!("Stored {} bytes as {} via {}", sealed.len(), cid, storage.name());
        Ok(cid)
    }
}

fn print_json(value: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.logging);

    let ctx = App {
        config,
        private_key: cli.private_key,
    };

    match cli.command {
        Commands::Keygen { output } => {
            let output_dir = expand_path(&output);
            std::fs::create_dir_all(&output_dir)?;

            tracing::info!("Generating keys...");
            let wallet = Wallet::random();
            let vault_key = SecretKey::generate();

            let account_path = output_dir.join("account.key");
            let vault_key_path = output_dir.join("vault.key");
            std::fs::write(&account_path, wallet.private_key_hex())?;
            std::fs::write(&vault_key_path, vault_key.to_hex())?;
            std::fs::write(output_dir.join("account.address"), wallet.address().to_string())?;

            println!("Keys generated successfully!");
            println!("Address:     {}", wallet.address());
            println!("Account key: {}", account_path.display());
            println!("Vault key:   {}", vault_key_path.display());
        }

        Commands::Encrypt { input, output, key } => {
            let sealed = seal(&load_key(&key)?, &input)?;
            std::fs::write(&output, &sealed)?;
            println!("Encrypted {} -> {} ({} bytes)", input.display(), output.display(), sealed.len());
        }

        Commands::Decrypt { input, output, key } => {
            let sealed = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
            let plaintext = open(&load_key(&key)?, &sealed)?;
            std::fs::write(&output, &plaintext)?;
            println!("Decrypted {} -> {} ({} bytes)", input.display(), output.display(), plaintext.len());
        }

        Commands::Vault { vault } => run_vault(&ctx, vault).await?,
        Commands::Timelock { timelock } => run_timelock(&ctx, timelock).await?,
        Commands::Attest { attest } => run_attest(&ctx, attest).await?,
        Commands::Ai { ai } => run_ai(&ctx, ai).await?,

        Commands::Events {
            events: EventCommands::Watch { kinds, vault },
        } => {
            let mut filter = EventFilter::new();
            for kind in &kinds {
                filter.subscribe(kind);
            }
            if let Some(vault) = vault {
                filter.only_vault(vault);
            }

            let mut stream = EventStream::from_config(&ctx.config)?;
            stream.set_filter(filter);
            let mut events = stream.subscribe();
            stream.connect().await?;

            loop {
                tokio::select! {
                    received = events.recv() => match received {
                        Ok(VaultEvent::ConnectionLost { reason }) => bail!("connection lost: {}", reason),
                        Ok(event) => println!("{}", serde_json::to_string(&event)?),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event consumer lagging");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        stream.disconnect();
                        break;
                    }
                }
            }
        }

        Commands::Info => {
            println!("Vaultline v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("RPC:       {}", ctx.config.network.rpc_url);
            println!("WebSocket: {}", ctx.config.network.ws_url);
            println!("Storage:   {:?} (mock fallback: {})", ctx.config.storage.provider, ctx.config.storage.mock_fallback);
            println!();
            println!("Contracts:");
            let contracts = &ctx.config.contracts;
            for (name, address) in [
                ("vault_factory", contracts.vault_factory),
                ("time_lock_manager", contracts.time_lock_manager),
                ("attestation_hub", contracts.attestation_hub),
                ("ai_vault_manager", contracts.ai_vault_manager),
            ] {
                if address.is_zero() {
                    println!("  {:<18} not configured", name);
                } else {
                    println!("  {:<18} {}", name, address);
                }
            }
            println!();

            let client = ctx.client()?;
            match (client.chain_id().await, client.provider().block_number().await) {
                (Ok(chain_id), Ok(block)) => println!("Node:      chain {} at block {}", chain_id, block),
                (Err(e), _) | (_, Err(e)) => println!("Node:      unreachable ({})", e),
            }
            match client.address() {
                Some(address) => {
                    let balance = client.provider().balance(address).await.ok();
                    match balance {
                        Some(wei) => println!("Signer:    {} ({} wei)", address, wei),
                        None => println!("Signer:    {}", address),
                    }
                }
                None => println!("Signer:    none (read-only)"),
            }
        }
    }

    Ok(())
}

async fn run_vault(ctx: &App, command: VaultCommands) -> anyhow::Result<()> {
    match command {
        VaultCommands::Create { file, key } => {
            let client = ctx.signer()?;
            let cid = ctx.store(&file, &key).await?;
            let (vault_id, outcome) = client.vaults().create_vault(&cid).await?;
            println!("Vault {} created (tx {})", vault_id, outcome.tx_hash);
        }

        VaultCommands::Get { id, output, key } => {
            let client = ctx.client()?;
            let vault = client.vaults().get_vault(id).await?;
            print_json(serde_json::to_value(&vault)?)?;

            if let Some(output) = output {
                let sealed = ctx.storage()?.fetch(&vault.cid).await?;
                let plaintext = open(&load_key(&key)?, &sealed)?;
                std::fs::write(&output, plaintext)?;
                println!("Content written to {}", output.display());
            }
        }

        VaultCommands::List { owner } => {
            let client = ctx.client()?;
            let owner = owner
                .or_else(|| client.address())
                .ok_or_else(|| anyhow!("pass an owner address or --private-key"))?;
            let ids = client.vaults().vaults_of(owner).await?;
            if ids.is_empty() {
                println!("No vaults owned by {}", owner);
            }
            for id in ids {
                println!("{}", id);
            }
        }

        VaultCommands::Update { id, file, key } => {
            let client = ctx.signer()?;
            let cid = ctx.store(&file, &key).await?;
            let outcome = client.vaults().update_vault(id, &cid).await?;
            println!("Vault {} now points at {} (tx {})", id, cid, outcome.tx_hash);
        }

        VaultCommands::Deactivate { id } => {
            let outcome = ctx.signer()?.vaults().deactivate_vault(id).await?;
            println!("Vault {} deactivated (tx {})", id, outcome.tx_hash);
        }
    }
    Ok(())
}

async fn run_timelock(ctx: &App, command: TimelockCommands) -> anyhow::Result<()> {
    match command {
        TimelockCommands::Configure {
            id,
            release_at,
            check_in_interval,
        } => {
            let interval = check_in_interval
                .map(|secs| {
                    i64::try_from(secs)
                        .ok()
                        .and_then(chrono::Duration::try_seconds)
                        .ok_or_else(|| anyhow!("check-in interval {} is too large", secs))
                })
                .transpose()?;

            let policy = match (release_at, interval) {
                (Some(release_at), None) => ReleasePolicy::Scheduled { release_at },
                (None, Some(check_in_interval)) => ReleasePolicy::Deadman { check_in_interval },
                (Some(release_at), Some(check_in_interval)) => ReleasePolicy::Hybrid {
                    release_at,
                    check_in_interval,
                },
                (None, None) => bail!("give --release-at, --check-in-interval, or both"),
            };

            let outcome = ctx.signer()?.time_locks().configure_release(id, &policy).await?;
            println!("{} release configured for vault {} (tx {})", policy.release_type(), id, outcome.tx_hash);
        }

        TimelockCommands::CheckIn { id } => {
            let outcome = ctx.signer()?.time_locks().check_in(id).await?;
            println!("Checked in for vault {} (tx {})", id, outcome.tx_hash);
        }

        TimelockCommands::Status { id } => {
            let client = ctx.client()?;
            let time_locks = client.time_locks();
            let lock = time_locks.get_time_lock(id).await?;
            let releasable = time_locks.is_releasable(id).await?;

            println!("Vault:         {}", id);
            println!("Release type:  {}", lock.release_type);
            if let Some(at) = lock.release_at {
                println!("Release at:    {}", at.to_rfc3339());
            }
            if let Some(interval) = lock.check_in_interval {
                println!("Check-in every {}s", interval.num_seconds());
            }
            if let Some(last) = lock.last_check_in {
                println!("Last check-in: {}", last.to_rfc3339());
            }
            match lock.time_remaining(chrono::Utc::now()) {
                _ if lock.released => println!("Status:        released"),
                Some(left) => println!("Time left:     {}s", left.num_seconds()),
                None => println!("Time left:     unknown"),
            }
            println!("Releasable:    {}", releasable);
        }

        TimelockCommands::Trigger { id } => {
            let outcome = ctx.signer()?.time_locks().trigger_release(id).await?;
            println!("Vault {} released (tx {})", id, outcome.tx_hash);
        }
    }
    Ok(())
}

async fn run_attest(ctx: &App, command: AttestCommands) -> anyhow::Result<()> {
    match command {
        AttestCommands::Request {
            vault_id,
            condition,
            evidence,
        } => {
            let (request_id, outcome) = ctx
                .signer()?
                .attestations()
                .request_attestation(vault_id, &condition, &evidence)
                .await?;
            println!("Attestation {} requested (tx {})", request_id, outcome.tx_hash);
        }

        AttestCommands::Status { request_id, vault } => {
            let client = ctx.client()?;
            let attestations = client.attestations();
            let request_id = match (request_id, vault) {
                (Some(id), _) => id,
                (None, Some(vault)) => attestations
                    .latest_for_vault(vault)
                    .await?
                    .ok_or_else(|| anyhow!("no attestation requested for vault {}", vault))?,
                (None, None) => bail!("give a request id or --vault"),
            };

            let attestation = attestations.get_attestation(request_id).await?;
            println!("Request:   {}", attestation.request_id);
            println!("Vault:     {}", attestation.vault_id);
            println!("Status:    {:?}", attestation.status);
            println!(
                "Votes:     {} approve / {} reject (threshold {})",
                attestation.approvals, attestation.rejections, attestation.threshold
            );
            if let Some(at) = attestation.finalized_at {
                println!("Finalized: {}", at.to_rfc3339());
            }
        }

        AttestCommands::Wait {
            request_id,
            timeout_secs,
            poll_ms,
        } => {
            let attestation = ctx
                .client()?
                .attestations()
                .wait_for_final(
                    request_id,
                    Duration::from_millis(poll_ms),
                    Duration::from_secs(timeout_secs),
                )
                .await?;
            println!("Attestation {} finalized: {:?}", request_id, attestation.status);
        }
    }
    Ok(())
}

async fn run_ai(ctx: &App, command: AiCommands) -> anyhow::Result<()> {
    match command {
        AiCommands::Enable {
            vault_id,
            model_cid,
            threshold,
        } => {
            let outcome = ctx
                .signer()?
                .ai_vaults()
                .enable_guardian(vault_id, &model_cid, threshold)
                .await?;
            println!("AI guardian enabled for vault {} (tx {})", vault_id, outcome.tx_hash);
        }

        AiCommands::Evaluate { vault_id } => {
            let outcome = ctx.signer()?.ai_vaults().request_evaluation(vault_id).await?;
            println!("Evaluation requested for vault {} (tx {})", vault_id, outcome.tx_hash);
        }

        AiCommands::Status { vault_id } => {
            let state = ctx.client()?.ai_vaults().get_state(vault_id).await?;
            println!("Vault:          {}", state.vault_id);
            println!("Enabled:        {}", state.enabled);
            println!("Risk score:     {} / {} bps", state.risk_score, state.risk_threshold);
            println!("Recommendation: {:?}", state.recommendation);
            if let Some(model) = &state.model_cid {
                println!("Model:          {}", model);
            }
            if let Some(at) = state.last_evaluated {
                println!("Evaluated:      {}", at.to_rfc3339());
            }
            if state.exceeds_threshold() {
                println!("Risk threshold exceeded");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_u256("42").unwrap(), U256::from(42));
        assert_eq!(parse_u256("0x2a").unwrap(), U256::from(42));
        assert!(parse_u256("forty-two").is_err());
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_timelock_args() {
        let cli = Cli::try_parse_from([
            "vaultline",
            "timelock",
            "configure",
            "7",
            "--release-at",
            "2030-01-01T00:00:00Z",
            "--check-in-interval",
            "86400",
        ])
        .unwrap();

        match cli.command {
            Commands::Timelock {
                timelock:
                    TimelockCommands::Configure {
                        id,
                        release_at,
                        check_in_interval,
                    },
            } => {
                assert_eq!(id, U256::from(7));
                assert_eq!(release_at.unwrap().timestamp(), 1_893_456_000);
                assert_eq!(check_in_interval, Some(86_400));
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_expand_path() {
        let plain = Path::new("/tmp/vault.key");
        assert_eq!(expand_path(plain), plain);
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path(Path::new("~/keys")), home.join("keys"));
        }
    }
}
