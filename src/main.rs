//! Tenantry CLI: administrative entry point for tenant provisioning.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use tenantry_channels::{ChannelSenderConfig, MessageDispatcher};
use tenantry_core::{MessageChannel, MessengerType, RequestContext, TenantId, TenantryError};
use tenantry_platform::{
    AuthConfig, HostDistributionAccount, NamespaceStore, Network, NewOwner, NewTenant, PlatformConfig,
    PlatformDb, ProvisioningManager, SessionUser, TokenManager,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status for a tenant name that is already taken.
const EXIT_DUPLICATE_TENANT: u8 = 2;

#[derive(Parser)]
#[command(name = "tenantry", version, about = "Provision and manage platform tenants")]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true, env = "TENANTRY_CONFIG")]
    config: Option<String>,

    /// Directory holding the tenant directory and namespaces
    #[arg(long, global = true, env = "TENANTRY_DATA_DIR")]
    data_dir: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "TENANTRY_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a new tenant and its owner
    AddTenant {
        name: String,
        owner_first_name: String,
        owner_last_name: String,
        owner_email: String,
        organization_name: String,
        #[command(flatten)]
        provisioning: ProvisioningArgs,
    },
    /// Finish a tenant left in provisioning status by a failed run
    ResumeTenant {
        name: String,
        owner_first_name: String,
        owner_last_name: String,
        owner_email: String,
        #[command(flatten)]
        provisioning: ProvisioningArgs,
    },
    /// List tenants in the directory
    ListTenants {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Session token utilities
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Args)]
struct ProvisioningArgs {
    #[arg(long, env = "NETWORK_TYPE")]
    network_type: Option<Network>,
    /// Native units sent to the tenant distribution account (minimum 5)
    #[arg(long, env = "TENANT_XLM_BOOTSTRAP_AMOUNT")]
    tenant_xlm_bootstrap_amount: Option<i64>,
    #[arg(long, env = "DISTRIBUTION_PUBLIC_KEY")]
    distribution_public_key: Option<String>,
    /// dry_run or smtp
    #[arg(long, env = "EMAIL_SENDER_TYPE")]
    email_sender_type: Option<MessengerType>,
    /// dry_run or http_sms
    #[arg(long, env = "SMS_SENDER_TYPE")]
    sms_sender_type: Option<MessengerType>,
    #[arg(long, env = "SDP_UI_BASE_URL")]
    ui_base_url: Option<String>,
}

impl ProvisioningArgs {
    fn apply(&self, config: &mut PlatformConfig) {
        if let Some(network) = self.network_type {
            config.network = network;
        }
        if let Some(amount) = self.tenant_xlm_bootstrap_amount {
            config.tenant_bootstrap_amount = amount;
        }
        if let Some(ref key) = self.distribution_public_key {
            config.distribution_public_key = Some(key.clone());
        }
        if let Some(ref url) = self.ui_base_url {
            config.ui_base_url = url.clone();
        }
        for (channel, sender_type) in [
            (MessageChannel::Email, self.email_sender_type),
            (MessageChannel::Sms, self.sms_sender_type),
        ] {
            if let Some(sender_type) = sender_type {
                config.channels.sender_for_mut(channel)
                    .get_or_insert_with(ChannelSenderConfig::dry_run)
                    .sender_type = sender_type;
            }
        }
    }
}

#[derive(Args)]
struct KeyArgs {
    /// PEM file with the EC P-256 signing key
    #[arg(long, env = "EC256_PRIVATE_KEY_FILE")]
    private_key_file: Option<String>,
    /// PEM file with the matching public key
    #[arg(long, env = "EC256_PUBLIC_KEY_FILE")]
    public_key_file: Option<String>,
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a session token for a tenant user
    Issue {
        tenant_name: String,
        email: String,
        /// Token lifetime in seconds (defaults to the configured session lifetime)
        #[arg(long)]
        lifetime_secs: Option<i64>,
        #[command(flatten)]
        keys: KeyArgs,
    },
    /// Verify a token and print its claims
    Inspect {
        token: String,
        #[command(flatten)]
        keys: KeyArgs,
    },
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(false)).init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<PlatformConfig> {
    let path = cli.config.as_deref().map(expand).unwrap_or_else(PlatformConfig::default_path);
    let mut config = PlatformConfig::load_from(&path)?;
    if let Some(ref dir) = cli.data_dir {
        config.data_dir = expand(dir);
    }
    Ok(config)
}

fn open_directory(config: &PlatformConfig) -> anyhow::Result<Arc<PlatformDb>> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
    Ok(Arc::new(PlatformDb::open(&config.directory_path())?))
}

fn provisioning_manager(config: &PlatformConfig) -> anyhow::Result<ProvisioningManager> {
    let key = config.distribution_public_key.clone().ok_or_else(|| {
        anyhow!("a distribution account public key is required (--distribution-public-key or DISTRIBUTION_PUBLIC_KEY)")
    })?;
    let ledger = Arc::new(HostDistributionAccount::new(key)?);
    let dispatcher = MessageDispatcher::new(config.shared_registry()?);

    Ok(ProvisioningManager::new(
        open_directory(config)?,
        NamespaceStore::new(config.namespaces_dir()),
        ledger,
        dispatcher,
        config.provisioning_options(),
    ))
}

fn token_manager(config: &PlatformConfig, keys: &KeyArgs) -> anyhow::Result<TokenManager> {
    let auth = match (&keys.private_key_file, &keys.public_key_file) {
        (Some(private_key), Some(public_key)) => {
            AuthConfig::from_pem_files(&expand(private_key), &expand(public_key))?
        }
        _ => config.auth.clone().ok_or_else(|| {
            anyhow!("signing keys are required (--private-key-file and --public-key-file, or [auth] in the config)")
        })?,
    };
    Ok(TokenManager::new(auth))
}

/// Cancel `token` on Ctrl-C so provisioning stops before its next step.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current step");
            token.cancel();
        }
    });
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(&cli)?;
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());
    let ctx = RequestContext::background().with_cancellation(cancel);

    match cli.command {
        Commands::AddTenant {
            name, owner_first_name, owner_last_name, owner_email, organization_name, provisioning,
        } => {
            provisioning.apply(&mut config);
            let manager = provisioning_manager(&config)?;
            let tenant = manager
                .provision_tenant(&ctx, &NewTenant {
                    name, owner_first_name, owner_last_name, owner_email, organization_name,
                })
                .await?;
            println!("{}", tenant.id);
        }
        Commands::ResumeTenant {
            name, owner_first_name, owner_last_name, owner_email, provisioning,
        } => {
            provisioning.apply(&mut config);
            let manager = provisioning_manager(&config)?;
            let owner = NewOwner { first_name: owner_first_name, last_name: owner_last_name, email: owner_email };
            let tenant = manager.resume_tenant(&ctx, &name, &owner).await?;
            println!("{}", tenant.id);
        }
        Commands::ListTenants { json } => {
            let tenants = open_directory(&config)?.list_tenants()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tenants)?);
            } else {
                for t in &tenants {
                    let network = t.network.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
                    println!("{:<24} {:<13} {:<8} {}", t.name, t.status, network, t.id);
                }
            }
        }
        Commands::Token { action: TokenAction::Issue { tenant_name, email, lifetime_secs, keys } } => {
            let tokens = token_manager(&config, &keys)?;
            let tenant = open_directory(&config)?
                .get_tenant_by_name(&tenant_name)?
                .ok_or_else(|| anyhow!("tenant {tenant_name} does not exist"))?;
            let user = NamespaceStore::new(config.namespaces_dir())
                .open(&tenant.schema_name)?
                .get_user_by_email(&email)?
                .ok_or_else(|| anyhow!("no user {email} in tenant {tenant_name}"))?;

            let lifetime = lifetime_secs.unwrap_or(tokens.session_lifetime_secs());
            let expires_at = chrono::Utc::now() + chrono::Duration::seconds(lifetime);
            let ctx = ctx.with_tenant(tenantry_core::TenantContext::Bound(TenantId::new(tenant.id)));
            println!("{}", tokens.issue_token(&ctx, &SessionUser::from(&user), expires_at)?);
        }
        Commands::Token { action: TokenAction::Inspect { token, keys } } => {
            let tokens = token_manager(&config, &keys)?;
            let state = tokens.token_state(&ctx, &token)?;
            println!("state: {state:?}");
            if tokens.validate_token(&ctx, &token)? {
                let claims = tokens.claims_from_token(&ctx, &token)?;
                println!("{}", serde_json::to_string_pretty(&claims)?);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            match e.downcast_ref::<TenantryError>() {
                Some(err) if err.is_duplicate_tenant() => ExitCode::from(EXIT_DUPLICATE_TENANT),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
