mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use rand::RngCore;
use rp_core::config::Config;
use rp_core::{AssetId, Role};
use rp_db::pool::{init_pool, DbPool};
use rp_db::queries::{assets, auth, users};
use rp_db::store::{EntitlementStore, PaymentOutcome, PaymentRecord, SqliteEntitlementStore};
use std::path::Path;

/// Load config from file (defaults if absent), then apply environment
/// overrides.
fn load_config(path: Option<&Path>) -> Config {
    let mut config = Config::load_or_default(path);
    config.apply_env_overrides();
    config
}

fn open_db(config: &Config) -> Result<DbPool> {
    let db_path = &config.server.db_path;
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(init_pool(&db_path.to_string_lossy())?)
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = load_config(config_path);

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting reelpass");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    rp_server::start(config).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelpass=trace,rp_server=trace,rp_db=debug,rp_core=debug,tower_http=debug".to_string()
        } else {
            "reelpass=info,rp_server=info,rp_db=info,tower_http=info".to_string()
        }
    });

    // Logs go to stderr; stdout carries command output (tokens, ids).
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::AddUser { username, admin } => {
            add_user(cli.config.as_deref(), &username, admin)
        }
        Commands::IssueToken { username, hours } => {
            issue_token(cli.config.as_deref(), &username, hours)
        }
        Commands::AddAsset {
            title,
            price,
            storage_key,
            description,
        } => add_asset(
            cli.config.as_deref(),
            &title,
            &description,
            price,
            &storage_key,
        ),
        Commands::SetPrice { asset_id, price } => {
            set_price(cli.config.as_deref(), &asset_id, price)
        }
        Commands::Grant {
            username,
            asset_id,
            payment_ref,
        } => grant(cli.config.as_deref(), &username, &asset_id, &payment_ref),
        Commands::GenerateSecret => generate_secret(),
        Commands::Version => {
            println!("reelpass {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("reading {}", p.display()))?;
            let config = Config::from_json(&contents)?;
            println!("Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Database: {}", config.server.db_path.display());
    println!("  Media dir: {}", config.storage.media_dir.display());
    println!(
        "  Payments: {} ({}), signatures {}",
        config.payment.provider_url,
        config.payment.currency,
        if config.payment.require_signature {
            "required"
        } else {
            "not required"
        }
    );

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("No warnings");
    } else {
        println!("Warnings:");
        for w in warnings {
            println!("  - {w}");
        }
    }
    Ok(())
}

fn add_user(config_path: Option<&Path>, username: &str, admin: bool) -> Result<()> {
    let config = load_config(config_path);
    let db = open_db(&config)?;
    let conn = rp_db::pool::get_conn(&db)?;

    let role = if admin { Role::Admin } else { Role::User };
    let user = users::create_user(&conn, username, role)?;
    println!("{} ({})", user.id, user.role);
    Ok(())
}

fn issue_token(config_path: Option<&Path>, username: &str, hours: Option<u64>) -> Result<()> {
    let config = load_config(config_path);
    let db = open_db(&config)?;
    let conn = rp_db::pool::get_conn(&db)?;

    let user = users::get_user_by_username(&conn, username)?
        .with_context(|| format!("no such user: {username}"))?;

    let ttl = hours.unwrap_or(config.auth.token_ttl_hours);
    let ttl = i64::try_from(ttl)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .context("token lifetime too large")?;
    let expires_at =
        (chrono::Utc::now() + ttl).to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    let token = random_hex(32);
    auth::create_token(&conn, user.id, &token, &expires_at)?;

    tracing::info!(user_id = %user.id, %expires_at, "Issued token");
    println!("{token}");
    Ok(())
}

fn add_asset(
    config_path: Option<&Path>,
    title: &str,
    description: &str,
    price: i64,
    storage_key: &str,
) -> Result<()> {
    let config = load_config(config_path);

    let blob = rp_server::blob::FsBlobStore::new(config.storage.media_dir.clone());
    let path = blob.resolve(storage_key)?;
    if !path.is_file() {
        tracing::warn!("No blob at {} yet; streams will fail until it exists", path.display());
    }

    let db = open_db(&config)?;
    let conn = rp_db::pool::get_conn(&db)?;
    let asset = assets::create_asset(&conn, title, description, price, storage_key)?;
    println!("{}", asset.id);
    Ok(())
}

fn set_price(config_path: Option<&Path>, asset_id: &str, price: i64) -> Result<()> {
    let id: AssetId = asset_id
        .parse()
        .with_context(|| format!("invalid asset id: {asset_id}"))?;

    let config = load_config(config_path);
    let db = open_db(&config)?;
    let conn = rp_db::pool::get_conn(&db)?;

    if !assets::update_price(&conn, id, price)? {
        anyhow::bail!("no such asset: {asset_id}");
    }
    println!("{id} now costs {price}");
    Ok(())
}

fn grant(
    config_path: Option<&Path>,
    username: &str,
    asset_id: &str,
    payment_ref: &str,
) -> Result<()> {
    let id: AssetId = asset_id
        .parse()
        .with_context(|| format!("invalid asset id: {asset_id}"))?;
    let payment_ref = payment_ref.trim();
    if payment_ref.is_empty() {
        anyhow::bail!(rp_core::Error::MissingReference);
    }

    let config = load_config(config_path);
    let db = open_db(&config)?;
    let user = {
        let conn = rp_db::pool::get_conn(&db)?;
        users::get_user_by_username(&conn, username)?
            .with_context(|| format!("no such user: {username}"))?
    };

    let store = SqliteEntitlementStore::new(db);
    let outcome = store.record_payment(&PaymentRecord {
        user_id: user.id,
        asset_id: id,
        payment_ref,
        gateway_order_id: None,
        currency: &config.payment.currency,
        checkout_required: false,
    })?;

    match &outcome {
        PaymentOutcome::AlreadyRecorded(o) => println!("{} (already recorded)", o.id),
        PaymentOutcome::Settled(o) | PaymentOutcome::Inserted(o) => {
            println!("{} paid {} {}", o.id, o.amount, o.currency)
        }
    }
    Ok(())
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

fn generate_secret() -> Result<()> {
    println!("{}", random_hex(32));
    Ok(())
}
