//! AgriDash server binary.

use agridash::auth::{hash_password, KeyManager};
use agridash::config::ServerConfig;
use agridash::database::Database;
use agridash::models::{NewUser, Role};
use agridash::server::{run_server, state::AppState};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("agridash=info,tower_http=info")
            }),
        )
        .init();

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              AgriDash - Farm Dashboard                     ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let config = ServerConfig::from_env();

    println!("🔧 Initializing database...");
    let db = Arc::new(Database::open(&config.data_dir)?);
    println!("   ✓ Database ready in {}", config.data_dir.display());

    println!("🔧 Loading session keys...");
    let keys = Arc::new(KeyManager::load_or_generate(&config.data_dir)?);
    println!("   ✓ Public key: {}", keys.public_key_base64());

    bootstrap_admin(&db, &config)?;

    let state = Arc::new(AppState::new(db, keys));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    ctrlc::set_handler(move || {
        println!("\n🛑 Shutdown signal received...");
        let _ = shutdown_tx.send(true);
    })?;

    let addr = config.socket_addr();
    println!();
    println!("════════════════════════════════════════════════════════════════");
    println!("🌐 API available at http://{}", addr);
    println!("   • POST /api/auth/login          - Sign in");
    println!("   • GET  /api/dashboard           - Landing summary");
    println!("   • GET  /api/analytics/...       - Inventory, invoice and plate analytics");
    println!("   • WS   /ws?token=...            - Real-time updates");
    println!("   Press Ctrl+C to quit");
    println!("════════════════════════════════════════════════════════════════");
    println!();

    run_server(addr, state, shutdown_rx).await?;

    println!("\n👋 AgriDash has exited. Goodbye!");
    Ok(())
}

/// Creates the first admin from `AGRIDASH_ADMIN_EMAIL` / `AGRIDASH_ADMIN_PASSWORD`
/// when the user table is empty.
fn bootstrap_admin(db: &Database, config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if db.count_users()? > 0 {
        return Ok(());
    }

    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        tracing::warn!("No users yet; complete registration or set AGRIDASH_ADMIN_EMAIL and AGRIDASH_ADMIN_PASSWORD");
        return Ok(());
    };

    let user = db.create_user(&NewUser {
        email: email.trim().to_lowercase(),
        name: "Administrator".into(),
        password_hash: hash_password(password)?,
        role: Role::Admin,
        farm_name: None,
        farm_location: None,
        plan: None,
    })?;
    println!("   ✓ Bootstrap admin created: {}", user.email);
    Ok(())
}
