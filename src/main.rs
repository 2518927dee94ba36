// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use meetly_auth::{
    api::router,
    auth::{TokenError, TokenService},
    config::{Config, ConfigError, LogFormat, SESSION_TTL_ENV},
    email::{ChannelDispatcher, MailRelay, DEFAULT_QUEUE_CAPACITY},
    ledger::{KeyValueLedger, LedgerError, MemoryLedger, RedisLedger},
    providers::{GoogleProvider, ProviderError},
    service::AuthService,
    state::AppState,
    storage::{identity_db::IdentityDbError, CredentialStore, IdentityDatabase, InMemoryCredentialStore},
    telemetry::init_tracing,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("token service: {0}")]
    Token(#[from] TokenError),

    #[error("identity database: {0}")]
    Database(#[from] IdentityDbError),

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("identity provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("mail relay: {0}")]
    Relay(#[from] reqwest::Error),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Meetly auth failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    info!(?config, "Configuration loaded");

    let session_ttl = chrono::Duration::from_std(config.session_ttl).map_err(|e| ConfigError::Invalid {
        name: SESSION_TTL_ENV,
        reason: e.to_string(),
    })?;
    let tokens = Arc::new(TokenService::new(&config.jwt_secret, config.jwt_issuer.clone(), session_ttl)?);

    let store: Arc<dyn CredentialStore> = match &config.identity_db_path {
        Some(path) => {
            info!(path = %path.display(), "Opening identity database");
            Arc::new(IdentityDatabase::open(path)?)
        }
        None => {
            warn!("IDENTITY_DB_PATH not set; identities are kept in memory and lost on restart");
            Arc::new(InMemoryCredentialStore::new())
        }
    };

    let ledger: Arc<dyn KeyValueLedger> = match &config.redis_url {
        Some(url) => {
            let ledger = RedisLedger::connect(url).await?;
            info!("Connected to Redis ledger");
            Arc::new(ledger)
        }
        None => {
            warn!("REDIS_URL not set; using a process-local ledger");
            Arc::new(MemoryLedger::new())
        }
    };

    let provider = Arc::new(GoogleProvider::new(config.google.clone())?);

    let shutdown = CancellationToken::new();
    let (mailer, mail_rx) = ChannelDispatcher::channel(DEFAULT_QUEUE_CAPACITY);
    let relay = MailRelay::new(mail_rx, config.email_webhook_url.clone())?;
    let relay_handle = tokio::spawn(relay.run(shutdown.clone()));

    let auth = Arc::new(AuthService::new(
        store,
        tokens.clone(),
        ledger.clone(),
        provider,
        Arc::new(mailer),
        config.confirmation_url.clone(),
    ));
    let state = AppState::new(auth, tokens, ledger, config.request_timeout, shutdown.clone());
    let app = router(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Meetly auth listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = relay_handle.await {
        warn!(error = %e, "Mail relay task ended abnormally");
    }
    info!("Gracefully shutdown");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
