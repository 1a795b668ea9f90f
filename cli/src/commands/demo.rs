// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Demo command
//!
//! Runs one vendor-side authentication request against an in-memory ledger,
//! with a simulated enduser wallet answering from a background task.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ledgerauth_core::application::{AuthRequest, AuthServices, EnduserResponder};
use ledgerauth_core::domain::auth_session::{AuthSessionParams, SessionState};
use ledgerauth_core::domain::config::{AuthConfig, PollingPolicy};
use ledgerauth_core::domain::document::RequestKind;
use ledgerauth_core::domain::error::AuthError;
use ledgerauth_core::domain::events::AuthEvent;
use ledgerauth_core::infrastructure::{EventBus, InMemoryDirectory, InMemoryDocumentStore, X25519AesGcmCrypto};

const DEMO_MNEMONIC: &str =
    "uniform analyst paper father soldier toe lesson fetch exhaust jazz swim response";

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Request kind: signup (1), login (2) or message (3)
    #[arg(short, long, default_value = "login")]
    pub kind: RequestKind,

    /// Pin the vendor challenges the enduser with
    #[arg(long, default_value = "1234")]
    pub pin: String,

    /// Pin the simulated wallet answers with (default: --pin)
    #[arg(long)]
    pub wallet_pin: Option<String>,

    /// Enduser username
    #[arg(long, default_value = "alice")]
    pub enduser: String,

    /// Vendor username
    #[arg(long, default_value = "bob")]
    pub vendor: String,

    /// Vendor account mnemonic
    #[arg(long, default_value = DEMO_MNEMONIC)]
    pub mnemonic: String,

    /// dApp name shown to the enduser
    #[arg(long, default_value = "ledgerauth demo")]
    pub dapp: String,

    /// Message body for message requests
    #[arg(short, long)]
    pub message: Option<String>,

    /// Status code the wallet answers with ("0" accepts)
    #[arg(long, default_value = "0")]
    pub status: String,

    /// Do not start the simulated wallet
    #[arg(long)]
    pub no_wallet: bool,

    /// Override polling timeout (ms)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Override polling frequency (ms)
    #[arg(long)]
    pub frequency_ms: Option<u64>,

    /// Override initial polling delay (ms)
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

/// What a demo run produced.
#[derive(Debug)]
pub struct DemoReport {
    pub state: SessionState,
    pub correlation_token: Option<String>,
    pub events: Vec<AuthEvent>,
    pub error: Option<String>,
}

impl DemoReport {
    pub fn is_accepted(&self) -> bool {
        self.error.is_none() && matches!(self.state, SessionState::Verified(_))
    }
}

pub async fn execute(args: DemoArgs, config_override: Option<PathBuf>) -> Result<()> {
    let mut config = AuthConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);
    config.validate().context("Configuration validation failed")?;

    println!(
        "{}",
        format!(
            "Running {} request: vendor '{}' → enduser '{}' on {}",
            args.kind, args.vendor, args.enduser, config.network
        )
        .bold()
    );
    println!();

    let report = run(&args, config).await?;

    for event in &report.events {
        print_event(event);
    }
    println!();

    match &report.error {
        None => {
            println!("{}", format!("✓ Enduser '{}' authenticated", args.enduser).green());
            Ok(())
        }
        Some(error) => {
            println!("{}", format!("✗ Authentication failed: {}", error).red());
            anyhow::bail!("session ended {}", report.state)
        }
    }
}

fn apply_overrides(config: &mut AuthConfig, args: &DemoArgs) {
    if let Some(ms) = args.timeout_ms {
        config.polling.response_polling_timeout_ms = ms;
    }
    if let Some(ms) = args.frequency_ms {
        config.polling.response_polling_frequency_ms = ms;
    }
    if let Some(ms) = args.delay_ms {
        config.polling.response_polling_delay_ms = ms;
    }
}

/// Run the full create → submit → poll → verify flow.
///
/// Protocol failures end up in [`DemoReport::error`]; only setup problems
/// are returned as `Err`.
pub async fn run(args: &DemoArgs, config: AuthConfig) -> Result<DemoReport> {
    let directory = InMemoryDirectory::new();
    let store = InMemoryDocumentStore::new();
    let crypto = Arc::new(X25519AesGcmCrypto::new());

    let enduser = directory.register_generated(&args.enduser, None).await;
    let vendor = directory.register_generated(&args.vendor, Some(&args.mnemonic)).await;
    store.register_identity(&enduser).await;
    store.register_identity(&vendor).await;
    debug!(enduser = %enduser.id, vendor = %vendor.id, "Demo identities registered");

    let events = EventBus::with_default_capacity();
    let mut receiver = events.subscribe();

    let params = AuthSessionParams {
        request_kind: args.kind.code(),
        enduser_name: args.enduser.clone(),
        pin: args.pin.clone(),
        vendor_name: args.vendor.clone(),
        vendor_mnemonic: args.mnemonic.clone(),
        dapp_name: args.dapp.clone(),
        message_body: args.message.clone(),
    };
    let services = AuthServices {
        crypto: crypto.clone(),
        directory: Arc::new(directory.clone()),
        store: Arc::new(store.clone()),
        events: Some(events.clone()),
    };
    let mut request = AuthRequest::new(params, config.clone(), services)
        .context("Invalid demo request")?;
    let policy = request.polling_policy();

    let cancel = CancellationToken::new();
    let wallet = if args.no_wallet {
        None
    } else {
        let mut public_vendor = vendor.clone();
        public_vendor.private_key = None;
        let responder = EnduserResponder::new(
            crypto.clone(),
            Arc::new(store.clone()),
            enduser.clone(),
            public_vendor,
            config.login_contract_id()?,
        )?
        .with_status(args.status.clone());

        let kind = args.kind;
        let pin = args.wallet_pin.clone().unwrap_or_else(|| args.pin.clone());
        let wallet_policy = PollingPolicy::new(
            policy.timeout + policy.initial_delay,
            (policy.frequency / 4).max(Duration::from_millis(10)),
            Duration::ZERO,
        );
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            responder.wait_and_respond(kind, &pin, &wallet_policy, &cancel).await
        }))
    };

    let outcome = drive(&mut request, policy).await;
    cancel.cancel();

    if let Some(wallet) = wallet {
        match wallet.await {
            Ok(Ok(submitted)) => debug!(document_id = %submitted.document_id, "Wallet responded"),
            Ok(Err(e)) => warn!(error = %format!("{:#}", e), "Wallet did not respond"),
            Err(e) => warn!(error = %e, "Wallet task failed"),
        }
    }

    let mut seen = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        seen.push(event);
    }

    Ok(DemoReport {
        state: request.state().clone(),
        correlation_token: request.correlation_token().map(str::to_string),
        events: seen,
        error: outcome.err().map(|e| e.to_string()),
    })
}

async fn drive(request: &mut AuthRequest, policy: PollingPolicy) -> Result<(), AuthError> {
    request.create().await?;
    request.submit().await?;
    request.poll_for_response(policy).await?;
    request.verify().await?;
    Ok(())
}

fn print_event(event: &AuthEvent) {
    match event {
        AuthEvent::RequestCreated { request_kind, enduser, vendor, correlation_token, .. } => {
            println!(
                "  {} {} request {} → {} (token {})",
                "created".cyan(),
                request_kind,
                vendor,
                enduser,
                correlation_token.dimmed()
            );
        }
        AuthEvent::RequestSubmitted { document_id, .. } => {
            println!("  {} request document {}", "submitted".cyan(), document_id);
        }
        AuthEvent::ResponsesFound { candidates, attempts, .. } => {
            println!(
                "  {} {} candidate response(s) after {} attempt(s)",
                "found".cyan(),
                candidates,
                attempts
            );
        }
        AuthEvent::VerificationSucceeded { response_id, .. } => {
            let id = response_id.as_ref().map(|id| id.to_string()).unwrap_or_default();
            println!("  {} response {}", "verified".green(), id);
        }
        AuthEvent::VerificationFailed { reason, .. } => {
            println!("  {} {}", "failed".red(), reason);
        }
    }
}
