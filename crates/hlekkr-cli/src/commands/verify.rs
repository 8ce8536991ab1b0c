//! Offline custody chain verification

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use hlekkr_custody::{CustodyEvent, CustodyLedger, CustodySigner, StaticKeySource};
use hlekkr_persist::MemoryBackend;

#[derive(Args)]
pub struct VerifyArgs {
    /// Path to an exported chain (JSON array of custody events)
    #[arg(long)]
    pub chain: PathBuf,

    /// Signing secret the chain was signed with
    #[arg(long)]
    pub key: String,
}

pub async fn run(args: VerifyArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.chain)
        .with_context(|| format!("reading {}", args.chain.display()))?;
    let events: Vec<CustodyEvent> =
        serde_json::from_str(&raw).context("parsing exported chain")?;

    let signer = CustodySigner::initialize(&StaticKeySource::new(args.key.as_bytes()))
        .await
        .context("initializing signer")?;
    // The ledger only verifies here; no store access happens
    let ledger = CustodyLedger::new(std::sync::Arc::new(MemoryBackend::new()), signer.clone());

    println!("events: {}", events.len());
    for (i, event) in events.iter().enumerate() {
        let signature_ok = signer.verify(event);
        let link_ok = i == 0
            || event.previous_event_hash.as_deref()
                == Some(events[i - 1].event_hash.as_str());
        println!(
            "  [{i}] {} {} signature={} link={}",
            event.stage,
            event.action,
            if signature_ok { "ok" } else { "FAIL" },
            if link_ok { "ok" } else { "BROKEN" },
        );
    }

    let verdict = ledger.verify_events(&events);
    println!("verdict: {verdict}");
    if verdict != hlekkr_custody::ChainVerdict::Valid {
        std::process::exit(1);
    }
    Ok(())
}
