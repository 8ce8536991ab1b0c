//! Offline technique classification

use anyhow::{bail, Result};
use clap::Args;
use std::collections::{BTreeSet, HashMap};

use hlekkr_analysis::TechniqueClassifier;

#[derive(Args)]
pub struct ClassifyArgs {
    /// Indicators as `name` or `name=confidence` pairs
    #[arg(required = true)]
    pub indicators: Vec<String>,

    /// Emit the full outcome as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ClassifyArgs) -> Result<()> {
    let mut detected = BTreeSet::new();
    let mut confidences = HashMap::new();

    for raw in &args.indicators {
        match raw.split_once('=') {
            Some((name, confidence)) => {
                let confidence: f64 = confidence
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid confidence in {raw}"))?;
                if !(0.0..=1.0).contains(&confidence) {
                    bail!("confidence must be within 0..1 in {raw}");
                }
                detected.insert(name.to_string());
                confidences.insert(name.to_string(), confidence);
            }
            None => {
                detected.insert(raw.clone());
            }
        }
    }

    let outcome = TechniqueClassifier::new().classify(&detected, &confidences);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("overall severity: {}", outcome.overall_severity);
    println!("max confidence:   {:.2}", outcome.max_confidence);
    for technique in &outcome.classified_techniques {
        println!(
            "  {} ({:?}) confidence={:.2} severity={} evidence={:?}",
            technique.signature_id,
            technique.manipulation_type,
            technique.confidence,
            technique.severity,
            technique.evidence_strength,
        );
    }
    println!("{}", outcome.report.summary);
    Ok(())
}
