//! Signature set listing

use anyhow::Result;

use hlekkr_analysis::signatures::builtin_signatures;

pub fn run() -> Result<()> {
    for signature in builtin_signatures() {
        println!(
            "{:<26} {:<22} threshold={:.2} base={}",
            signature.id,
            signature.manipulation_type.as_str(),
            signature.confidence_threshold,
            signature.severity_base,
        );
        println!("    {}", signature.indicators.join(", "));
    }
    Ok(())
}
