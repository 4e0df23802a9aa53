//! Info command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use hoppyshare_core::{Config, Credentials, HoppyshareService};

/// Display device information; constructing the service proves the group
/// key unwraps with our private key.
pub fn show_info(credentials_path: &Path) -> Result<()> {
    let credentials = Credentials::load(credentials_path)
        .with_context(|| format!("cannot load credentials from {}", credentials_path.display()))?;

    let (service, _events) = HoppyshareService::new(&credentials, Config::default())
        .context("group key unwrap failed")?;

    println!("\n\x1b[1mHoppyShare Device Info\x1b[0m");
    println!("═══════════════════════════════════════");
    println!("\x1b[1mDevice ID:\x1b[0m   {}", service.device_id());
    println!("\x1b[1mSender hash:\x1b[0m {}", service.fingerprint());
    println!("\x1b[1mGroup key:\x1b[0m   unwrapped OK");
    println!();
    Ok(())
}
