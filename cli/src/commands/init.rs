//! Local provisioning: RSA keypair plus a wrapped group key.
//!
//! Stand-in for the backend's add-device flow so a local fleet can be tested
//! offline. Every `init` mints a fresh group key; devices provisioned by the
//! backend share one instead.

use std::path::Path;

use anyhow::{bail, Context, Result};
use hoppyshare_core::Credentials;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey};
use sha2::Sha256;

pub fn init(path: &Path, device_id: Option<String>, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "credentials already exist at {} (use --force to overwrite)",
            path.display()
        );
    }

    let device_id = device_id.unwrap_or_else(|| format!("dev-{:08x}", rand::random::<u32>()));

    println!("Generating RSA-2048 device key...");
    let private_key =
        RsaPrivateKey::new(&mut OsRng, 2048).context("failed to generate RSA key")?;

    let mut group_key = [0u8; 32];
    OsRng.fill_bytes(&mut group_key);
    let wrapped_group_key = private_key
        .to_public_key()
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &group_key)
        .context("failed to wrap group key")?;

    let credentials = Credentials {
        device_id,
        wrapped_group_key,
        private_key_pem: private_key
            .to_pkcs8_pem(LineEnding::LF)
            .context("failed to encode private key")?
            .to_string(),
    };
    credentials.save(path)?;

    println!("Wrote credentials for {} to {}", credentials.device_id, path.display());
    Ok(())
}
