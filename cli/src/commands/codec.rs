//! Envelope encode/decode and fragmentation preview.

use std::path::Path;

use anyhow::{bail, Context, Result};
use hoppyshare_core::protocol::{constants, fragment, Chunk};
use hoppyshare_core::{Config, Credentials, HoppyshareService};

fn open_service(credentials_path: &Path) -> Result<HoppyshareService> {
    let credentials = Credentials::load(credentials_path)
        .with_context(|| format!("cannot load credentials from {}", credentials_path.display()))?;
    let (service, _events) = HoppyshareService::new(&credentials, Config::default())?;
    Ok(service)
}

pub fn encode(
    credentials_path: &Path,
    input: &Path,
    output: &Path,
    mime: &str,
    filename: Option<String>,
) -> Result<()> {
    let service = open_service(credentials_path)?;
    let payload = std::fs::read(input)
        .with_context(|| format!("cannot read {}", input.display()))?;

    let filename = filename.unwrap_or_else(|| {
        input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    });

    let envelope = service.encode_message(mime, &filename, &payload)?;
    std::fs::write(output, &envelope)?;

    println!(
        "Encoded {} payload bytes into {} envelope bytes ({})",
        payload.len(),
        envelope.len(),
        output.display()
    );
    Ok(())
}

pub fn decode(credentials_path: &Path, input: &Path, output: Option<&Path>) -> Result<()> {
    let service = open_service(credentials_path)?;
    let envelope = std::fs::read(input)
        .with_context(|| format!("cannot read {}", input.display()))?;

    let decoded = service.decode_message(&envelope)?;

    println!("Mime type:   {}", decoded.mime_type);
    println!("Filename:    {}", decoded.filename);
    println!(
        "Sender hash: {}",
        decoded
            .sender_hash
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>()
    );
    println!("Own message: {}", decoded.is_from(service.device_id()));

    match output {
        Some(path) => {
            std::fs::write(path, &decoded.payload)?;
            println!("Wrote {} payload bytes to {}", decoded.payload.len(), path.display());
        }
        None if decoded.mime_type.starts_with("text/") => {
            println!("---\n{}", String::from_utf8_lossy(&decoded.payload));
        }
        None => {
            println!(
                "{} payload bytes (binary; use --output to save)",
                decoded.payload.len()
            );
        }
    }
    Ok(())
}

/// Check user-supplied fragmentation parameters; `fragment` itself treats
/// violations as contract breaches and panics.
fn chunk_layout(data: &[u8], mtu: usize) -> Result<Vec<Chunk>> {
    if mtu == 0 {
        bail!("--mtu must be at least 1");
    }
    if data.len() > constants::MAX_CHUNK_COUNT * mtu {
        bail!(
            "{} bytes does not fit the link's sequence space at --mtu {} (max {} chunks)",
            data.len(),
            mtu,
            constants::MAX_CHUNK_COUNT
        );
    }
    Ok(fragment(data, mtu))
}

/// Show the chunk layout a file would produce on the link, plus the
/// transfer time implied by the default pacing.
pub fn chunk(input: &Path, mtu: usize) -> Result<()> {
    let data = std::fs::read(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let chunks = chunk_layout(&data, mtu)?;

    println!(
        "{} bytes -> {} chunks of <= {} payload bytes",
        data.len(),
        chunks.len(),
        mtu
    );
    for chunk in &chunks {
        println!(
            "  seq {:>5}  {:>4} bytes{}",
            chunk.sequence,
            chunk.data.len(),
            if chunk.is_last { "  [last]" } else { "" }
        );
    }
    let pacing_ms = constants::CHUNK_SEND_INTERVAL_MS * (chunks.len() as u64 - 1);
    println!("Estimated send time at default pacing: ~{} ms", pacing_ms);
    Ok(())
}
