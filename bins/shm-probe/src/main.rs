//! shm-probe — Exercises shared memory on this host.
//! For every configured segment: create, fill, reopen read-only, verify, remove.

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::config::{AppConfig, SegmentConfig, ShmConfig};

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/config.toml".to_string());

    let config = AppConfig::load(std::path::Path::new(&config_path))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    info!(
        "Probing {} segment(s), name limit {} bytes, file system backed: {}",
        config.segment.len(),
        shm::NAME_MAX,
        shm::FILE_SYSTEM_BACKED
    );

    for seg in &config.segment {
        probe(seg, &config.shm)
            .with_context(|| format!("probe failed for pattern {}", seg.pattern))?;
    }

    info!("All segments verified");
    Ok(())
}

/// Byte expected at `offset` after filling.
fn fill_byte(offset: usize) -> u8 {
    (offset % 251) as u8
}

fn probe(seg: &SegmentConfig, shm_config: &ShmConfig) -> Result<()> {
    let mut writer = shm::create_temp_with(&seg.pattern, seg.size, shm_config)?;
    info!(
        "Created {} ({} bytes){}",
        writer.name(),
        writer.len(),
        writer
            .file_system_name()
            .map(|p| format!(" at {}", p.display()))
            .unwrap_or_default()
    );

    let result = verify(&mut writer);

    if let Err(err) = writer.unlink() {
        warn!("Failed to unlink {}: {}", writer.name(), err);
    }
    writer.close()?;
    result
}

fn verify(writer: &mut shm::Segment) -> Result<()> {
    let name = writer.name().to_owned();
    if writer.slice().iter().any(|&b| b != 0) {
        bail!("new segment {} is not zero-filled", name);
    }

    let Some(bytes) = writer.slice_mut() else {
        bail!("segment {} is not writable", name);
    };
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = fill_byte(i);
    }

    let mut reader = shm::open(&name)?;
    if reader.len() != writer.len() {
        bail!(
            "reopened {} has {} bytes, expected {}",
            name,
            reader.len(),
            writer.len()
        );
    }
    if let Some(pos) = reader
        .slice()
        .iter()
        .enumerate()
        .position(|(i, &b)| b != fill_byte(i))
    {
        bail!("byte {} of {} differs after reopen", pos, name);
    }
    reader.close()?;

    info!("Verified {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_round_trip() {
        let seg = SegmentConfig {
            pattern: "test-probe-*".into(),
            size: 8192,
        };
        probe(&seg, &ShmConfig::default()).unwrap();
    }

    #[test]
    fn test_probe_rejects_bad_pattern() {
        let seg = SegmentConfig {
            pattern: "bad/test-probe-*".into(),
            size: 64,
        };
        assert!(probe(&seg, &ShmConfig::default()).is_err());
    }
}
