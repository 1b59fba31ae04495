use crate::util::cmd::run_with_timeout;
use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::time::Duration;

/// Source of the raw nested block-device tree.
pub trait DeviceEnumerator {
    fn enumerate(&self) -> Result<Vec<Value>>;
}

/// Real enumerator: `lsblk --json -b -O` for the full device tree with
/// byte sizes and every extended column.
pub struct Lsblk {
    pub timeout: Duration,
}

impl DeviceEnumerator for Lsblk {
    fn enumerate(&self) -> Result<Vec<Value>> {
        let out = run_with_timeout("lsblk", &["--json", "-b", "-O"], self.timeout)?;
        if !out.status.success() {
            bail!(
                "lsblk exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        parse_lsblk(&out.stdout)
    }
}

/// Extract the top-level `blockdevices` array from raw lsblk JSON.
pub fn parse_lsblk(raw: &[u8]) -> Result<Vec<Value>> {
    let v: Value = serde_json::from_slice(raw).context("lsblk produced malformed JSON")?;
    v["blockdevices"]
        .as_array()
        .cloned()
        .ok_or_else(|| anyhow!("lsblk output has no 'blockdevices' array"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_blockdevices_array() {
        let raw = br#"{"blockdevices": [
            {"name": "sda", "maj:min": "8:0", "type": "disk", "path": "/dev/sda", "size": 1000},
            {"name": "sdb", "maj:min": "8:16", "type": "disk", "path": "/dev/sdb", "size": 2000}
        ]}"#;
        let nodes = parse_lsblk(raw).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1]["maj:min"], "8:16");
    }

    #[test]
    fn missing_blockdevices_key_is_an_error() {
        assert!(parse_lsblk(b"{}").is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_lsblk(b"not json").is_err());
    }
}
