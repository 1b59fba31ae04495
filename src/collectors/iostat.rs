use crate::models::device::DeviceRecord;
use crate::models::iostat::DiskStats;
use crate::util::cmd::run_with_timeout;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Source of one structured iostat document per device path.
pub trait StatisticsQuerier {
    fn query(&self, path: &str) -> Result<Value>;
}

/// Real querier: one `iostat -o JSON -x -N <path>` invocation per device.
pub struct Iostat {
    pub timeout: Duration,
}

impl StatisticsQuerier for Iostat {
    fn query(&self, path: &str) -> Result<Value> {
        let out = run_with_timeout("iostat", &["-o", "JSON", "-x", "-N", path], self.timeout)?;
        if !out.status.success() {
            bail!(
                "iostat exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        serde_json::from_slice(&out.stdout).context("iostat produced malformed JSON")
    }
}

/// Query statistics for every flattened device, keyed by `maj:min`.
///
/// Any failed query or unexpected document shape aborts the run; zeroed
/// statistics are never fabricated for a device.
pub fn collect<Q: StatisticsQuerier>(
    querier: &Q,
    devices: &BTreeMap<String, DeviceRecord>,
) -> Result<BTreeMap<String, DiskStats>> {
    let mut statistics = BTreeMap::new();
    for (id, device) in devices {
        debug!(device = %device.path, "querying iostat");
        let doc = querier
            .query(&device.path)
            .with_context(|| format!("iostat query failed for device {id} ({})", device.path))?;
        let stats = extract_disk_stats(&doc)
            .with_context(|| format!("unexpected iostat output for device {id} ({})", device.path))?;
        statistics.insert(id.clone(), stats);
    }
    Ok(statistics)
}

/// Pull the single disk-statistics object out of a sysstat JSON document:
/// `sysstat.hosts[0].statistics[0].disk[0]`.
pub fn extract_disk_stats(doc: &Value) -> Result<DiskStats> {
    let disk = &doc["sysstat"]["hosts"][0]["statistics"][0]["disk"][0];
    if disk.is_null() {
        bail!("no disk statistics entry in iostat output");
    }
    serde_json::from_value(disk.clone()).context("disk statistics entry has unexpected shape")
}
