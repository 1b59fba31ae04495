use crate::models::devicemapper::{DmListEntry, DmTargetInfo};
use crate::util::cmd::run_with_timeout;
use anyhow::{anyhow, bail, Context, Result};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Two-step device-mapper query protocol: list all managed targets, then
/// fetch detailed info per target name.
pub trait DeviceMapperClient {
    fn list_targets(&self) -> Result<Vec<DmListEntry>>;
    fn target_info(&self, name: &str) -> Result<DmTargetInfo>;
}

/// Real client shelling out to dmsetup.
pub struct Dmsetup {
    pub timeout: Duration,
}

impl DeviceMapperClient for Dmsetup {
    fn list_targets(&self) -> Result<Vec<DmListEntry>> {
        let out = run_with_timeout("dmsetup", &["ls"], self.timeout)?;
        if !out.status.success() {
            bail!(
                "dmsetup ls exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        parse_dm_list(&String::from_utf8_lossy(&out.stdout))
    }

    fn target_info(&self, name: &str) -> Result<DmTargetInfo> {
        let out = run_with_timeout("dmsetup", &["info", name], self.timeout)?;
        if !out.status.success() {
            bail!(
                "dmsetup info exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        parse_dm_info(&String::from_utf8_lossy(&out.stdout))
    }
}

/// Collect status for every device-mapper target, keyed `major:minor`.
///
/// A target that lists but fails the info lookup aborts the run; no partial
/// record is emitted for it.
pub fn collect<C: DeviceMapperClient>(client: &C) -> Result<BTreeMap<String, DmTargetInfo>> {
    let mut targets = BTreeMap::new();
    for entry in client
        .list_targets()
        .context("device-mapper target listing failed")?
    {
        debug!(target = %entry.name, "querying device-mapper info");
        let info = client
            .target_info(&entry.name)
            .with_context(|| format!("device-mapper info lookup failed for target '{}'", entry.name))?;
        targets.insert(format!("{}:{}", entry.major, entry.minor), info);
    }
    Ok(targets)
}

/// Parse `dmsetup ls` output. Lines look like `vg0-root\t(253:0)`; older
/// dmsetup releases print `(253, 0)`.
pub fn parse_dm_list(text: &str) -> Result<Vec<DmListEntry>> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line == "No devices found" {
            continue;
        }
        let open = line
            .rfind('(')
            .ok_or_else(|| anyhow!("unparseable dmsetup ls line: '{line}'"))?;
        let name = line[..open].trim().to_string();
        if name.is_empty() {
            bail!("dmsetup ls line has no target name: '{line}'");
        }
        let (major, minor) = parse_dev_pair(line[open + 1..].trim_end_matches(')'))
            .with_context(|| format!("unparseable dmsetup ls line: '{line}'"))?;
        entries.push(DmListEntry { name, major, minor });
    }
    Ok(entries)
}

/// Parse the `Key: value` report of `dmsetup info <name>` into a target record.
pub fn parse_dm_info(text: &str) -> Result<DmTargetInfo> {
    let mut name = None;
    let mut majmin = None;
    let mut open_count = None;
    let mut event_nr = None;
    let mut target_count = None;
    let mut state = "";
    let mut tables = "";

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Name" => name = Some(value.to_string()),
            "State" => state = value,
            "Tables present" => tables = value,
            "Open count" => {
                open_count = Some(value.parse().context("bad 'Open count' value")?)
            }
            "Event number" => {
                event_nr = Some(value.parse().context("bad 'Event number' value")?)
            }
            "Major, minor" => majmin = Some(parse_dev_pair(value)?),
            "Number of targets" => {
                target_count = Some(value.parse().context("bad 'Number of targets' value")?)
            }
            _ => {}
        }
    }

    let require = |field: &str| anyhow!("dmsetup info output missing '{field}'");
    let (major, minor) = majmin.ok_or_else(|| require("Major, minor"))?;
    Ok(DmTargetInfo {
        name: name.ok_or_else(|| require("Name"))?,
        major,
        minor,
        exists: true,
        suspended: state.contains("SUSPENDED"),
        read_only: state.contains("READ-ONLY"),
        live_table: tables.contains("LIVE"),
        inactive_table: tables.contains("INACTIVE"),
        open_count: open_count.ok_or_else(|| require("Open count"))?,
        event_nr: event_nr.ok_or_else(|| require("Event number"))?,
        target_count: target_count.ok_or_else(|| require("Number of targets"))?,
        deferred_remove: state.contains("DEFERRED REMOVE"),
        internal_suspend: state.contains("INTERNAL SUSPEND"),
    })
}

fn parse_dev_pair(s: &str) -> Result<(u32, u32)> {
    let mut parts = s.split(|c| c == ':' || c == ',').map(str::trim);
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => Ok((
            major.parse().context("bad major number")?,
            minor.parse().context("bad minor number")?,
        )),
        _ => bail!("expected 'major:minor', got '{s}'"),
    }
}
