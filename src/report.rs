use crate::collectors::devicemapper::{self, DeviceMapperClient};
use crate::collectors::iostat::{self, StatisticsQuerier};
use crate::collectors::lsblk::DeviceEnumerator;
use crate::config::DevicesConfig;
use crate::flatten::{flatten_tree, FlattenedTree};
use crate::models::device::{DeviceRecord, FilesystemAttrs};
use crate::models::devicemapper::DmTargetInfo;
use crate::models::iostat::DiskStats;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// The merged report. The five top-level keys are the output contract and are
/// always present, empty or not.
#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub block_devices: BTreeMap<String, DeviceRecord>,
    pub children: BTreeMap<String, Vec<String>>,
    pub filesystems: BTreeMap<String, FilesystemAttrs>,
    pub statistics: BTreeMap<String, DiskStats>,
    pub devicemapper: BTreeMap<String, DmTargetInfo>,
}

/// Run the whole pipeline: enumerate, flatten, backfill null sizes, query
/// per-device statistics, query device-mapper state, merge.
///
/// `size_of` resolves a device path to a size in bytes and must degrade to 0
/// rather than fail.
pub fn build<E, Q, C, F>(
    enumerator: &E,
    querier: &Q,
    dm_client: &C,
    size_of: F,
    devices_cfg: &DevicesConfig,
) -> Result<Report>
where
    E: DeviceEnumerator,
    Q: StatisticsQuerier,
    C: DeviceMapperClient,
    F: Fn(&str) -> u64,
{
    let nodes: Vec<Value> = enumerator
        .enumerate()
        .context("block-device enumeration failed")?
        .into_iter()
        .filter(|node| {
            let name = node["name"].as_str().unwrap_or("");
            !devices_cfg.is_excluded(name)
        })
        .collect();

    let FlattenedTree { mut devices, children, filesystems } =
        flatten_tree(&nodes).context("device tree flattening failed")?;

    for device in devices.values_mut() {
        if device.size.is_none() {
            device.size = Some(size_of(&device.path));
        }
    }

    let statistics = iostat::collect(querier, &devices)?;
    let devicemapper = devicemapper::collect(dm_client)?;

    // Both maps are keyed in the same maj:min space as block_devices; a miss
    // here means the device set changed between the two queries.
    for id in devicemapper.keys() {
        if !devices.contains_key(id) {
            warn!(target_id = %id, "device-mapper target not present in block device tree");
        }
    }

    Ok(Report {
        block_devices: devices,
        children,
        filesystems,
        statistics,
        devicemapper,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::devicemapper::DmListEntry;
    use anyhow::bail;
    use serde_json::json;

    struct FakeEnumerator {
        nodes: Vec<Value>,
    }
    impl DeviceEnumerator for FakeEnumerator {
        fn enumerate(&self) -> Result<Vec<Value>> {
            Ok(self.nodes.clone())
        }
    }

    struct FakeQuerier;
    impl StatisticsQuerier for FakeQuerier {
        fn query(&self, path: &str) -> Result<Value> {
            let device = path.trim_start_matches("/dev/");
            Ok(json!({ "sysstat": { "hosts": [ { "statistics": [ { "disk": [ {
                "disk_device": device,
                "r/s": 0.0, "w/s": 0.0, "rkB/s": 0.0, "wkB/s": 0.0, "util": 0.0
            } ] } ] } ] } }))
        }
    }

    struct FakeDm {
        entries: Vec<DmListEntry>,
    }
    impl DeviceMapperClient for FakeDm {
        fn list_targets(&self) -> Result<Vec<DmListEntry>> {
            Ok(self.entries.clone())
        }
        fn target_info(&self, name: &str) -> Result<DmTargetInfo> {
            let entry = self
                .entries
                .iter()
                .find(|e| e.name == name)
                .ok_or_else(|| anyhow::anyhow!("no such target"))?;
            Ok(DmTargetInfo {
                name: entry.name.clone(),
                major: entry.major,
                minor: entry.minor,
                exists: true,
                suspended: false,
                read_only: false,
                live_table: true,
                inactive_table: false,
                open_count: 1,
                event_nr: 0,
                target_count: 1,
                deferred_remove: false,
                internal_suspend: false,
            })
        }
    }

    fn sample_tree() -> Vec<Value> {
        vec![
            json!({
                "name": "sda", "maj:min": "8:0", "type": "disk",
                "path": "/dev/sda", "size": 1000, "mountpoint": null,
                "children": [ {
                    "name": "sda1", "maj:min": "8:1", "type": "part",
                    "path": "/dev/sda1", "size": 999, "mountpoint": "/data",
                    "fstype": "ext4"
                } ]
            }),
            json!({
                "name": "dm-0", "maj:min": "253:0", "type": "lvm",
                "path": "/dev/dm-0", "size": null, "mountpoint": null
            }),
        ]
    }

    #[test]
    fn report_has_all_five_keys_even_when_empty() {
        let report = build(
            &FakeEnumerator { nodes: vec![] },
            &FakeQuerier,
            &FakeDm { entries: vec![] },
            |_| 0,
            &DevicesConfig::default(),
        )
        .unwrap();
        let v = serde_json::to_value(&report).unwrap();
        let obj = v.as_object().unwrap();
        for key in ["block_devices", "children", "filesystems", "statistics", "devicemapper"] {
            assert!(obj[key].as_object().unwrap().is_empty(), "{key} should be empty");
        }
        assert_eq!(obj.len(), 5);
    }

    #[test]
    fn pipeline_merges_all_four_sources() {
        let dm = FakeDm {
            entries: vec![DmListEntry { name: "vg0-data".into(), major: 253, minor: 0 }],
        };
        let report = build(
            &FakeEnumerator { nodes: sample_tree() },
            &FakeQuerier,
            &dm,
            |_| 42,
            &DevicesConfig::default(),
        )
        .unwrap();

        assert_eq!(report.block_devices.len(), 3);
        assert_eq!(report.children["8:0"], vec!["8:1".to_string()]);
        assert_eq!(report.filesystems["8:1"].mountpoint, "/data");
        assert_eq!(report.devicemapper["253:0"].name, "vg0-data");

        // every statistics and devicemapper key references a known device
        for id in report.statistics.keys().chain(report.devicemapper.keys()) {
            assert!(report.block_devices.contains_key(id), "orphan key {id}");
        }
    }

    #[test]
    fn null_sizes_are_backfilled_from_the_size_query() {
        let report = build(
            &FakeEnumerator { nodes: sample_tree() },
            &FakeQuerier,
            &FakeDm { entries: vec![] },
            |path| if path == "/dev/dm-0" { 7777 } else { 0 },
            &DevicesConfig::default(),
        )
        .unwrap();
        assert_eq!(report.block_devices["253:0"].size, Some(7777));
        // lsblk-reported sizes are left alone
        assert_eq!(report.block_devices["8:0"].size, Some(1000));
    }

    #[test]
    fn excluded_devices_are_dropped_before_flattening() {
        let cfg = DevicesConfig { exclude: vec!["sda".into()] };
        let report = build(
            &FakeEnumerator { nodes: sample_tree() },
            &FakeQuerier,
            &FakeDm { entries: vec![] },
            |_| 0,
            &cfg,
        )
        .unwrap();
        assert!(!report.block_devices.contains_key("8:0"));
        assert!(!report.block_devices.contains_key("8:1"));
        assert!(report.block_devices.contains_key("253:0"));
    }

    struct FailingQuerier;
    impl StatisticsQuerier for FailingQuerier {
        fn query(&self, _path: &str) -> Result<Value> {
            bail!("iostat missing");
        }
    }

    #[test]
    fn statistics_failure_fails_the_whole_run() {
        let result = build(
            &FakeEnumerator { nodes: sample_tree() },
            &FailingQuerier,
            &FakeDm { entries: vec![] },
            |_| 0,
            &DevicesConfig::default(),
        );
        assert!(result.is_err());
    }
}
