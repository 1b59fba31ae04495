use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::Value;

/// Device attributes for one lsblk node, filesystem fields excluded.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRecord {
    pub name: String,
    #[serde(rename = "maj:min")]
    pub maj_min: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    /// None when lsblk reported a null size; backfilled from a blockdev query.
    pub size: Option<u64>,
}

/// Filesystem attributes relocated out of a device record.
/// Present only for nodes with a non-null mountpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FilesystemAttrs {
    pub mountpoint: String,
    pub fsavail: Option<u64>,
    pub fssize:  Option<u64>,
    pub fstype:  Option<String>,
    pub fsused:  Option<u64>,
    #[serde(rename = "fsuse%")]
    pub fsuse_pct: Option<String>,
    pub fsver:   Option<String>,
}

/// Destructure one raw lsblk node into its device record and, when the node is
/// mounted, its filesystem attributes. Filesystem-shaped fields never end up in
/// the device record either way.
///
/// A missing required field aborts the conversion of this device.
pub fn split_node(node: &Value) -> Result<(DeviceRecord, Option<FilesystemAttrs>)> {
    let label = node["name"].as_str().unwrap_or("<unnamed>").to_string();

    let record = (|| -> Result<DeviceRecord> {
        Ok(DeviceRecord {
            name:    required_str(node, "name")?,
            maj_min: required_str(node, "maj:min")?,
            kind:    required_str(node, "type")?,
            path:    required_str(node, "path")?,
            size:    u64_opt(&node["size"]),
        })
    })()
    .with_context(|| format!("malformed lsblk record for device '{label}'"))?;

    let filesystem = str_opt(&node["mountpoint"]).map(|mountpoint| FilesystemAttrs {
        mountpoint,
        fsavail:   u64_opt(&node["fsavail"]),
        fssize:    u64_opt(&node["fssize"]),
        fstype:    str_opt(&node["fstype"]),
        fsused:    u64_opt(&node["fsused"]),
        fsuse_pct: str_opt(&node["fsuse%"]),
        fsver:     str_opt(&node["fsver"]),
    });

    Ok((record, filesystem))
}

fn required_str(node: &Value, key: &str) -> Result<String> {
    node[key]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("missing or non-string field '{key}'"))
}

fn str_opt(v: &Value) -> Option<String> {
    v.as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// lsblk emits numeric columns as numbers on recent util-linux and as strings
/// on older releases; accept both.
fn u64_opt(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn disk_node() -> Value {
        json!({
            "name": "sda", "maj:min": "8:0", "type": "disk",
            "path": "/dev/sda", "size": 500107862016u64,
            "mountpoint": null, "fsavail": null, "fssize": null,
            "fstype": null, "fsused": null, "fsuse%": null, "fsver": null
        })
    }

    #[test]
    fn unmounted_node_has_no_filesystem() {
        let (record, fs) = split_node(&disk_node()).unwrap();
        assert_eq!(record.maj_min, "8:0");
        assert_eq!(record.size, Some(500107862016));
        assert!(fs.is_none());
    }

    #[test]
    fn mounted_node_splits_filesystem_fields_out() {
        let node = json!({
            "name": "sda1", "maj:min": "8:1", "type": "part",
            "path": "/dev/sda1", "size": 1000000000u64,
            "mountpoint": "/data", "fsavail": 400000000u64, "fssize": 900000000u64,
            "fstype": "ext4", "fsused": 500000000u64, "fsuse%": "56%", "fsver": "1.0"
        });
        let (record, fs) = split_node(&node).unwrap();
        let fs = fs.unwrap();
        assert_eq!(fs.mountpoint, "/data");
        assert_eq!(fs.fstype.as_deref(), Some("ext4"));
        assert_eq!(fs.fsuse_pct.as_deref(), Some("56%"));

        // No filesystem-shaped key survives in the serialized device record.
        let rendered = serde_json::to_value(&record).unwrap();
        let keys: Vec<&String> = rendered.as_object().unwrap().keys().collect();
        for fs_key in ["mountpoint", "fsavail", "fssize", "fstype", "fsused", "fsuse%", "fsver"] {
            assert!(!keys.iter().any(|k| *k == fs_key), "leaked key {fs_key}");
        }
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let mut node = disk_node();
        node.as_object_mut().unwrap().remove("maj:min");
        let err = split_node(&node).unwrap_err();
        assert!(format!("{err:#}").contains("maj:min"));
    }

    #[test]
    fn string_typed_size_is_accepted() {
        let mut node = disk_node();
        node["size"] = json!("500107862016");
        let (record, _) = split_node(&node).unwrap();
        assert_eq!(record.size, Some(500107862016));
    }

    #[test]
    fn null_size_is_left_for_backfill() {
        let mut node = disk_node();
        node["size"] = Value::Null;
        let (record, _) = split_node(&node).unwrap();
        assert_eq!(record.size, None);
    }
}
