use crate::models::device::{split_node, DeviceRecord, FilesystemAttrs};
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;

/// The three flat views of one lsblk device tree, all keyed by `maj:min`.
#[derive(Debug, Default)]
pub struct FlattenedTree {
    pub devices: BTreeMap<String, DeviceRecord>,
    pub children: BTreeMap<String, Vec<String>>,
    pub filesystems: BTreeMap<String, FilesystemAttrs>,
}

/// Flatten the nested `blockdevices` tree into devices, children and
/// filesystems mappings via a depth-first pre-order walk.
///
/// Every node in the input contributes exactly one devices entry; a children
/// entry appears only for nodes with at least one child, in input order.
/// A malformed node aborts the whole flattening.
pub fn flatten_tree(nodes: &[Value]) -> Result<FlattenedTree> {
    let mut out = FlattenedTree::default();
    for node in nodes {
        walk(node, &mut out)?;
    }
    Ok(out)
}

fn walk(node: &Value, out: &mut FlattenedTree) -> Result<String> {
    let (record, filesystem) = split_node(node)?;
    let id = record.maj_min.clone();

    if let Some(fs) = filesystem {
        out.filesystems.insert(id.clone(), fs);
    }
    // Duplicate maj:min keys overwrite; real kernel numbering never produces them.
    out.devices.insert(id.clone(), record);

    if let Some(children) = node["children"].as_array() {
        let mut child_ids = Vec::with_capacity(children.len());
        for child in children {
            child_ids.push(walk(child, out)?);
        }
        if !child_ids.is_empty() {
            out.children.insert(id.clone(), child_ids);
        }
    }

    Ok(id)
}
