use serde::Serialize;

/// One entry from the device-mapper target listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmListEntry {
    pub name: String,
    pub major: u32,
    pub minor: u32,
}

/// Detailed status of one device-mapper target, mirroring the kernel's
/// DM info record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DmTargetInfo {
    pub name: String,
    pub major: u32,
    pub minor: u32,
    pub exists: bool,
    pub suspended: bool,
    pub read_only: bool,
    pub live_table: bool,
    pub inactive_table: bool,
    pub open_count: i64,
    pub event_nr: u64,
    pub target_count: u64,
    pub deferred_remove: bool,
    pub internal_suspend: bool,
}
