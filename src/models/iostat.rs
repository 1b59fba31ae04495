use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One disk-statistics object as reported by `iostat -o JSON -x`.
///
/// The core counters are typed; everything else sysstat emits (discard and
/// flush columns, per-version extras) is carried through untouched so the
/// report never loses fields across sysstat releases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskStats {
    pub disk_device: String,

    #[serde(rename = "r/s")]
    pub reads_per_sec: f64,
    #[serde(rename = "w/s")]
    pub writes_per_sec: f64,
    #[serde(rename = "rkB/s")]
    pub read_kb_per_sec: f64,
    #[serde(rename = "wkB/s")]
    pub write_kb_per_sec: f64,

    #[serde(rename = "r_await", default, skip_serializing_if = "Option::is_none")]
    pub read_await_ms: Option<f64>,
    #[serde(rename = "w_await", default, skip_serializing_if = "Option::is_none")]
    pub write_await_ms: Option<f64>,

    // sysstat renamed avgqu-sz to aqu-sz in 12.1
    #[serde(rename = "aqu-sz", alias = "avgqu-sz", default, skip_serializing_if = "Option::is_none")]
    pub avg_queue_len: Option<f64>,
    #[serde(rename = "rareq-sz", default, skip_serializing_if = "Option::is_none")]
    pub read_req_kb: Option<f64>,
    #[serde(rename = "wareq-sz", default, skip_serializing_if = "Option::is_none")]
    pub write_req_kb: Option<f64>,

    pub util: f64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
