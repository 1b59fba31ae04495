use crate::util::cmd::run_with_timeout;
use std::time::Duration;
use tracing::debug;

/// Query a device's size in bytes via `blockdev --getsize64`.
///
/// Degrades to 0 for an empty path or any query failure; this is the one
/// collector that never propagates an error.
pub fn device_size_bytes(path: &str, timeout: Duration) -> u64 {
    if path.is_empty() {
        return 0;
    }

    let out = match run_with_timeout("blockdev", &["--getsize64", path], timeout) {
        Ok(out) => out,
        Err(err) => {
            debug!(path, %err, "blockdev query failed, reporting size 0");
            return 0;
        }
    };
    if !out.status.success() {
        debug!(path, status = %out.status, "blockdev exited non-zero, reporting size 0");
        return 0;
    }

    String::from_utf8_lossy(&out.stdout)
        .trim()
        .parse()
        .unwrap_or(0)
}
