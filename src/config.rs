use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub devices: DevicesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Timeout applied to every external query, in seconds.
    pub query_timeout_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesConfig {
    /// Glob-style patterns of top-level devices to exclude (e.g. "loop*", "sr*").
    /// Empty by default so the report covers everything lsblk sees.
    pub exclude: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { query_timeout_sec: 10 }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self { exclude: Vec::new() }
    }
}

impl DevicesConfig {
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|pat| {
            if let Some(prefix) = pat.strip_suffix('*') {
                name.starts_with(prefix)
            } else {
                pat == name
            }
        })
    }
}

// ── Load ──────────────────────────────────────────────────────────────

impl Config {
    pub fn load() -> Self {
        match try_load() {
            Ok(cfg) => cfg,
            Err(_) => {
                // Write defaults on first run (best-effort)
                let _ = try_write_defaults();
                Config::default()
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("blkreport").join("blkreport.toml"))
    }
}

fn try_load() -> Result<Config> {
    let path = Config::config_path().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
    let text = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&text)?;
    Ok(cfg)
}

fn try_write_defaults() -> Result<()> {
    let path = Config::config_path().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(
        path,
        format!("# blkreport configuration\n# Generated on first run — edit freely\n\n{}", text),
    )?;
    Ok(())
}
