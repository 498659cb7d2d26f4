use anyhow::Context;
use folio_core::config::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG: &str = "FOLIO_CONFIG";
pub const ENV_AGENT_ID: &str = "FOLIO_AGENT_ID";
pub const ENV_CREATE_CALL_URL: &str = "FOLIO_CREATE_CALL_URL";
pub const ENV_CALL_WS_URL: &str = "FOLIO_CALL_WS_URL";
pub const ENV_CHAT_URL: &str = "FOLIO_CHAT_URL";
pub const ENV_SUMMARY_URL: &str = "FOLIO_SUMMARY_URL";
pub const ENV_PLATFORM: &str = "FOLIO_PLATFORM";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<AppConfig> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("read config: {}", self.path.display()))?;
        let cfg: AppConfig = serde_json::from_slice(&bytes).context("decode config JSON")?;
        Ok(cfg)
    }

    pub fn save(&self, cfg: &AppConfig) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(cfg).context("encode config JSON")?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config directory: {}", parent.display()))?;
        }

        // Write a temp file, then swap it in.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write temp: {}", tmp.display()))?;
        replace_file(&tmp, &self.path)
            .with_context(|| format!("replace file: {}", self.path.display()))?;
        Ok(())
    }
}

fn replace_file(tmp: &Path, dst: &Path) -> anyhow::Result<()> {
    let backup = dst.with_extension("bak");

    if dst.exists() {
        let _ = fs::remove_file(&backup);
        fs::rename(dst, &backup)
            .with_context(|| format!("failed rename {} -> {}", dst.display(), backup.display()))?;
    }

    if let Err(e) = fs::rename(tmp, dst) {
        if backup.exists() {
            let _ = fs::rename(&backup, dst);
        }
        let _ = fs::remove_file(tmp);
        return Err(anyhow::Error::new(e).context(format!(
            "failed rename {} -> {}",
            tmp.display(),
            dst.display()
        )));
    }

    let _ = fs::remove_file(&backup);
    Ok(())
}

/// Overlay `FOLIO_*` variables on top of `cfg`. Blank values are ignored.
pub fn apply_env_overrides(cfg: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_AGENT_ID) {
        cfg.call.agent_id = Some(v);
    }
    if let Some(v) = get(ENV_CREATE_CALL_URL) {
        cfg.call.create_call_url = v;
    }
    if let Some(v) = get(ENV_CALL_WS_URL) {
        cfg.call.call_ws_url = v;
    }
    if let Some(v) = get(ENV_PLATFORM) {
        cfg.call.platform = v;
    }
    if let Some(v) = get(ENV_CHAT_URL) {
        cfg.chat.chat_url = v;
    }
    if let Some(v) = get(ENV_SUMMARY_URL) {
        cfg.chat.summary_url = v;
    }
}

/// Load the config file (explicit path, else `FOLIO_CONFIG`, else defaults)
/// and apply environment overrides.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    load_config_with(explicit, |key| std::env::var(key).ok())
}

pub fn load_config_with(
    explicit: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<AppConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| lookup(ENV_CONFIG).filter(|v| !v.trim().is_empty()).map(PathBuf::from));

    let mut cfg = match path {
        Some(path) => ConfigStore::at_path(path).load()?,
        None => AppConfig::default(),
    };
    apply_env_overrides(&mut cfg, lookup);
    Ok(cfg)
}
