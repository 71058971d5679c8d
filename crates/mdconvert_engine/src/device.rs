use std::fs;
use std::io;
use std::path::Path;

use mdconvert_logging::{convert_info, convert_warn};
use sha2::{Digest, Sha256};

use crate::persist::{AtomicFileWriter, PersistError};

pub const DEVICE_ID_FILENAME: &str = "device_id";

/// Facts about the local installation that feed the device fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub host: Option<String>,
    pub user: Option<String>,
    pub os: String,
    pub arch: String,
}

impl HostInfo {
    pub fn current() -> Self {
        let host = non_empty_env("HOSTNAME")
            .or_else(|| non_empty_env("COMPUTERNAME"))
            .or_else(|| {
                fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|text| text.trim().to_string())
                    .filter(|text| !text.is_empty())
            });
        let user = non_empty_env("USER").or_else(|| non_empty_env("USERNAME"));
        Self {
            host,
            user,
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Stable identifier derived from host facts, or `None` when there is too
/// little to go on.
pub fn fingerprint(info: &HostInfo) -> Option<String> {
    if info.host.is_none() && info.user.is_none() {
        return None;
    }
    let mut hasher = Sha256::new();
    for part in [
        info.host.as_deref().unwrap_or_default(),
        info.user.as_deref().unwrap_or_default(),
        info.os.as_str(),
        info.arch.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(32);
    for byte in digest.iter().take(16) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    Some(hex)
}

pub fn random_device_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Returns the cached device identifier from `state_dir`, creating and
/// caching one on first use.
pub fn load_or_create_device_id(state_dir: &Path) -> Result<String, PersistError> {
    load_or_create_with(state_dir, &HostInfo::current())
}

pub fn load_or_create_with(state_dir: &Path, info: &HostInfo) -> Result<String, PersistError> {
    let path = state_dir.join(DEVICE_ID_FILENAME);
    match fs::read_to_string(&path) {
        Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
        Ok(_) => convert_warn!("Ignoring empty device id file {:?}", path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    let device_id = fingerprint(info).unwrap_or_else(random_device_id);
    AtomicFileWriter::new(state_dir.to_path_buf()).write(DEVICE_ID_FILENAME, &device_id)?;
    convert_info!("Created device id in {:?}", path);
    Ok(device_id)
}
