use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use petcare_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Uploaded videos and images are written below this directory.
    pub uploads_dir: PathBuf,
    pub max_upload_size: u64,
    pub allowed_video_types: Vec<String>,
    pub allowed_image_types: Vec<String>,
    pub cors_origins: Vec<String>,
    pub store: StoreConfig,
}

impl ServerConfig {
    pub fn from_toml_str(raw: &str) -> ServerResult<Self> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Body size limit as accepted by the HTTP layer.
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_upload_size).unwrap_or(usize::MAX)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8000)),
            uploads_dir: PathBuf::from("uploads"),
            max_upload_size: 100 * 1024 * 1024,
            allowed_video_types: strings(&["video/mp4", "video/avi", "video/mov"]),
            allowed_image_types: strings(&["image/jpeg", "image/png", "image/jpg"]),
            cors_origins: strings(&[
                "http://localhost:3000",
                "http://127.0.0.1:3000",
                "http://localhost:3001",
            ]),
            store: StoreConfig::default(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use petcare_store::ReadConsistency;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.max_upload_size, 100 * 1024 * 1024);
        assert_eq!(c.uploads_dir, PathBuf::from("uploads"));
        assert!(c.allowed_video_types.contains(&"video/mp4".to_string()));
        assert_eq!(c.store.root, PathBuf::from("data"));
    }

    #[test]
    fn toml_overrides_and_defaults() {
        let c = ServerConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:9000"
            max_upload_size = 1024

            [store]
            root = "/var/lib/petcare"
            read_consistency = "locked"
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.max_upload_size, 1024);
        assert_eq!(c.store.root, PathBuf::from("/var/lib/petcare"));
        assert_eq!(c.store.read_consistency, ReadConsistency::Locked);
        assert!(c.store.pretty);
        assert_eq!(c.cors_origins.len(), 3);
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = ServerConfig::from_toml_str("bind_addr = 12").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = ServerConfig::from_toml_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
