use crate::sheet::{DEFAULT_HEADER_TOKENS, DEFAULT_SCAN_ROWS};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `postgres://...` 或 `memory://`
    pub url: String,
    pub max_connections: u32,
    /// 启动时建表
    pub auto_migrate: bool,
    /// 单次存储调用超时
    pub store_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn is_memory(&self) -> bool {
        self.url.starts_with("memory://")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub header_scan_rows: usize,
    pub header_tokens: Vec<String>,
    pub commit_chunk_size: usize,
    pub max_upload_bytes: usize,
    pub preview_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// RUST_LOG 未设置时使用
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/payout_recon".to_string(),
                max_connections: 20,
                auto_migrate: false,
                store_timeout_secs: 30,
            },
            import: ImportConfig::default(),
            log: LogConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            header_scan_rows: DEFAULT_SCAN_ROWS,
            header_tokens: DEFAULT_HEADER_TOKENS.iter().map(|t| t.to_string()).collect(),
            commit_chunk_size: 1000,
            max_upload_bytes: 20 * 1024 * 1024,
            preview_rows: 10,
        }
    }
}

impl AppConfig {
    /// 加载顺序: 默认值 → config/app.* (可选) → PAYOUT_* 环境变量 → DATABASE_URL / SERVER_HOST / SERVER_PORT
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Some("config/app"))
    }

    pub fn load_from(file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        if let Some(name) = file {
            builder = builder.add_source(File::with_name(name).required(false));
        }

        builder
            .add_source(
                Environment::with_prefix("PAYOUT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.import.header_scan_rows, 50);
        assert_eq!(config.import.commit_chunk_size, 1000);
        assert_eq!(config.import.preview_rows, 10);
        assert_eq!(config.database.store_timeout_secs, 30);
        assert!(config.import.header_tokens.contains(&"order id".to_string()));
        assert!(!config.database.is_memory());
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("payout-recon-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("app.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[import]\ncommit_chunk_size = 250\n\n[database]\nurl = \"memory://\"").unwrap();

        let base = dir.join("app");
        let config = AppConfig::load_from(base.to_str()).unwrap();
        assert_eq!(config.import.commit_chunk_size, 250);
        assert_eq!(config.import.header_scan_rows, 50);
        // DATABASE_URL 环境变量优先于文件
        if std::env::var("DATABASE_URL").is_err() {
            assert!(config.database.is_memory());
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
