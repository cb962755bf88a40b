use clap::Parser;
use rand::Rng;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sixcities", about = "Rental listing REST backend")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Public base URL used to build absolute media links
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: Option<String>,
    pub environment: Environment,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
    pub max_file_size: usize,
    pub max_photos: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub token_hours: i64,
    pub bcrypt_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            base_url: None,
            environment: Environment::Production,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_file_size: 5 * 1024 * 1024,
            max_photos: 10,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_hours: 24,
            bcrypt_cost: 12,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // Environment overrides
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            if !secret.is_empty() {
                config.auth.jwt_secret = Some(secret);
            }
        }

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref base_url) = cli.base_url {
            config.server.base_url = Some(base_url.clone());
        }

        config.resolve_defaults(&data_dir);
        Ok(config)
    }

    /// Fill in everything that depends on the data dir or other settings.
    pub fn resolve_defaults(&mut self, data_dir: &std::path::Path) {
        if self.database.path.is_none() {
            self.database.path = Some(data_dir.join("sixcities.db"));
        }
        if self.storage.path.is_none() {
            self.storage.path = Some(data_dir.join("static"));
        }
        if self.server.base_url.is_none() {
            self.server.base_url = Some(format!("http://localhost:{}", self.server.port));
        }
        if self.auth.jwt_secret.is_none() {
            tracing::warn!("No JWT secret configured; tokens will not survive a restart");
            self.auth.jwt_secret = Some(generate_secret());
        }
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".sixcities")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("sixcities.db"))
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("static"))
    }

    pub fn base_url(&self) -> String {
        self.server
            .base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.server.port))
    }

    pub fn jwt_secret(&self) -> &str {
        self.auth.jwt_secret.as_deref().unwrap_or_default()
    }

    pub fn is_development(&self) -> bool {
        self.server.environment == Environment::Development
    }
}

fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with_dir(dir: &std::path::Path) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(dir.to_path_buf()),
            base_url: None,
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.environment, Environment::Production);
        assert_eq!(config.auth.token_hours, 24);
        assert_eq!(config.auth.bcrypt_cost, 12);
        assert_eq!(config.storage.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.storage.max_photos, 10);
        assert!(config.database.path.is_none());
        assert!(config.storage.path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_with_dir(std::path::Path::new("/tmp/test-sixcities"));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-sixcities"));
    }

    #[test]
    fn data_dir_defaults_to_home_dot_sixcities() {
        let cli = Cli {
            config: None,
            host: None,
            port: None,
            data_dir: None,
            base_url: None,
        };
        let dir = Config::data_dir(&cli);
        assert!(dir.ends_with(".sixcities"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_with_dir(tmp.path())).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.db_path(), tmp.path().join("sixcities.db"));
        assert_eq!(config.uploads_path(), tmp.path().join("static"));
        assert_eq!(config.base_url(), "http://localhost:5000");
        assert!(!config.jwt_secret().is_empty());
    }

    #[test]
    fn load_applies_cli_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            host: Some("127.0.0.1".to_string()),
            port: Some(8080),
            base_url: Some("https://rentals.example.com".to_string()),
            ..cli_with_dir(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.base_url(), "https://rentals.example.com");
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
environment = "development"

[storage]
max_photos = 4

[auth]
jwt_secret = "file-secret"
token_hours = 2
bcrypt_cost = 4
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            ..cli_with_dir(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 9000);
        assert!(config.is_development());
        assert_eq!(config.storage.max_photos, 4);
        assert_eq!(config.storage.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.auth.token_hours, 2);
        assert_eq!(config.auth.bcrypt_cost, 4);
        assert_eq!(config.base_url(), "http://localhost:9000");
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
            ..cli_with_dir(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn generated_secret_is_hex() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, generate_secret());
    }
}
