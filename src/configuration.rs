use crate::foundation::models::Period;
use config::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

pub const DEFAULT_LASTFM_URL: &str = "https://ws.audioscrobbler.com/2.0/";

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub lastfm: LastfmSettings,
    #[serde(default)]
    pub aggregation: AggregationSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LastfmSettings {
    pub api_key: String,
    pub username: String,
    #[serde(default = "default_lastfm_url")]
    pub base_url: String,
    /// Token-bucket size per second. Unset (or zero) disables client-side throttling.
    #[serde(default)]
    pub requests_per_second: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl LastfmSettings {
    pub fn new(url: &str, api_key: &str, username: &str) -> Self {
        Self {
            base_url: url.to_string(),
            api_key: api_key.to_string(),
            username: username.to_string(),
            requests_per_second: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AggregationSettings {
    pub artist_limit: u32,
    pub batch_size: usize,
    pub tags_per_artist: usize,
    pub batch_delay_ms: u64,
    pub max_genres: usize,
}

impl AggregationSettings {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            artist_limit: 20,
            batch_size: 5,
            tags_per_artist: 5,
            batch_delay_ms: 200,
            max_genres: 12,
        }
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Sled,
    Memory,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub ttl_ms: u64,
    pub prefetch_delay_ms: u64,
    pub prefetch_periods: Vec<Period>,
    /// Base URL of a `genrefm serve` instance, used by `genres --remote`.
    pub remote_url: Option<String>,
}

impl CacheSettings {
    pub fn prefetch_delay(&self) -> Duration {
        Duration::from_millis(self.prefetch_delay_ms)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Sled,
            ttl_ms: 3_600_000,
            prefetch_delay_ms: 5_000,
            prefetch_periods: Vec::new(),
            remote_url: None,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

fn default_lastfm_url() -> String {
    DEFAULT_LASTFM_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Loads the YAML file, then lets `GENREFM_<SECTION>__<KEY>` environment variables
/// override individual values (e.g. `GENREFM_LASTFM__API_KEY`).
pub fn get_configuration(cfg_file: &str) -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::new(cfg_file, config::FileFormat::Yaml))
        .add_source(
            config::Environment::with_prefix("GENREFM")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub struct ConfigFolder {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub cache_db: PathBuf,
}

impl ConfigFolder {
    pub fn new() -> io::Result<Self> {
        let home_dir = env::var("HOME")
            .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME is not set"))?;

        Ok(Self::in_home(Path::new(&home_dir)))
    }

    pub fn in_home(home_dir: &Path) -> Self {
        let config_dir = home_dir.join(".genrefm");
        Self {
            config_file: config_dir.join("config.yaml"),
            cache_db: config_dir.join("genre_cache"),
            config_dir,
        }
    }
}

pub fn create_config(cfg_folder: ConfigFolder) -> anyhow::Result<()> {
    println!("\x1b[1m\x1b[32mCreating configuration...\x1b[0m");
    let config_dir = &cfg_folder.config_dir;

    if config_dir.exists() && !confirm_overwrite()? {
        println!("\x1b[33mOperation cancelled.\x1b[0m");
        return Ok(());
    }

    write_config_files(&cfg_folder)?;

    println!("\x1b[32mConfiguration file created at:");
    println!("  -> ~/.genrefm/config.yaml");
    println!("Genre cache folder created at:");
    println!("  -> ~/.genrefm/genre_cache");
    println!("\x1b[0mPlease add your Last.fm API key and username to the configuration file.");

    Ok(())
}

fn write_config_files(cfg_folder: &ConfigFolder) -> io::Result<()> {
    fs::create_dir_all(&cfg_folder.config_dir)?;
    fs::create_dir_all(&cfg_folder.cache_db)?;

    let config_content = include_str!("config_template.yaml");
    fs::write(&cfg_folder.config_file, config_content)
}

fn confirm_overwrite() -> Result<bool, io::Error> {
    println!("\x1b[31mThe configuration folder already exists.");
    println!("Do you want to overwrite the configuration file? The genre cache is kept. (y/N)\x1b[0m");

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().to_lowercase() == "y")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_folder_layout() {
        let folder = ConfigFolder::in_home(Path::new("/home/someone"));

        assert_eq!(folder.config_dir, PathBuf::from("/home/someone/.genrefm"));
        assert_eq!(
            folder.config_file,
            PathBuf::from("/home/someone/.genrefm/config.yaml")
        );
        assert_eq!(
            folder.cache_db,
            PathBuf::from("/home/someone/.genrefm/genre_cache")
        );
    }

    #[test]
    fn test_template_parses_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let folder = ConfigFolder::in_home(temp_dir.path());
        write_config_files(&folder).unwrap();

        let settings = get_configuration(folder.config_file.to_str().unwrap()).unwrap();

        assert_eq!(settings.lastfm.base_url, DEFAULT_LASTFM_URL);
        assert_eq!(settings.aggregation, AggregationSettings::default());
        assert_eq!(settings.cache.ttl_ms, 3_600_000);
        assert_eq!(settings.cache.backend, CacheBackend::Sled);
        assert_eq!(
            settings.cache.prefetch_periods,
            vec![Period::SevenDay, Period::ThreeMonth]
        );
        assert!(folder.cache_db.is_dir());
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("minimal.yaml");
        fs::write(
            &path,
            "lastfm:\n  api_key: abc\n  username: someone\ncache:\n  backend: memory\n  ttl_ms: 1000\n",
        )
        .unwrap();

        let settings = get_configuration(path.to_str().unwrap()).unwrap();

        assert_eq!(settings.lastfm.api_key, "abc");
        assert_eq!(settings.lastfm.timeout_secs, 10);
        assert_eq!(settings.lastfm.requests_per_second, None);
        assert_eq!(settings.aggregation.batch_delay(), Duration::from_millis(200));
        assert_eq!(settings.cache.backend, CacheBackend::Memory);
        assert_eq!(settings.cache.ttl_ms, 1000);
        assert_eq!(settings.cache.prefetch_delay(), Duration::from_secs(5));
        assert_eq!(settings.server.bind_address, "127.0.0.1:3000");
    }

    #[test]
    fn test_missing_lastfm_section_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.yaml");
        fs::write(&path, "server:\n  bind_address: 0.0.0.0:8080\n").unwrap();

        assert!(get_configuration(path.to_str().unwrap()).is_err());
    }
}
