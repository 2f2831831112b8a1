use cached::proc_macro::cached;
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File, FileFormat};
use once_cell::sync::Lazy;
use serde::Deserialize;

pub use config::ConfigError;

static CONFIG_BUILDER: Lazy<ConfigBuilder<DefaultState>> = Lazy::new(|| {
    let mut builder = Config::builder().add_source(File::from_str(
        include_str!("../Inflight.toml"),
        FileFormat::Toml,
    ));

    if std::path::Path::new("Inflight.toml").exists() {
        builder = builder.add_source(File::new("Inflight.toml", FileFormat::Toml));
    }

    builder.add_source(
        Environment::with_prefix("INFLIGHT")
            .separator("__")
            .try_parsing(true),
    )
});

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Coalescion {
    pub max_in_flight: usize,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Http {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Logging {
    pub level: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub coalescion: Coalescion,
    pub http: Http,
    pub logging: Logging,
}

/// Build the layered configuration
pub fn read() -> Result<Config, ConfigError> {
    CONFIG_BUILDER.clone().build()
}

/// Deserialise settings, cached for 30 seconds
#[cached(time = 30, result = true)]
pub fn config() -> Result<Settings, ConfigError> {
    read()?.try_deserialize::<Settings>()
}

/// Configure logging and common environment variables
pub fn setup_logging() {
    dotenv::dotenv().ok();

    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        config()
            .map(|settings| settings.logging.level)
            .unwrap_or_else(|_| "info".to_string())
    });

    // A second call keeps the logger that is already installed
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .try_init()
        .ok();
}
