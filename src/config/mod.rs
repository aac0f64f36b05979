// Configuration management module
// TOML application settings plus the JSON feed settings document

pub mod feeds;
pub mod interactive;
pub mod settings;


pub use feeds::{DEFAULT_FEEDS, FeedSettings};
pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    ClassificationConfig, Config, ConfigError, FetchConfig, OllamaConfig, RecommendationConfig,
};
