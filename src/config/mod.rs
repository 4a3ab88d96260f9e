// Configuration management module
// TOML settings under the base directory plus the interactive setup wizard

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, IngestConfig, LlmConfig, OllamaConfig, RetrievalConfig, ServerConfig,
};
