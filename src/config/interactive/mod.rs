
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{ClassificationConfig, Config, ConfigError, OllamaConfig};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Feedlens Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure your local Ollama instance for embedding generation.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Classification Defaults").bold().yellow());
    eprintln!("These apply whenever a classification request leaves them unset.");
    eprintln!();

    configure_classification(&mut config.classification)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before fetching feeds.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    let classification = &config.classification;
    eprintln!();
    eprintln!("{}", style("Classification Defaults:").bold().yellow());
    eprintln!(
        "  Deep Parsing: {}",
        style(classification.use_deep_parsing).cyan()
    );
    eprintln!("  Top N: {}", style(classification.top_n).cyan());
    eprintln!("  Threshold: {}", style(classification.threshold).cyan());
    eprintln!(
        "  Granularity Level: {}",
        style(classification.granularity_level).cyan()
    );
    eprintln!(
        "  Sampling Count: {}",
        style(classification.sampling_count).cyan()
    );
    if !classification.site_blacklist.is_empty() {
        eprintln!(
            "  Site Blacklist: {}",
            style(classification.site_blacklist.join(", ")).cyan()
        );
    }

    eprintln!();
    eprintln!("{}", style("Fetching:").bold().yellow());
    eprintln!(
        "  Concurrency: {}",
        style(config.fetch.max_concurrency).cyan()
    );
    eprintln!(
        "  Feed Timeout: {}s",
        style(config.fetch.timeout_seconds).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    eprintln!("Data directory: {}", style(config.data_dir().display()).dim());
    eprintln!(
        "Taxonomy table: {}",
        style(config.taxonomy_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Ok(Config::default())
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            candidate.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model (must match the taxonomy table)")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_classification(classification: &mut ClassificationConfig) -> Result<()> {
    let use_deep_parsing = Confirm::new()
        .with_prompt("Fetch page descriptions for browsing history (deep parsing)?")
        .default(classification.use_deep_parsing)
        .interact()?;

    let top_n: usize = Input::new()
        .with_prompt("Labels kept per page (top N)")
        .default(classification.top_n)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Top N must be between 1 and 100")
            }
        })
        .interact_text()?;

    let threshold: f32 = Input::new()
        .with_prompt("Similarity threshold")
        .default(classification.threshold)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (-1.0..=1.0).contains(input) {
                Ok(())
            } else {
                Err("Threshold must be between -1.0 and 1.0")
            }
        })
        .interact_text()?;

    let sampling_count: usize = Input::new()
        .with_prompt("Interests kept in the summary")
        .default(classification.sampling_count)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Sampling count must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    classification.use_deep_parsing = use_deep_parsing;
    classification.set_top_n(top_n)?;
    classification.set_threshold(threshold)?;
    classification.sampling_count = sampling_count;

    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
