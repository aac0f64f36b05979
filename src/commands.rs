use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::classify::HistoryExport;
use crate::config::Config;
use crate::control::ControlSurface;
use crate::embeddings::OllamaClient;
use crate::pipeline::{AnalysisReport, FetchSummary, Pipeline};
use crate::scheduler::SchedulerState;

/// Per-run overrides for a classification, layered over the export's own settings
#[derive(Debug, Clone, Default)]
pub struct ClassifyOverrides {
    pub shallow: bool,
    pub top_n: Option<usize>,
    pub threshold: Option<f32>,
    pub granularity: Option<u8>,
    pub sampling_count: Option<usize>,
}

impl ClassifyOverrides {
    fn to_settings(&self) -> Value {
        let mut settings = Map::new();
        if self.shallow {
            settings.insert("useDeepParsing".to_string(), json!(false));
        }
        if let Some(top_n) = self.top_n {
            settings.insert("topN".to_string(), json!(top_n));
        }
        if let Some(threshold) = self.threshold {
            settings.insert("threshold".to_string(), json!(threshold));
        }
        if let Some(granularity) = self.granularity {
            settings.insert("granularityLevel".to_string(), json!(granularity));
        }
        if let Some(sampling_count) = self.sampling_count {
            settings.insert("samplingCount".to_string(), json!(sampling_count));
        }
        Value::Object(settings)
    }
}

fn control_surface() -> Result<ControlSurface> {
    let config = Config::load()?;
    let pipeline = Pipeline::from_config(config).context("Failed to set up the pipeline")?;
    Ok(ControlSurface::new(Arc::new(pipeline)))
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_fetch(fetch: &FetchSummary) {
    if !fetch.enabled {
        println!("Feed fetching is disabled in the feed settings.");
        return;
    }
    for source in &fetch.sources {
        match &source.error {
            None => println!("   ✅ {} ({} items)", source.source, source.items),
            Some(error) => println!("   ❌ {} - {}", source.url, error),
        }
    }
    println!(
        "Merged {} new articles ({} fetched, {} stored)",
        fetch.merge.added, fetch.merge.fetched, fetch.merge.total
    );
}

fn print_analysis(analysis: &AnalysisReport) {
    match analysis {
        AnalysisReport::Skipped { reason } => {
            println!("Recommendations not updated: {}", reason);
        }
        AnalysisReport::Updated {
            labels,
            recommended,
            embedded,
        } => {
            println!(
                "Recommendations updated: {} articles across {} labels ({} newly embedded)",
                recommended, labels, embedded
            );
        }
    }
}

/// Fetch every configured feed and refresh recommendations
#[inline]
pub async fn fetch_feeds() -> Result<()> {
    let surface = control_surface()?;
    println!("📡 Fetching feeds...");
    let report = surface.trigger_fetch_and_analyze().await.into_result()?;
    print_fetch(&report.fetch);
    print_analysis(&report.analysis);
    Ok(())
}

/// Label a browsing-history export and derive the interest summary from it
#[inline]
pub async fn classify_history(path: &Path, overrides: &ClassifyOverrides) -> Result<()> {
    let surface = control_surface()?;
    let export: HistoryExport = serde_json::from_value(read_json(path)?)
        .with_context(|| format!("{} is not a history export", path.display()))?;
    info!("Loaded {} history items from {}", export.items.len(), path.display());

    println!("🧭 Classifying {} history items...", export.items.len());
    let report = surface
        .trigger_classification(&export, &overrides.to_settings())
        .await
        .into_result()?;

    println!("Analyzed {} items. Interests:", report.total_analyzed);
    for entry in &report.summary {
        println!(
            "   {:<50} {:>4} hits  score {:.4}",
            entry.path, entry.count, entry.total_score
        );
    }
    if let Some(fetch) = &report.fetch {
        println!();
        print_fetch(fetch);
    }
    print_analysis(&report.analysis);
    Ok(())
}

#[inline]
pub fn show_recommendations() -> Result<()> {
    let surface = control_surface()?;
    let document = surface.latest_recommendations().into_result()?;

    println!("📰 Recommendations (updated {})", document.updated);
    println!("{}", "=".repeat(50));
    for result in &document.recommendations {
        println!();
        println!("🏷️  {}", result.label);
        if result.top_articles.is_empty() {
            println!("   (no matching articles)");
        }
        for article in &result.top_articles {
            println!("   {:.3}  {} [{}]", article.score, article.title, article.source);
            if !article.link.is_empty() {
                println!("          {}", article.link);
            }
        }
    }
    Ok(())
}

/// Replace the user-edited interest summary
#[inline]
pub async fn save_interests(path: &Path) -> Result<()> {
    let surface = control_surface()?;
    let document = read_json(path)?;
    let analysis = surface
        .save_user_interest_summary(&document)
        .await
        .into_result()?;
    println!("Interest summary saved from {}", path.display());
    print_analysis(&analysis);
    Ok(())
}

/// Store new feed settings and reconcile the article history with them
#[inline]
pub async fn apply_settings(path: &Path) -> Result<()> {
    let surface = control_surface()?;
    let document = read_json(path)?;
    let report = surface.save_configuration(&document).await.into_result()?;

    println!("Feed settings saved from {}", path.display());
    println!("   Expired articles removed: {}", report.settings.expired);
    println!(
        "   Articles from removed feeds: {}",
        report.settings.removed_by_source
    );
    print_analysis(&report.settings.analysis);
    if report.auto_update {
        println!(
            "Automatic updates every {}h apply while `feedlens watch` runs.",
            report.settings.update_interval_hours
        );
    }
    surface.stop_schedule().await;
    Ok(())
}

#[inline]
pub async fn clear_cache() -> Result<()> {
    let surface = control_surface()?;
    let deleted = surface.clear_caches().await.into_result()?;
    if deleted.is_empty() {
        println!("Nothing to clear.");
    }
    for path in &deleted {
        println!("✓ Deleted {}", path);
    }
    Ok(())
}

#[inline]
pub fn show_status() -> Result<()> {
    let config = Config::load()?;
    println!("📊 Feedlens Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", config.ollama.model);
            }
            Err(e) => println!("   ⚠️  Ollama: Connected but unhealthy - {}", e),
        },
        Err(e) => println!("   ❌ Ollama: Failed to connect - {}", e),
    }
    println!();

    let taxonomy_path = config.taxonomy_path();
    println!("🗂️  Taxonomy: {}", taxonomy_path.display());
    if !taxonomy_path.exists() {
        println!("   ⚠️  File not found; classification will fail");
    }
    println!();

    let surface = ControlSurface::new(Arc::new(Pipeline::from_config(config)?));
    let status = surface.status().into_result()?;
    println!("📰 Article History:");
    if status.exists {
        println!("   Articles: {}", status.total_articles);
        println!(
            "   Updated: {}",
            status.updated_at.as_deref().unwrap_or("unknown")
        );
    } else {
        println!("   No articles fetched yet. Run 'feedlens fetch'.");
    }
    println!("   Size on disk: {:.2} MB", status.file_size_mb);

    let settings = surface.pipeline().feed_settings()?;
    println!();
    println!("⚙️  Feed Settings:");
    println!("   Enabled: {}", settings.enabled);
    println!("   Feeds: {}", settings.effective_feeds().len());
    println!("   History: {} days", settings.history_days);
    println!("   Recommendations: {}", settings.recommend_count);
    if settings.update_interval_hours > 0.0 {
        println!("   Auto update: every {}h", settings.update_interval_hours);
    } else {
        println!("   Auto update: off");
    }

    Ok(())
}

/// Run automatic updates in the foreground until Ctrl-C
#[inline]
pub async fn watch() -> Result<()> {
    let surface = control_surface()?;
    if !surface.resume_schedule().await.into_result()? {
        println!("Automatic updates are off; set updateIntervalHours in the feed settings.");
        return Ok(());
    }

    let interval = surface.pipeline().feed_settings()?.update_interval_hours;
    println!("⏱️  Updating feeds every {}h. Press Ctrl-C to stop.", interval);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    surface.stop_schedule().await;
    if surface.scheduler_state() == SchedulerState::Stopped {
        println!("Stopped.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_set_given_fields() {
        let overrides = ClassifyOverrides {
            shallow: true,
            top_n: Some(3),
            ..ClassifyOverrides::default()
        };

        assert_eq!(
            overrides.to_settings(),
            json!({"useDeepParsing": false, "topN": 3})
        );
        assert_eq!(ClassifyOverrides::default().to_settings(), json!({}));
    }

    #[test]
    fn read_json_reports_the_path() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("export.json");
        fs::write(&path, "{not json").expect("should write file");

        let error = read_json(&path).expect_err("should fail to parse");
        assert!(format!("{:#}", error).contains("export.json"));
    }
}
