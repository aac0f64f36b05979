// Control module
// Entry points for the extension-facing commands; every failure becomes an Outcome


use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::classify::HistoryExport;
use crate::pipeline::{
    AnalysisReport, ClassificationReport, Pipeline, RefreshReport, SettingsReport, StoreStatus,
};
use crate::scheduler::{SchedulerState, UpdateScheduler};
use crate::store::RecommendationDocument;

/// Result of a control command: either a value or the error chain that stopped it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    Completed(T),
    Failed { error: String },
}

impl<T> Outcome<T> {
    /// Log failures with their full context chain
    #[inline]
    pub fn from_result(operation: &str, result: anyhow::Result<T>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(e) => {
                error!("{} failed: {:#}", operation, e);
                Self::Failed {
                    error: format!("{:#}", e),
                }
            }
        }
    }

    #[inline]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[inline]
    pub fn into_result(self) -> anyhow::Result<T> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed { error } => Err(anyhow::anyhow!(error)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationReport {
    #[serde(flatten)]
    pub settings: SettingsReport,
    /// Whether automatic updates are running afterwards
    pub auto_update: bool,
}

/// The pipeline plus the one update loop that may run against it
#[derive(Debug)]
pub struct ControlSurface {
    pipeline: Arc<Pipeline>,
    scheduler: UpdateScheduler<Pipeline>,
}

impl ControlSurface {
    #[inline]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let scheduler = UpdateScheduler::new(Arc::clone(&pipeline));
        Self {
            pipeline,
            scheduler,
        }
    }

    #[inline]
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    #[inline]
    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Start automatic updates with the interval stored in the feed settings
    #[inline]
    pub async fn resume_schedule(&self) -> Outcome<bool> {
        let result = self.pipeline.feed_settings();
        match result {
            Ok(settings) => {
                Outcome::Completed(self.scheduler.start(settings.update_interval_hours).await)
            }
            Err(e) => Outcome::from_result("Resume schedule", Err(e)),
        }
    }

    #[inline]
    pub async fn stop_schedule(&self) -> bool {
        self.scheduler.stop().await
    }

    /// Enable fetching, fetch every feed and recompute recommendations
    #[inline]
    pub async fn trigger_fetch_and_analyze(&self) -> Outcome<RefreshReport> {
        info!("Update requested, fetching feeds and refreshing recommendations");
        let result = async {
            self.pipeline.enable_feeds().await?;
            self.pipeline.refresh().await
        }
        .await;
        Outcome::from_result("Feed update", result)
    }

    #[inline]
    pub async fn trigger_classification(
        &self,
        export: &HistoryExport,
        settings: &Value,
    ) -> Outcome<ClassificationReport> {
        info!(
            "Classification requested for {} history items",
            export.items.len()
        );
        Outcome::from_result(
            "History classification",
            self.pipeline.run_classification(export, settings).await,
        )
    }

    #[inline]
    pub fn latest_recommendations(&self) -> Outcome<RecommendationDocument> {
        let result = self.pipeline.latest_recommendations().and_then(|document| {
            document.ok_or_else(|| anyhow::anyhow!("No recommendations have been computed yet"))
        });
        Outcome::from_result("Load recommendations", result)
    }

    #[inline]
    pub async fn save_user_interest_summary(&self, document: &Value) -> Outcome<AnalysisReport> {
        Outcome::from_result(
            "Save interest summary",
            self.pipeline.save_interest_summary(document).await,
        )
    }

    /// Store feed settings, reconcile the article history with them and
    /// restart or stop automatic updates to match the new interval
    #[inline]
    pub async fn save_configuration(&self, document: &Value) -> Outcome<ConfigurationReport> {
        let settings = match self.pipeline.apply_settings(document).await {
            Ok(settings) => settings,
            Err(e) => return Outcome::from_result("Save configuration", Err(e)),
        };
        let auto_update = self.scheduler.start(settings.update_interval_hours).await;
        Outcome::Completed(ConfigurationReport {
            settings,
            auto_update,
        })
    }

    #[inline]
    pub async fn clear_caches(&self) -> Outcome<Vec<String>> {
        Outcome::from_result("Clear caches", self.pipeline.clear_caches().await)
    }

    #[inline]
    pub fn status(&self) -> Outcome<StoreStatus> {
        Outcome::from_result("Status", self.pipeline.status())
    }
}
