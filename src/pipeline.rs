use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::download::{Downloader, HttpDownloader};
use crate::models::{IngestionResult, TrainingResult, ValidationResult};
use crate::process::{CommandRunner, SystemRunner};
use crate::stages::{DataIngestion, DataValidation, ModelTrainer};

/// Linear ingest → validate → train driver.
///
/// Any stage failure aborts the run. Training is invoked only when validation
/// passed; otherwise the run fails without touching the trainer.
pub struct TrainPipeline {
    config: Arc<AppConfig>,
    downloader: Box<dyn Downloader + Send + Sync>,
    runner: Box<dyn CommandRunner + Send + Sync>,
}

impl TrainPipeline {
    /// Pipeline wired to the network and real processes
    pub fn new(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            downloader: Box::new(HttpDownloader::new()?),
            runner: Box::new(SystemRunner),
        })
    }

    pub fn with_downloader(mut self, downloader: Box<dyn Downloader + Send + Sync>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_runner(mut self, runner: Box<dyn CommandRunner + Send + Sync>) -> Self {
        self.runner = runner;
        self
    }

    /// Build a pipeline from explicit parts
    pub fn from_parts(
        config: Arc<AppConfig>,
        downloader: Box<dyn Downloader + Send + Sync>,
        runner: Box<dyn CommandRunner + Send + Sync>,
    ) -> Self {
        Self {
            config,
            downloader,
            runner,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn start_data_ingestion(&self) -> anyhow::Result<IngestionResult> {
        info!("Getting the data from URL");
        let ingestion = DataIngestion::new(self.config.data_ingestion(), self.downloader.as_ref());
        let result = ingestion.initiate_data_ingestion()?;
        info!("Got the data from URL");
        Ok(result)
    }

    pub fn start_data_validation(
        &self,
        ingestion: &IngestionResult,
    ) -> anyhow::Result<ValidationResult> {
        let validation = DataValidation::new(ingestion.clone(), self.config.data_validation());
        let result = validation.initiate_data_validation()?;
        info!("Performed the data validation operation");
        Ok(result)
    }

    pub fn start_model_trainer(
        &self,
        ingestion: &IngestionResult,
    ) -> anyhow::Result<TrainingResult> {
        let trainer = ModelTrainer::new(self.config.model_trainer(), self.runner.as_ref());
        trainer.initiate_model_trainer(&ingestion.archive_path)
    }

    fn run_stages(&self) -> anyhow::Result<TrainingResult> {
        let ingestion = self.start_data_ingestion()?;
        let validation = self.start_data_validation(&ingestion)?;
        if !validation.passed {
            anyhow::bail!(
                "dataset is not in the expected format (allowed entries: {})",
                self.config.validation.required_files.join(", ")
            );
        }
        self.start_model_trainer(&ingestion)
    }

    pub fn run_pipeline(&self) -> anyhow::Result<TrainingResult> {
        info!("Starting training pipeline");
        let result = self.run_stages().context("training pipeline failed")?;
        info!("Training pipeline finished: {:?}", result.trained_weights_path);
        Ok(result)
    }
}
