use anyhow::Context;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::archive;
use crate::config::DataIngestionConfig;
use crate::download::{DatasetSource, Downloader, looks_like_zip};
use crate::models::IngestionResult;

/// Downloads the dataset archive and extracts it into the feature store
pub struct DataIngestion<'a> {
    config: DataIngestionConfig,
    downloader: &'a dyn Downloader,
}

impl<'a> DataIngestion<'a> {
    pub fn new(config: DataIngestionConfig, downloader: &'a dyn Downloader) -> Self {
        Self { config, downloader }
    }

    /// Fetch the archive to `<ingestion_dir>/<archive_name>`
    pub fn download_data(&self) -> anyhow::Result<PathBuf> {
        let source = DatasetSource::parse(&self.config.download_url)?;
        fs::create_dir_all(&self.config.ingestion_dir)
            .with_context(|| format!("Failed to create {:?}", self.config.ingestion_dir))?;
        let archive_path = self.config.ingestion_dir.join(&self.config.archive_name);

        info!("Downloading data from {} into {:?}", self.config.download_url, archive_path);
        self.downloader
            .download(&source.fetch_url(), &archive_path)
            .with_context(|| format!("Failed to download {}", self.config.download_url))?;

        if !looks_like_zip(&archive_path)? {
            anyhow::bail!("Downloaded payload {:?} is not a zip archive", archive_path);
        }
        Ok(archive_path)
    }

    /// Unpack the archive into the feature store directory
    pub fn extract_zip_file(&self, archive_path: &std::path::Path) -> anyhow::Result<PathBuf> {
        let feature_store = &self.config.feature_store_dir;
        info!("Extracting {:?} into {:?}", archive_path, feature_store);
        archive::extract_zip(archive_path, feature_store)?;
        Ok(feature_store.clone())
    }

    pub fn initiate_data_ingestion(&self) -> anyhow::Result<IngestionResult> {
        info!("Entered data ingestion");
        let run = || -> anyhow::Result<IngestionResult> {
            let archive_path = self.download_data()?;
            let extracted_dir = self.extract_zip_file(&archive_path)?;
            Ok(IngestionResult {
                archive_path,
                extracted_dir,
            })
        };
        let result = run().context("data ingestion failed")?;
        info!("Data ingestion artifact: {:?}", result);
        Ok(result)
    }
}
