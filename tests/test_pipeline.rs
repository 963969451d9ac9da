//! Integration tests for the ingest → validate → train driver.
//!
//! Tests cover:
//! - A valid dataset flows through every stage to a trained checkpoint
//! - Training runs if and only if validation passed
//! - Exported datasets with their README files are accepted
//! - A failed download stops the run before extraction
//! - Errors carry the stage they came from

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::*;

fn pipeline(
    config: AppConfig,
    downloader: &FakeDownloader,
    runner: &FakeRunner,
) -> TrainPipeline {
    TrainPipeline::from_parts(
        Arc::new(config),
        Box::new(downloader.clone()),
        Box::new(runner.clone()),
    )
}

#[test]
fn test_valid_dataset_is_trained() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = test_config(dir.path());
    let downloader = FakeDownloader::serving(zip_bytes(DATASET_ENTRIES)?);
    let runner = FakeRunner::succeeding();

    let result = pipeline(config.clone(), &downloader, &runner).run_pipeline()?;

    assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.trained_weights_path, config.model_trainer().trainer_dir.join("best.pt"));
    assert!(result.trained_weights_path.is_file());
    assert_eq!(result.exported_model_path, None);

    let status = std::fs::read_to_string(config.data_validation().status_file)?;
    assert_eq!(status, "Validation status: true");

    let commands = runner.recorded();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].args.contains(&"task=segment".to_string()));
    Ok(())
}

#[test]
fn test_unexpected_entry_blocks_training() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = test_config(dir.path());
    let mut entries = DATASET_ENTRIES.to_vec();
    entries.push(("notes.bin", &b"\x00\x01"[..]));
    let downloader = FakeDownloader::serving(zip_bytes(&entries)?);
    let runner = FakeRunner::succeeding();

    let err = pipeline(config.clone(), &downloader, &runner)
        .run_pipeline()
        .expect_err("validation should stop the run");

    assert!(runner.recorded().is_empty(), "trainer must not be invoked");
    let chain = format!("{:#}", err);
    assert!(chain.starts_with("training pipeline failed"), "{}", chain);
    assert!(chain.contains("not in the expected format"), "{}", chain);

    let status = std::fs::read_to_string(config.data_validation().status_file)?;
    assert_eq!(status, "Validation status: false");
    assert!(!config.model_trainer().trainer_dir.exists());
    Ok(())
}

#[test]
fn test_exported_dataset_with_readmes_is_trained() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = test_config(dir.path());
    let mut entries = DATASET_ENTRIES.to_vec();
    entries.push(("README.dataset.txt", &b"# Fire and smoke segmentation"[..]));
    entries.push(("README.roboflow.txt", &b"Exported via roboflow.com"[..]));
    let downloader = FakeDownloader::serving(zip_bytes(&entries)?);
    let runner = FakeRunner::succeeding();

    let result = pipeline(config.clone(), &downloader, &runner).run_pipeline()?;

    assert_eq!(runner.recorded().len(), 1);
    assert!(result.trained_weights_path.is_file());
    let status = std::fs::read_to_string(config.data_validation().status_file)?;
    assert_eq!(status, "Validation status: true");
    Ok(())
}

#[test]
fn test_subset_of_required_entries_still_trains() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = test_config(dir.path());
    let entries: [(&str, &[u8]); 2] = [("data.yaml", b"names: [fire]"), ("train/a.jpg", b"a")];
    let downloader = FakeDownloader::serving(zip_bytes(&entries)?);
    let runner = FakeRunner::succeeding();

    pipeline(config, &downloader, &runner).run_pipeline()?;
    assert_eq!(runner.recorded().len(), 1);
    Ok(())
}

#[test]
fn test_download_failure_never_extracts() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = test_config(dir.path());
    let downloader = FakeDownloader::failing();
    let runner = FakeRunner::succeeding();

    let err = pipeline(config.clone(), &downloader, &runner)
        .run_pipeline()
        .expect_err("download failure should abort");

    let chain = format!("{:#}", err);
    assert!(chain.contains("data ingestion failed"), "{}", chain);
    assert!(chain.contains("simulated network error"), "{}", chain);
    assert!(!config.data_ingestion().feature_store_dir.exists());
    assert!(!config.data_validation().status_file.exists());
    assert!(runner.recorded().is_empty());
    Ok(())
}

#[test]
fn test_non_zip_payload_is_rejected_before_extraction() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = test_config(dir.path());
    let downloader =
        FakeDownloader::serving(b"<!DOCTYPE html><html>Virus scan warning</html>".to_vec());
    let runner = FakeRunner::succeeding();

    let err = pipeline(config.clone(), &downloader, &runner)
        .run_pipeline()
        .expect_err("html payload should abort");

    assert!(format!("{:#}", err).contains("not a zip archive"));
    assert!(!config.data_ingestion().feature_store_dir.exists());
    Ok(())
}

#[test]
fn test_missing_url_fails_without_downloading() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = test_config(dir.path()).with_download_url("");
    let downloader = FakeDownloader::serving(zip_bytes(DATASET_ENTRIES)?);
    let runner = FakeRunner::succeeding();

    let err = pipeline(config, &downloader, &runner)
        .run_pipeline()
        .expect_err("empty URL should abort");

    assert!(format!("{:#}", err).contains("not configured"));
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn test_stages_can_be_driven_one_by_one() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = test_config(dir.path());
    let downloader = FakeDownloader::serving(zip_bytes(DATASET_ENTRIES)?);
    let runner = FakeRunner::succeeding();
    let pipeline = pipeline(config.clone(), &downloader, &runner);

    let ingestion = pipeline.start_data_ingestion()?;
    assert_eq!(ingestion.archive_path, config.data_ingestion().ingestion_dir.join("data.zip"));
    assert!(ingestion.extracted_dir.join("data.yaml").is_file());
    assert!(ingestion.extracted_dir.join("train/images/a.jpg").is_file());

    assert!(pipeline.start_data_validation(&ingestion)?.passed);

    let result = pipeline.start_model_trainer(&ingestion)?;
    assert!(result.trained_weights_path.is_file());
    Ok(())
}
