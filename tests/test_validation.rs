//! Integration tests for dataset validation.
//!
//! Tests cover:
//! - Order independence of the allow-list decision
//! - Status file contents
//! - Validation of a partially extracted feature store

mod common;

use firesmoke::config::DataValidationConfig;
use firesmoke::stages::DataValidation;
use firesmoke::stages::validation::all_allowed;

use common::*;

fn allow_list() -> Vec<String> {
    ["train", "valid", "test", "data.yaml"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn validation_for(root: &std::path::Path, extracted: &std::path::Path) -> DataValidation {
    let config = test_config(root);
    let ingestion = IngestionResult {
        archive_path: root.join("data.zip"),
        extracted_dir: extracted.to_path_buf(),
    };
    DataValidation::new(ingestion, config.data_validation())
}

#[test]
fn test_decision_ignores_listing_order() {
    let allowed = allow_list();
    let listing = ["data.yaml", "notes.md", "train", "valid"];

    // every rotation of a listing with one stranger fails
    for shift in 0..listing.len() {
        let mut rotated = listing.to_vec();
        rotated.rotate_left(shift);
        assert!(!all_allowed(&rotated, &allowed), "rotation {}", shift);
    }

    // the stranger examined first or last makes no difference
    assert!(!all_allowed(["notes.md", "train"], &allowed));
    assert!(!all_allowed(["train", "notes.md"], &allowed));

    assert!(all_allowed(["test", "train", "data.yaml", "valid"], &allowed));
    assert!(all_allowed(["valid", "data.yaml"], &allowed));
}

#[test]
fn test_empty_listing_fails() {
    assert!(!all_allowed(Vec::<String>::new(), &allow_list()));
}

#[test]
fn test_status_file_is_written_once_with_aggregate() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let store = dir.path().join("store");
    for name in ["train", "valid", "test"] {
        std::fs::create_dir_all(store.join(name))?;
    }
    std::fs::write(store.join("data.yaml"), "names: [fire, smoke]")?;

    let validation = validation_for(dir.path(), &store);
    let result = validation.initiate_data_validation()?;
    assert!(result.passed);

    let status_file = test_config(dir.path()).data_validation().status_file;
    assert_eq!(std::fs::read_to_string(&status_file)?, "Validation status: true");

    // a stray file now flips the aggregate, and the file is overwritten
    std::fs::write(store.join("zzz.txt"), "stray")?;
    assert!(!validation.initiate_data_validation()?.passed);
    assert_eq!(std::fs::read_to_string(&status_file)?, "Validation status: false");
    Ok(())
}

#[test]
fn test_partial_extraction_is_still_validated() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let mut archive = zip_bytes(DATASET_ENTRIES)?;
    // cut the central directory off so reading the archive fails
    archive.truncate(archive.len() / 2);
    let archive_path = dir.path().join("broken.zip");
    std::fs::write(&archive_path, &archive)?;

    let store = dir.path().join("store");
    let extracted = firesmoke::archive::extract_zip(&archive_path, &store);
    assert!(extracted.is_err());
    // the destination exists even though nothing usable came out
    assert!(store.is_dir());

    let result = validation_for(dir.path(), &store).initiate_data_validation()?;
    assert!(!result.passed, "an empty or partial store must not pass silently");
    Ok(())
}

#[test]
fn test_missing_feature_store_is_an_error() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let err = validation_for(dir.path(), &dir.path().join("absent"))
        .initiate_data_validation()
        .expect_err("listing a missing directory should fail");
    assert!(format!("{:#}", err).starts_with("data validation failed"));
    Ok(())
}

#[test]
fn test_custom_allow_list_from_config() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let store = dir.path().join("store");
    std::fs::create_dir_all(store.join("images"))?;

    let config = DataValidationConfig {
        validation_dir: dir.path().join("validation"),
        status_file: dir.path().join("validation/status.txt"),
        required_files: vec!["images".to_string()],
    };
    let ingestion = IngestionResult {
        archive_path: dir.path().join("data.zip"),
        extracted_dir: store,
    };
    assert!(DataValidation::new(ingestion, config).validate_all_files_exist()?);
    Ok(())
}
