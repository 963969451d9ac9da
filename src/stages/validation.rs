use anyhow::Context;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::config::DataValidationConfig;
use crate::models::{IngestionResult, ValidationResult};

/// True when the listing is non-empty and every name is on the allow-list.
///
/// Order-independent: the decision is an AND over all entries.
pub fn all_allowed<I, S>(names: I, allow_list: &[String]) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen_any = false;
    for name in names {
        seen_any = true;
        if !allow_list.iter().any(|allowed| allowed == name.as_ref()) {
            return false;
        }
    }
    seen_any
}

/// Checks the feature store's top-level listing against the required-file list
pub struct DataValidation {
    ingestion: IngestionResult,
    config: DataValidationConfig,
}

impl DataValidation {
    pub fn new(ingestion: IngestionResult, config: DataValidationConfig) -> Self {
        Self { ingestion, config }
    }

    fn list_entries(dir: &Path) -> anyhow::Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
            let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    pub fn validate_all_files_exist(&self) -> anyhow::Result<bool> {
        let names = Self::list_entries(&self.ingestion.extracted_dir)?;
        let required = &self.config.required_files;

        for name in names.iter().filter(|n| !required.contains(n)) {
            warn!("Unexpected entry in feature store: {}", name);
        }
        for missing in required.iter().filter(|r| !names.contains(*r)) {
            info!("Required entry not present in feature store: {}", missing);
        }
        if names.is_empty() {
            warn!("Feature store {:?} is empty", self.ingestion.extracted_dir);
        }

        let status = all_allowed(&names, required);
        self.write_status(status)?;
        Ok(status)
    }

    fn write_status(&self, status: bool) -> anyhow::Result<()> {
        fs::create_dir_all(&self.config.validation_dir)
            .with_context(|| format!("Failed to create {:?}", self.config.validation_dir))?;
        fs::write(&self.config.status_file, format!("Validation status: {}", status))
            .with_context(|| format!("Failed to write {:?}", self.config.status_file))?;
        Ok(())
    }

    pub fn initiate_data_validation(&self) -> anyhow::Result<ValidationResult> {
        info!("Entered data validation");
        let passed = self
            .validate_all_files_exist()
            .context("data validation failed")?;
        let result = ValidationResult { passed };
        info!("Data validation artifact: {:?}", result);
        Ok(result)
    }
}
