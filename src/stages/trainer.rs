use anyhow::Context;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::archive;
use crate::config::ModelTrainerConfig;
use crate::models::TrainingResult;
use crate::process::{CommandRunner, ExternalCommand};

const RUNS_DIR_NAME: &str = "runs";
const BEST_WEIGHTS: &str = "best.pt";

/// Drives the external segmentation trainer over a validated dataset archive
pub struct ModelTrainer<'a> {
    config: ModelTrainerConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> ModelTrainer<'a> {
    pub fn new(config: ModelTrainerConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    fn workspace(&self) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.config.workspace_dir)
            .with_context(|| format!("Failed to create {:?}", self.config.workspace_dir))?;
        fs::canonicalize(&self.config.workspace_dir)
            .with_context(|| format!("Failed to resolve {:?}", self.config.workspace_dir))
    }

    fn run_dir(&self, workspace: &Path) -> PathBuf {
        workspace.join(RUNS_DIR_NAME).join(self.config.run_name())
    }

    /// Where the trainer leaves its best checkpoint
    pub fn expected_weights(&self, workspace: &Path) -> PathBuf {
        self.run_dir(workspace).join("weights").join(BEST_WEIGHTS)
    }

    /// The training invocation for a prepared workspace
    pub fn train_command(&self, workspace: &Path) -> ExternalCommand {
        let c = &self.config;
        ExternalCommand::new(&c.command)
            .kv("task", "segment")
            .kv("mode", "train")
            .kv("model", &c.pretrained_weights)
            .kv("imgsz", c.image_size)
            .kv("batch", c.batch_size)
            .kv("epochs", c.epochs)
            .kv("data", workspace.join(&c.dataset_descriptor).display())
            .kv("project", workspace.join(RUNS_DIR_NAME).display())
            .kv("name", c.run_name())
            .kv("exist_ok", "True")
            .current_dir(workspace)
    }

    pub fn export_command(&self, workspace: &Path, weights: &Path, format: &str) -> ExternalCommand {
        ExternalCommand::new(&self.config.command)
            .kv("mode", "export")
            .kv("model", weights.display())
            .kv("format", format)
            .current_dir(workspace)
    }

    fn run_checked(&self, command: &ExternalCommand, expected: &Path) -> anyhow::Result<()> {
        let outcome = self.runner.run(command)?;
        if !outcome.success() {
            anyhow::bail!("`{}` exited with {:?}", command, outcome.exit_code);
        }
        // Exit code alone is not trusted: the artifact must exist too
        if !expected.is_file() {
            anyhow::bail!("`{}` finished but {:?} was not produced", command, expected);
        }
        Ok(())
    }

    fn copy_into(&self, src: &Path, dir: &Path) -> anyhow::Result<PathBuf> {
        let name = src
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("{:?} has no file name", src))?;
        let dest = dir.join(name);
        fs::copy(src, &dest).with_context(|| format!("Failed to copy {:?} to {:?}", src, dest))?;
        Ok(dest)
    }

    /// Remove what the run left behind; entries that are already gone are fine
    fn cleanup(&self, workspace: &Path, extracted: &BTreeSet<OsString>) -> anyhow::Result<()> {
        let mut targets: Vec<PathBuf> = extracted.iter().map(|n| workspace.join(n)).collect();
        targets.push(workspace.join(RUNS_DIR_NAME));
        targets.push(workspace.join(&self.config.pretrained_weights));

        for target in targets {
            let removed = if target.is_dir() {
                fs::remove_dir_all(&target)
            } else {
                fs::remove_file(&target)
            };
            match removed {
                Ok(()) => debug!("Removed {:?}", target),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove {:?}", target));
                }
            }
        }
        Ok(())
    }

    fn train(&self, archive_path: &Path) -> anyhow::Result<TrainingResult> {
        let workspace = self.workspace()?;

        info!("Unzipping {:?} into {:?}", archive_path, workspace);
        let extracted = archive::extract_zip(archive_path, &workspace)?;

        let best = self.expected_weights(&workspace);
        self.run_checked(&self.train_command(&workspace), &best)
            .context("training run failed")?;

        fs::create_dir_all(&self.config.trainer_dir)
            .with_context(|| format!("Failed to create {:?}", self.config.trainer_dir))?;
        let trained_weights_path = self.copy_into(&best, &self.config.trainer_dir)?;

        let exported_model_path = match &self.config.export_format {
            Some(format) => {
                let exported = best.with_extension(format);
                match self.run_checked(&self.export_command(&workspace, &best, format), &exported) {
                    Ok(()) => Some(self.copy_into(&exported, &self.config.trainer_dir)?),
                    Err(e) => {
                        // Trained weights are still usable by the trainer itself
                        warn!("Model export failed: {:#}", e);
                        None
                    }
                }
            }
            None => None,
        };

        self.cleanup(&workspace, &extracted)?;

        Ok(TrainingResult {
            trained_weights_path,
            exported_model_path,
        })
    }

    pub fn initiate_model_trainer(&self, archive_path: &Path) -> anyhow::Result<TrainingResult> {
        info!("Entered model training");
        let result = self.train(archive_path).context("model training failed")?;
        info!("Model trainer artifact: {:?}", result);
        Ok(result)
    }
}
