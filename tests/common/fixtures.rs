use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use firesmoke::config::AppConfig;
use firesmoke::detection::Detector;
use firesmoke::download::Downloader;
use firesmoke::models::{BoundingBox, Detection};
use firesmoke::process::{CommandOutcome, CommandRunner, ExternalCommand};
use firesmoke::stream::{AnnotatedFrame, CancelFlag, FrameSink, FrameSource};
use image::{Rgb, RgbImage};
use zip::write::SimpleFileOptions;

/// Entries of a well-formed dataset archive
pub const DATASET_ENTRIES: &[(&str, &[u8])] = &[
    ("data.yaml", b"names: [fire, smoke]\n"),
    ("train/images/a.jpg", b"a"),
    ("train/labels/a.txt", b"0 0.5 0.5 0.6 0.5 0.6 0.6"),
    ("valid/images/b.jpg", b"b"),
    ("test/images/c.jpg", b"c"),
];

/// Builds an in-memory zip archive from `(path, contents)` pairs
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> anyhow::Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer.start_file(*name, SimpleFileOptions::default())?;
        writer.write_all(contents)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Config rooted in a scratch directory, with a placeholder dataset URL and no export
pub fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::default()
        .with_artifacts_dir(root.join("artifacts"))
        .with_download_url("https://example.com/datasets/fire-smoke.zip");
    config.trainer.workspace_dir = root.join("workspace");
    config.trainer.export_format = None;
    config
}

/// Serves a fixed payload, or fails like a dropped connection
#[derive(Clone)]
pub struct FakeDownloader {
    payload: Option<Vec<u8>>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeDownloader {
    pub fn serving(payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            payload: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Downloader for FakeDownloader {
    fn download(&self, _url: &str, dest: &Path) -> anyhow::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.payload {
            Some(bytes) => {
                std::fs::write(dest, bytes)?;
                Ok(bytes.len() as u64)
            }
            None => anyhow::bail!("simulated network error"),
        }
    }
}

fn arg_value<'a>(command: &'a ExternalCommand, key: &str) -> Option<&'a str> {
    let prefix = format!("{}=", key);
    command
        .args
        .iter()
        .find_map(|arg| arg.strip_prefix(prefix.as_str()))
}

/// Stands in for the trainer CLI: records every command and fakes its outputs
#[derive(Clone)]
pub struct FakeRunner {
    exit_code: i32,
    produce_outputs: bool,
    fail_export: bool,
    pub commands: Arc<Mutex<Vec<ExternalCommand>>>,
}

impl FakeRunner {
    /// Exits 0 and writes the checkpoint (and export) where the real trainer would
    pub fn succeeding() -> Self {
        Self {
            exit_code: 0,
            produce_outputs: true,
            fail_export: false,
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn exiting_with(code: i32) -> Self {
        Self {
            exit_code: code,
            produce_outputs: false,
            ..Self::succeeding()
        }
    }

    /// Exits 0 without writing anything
    pub fn silent() -> Self {
        Self {
            produce_outputs: false,
            ..Self::succeeding()
        }
    }

    pub fn with_failing_export(mut self) -> Self {
        self.fail_export = true;
        self
    }

    pub fn recorded(&self) -> Vec<ExternalCommand> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &ExternalCommand) -> anyhow::Result<CommandOutcome> {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command.clone());
        }

        let mode = arg_value(command, "mode");
        if mode == Some("export") && self.fail_export {
            return Ok(CommandOutcome { exit_code: Some(1) });
        }

        if self.produce_outputs {
            match mode {
                Some("train") => {
                    let project = arg_value(command, "project").unwrap_or("runs");
                    let name = arg_value(command, "name").unwrap_or("train");
                    let weights = PathBuf::from(project).join(name).join("weights");
                    std::fs::create_dir_all(&weights)?;
                    std::fs::write(weights.join("best.pt"), b"checkpoint")?;
                }
                Some("export") => {
                    let model = PathBuf::from(arg_value(command, "model").unwrap_or("best.pt"));
                    let format = arg_value(command, "format").unwrap_or("onnx");
                    std::fs::write(model.with_extension(format), b"exported")?;
                }
                _ => {}
            }
        }
        Ok(CommandOutcome {
            exit_code: Some(self.exit_code),
        })
    }
}

/// What a scripted read returns
pub enum ReadStep {
    Frame,
    Fail,
}

/// Capture source that plays back a fixed script, then reports exhaustion
pub struct ScriptedSource {
    script: VecDeque<ReadStep>,
    pub reads: usize,
    pub releases: usize,
    cancel_after: Option<(usize, CancelFlag)>,
}

impl ScriptedSource {
    pub fn new(script: Vec<ReadStep>) -> Self {
        Self {
            script: script.into(),
            reads: 0,
            releases: 0,
            cancel_after: None,
        }
    }

    /// `frames` good reads
    pub fn frames(frames: usize) -> Self {
        Self::new((0..frames).map(|_| ReadStep::Frame).collect())
    }

    /// Good reads, except that read number `n` (1-based) fails
    pub fn failing_at(n: usize, total: usize) -> Self {
        Self::new(
            (1..=total)
                .map(|i| if i == n { ReadStep::Fail } else { ReadStep::Frame })
                .collect(),
        )
    }

    /// Raise `cancel` once `reads` frames have been handed out
    pub fn cancelling_after(mut self, reads: usize, cancel: CancelFlag) -> Self {
        self.cancel_after = Some((reads, cancel));
        self
    }
}

impl FrameSource for ScriptedSource {
    fn read_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        self.reads += 1;
        if let Some((after, cancel)) = &self.cancel_after {
            if self.reads >= *after {
                cancel.cancel();
            }
        }
        match self.script.pop_front() {
            Some(ReadStep::Frame) => Ok(Some(RgbImage::from_pixel(32, 24, Rgb([40, 40, 40])))),
            Some(ReadStep::Fail) => anyhow::bail!("simulated read failure at read {}", self.reads),
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        self.releases += 1;
    }

    fn describe(&self) -> String {
        "scripted source".to_string()
    }
}

/// Finds one "fire" box per frame; optionally fails on given (1-based) calls
#[derive(Default)]
pub struct FakeDetector {
    pub calls: usize,
    fail_on: Vec<usize>,
}

impl FakeDetector {
    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            calls: 0,
            fail_on: calls.to_vec(),
        }
    }
}

impl Detector for FakeDetector {
    fn detect(&mut self, _frame: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        self.calls += 1;
        if self.fail_on.contains(&self.calls) {
            anyhow::bail!("simulated detector failure on call {}", self.calls);
        }
        Ok(vec![Detection {
            class_id: 0,
            label: "fire".to_string(),
            confidence: 0.9,
            bbox: BoundingBox {
                x1: 4.0,
                y1: 4.0,
                x2: 16.0,
                y2: 16.0,
            },
            mask: None,
            track_id: None,
        }])
    }
}

/// Keeps what it was shown
#[derive(Default)]
pub struct CollectingSink {
    pub frames: Vec<(u64, f32, Option<u64>)>,
}

impl FrameSink for CollectingSink {
    fn present(&mut self, frame: &AnnotatedFrame) -> anyhow::Result<()> {
        let track = frame.detections.first().and_then(|d| d.track_id);
        self.frames.push((frame.index, frame.fps, track));
        Ok(())
    }
}
