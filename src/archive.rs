use anyhow::Context;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Extract every entry of a zip archive into `dest` (created if absent).
///
/// Returns the distinct top-level names that were written, which is what the
/// trainer later removes from its workspace. Entries whose path would escape
/// `dest` are skipped. A failure part-way leaves what was already written.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> anyhow::Result<BTreeSet<OsString>> {
    fs::create_dir_all(dest).with_context(|| format!("Failed to create {:?}", dest))?;

    let file =
        File::open(archive_path).with_context(|| format!("Failed to open {:?}", archive_path))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("{:?} is not a readable zip archive", archive_path))?;

    let mut top_level = BTreeSet::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("Failed to read entry {} of {:?}", index, archive_path))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe archive entry {:?}", entry.name());
            continue;
        };
        let out_path = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("Failed to create {:?}", out_path))?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
            let mut out = File::create(&out_path)
                .with_context(|| format!("Failed to create {:?}", out_path))?;
            io::copy(&mut entry, &mut out)
                .with_context(|| format!("Failed to extract {:?}", relative))?;
        }

        if let Some(first) = relative.components().next() {
            top_level.insert(first.as_os_str().to_os_string());
        }
    }

    debug!("Extracted {} top-level entries into {:?}", top_level.len(), dest);
    Ok(top_level)
}
