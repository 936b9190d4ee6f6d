use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::events::ImageDescriptor;

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];

/// Walk `root` recursively and describe every image file found.
///
/// Files are sorted by path so ids stay stable between runs of an unchanged
/// library.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn discover_images(root: &Path) -> Result<Vec<ImageDescriptor>> {
    ensure!(
        root.is_dir(),
        "photo library {} is not a readable directory",
        root.display()
    );

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable library entry");
                continue;
            }
        };
        if entry.file_type().is_file() && is_image(entry.path()) {
            paths.push(entry.into_path());
        } else {
            debug!(path = %entry.path().display(), "skipping non-image entry");
        }
    }
    paths.sort();

    let images: Vec<ImageDescriptor> = paths
        .into_iter()
        .zip(1u64..)
        .map(|(path, id)| {
            let path = path.canonicalize().unwrap_or(path);
            let title = path
                .file_stem()
                .and_then(OsStr::to_str)
                .unwrap_or_default()
                .to_string();
            ImageDescriptor {
                id,
                url: format!("file://{}", path.display()),
                title,
                description: String::new(),
                tags: Vec::new(),
            }
        })
        .collect();
    info!(discovered = images.len(), "library scan complete");
    Ok(images)
}

/// Read a YAML list of image descriptors.
pub fn load_manifest(path: &Path) -> Result<Vec<ImageDescriptor>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let images: Vec<ImageDescriptor> = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse manifest {}", path.display()))?;

    let mut seen = HashSet::new();
    for image in &images {
        if !seen.insert(image.id) {
            warn!(
                id = image.id,
                path = %path.display(),
                "duplicate image id in manifest; direct play will pick the first"
            );
        }
    }
    info!(images = images.len(), path = %path.display(), "manifest loaded");
    Ok(images)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}
