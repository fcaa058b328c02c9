//! Copying source images into a session's input directory

use crate::error::{ErrorCode, PipelineError, Result};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Outcome of ingesting a source directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub copied: usize,
    pub skipped_in_place: bool,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// List image files under `root`, recursively, sorted by path
pub fn list_images(root: &Path) -> Result<Vec<PathBuf>> {
    walk_images(root, &[])
}

/// Walk `root` for images, not descending into any directory in `pruned`
///
/// `pruned` holds canonical paths. The root itself is never pruned.
fn walk_images(root: &Path, pruned: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(root).follow_links(true).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !entry.file_type().is_dir()
            || !entry
                .path()
                .canonicalize()
                .map(|dir| pruned.contains(&dir))
                .unwrap_or(false)
    });

    let mut images = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            PipelineError::storage_with_code(
                ErrorCode::STORAGE_IO_ERROR,
                format!("cannot walk source directory: {}", e),
                Some(root.to_path_buf()),
            )
        })?;
        if entry.file_type().is_file() && is_image(entry.path()) {
            images.push(entry.into_path());
        }
    }
    images.sort();
    Ok(images)
}

/// Fails with a configuration error unless `source` is a directory
pub fn check_source(source: &Path) -> Result<()> {
    if !source.is_dir() {
        return Err(PipelineError::configuration_with_code(
            ErrorCode::CONFIG_SOURCE_MISSING,
            "source image directory not found",
        )
        .with_path(source));
    }
    Ok(())
}

/// Copy every image under `source` into `input_dir`
///
/// Nested directories are flattened by file name. When `source` already is
/// `input_dir` nothing is copied.
pub fn ingest(source: &Path, input_dir: &Path) -> Result<IngestReport> {
    ingest_excluding(source, input_dir, &[])
}

/// Like [`ingest`], also skipping the `excluded` directories
///
/// `input_dir` is always skipped, so a session nested inside its own source
/// tree never copies its images onto themselves.
pub fn ingest_excluding(source: &Path, input_dir: &Path, excluded: &[&Path]) -> Result<IngestReport> {
    check_source(source)?;

    std::fs::create_dir_all(input_dir).map_err(|e| PipelineError::from(e).with_path(input_dir))?;

    if same_file(source, input_dir) {
        debug!("Source is the session input directory, nothing to copy");
        return Ok(IngestReport {
            copied: 0,
            skipped_in_place: true,
        });
    }

    let pruned: Vec<PathBuf> = std::iter::once(input_dir)
        .chain(excluded.iter().copied())
        .filter_map(|dir| dir.canonicalize().ok())
        .collect();
    let images = walk_images(source, &pruned)?;
    if images.is_empty() {
        warn!("No .jpg/.jpeg images found under {}", source.display());
    }

    let mut written: HashSet<OsString> = HashSet::new();
    let mut copied = 0;
    for image in &images {
        let Some(name) = image.file_name() else {
            continue;
        };
        let target = input_dir.join(name);
        if same_file(image, &target) {
            debug!("{} is already in the session", image.display());
            continue;
        }
        if !written.insert(name.to_os_string()) {
            warn!(
                "{} overwrites an image with the same name from another directory",
                image.display()
            );
        }
        std::fs::copy(image, &target).map_err(|e| {
            PipelineError::storage_with_code(
                ErrorCode::STORAGE_COPY_FAILED,
                format!("cannot copy {}", image.display()),
                Some(target.clone()),
            )
            .with_source(e)
        })?;
        copied += 1;
    }

    info!(
        "Copied {} image(s) from {} into {}",
        copied,
        source.display(),
        input_dir.display()
    );

    Ok(IngestReport {
        copied,
        skipped_in_place: false,
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
