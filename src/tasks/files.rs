use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Resolve configured image sources into the ordered list of files to show.
///
/// Files are kept as given, even when they do not exist yet; the loader
/// reports those as failed tiles. Directories expand recursively to the
/// images they contain, sorted by path.
pub fn discover_images(sources: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for source in sources {
        if source.is_dir() {
            let mut found = scan_dir(source)
                .with_context(|| format!("failed to scan {}", source.display()))?;
            if found.is_empty() {
                warn!(dir = %source.display(), "image directory contains no images");
            }
            found.sort();
            debug!(dir = %source.display(), count = found.len(), "expanded image directory");
            images.append(&mut found);
        } else {
            if !source.exists() {
                warn!(path = %source.display(), "configured image does not exist");
            }
            images.push(source.clone());
        }
    }
    ensure!(!images.is_empty(), "no images found in configured sources");
    info!(count = images.len(), "resolved image sources");
    Ok(images)
}

fn scan_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && is_image(entry.path()) {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

#[inline]
pub fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png", "webp", "gif"].contains(&e.as_str())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_image_extensions_case_insensitively() {
        assert!(is_image(Path::new("a/b/photo.JPG")));
        assert!(is_image(Path::new("x.webp")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("no_extension")));
    }
}
