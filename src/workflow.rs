//! Applying metadata changes to image files
use std::fs::File;
use std::path::Path;

use itertools::Itertools;

use crate::media::{self, EditMetadata, Field, Media, MediaError, MetaChanges};
use crate::types::Position;

/// Log target for the change record of every modified file
pub const CHANGES_TARGET: &str = "photoname::changes";

/// Options for [`apply_changes`]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct ApplyOptions {
    /// Restore the modification time of the image after saving it
    pub preserve_mtime: bool,
}

/// Apply `changes` to the image at `path` and its sidecar
///
/// Returns the fields which were changed, or `Ok(None)` if the image already
/// had the requested values (in which case nothing is written). Every
/// modification is recorded at info level on the [`CHANGES_TARGET`] target.
pub fn apply_changes(
    path: &Path,
    changes: &MetaChanges,
    options: ApplyOptions,
) -> Result<Option<Vec<Field>>, MediaError> {
    let metadata = std::fs::metadata(path)?;
    if metadata.permissions().readonly() {
        log::warn!("{} is write protected", path.display());
        return Err(MediaError::WriteProtected(path.into()));
    }
    let modified = metadata.modified()?;

    let mut media = Media::open(path)?;
    log::debug!(
        "{}: old {} (sidecar {})",
        media.path().display(),
        Values(&media),
        media.sidecar().display()
    );
    let old_tags = media.tags();

    let changed = changes.apply_to(&mut media)?;
    if changed.is_empty() {
        log::debug!("{}: no changes", path.display());
        return Ok(None);
    }
    media.save()?;
    if options.preserve_mtime {
        File::options()
            .write(true)
            .open(path)?
            .set_modified(modified)?;
    }

    log::debug!("{}: new {}", media.path().display(), Values(&media));
    log::info!(
        target: CHANGES_TARGET,
        "{}: changed {} (tags were [{}])",
        path.display(),
        changed.iter().join(", "),
        old_tags.join(", "),
    );
    Ok(Some(changed))
}

/// Set the position of the image at `path`
pub fn save_position(path: &Path, position: Position) -> Result<Option<Vec<Field>>, MediaError> {
    apply_changes(path, &MetaChanges::position(position), ApplyOptions::default())
}

/// Clockwise rotation needed to display the image at `path` upright
///
/// Images without an orientation are not rotated. Unreadable images and
/// unknown orientation codes are not rotated either, but are reported.
pub fn rotation_for_file(path: &Path) -> u16 {
    let orientation = match media::read_exif(path) {
        Ok(exif) => exif.and_then(|exif| exif.orientation()).unwrap_or(0),
        Err(err) => {
            log::warn!("Cannot read orientation of {}: {err}", path.display());
            return 0;
        }
    };
    media::rotation_degrees(orientation).unwrap_or_else(|| {
        log::warn!(
            "Unknown orientation {orientation} in {}, assuming 0°",
            path.display()
        );
        0
    })
}

/// Display adapter for the editable values of an image
struct Values<'a, M>(&'a M);

impl<M: EditMetadata> std::fmt::Display for Values<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "position={} description={:?} tags=[{}] rating={}",
            self.0
                .position()
                .map(|position| position.to_string())
                .unwrap_or_default(),
            self.0.description().unwrap_or_default(),
            self.0.tags().join(", "),
            self.0
                .rating()
                .map(|rating| rating.to_string())
                .unwrap_or_default(),
        )
    }
}
