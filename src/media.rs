//! Metadata of a JPEG image and its XMP sidecar
//!
//! A [`Media`] is opened as one unit: the EXIF data embedded in the JPEG and
//! the properties of its sidecar (if any). Position and description live in
//! EXIF, tags and rating in XMP. Descriptions are mirrored into the sidecar
//! and tags into the Windows `XPKeywords` field, so that other tools find
//! them in either place.
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use img_parts::jpeg::Jpeg;
use img_parts::ImageEXIF;

use crate::naming::long_sidecar;
use crate::types::{Position, Rating};

pub use self::exif::ExifData;
pub use self::xmp::XmpData;

mod exif;
mod xmp;

/// Clockwise rotation for each EXIF orientation code
///
/// Mirrored orientations map to the rotation of their unmirrored base.
const ORIENTATION_DEGREES: [u16; 9] = [0, 0, 0, 180, 180, 90, 90, 270, 270];

/// Metadata access errors
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum MediaError {
    /// Generic I/O error
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// The embedded EXIF data could not be read or written
    #[error("Invalid EXIF data: {0}")]
    ExifError(#[from] ::exif::Error),

    /// The image is not a readable JPEG
    #[error("Invalid JPEG image: {0}")]
    ImageError(#[from] img_parts::Error),

    /// The XMP sidecar could not be read or written
    #[error("Invalid XMP sidecar: {0}")]
    XmpError(#[from] xmp_toolkit::XmpError),

    /// The image file is not writable
    #[error("`{}` is write protected", .0.display())]
    WriteProtected(PathBuf),

    /// A position outside of the valid coordinate ranges
    #[error("Invalid position ({}, {})", .0.lat, .0.lon)]
    InvalidPosition(Position),
}

/// An editable metadata field
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Field {
    Position,
    Tags,
    Description,
    Rating,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Position => "position",
            Self::Tags => "tags",
            Self::Description => "description",
            Self::Rating => "rating",
        })
    }
}

/// Trait for reading and changing the editable metadata of an image
pub trait EditMetadata {
    fn position(&self) -> Option<Position>;
    fn set_position(&mut self, position: Position) -> Result<(), MediaError>;
    fn description(&self) -> Option<String>;
    fn set_description(&mut self, description: &str) -> Result<(), MediaError>;
    fn tags(&self) -> Vec<String>;
    fn set_tags(&mut self, tags: &[String]) -> Result<(), MediaError>;
    fn rating(&self) -> Option<Rating>;
    fn set_rating(&mut self, rating: Rating) -> Result<(), MediaError>;
}

/// A metadata diff
///
/// Only fields which are present are compared, and only those which differ
/// from the target's current values are written.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct MetaChanges {
    pub position: Option<Position>,
    pub tags: Option<Vec<String>>,
    pub description: Option<String>,
    pub rating: Option<Rating>,
}

impl MetaChanges {
    /// A diff touching only the position
    pub fn position(position: Position) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    /// Whether the diff touches no field at all
    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.tags.is_none()
            && self.description.is_none()
            && self.rating.is_none()
    }

    /// Check the diff for values which can never be applied
    pub fn validate(&self) -> Result<(), MediaError> {
        match self.position {
            Some(position) if !position.is_valid() => Err(MediaError::InvalidPosition(position)),
            _ => Ok(()),
        }
    }

    /// Apply the diff to `target`, returning the fields which changed
    pub fn apply_to(&self, target: &mut impl EditMetadata) -> Result<Vec<Field>, MediaError> {
        self.validate()?;
        let mut changed = Vec::new();
        if let Some(position) = self.position {
            if target.position().is_none_or(|current| !current.approx_eq(&position)) {
                target.set_position(position)?;
                changed.push(Field::Position);
            }
        }
        if let Some(tags) = &self.tags {
            if target.tags() != *tags {
                target.set_tags(tags)?;
                changed.push(Field::Tags);
            }
        }
        if let Some(description) = &self.description {
            if target.description().unwrap_or_default() != *description {
                target.set_description(description)?;
                changed.push(Field::Description);
            }
        }
        if let Some(rating) = self.rating {
            if target.rating() != Some(rating) {
                target.set_rating(rating)?;
                changed.push(Field::Rating);
            }
        }
        Ok(changed)
    }
}

/// A JPEG image together with its XMP sidecar
pub struct Media {
    path: PathBuf,
    jpeg: Jpeg,
    exif: ExifData,
    sidecar: PathBuf,
    xmp: XmpData,
    exif_changed: bool,
    xmp_changed: bool,
}

impl std::fmt::Debug for Media {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Media")
            .field("path", &self.path)
            .field("jpeg", &"..")
            .field("exif", &self.exif)
            .field("sidecar", &self.sidecar)
            .field("xmp", &self.xmp)
            .finish()
    }
}

impl Media {
    /// Open a JPEG image and its sidecar, if there is one
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        let jpeg = Jpeg::from_bytes(std::fs::read(path)?.into())?;
        let exif = jpeg
            .exif()
            .map(|raw| ExifData::parse(raw.to_vec()))
            .transpose()?
            .unwrap_or_default();
        let sidecar = sidecar_path(path);
        let xmp = if sidecar.try_exists()? {
            XmpData::parse(&std::fs::read_to_string(&sidecar)?)?
        } else {
            XmpData::new()?
        };
        Ok(Self {
            path: path.into(),
            jpeg,
            exif,
            sidecar,
            xmp,
            exif_changed: false,
            xmp_changed: false,
        })
    }

    /// Get the path of the image
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the path of the sidecar, whether or not it exists
    pub fn sidecar(&self) -> &Path {
        &self.sidecar
    }

    /// Write back whatever was changed since the media was opened
    pub fn save(&mut self) -> Result<(), MediaError> {
        if self.exif_changed {
            let raw = if self.exif.is_empty() {
                None
            } else {
                Some(self.exif.encode()?.into())
            };
            self.jpeg.set_exif(raw);
            std::fs::write(&self.path, self.jpeg.clone().encoder().bytes())?;
            self.exif_changed = false;
        }
        if self.xmp_changed {
            std::fs::write(&self.sidecar, self.xmp.to_xml()?)?;
            self.xmp_changed = false;
        }
        Ok(())
    }
}

impl EditMetadata for Media {
    fn position(&self) -> Option<Position> {
        self.exif.position()
    }

    fn set_position(&mut self, position: Position) -> Result<(), MediaError> {
        self.exif.set_position(position);
        self.exif_changed = true;
        Ok(())
    }

    fn description(&self) -> Option<String> {
        self.exif
            .description()
            .or_else(|| self.xmp.description())
    }

    fn set_description(&mut self, description: &str) -> Result<(), MediaError> {
        self.exif.set_description(description);
        self.xmp.set_description(description)?;
        self.exif_changed = true;
        self.xmp_changed = true;
        Ok(())
    }

    fn tags(&self) -> Vec<String> {
        let subjects = self.xmp.subjects();
        if subjects.is_empty() {
            self.exif.keywords()
        } else {
            subjects
        }
    }

    fn set_tags(&mut self, tags: &[String]) -> Result<(), MediaError> {
        if self.exif.keywords() != tags {
            self.exif.set_keywords(tags);
            self.exif_changed = true;
        }
        self.xmp.set_subjects(tags)?;
        self.xmp_changed = true;
        Ok(())
    }

    fn rating(&self) -> Option<Rating> {
        let rating = self.xmp.rating()?;
        Rating::try_from(rating)
            .inspect_err(|err| log::debug!("Ignoring rating of {}: {err}", self.path.display()))
            .ok()
    }

    fn set_rating(&mut self, rating: Rating) -> Result<(), MediaError> {
        self.xmp.set_rating(rating.stars().into())?;
        self.xmp_changed = true;
        Ok(())
    }
}

/// Read the EXIF data of any supported image container
///
/// Returns `Ok(None)` if the image has no EXIF data at all.
pub fn read_exif(path: &Path) -> Result<Option<ExifData>, MediaError> {
    let mut reader = BufReader::new(File::open(path)?);
    match ::exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(Some(ExifData::from_exif(&exif))),
        Err(::exif::Error::NotFound(_)) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Clockwise rotation for an EXIF orientation code, if the code is known
pub fn rotation_degrees(orientation: u32) -> Option<u16> {
    ORIENTATION_DEGREES.get(usize::try_from(orientation).ok()?).copied()
}

/// The sidecar used for `path`
///
/// The short form `name.xmp` is used if it exists, otherwise the long form
/// `name.jpg.xmp`.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let short = path.with_extension("xmp");
    if short.is_file() {
        short
    } else {
        long_sidecar(path)
    }
}

/// Both possible sidecar paths of an image, short form first
pub fn sidecar_candidates(path: &Path) -> [PathBuf; 2] {
    [path.with_extension("xmp"), long_sidecar(path)]
}
