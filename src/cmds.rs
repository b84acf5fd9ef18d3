//! Command-line interface implementations
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use color_eyre::eyre::{Result, WrapErr};
use comfy_table::Table;
use itertools::Itertools;

use crate::media::{self, Field, MediaError};
use crate::naming::{long_sidecar, FileNameResolver, FileProbe, Reserving};
use crate::workflow;

/// A planned move (or copy) of a single image
#[serde_with::skip_serializing_none]
#[derive(Clone, PartialEq, Eq, Debug)]
#[derive(serde::Serialize)]
pub struct Transfer {
    pub source: PathBuf,
    pub date: Option<NaiveDateTime>,
    pub target: PathBuf,
}

/// Whether `path` looks like an image, judging by its extension
pub fn is_image(path: &Path) -> bool {
    mime_guess::from_path(path)
        .iter()
        .any(|mime| mime.type_() == mime_guess::mime::IMAGE)
}

/// Find the date used to name `path`
///
/// The EXIF original date is preferred, falling back to the EXIF modification
/// date and finally the modification time of the file itself.
pub fn file_date(path: &Path) -> Option<NaiveDateTime> {
    None.or_else(|| {
        media::read_exif(path)
            .inspect_err(|err| log::debug!("No EXIF date for {}: {err}", path.display()))
            .ok()
            .flatten()
            .and_then(|exif| exif.date_taken())
    })
    .or_else(|| {
        std::fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .inspect_err(|err| log::debug!("No file date for {}: {err}", path.display()))
            .ok()
            .map(|modified| DateTime::<Local>::from(modified).naive_local())
    })
}

/// Plan the transfer of every image in `sources`
///
/// Targets are reserved as they are handed out, so no two images in the same
/// batch are assigned the same name. Any resolution error aborts the plan.
pub fn plan_transfers<P, I>(
    resolver: &mut FileNameResolver<Reserving<P>>,
    sources: I,
    first_instance: u32,
) -> Result<Vec<Transfer>>
where
    P: FileProbe,
    I: IntoIterator<Item = (PathBuf, Option<NaiveDateTime>)>,
{
    sources
        .into_iter()
        .map(|(source, date)| {
            let target = resolver
                .reserve_next_file(&source, date.as_ref(), first_instance)
                .wrap_err_with(|| format!("Failed to find a name for {}", source.display()))?;
            Ok(Transfer {
                source,
                date,
                target,
            })
        })
        .try_collect()
}

/// Generate a `Table` containing the given `transfers`
///
/// [comfy-table]: https://docs.rs/comfy-table/latest/comfy_table/
pub fn list_transfers(transfers: &[Transfer]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Source", // transfer.source
        "Date",   // transfer.date
        "Target", // transfer.target
    ]);
    transfers.iter().fold(table, |mut table, transfer| {
        table.add_row(vec![
            transfer.source.display().to_string(),
            transfer
                .date
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            transfer.target.display().to_string(),
        ]);
        table
    })
}

/// Carry out a planned transfer, including the XMP sidecars of the image
///
/// Every target is created exclusively, so an existing file is never
/// overwritten. All targets are written before any source is removed; if one
/// of them cannot be written, those already written are removed again and
/// the sources are left alone. Unless `copy` is set, sources are removed once
/// everything has been copied.
pub fn execute_transfer(transfer: &Transfer, copy: bool) -> Result<()> {
    if transfer.source == transfer.target {
        log::debug!("{} is already in place", transfer.source.display());
        return Ok(());
    }
    let [short, long] = media::sidecar_candidates(&transfer.source);
    let mut files = vec![(transfer.source.clone(), transfer.target.clone())];
    files.extend(
        [
            (short, transfer.target.with_extension("xmp")),
            (long, long_sidecar(&transfer.target)),
        ]
        .into_iter()
        .filter(|(source, _)| source.is_file()),
    );

    let mut written: Vec<&Path> = Vec::with_capacity(files.len());
    for (source, target) in &files {
        if let Err(err) = copy_file(source, target) {
            written.into_iter().for_each(discard);
            return Err(err);
        }
        written.push(target);
    }

    for (source, target) in &files {
        if !copy {
            std::fs::remove_file(source)
                .wrap_err_with(|| format!("Failed to remove {}", source.display()))?;
        }
        log::info!(
            "{} {} -> {}",
            if copy { "Copied" } else { "Moved" },
            source.display(),
            target.display()
        );
    }
    Ok(())
}

fn copy_file(source: &Path, target: &Path) -> Result<()> {
    let mut reader = File::open(source)
        .wrap_err_with(|| format!("Failed to open {}", source.display()))?;
    let mut writer = File::create_new(target)
        .wrap_err_with(|| format!("Failed to create {}", target.display()))?;
    std::io::copy(&mut reader, &mut writer)
        .inspect_err(|_| discard(target))
        .wrap_err_with(|| format!("Failed to copy {} to {}", source.display(), target.display()))?;
    Ok(())
}

/// Remove a partially transferred target
fn discard(target: &Path) {
    match std::fs::remove_file(target) {
        Ok(()) => log::debug!("Removed {}", target.display()),
        Err(err) => log::warn!("Failed to remove {}: {err}", target.display()),
    }
}

/// Run `edit` on every file in `paths`
///
/// Files which fail are logged and listed in the returned `Table` as errors,
/// without aborting the batch; the number of failures is returned alongside.
///
/// [comfy-table]: https://docs.rs/comfy-table/latest/comfy_table/
pub fn edit_files<F>(paths: &[PathBuf], edit: F) -> (Table, usize)
where
    F: Fn(&Path) -> Result<Option<Vec<Field>>, MediaError>,
{
    let mut table = Table::new();
    table.set_header(vec![
        "Path",    // path
        "Changes", // fields, or the error
    ]);
    paths.iter().fold((table, 0), |(mut table, failures), path| {
        let (summary, failures) = match edit(path) {
            Ok(Some(fields)) => (fields.iter().join(", "), failures),
            Ok(None) => ("unchanged".into(), failures),
            Err(err) => {
                log::error!("Failed to edit {}: {err}", path.display());
                (format!("error: {err}"), failures + 1)
            }
        };
        table.add_row(vec![path.display().to_string(), summary]);
        (table, failures)
    })
}

/// Generate a `Table` containing the rotation of every file in `paths`
///
/// [comfy-table]: https://docs.rs/comfy-table/latest/comfy_table/
pub fn list_rotations(paths: &[PathBuf]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Path",     // path
        "Rotation", // workflow::rotation_for_file(path)
    ]);
    paths.iter().fold(table, |mut table, path| {
        table.add_row(vec![
            path.display().to_string(),
            format!("{}°", workflow::rotation_for_file(path)),
        ]);
        table
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::tests::TINY_JPEG;
    use crate::media::MetaChanges;
    use crate::naming::{NamingRule, OsProbe};
    use crate::workflow::ApplyOptions;
    use crate::types::Position;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn date(year: i32, month: u32, day: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(12, 0, 0))
    }

    fn resolver(dir: &Path) -> FileNameResolver<Reserving<OsProbe>> {
        let rule = NamingRule {
            date_pattern: Some("yyMMdd".into()),
            name: Some("Trip".into()),
            number_format: Some("00".into()),
            output_dir: dir.into(),
        };
        FileNameResolver::with_probe(&rule, Reserving::new(OsProbe))
            .expect("the rule should be valid")
    }

    #[test]
    fn detect_images() {
        assert!(is_image(Path::new("IMG_0001.JPG")));
        assert!(is_image(Path::new("scan.tiff")));
        assert!(!is_image(Path::new("IMG_0001.jpg.xmp")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("README")));
    }

    #[test]
    fn fall_back_to_file_date() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, TINY_JPEG)?;
        assert!(file_date(&path).is_some());
        assert_eq!(file_date(&dir.path().join("missing.jpg")), None);
        Ok(())
    }

    #[test]
    fn plan_batch() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("240601Trip.jpg"), "")?;
        let mut resolver = resolver(dir.path());
        let transfers = plan_transfers(
            &mut resolver,
            vec![
                (PathBuf::from("IMG_0001.jpg"), date(2024, 6, 1)),
                (PathBuf::from("IMG_0002.jpg"), date(2024, 6, 1)),
                (PathBuf::from("IMG_0003.jpg"), date(2024, 6, 2)),
            ],
            0,
        )?;
        assert_eq!(
            transfers.iter().map(|t| t.target.clone()).collect::<Vec<_>>(),
            vec![
                dir.path().join("240601Trip01.jpg"),
                dir.path().join("240601Trip02.jpg"),
                dir.path().join("240602Trip.jpg"),
            ]
        );

        let mut table = list_transfers(&transfers);
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.row_count(), 3);
        Ok(())
    }

    #[test]
    fn plan_json() -> Result<()> {
        let transfer = Transfer {
            source: "a.jpg".into(),
            date: None,
            target: "b.jpg".into(),
        };
        assert_eq!(
            serde_json::to_string(&transfer)?,
            r#"{"source":"a.jpg","target":"b.jpg"}"#
        );
        Ok(())
    }

    #[test]
    fn move_with_sidecars() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("IMG_0001.jpg");
        std::fs::write(&source, TINY_JPEG)?;
        std::fs::write(dir.path().join("IMG_0001.jpg.xmp"), "<x/>")?;
        let transfer = Transfer {
            source: source.clone(),
            date: None,
            target: dir.path().join("Trip.jpg"),
        };
        execute_transfer(&transfer, false)?;
        assert!(!source.exists());
        assert!(!dir.path().join("IMG_0001.jpg.xmp").exists());
        assert_eq!(std::fs::read(dir.path().join("Trip.jpg"))?, TINY_JPEG);
        assert_eq!(std::fs::read_to_string(dir.path().join("Trip.jpg.xmp"))?, "<x/>");
        Ok(())
    }

    #[test]
    fn copy_without_overwriting() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("IMG_0001.jpg");
        std::fs::write(&source, TINY_JPEG)?;
        std::fs::write(dir.path().join("IMG_0001.xmp"), "<x/>")?;
        let transfer = Transfer {
            source: source.clone(),
            date: None,
            target: dir.path().join("Trip.jpg"),
        };
        execute_transfer(&transfer, true)?;
        assert!(source.exists());
        assert!(dir.path().join("IMG_0001.xmp").exists());
        assert!(dir.path().join("Trip.xmp").exists());

        let _ = execute_transfer(&transfer, true)
            .expect_err("an existing target should never be overwritten");
        Ok(())
    }

    #[test]
    fn keep_image_and_sidecar_together_on_conflict() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("IMG_0001.jpg");
        let sidecar = dir.path().join("IMG_0001.xmp");
        std::fs::write(&source, TINY_JPEG)?;
        std::fs::write(&sidecar, "<x/>")?;
        std::fs::write(dir.path().join("Trip.xmp"), "taken")?;
        let transfer = Transfer {
            source: source.clone(),
            date: None,
            target: dir.path().join("Trip.jpg"),
        };

        let _ = execute_transfer(&transfer, false)
            .expect_err("an existing sidecar target should stop the transfer");
        assert_eq!(std::fs::read(&source)?, TINY_JPEG);
        assert_eq!(std::fs::read_to_string(&sidecar)?, "<x/>");
        assert!(!dir.path().join("Trip.jpg").exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("Trip.xmp"))?, "taken");
        Ok(())
    }

    #[test]
    fn edit_batch() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, TINY_JPEG)?;
        let paths = vec![path, dir.path().join("missing.jpg")];
        let changes = MetaChanges::position(Position {
            lat: 57.700767,
            lon: 11.953715,
        });

        let edit = |path: &Path| workflow::apply_changes(path, &changes, ApplyOptions::default());

        let (mut table, failures) = edit_files(&paths, edit);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 2);
        assert_eq!(failures, 1);

        let (_, failures) = edit_files(&paths[..1], edit);
        assert_eq!(failures, 0);
        Ok(())
    }

    #[test]
    fn list_rotations_empty() {
        let mut table = list_rotations(&[]);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 0);
    }
}
