//! Zip extraction and license-file routing

use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::DownloadError;

/// License-related files shipped inside release archives
pub const LICENSE_FILES: &[&str] = &["LICENSE", "LICENSE.txt", "EULA.txt", "TermsOfEvaluation.txt"];

#[derive(Debug, Default)]
struct Progress {
    cancelled: bool,
    written: Vec<PathBuf>,
}

/// Paths written by one extraction, shared with whoever awaits it
///
/// Every file and every directory the extraction creates is recorded the
/// moment it exists, so a failed or abandoned extraction can be undone.
#[derive(Debug, Clone, Default)]
pub struct Extraction(Arc<Mutex<Progress>>);

impl Extraction {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop extracting and remove everything written so far
    ///
    /// Waits for the entry in progress to finish; later entries are never
    /// started.
    pub fn cancel(&self) {
        let mut progress = self.lock();
        progress.cancelled = true;

        for path in progress.written.drain(..).rev() {
            let result = if path.is_dir() {
                std::fs::remove_dir(&path)
            } else {
                std::fs::remove_file(&path)
            };
            if let Err(e) = result
                && e.kind() != ErrorKind::NotFound
            {
                warn!("failed to remove {} after cancelled extraction: {}", path.display(), e);
            }
        }
    }

    /// Hand the recorded paths over to the caller, oldest first
    pub fn take_written(&self) -> Vec<PathBuf> {
        std::mem::take(&mut self.lock().written)
    }
}

/// Create `dir` and any missing ancestors, recording each one created
fn create_dirs(dir: &Path, created: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(path) = current
        && !path.as_os_str().is_empty()
        && !path.exists()
    {
        missing.push(path);
        current = path.parent();
    }

    for path in missing.into_iter().rev() {
        match std::fs::create_dir(path) {
            Ok(()) => created.push(path.to_path_buf()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Extract every entry of the zip at `archive_path` into `dest_dir`
///
/// Relative paths inside the archive are preserved; entries that would land
/// outside `dest_dir` abort extraction. Written paths accumulate in
/// `extraction`, including on failure.
pub fn extract_zip(
    archive_path: &Path,
    dest_dir: &Path,
    extraction: &Extraction,
) -> Result<(), DownloadError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;

    for i in 0..archive.len() {
        let mut progress = extraction.lock();
        if progress.cancelled {
            debug!("extraction into {} cancelled", dest_dir.display());
            return Err(DownloadError::Cancelled);
        }

        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(DownloadError::UnsafeEntry(entry.name().to_string()));
        };
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            create_dirs(&out_path, &mut progress.written)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            create_dirs(parent, &mut progress.written)?;
        }

        let mut out_file = File::create(&out_path)?;
        progress.written.push(out_path.clone());
        let written = std::io::copy(&mut entry, &mut out_file)?;
        debug!("extracted {} ({} bytes)", out_path.display(), written);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))?;
            }
        }
    }

    Ok(())
}

/// Copy known license files from `src_dir` into `license_dir`
///
/// Missing files are skipped; any other I/O failure is returned. Every
/// path written in `license_dir`, the directory itself included, is pushed
/// to `copied` as soon as it exists.
pub fn copy_license_files(
    src_dir: &Path,
    license_dir: &Path,
    candidates: &[&str],
    copied: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for name in candidates {
        let src = src_dir.join(name);
        debug!("checking if license file exists at {}", src.display());

        match std::fs::metadata(&src) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        }

        create_dirs(license_dir, copied)?;
        let dst = license_dir.join(name);
        let existed = dst.exists();
        let result = std::fs::copy(&src, &dst);
        if result.is_ok() || !existed {
            copied.push(dst.clone());
        }
        let bytes = result?;
        debug!(
            "license file copied from {} to {} ({} bytes)",
            src.display(),
            dst.display(),
            bytes
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(dir: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default().unix_permissions(0o644))
                .unwrap();
            writer.write_all(body).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();

        let path = dir.join("archive.zip");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn extract_zip_preserves_relative_paths() {
        let work = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let archive = write_zip(
            work.path(),
            &[("terraform", b"binary"), ("docs/README.md", b"readme")],
        );
        let extraction = Extraction::new();

        extract_zip(&archive, dest.path(), &extraction).unwrap();

        assert_eq!(
            extraction.take_written(),
            vec![
                dest.path().join("terraform"),
                dest.path().join("docs"),
                dest.path().join("docs/README.md")
            ]
        );
        assert_eq!(
            std::fs::read(dest.path().join("docs/README.md")).unwrap(),
            b"readme"
        );
    }

    #[test]
    fn extract_zip_rejects_entries_escaping_destination() {
        let work = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let archive = write_zip(work.path(), &[("../evil", b"x")]);

        let result = extract_zip(&archive, dest.path(), &Extraction::new());

        assert!(matches!(result, Err(DownloadError::UnsafeEntry(_))));
        assert!(!work.path().join("evil").exists());
    }

    #[test]
    fn extract_zip_keeps_record_of_entries_before_failure() {
        let work = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let archive = write_zip(work.path(), &[("README.md", b"readme"), ("../evil", b"x")]);
        let extraction = Extraction::new();

        let result = extract_zip(&archive, dest.path(), &extraction);

        assert!(matches!(result, Err(DownloadError::UnsafeEntry(_))));
        assert_eq!(extraction.take_written(), vec![dest.path().join("README.md")]);
    }

    #[test]
    fn extract_zip_rejects_non_zip_input() {
        let work = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let path = work.path().join("archive.zip");
        std::fs::write(&path, b"this is not a zip").unwrap();

        assert!(matches!(
            extract_zip(&path, dest.path(), &Extraction::new()),
            Err(DownloadError::Archive(_))
        ));
    }

    #[test]
    fn cancelled_extraction_writes_nothing() {
        let work = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let archive = write_zip(work.path(), &[("terraform", b"binary")]);
        let extraction = Extraction::new();
        extraction.cancel();

        let result = extract_zip(&archive, dest.path(), &extraction);

        assert!(matches!(result, Err(DownloadError::Cancelled)));
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn cancel_removes_extracted_files_and_created_directories() {
        let work = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let install_dir = dest.path().join("bin");
        let archive = write_zip(
            work.path(),
            &[("terraform", b"binary"), ("docs/nested/README.md", b"readme")],
        );
        let extraction = Extraction::new();
        extract_zip(&archive, &install_dir, &extraction).unwrap();

        extraction.cancel();

        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
        assert!(extraction.take_written().is_empty());
    }

    #[test]
    fn cancel_leaves_preexisting_files_alone() {
        let work = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        std::fs::write(dest.path().join("keep.txt"), b"mine").unwrap();
        let archive = write_zip(work.path(), &[("terraform", b"binary")]);
        let extraction = Extraction::new();
        extract_zip(&archive, dest.path(), &extraction).unwrap();

        extraction.cancel();

        assert!(dest.path().join("keep.txt").exists());
        assert!(!dest.path().join("terraform").exists());
    }

    #[test]
    fn copy_license_files_skips_missing_and_creates_license_dir() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::write(src.path().join("EULA.txt"), b"eula").unwrap();
        let license_dir = dst.path().join("nested/licenses");
        let mut copied = Vec::new();

        copy_license_files(src.path(), &license_dir, LICENSE_FILES, &mut copied).unwrap();

        assert_eq!(
            copied,
            vec![
                dst.path().join("nested"),
                license_dir.clone(),
                license_dir.join("EULA.txt")
            ]
        );
        assert_eq!(std::fs::read(license_dir.join("EULA.txt")).unwrap(), b"eula");
    }

    #[test]
    fn copy_license_files_records_copies_made_before_failure() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::write(src.path().join("LICENSE"), b"mpl").unwrap();
        std::fs::write(src.path().join("LICENSE.txt"), b"mpl").unwrap();
        std::fs::create_dir(dst.path().join("LICENSE.txt")).unwrap();
        let mut copied = Vec::new();

        let result = copy_license_files(src.path(), dst.path(), LICENSE_FILES, &mut copied);

        assert!(result.is_err());
        assert_eq!(copied, vec![dst.path().join("LICENSE")]);
        assert!(dst.path().join("LICENSE.txt").is_dir());
    }
}
