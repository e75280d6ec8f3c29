// src/archive.rs
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::{ClientError, Result};

/// Directory suffixes that are uploaded as a zipped bundle.
pub const APP_BUNDLE_SUFFIXES: [&str; 1] = [".app"];

pub fn is_app_bundle(path: &Path) -> bool {
    let name = path.to_string_lossy();
    let name = name.trim_end_matches(['/', '\\']);
    APP_BUNDLE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Decides what gets uploaded for `app_path`: the file itself, or a fresh zip of an
/// app bundle directory. Other directories are rejected.
pub fn upload_source(app_path: &Path) -> Result<PathBuf> {
    let metadata = fs::metadata(app_path)
        .map_err(|_| ClientError::Validation(format!("{} does not exist", app_path.display())))?;

    if !metadata.is_dir() {
        return Ok(app_path.to_path_buf());
    }
    if is_app_bundle(app_path) {
        zip_app_dir(app_path)
    } else {
        Err(ClientError::Validation(format!(
            "{} is not file but directory.",
            app_path.display()
        )))
    }
}

/// Zips `dir` into `<dir>.zip`, replacing any previous archive.
///
/// Entries are rooted at the directory's own name. Symlinks are stored as links
/// with their original target, never followed.
pub fn zip_app_dir(dir: &Path) -> Result<PathBuf> {
    let dir = dir.components().as_path();
    let mut zip_path = OsString::from(dir.as_os_str());
    zip_path.push(".zip");
    let zip_path = PathBuf::from(zip_path);

    match fs::remove_file(&zip_path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
        _ => {}
    }

    let root = dir.parent().unwrap_or_else(|| Path::new(""));
    let mut writer = ZipWriter::new(File::create(&zip_path)?);
    let base_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        let name = entry_name(path.strip_prefix(root).unwrap_or(path));
        let file_type = entry.file_type();
        let options = base_options.unix_permissions(unix_mode(&entry.metadata().map_err(io::Error::from)?));

        if file_type.is_symlink() {
            let target = fs::read_link(path)?;
            writer.add_symlink(name, target.to_string_lossy(), options)?;
        } else if file_type.is_dir() {
            writer.add_directory(name, options)?;
        } else {
            writer.start_file(name, options)?;
            io::copy(&mut File::open(path)?, &mut writer)?;
        }
    }

    writer.finish()?;
    log::debug!("Created {}", zip_path.display());
    Ok(zip_path)
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.is_dir() { 0o755 } else { 0o644 }
}
