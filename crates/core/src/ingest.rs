use crate::error::IngestError;
use crate::models::PdfUpload;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Every `.pdf` file below `folder`, any extension case, sorted by path.
/// Unreadable entries are ignored.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file() && has_pdf_extension(entry.path()))
        .map(DirEntry::into_path)
        .collect();

    files.sort_unstable();
    files
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"))
}

pub fn load_upload(path: &Path) -> Result<PdfUpload, IngestError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;

    Ok(PdfUpload::new(name, fs::read(path)?))
}

pub fn load_uploads<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PdfUpload>, IngestError> {
    paths.iter().map(|path| load_upload(path.as_ref())).collect()
}

/// Loads every pdf below `folder`, in path order.
pub fn load_folder(folder: &Path) -> Result<Vec<PdfUpload>, IngestError> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::NoPdfs(folder.display().to_string()));
    }

    load_uploads(&files)
}
