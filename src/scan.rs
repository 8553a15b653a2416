use std::fs;
use std::path::{Path, PathBuf};

use crate::naming::is_supported_image;

pub fn images_dir(base: &Path, case_id: &str, variable: &str) -> PathBuf {
    base.join(case_id)
        .join("postProcessing")
        .join("images")
        .join(variable)
}

/// Case directories are exactly three ASCII digits by convention; anything
/// else under the root is ignored. An absent root yields an empty list.
pub fn list_cases(base: &Path) -> Vec<String> {
    let mut cases = read_entries(base)
        .into_iter()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_case_id(name))
        .collect::<Vec<_>>();
    cases.sort();
    cases
}

pub fn list_variables(base: &Path, case_id: &str) -> Vec<String> {
    let images_root = base.join(case_id).join("postProcessing").join("images");
    let mut variables = read_entries(&images_root)
        .into_iter()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect::<Vec<_>>();
    variables.sort();
    variables
}

/// Supported raster files in one variable directory, lexically sorted so
/// downstream tie-breaking is deterministic. Subdirectories and files with
/// other extensions are skipped.
pub fn list_image_files(dir: &Path) -> Vec<String> {
    let entries = read_entries(dir);
    if entries.is_empty() {
        log::debug!("no image files under {}", dir.display());
        return Vec::new();
    }

    let mut files = entries
        .into_iter()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_supported_image(name))
        .collect::<Vec<_>>();
    files.sort();
    files
}

pub fn is_case_id(name: &str) -> bool {
    name.len() == 3 && name.bytes().all(|byte| byte.is_ascii_digit())
}

fn read_entries(path: &Path) -> Vec<fs::DirEntry> {
    let Ok(entries) = fs::read_dir(path) else {
        return Vec::new();
    };
    entries.filter_map(Result::ok).collect()
}
