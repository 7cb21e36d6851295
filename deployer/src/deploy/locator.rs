//! Project locator
//!
//! Finds the shallowest `package.json` (or, failing that, `index.html`) in an
//! extracted source tree and derives the project root from it.

use std::path::{Path, PathBuf};

use tokio::task::spawn_blocking;

use crate::errors::DeployError;

pub const MANIFEST_FILE: &str = "package.json";
pub const ENTRY_DOCUMENT: &str = "index.html";

/// Directory names whose `index.html` files are build artifacts, not sources
const OUTPUT_DIR_NAMES: &[&str] = &["build", "dist", "out", ".next", ".output", ".svelte-kit", "node_modules"];

/// Where the project lives inside an extracted tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    /// Directory all later stages run in
    pub root_path: PathBuf,

    /// Manifest path relative to the extraction root
    pub manifest_relative_path: Option<PathBuf>,

    /// Entry document path relative to the extraction root
    pub entry_document_relative_path: Option<PathBuf>,
}

impl ProjectLayout {
    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.manifest_relative_path
            .as_ref()
            .map(|_| self.root_path.join(MANIFEST_FILE))
    }

    pub fn entry_document_path(&self) -> Option<PathBuf> {
        self.entry_document_relative_path
            .as_ref()
            .map(|_| self.root_path.join(ENTRY_DOCUMENT))
    }
}

#[derive(Default)]
struct Candidates {
    manifests: Vec<PathBuf>,
    entry_documents: Vec<PathBuf>,
}

/// Locate the project inside `extraction_root`
pub async fn locate_project(extraction_root: &Path) -> Result<ProjectLayout, DeployError> {
    let root = extraction_root.to_owned();
    spawn_blocking(move || locate_project_sync(&root))
        .await
        .map_err(|e| DeployError::Internal(format!("Project scan failed: {}", e)))?
}

pub fn locate_project_sync(extraction_root: &Path) -> Result<ProjectLayout, DeployError> {
    let mut candidates = Candidates::default();
    collect_candidates(extraction_root, Path::new(""), false, &mut candidates)?;

    if let Some(manifest) = shallowest(candidates.manifests) {
        return Ok(ProjectLayout {
            root_path: project_root(extraction_root, &manifest),
            manifest_relative_path: Some(manifest),
            entry_document_relative_path: None,
        });
    }

    if let Some(entry) = shallowest(candidates.entry_documents) {
        return Ok(ProjectLayout {
            root_path: project_root(extraction_root, &entry),
            manifest_relative_path: None,
            entry_document_relative_path: Some(entry),
        });
    }

    Ok(ProjectLayout {
        root_path: extraction_root.to_owned(),
        manifest_relative_path: None,
        entry_document_relative_path: None,
    })
}

fn project_root(extraction_root: &Path, relative_file: &Path) -> PathBuf {
    match relative_file.parent() {
        Some(parent) => extraction_root.join(parent),
        None => extraction_root.to_owned(),
    }
}

/// Fewest path components first, then lexicographic path
fn shallowest(mut paths: Vec<PathBuf>) -> Option<PathBuf> {
    paths.sort_by(|a, b| {
        a.components()
            .count()
            .cmp(&b.components().count())
            .then_with(|| a.to_string_lossy().cmp(&b.to_string_lossy()))
    });
    paths.into_iter().next()
}

fn collect_candidates(
    root: &Path,
    relative: &Path,
    in_output_dir: bool,
    candidates: &mut Candidates,
) -> Result<(), DeployError> {
    let entries = std::fs::read_dir(root.join(relative))?;

    for entry in entries.flatten() {
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(_) => continue,
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = relative.join(&name);

        if file_type.is_dir() {
            if name == "node_modules" || name.starts_with('.') {
                continue;
            }
            let nested_output = in_output_dir || OUTPUT_DIR_NAMES.contains(&name.as_str());
            collect_candidates(root, &path, nested_output, candidates)?;
        } else if file_type.is_file() {
            if name == MANIFEST_FILE {
                candidates.manifests.push(path);
            } else if name == ENTRY_DOCUMENT && !in_output_dir {
                candidates.entry_documents.push(path);
            }
        }
    }

    Ok(())
}
