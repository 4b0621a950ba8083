//! Resolution of `require()` requests to module files on disk

use crate::error::ModuleError;
use log::trace;
use serde::Serialize;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 3] = ["js", "cjs", "json"];
const INDEX_FILES: [&str; 3] = ["index.js", "index.cjs", "index.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Script,
    Json,
}

/// A module file read from disk, ready to be compiled by the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSource {
    pub filename: String,
    pub dirname: String,
    pub kind: SourceKind,
    pub source: String,
}

/// Resolves module requests the way scripts expect from `require`.
///
/// Relative and absolute requests are resolved against the requesting
/// module's directory (or the working directory for top-level requests).
/// Bare names are looked up in `node_modules` directories from the
/// requesting directory upwards, then in the configured search paths.
#[derive(Debug, Clone, Default)]
pub struct ModuleResolver {
    search_paths: Vec<PathBuf>,
}

impl ModuleResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Finds the file a request refers to, `None` if nothing matches
    pub fn resolve(&self, request: &str, base_dir: Option<&Path>) -> Option<PathBuf> {
        if request.is_empty() {
            return None;
        }

        let base = match base_dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().ok()?,
        };

        let resolved = if is_path_request(request) {
            resolve_path(&base.join(request))
        } else {
            self.candidate_roots(&base)
                .into_iter()
                .find_map(|root| resolve_path(&root.join(request)))
        };

        trace!("resolve({request}, {}) -> {resolved:?}", base.display());
        resolved.map(|path| std::fs::canonicalize(&path).unwrap_or(path))
    }

    /// Reads a resolved module file
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::Read` if the file cannot be read as UTF-8 text
    pub fn read(&self, filename: &Path) -> Result<ModuleSource, ModuleError> {
        let source = std::fs::read_to_string(filename).map_err(|e| ModuleError::Read {
            path: filename.display().to_string(),
            message: e.to_string(),
        })?;
        let kind = if filename.extension().is_some_and(|ext| ext == "json") {
            SourceKind::Json
        } else {
            SourceKind::Script
        };

        Ok(ModuleSource {
            filename: filename.display().to_string(),
            dirname: filename
                .parent()
                .map(|dir| dir.display().to_string())
                .unwrap_or_default(),
            kind,
            source,
        })
    }

    fn candidate_roots(&self, base: &Path) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = base
            .ancestors()
            .filter(|dir| dir.file_name().is_none_or(|name| name != "node_modules"))
            .map(|dir| dir.join("node_modules"))
            .collect();

        for path in &self.search_paths {
            let root = if path.is_absolute() {
                path.clone()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.clone())
            };
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }
}

fn is_path_request(request: &str) -> bool {
    request.starts_with("./")
        || request.starts_with("../")
        || request == "."
        || request == ".."
        || Path::new(request).is_absolute()
}

fn resolve_path(path: &Path) -> Option<PathBuf> {
    resolve_file(path).or_else(|| resolve_directory(path))
}

fn resolve_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    EXTENSIONS.iter().find_map(|ext| {
        let mut candidate = path.as_os_str().to_owned();
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        candidate.is_file().then_some(candidate)
    })
}

fn resolve_directory(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }

    if let Some(main) = package_main(dir) {
        let entry = dir.join(main);
        if let Some(found) = resolve_file(&entry).or_else(|| resolve_index(&entry)) {
            return Some(found);
        }
    }
    resolve_index(dir)
}

fn resolve_index(dir: &Path) -> Option<PathBuf> {
    INDEX_FILES
        .iter()
        .map(|index| dir.join(index))
        .find(|candidate| candidate.is_file())
}

fn package_main(dir: &Path) -> Option<String> {
    let manifest = std::fs::read_to_string(dir.join("package.json")).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&manifest).ok()?;
    manifest
        .get("main")
        .and_then(serde_json::Value::as_str)
        .filter(|main| !main.is_empty())
        .map(str::to_string)
}
