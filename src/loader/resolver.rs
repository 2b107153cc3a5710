//! Dependency resolution behind the resolve-dependencies endpoint.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{CanvasError, Result};

use super::AssetManifest;

/// Answers "which files does this file need right before it".
pub trait DependencyFinder {
    fn find(&self, file: &str) -> Result<Vec<String>>;
}

/// Dependencies held in memory, keyed by file.
#[derive(Debug, Clone, Default)]
pub struct MapFinder {
    dependencies: HashMap<String, Vec<String>>,
}

impl MapFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file: &str, dependencies: &[&str]) -> Self {
        self.dependencies.insert(
            file.to_string(),
            dependencies.iter().map(|d| d.to_string()).collect(),
        );
        self
    }
}

impl DependencyFinder for MapFinder {
    fn find(&self, file: &str) -> Result<Vec<String>> {
        Ok(self.dependencies.get(file).cloned().unwrap_or_default())
    }
}

/// Reads `name.dep.js` manifests stored next to the scripts under `root`.
/// A script without a manifest has no dependencies.
#[derive(Debug, Clone)]
pub struct DepFileFinder {
    root: PathBuf,
}

impl DepFileFinder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location of a module path such as `/lib/a.js`. Paths that
    /// would leave `root` are rejected.
    pub fn locate(&self, file: &str) -> Result<PathBuf> {
        let relative = Path::new(file.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(CanvasError::invalid_argument(format!(
                "`{file}` points outside the module root"
            )));
        }
        Ok(self.root.join(relative))
    }

    fn dep_file(&self, file: &str) -> Result<PathBuf> {
        if file.trim().is_empty() {
            return Err(CanvasError::invalid_argument("file cannot be blank"));
        }
        let Some(stem) = file.strip_suffix(".js") else {
            return Err(CanvasError::invalid_argument(format!(
                "`{file}` does not have a javascript extension"
            )));
        };
        self.locate(&format!("{stem}.dep.js"))
    }
}

impl DependencyFinder for DepFileFinder {
    fn find(&self, file: &str) -> Result<Vec<String>> {
        let path = self.dep_file(file)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let manifest: AssetManifest = serde_json::from_str(&raw)?;
        Ok(manifest.files().to_vec())
    }
}

/// Depth-first resolution: each file comes after everything it needs,
/// repeats are dropped, cycles are errors.
pub struct DependencyResolver<F> {
    finder: F,
}

impl<F: DependencyFinder> DependencyResolver<F> {
    pub fn new(finder: F) -> Self {
        Self { finder }
    }

    pub fn finder(&self) -> &F {
        &self.finder
    }

    pub fn resolve(&self, files: &[String]) -> Result<Vec<String>> {
        let mut resolved = Vec::new();
        self.resolve_into(files, &HashSet::new(), &mut resolved)?;
        Ok(resolved)
    }

    fn resolve_into(
        &self,
        files: &[String],
        ancestors: &HashSet<String>,
        resolved: &mut Vec<String>,
    ) -> Result<()> {
        for file in files {
            if ancestors.contains(file) {
                let mut chain: Vec<String> = ancestors.iter().cloned().collect();
                chain.sort();
                return Err(CanvasError::CircularDependency {
                    file: file.clone(),
                    ancestors: chain,
                });
            }
            let mut lineage = ancestors.clone();
            lineage.insert(file.clone());

            let dependencies = self.finder.find(file)?;
            self.resolve_into(&dependencies, &lineage, resolved)?;

            if !resolved.contains(file) {
                resolved.push(file.clone());
            }
        }
        Ok(())
    }
}
