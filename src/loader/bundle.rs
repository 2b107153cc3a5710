//! Serving side of dependency resolution: debug hosts get the resolved file
//! list, everyone else gets a single cached bundle.

use std::collections::HashMap;
use std::fs;

use blake3::Hash;

use crate::error::{CanvasError, Result};

use super::AssetManifest;
use super::resolver::{DepFileFinder, DependencyFinder, DependencyResolver};

pub const BUNDLE_PATH: &str = "/bundle/";

const BANNER_RULE: &str = "***************************************************";

/// Script text lookup by module path.
pub trait ScriptSource {
    fn read(&self, file: &str) -> Result<String>;
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    scripts: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file: &str, content: &str) -> Self {
        self.scripts.insert(file.to_string(), content.to_string());
        self
    }
}

impl ScriptSource for MemorySource {
    fn read(&self, file: &str) -> Result<String> {
        self.scripts
            .get(file)
            .cloned()
            .ok_or_else(|| CanvasError::invalid_argument(format!("no script at `{file}`")))
    }
}

impl ScriptSource for DepFileFinder {
    fn read(&self, file: &str) -> Result<String> {
        Ok(fs::read_to_string(self.locate(file)?)?)
    }
}

/// Concatenate `files` in order, each preceded by a banner naming it.
pub fn bundle_files(source: &dyn ScriptSource, files: &[String]) -> Result<String> {
    let mut bundle = String::new();
    for file in files {
        let content = source.read(file)?;
        bundle.push('/');
        bundle.push_str(BANNER_RULE);
        bundle.push('\n');
        bundle.push_str(&format!(" * Bundled from '{file}'\n "));
        bundle.push_str(BANNER_RULE);
        bundle.push_str("/\n");
        bundle.push_str(&content);
        bundle.push('\n');
    }
    Ok(bundle)
}

/// Bundles keyed by the request they were built for.
#[derive(Debug, Clone, Default)]
pub struct BundleCache {
    bundles: HashMap<String, String>,
}

impl BundleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// First 32 hex characters of the request's blake3 hash, plus `.js`.
    pub fn key_for(files: &[String]) -> String {
        let hash: Hash = blake3::hash(files.join("\n").as_bytes());
        let hex = hash.to_hex();
        format!("{}.js", &hex.as_str()[..32])
    }

    pub fn find_key(&self, files: &[String]) -> Option<String> {
        let key = Self::key_for(files);
        self.bundles.contains_key(&key).then_some(key)
    }

    pub fn store(&mut self, files: &[String], content: String) -> String {
        let key = Self::key_for(files);
        self.bundles.insert(key.clone(), content);
        key
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.bundles.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

/// Anything able to answer a resolve-dependencies request in process.
pub trait DependencyService {
    fn resolve_request(&mut self, files: Vec<String>) -> Result<AssetManifest>;
}

/// Answers resolve-dependencies requests.
pub struct ResolutionService<F, S> {
    resolver: DependencyResolver<F>,
    source: S,
    cache: BundleCache,
    debug: bool,
}

impl<F, S> ResolutionService<F, S>
where
    F: DependencyFinder,
    S: ScriptSource,
{
    pub fn new(finder: F, source: S, debug: bool) -> Self {
        Self {
            resolver: DependencyResolver::new(finder),
            source,
            cache: BundleCache::new(),
            debug,
        }
    }

    /// Requests are sorted first so debug and bundled answers agree on order.
    pub fn execute(&mut self, mut files: Vec<String>) -> Result<AssetManifest> {
        files.sort();
        if self.debug {
            return Ok(AssetManifest::new(self.resolver.resolve(&files)?));
        }

        let key = match self.cache.find_key(&files) {
            Some(key) => key,
            None => {
                let resolved = self.resolver.resolve(&files)?;
                let content = bundle_files(&self.source, &resolved)?;
                self.cache.store(&files, content)
            }
        };
        Ok(AssetManifest::new(vec![format!("{BUNDLE_PATH}{key}")]))
    }

    pub fn cache(&self) -> &BundleCache {
        &self.cache
    }

    /// Content served at `/bundle/{key}`.
    pub fn bundle(&self, path: &str) -> Option<&str> {
        path.strip_prefix(BUNDLE_PATH)
            .and_then(|key| self.cache.get(key))
    }
}

impl<F, S> DependencyService for ResolutionService<F, S>
where
    F: DependencyFinder,
    S: ScriptSource,
{
    fn resolve_request(&mut self, files: Vec<String>) -> Result<AssetManifest> {
        self.execute(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::resolver::MapFinder;

    fn files(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn service(debug: bool) -> ResolutionService<MapFinder, MemorySource> {
        let finder = MapFinder::new().with("/b.js", &["/a.js"]);
        let source = MemorySource::new()
            .with("/a.js", "var a = 1;")
            .with("/b.js", "var b = a + 1;");
        ResolutionService::new(finder, source, debug)
    }

    #[test]
    fn debug_mode_returns_resolved_files() {
        let manifest = service(true).execute(files(&["/b.js"])).unwrap();
        assert_eq!(manifest.files(), &files(&["/a.js", "/b.js"]));
    }

    #[test]
    fn bundled_mode_caches_by_sorted_request() {
        let mut service = service(false);
        let first = service.execute(files(&["/b.js", "/a.js"])).unwrap();
        let second = service.execute(files(&["/a.js", "/b.js"])).unwrap();

        assert_eq!(first, second);
        assert_eq!(service.cache().len(), 1);

        let path = &first.files()[0];
        assert!(path.starts_with("/bundle/"));
        assert_eq!(path.len(), "/bundle/".len() + 32 + ".js".len());

        let bundle = service.bundle(path).unwrap();
        let a = bundle.find("var a = 1;").unwrap();
        let b = bundle.find("var b = a + 1;").unwrap();
        assert!(a < b);
        assert!(bundle.contains(" * Bundled from '/a.js'"));
    }

    #[test]
    fn missing_script_fails_the_bundle() {
        let finder = MapFinder::new();
        let mut service = ResolutionService::new(finder, MemorySource::new(), false);
        let err = service.execute(files(&["/gone.js"])).unwrap_err();
        assert!(matches!(err, CanvasError::InvalidArgument(_)));
        assert!(service.cache().is_empty());
    }

    #[test]
    fn scripts_outside_the_module_root_are_never_bundled() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("modules");
        fs::create_dir_all(&root).unwrap();
        fs::write(dir.path().join("secret.js"), "var secret = 'outside root';").unwrap();

        let finder = DepFileFinder::new(&root);
        let mut service = ResolutionService::new(finder.clone(), finder, false);
        let err = service.execute(files(&["/../secret.js"])).unwrap_err();
        assert!(matches!(err, CanvasError::InvalidArgument(_)));
        assert!(service.cache().is_empty());
    }

    #[test]
    fn dep_file_finder_serves_scripts_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "var a;").unwrap();
        fs::write(dir.path().join("b.js"), "var b;").unwrap();
        fs::write(dir.path().join("b.dep.js"), r#"{"js": ["/a.js"]}"#).unwrap();

        let finder = DepFileFinder::new(dir.path());
        let mut service = ResolutionService::new(finder.clone(), finder, false);
        let manifest = service.execute(files(&["/b.js"])).unwrap();
        let bundle = service.bundle(&manifest.files()[0]).unwrap();
        assert!(bundle.find("var a;").unwrap() < bundle.find("var b;").unwrap());
    }
}
