//! Ordered script loading and the dependency resolution behind it.

mod bundle;
mod core;
mod resolver;
mod signal;

pub use bundle::{
    BUNDLE_PATH, BundleCache, DependencyService, MemorySource, ResolutionService, ScriptSource,
    bundle_files,
};
pub use core::{AssetLoader, AssetManifest, LoaderState, ScriptHost};
pub use resolver::{DepFileFinder, DependencyFinder, DependencyResolver, MapFinder};
pub use signal::{
    CompletionSignal, DocumentPollSignal, OnLoadSignal, ReadyState, ReadyStateSignal, ScriptEvent,
};
