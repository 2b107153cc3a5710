use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::LoaderConfig;
use crate::error::{CanvasError, Result};
use crate::logging::{LOADER_TARGET, LogLevel, Logger, event_with_fields, json_kv, json_str};
use crate::page::{Element, HostPage};
use crate::transport::{BackendRequest, RequestId, Transport};

use super::signal::{CompletionSignal, OnLoadSignal, ScriptEvent};

/// Dependency-ordered file list returned by the resolution service: every
/// dependency precedes the files that need it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    #[serde(rename = "js", default)]
    files: Vec<String>,
}

impl AssetManifest {
    pub fn new(files: Vec<String>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in manifest order with later repeats dropped.
    pub fn load_order(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.files
            .iter()
            .filter(|file| seen.insert(file.as_str()))
            .cloned()
            .collect()
    }
}

/// Where included scripts go. Completion is reported back separately through
/// [`AssetLoader::on_script_event`].
pub trait ScriptHost {
    fn include_script(&mut self, url: &str);
}

impl ScriptHost for HostPage {
    fn include_script(&mut self, url: &str) {
        let script = self.document.create_element(
            Element::new("script")
                .with_attr("src", url)
                .with_attr("type", "text/javascript"),
        );
        let body = self.document.body();
        let _ = self.document.append_child(body, script);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    /// Accepting imports; `load` not called yet.
    Collecting,
    /// Waiting for the dependency manifest.
    Resolving { request_id: RequestId },
    /// Including manifest files one at a time.
    Including,
    /// Every file executed. Terminal.
    Ready,
}

type ReadySubscriber = Box<dyn FnOnce()>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    file: String,
    url: String,
}

/// Loads a set of script files plus their dependencies, strictly one after
/// another, then notifies `ready` subscribers once.
pub struct AssetLoader {
    config: LoaderConfig,
    signal: Box<dyn CompletionSignal>,
    logger: Logger,
    requested: Vec<String>,
    has_loaded: bool,
    state: LoaderState,
    pending: VecDeque<String>,
    in_flight: Option<InFlight>,
    included: Vec<String>,
    subscribers: Vec<ReadySubscriber>,
}

impl AssetLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self::with_signal(config, OnLoadSignal)
    }

    pub fn with_signal<S>(config: LoaderConfig, signal: S) -> Self
    where
        S: CompletionSignal + 'static,
    {
        Self {
            config,
            signal: Box::new(signal),
            logger: Logger::disabled(),
            requested: Vec::new(),
            has_loaded: false,
            state: LoaderState::Collecting,
            pending: VecDeque::new(),
            in_flight: None,
            included: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Queue a file. Repeats are kept; resolution removes them.
    pub fn import_file(&mut self, path: &str) -> Result<()> {
        if path.trim().is_empty() {
            return Err(CanvasError::invalid_argument(
                "import path cannot be blank",
            ));
        }
        if self.has_loaded {
            return Err(CanvasError::state(format!(
                "cannot import `{path}`: load already invoked"
            )));
        }
        self.requested.push(path.to_string());
        Ok(())
    }

    /// Ask the resolution service for the manifest. Only the first call on a
    /// loader goes through.
    pub fn load(&mut self, transport: &mut dyn Transport, request_id: RequestId) -> Result<()> {
        if self.has_loaded {
            return Err(CanvasError::state(
                "load already invoked, cannot make more than one load",
            ));
        }
        self.has_loaded = true;

        if self.requested.is_empty() {
            return Err(CanvasError::protocol(
                "attempted to load an empty list of files",
            ));
        }

        transport.send(BackendRequest::ResolveDependencies {
            request_id,
            endpoint: self.config.resolve_endpoint(),
            files: self.requested.clone(),
        });
        self.state = LoaderState::Resolving { request_id };
        self.log(
            LogLevel::Debug,
            "dependencies_requested",
            [
                json_kv("request_id", json!(request_id)),
                json_kv("files", json!(self.requested.len())),
            ],
        );
        Ok(())
    }

    /// Start including the resolved files.
    pub fn on_manifest(&mut self, manifest: AssetManifest, host: &mut dyn ScriptHost) -> Result<()> {
        if !matches!(self.state, LoaderState::Resolving { .. }) {
            return Err(CanvasError::state(format!(
                "manifest received while {:?}",
                self.state
            )));
        }
        if manifest.is_empty() {
            return Err(CanvasError::protocol(
                "attempted to include an empty list of files",
            ));
        }

        self.pending = manifest.load_order().into();
        self.state = LoaderState::Including;
        self.log(
            LogLevel::Debug,
            "manifest_received",
            [json_kv("files", json!(self.pending.len()))],
        );
        self.include_next(host);
        Ok(())
    }

    /// Feed a raw completion notification for `url`. Returns whether it
    /// completed the in-flight file; notifications for anything else are
    /// ignored.
    pub fn on_script_event(
        &mut self,
        url: &str,
        event: &ScriptEvent,
        host: &mut dyn ScriptHost,
    ) -> bool {
        let matches_in_flight = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.url == url);
        if !matches_in_flight || !self.signal.is_complete(event) {
            return false;
        }

        if let Some(done) = self.in_flight.take() {
            self.log(
                LogLevel::Trace,
                "script_loaded",
                [json_str("file", done.file.as_str())],
            );
            self.included.push(done.file);
        }
        self.include_next(host);
        true
    }

    /// Run `callback` once every file executed: right away if that already
    /// happened, otherwise after the last file, in subscription order.
    pub fn ready<F>(&mut self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        if self.state == LoaderState::Ready {
            callback();
        } else {
            self.subscribers.push(Box::new(callback));
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LoaderState::Ready
    }

    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    /// Files whose completion was observed, in execution order.
    pub fn included(&self) -> &[String] {
        &self.included
    }

    /// Url of the script currently being fetched.
    pub fn in_flight_url(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|f| f.url.as_str())
    }

    pub fn signal_name(&self) -> &str {
        self.signal.name()
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        match self.state {
            LoaderState::Resolving { request_id } => Some(request_id),
            _ => None,
        }
    }

    fn include_next(&mut self, host: &mut dyn ScriptHost) {
        while let Some(file) = self.pending.pop_front() {
            if self.config.skips(&file) {
                self.log(
                    LogLevel::Debug,
                    "script_skipped",
                    [json_str("file", file.as_str())],
                );
                continue;
            }
            let url = self.config.script_url(&file);
            host.include_script(&url);
            self.in_flight = Some(InFlight { file, url });
            return;
        }
        self.finish();
    }

    fn finish(&mut self) {
        self.state = LoaderState::Ready;
        self.log(
            LogLevel::Info,
            "loader_ready",
            [json_kv("included", json!(self.included.len()))],
        );
        for subscriber in self.subscribers.drain(..) {
            subscriber();
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        let _ = self
            .logger
            .log_event(event_with_fields(level, LOADER_TARGET, message, fields));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::loader::signal::{ReadyState, ReadyStateSignal};
    use crate::transport::OutboxTransport;

    #[derive(Default)]
    struct RecordingHost {
        included: Vec<String>,
    }

    impl ScriptHost for RecordingHost {
        fn include_script(&mut self, url: &str) {
            self.included.push(url.to_string());
        }
    }

    fn loader_with(files: &[&str]) -> AssetLoader {
        let mut loader = AssetLoader::new(LoaderConfig::new("/app"));
        for file in files {
            loader.import_file(file).unwrap();
        }
        loader
    }

    fn manifest(files: &[&str]) -> AssetManifest {
        AssetManifest::new(files.iter().map(|f| f.to_string()).collect())
    }

    #[test]
    fn duplicates_are_kept_until_resolution() {
        let mut loader = loader_with(&["/a.js", "/a.js"]);
        let mut outbox = OutboxTransport::new();
        loader.load(&mut outbox, 1).unwrap();

        match outbox.drain().remove(0) {
            BackendRequest::ResolveDependencies { files, endpoint, .. } => {
                assert_eq!(files, vec!["/a.js".to_string(), "/a.js".to_string()]);
                assert_eq!(endpoint, "/app/module/jsmodule/action/resolveDependencies.do");
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn second_load_fails_every_time_without_new_requests() {
        let mut loader = loader_with(&["/a.js"]);
        let mut outbox = OutboxTransport::new();
        loader.load(&mut outbox, 1).unwrap();

        for _ in 0..2 {
            let err = loader.load(&mut outbox, 2).unwrap_err();
            assert!(matches!(err, CanvasError::State(_)));
        }
        assert_eq!(outbox.pending(), 1);
    }

    #[test]
    fn empty_load_is_a_protocol_error() {
        let mut loader = AssetLoader::new(LoaderConfig::default());
        let mut outbox = OutboxTransport::new();

        let err = loader.load(&mut outbox, 1).unwrap_err();
        assert!(matches!(err, CanvasError::Protocol(_)));
        assert_eq!(outbox.pending(), 0);
    }

    #[test]
    fn empty_manifest_is_a_protocol_error() {
        let mut loader = loader_with(&["/a.js"]);
        loader.load(&mut OutboxTransport::new(), 1).unwrap();

        let err = loader
            .on_manifest(AssetManifest::default(), &mut RecordingHost::default())
            .unwrap_err();
        assert!(matches!(err, CanvasError::Protocol(_)));
    }

    #[test]
    fn blank_import_is_rejected() {
        let mut loader = AssetLoader::new(LoaderConfig::default());
        let err = loader.import_file(" ").unwrap_err();
        assert!(matches!(err, CanvasError::InvalidArgument(_)));
    }

    #[test]
    fn dependent_fetch_waits_for_dependency_completion() {
        let mut loader = loader_with(&["/b.js"]);
        let mut host = RecordingHost::default();
        loader.load(&mut OutboxTransport::new(), 1).unwrap();
        loader.on_manifest(manifest(&["/a.js", "/b.js"]), &mut host).unwrap();

        assert_eq!(host.included, vec!["/app/module/jsmodule/a.js".to_string()]);

        // Completion for a file that is not in flight changes nothing.
        assert!(!loader.on_script_event("/app/module/jsmodule/b.js", &ScriptEvent::Load, &mut host));
        assert_eq!(host.included.len(), 1);

        assert!(loader.on_script_event("/app/module/jsmodule/a.js", &ScriptEvent::Load, &mut host));
        assert_eq!(
            host.included,
            vec![
                "/app/module/jsmodule/a.js".to_string(),
                "/app/module/jsmodule/b.js".to_string()
            ]
        );
        assert!(!loader.is_ready());

        loader.on_script_event("/app/module/jsmodule/b.js", &ScriptEvent::Load, &mut host);
        assert!(loader.is_ready());
        assert_eq!(loader.included(), &["/a.js".to_string(), "/b.js".to_string()]);
    }

    #[test]
    fn subscribers_run_once_in_order_and_late_ones_run_immediately() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut loader = loader_with(&["/a.js"]);
        let mut host = RecordingHost::default();

        for name in ["first", "second"] {
            let calls = Rc::clone(&calls);
            loader.ready(move || calls.borrow_mut().push(name));
        }
        loader.load(&mut OutboxTransport::new(), 1).unwrap();
        loader.on_manifest(manifest(&["/a.js"]), &mut host).unwrap();
        assert!(calls.borrow().is_empty());

        loader.on_script_event("/app/module/jsmodule/a.js", &ScriptEvent::Load, &mut host);
        assert_eq!(*calls.borrow(), vec!["first", "second"]);

        // A second completion signal must not re-run anyone.
        loader.on_script_event("/app/module/jsmodule/a.js", &ScriptEvent::Load, &mut host);
        assert_eq!(calls.borrow().len(), 2);

        let late = Rc::clone(&calls);
        loader.ready(move || late.borrow_mut().push("late"));
        assert_eq!(*calls.borrow(), vec!["first", "second", "late"]);
    }

    #[test]
    fn skipped_files_are_not_fetched() {
        let config = LoaderConfig::new("").with_skip_file("/lib/jquery.js");
        let mut loader = AssetLoader::new(config);
        loader.import_file("/app.js").unwrap();
        let mut host = RecordingHost::default();
        loader.load(&mut OutboxTransport::new(), 1).unwrap();

        loader
            .on_manifest(manifest(&["/lib/jquery.js", "/app.js"]), &mut host)
            .unwrap();
        assert_eq!(host.included, vec!["/module/jsmodule/app.js".to_string()]);
    }

    #[test]
    fn ready_state_adapter_drives_completion() {
        let mut loader =
            AssetLoader::with_signal(LoaderConfig::new(""), ReadyStateSignal);
        loader.import_file("/a.js").unwrap();
        let mut host = RecordingHost::default();
        loader.load(&mut OutboxTransport::new(), 1).unwrap();
        loader.on_manifest(manifest(&["/a.js"]), &mut host).unwrap();

        let url = "/module/jsmodule/a.js";
        assert!(!loader.on_script_event(url, &ScriptEvent::ReadyStateChange(ReadyState::Loading), &mut host));
        assert!(loader.on_script_event(url, &ScriptEvent::ReadyStateChange(ReadyState::Complete), &mut host));
        assert!(loader.is_ready());
        assert_eq!(loader.signal_name(), "readystate");
    }

    #[test]
    fn host_page_receives_script_elements() {
        let mut page = HostPage::new("http://host/");
        let mut loader = loader_with(&["/a.js"]);
        loader.load(&mut OutboxTransport::new(), 1).unwrap();
        loader.on_manifest(manifest(&["/a.js"]), &mut page).unwrap();

        let scripts = page.document.find_by_tag(page.document.body(), "script");
        assert_eq!(scripts.len(), 1);
        let src = page.document.get(scripts[0]).unwrap().attr("src");
        assert_eq!(src, Some("/app/module/jsmodule/a.js"));
    }
}
