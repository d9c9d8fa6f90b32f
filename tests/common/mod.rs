// Shared helpers for integration tests.
//
// Provides a temporary home directory, a managed tree, and a fluent builder
// that writes `dotbak.toml` so each integration test can set up an isolated
// environment without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dotbak::config::Config;
use dotbak::logging::{Log, SummaryStatus};
use dotbak::manager::Manager;
use dotbak::manifest::Manifest;
use dotbak::platform::Platform;

/// A [`Log`] that keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    /// All messages logged so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("log lock").clone()
    }

    fn push(&self, line: String) {
        self.lines.lock().expect("log lock").push(line);
    }
}

impl Log for MemoryLog {
    fn stage(&self, msg: &str) {
        self.push(format!("==> {msg}"));
    }
    fn info(&self, msg: &str) {
        self.push(msg.to_string());
    }
    fn debug(&self, msg: &str) {
        self.push(format!("[debug] {msg}"));
    }
    fn warn(&self, msg: &str) {
        self.push(format!("[warn] {msg}"));
    }
    fn error(&self, msg: &str) {
        self.push(format!("[error] {msg}"));
    }
    fn record(&self, name: &str, status: SummaryStatus, message: Option<&str>) {
        self.push(format!("{name}: {status:?} {}", message.unwrap_or_default()));
    }
}

/// An isolated environment backed by a [`tempfile::TempDir`].
///
/// Layout:
/// - `home/`            stands in for `$HOME`
/// - `dotbak.toml`      the configuration
/// - `managed/`         the managed root (default setting)
pub struct TestEnv {
    /// Temporary directory holding everything.
    pub root: tempfile::TempDir,
    /// Loaded configuration.
    pub config: Config,
    /// Probed platform.
    pub platform: Platform,
    /// Captured log output.
    pub log: MemoryLog,
}

impl TestEnv {
    /// Path under the fake home directory.
    pub fn home(&self, relative: &str) -> PathBuf {
        self.root.path().join("home").join(relative)
    }

    /// Managed path of `relative` in `group`.
    pub fn managed(&self, group: &str, relative: &str) -> PathBuf {
        self.config
            .settings
            .managed_root
            .join(group)
            .join(relative)
    }

    /// Write `content` to a file under the fake home directory.
    pub fn write_home(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.home(relative);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        std::fs::write(&path, content).expect("write file");
        path
    }

    /// A manager over this environment.
    pub fn manager(&self) -> Manager<'_> {
        Manager::new(&self.config, &self.platform, &self.log)
    }

    /// Manifest file path.
    pub fn manifest_path(&self) -> &Path {
        &self.config.settings.manifest_path
    }

    /// Load the manifest as currently on disk.
    pub fn manifest(&self) -> Manifest {
        Manifest::load(self.manifest_path())
            .expect("load manifest")
            .expect("manifest exists")
    }

    /// Reload the configuration after rewriting it.
    pub fn reload(&mut self, document: &str) {
        self.config = load(self.root.path(), document);
    }
}

/// Fluent builder for [`TestEnv`].
#[derive(Default)]
pub struct TestEnvBuilder {
    groups: Vec<(String, String, Vec<String>)>,
    files: Vec<(String, String)>,
}

impl TestEnvBuilder {
    /// Begin building an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group with `base` (may use `~`) and `entries`.
    pub fn group(mut self, name: &str, base: &str, entries: &[&str]) -> Self {
        self.groups.push((
            name.to_string(),
            base.to_string(),
            entries.iter().map(|e| (*e).to_string()).collect(),
        ));
        self
    }

    /// Create a file under the fake home directory.
    pub fn with_home_file(mut self, relative: &str, content: &str) -> Self {
        self.files.push((relative.to_string(), content.to_string()));
        self
    }

    /// Write everything and load the configuration.
    pub fn build(self) -> TestEnv {
        let root = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(root.path().join("home")).expect("create home");
        for (relative, content) in &self.files {
            let path = root.path().join("home").join(relative);
            std::fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
            std::fs::write(path, content).expect("write home file");
        }
        let config = load(root.path(), &document(&self.groups));
        TestEnv {
            root,
            config,
            platform: Platform::detect(),
            log: MemoryLog::default(),
        }
    }
}

/// Render a configuration document for `groups`.
pub fn document(groups: &[(String, String, Vec<String>)]) -> String {
    let mut doc = String::from("[paths]\n");
    for (name, base, _) in groups {
        doc.push_str(&format!("{name} = \"{base}\"\n"));
    }
    for (name, _, entries) in groups {
        let list = entries
            .iter()
            .map(|e| format!("\"{e}\""))
            .collect::<Vec<_>>()
            .join(", ");
        doc.push_str(&format!("\n[groups.{name}]\nentries = [{list}]\n"));
    }
    doc
}

fn load(root: &Path, document: &str) -> Config {
    let config_path = root.join("dotbak.toml");
    std::fs::write(&config_path, document).expect("write dotbak.toml");
    let home = root.join("home").to_string_lossy().into_owned();
    let env = move |name: &str| (name == "HOME").then(|| home.clone());
    Config::from_str_with_env(document, &config_path, &env).expect("load config")
}
