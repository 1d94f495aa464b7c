//! Path exclusion rules applied during discovery.
//!
//! Directories are pruned as the walker reaches them; files get a final check.
//! Virtual environments are matched both by name and by the marker files an
//! environment leaves behind, so a venv with an unusual name is still skipped.

use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use lazy_static::lazy_static;
use regex::Regex;

/// Directory names that are never scanned.
const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    // version control
    ".git",
    ".hg",
    ".svn",
    // dependencies and vendored code
    "node_modules",
    "bower_components",
    "vendor",
    // build output and caches
    "__pycache__",
    "build",
    "dist",
    "target",
    "out",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    // coverage artifacts
    "coverage",
    "htmlcov",
    ".nyc_output",
    // generated or tool-managed
    "migrations",
    "chrome_profile",
];

/// Canonical virtual environment directory names (compared lowercased).
const VENV_NAMES: &[&str] = &[
    "venv",
    "env",
    ".env",
    ".venv",
    "virtualenv",
    "python-env",
    "python-venv",
    "py-env",
    "py-venv",
    "envs",
    "conda-env",
    ".conda-env",
    ".poetry-venv",
];

lazy_static! {
    /// Versioned or suffixed environment names: `venv311`, `.venv-3.12`, `py-env_dev`.
    static ref VENV_PATTERN: Regex = Regex::new(
        r"^\.?(?:py(?:thon)?[-_]?)?(?:v?env|virtualenv|envs|conda[-_]env)(?:\d[\w.]*|[-_.][\w.-]+)?$"
    )
    .unwrap();
}

/// Decides which paths the scanner must skip.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    root: PathBuf,
    ignore_paths: Vec<PathBuf>,
    globs: Option<GlobSet>,
    self_paths: Vec<PathBuf>,
}

impl ExclusionPolicy {
    /// Create a policy for the given scan root.
    ///
    /// The root should already be canonical; discovered paths are compared
    /// against it by prefix.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let mut self_paths = Vec::new();
        if let Ok(exe) = std::env::current_exe() {
            self_paths.push(exe.canonicalize().unwrap_or(exe));
        }

        Self {
            root: root.as_ref().to_path_buf(),
            ignore_paths: Vec::new(),
            globs: None,
            self_paths,
        }
    }

    /// Add caller-supplied paths to ignore.
    ///
    /// Relative paths are resolved against the scan root. Anything at or
    /// below an ignored path is excluded.
    pub fn with_ignore_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for p in paths {
            let p = p.as_ref();
            let joined = if p.is_absolute() {
                p.to_path_buf()
            } else {
                self.root.join(p)
            };
            let resolved = joined.canonicalize().unwrap_or_else(|_| normalize(&joined));
            self.ignore_paths.push(resolved);
        }
        self
    }

    /// Add glob patterns matched against root-relative paths.
    pub fn with_globs(mut self, patterns: &[String]) -> Result<Self, globset::Error> {
        if patterns.is_empty() {
            return Ok(self);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        self.globs = Some(builder.build()?);
        Ok(self)
    }

    /// Register a file the scanner owns (its cache or report) so it is never analyzed.
    pub fn with_self_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        let resolved = path
            .canonicalize()
            .unwrap_or_else(|_| normalize(path));
        self.self_paths.push(resolved);
        self
    }

    /// Full check for an arbitrary path, directory or file.
    ///
    /// Every ancestor between the root and the path is inspected, so this is
    /// correct even for paths the walker never visited.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.is_ignored_or_self(path) {
            return true;
        }

        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let is_dir = path.is_dir();
        let segments: Vec<_> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy()),
                _ => None,
            })
            .collect();
        // The last segment of a file is its own name, not a directory.
        let dir_count = if is_dir {
            segments.len()
        } else {
            segments.len().saturating_sub(1)
        };
        if segments[..dir_count].iter().any(|s| is_excluded_dir_name(s)) {
            return true;
        }

        if self.matches_glob(rel) {
            return true;
        }

        path.ancestors()
            .take_while(|a| a.starts_with(&self.root) && *a != self.root)
            .filter(|a| a.is_dir())
            .any(is_environment_dir)
    }

    /// Cheap check for an entry reached by a walk whose ancestors already passed.
    pub fn skips_entry(&self, path: &Path, is_dir: bool) -> bool {
        if self.is_ignored_or_self(path) {
            return true;
        }

        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        if self.matches_glob(rel) {
            return true;
        }

        if is_dir && path != self.root {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            return is_excluded_dir_name(&name) || is_environment_dir(path);
        }

        false
    }

    fn is_ignored_or_self(&self, path: &Path) -> bool {
        if self.self_paths.iter().any(|p| p == path) {
            return true;
        }
        self.ignore_paths.iter().any(|ignore| path.starts_with(ignore))
    }

    fn matches_glob(&self, rel: &Path) -> bool {
        match &self.globs {
            Some(set) => set.is_match(rel),
            None => false,
        }
    }
}

/// Whether a single directory name is excluded by convention.
pub fn is_excluded_dir_name(name: &str) -> bool {
    if DEFAULT_EXCLUDED_DIRS.contains(&name) {
        return true;
    }
    let lower = name.to_ascii_lowercase();
    VENV_NAMES.contains(&lower.as_str()) || VENV_PATTERN.is_match(&lower)
}

/// Whether a directory carries the markers of an isolated language environment.
pub fn is_environment_dir(dir: &Path) -> bool {
    dir.join("pyvenv.cfg").is_file()
        || dir.join("bin").join("activate").is_file()
        || dir.join("Scripts").join("activate.bat").is_file()
        || dir.join("conda-meta").is_dir()
}

/// Lexically resolve `.` and `..` for paths that do not exist yet.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
