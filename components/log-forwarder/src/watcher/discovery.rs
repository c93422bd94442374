// Local crates
use crate::{helpers::load_config::CollectorConfig, metrics::metrics::FILES_DISCOVERED_TOTAL};

// External crates
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{instrument, warn};
use walkdir::{DirEntry, WalkDir};

/// Walks a root directory and lists the files to forward.
///
/// Ordering is deterministic for a given tree: inside every directory its own
/// files come first, then its subdirectories, each group sorted by name.
#[derive(Debug, Clone, Default)]
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    /// Build a collector from the `[collector]` configuration section.
    #[must_use]
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// Collect every regular file reachable from `root`.
    ///
    /// `root` is expected to be an existing directory. Entries that cannot be
    /// read are logged and skipped; an empty tree yields an empty vector.
    #[instrument(
        name = "log_forwarder::collect",
        target = "watcher::discovery",
        skip_all,
        fields(root = %root.display()),
        level = "debug"
    )]
    pub fn collect(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in self.build_walker(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(
                        error = %e,
                        path = ?e.path(),
                        "Skipping unreadable entry during directory scan"
                    );
                    continue;
                }
            };

            if !is_regular_file(&entry) || !self.accepts_extension(entry.path()) {
                continue;
            }

            files.push(entry.into_path());
        }

        FILES_DISCOVERED_TOTAL.inc_by(files.len() as u64);
        tracing::debug!(files = files.len(), "Directory scan finished");
        files
    }

    fn build_walker(&self, root: &Path) -> walkdir::IntoIter {
        let mut walker = WalkDir::new(root)
            .follow_links(self.config.follow_links)
            .sort_by(files_before_directories);

        if !self.config.recursive {
            walker = walker.max_depth(1);
        }

        walker.into_iter()
    }

    fn accepts_extension(&self, path: &Path) -> bool {
        if self.config.extensions.is_empty() {
            return true;
        }

        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }
}

/// Regular files, plus symlinks that resolve to one (dangling links are
/// dropped).
fn is_regular_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_file() {
        return true;
    }
    file_type.is_symlink() && entry.path().is_file()
}

fn files_before_directories(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}
