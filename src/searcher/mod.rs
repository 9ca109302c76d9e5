//! # Searcher
//!
//! Walks a file system and yields the path specifications of the entries
//! matching a set of [`FindSpec`]s.
//!
//! ## Traversal
//!
//! Pre-order, depth first, children in the backend's listing order. An entry
//! at depth `d` (the root is 0) is tested against segment `d - 1` of every
//! find spec still alive on its path; subtrees no spec can match in are never
//! listed. Find specs made only of case-sensitive literals are checked with
//! [`FileSystem::file_entry_exists_by_path_spec`] first and dropped when
//! their target is absent.
//!
//! ## Partial Failure
//!
//! A subtree that cannot be listed, a child repeating one of its ancestors
//! and a path deeper than [`SearcherConfig::max_depth`] each yield one `Err`
//! item. The subtree is skipped and the walk goes on.
//!
//! ```text
//! /            depth 0   location "/"
//! ├── A        depth 1   segment 0
//! │   └── b    depth 2   segment 1
//! └── c        depth 1   segment 0
//! ```

mod find_spec;

use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::{FileEntry, FileSystem, PathSpec, VfsError};

pub use find_spec::FindSpec;
use find_spec::CompiledSpec;

/// Tuning of a [`FileSystemSearcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearcherConfig {
    /// Deepest entry depth visited; deeper children are reported as a
    /// [`VfsError::StructuralAnomaly`].
    pub max_depth: usize,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self { max_depth: 128 }
    }
}

/// Searches one file system.
///
/// # Example
///
/// ```rust
/// use nestvfs::{FakeFileSystemBuilder, FileSystemSearcher, FindSpec};
/// use std::sync::Arc;
///
/// let fs = FakeFileSystemBuilder::new()
///     .add_file("/readme.txt", "")
///     .add_file("/log2.gz", "")
///     .add_file("/log1.gz", "")
///     .build();
///
/// let searcher = FileSystemSearcher::new(Arc::new(fs));
/// let found: Vec<_> = searcher
///     .find(&[FindSpec::new().location_glob("/*.gz")?])
///     .collect::<Result<_, _>>()?;
///
/// let locations: Vec<_> = found.iter().filter_map(|s| s.location()).collect();
/// assert_eq!(locations, ["/log1.gz", "/log2.gz"]);
/// # Ok::<(), nestvfs::VfsError>(())
/// ```
pub struct FileSystemSearcher {
    file_system: Arc<dyn FileSystem>,
    config: SearcherConfig,
}

impl FileSystemSearcher {
    /// Searcher with the default configuration.
    pub fn new(file_system: Arc<dyn FileSystem>) -> Self {
        Self::with_config(file_system, SearcherConfig::default())
    }

    /// Searcher with an explicit configuration.
    pub fn with_config(file_system: Arc<dyn FileSystem>, config: SearcherConfig) -> Self {
        Self {
            file_system,
            config,
        }
    }

    /// The searched file system.
    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.file_system
    }

    /// Lazily yields a path specification for every entry matching at least
    /// one of `find_specs`, each entry once.
    ///
    /// The walk starts on the first call to `next`. An empty slice yields
    /// nothing and never touches the file system.
    pub fn find(&self, find_specs: &[FindSpec]) -> Find {
        Find {
            file_system: Arc::clone(&self.file_system),
            find_specs: find_specs.to_vec(),
            max_depth: self.config.max_depth,
            state: State::Pending,
        }
    }
}

/// Iterator returned by [`FileSystemSearcher::find`].
pub struct Find {
    file_system: Arc<dyn FileSystem>,
    find_specs: Vec<FindSpec>,
    max_depth: usize,
    state: State,
}

enum State {
    Pending,
    Walking(Walk),
    Done,
}

struct Walk {
    specs: Vec<CompiledSpec>,
    stack: Vec<Frame>,
    queued: VecDeque<Result<PathSpec, VfsError>>,
    yielded: HashSet<String>,
}

struct Frame {
    entry: Arc<dyn FileEntry>,
    depth: usize,
    /// Indices of the specs whose segments matched every ancestor.
    alive: Vec<usize>,
    /// Comparables from the root to this entry's parent.
    ancestry: Option<Arc<Ancestor>>,
}

struct Ancestor {
    comparable: String,
    parent: Option<Arc<Ancestor>>,
}

fn contains(ancestry: &Option<Arc<Ancestor>>, comparable: &str) -> bool {
    std::iter::successors(ancestry.as_deref(), |a| a.parent.as_deref())
        .any(|a| a.comparable == comparable)
}

impl Find {
    fn start(&self) -> Result<Option<Walk>, VfsError> {
        let mut specs = Vec::with_capacity(self.find_specs.len());
        for find_spec in &self.find_specs {
            if let Some(location) = find_spec.literal_location() {
                if !self.target_exists(&location) {
                    tracing::trace!(location = %location, "literal target absent, spec dropped");
                    continue;
                }
            }
            specs.push(find_spec.compile()?);
        }
        if specs.is_empty() {
            return Ok(None);
        }

        let root = self.file_system.root_file_entry()?;
        Ok(Some(Walk {
            stack: vec![Frame {
                entry: root,
                depth: 0,
                alive: (0..specs.len()).collect(),
                ancestry: None,
            }],
            specs,
            queued: VecDeque::new(),
            yielded: HashSet::new(),
        }))
    }

    fn target_exists(&self, location: &str) -> bool {
        let exists = self
            .file_system
            .path_spec_for_location(location)
            .and_then(|spec| self.file_system.file_entry_exists_by_path_spec(&spec));
        match exists {
            Ok(exists) => exists,
            // fall back to walking, which reports the failure in context
            Err(e) => {
                tracing::trace!(location, error = %e, "existence check failed");
                true
            }
        }
    }
}

impl Walk {
    fn visit(&mut self, frame: Frame, max_depth: usize) {
        let Frame {
            entry,
            depth,
            alive,
            ancestry,
        } = frame;
        let path_spec = entry.path_spec().clone();

        let complete: Vec<usize> = alive
            .iter()
            .copied()
            .filter(|&i| self.specs[i].is_complete(depth))
            .collect();
        if !complete.is_empty() {
            match entry.entry_type() {
                Ok(entry_type) => {
                    let matched = complete.iter().any(|&i| self.specs[i].accepts_type(entry_type));
                    if matched && self.yielded.insert(path_spec.comparable().to_string()) {
                        self.queued.push_back(Ok(path_spec.clone()));
                    }
                }
                Err(e) => self.queued.push_back(Err(e)),
            }
        }

        let descending: Vec<usize> = alive
            .into_iter()
            .filter(|&i| self.specs[i].descends_below(depth))
            .collect();
        if descending.is_empty() {
            tracing::trace!(location = path_spec.location(), depth, "pruned");
            return;
        }

        let children = match entry.sub_file_entries() {
            Ok(children) => children,
            Err(e) => {
                tracing::warn!(location = path_spec.location(), error = %e, "listing failed");
                self.queued.push_back(Err(e));
                return;
            }
        };
        if children.is_empty() {
            return;
        }
        if depth >= max_depth {
            self.queued.push_back(Err(anomaly(
                &path_spec,
                format!("deeper than the maximum depth of {max_depth}"),
            )));
            return;
        }

        let ancestry = Some(Arc::new(Ancestor {
            comparable: path_spec.comparable().to_string(),
            parent: ancestry,
        }));
        let child_depth = depth + 1;
        let mut pushed = Vec::new();
        for child in children {
            let child_alive: Vec<usize> = descending
                .iter()
                .copied()
                .filter(|&i| self.specs[i].matches_segment(child_depth, child.name()))
                .collect();
            if child_alive.is_empty() {
                continue;
            }
            let child_spec = child.path_spec();
            if contains(&ancestry, child_spec.comparable()) {
                self.queued.push_back(Err(anomaly(
                    child_spec,
                    "entry repeats one of its ancestors".to_string(),
                )));
                continue;
            }
            pushed.push(Frame {
                entry: Arc::clone(child),
                depth: child_depth,
                alive: child_alive,
                ancestry: ancestry.clone(),
            });
        }
        // first child on top
        self.stack.extend(pushed.into_iter().rev());
    }
}

fn anomaly(path_spec: &PathSpec, details: String) -> VfsError {
    tracing::warn!(path_spec = path_spec.comparable(), details = %details, "structural anomaly");
    VfsError::StructuralAnomaly {
        location: path_spec
            .location()
            .map_or_else(|| path_spec.comparable().to_string(), str::to_string),
        details,
    }
}

impl Iterator for Find {
    type Item = Result<PathSpec, VfsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.state {
                State::Pending => {
                    if self.find_specs.is_empty() {
                        self.state = State::Done;
                        return None;
                    }
                    match self.start() {
                        Ok(Some(walk)) => self.state = State::Walking(walk),
                        Ok(None) => {
                            self.state = State::Done;
                            return None;
                        }
                        Err(e) => {
                            self.state = State::Done;
                            return Some(Err(e));
                        }
                    }
                }
                State::Walking(walk) => {
                    if let Some(item) = walk.queued.pop_front() {
                        return Some(item);
                    }
                    let Some(frame) = walk.stack.pop() else {
                        self.state = State::Done;
                        return None;
                    };
                    walk.visit(frame, self.max_depth);
                }
                State::Done => return None,
            }
        }
    }
}
