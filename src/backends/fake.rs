//! In-memory file system for tests and fixtures.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backends::base_name;
use crate::traits::ensure_layer;
use crate::types::{LOCATION_SEPARATOR, ROOT_LOCATION, type_indicators};
use crate::{
    Context, EntryCache, FileEntry, FileEntryType, FileObject, FileSystem, FileSystemProvider,
    PathSpec, Stat, VfsError,
};

/// Builds a [`FakeFileSystem`].
///
/// Locations are absolute; missing parent directories are created. Entries
/// are listed sorted by name and numbered in insertion order from 1 (the
/// root) upwards.
///
/// # Example
///
/// ```rust
/// use nestvfs::{FakeFileSystemBuilder, FileSystem, PathSpec};
///
/// let fs = FakeFileSystemBuilder::new()
///     .add_file("/var/log/syslog", "Jan  1 00:00:00 boot\n")
///     .add_link("/var/log/current", "/var/log/syslog")
///     .build();
///
/// let entry = fs.file_entry_by_path_spec(&PathSpec::fake("/var/log")?)?.unwrap();
/// assert_eq!(entry.sub_file_entries()?.len(), 2);
/// # Ok::<(), nestvfs::VfsError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FakeFileSystemBuilder {
    tree: Tree,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
    by_location: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
struct Node {
    location: String,
    entry_type: FileEntryType,
    data: Arc<[u8]>,
    link_target: Option<String>,
    children: Vec<usize>,
}

impl Default for FakeFileSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeFileSystemBuilder {
    /// A tree holding only the root directory.
    pub fn new() -> Self {
        let root = Node {
            location: ROOT_LOCATION.to_string(),
            entry_type: FileEntryType::Directory,
            data: Arc::from(Vec::new()),
            link_target: None,
            children: Vec::new(),
        };
        Self {
            tree: Tree {
                nodes: vec![root],
                by_location: HashMap::from([(ROOT_LOCATION.to_string(), 0)]),
            },
        }
    }

    /// Adds a directory.
    pub fn add_directory(mut self, location: &str) -> Self {
        self.tree.insert(location, FileEntryType::Directory, Vec::new(), None);
        self
    }

    /// Adds a regular file with its contents.
    pub fn add_file(mut self, location: &str, data: impl Into<Vec<u8>>) -> Self {
        self.tree.insert(location, FileEntryType::File, data.into(), None);
        self
    }

    /// Adds a symbolic link. The target is recorded, never resolved.
    pub fn add_link(mut self, location: &str, target: &str) -> Self {
        self.tree
            .insert(location, FileEntryType::Link, Vec::new(), Some(target.to_string()));
        self
    }

    /// Finishes the tree.
    pub fn build(self) -> FakeFileSystem {
        FakeFileSystem {
            tree: Arc::new(self.tree),
        }
    }
}

impl Tree {
    fn insert(
        &mut self,
        location: &str,
        entry_type: FileEntryType,
        data: Vec<u8>,
        link_target: Option<String>,
    ) -> usize {
        let location = normalize(location);
        if let Some(&index) = self.by_location.get(&location) {
            let node = &mut self.nodes[index];
            node.entry_type = entry_type;
            node.data = Arc::from(data);
            node.link_target = link_target;
            return index;
        }

        let parent = match location.rfind(LOCATION_SEPARATOR) {
            Some(0) | None => 0,
            Some(end) => match self.by_location.get(&location[..end]) {
                Some(&index) => index,
                None => self.insert(&location[..end], FileEntryType::Directory, Vec::new(), None),
            },
        };

        let index = self.nodes.len();
        self.nodes.push(Node {
            location: location.clone(),
            entry_type,
            data: Arc::from(data),
            link_target,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        self.by_location.insert(location, index);
        index
    }

    fn lookup(&self, path_spec: &PathSpec) -> Option<usize> {
        match path_spec.inode() {
            Some(inode) => {
                let index = usize::try_from(inode.checked_sub(1)?).ok()?;
                (index < self.nodes.len()).then_some(index)
            }
            None => self
                .by_location
                .get(&normalize(path_spec.location()?))
                .copied(),
        }
    }
}

fn normalize(location: &str) -> String {
    let trimmed = location.trim_matches(LOCATION_SEPARATOR);
    format!("{LOCATION_SEPARATOR}{trimmed}")
}

/// In-memory tree exposed as the `FAKE` layer.
///
/// Cloning shares the tree. The file system is its own provider: register it
/// with [`Resolver::register_file_system`](crate::Resolver::register_file_system).
/// File objects of `FAKE` specs are served through entry data streams.
#[derive(Debug, Clone)]
pub struct FakeFileSystem {
    tree: Arc<Tree>,
}

impl FakeFileSystem {
    fn entry(&self, index: usize) -> Result<Arc<dyn FileEntry>, VfsError> {
        let node = &self.tree.nodes[index];
        let path_spec = PathSpec::fake(node.location.clone())?;
        Ok(Arc::new(FakeFileEntry {
            tree: Arc::clone(&self.tree),
            index,
            path_spec,
            cache: EntryCache::new(),
        }))
    }
}

impl FileSystem for FakeFileSystem {
    fn type_indicator(&self) -> &'static str {
        type_indicators::FAKE
    }

    fn root_file_entry(&self) -> Result<Arc<dyn FileEntry>, VfsError> {
        self.entry(0)
    }

    fn file_entry_by_path_spec(
        &self,
        path_spec: &PathSpec,
    ) -> Result<Option<Arc<dyn FileEntry>>, VfsError> {
        ensure_layer(type_indicators::FAKE, path_spec)?;
        self.tree
            .lookup(path_spec)
            .map(|index| self.entry(index))
            .transpose()
    }

    fn file_entry_exists_by_path_spec(&self, path_spec: &PathSpec) -> Result<bool, VfsError> {
        ensure_layer(type_indicators::FAKE, path_spec)?;
        Ok(self.tree.lookup(path_spec).is_some())
    }

    fn path_spec_for_location(&self, location: &str) -> Result<PathSpec, VfsError> {
        PathSpec::fake(location)
    }
}

impl FileSystemProvider for FakeFileSystem {
    fn type_indicator(&self) -> &'static str {
        type_indicators::FAKE
    }

    fn open_file_system(
        &self,
        _context: &Context,
        path_spec: &PathSpec,
    ) -> Result<Arc<dyn FileSystem>, VfsError> {
        ensure_layer(type_indicators::FAKE, path_spec)?;
        Ok(Arc::new(self.clone()))
    }
}

/// An entry of a [`FakeFileSystem`].
pub struct FakeFileEntry {
    tree: Arc<Tree>,
    index: usize,
    path_spec: PathSpec,
    cache: EntryCache,
}

impl FakeFileEntry {
    fn node(&self) -> &Node {
        &self.tree.nodes[self.index]
    }
}

impl FileEntry for FakeFileEntry {
    fn name(&self) -> &str {
        base_name(&self.node().location)
    }

    fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    fn stat(&self) -> Result<&Stat, VfsError> {
        self.cache.stat_or_init(|| {
            let node = self.node();
            let mut stat = Stat::new(node.entry_type);
            stat.size = node.data.len() as u64;
            stat.inode = Some(self.index as u64 + 1);
            Ok(stat)
        })
    }

    fn sub_file_entries(&self) -> Result<&[Arc<dyn FileEntry>], VfsError> {
        self.cache.children_or_init(|| {
            let file_system = FakeFileSystem {
                tree: Arc::clone(&self.tree),
            };
            let nodes = &self.tree.nodes;
            let mut children = self.node().children.clone();
            children.sort_by(|&a, &b| {
                base_name(&nodes[a].location).cmp(base_name(&nodes[b].location))
            });
            children
                .into_iter()
                .map(|index| file_system.entry(index))
                .collect()
        })
    }

    fn data_stream(&self) -> Result<Box<dyn FileObject>, VfsError> {
        let node = self.node();
        if node.entry_type == FileEntryType::Directory {
            return Err(VfsError::NotSupported {
                operation: "data_stream on a directory",
            });
        }
        Ok(Box::new(FakeFileObject {
            path_spec: self.path_spec.clone(),
            data: Arc::clone(&node.data),
        }))
    }

    fn link_target(&self) -> Result<Option<String>, VfsError> {
        Ok(self.node().link_target.clone())
    }
}

struct FakeFileObject {
    path_spec: PathSpec,
    data: Arc<[u8]>,
}

impl FileObject for FakeFileObject {
    fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
        let len = self.data.len();
        let start = usize::try_from(offset).map_or(len, |o| o.min(len));
        let n = buf.len().min(len - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> Result<u64, VfsError> {
        Ok(self.data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FakeFileSystem {
        FakeFileSystemBuilder::new()
            .add_directory("/A")
            .add_file("/A/b.txt", "bee")
            .add_link("/A/c", "/A/b.txt")
            .build()
    }

    fn names(entries: &[Arc<dyn FileEntry>]) -> Vec<&str> {
        entries.iter().map(|e| e.name()).collect()
    }

    #[test]
    fn children_listed_by_name() {
        let fs = sample();
        let root = fs.root_file_entry().unwrap();
        assert_eq!(root.name(), "");
        assert_eq!(names(root.sub_file_entries().unwrap()), ["A"]);

        let a = &root.sub_file_entries().unwrap()[0];
        assert_eq!(names(a.sub_file_entries().unwrap()), ["b.txt", "c"]);
    }

    #[test]
    fn listing_order_ignores_insertion_order() {
        let fs = FakeFileSystemBuilder::new()
            .add_file("/readme.txt", "")
            .add_file("/log2.gz", "")
            .add_file("/log1.gz", "")
            .build();
        let root = fs.root_file_entry().unwrap();
        assert_eq!(
            names(root.sub_file_entries().unwrap()),
            ["log1.gz", "log2.gz", "readme.txt"]
        );
        // inodes keep insertion order
        let log1 = fs
            .file_entry_by_path_spec(&PathSpec::fake("/log1.gz").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(log1.stat().unwrap().inode, Some(4));
    }

    #[test]
    fn missing_parents_are_created() {
        let fs = FakeFileSystemBuilder::new().add_file("/x/y/z", "").build();
        let y = fs
            .file_entry_by_path_spec(&PathSpec::fake("/x/y").unwrap())
            .unwrap()
            .unwrap();
        assert!(y.is_directory().unwrap());
    }

    #[test]
    fn inode_lookup_wins_over_location() {
        let fs = sample();
        let spec = PathSpec::fake_inode(3).unwrap();
        let entry = fs.file_entry_by_path_spec(&spec).unwrap().unwrap();
        assert_eq!(entry.path_spec().location(), Some("/A/b.txt"));
        assert_eq!(entry.stat().unwrap().inode, Some(3));

        assert!(fs.file_entry_by_path_spec(&PathSpec::fake_inode(99).unwrap()).unwrap().is_none());
        assert!(fs.file_entry_by_path_spec(&PathSpec::fake_inode(0).unwrap()).unwrap().is_none());
    }

    #[test]
    fn link_records_target() {
        let fs = sample();
        let link = fs
            .file_entry_by_path_spec(&PathSpec::fake("/A/c").unwrap())
            .unwrap()
            .unwrap();
        assert!(link.is_link().unwrap());
        assert_eq!(link.link_target().unwrap().as_deref(), Some("/A/b.txt"));
    }

    #[test]
    fn file_data_is_readable() {
        let fs = sample();
        let file = fs
            .file_entry_by_path_spec(&PathSpec::fake("/A/b.txt").unwrap())
            .unwrap()
            .unwrap();
        let data = file.data_stream().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(data.read_at(1, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ee");
        assert_eq!(data.read_at(42, &mut buf).unwrap(), 0);
    }

    #[test]
    fn foreign_spec_is_rejected() {
        let fs = sample();
        assert!(matches!(
            fs.file_entry_by_path_spec(&PathSpec::os("/A").unwrap()),
            Err(VfsError::InvalidArgument { .. })
        ));
    }
}
