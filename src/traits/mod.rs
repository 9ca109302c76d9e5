//! # Capability Traits
//!
//! The contracts storage-layer backends implement.
//!
//! ## Overview
//!
//! | Trait | Implemented by | Provides |
//! |-------|----------------|----------|
//! | [`FileObject`] | raw data backends (OS file, byte range, decompressed stream) | positional reads, size |
//! | [`FileSystem`] | layer parsers (OS directory tree, archives, images) | root entry, lookup by path spec |
//! | [`FileEntry`] | the entries of a file system | stat, children, data stream |
//! | [`Decompressor`] | codecs | incremental decompression with leftover |
//!
//! ```text
//! FileObject ──parsed by──▶ FileSystem ──exposes──▶ FileEntry ──data──▶ FileObject
//! ```
//!
//! ## Thread Safety
//!
//! All traits except [`Decompressor`] require `Send + Sync` and take `&self`.
//! A decompressor belongs to one stream and takes `&mut self`.
//!
//! ## Object Safety
//!
//! All traits are object-safe; the resolver stores `Arc<dyn FileSystem>` and
//! `Arc<dyn FileObject>`.

mod decompressor;
mod file_entry;
mod file_object;
mod file_system;

pub use decompressor::{Decompressor, DecompressorConstructor, DecompressorRegistration};
pub use file_entry::{EntryCache, FileEntry};
pub use file_object::{FileObject, FileObjectReader};
pub use file_system::FileSystem;

pub(crate) use file_system::ensure_layer;
