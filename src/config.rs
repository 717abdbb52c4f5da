use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::OpenFlags;

use crate::plugin::ConnectionPlugin;
use crate::types::{DisplayMode, RowShape, ValueTyping};

/// Name that selects an in-memory database.
pub const MEMORY_DATABASE: &str = ":memory:";

/// Options for opening a [`Connection`](crate::Connection).
///
/// # Examples
/// ```rust
/// use sqlite_bridge::prelude::*;
///
/// let options = OpenOptions::new()
///     .read_only(false)
///     .multithreaded(true)
///     .row_shape(RowShape::Named);
/// assert_eq!(options.display_mode().shape, RowShape::Named);
/// ```
#[derive(Clone, Default)]
pub struct OpenOptions {
    pub read_only: bool,
    /// Raw `SQLITE_OPEN_*` bits OR-ed into the computed flags.
    pub extra_flags: i32,
    /// Open in the engine's serialized (full mutex) threading mode.
    pub multithreaded: bool,
    /// Directory bare file names (no path separator) are resolved against.
    pub base_dir: Option<PathBuf>,
    /// Create missing parent directories of file databases before opening.
    pub skip_create_dirs: bool,
    pub display_mode: DisplayMode,
    pub(crate) plugins: Vec<Arc<dyn ConnectionPlugin>>,
}

impl OpenOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn extra_flags(mut self, extra_flags: i32) -> Self {
        self.extra_flags = extra_flags;
        self
    }

    #[must_use]
    pub fn multithreaded(mut self, multithreaded: bool) -> Self {
        self.multithreaded = multithreaded;
        self
    }

    #[must_use]
    pub fn base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    #[must_use]
    pub fn create_dirs(mut self, create_dirs: bool) -> Self {
        self.skip_create_dirs = !create_dirs;
        self
    }

    #[must_use]
    pub fn row_shape(mut self, shape: RowShape) -> Self {
        self.display_mode.shape = shape;
        self
    }

    #[must_use]
    pub fn value_typing(mut self, typing: ValueTyping) -> Self {
        self.display_mode.typing = typing;
        self
    }

    /// Register a plugin; its init hook runs on every open made with these options.
    #[must_use]
    pub fn plugin(mut self, plugin: Arc<dyn ConnectionPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    #[must_use]
    pub fn plugins(&self) -> &[Arc<dyn ConnectionPlugin>] {
        &self.plugins
    }

    pub(crate) fn open_flags(&self) -> OpenFlags {
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        };
        flags |= OpenFlags::SQLITE_OPEN_URI;
        flags |= if self.multithreaded {
            OpenFlags::SQLITE_OPEN_FULL_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_NO_MUTEX
        };
        flags | OpenFlags::from_bits_truncate(self.extra_flags)
    }
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plugin_names: Vec<&str> = self.plugins.iter().map(|p| p.name()).collect();
        f.debug_struct("OpenOptions")
            .field("read_only", &self.read_only)
            .field("extra_flags", &self.extra_flags)
            .field("multithreaded", &self.multithreaded)
            .field("base_dir", &self.base_dir)
            .field("skip_create_dirs", &self.skip_create_dirs)
            .field("display_mode", &self.display_mode)
            .field("plugins", &plugin_names)
            .finish()
    }
}

/// What a database name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// Private temporary on-disk database (empty name)
    Temporary,
    /// In-memory database (`:memory:`)
    Memory,
    /// `file:` URI, handed to the engine untouched
    Uri(String),
    File(PathBuf),
}

impl DatabaseTarget {
    #[must_use]
    pub fn resolve(name: &str, base_dir: Option<&Path>) -> Self {
        match name {
            "" => DatabaseTarget::Temporary,
            MEMORY_DATABASE => DatabaseTarget::Memory,
            uri if uri.starts_with("file:") => DatabaseTarget::Uri(uri.to_owned()),
            bare if !bare.contains(['/', '\\']) => match base_dir {
                Some(dir) => DatabaseTarget::File(dir.join(bare)),
                None => DatabaseTarget::File(PathBuf::from(bare)),
            },
            path => DatabaseTarget::File(PathBuf::from(path)),
        }
    }

    /// The string handed to the engine's open call.
    #[must_use]
    pub fn engine_path(&self) -> String {
        match self {
            DatabaseTarget::Temporary => String::new(),
            DatabaseTarget::Memory => MEMORY_DATABASE.to_owned(),
            DatabaseTarget::Uri(uri) => uri.clone(),
            DatabaseTarget::File(path) => path.to_string_lossy().into_owned(),
        }
    }

    /// Directory that must exist before a file database can be created.
    #[must_use]
    pub fn parent_dir(&self) -> Option<&Path> {
        match self {
            DatabaseTarget::File(path) => path.parent().filter(|p| !p.as_os_str().is_empty()),
            _ => None,
        }
    }
}

impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseTarget::Temporary => f.write_str("<temporary>"),
            other => f.write_str(&other.engine_path()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_special_names() {
        assert_eq!(DatabaseTarget::resolve("", None), DatabaseTarget::Temporary);
        assert_eq!(DatabaseTarget::resolve(":memory:", None), DatabaseTarget::Memory);
        assert_eq!(
            DatabaseTarget::resolve("file:x.db?mode=memory", Some(Path::new("/data"))),
            DatabaseTarget::Uri("file:x.db?mode=memory".into())
        );
    }

    #[test]
    fn bare_names_join_the_base_dir() {
        assert_eq!(
            DatabaseTarget::resolve("notes.db", Some(Path::new("/data/dbs"))),
            DatabaseTarget::File(PathBuf::from("/data/dbs/notes.db"))
        );
        assert_eq!(
            DatabaseTarget::resolve("sub/notes.db", Some(Path::new("/data/dbs"))),
            DatabaseTarget::File(PathBuf::from("sub/notes.db"))
        );
        assert_eq!(DatabaseTarget::resolve("notes.db", None).parent_dir(), None);
        assert_eq!(
            DatabaseTarget::resolve("/a/b/c.db", None).parent_dir(),
            Some(Path::new("/a/b"))
        );
    }

    #[test]
    fn flags_follow_options() {
        let rw = OpenOptions::new().open_flags();
        assert!(rw.contains(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE));
        assert!(rw.contains(OpenFlags::SQLITE_OPEN_NO_MUTEX));

        let ro = OpenOptions::new().read_only(true).multithreaded(true).open_flags();
        assert!(ro.contains(OpenFlags::SQLITE_OPEN_READ_ONLY));
        assert!(ro.contains(OpenFlags::SQLITE_OPEN_FULL_MUTEX));
        assert!(!ro.contains(OpenFlags::SQLITE_OPEN_CREATE));

        let shared = OpenOptions::new()
            .extra_flags(OpenFlags::SQLITE_OPEN_SHARED_CACHE.bits())
            .open_flags();
        assert!(shared.contains(OpenFlags::SQLITE_OPEN_SHARED_CACHE));
    }
}
