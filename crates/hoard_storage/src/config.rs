//! File store configuration.

/// Configuration for opening a [`FileStore`](crate::FileStore).
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync namespace files on every write (safer but slower).
    pub sync_on_write: bool,

    /// Whether to pretty-print namespace files.
    pub pretty: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            pretty: false,
        }
    }
}

impl FileStoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets whether to pretty-print namespace files.
    #[must_use]
    pub const fn pretty(mut self, value: bool) -> Self {
        self.pretty = value;
        self
    }
}
