use std::fs;
use std::io;
use std::path::PathBuf;

/// Which raw provider response is being saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Login,
    DeviceList,
}

impl PayloadKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            PayloadKind::Login => "login.json",
            PayloadKind::DeviceList => "devices.json",
        }
    }
}

/// Receives raw login and listing bodies for diagnostics.
pub trait PayloadStore: Send + Sync {
    fn save(&self, kind: PayloadKind, body: &str) -> io::Result<()>;
}

/// Writes each payload verbatim to a fixed file name inside `dir`,
/// replacing the previous copy.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PayloadStore for FileStore {
    fn save(&self, kind: PayloadKind, body: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(kind.file_name()), body)
    }
}
