use std::path::PathBuf;

use thiserror::Error;

use crate::build_id::BuildId;

/// The error type used by this crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error while reading {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("File is malformed: {0}")]
    FileMalformed(&'static str),

    #[error("Object parse error: {0}")]
    ObjectParseError(#[from] object::read::Error),

    #[error("No symbol table (.symtab or .dynsym) in {0}")]
    NoSymbolTable(PathBuf),

    #[error("No NT_GNU_BUILD_ID note in {0}")]
    NoBuildIdSection(PathBuf),

    #[error("Build ID mismatch for {path}: expected {expected}, found {found:?}")]
    BuildIdMismatch {
        path: PathBuf,
        expected: BuildId,
        found: Option<BuildId>,
    },

    #[error("Zip archive error in {0}: {1}")]
    ZipError(PathBuf, #[source] zip::result::ZipError),

    #[error("No entry named {entry} in archive {archive}")]
    NoSuchZipEntry { archive: PathBuf, entry: String },

    #[error("Not a valid container path (expected 'archive!/entry' form): {0}")]
    InvalidContainerPath(String),

    #[error("Invalid DEX header at offset {0:#x} in {1}")]
    InvalidDexHeader(u64, PathBuf),

    #[error("symfs directory does not exist or is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Invariant violated: {0}")]
    Fatal(&'static str),

    #[error("record file error: {0}")]
    RecordFile(#[from] linux_perf_data::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// A stable, short tag for this error kind, independent of the
    /// interpolated message. Used in log lines and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::FileNotFound(_) => "FILE_NOT_FOUND",
            Error::Io(_, _) => "IO_ERROR",
            Error::FileMalformed(_) => "FILE_MALFORMED",
            Error::ObjectParseError(_) => "FILE_MALFORMED",
            Error::NoSymbolTable(_) => "NO_SYMBOL_TABLE",
            Error::NoBuildIdSection(_) => "NO_BUILD_ID_SECTION",
            Error::BuildIdMismatch { .. } => "BUILD_ID_MISMATCH",
            Error::ZipError(_, _) => "FILE_MALFORMED",
            Error::NoSuchZipEntry { .. } => "FILE_NOT_FOUND",
            Error::InvalidContainerPath(_) => "FILE_MALFORMED",
            Error::InvalidDexHeader(_, _) => "FILE_MALFORMED",
            Error::NotADirectory(_) => "IO_ERROR",
            Error::Fatal(_) => "FATAL",
            Error::RecordFile(_) => "FATAL",
        }
    }
}
