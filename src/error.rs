use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::elf::ParseError;

/// Errors that abort a conversion
#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not open input ELF file {}: {}", path.display(), source)]
    OpenInput { path: PathBuf, source: io::Error },
    #[error("Invalid ELF file: {}", _0)]
    Format(#[from] ParseError),
    #[error("Could not write file {}: {}", path.display(), source)]
    WriteOutput { path: PathBuf, source: io::Error },
}

impl Error {
    /// Returns the process exit code for the error
    ///
    /// I/O failures exit with 255, which is what the Realtek tools report as -1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Format(_) => 2,
            Error::OpenInput { .. } | Error::WriteOutput { .. } => 255,
        }
    }
}
