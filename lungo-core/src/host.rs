// lungo-core - Host abstraction
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! The host abstraction: the runtime's only I/O channel.
//!
//! The core never touches the filesystem or the standard streams
//! directly; everything goes through a [`Host`], so embedders can
//! sandbox, capture or redirect a runtime's I/O. [`StdHost`] is the
//! default implementation over `std`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};

/// An opaque handle to a host file or stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u64);

/// Mode for [`Host::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
}

/// Host services consumed by the runtime.
pub trait Host {
    /// Open a file. `None` when the file cannot be opened.
    fn open(&mut self, path: &str, mode: FileMode) -> Option<FileId>;

    /// Read one byte. `None` at end of file.
    fn read(&mut self, file: FileId) -> Option<u8>;

    /// Write bytes.
    fn write(&mut self, file: FileId, bytes: &[u8]);

    /// Close a previously opened file. Closing the standard streams is a
    /// no-op.
    fn close(&mut self, file: FileId);

    /// The standard input stream.
    fn stdin(&self) -> FileId;

    /// The standard output stream.
    fn stdout(&self) -> FileId;
}

const STDIN: FileId = FileId(0);
const STDOUT: FileId = FileId(1);

enum OpenFile {
    Reader(BufReader<File>),
    Writer(File),
}

/// [`Host`] implementation over `std::fs` and the process streams.
pub struct StdHost {
    files: HashMap<u64, OpenFile>,
    next_id: u64,
}

impl StdHost {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            next_id: 2,
        }
    }
}

impl Default for StdHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for StdHost {
    fn open(&mut self, path: &str, mode: FileMode) -> Option<FileId> {
        let file = match mode {
            FileMode::Read => OpenFile::Reader(BufReader::new(File::open(path).ok()?)),
            FileMode::Write => OpenFile::Writer(File::create(path).ok()?),
        };
        let id = self.next_id;
        self.next_id += 1;
        self.files.insert(id, file);
        Some(FileId(id))
    }

    fn read(&mut self, file: FileId) -> Option<u8> {
        let mut byte = [0u8; 1];
        let count = if file == STDIN {
            std::io::stdin().read(&mut byte).ok()?
        } else {
            match self.files.get_mut(&file.0)? {
                OpenFile::Reader(reader) => reader.read(&mut byte).ok()?,
                OpenFile::Writer(_) => return None,
            }
        };
        if count == 0 { None } else { Some(byte[0]) }
    }

    fn write(&mut self, file: FileId, bytes: &[u8]) {
        if file == STDOUT {
            let mut out = std::io::stdout();
            let _ = out.write_all(bytes);
            let _ = out.flush();
            return;
        }
        if let Some(OpenFile::Writer(f)) = self.files.get_mut(&file.0) {
            let _ = f.write_all(bytes);
        }
    }

    fn close(&mut self, file: FileId) {
        self.files.remove(&file.0);
    }

    fn stdin(&self) -> FileId {
        STDIN
    }

    fn stdout(&self) -> FileId {
        STDOUT
    }
}
