//! Stream handles returned by `open`

use crate::error::VfsResult;
use crate::name::Name;
use crate::provider::FileProvider;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use tracing::{trace, warn};

/// A readable, writable, seekable handle on one file.
///
/// Streams are `Send` but not `Sync`: a handle belongs to one thread at a
/// time and must not be shared.
pub trait VfsStream: Read + Write + Seek + Send {
    /// Commit buffered content and report any error.
    ///
    /// Dropping a stream without calling `close` still commits, but errors
    /// can then only be logged.
    fn close(self: Box<Self>) -> VfsResult<()>;

    /// Give up on the stream without committing anything that is still
    /// buffered. Native streams have already written through and are
    /// simply dropped.
    fn abort(self: Box<Self>) {}
}

/// Boxed stream as handed out by providers and the facade
pub type Stream = Box<dyn VfsStream>;

/// In-memory stream that emulates streaming on top of whole-file I/O.
///
/// Readers hold the complete file content. Writers buffer everything and
/// hand it to the provider in one `write_file` call when closed or dropped.
pub struct BufferedStream {
    name: Name,
    buffer: Cursor<Vec<u8>>,
    sink: Option<Arc<dyn FileProvider>>,
    closed: bool,
}

impl BufferedStream {
    /// Read-only stream over already loaded content.
    pub fn reader(name: Name, content: Vec<u8>) -> Self {
        Self {
            name,
            buffer: Cursor::new(content),
            sink: None,
            closed: false,
        }
    }

    /// Writable stream seeded with `initial` content, positioned at its end.
    pub fn writer(provider: Arc<dyn FileProvider>, name: Name, initial: Vec<u8>) -> Self {
        let mut buffer = Cursor::new(initial);
        buffer.set_position(buffer.get_ref().len() as u64);
        Self {
            name,
            buffer,
            sink: Some(provider),
            closed: false,
        }
    }

    /// Bytes currently held by the stream
    pub fn len(&self) -> usize {
        self.buffer.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.get_ref().is_empty()
    }

    fn commit(&mut self) -> VfsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match &self.sink {
            Some(provider) => {
                trace!(target: "skein::vfs", name = %self.name, bytes = self.len(), "Writing back buffered stream");
                provider.write_file(&self.name, self.buffer.get_ref(), true)
            }
            None => Ok(()),
        }
    }
}

impl Read for BufferedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buffer.read(buf)
    }
}

impl Write for BufferedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.sink.is_none() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} was opened read-only", self.name),
            ));
        }
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for BufferedStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl VfsStream for BufferedStream {
    fn close(mut self: Box<Self>) -> VfsResult<()> {
        self.commit()
    }

    fn abort(mut self: Box<Self>) {
        if self.sink.is_some() && !self.closed {
            trace!(target: "skein::vfs", name = %self.name, bytes = self.len(), "Discarding buffered stream");
        }
        self.closed = true;
    }
}

impl Drop for BufferedStream {
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            warn!(target: "skein::vfs", name = %self.name, error = %e, "Buffered stream write-back failed");
        }
    }
}
