//! Facade: the single entry point for file operations
//!
//! `Vfs` resolves a name's scheme to a provider and forwards the call. It
//! also owns the behavior that works across providers: stream emulation on
//! top of whole-file I/O, generic copying between any two schemes and
//! hint-based file lookup.

use crate::config;
use crate::error::{Status, VfsError, VfsResult};
use crate::name::{Name, CONTAINER_MARKER};
use crate::provider::{DirFlags, FileProvider, OpenMode};
use crate::providers;
use crate::registry::Registry;
use crate::stream::{BufferedStream, Stream};
use once_cell::sync::Lazy;
use std::io::{self, Read, Write};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace, warn};

static GLOBAL_VFS: Lazy<Vfs> = Lazy::new(|| {
    providers::init();
    Vfs::new(Arc::clone(Registry::global()))
});

/// Uniform file operations over every registered provider.
///
/// Cloning is cheap; clones share the registry.
///
/// # Example
/// ```
/// use skein_vfs::{Name, Vfs};
///
/// let vfs = Vfs::with_builtin_providers();
/// let name = Name::parse("mem://notes/today.txt");
/// vfs.save_file(&name, b"hello", true).unwrap();
/// assert_eq!(vfs.load_file(&name).unwrap(), b"hello");
/// ```
#[derive(Clone, Debug)]
pub struct Vfs {
    registry: Arc<Registry>,
}

/// Non-owning handle on a [`Vfs`], held by providers that call back into
/// the facade.
#[derive(Clone, Debug)]
pub struct WeakVfs {
    registry: Weak<Registry>,
}

impl WeakVfs {
    /// Upgrade to a usable facade
    pub fn upgrade(&self) -> VfsResult<Vfs> {
        self.registry
            .upgrade()
            .map(Vfs::new)
            .ok_or_else(|| VfsError::other("provider registry has been dropped"))
    }
}

impl Vfs {
    /// Facade over an explicit registry
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The process-wide facade.
    ///
    /// Built-in providers are registered on first use.
    pub fn global() -> &'static Vfs {
        &GLOBAL_VFS
    }

    /// Fresh registry with every built-in provider registered
    pub fn with_builtin_providers() -> Self {
        let registry = Arc::new(Registry::new());
        providers::register_builtin(&registry);
        Self::new(registry)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn downgrade(&self) -> WeakVfs {
        WeakVfs {
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Provider responsible for `name`
    pub fn resolve(&self, name: &Name) -> VfsResult<Arc<dyn FileProvider>> {
        self.registry.resolve(name).inspect_err(|e| {
            error!(target: "skein::vfs", name = %name, error = %e, "Cannot resolve provider");
        })
    }

    /// Read a whole file.
    ///
    /// Failures are logged and returned; an empty vector always means an
    /// empty file.
    pub fn load_file(&self, name: &Name) -> VfsResult<Vec<u8>> {
        trace!(target: "skein::vfs", name = %name, "load_file");
        let provider = self.resolve(name)?;
        provider.read_file(name).inspect_err(|e| {
            warn!(target: "skein::vfs", name = %name, error = %e, "Failed to load file");
        })
    }

    /// Read a whole file as text (invalid UTF-8 is replaced)
    pub fn get_file_contents(&self, name: &Name) -> VfsResult<String> {
        let bytes = self.load_file(name)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write a whole file
    pub fn save_file(&self, name: &Name, content: &[u8], overwrite: bool) -> VfsResult<()> {
        trace!(target: "skein::vfs", name = %name, bytes = content.len(), overwrite, "save_file");
        let provider = self.resolve(name)?;
        provider.write_file(name, content, overwrite).inspect_err(|e| {
            warn!(target: "skein::vfs", name = %name, error = %e, "Failed to save file");
        })
    }

    /// Open a stream.
    ///
    /// Uses the provider's native stream when it has one. Otherwise the
    /// stream is emulated in memory: reads load the file once, writes are
    /// buffered and stored with a single `write_file` when the stream is
    /// closed or dropped, appends load the existing content first.
    pub fn open(&self, name: &Name, mode: OpenMode) -> VfsResult<Stream> {
        let provider = self.resolve(name)?;
        match provider.open(name, mode) {
            Ok(stream) => return Ok(stream),
            Err(e) if e.status() == Status::Unsupported => {}
            Err(e) => {
                warn!(target: "skein::vfs", name = %name, ?mode, error = %e, "Failed to open stream");
                return Err(e);
            }
        }

        debug!(target: "skein::vfs", name = %name, ?mode, "Emulating stream over whole-file I/O");
        match mode {
            OpenMode::Read => {
                let content = provider.read_file(name)?;
                Ok(Box::new(BufferedStream::reader(name.clone(), content)))
            }
            OpenMode::Write => Ok(Box::new(BufferedStream::writer(
                provider,
                name.clone(),
                Vec::new(),
            ))),
            OpenMode::Append => {
                let existing = match provider.read_file(name) {
                    Ok(content) => content,
                    Err(e) if e.is_not_found() => Vec::new(),
                    Err(e) => return Err(e),
                };
                Ok(Box::new(BufferedStream::writer(provider, name.clone(), existing)))
            }
        }
    }

    pub fn open_for_reading(&self, name: &Name) -> VfsResult<Stream> {
        self.open(name, OpenMode::Read)
    }

    pub fn open_for_writing(&self, name: &Name) -> VfsResult<Stream> {
        self.open(name, OpenMode::Write)
    }

    pub fn open_for_appending(&self, name: &Name) -> VfsResult<Stream> {
        self.open(name, OpenMode::Append)
    }

    pub fn exists(&self, name: &Name) -> VfsResult<bool> {
        Ok(self.resolve(name)?.exists(name))
    }

    pub fn is_file(&self, name: &Name) -> VfsResult<bool> {
        Ok(self.resolve(name)?.is_file(name))
    }

    pub fn is_dir(&self, name: &Name) -> VfsResult<bool> {
        Ok(self.resolve(name)?.is_dir(name))
    }

    pub fn file_size(&self, name: &Name) -> VfsResult<u64> {
        Ok(self.resolve(name)?.file_size(name))
    }

    /// List a directory
    pub fn dir(&self, name: &Name, flags: DirFlags) -> VfsResult<Vec<Name>> {
        trace!(target: "skein::vfs", name = %name, flags = flags.bits(), "dir");
        self.resolve(name)?.dir(name, flags).inspect_err(|e| {
            warn!(target: "skein::vfs", name = %name, error = %e, "Failed to list directory");
        })
    }

    /// Create a directory, with its parents when `recursive`
    pub fn create_dir(&self, name: &Name, recursive: bool) -> VfsResult<()> {
        let provider = self.resolve(name)?;
        let result = if recursive {
            provider.make_dir_recursive(name)
        } else {
            provider.make_dir(name)
        };
        result.inspect_err(|e| {
            warn!(target: "skein::vfs", name = %name, error = %e, "Failed to create directory");
        })
    }

    /// Remove a file or directory, with its contents when `recursive`
    pub fn remove(&self, name: &Name, recursive: bool) -> VfsResult<()> {
        let provider = self.resolve(name)?;
        let result = if recursive {
            provider.remove_recursive(name)
        } else {
            provider.remove(name)
        };
        result.inspect_err(|e| {
            warn!(target: "skein::vfs", name = %name, error = %e, "Failed to remove");
        })
    }

    /// Copy a file between any two registered schemes.
    ///
    /// Streams `src` into `dst` in fixed-size blocks and returns the number
    /// of bytes copied.
    pub fn copy_file(&self, src: &Name, dst: &Name) -> VfsResult<u64> {
        if src == dst {
            return Err(VfsError::invalid_name(
                dst.to_canonical_string(),
                "source and destination are the same file",
            ));
        }
        debug!(target: "skein::vfs", src = %src, dst = %dst, "copy_file");

        let mut reader = self.open_for_reading(src)?;
        let mut writer = self.open_for_writing(dst)?;
        let total = match pump(&mut reader, &mut writer) {
            Ok(total) => total,
            Err(e) => {
                // Buffered destinations keep their previous content
                writer.abort();
                warn!(target: "skein::vfs", src = %src, dst = %dst, error = %e, "copy_file aborted");
                return Err(e);
            }
        };
        writer.close()?;
        reader.close()?;
        trace!(target: "skein::vfs", bytes = total, "copy_file done");
        Ok(total)
    }

    /// Find a file, probing search hints when the literal name is absent.
    ///
    /// For every hint the file is tried under `hint + directory` (relative
    /// directories only), then directly under `hint`. A name that points
    /// into a container first locates the container itself through the
    /// same search, then retries the inner path inside the container found.
    pub fn find_file<S: AsRef<str>>(&self, name: &Name, hints: &[S]) -> VfsResult<Option<Name>> {
        if self.is_file(name)? {
            return Ok(Some(name.clone()));
        }

        if let Some((outer, inner)) = name.container_split() {
            let outer = Name::parse(&outer);
            let Some(found) = self.find_file(&outer, hints)? else {
                return Ok(None);
            };
            let candidate = Name::from_scheme_path(
                name.scheme(),
                &format!("{}{}{}", found.to_short_string(), CONTAINER_MARKER, inner),
            );
            trace!(target: "skein::vfs", candidate = %candidate, "find_file container candidate");
            return Ok(self.is_file(&candidate)?.then_some(candidate));
        }

        for hint in hints {
            let mut hint_dir = hint.as_ref().replace('\\', "/");
            if !hint_dir.is_empty() && !hint_dir.ends_with('/') {
                hint_dir.push('/');
            }

            if name.is_relative() && !name.directory().is_empty() {
                let candidate = name.with_directory(format!("{}{}", hint_dir, name.directory()));
                if self.is_file(&candidate)? {
                    return Ok(Some(candidate));
                }
            }

            let candidate = name.with_directory(hint_dir);
            if self.is_file(&candidate)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Flush every provider instantiated so far.
    ///
    /// All providers are flushed even when one fails; the first error is
    /// returned.
    pub fn flush(&self) -> VfsResult<()> {
        let mut first_error = None;
        for (scheme, provider) in self.registry.instances() {
            if let Err(e) = provider.flush() {
                warn!(target: "skein::vfs", scheme, error = %e, "Flush failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Flush the provider of one scheme
    pub fn flush_scheme(&self, scheme: &str) -> VfsResult<()> {
        self.registry.resolve_scheme(scheme)?.flush()
    }
}

/// Block-copy `reader` into `writer`, returning the byte count
fn pump(reader: &mut Stream, writer: &mut Stream) -> VfsResult<u64> {
    let mut block = vec![0u8; config::config().copy_block_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut block) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(VfsError::Io(e)),
        };
        writer.write_all(&block[..n])?;
        total += n as u64;
    }
}
