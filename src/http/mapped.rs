use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

/// Read-only memory mapping of a file being served.
///
/// The mapping is released when the value is dropped, so holding it in an
/// `Option` and taking it out is enough to unmap on any path.
pub struct MappedFile {
    map: Mmap,
    path: PathBuf,
}

impl MappedFile {
    /// Maps `path` read-only. Zero-length files cannot be mapped and are
    /// rejected with `InvalidInput`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot map an empty file",
            ));
        }

        // SAFETY: the mapping is read-only and only ever exposed as `&[u8]`.
        // Files under the document root are not expected to be truncated while
        // being served.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self {
            map,
            path: path.to_path_buf(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.path)
            .field("len", &self.map.len())
            .finish()
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        tracing::trace!(path = %self.path.display(), "unmapping file");
    }
}
