// linetail - platform/fs.rs
//
// File identity queries.
//
// Rotation detection hinges on one question: is the file currently at a
// given path still the file our open handle refers to? The answer is the
// (inode, device) pair, obtained by stat on the path and fstat on the
// handle. Everything else in the crate compares identities, never raw
// inodes.

use std::fs::Metadata;
use std::io;
use std::path::Path;

/// Identity of a file on disk, used to decide whether "the file at this
/// path" is still the file an open handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    /// Inode number (or the closest platform equivalent).
    pub inode: u64,
    /// Device the file lives on.
    pub device: u64,
}

/// Extract the identity carried by an already-obtained `Metadata`.
///
/// Platform behaviour:
/// - **Unix**: real inode and device numbers from the stat result.
/// - **Other platforms**: no stable inode is exposed through std, so the
///   creation timestamp stands in for the inode (a replacement file at the
///   same path gets a fresh creation time) and the device is reported as 0.
///   Rotation detection degrades gracefully but is not byte-perfect there.
pub fn identity_of_metadata(md: &Metadata) -> FileIdentity {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        FileIdentity {
            inode: md.ino(),
            device: md.dev(),
        }
    }
    #[cfg(not(unix))]
    {
        let created = md
            .created()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        FileIdentity {
            inode: created,
            device: 0,
        }
    }
}

/// Stat `path` and return its identity.
pub fn identity_of_path(path: &Path) -> io::Result<FileIdentity> {
    Ok(identity_of_metadata(&std::fs::metadata(path)?))
}
