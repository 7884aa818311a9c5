//! Platform-stable file identity resolution.
//!
//! Two paths are hardlinks of each other iff their identities are equal.
//! On POSIX systems the identity is the (device, inode) pair from `lstat`;
//! on Windows/NTFS it is the (volume serial, 64-bit file index) pair from
//! `GetFileInformationByHandle`. The platform variant is selected at build
//! time; the enum exists so both forms round-trip through the scan-result
//! JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::AccessError;

/// Stable identity of the physical data a path points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileIdentity {
    /// POSIX (device id, inode) pair.
    Posix {
        /// Device id from `st_dev`.
        dev: u64,
        /// Inode number from `st_ino`.
        inode: u64,
    },
    /// NTFS (volume serial, file index) pair.
    Ntfs {
        /// Volume serial number.
        #[serde(rename = "volSerial")]
        vol_serial: u32,
        /// 64-bit MFT file index (high << 32 | low).
        #[serde(rename = "fileIndex")]
        file_index: u64,
    },
}

/// Resolve the identity of the file at `path`.
///
/// Symlinks are not followed: the identity describes the link entry the
/// scanner actually saw. Called once per candidate file per scan; the result
/// is cached on the [`super::FileRecord`].
///
/// # Errors
///
/// Returns [`AccessError`] when the underlying stat (or handle open on
/// Windows) fails.
#[cfg(unix)]
pub fn resolve_identity(path: &Path) -> Result<FileIdentity, AccessError> {
    let metadata = std::fs::symlink_metadata(path).map_err(|e| AccessError::from_io(path, e))?;
    Ok(identity_from_metadata(&metadata))
}

/// Extract the identity from already-fetched metadata (POSIX only).
///
/// Lets the bucketer reuse the stat it already performed instead of
/// stat-ing every candidate twice.
#[cfg(unix)]
#[must_use]
pub fn identity_from_metadata(metadata: &std::fs::Metadata) -> FileIdentity {
    use std::os::unix::fs::MetadataExt;
    FileIdentity::Posix {
        dev: metadata.dev(),
        inode: metadata.ino(),
    }
}

#[cfg(windows)]
pub fn resolve_identity(path: &Path) -> Result<FileIdentity, AccessError> {
    use std::os::windows::ffi::OsStrExt;
    use std::ptr;
    use winapi::um::fileapi::{
        CreateFileW, GetFileInformationByHandle, BY_HANDLE_FILE_INFORMATION, OPEN_EXISTING,
    };
    use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
    use winapi::um::winnt::{FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE};

    // FILE_FLAG_BACKUP_SEMANTICS so directories and reparse points can be
    // opened too; access mode 0 queries metadata without a read grant.
    const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    unsafe {
        let handle = CreateFileW(
            wide.as_ptr(),
            0,
            FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
            ptr::null_mut(),
            OPEN_EXISTING,
            FILE_FLAG_BACKUP_SEMANTICS,
            ptr::null_mut(),
        );
        if handle == INVALID_HANDLE_VALUE {
            return Err(AccessError::from_io(path, std::io::Error::last_os_error()));
        }

        let mut info: BY_HANDLE_FILE_INFORMATION = std::mem::zeroed();
        let ok = GetFileInformationByHandle(handle, &mut info);
        CloseHandle(handle);
        if ok == 0 {
            return Err(AccessError::from_io(path, std::io::Error::last_os_error()));
        }

        Ok(FileIdentity::Ntfs {
            vol_serial: info.dwVolumeSerialNumber,
            file_index: (u64::from(info.nFileIndexHigh) << 32) | u64::from(info.nFileIndexLow),
        })
    }
}
