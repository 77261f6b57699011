//! Durable sync primitives
//!
//! `sync_file` maps to the strongest data-durability call each platform
//! offers. `sync_dir` makes a rename inside a directory durable.

use std::fs::File;
use std::io;
use std::path::Path;

/// Block until the file's data reaches persistent storage.
///
/// The caller must not hold locks that readers need: this can block for
/// milliseconds under heavy I/O.
pub fn sync_file(file: &File) -> io::Result<()> {
    platform_sync(file)
}

/// Sync a directory entry list so that renames and unlinks inside it persist.
///
/// A no-op on Windows, where directories cannot be opened for syncing.
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let handle = File::open(dir)?;
        handle.sync_all()
    }

    #[cfg(not(unix))]
    {
        let _ = dir;
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn platform_sync(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    // fdatasync skips metadata (mtime), which journal replay never reads.
    // SAFETY: the descriptor comes from a live `File` borrowed for the call.
    let rc = unsafe { libc::fdatasync(file.as_raw_fd()) };
    if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn platform_sync(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    // Plain fsync stops at the drive's volatile cache on Apple platforms.
    // SAFETY: the descriptor comes from a live `File` borrowed for the call.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) };
    if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
}

#[cfg(target_os = "windows")]
fn platform_sync(file: &File) -> io::Result<()> {
    use std::os::windows::io::AsRawHandle;
    use winapi::um::fileapi::FlushFileBuffers;
    // SAFETY: the handle comes from a live `File` borrowed for the call.
    let ok = unsafe { FlushFileBuffers(file.as_raw_handle() as *mut _) };
    if ok != 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios", target_os = "windows")))]
fn platform_sync(file: &File) -> io::Result<()> {
    file.sync_data()
}
