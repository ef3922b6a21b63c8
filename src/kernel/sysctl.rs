//! FreeBSD kernel source backed by `sysctlbyname(3)`.
//!
//! Device statistics are read from `kern.devstat.all` directly instead of
//! through libdevstat. The record handling lives in
//! [`crate::kernel::devstat`]; this module only supplies the fetch.

use std::ffi::CString;
use std::io;
use std::ptr;

use tracing::debug;

use crate::error::KernelError;
use crate::kernel::devstat::DevstatSource;
use crate::layout::NativeLayout;

/// Retries when a sysctl grows between the size probe and the read.
const MAX_SYSCTL_ATTEMPTS: usize = 4;

/// Signature of [`sysctl_raw`].
pub type SysctlFetch = fn(&str) -> Result<Vec<u8>, KernelError>;

/// Devstat and raw sysctl queries against the running kernel.
pub type SysctlKernel = DevstatSource<SysctlFetch>;

impl SysctlKernel {
    pub fn new() -> Self {
        Self::with_fetch(sysctl_raw, NativeLayout::host())
    }
}

impl Default for SysctlKernel {
    fn default() -> Self {
        Self::new()
    }
}

fn sysctl_error(name: &str, source: io::Error) -> KernelError {
    KernelError::Sysctl {
        name: name.to_string(),
        source,
    }
}

/// Reads the raw bytes of a sysctl, probing its size first.
pub fn sysctl_raw(name: &str) -> Result<Vec<u8>, KernelError> {
    let cname = CString::new(name)
        .map_err(|e| sysctl_error(name, io::Error::new(io::ErrorKind::InvalidInput, e)))?;

    let mut attempt = 0;
    loop {
        attempt += 1;

        let mut len: libc::size_t = 0;
        // SAFETY: a null `oldp` asks only for the size, written to `len`.
        let rc = unsafe {
            libc::sysctlbyname(cname.as_ptr(), ptr::null_mut(), &mut len, ptr::null(), 0)
        };
        if rc != 0 {
            return Err(sysctl_error(name, io::Error::last_os_error()));
        }

        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|source| KernelError::Allocation {
                what: name.to_string(),
                source,
            })?;

        // SAFETY: `buf` has capacity for `len` bytes and the kernel writes at
        // most `len` bytes, updating `len` to the amount written.
        let rc = unsafe {
            libc::sysctlbyname(
                cname.as_ptr(),
                buf.as_mut_ptr().cast(),
                &mut len,
                ptr::null(),
                0,
            )
        };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ENOMEM) && attempt < MAX_SYSCTL_ATTEMPTS {
                debug!(name, attempt, "sysctl grew during read, retrying");
                continue;
            }
            return Err(sysctl_error(name, err));
        }

        // SAFETY: the kernel initialised the first `len` bytes, `len <= capacity`.
        unsafe { buf.set_len(len) };
        return Ok(buf);
    }
}
