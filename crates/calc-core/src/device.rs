//! Physical-memory mapping of the register block.
//!
//! [`DeviceHandle`] is the only place in the crate that touches raw memory.
//! It owns the mapping for its whole lifetime and unmaps it in `Drop`, so every
//! exit path out of a transaction releases the window exactly once.

#![allow(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use log::{debug, warn};

use crate::bus::RegisterBus;
use crate::error::CalcError;
use crate::regmap::{Register, CALC_BASE, CALC_SIZE, PAGE_BYTES, REGISTER_BLOCK_BYTES};

/// Default privileged backing store exposing physical memory.
pub const DEV_MEM_PATH: &str = "/dev/mem";

/// Page size of the running kernel, the alignment `mmap` requires of a base.
///
/// Falls back to [`PAGE_BYTES`] if `sysconf` cannot report it.
#[must_use]
pub fn host_page_bytes() -> usize {
    // SAFETY: `sysconf` only reads a system constant.
    let reported = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(reported)
        .ok()
        .filter(|bytes| bytes.is_power_of_two())
        .unwrap_or(PAGE_BYTES)
}

/// Physical address range to map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MapWindow {
    /// Physical base address. Must be page aligned for the mapping to succeed.
    pub base: u64,
    /// Length of the mapping in bytes.
    pub size: usize,
}

impl MapWindow {
    /// Window covering the calculator register block on the target hardware.
    pub const CALCULATOR: Self = Self {
        base: CALC_BASE,
        size: CALC_SIZE,
    };

    /// Returns `true` when every register lies inside this window.
    #[must_use]
    pub const fn covers_register_block(&self) -> bool {
        self.size >= REGISTER_BLOCK_BYTES
    }
}

impl Default for MapWindow {
    fn default() -> Self {
        Self::CALCULATOR
    }
}

/// Capability to open a physical-memory backing store and map a window of it.
pub trait PhysicalMemory {
    /// Register access handle owning the mapping. Dropping it releases the
    /// mapping.
    type Handle: RegisterBus;

    /// Opens the backing store and maps `window` into the process.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Access`] when the backing store cannot be opened
    /// and [`CalcError::Mapping`] when the window cannot be mapped.
    fn acquire(&self, window: MapWindow) -> Result<Self::Handle, CalcError>;
}

/// Character-device backing store, `/dev/mem` by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevMem {
    path: PathBuf,
}

impl DevMem {
    /// Creates a backing store rooted at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path opened on acquire.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for DevMem {
    fn default() -> Self {
        Self::new(DEV_MEM_PATH)
    }
}

impl PhysicalMemory for DevMem {
    type Handle = DeviceHandle;

    fn acquire(&self, window: MapWindow) -> Result<DeviceHandle, CalcError> {
        DeviceHandle::acquire(&self.path, window)
    }
}

/// Exclusive volatile access to a mapped register window.
#[derive(Debug)]
pub struct DeviceHandle {
    regs: NonNull<u32>,
    window: MapWindow,
    // Closed by field drop glue, after `Drop::drop` has unmapped the window.
    _file: File,
}

impl DeviceHandle {
    /// Opens `path` with `O_RDWR | O_SYNC` and maps `window` shared, read/write.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Access`] if `path` cannot be opened and
    /// [`CalcError::Mapping`] if the window is too small for the register
    /// block, lies outside the representable file offset range, or is
    /// rejected by `mmap`.
    pub fn acquire(path: &Path, window: MapWindow) -> Result<Self, CalcError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .map_err(|source| CalcError::Access {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("opened backing store {}", path.display());

        let mapping_error = |source: io::Error| CalcError::Mapping {
            base: window.base,
            size: window.size,
            source,
        };

        if !window.covers_register_block() {
            return Err(mapping_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                "window does not cover the register block",
            )));
        }
        let offset = libc::off_t::try_from(window.base).map_err(|_| {
            mapping_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                "base address exceeds the file offset range",
            ))
        })?;

        // SAFETY: a fresh shared mapping chosen by the kernel (no MAP_FIXED)
        // cannot alias any Rust-owned memory. The descriptor stays open for
        // the lifetime of the returned handle.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                window.size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                offset,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(mapping_error(io::Error::last_os_error()));
        }
        let Some(regs) = NonNull::new(addr.cast::<u32>()) else {
            return Err(mapping_error(io::Error::other(
                "mmap returned a null mapping",
            )));
        };

        debug!(
            "mapped {:#x} bytes at physical {:#010x} -> {:p}",
            window.size, window.base, addr
        );
        Ok(Self {
            regs,
            window,
            _file: file,
        })
    }

    /// The mapped physical window.
    #[must_use]
    pub const fn window(&self) -> MapWindow {
        self.window
    }

    fn slot(&self, register: Register) -> *mut u32 {
        // SAFETY: `acquire` rejected windows smaller than the register block,
        // so every register offset lies inside the mapping.
        unsafe { self.regs.as_ptr().add(register.word_offset()) }
    }
}

impl RegisterBus for DeviceHandle {
    fn read(&mut self, register: Register) -> u32 {
        // SAFETY: `slot` is in bounds, word aligned (page-aligned base plus a
        // multiple of four) and valid while the mapping is held.
        unsafe { ptr::read_volatile(self.slot(register)) }
    }

    fn write(&mut self, register: Register, value: u32) {
        // SAFETY: see `read`.
        unsafe { ptr::write_volatile(self.slot(register), value) }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        // SAFETY: `regs` and `window.size` are exactly the address and length
        // returned by the successful mmap in `acquire`, unmapped only here.
        let rc = unsafe { libc::munmap(self.regs.as_ptr().cast(), self.window.size) };
        if rc == 0 {
            debug!("unmapped register window at {:#010x}", self.window.base);
        } else {
            warn!(
                "munmap of register window at {:#010x} failed: {}",
                self.window.base,
                io::Error::last_os_error()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;

    use super::{host_page_bytes, DevMem, DeviceHandle, MapWindow, PhysicalMemory};
    use crate::bus::RegisterBus;
    use crate::error::ErrorKind;
    use crate::regmap::{Register, PAGE_BYTES};

    fn zeroed_page() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        file.write_all(&[0u8; PAGE_BYTES]).expect("fill temp file");
        file.flush().expect("flush temp file");
        file
    }

    const FILE_WINDOW: MapWindow = MapWindow {
        base: 0,
        size: PAGE_BYTES,
    };

    #[test]
    fn missing_backing_store_is_access_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = DevMem::new(dir.path().join("no-such-mem"));

        let error = store
            .acquire(FILE_WINDOW)
            .expect_err("missing path cannot be opened");
        assert_eq!(error.kind(), ErrorKind::Access);
    }

    #[test]
    fn unaligned_base_is_mapping_error() {
        let file = zeroed_page();
        let window = MapWindow {
            base: 0x10,
            size: PAGE_BYTES,
        };

        let error = DeviceHandle::acquire(file.path(), window).expect_err("mmap needs alignment");
        assert_eq!(error.kind(), ErrorKind::Mapping);
    }

    #[test]
    fn window_smaller_than_register_block_is_mapping_error() {
        let file = zeroed_page();
        let window = MapWindow { base: 0, size: 8 };

        let error = DeviceHandle::acquire(file.path(), window).expect_err("window too small");
        assert_eq!(error.kind(), ErrorKind::Mapping);
    }

    #[test]
    fn volatile_accesses_reach_the_shared_mapping() {
        let file = zeroed_page();
        {
            let mut handle = DevMem::new(file.path())
                .acquire(FILE_WINDOW)
                .expect("file-backed window maps");
            assert_eq!(handle.window(), FILE_WINDOW);

            handle.write(Register::OperandB, 0xDEAD_BEEF);
            handle.write(Register::Status, 2);
            assert_eq!(handle.read(Register::OperandB), 0xDEAD_BEEF);
            assert_eq!(handle.read(Register::Result), 0);
        }

        let bytes = fs::read(file.path()).expect("read back temp file");
        let offset = Register::OperandB.byte_offset();
        assert_eq!(&bytes[offset..offset + 4], &0xDEAD_BEEF_u32.to_ne_bytes());
        let offset = Register::Status.byte_offset();
        assert_eq!(&bytes[offset..offset + 4], &2_u32.to_ne_bytes());
    }

    #[test]
    fn default_window_targets_calculator() {
        assert_eq!(MapWindow::default(), MapWindow::CALCULATOR);
        assert!(MapWindow::CALCULATOR.covers_register_block());
        assert_eq!(DevMem::default().path().to_str(), Some("/dev/mem"));
    }

    #[test]
    fn host_page_size_is_a_power_of_two_of_at_least_4kib() {
        let page = host_page_bytes();
        assert!(page.is_power_of_two());
        assert!(page >= PAGE_BYTES);
    }
}
