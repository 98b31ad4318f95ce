//! Linux framebuffer surface
//!
//! This module provides a safe wrapper around the fbdev interface: it opens
//! the device, queries its geometry and maps the pixel memory into the
//! process. The mapping is written only by the rendering path on the main
//! thread, so no synchronization is needed.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FramebufferError {
    #[error("Failed to open framebuffer device {0}: {1}")]
    Open(PathBuf, #[source] io::Error),

    #[error("Failed to query framebuffer geometry: {0}")]
    Geometry(#[source] io::Error),

    #[error("Unsupported framebuffer depth: {0} bpp (32 bpp required)")]
    Depth(u32),

    #[error("Failed to map framebuffer memory: {0}")]
    Map(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, FramebufferError>;

const FBIOGET_VSCREENINFO: libc::c_ulong = 0x4600;

/// `struct fb_bitfield` from `linux/fb.h`
#[repr(C)]
#[derive(Clone, Copy, Default)]
struct FbBitfield {
    offset: u32,
    length: u32,
    msb_right: u32,
}

/// `struct fb_var_screeninfo` from `linux/fb.h`
#[repr(C)]
#[derive(Clone, Copy, Default)]
struct FbVarScreeninfo {
    xres: u32,
    yres: u32,
    xres_virtual: u32,
    yres_virtual: u32,
    xoffset: u32,
    yoffset: u32,
    bits_per_pixel: u32,
    grayscale: u32,
    red: FbBitfield,
    green: FbBitfield,
    blue: FbBitfield,
    transp: FbBitfield,
    nonstd: u32,
    activate: u32,
    height: u32,
    width: u32,
    accel_flags: u32,
    pixclock: u32,
    left_margin: u32,
    right_margin: u32,
    upper_margin: u32,
    lower_margin: u32,
    hsync_len: u32,
    vsync_len: u32,
    sync: u32,
    vmode: u32,
    rotate: u32,
    colorspace: u32,
    reserved: [u32; 4],
}

/// A writable pixel surface, either mapped from a framebuffer device or
/// backed by process memory for offscreen rendering.
#[derive(Debug)]
pub struct Framebuffer {
    ptr: *mut u32,
    width: usize,
    height: usize,
    /// Device descriptor, -1 for offscreen surfaces
    fd: libc::c_int,
    /// Mapping length in bytes, 0 for offscreen surfaces
    map_len: usize,
    /// Backing storage for offscreen surfaces
    _mem: Option<Vec<u32>>,
}

impl Framebuffer {
    /// Open a framebuffer device and map its pixel memory.
    ///
    /// Requires a 32 bpp visual; the mapping covers `4 * width * height`
    /// bytes of row-major packed-RGB pixels.
    pub fn open(device: &Path) -> Result<Self> {
        let path = CString::new(device.as_os_str().as_bytes())
            .map_err(|_| FramebufferError::Open(device.to_path_buf(), io::Error::from(io::ErrorKind::InvalidInput)))?;

        let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return Err(FramebufferError::Open(
                device.to_path_buf(),
                io::Error::last_os_error(),
            ));
        }

        let mut info = FbVarScreeninfo::default();
        if unsafe { libc::ioctl(fd, FBIOGET_VSCREENINFO, &mut info) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(FramebufferError::Geometry(err));
        }

        if info.bits_per_pixel != 32 {
            unsafe { libc::close(fd) };
            return Err(FramebufferError::Depth(info.bits_per_pixel));
        }

        let width = info.xres as usize;
        let height = info.yres as usize;
        let map_len = 4 * width * height;

        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(FramebufferError::Map(err));
        }

        tracing::info!("framebuffer {}x{} at 32 bpp", width, height);

        Ok(Self {
            ptr: ptr as *mut u32,
            width,
            height,
            fd,
            map_len,
            _mem: None,
        })
    }

    /// Create a memory-backed surface with the same write semantics as a
    /// mapped device. Used by tests and headless rendering.
    #[allow(dead_code)]
    pub fn offscreen(width: usize, height: usize) -> Self {
        let mut mem = vec![0u32; width * height];
        let ptr = mem.as_mut_ptr();
        Self {
            ptr,
            width,
            height,
            fd: -1,
            map_len: 0,
            _mem: Some(mem),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Write one pixel. This is the hot path; bounds are the caller's
    /// responsibility and only checked in debug builds.
    #[inline]
    pub fn write_pixel(&mut self, x: usize, y: usize, color: u32) {
        debug_assert!(x < self.width && y < self.height);
        unsafe {
            *self.ptr.add(y * self.width + x) = color;
        }
    }

    /// Read one pixel back
    #[allow(dead_code)]
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        debug_assert!(x < self.width && y < self.height);
        unsafe { *self.ptr.add(y * self.width + x) }
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe {
                libc::munmap(self.ptr as *mut libc::c_void, self.map_len);
                libc::close(self.fd);
            }
        }
    }
}
