//! Shared-memory buffer allocation and busy-state arbitration (spec §4.B).
//!
//! Each surface owns at most one [`ShmBuffer`] matching its current
//! `width x height`. The compositor only ever borrows it between
//! `wl_surface.attach`+`commit` and the `wl_buffer.release` event — this
//! module tracks exactly that window via the `busy` flag; the surface
//! itself decides whether to defer a pending repaint (spec §8 invariant 2,
//! scenario S4).

use std::os::fd::{AsFd, AsRawFd};

use wayland_client::protocol::{wl_buffer, wl_shm, wl_shm_pool};
use wayland_client::{Dispatch, QueueHandle};

use crate::error::FatalEnvironmentError;
use crate::pixel::PixelBuffer;

/// One shm-backed pixel buffer bound to a single `wl_buffer`. Allocated
/// from an anonymous `memfd` — anonymous by construction, so unlike the
/// original's `shm_open`+`shm_unlink` dance there is no name to collide on
/// or clean up (spec §4.B, DESIGN.md Component B).
pub struct ShmBuffer {
    _memfd: memfd::Memfd,
    map_ptr: *mut libc::c_void,
    map_len: usize,
    pub width: i32,
    pub height: i32,
    pub wl_buffer: wl_buffer::WlBuffer,
    /// Set at attach+commit, cleared by the compositor's `release` event.
    pub busy: bool,
}

impl ShmBuffer {
    pub fn new<D>(
        shm: &wl_shm::WlShm,
        qh: &QueueHandle<D>,
        width: i32,
        height: i32,
    ) -> Result<Self, FatalEnvironmentError>
    where
        D: Dispatch<wl_shm_pool::WlShmPool, ()> + Dispatch<wl_buffer::WlBuffer, ()> + 'static,
    {
        let stride = width.max(0) * 4;
        let len = (stride as usize) * (height.max(0) as usize);
        let len = len.max(4); // wl_shm_pool rejects a zero-size pool.

        let memfd = memfd::MemfdOptions::default()
            .create(format!("sbar-{}", std::process::id()))
            .map_err(|e| FatalEnvironmentError::ShmAllocFailed(e.to_string()))?;
        memfd
            .as_file()
            .set_len(len as u64)
            .map_err(|e| FatalEnvironmentError::ShmAllocFailed(e.to_string()))?;

        let map_ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                memfd.as_file().as_fd().as_raw_fd(),
                0,
            )
        };
        if map_ptr == libc::MAP_FAILED {
            return Err(FatalEnvironmentError::ShmAllocFailed(
                std::io::Error::last_os_error().to_string(),
            ));
        }

        let pool = shm.create_pool(memfd.as_file().as_fd(), len as i32, qh, ());
        let wl_buffer = pool.create_buffer(0, width, height, stride, wl_shm::Format::Argb8888, qh, ());
        pool.destroy();

        Ok(Self {
            _memfd: memfd,
            map_ptr,
            map_len: len,
            width,
            height,
            wl_buffer,
            busy: false,
        })
    }

    /// Copy a fully composited frame byte-for-byte into the mapped shm
    /// region. `pixels` must already match this buffer's dimensions — the
    /// caller allocates a new `ShmBuffer` on any size change rather than
    /// rescaling in place (spec §4.B).
    pub fn write(&mut self, pixels: &PixelBuffer) {
        debug_assert_eq!(pixels.width, self.width);
        debug_assert_eq!(pixels.height, self.height);
        let src = pixels.as_slice();
        let byte_len = (src.len() * std::mem::size_of::<u32>()).min(self.map_len);
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr() as *const u8, self.map_ptr as *mut u8, byte_len);
        }
    }

    pub fn matches(&self, width: i32, height: i32) -> bool {
        self.width == width && self.height == height
    }
}

impl Drop for ShmBuffer {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.map_ptr, self.map_len);
        }
        self.wl_buffer.destroy();
    }
}

// `ShmBuffer` owns its mapping exclusively and is never shared across
// threads (spec §5, single-threaded cooperative model); the raw pointer it
// carries is otherwise `Send`-safe in that context, but this crate has no
// multi-threaded call sites that would need the marker, so none is added.
