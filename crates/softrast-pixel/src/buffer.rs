//! Shared pixel surfaces for the fragment pipeline.
//!
//! The rasterizer loop may drive the pipeline from several worker threads at
//! once; the scheduling contract is that no two concurrently executing calls
//! touch the same pixel cell, and the pipeline itself performs no locking
//! around buffer access. [`FormatBuffer`] models that: an interior-mutable
//! byte surface with element-indexed 16/32-bit accessors.

use core::cell::UnsafeCell;

/// A byte-backed pixel surface addressed as 16- or 32-bit elements at
/// `x + y * stride`. Little-endian element layout, unaligned-safe.
pub struct FormatBuffer {
    data: Box<[UnsafeCell<u8>]>,
}

// SAFETY: concurrent access is only sound under the pipeline's scheduling
// contract: callers partition work so that no two threads access the same
// pixel cell at the same time. Racing on a cell is a caller bug, exactly as
// it would be on the emulated hardware's memory.
unsafe impl Send for FormatBuffer {}
unsafe impl Sync for FormatBuffer {}

impl FormatBuffer {
    /// Allocates a zeroed surface of `len` bytes.
    pub fn new(len: usize) -> Self {
        Self {
            data: (0..len).map(|_| UnsafeCell::new(0)).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn element_index(x: i32, y: i32, stride: i32) -> usize {
        debug_assert!(x >= 0 && y >= 0 && stride >= 0);
        x as usize + y as usize * stride as usize
    }

    #[inline]
    pub fn get16(&self, x: i32, y: i32, stride: i32) -> u16 {
        let o = Self::element_index(x, y, stride) * 2;
        // Bounds-checked by slice indexing; the raw deref only bypasses the
        // aliasing rules per the type's Sync contract.
        let lo = unsafe { *self.data[o].get() };
        let hi = unsafe { *self.data[o + 1].get() };
        u16::from_le_bytes([lo, hi])
    }

    #[inline]
    pub fn set16(&self, x: i32, y: i32, stride: i32, value: u16) {
        let o = Self::element_index(x, y, stride) * 2;
        let [lo, hi] = value.to_le_bytes();
        unsafe {
            *self.data[o].get() = lo;
            *self.data[o + 1].get() = hi;
        }
    }

    #[inline]
    pub fn get32(&self, x: i32, y: i32, stride: i32) -> u32 {
        let o = Self::element_index(x, y, stride) * 4;
        let mut bytes = [0u8; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = unsafe { *self.data[o + i].get() };
        }
        u32::from_le_bytes(bytes)
    }

    #[inline]
    pub fn set32(&self, x: i32, y: i32, stride: i32, value: u32) {
        let o = Self::element_index(x, y, stride) * 4;
        for (i, b) in value.to_le_bytes().into_iter().enumerate() {
            unsafe { *self.data[o + i].get() = b };
        }
    }
}

impl core::fmt::Debug for FormatBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FormatBuffer")
            .field("len", &self.data.len())
            .finish()
    }
}

/// The color and 16-bit depth surfaces one draw renders into. Strides travel
/// with the pixel state key, not the target.
#[derive(Debug)]
pub struct RenderTarget {
    pub fb: FormatBuffer,
    pub depth: FormatBuffer,
}

impl RenderTarget {
    /// Allocates zeroed color and depth surfaces for a `width x height`
    /// target with tightly packed rows.
    pub fn new(width: usize, height: usize, fb_bytes_per_pixel: usize) -> Self {
        Self {
            fb: FormatBuffer::new(width * height * fb_bytes_per_pixel),
            depth: FormatBuffer::new(width * height * 2),
        }
    }
}
