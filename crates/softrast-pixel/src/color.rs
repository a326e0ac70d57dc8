//! Integer color math shared by the generic and specialized pixel paths.
//!
//! All conversions are bit-exact with the emulated GPU: channel expansion uses
//! bit replication (`abcde` → `abcdeabc`), packing truncates to the high bits.
//! Colors in the 8888 working space are native-endian `u32` with R in the low
//! byte and the alpha/stencil channel in the top byte.

/// Expands a 4-bit channel to 8 bits (`0xN` → `0xNN`).
#[inline]
pub const fn convert_4_to_8(v: u8) -> u8 {
    (v << 4) | (v & 0x0F)
}

/// Expands a 5-bit channel to 8 bits by bit replication.
#[inline]
pub const fn convert_5_to_8(v: u8) -> u8 {
    (v << 3) | (v >> 2)
}

/// Expands a 6-bit channel to 8 bits by bit replication.
#[inline]
pub const fn convert_6_to_8(v: u8) -> u8 {
    (v << 2) | (v >> 4)
}

#[inline]
pub const fn rgb565_to_rgba8888(px: u16) -> u32 {
    let r = convert_5_to_8((px & 0x1F) as u8) as u32;
    let g = convert_6_to_8(((px >> 5) & 0x3F) as u8) as u32;
    let b = convert_5_to_8(((px >> 11) & 0x1F) as u8) as u32;
    r | (g << 8) | (b << 16) | 0xFF00_0000
}

#[inline]
pub const fn rgba5551_to_rgba8888(px: u16) -> u32 {
    let r = convert_5_to_8((px & 0x1F) as u8) as u32;
    let g = convert_5_to_8(((px >> 5) & 0x1F) as u8) as u32;
    let b = convert_5_to_8(((px >> 10) & 0x1F) as u8) as u32;
    let a = if px & 0x8000 != 0 { 0xFF } else { 0 };
    r | (g << 8) | (b << 16) | (a << 24)
}

#[inline]
pub const fn rgba4444_to_rgba8888(px: u16) -> u32 {
    let r = convert_4_to_8((px & 0xF) as u8) as u32;
    let g = convert_4_to_8(((px >> 4) & 0xF) as u8) as u32;
    let b = convert_4_to_8(((px >> 8) & 0xF) as u8) as u32;
    let a = convert_4_to_8(((px >> 12) & 0xF) as u8) as u32;
    r | (g << 8) | (b << 16) | (a << 24)
}

#[inline]
pub const fn rgba8888_to_rgb565(c: u32) -> u16 {
    let r = ((c & 0xFF) >> 3) as u16;
    let g = (((c >> 8) & 0xFF) >> 2) as u16;
    let b = (((c >> 16) & 0xFF) >> 3) as u16;
    r | (g << 5) | (b << 11)
}

#[inline]
pub const fn rgba8888_to_rgba5551(c: u32) -> u16 {
    let r = ((c & 0xFF) >> 3) as u16;
    let g = (((c >> 8) & 0xFF) >> 3) as u16;
    let b = (((c >> 16) & 0xFF) >> 3) as u16;
    let a = (((c >> 24) & 0xFF) >> 7) as u16;
    r | (g << 5) | (b << 10) | (a << 15)
}

#[inline]
pub const fn rgba8888_to_rgba4444(c: u32) -> u16 {
    let r = ((c & 0xFF) >> 4) as u16;
    let g = (((c >> 8) & 0xFF) >> 4) as u16;
    let b = (((c >> 16) & 0xFF) >> 4) as u16;
    let a = (((c >> 24) & 0xFF) >> 4) as u16;
    r | (g << 4) | (b << 8) | (a << 12)
}

/// Unpacks the RGB bytes of an 8888 color into an `i32` triple.
#[inline]
pub const fn unpack_rgb(c: u32) -> [i32; 3] {
    [
        (c & 0xFF) as i32,
        ((c >> 8) & 0xFF) as i32,
        ((c >> 16) & 0xFF) as i32,
    ]
}

/// Clamps each channel to `0..=255` and packs into the low 24 bits.
#[inline]
pub fn pack_rgb_clamped(rgb: [i32; 3]) -> u32 {
    let r = rgb[0].clamp(0, 255) as u32;
    let g = rgb[1].clamp(0, 255) as u32;
    let b = rgb[2].clamp(0, 255) as u32;
    r | (g << 8) | (b << 16)
}

/// Integer RGBA working color. Channels may transiently leave `0..=255`
/// (dither offsets, doubled blend factors); packing clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vec4i {
    pub r: i32,
    pub g: i32,
    pub b: i32,
    pub a: i32,
}

impl Vec4i {
    #[inline]
    pub const fn new(r: i32, g: i32, b: i32, a: i32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn from_rgba8888(c: u32) -> Self {
        Self {
            r: (c & 0xFF) as i32,
            g: ((c >> 8) & 0xFF) as i32,
            b: ((c >> 16) & 0xFF) as i32,
            a: ((c >> 24) & 0xFF) as i32,
        }
    }

    #[inline]
    pub fn clamped255(self) -> Self {
        Self {
            r: self.r.clamp(0, 255),
            g: self.g.clamp(0, 255),
            b: self.b.clamp(0, 255),
            a: self.a.clamp(0, 255),
        }
    }

    #[inline]
    pub const fn rgb(self) -> [i32; 3] {
        [self.r, self.g, self.b]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_expansion_covers_full_range() {
        assert_eq!(convert_4_to_8(0x0), 0x00);
        assert_eq!(convert_4_to_8(0xF), 0xFF);
        assert_eq!(convert_4_to_8(0xA), 0xAA);
        assert_eq!(convert_5_to_8(0x00), 0x00);
        assert_eq!(convert_5_to_8(0x1F), 0xFF);
        assert_eq!(convert_6_to_8(0x00), 0x00);
        assert_eq!(convert_6_to_8(0x3F), 0xFF);
    }

    #[test]
    fn pack_unpack_565_boundaries() {
        assert_eq!(rgb565_to_rgba8888(0x0000), 0xFF00_0000);
        assert_eq!(rgb565_to_rgba8888(0xFFFF), 0xFFFF_FFFF);
        assert_eq!(rgba8888_to_rgb565(0x00FF_FFFF), 0xFFFF);
    }

    #[test]
    fn alpha_bit_round_trips_5551() {
        assert_eq!(rgba5551_to_rgba8888(0x8000) >> 24, 0xFF);
        assert_eq!(rgba5551_to_rgba8888(0x7FFF) >> 24, 0x00);
        assert_eq!(rgba8888_to_rgba5551(0x8000_0000) & 0x8000, 0x8000);
        assert_eq!(rgba8888_to_rgba5551(0x7F00_0000) & 0x8000, 0);
    }

    #[test]
    fn pack_rgb_clamps_out_of_range_channels() {
        assert_eq!(pack_rgb_clamped([300, -5, 128]), 0x0080_00FF);
    }
}
