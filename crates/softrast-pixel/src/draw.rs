//! The generic fragment processor: a portable, always-correct reference
//! implementation of the per-pixel pipeline, monomorphized over
//! `(clear mode, framebuffer format)`.
//!
//! Step order is semantically load-bearing and must not be rearranged:
//! depth-range test, alpha test, fog, color test, stencil read,
//! stencil+depth test, depth write, color compute (blend + dither), logic op,
//! clear-mode channel masking, final masked write. A discarded pixel performs
//! no buffer writes other than the stencil write-backs the stencil stage
//! itself defines.
//!
//! The primitive helpers here are also the building blocks of the specialized
//! programs in `softrast-jit`, which keeps the two implementations bit-exact
//! by construction.

use crate::blend::alpha_blending_result;
use crate::buffer::{FormatBuffer, RenderTarget};
use crate::color::{
    convert_4_to_8, pack_rgb_clamped, rgb565_to_rgba8888, rgba4444_to_rgba8888,
    rgba5551_to_rgba8888, rgba8888_to_rgb565, rgba8888_to_rgba4444, rgba8888_to_rgba5551, Vec4i,
};
use crate::state::{BufferFormat, CompareFunc, LogicOp, PixelStateKey, StencilOp};

/// Signature of every per-pixel entry point, generic or specialized.
/// `fog` is the per-pixel fog factor in `0..=255`; `color` is the source
/// color, clamped to `0..=255` on entry.
pub type SinglePixelFn =
    fn(target: &RenderTarget, id: &PixelStateKey, x: i32, y: i32, z: u16, fog: i32, color: Vec4i);

/// Evaluates one comparison function. Totality over all eight functions; the
/// operand order is the caller's responsibility (stencil compares reference
/// against stored, depth compares incoming against stored).
#[inline]
pub fn compare_passes(func: CompareFunc, lhs: i32, rhs: i32) -> bool {
    match func {
        CompareFunc::Never => false,
        CompareFunc::Always => true,
        CompareFunc::Equal => lhs == rhs,
        CompareFunc::NotEqual => lhs != rhs,
        CompareFunc::Less => lhs < rhs,
        CompareFunc::LessEqual => lhs <= rhs,
        CompareFunc::Greater => lhs > rhs,
        CompareFunc::GreaterEqual => lhs >= rhs,
    }
}

/// Color test only distinguishes equality; the ordered functions pass.
#[inline]
pub fn color_compare_passes(func: CompareFunc, value: u32, reference: u32) -> bool {
    match func {
        CompareFunc::Never => false,
        CompareFunc::Equal => value == reference,
        CompareFunc::NotEqual => value != reference,
        _ => true,
    }
}

#[inline]
pub fn alpha_test_passed(id: &PixelStateKey, alpha: i32) -> bool {
    let alpha = if id.has_alpha_test_mask {
        alpha & id.cached.alpha_test_mask as i32
    } else {
        alpha
    };
    compare_passes(id.alpha_test_func, alpha, id.alpha_test_ref as i32)
}

#[inline]
pub fn color_test_passed(id: &PixelStateKey, rgb: [i32; 3]) -> bool {
    let c = pack_rgb_clamped(rgb) & id.cached.color_test_mask;
    color_compare_passes(id.cached.color_test_func, c, id.cached.color_test_ref)
}

#[inline]
pub fn stencil_test_passed(id: &PixelStateKey, stencil: u8) -> bool {
    let stencil = if id.has_stencil_test_mask {
        stencil & id.cached.stencil_test_mask
    } else {
        stencil
    };
    compare_passes(
        id.stencil_test_func,
        id.stencil_test_ref as i32,
        stencil as i32,
    )
}

#[inline]
pub fn depth_test_passed(
    func: CompareFunc,
    depth: &FormatBuffer,
    stride: i32,
    x: i32,
    y: i32,
    z: u16,
) -> bool {
    let stored = depth.get16(x, y, stride);
    compare_passes(func, z as i32, stored as i32)
}

/// Reads the stencil channel of a framebuffer pixel. RGB565 has no stencil
/// channel and always reads 0.
#[inline]
pub fn get_pixel_stencil(fmt: BufferFormat, fb: &FormatBuffer, stride: i32, x: i32, y: i32) -> u8 {
    match fmt {
        BufferFormat::Rgb565 => 0,
        BufferFormat::Rgba5551 => {
            if fb.get16(x, y, stride) & 0x8000 != 0 {
                0xFF
            } else {
                0
            }
        }
        BufferFormat::Rgba4444 => convert_4_to_8((fb.get16(x, y, stride) >> 12) as u8),
        BufferFormat::Rgba8888 => (fb.get32(x, y, stride) >> 24) as u8,
    }
}

/// Writes back a stencil value, honoring the format-space write mask.
#[inline]
pub fn set_pixel_stencil(
    fmt: BufferFormat,
    fb: &FormatBuffer,
    stride: i32,
    write_mask: u32,
    x: i32,
    y: i32,
    value: u8,
) {
    match fmt {
        BufferFormat::Rgb565 => {}
        BufferFormat::Rgba5551 => {
            if write_mask & 0x8000 == 0 {
                let mut pixel = fb.get16(x, y, stride) & !0x8000;
                pixel |= ((value & 0x80) as u16) << 8;
                fb.set16(x, y, stride, pixel);
            }
        }
        BufferFormat::Rgba4444 => {
            let keep = write_mask as u16 | 0x0FFF;
            let mut pixel = fb.get16(x, y, stride) & keep;
            pixel |= ((value as u16) << 8) & !keep;
            fb.set16(x, y, stride, pixel);
        }
        BufferFormat::Rgba8888 => {
            let keep = write_mask | 0x00FF_FFFF;
            let mut pixel = fb.get32(x, y, stride) & keep;
            pixel |= ((value as u32) << 24) & !keep;
            fb.set32(x, y, stride, pixel);
        }
    }
}

#[inline]
pub fn set_pixel_depth(depth: &FormatBuffer, stride: i32, x: i32, y: i32, z: u16) {
    depth.set16(x, y, stride, z);
}

/// Reads a framebuffer pixel as 8888. RGB565 reads back alpha 0 for blending
/// purposes.
#[inline]
pub fn get_pixel_color(fmt: BufferFormat, fb: &FormatBuffer, stride: i32, x: i32, y: i32) -> u32 {
    match fmt {
        BufferFormat::Rgb565 => rgb565_to_rgba8888(fb.get16(x, y, stride)) & 0x00FF_FFFF,
        BufferFormat::Rgba5551 => rgba5551_to_rgba8888(fb.get16(x, y, stride)),
        BufferFormat::Rgba4444 => rgba4444_to_rgba8888(fb.get16(x, y, stride)),
        BufferFormat::Rgba8888 => fb.get32(x, y, stride),
    }
}

/// Converts and writes the final color, preserving old-value bits where the
/// format-space write mask is set.
#[inline]
pub fn set_pixel_color(
    fmt: BufferFormat,
    fb: &FormatBuffer,
    stride: i32,
    x: i32,
    y: i32,
    value: u32,
    old_value: u32,
    write_mask: u32,
) {
    match fmt {
        BufferFormat::Rgb565 => {
            let mut px = rgba8888_to_rgb565(value);
            if write_mask != 0 {
                let old = rgba8888_to_rgb565(old_value);
                px = (px & !(write_mask as u16)) | (old & write_mask as u16);
            }
            fb.set16(x, y, stride, px);
        }
        BufferFormat::Rgba5551 => {
            let mut px = rgba8888_to_rgba5551(value);
            if write_mask != 0 {
                let old = rgba8888_to_rgba5551(old_value);
                px = (px & !(write_mask as u16)) | (old & write_mask as u16);
            }
            fb.set16(x, y, stride, px);
        }
        BufferFormat::Rgba4444 => {
            let mut px = rgba8888_to_rgba4444(value);
            if write_mask != 0 {
                let old = rgba8888_to_rgba4444(old_value);
                px = (px & !(write_mask as u16)) | (old & write_mask as u16);
            }
            fb.set16(x, y, stride, px);
        }
        BufferFormat::Rgba8888 => {
            let px = (value & !write_mask) | (old_value & write_mask);
            fb.set32(x, y, stride, px);
        }
    }
}

/// Applies a stencil op. Increment/decrement are format-aware and saturating:
/// 8888 steps by 1, 4444 by a nibble (0x10) within `0x00..=0xF0`, 5551 has a
/// single stencil bit and saturates immediately, 565 has none at all.
#[inline]
pub fn apply_stencil_op(fmt: BufferFormat, replace: u8, op: StencilOp, old_stencil: u8) -> u8 {
    match op {
        StencilOp::Keep => old_stencil,
        StencilOp::Zero => 0,
        StencilOp::Replace => replace,
        StencilOp::Invert => !old_stencil,
        StencilOp::Increment => match fmt {
            BufferFormat::Rgba8888 => {
                if old_stencil != 0xFF {
                    old_stencil + 1
                } else {
                    old_stencil
                }
            }
            BufferFormat::Rgba5551 => 0xFF,
            BufferFormat::Rgba4444 => {
                if old_stencil < 0xF0 {
                    old_stencil + 0x10
                } else {
                    old_stencil
                }
            }
            BufferFormat::Rgb565 => old_stencil,
        },
        StencilOp::Decrement => match fmt {
            BufferFormat::Rgba4444 => {
                if old_stencil >= 0x10 {
                    old_stencil - 0x10
                } else {
                    old_stencil
                }
            }
            BufferFormat::Rgba5551 => 0,
            // 565 has no stencil channel; the store is a no-op anyway.
            _ => old_stencil.saturating_sub(1),
        },
    }
}

/// Applies one of the 16 bitwise logic ops between old and new color. Every
/// op preserves the alpha/stencil byte of the *new* color.
#[inline]
pub fn apply_logic_op(op: LogicOp, old_color: u32, new_color: u32) -> u32 {
    const RGB: u32 = 0x00FF_FFFF;
    const STENCIL: u32 = 0xFF00_0000;
    match op {
        LogicOp::Clear => new_color & STENCIL,
        LogicOp::And => new_color & (old_color | STENCIL),
        LogicOp::AndReverse => new_color & (!old_color | STENCIL),
        LogicOp::Copy => new_color,
        LogicOp::AndInverted => (!new_color & (old_color & RGB)) | (new_color & STENCIL),
        LogicOp::Noop => (old_color & RGB) | (new_color & STENCIL),
        LogicOp::Xor => new_color ^ (old_color & RGB),
        LogicOp::Or => new_color | (old_color & RGB),
        LogicOp::Nor => (!(new_color | old_color) & RGB) | (new_color & STENCIL),
        LogicOp::Equiv => (!(new_color ^ old_color) & RGB) | (new_color & STENCIL),
        LogicOp::Inverted => (!old_color & RGB) | (new_color & STENCIL),
        LogicOp::OrReverse => new_color | (!old_color & RGB),
        LogicOp::CopyInverted => (!new_color & RGB) | (new_color & STENCIL),
        LogicOp::OrInverted => ((!new_color | old_color) & RGB) | (new_color & STENCIL),
        LogicOp::Nand => (!(new_color & old_color) & RGB) | (new_color & STENCIL),
        LogicOp::Set => new_color | RGB,
    }
}

/// Dither offset for a pixel coordinate, from the key's 4x4 matrix.
#[inline]
pub fn dither_offset(matrix: &[i8; 16], x: i32, y: i32) -> i32 {
    matrix[((y & 3) * 4 + (x & 3)) as usize] as i32
}

/// Draws one pixel through the full fragment pipeline. Never fails, never
/// allocates; safe to call concurrently for disjoint pixel coordinates.
pub fn draw_single_pixel<const CLEAR: bool, const FMT: u8>(
    target: &RenderTarget,
    id: &PixelStateKey,
    x: i32,
    y: i32,
    z: u16,
    fog: i32,
    color_in: Vec4i,
) {
    let fmt = BufferFormat::from_raw(FMT);
    let mut prim = color_in.clamped255();

    // Depth range test applies even in clear mode.
    if id.apply_depth_range && (z < id.cached.minz || z > id.cached.maxz) {
        return;
    }

    if !CLEAR && id.alpha_test_func != CompareFunc::Always && !alpha_test_passed(id, prim.a) {
        return;
    }

    // Fog is applied prior to the color test.
    if !CLEAR && id.apply_fog {
        let fog_rgb = crate::color::unpack_rgb(id.cached.fog_color);
        prim.r = (prim.r * fog + fog_rgb[0] * (255 - fog)) / 255;
        prim.g = (prim.g * fog + fog_rgb[1] * (255 - fog)) / 255;
        prim.b = (prim.b * fog + fog_rgb[2] * (255 - fog)) / 255;
    }

    if !CLEAR && id.color_test && !color_test_passed(id, prim.rgb()) {
        return;
    }

    let write_mask = if id.apply_color_write_mask {
        id.cached.color_write_mask
    } else {
        0
    };

    // In clear mode the source alpha doubles as the stencil value.
    let mut stencil = if CLEAR {
        prim.a as u8
    } else {
        get_pixel_stencil(fmt, &target.fb, id.cached.fb_stride, x, y)
    };

    if CLEAR {
        if id.depth_clear() {
            set_pixel_depth(&target.depth, id.cached.depth_stride, x, y, z);
        }
    } else if id.stencil_test {
        let replace = if id.has_stencil_test_mask {
            id.cached.stencil_ref
        } else {
            id.stencil_test_ref
        };
        if !stencil_test_passed(id, stencil) {
            stencil = apply_stencil_op(fmt, replace, id.stencil_fail_op, stencil);
            set_pixel_stencil(fmt, &target.fb, id.cached.fb_stride, write_mask, x, y, stencil);
            return;
        }

        // Depth is applied at the same time; a disabled test is a pass.
        if id.depth_test_func != CompareFunc::Always
            && !depth_test_passed(id.depth_test_func, &target.depth, id.cached.depth_stride, x, y, z)
        {
            stencil = apply_stencil_op(fmt, replace, id.depth_fail_op, stencil);
            set_pixel_stencil(fmt, &target.fb, id.cached.fb_stride, write_mask, x, y, stencil);
            return;
        }

        stencil = apply_stencil_op(fmt, replace, id.depth_pass_op, stencil);
    } else if id.depth_test_func != CompareFunc::Always
        && !depth_test_passed(id.depth_test_func, &target.depth, id.cached.depth_stride, x, y, z)
    {
        return;
    }

    if !CLEAR && id.depth_write {
        set_pixel_depth(&target.depth, id.cached.depth_stride, x, y, z);
    }

    let old_color = get_pixel_color(fmt, &target.fb, id.cached.fb_stride, x, y);
    let new_color;

    // Dithering happens while blending because it applies before clamping.
    if !CLEAR && id.alpha_blend {
        let dst = Vec4i::from_rgba8888(old_color);
        let mut blended = alpha_blending_result(id, prim, dst);
        if id.dithering {
            let d = dither_offset(&id.cached.dither_matrix, x, y);
            blended = [blended[0] + d, blended[1] + d, blended[2] + d];
        }
        new_color = pack_rgb_clamped(blended) | (stencil as u32) << 24;
    } else {
        if id.dithering {
            let d = dither_offset(&id.cached.dither_matrix, x, y);
            prim.r += d;
            prim.g += d;
            prim.b += d;
        }
        new_color = pack_rgb_clamped(prim.rgb()) | (stencil as u32) << 24;
    }

    let mut out_color = new_color;

    // Logic ops apply after blending and never affect the stencil byte.
    if !CLEAR && id.apply_logic_op {
        out_color = apply_logic_op(id.cached.logic_op, old_color, out_color);
    }

    if CLEAR {
        if !id.color_clear {
            out_color = (out_color & 0xFF00_0000) | (old_color & 0x00FF_FFFF);
        }
        if !id.stencil_clear {
            out_color = (out_color & 0x00FF_FFFF) | (old_color & 0xFF00_0000);
        }
    }

    set_pixel_color(
        fmt,
        &target.fb,
        id.cached.fb_stride,
        x,
        y,
        out_color,
        old_color,
        write_mask,
    );
}

/// The two-axis `(clear mode, format)` dispatch to the eight monomorphized
/// generic variants. The format is bound once per draw call so the per-pixel
/// body never branches on it.
pub fn generic_single_func(id: &PixelStateKey) -> SinglePixelFn {
    const F565: u8 = BufferFormat::Rgb565 as u8;
    const F5551: u8 = BufferFormat::Rgba5551 as u8;
    const F4444: u8 = BufferFormat::Rgba4444 as u8;
    const F8888: u8 = BufferFormat::Rgba8888 as u8;

    match (id.clear_mode, id.fb_format) {
        (true, BufferFormat::Rgb565) => draw_single_pixel::<true, F565>,
        (true, BufferFormat::Rgba5551) => draw_single_pixel::<true, F5551>,
        (true, BufferFormat::Rgba4444) => draw_single_pixel::<true, F4444>,
        (true, BufferFormat::Rgba8888) => draw_single_pixel::<true, F8888>,
        (false, BufferFormat::Rgb565) => draw_single_pixel::<false, F565>,
        (false, BufferFormat::Rgba5551) => draw_single_pixel::<false, F5551>,
        (false, BufferFormat::Rgba4444) => draw_single_pixel::<false, F4444>,
        (false, BufferFormat::Rgba8888) => draw_single_pixel::<false, F8888>,
    }
}
