//! Alpha blending: factor evaluation, equation combine, and the derived
//! [`PixelBlendState`] flags the specializer uses to pick a blend strategy.

use crate::color::{unpack_rgb, Vec4i};
use crate::state::{BlendEquation, BlendFactor, PixelStateKey};

/// Blending-relevant booleans derived once per state key. Pure data, no
/// ownership concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelBlendState {
    /// Source/destination factors participate (MulAdd/MulSub/MulSubReverse).
    pub uses_factors: bool,
    /// Some factor reads the destination alpha channel.
    pub uses_dst_alpha: bool,
    /// Destination color is read as a factor input.
    pub dst_color_as_factor: bool,
    /// Source color/alpha is read as a factor input.
    pub src_color_as_factor: bool,
    /// Destination factor is the inverse of the source factor
    /// (e.g. SrcAlpha/InvSrcAlpha), enabling a single-multiply mix.
    pub dst_factor_is_inverse: bool,
}

/// Derives the blend flags for a state key. Pure function of the key.
pub fn compute_blend_state(id: &PixelStateKey) -> PixelBlendState {
    let mut state = PixelBlendState::default();

    match id.blend_eq {
        BlendEquation::MulAdd | BlendEquation::MulSub | BlendEquation::MulSubReverse => {
            state.uses_factors = true;
        }
        BlendEquation::Min | BlendEquation::Max | BlendEquation::AbsDiff => {}
    }

    if state.uses_factors {
        match id.blend_src {
            BlendFactor::DstAlpha
            | BlendFactor::InvDstAlpha
            | BlendFactor::DoubleDstAlpha
            | BlendFactor::DoubleInvDstAlpha => state.uses_dst_alpha = true,

            BlendFactor::OtherColor | BlendFactor::InvOtherColor => {
                state.dst_color_as_factor = true;
            }

            BlendFactor::SrcAlpha
            | BlendFactor::InvSrcAlpha
            | BlendFactor::DoubleSrcAlpha
            | BlendFactor::DoubleInvSrcAlpha => state.src_color_as_factor = true,

            _ => {}
        }

        match id.blend_dst {
            BlendFactor::InvSrcAlpha => {
                state.dst_factor_is_inverse = id.blend_src == BlendFactor::SrcAlpha;
                state.src_color_as_factor = true;
            }

            BlendFactor::DoubleInvSrcAlpha => {
                state.dst_factor_is_inverse = id.blend_src == BlendFactor::DoubleSrcAlpha;
                state.src_color_as_factor = true;
            }

            BlendFactor::DstAlpha => state.uses_dst_alpha = true,

            BlendFactor::InvDstAlpha => {
                state.dst_factor_is_inverse = id.blend_src == BlendFactor::DstAlpha;
                state.uses_dst_alpha = true;
            }

            BlendFactor::DoubleDstAlpha => state.uses_dst_alpha = true,

            BlendFactor::DoubleInvDstAlpha => {
                state.dst_factor_is_inverse = id.blend_src == BlendFactor::DoubleDstAlpha;
                state.uses_dst_alpha = true;
            }

            BlendFactor::OtherColor | BlendFactor::InvOtherColor => {
                state.src_color_as_factor = true;
            }

            BlendFactor::SrcAlpha | BlendFactor::DoubleSrcAlpha => {
                state.src_color_as_factor = true;
            }

            _ => {}
        }

        // Destination alpha implies destination color is read as a factor
        // input.
        state.dst_color_as_factor = state.dst_color_as_factor || state.uses_dst_alpha;
    }

    state
}

#[inline]
const fn splat(v: i32) -> [i32; 3] {
    [v, v, v]
}

/// Evaluates one blend factor as an RGB triple in `0..=255` factor space.
/// `other` is the opposite operand's RGB (destination color for a source
/// factor, source color for a destination factor). Doubled factors can exceed
/// 255; the final channel clamp absorbs that. Doubled-inverse factors clamp
/// the doubling before inverting so they never go negative.
#[inline]
pub fn blend_factor(
    kind: BlendFactor,
    fix: u32,
    src_alpha: i32,
    dst_alpha: i32,
    other: [i32; 3],
) -> [i32; 3] {
    match kind {
        BlendFactor::Zero => splat(0),
        BlendFactor::One => splat(255),
        BlendFactor::OtherColor => other,
        BlendFactor::InvOtherColor => [255 - other[0], 255 - other[1], 255 - other[2]],
        BlendFactor::SrcAlpha => splat(src_alpha),
        BlendFactor::InvSrcAlpha => splat(255 - src_alpha),
        BlendFactor::DstAlpha => splat(dst_alpha),
        BlendFactor::InvDstAlpha => splat(255 - dst_alpha),
        BlendFactor::DoubleSrcAlpha => splat(2 * src_alpha),
        BlendFactor::DoubleInvSrcAlpha => splat(255 - (2 * src_alpha).min(255)),
        BlendFactor::DoubleDstAlpha => splat(2 * dst_alpha),
        BlendFactor::DoubleInvDstAlpha => splat(255 - (2 * dst_alpha).min(255)),
        BlendFactor::Fix => unpack_rgb(fix),
    }
}

/// Combines source and destination RGB under one blend equation. Factors are
/// ignored by Min/Max/AbsDiff. Integer division truncates, matching the
/// emulated hardware.
#[inline]
pub fn blend_combine(eq: BlendEquation, src: [i32; 3], sf: [i32; 3], dst: [i32; 3], df: [i32; 3]) -> [i32; 3] {
    let mut out = [0i32; 3];
    for i in 0..3 {
        out[i] = match eq {
            BlendEquation::MulAdd => (src[i] * sf[i] + dst[i] * df[i]) / 255,
            BlendEquation::MulSub => (src[i] * sf[i] - dst[i] * df[i]) / 255,
            BlendEquation::MulSubReverse => (dst[i] * df[i] - src[i] * sf[i]) / 255,
            BlendEquation::Min => src[i].min(dst[i]),
            BlendEquation::Max => src[i].max(dst[i]),
            BlendEquation::AbsDiff => (src[i] - dst[i]).abs(),
        };
    }
    out
}

/// Blends a source fragment against the destination pixel per the key's
/// equation and factors. Result is pre-clamp RGB.
#[inline]
pub fn alpha_blending_result(id: &PixelStateKey, src: Vec4i, dst: Vec4i) -> [i32; 3] {
    let srgb = src.rgb();
    let drgb = dst.rgb();
    match id.blend_eq {
        BlendEquation::Min | BlendEquation::Max | BlendEquation::AbsDiff => {
            blend_combine(id.blend_eq, srgb, splat(0), drgb, splat(0))
        }
        _ => {
            let sf = blend_factor(id.blend_src, id.cached.blend_fix_a, src.a, dst.a, drgb);
            let df = blend_factor(id.blend_dst, id.cached.blend_fix_b, src.a, dst.a, srgb);
            blend_combine(id.blend_eq, srgb, sf, drgb, df)
        }
    }
}
