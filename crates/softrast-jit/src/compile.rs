//! Flattens a pixel state key into a [`PixelProgram`].
//!
//! The emitted op list is the generic pipeline with every flag branch
//! resolved: disabled stages produce no ops, clear mode swaps in its
//! stencil-from-alpha and depth-clear forms, and the blend stage is chosen
//! through the derived [`PixelBlendState`] flags.

use softrast_pixel::blend::{blend_factor, compute_blend_state};
use softrast_pixel::{BlendEquation, BlendFactor, CompareFunc, PixelStateKey};

use crate::program::{PixelOp, PixelProgram};

/// Factors that do not depend on the pixel being drawn.
fn is_constant_factor(f: BlendFactor) -> bool {
    matches!(f, BlendFactor::Zero | BlendFactor::One | BlendFactor::Fix)
}

fn blend_op(id: &PixelStateKey) -> PixelOp {
    let state = compute_blend_state(id);
    let dither = id.dithering;

    if !state.uses_factors {
        return PixelOp::BlendEquationOnly {
            eq: id.blend_eq,
            dither,
        };
    }

    if state.dst_factor_is_inverse
        && id.blend_eq == BlendEquation::MulAdd
        && id.blend_src == BlendFactor::SrcAlpha
    {
        return PixelOp::BlendAlphaMix { dither };
    }

    if is_constant_factor(id.blend_src) && is_constant_factor(id.blend_dst) {
        // Constant factors read neither operand; evaluate them now.
        let sf = blend_factor(id.blend_src, id.cached.blend_fix_a, 0, 0, [0; 3]);
        let df = blend_factor(id.blend_dst, id.cached.blend_fix_b, 0, 0, [0; 3]);
        return PixelOp::BlendConstFactors {
            eq: id.blend_eq,
            sf,
            df,
            dither,
        };
    }

    PixelOp::Blend {
        eq: id.blend_eq,
        src: id.blend_src,
        dst: id.blend_dst,
        fix_a: id.cached.blend_fix_a,
        fix_b: id.cached.blend_fix_b,
        dither,
    }
}

/// Compiles one state key. Infallible; space accounting is the backend's
/// concern.
pub fn compile_program(id: &PixelStateKey) -> PixelProgram {
    let mut ops = Vec::new();

    if id.apply_depth_range {
        ops.push(PixelOp::DepthRange {
            minz: id.cached.minz,
            maxz: id.cached.maxz,
        });
    }

    if !id.clear_mode && id.alpha_test_func != CompareFunc::Always {
        ops.push(PixelOp::AlphaTest {
            func: id.alpha_test_func,
            reference: id.alpha_test_ref,
            mask: if id.has_alpha_test_mask {
                id.cached.alpha_test_mask
            } else {
                0xFF
            },
        });
    }

    if !id.clear_mode && id.apply_fog {
        ops.push(PixelOp::Fog {
            color: id.cached.fog_color,
        });
    }

    if !id.clear_mode && id.color_test {
        ops.push(PixelOp::ColorTest {
            func: id.cached.color_test_func,
            reference: id.cached.color_test_ref,
            mask: id.cached.color_test_mask,
        });
    }

    if id.clear_mode {
        ops.push(PixelOp::StencilFromAlpha);
        if id.depth_clear() {
            ops.push(PixelOp::ClearDepth);
        }
    } else {
        ops.push(PixelOp::LoadStencil);
        if id.stencil_test {
            ops.push(PixelOp::StencilDepthTest {
                func: id.stencil_test_func,
                reference: id.stencil_test_ref,
                mask: if id.has_stencil_test_mask {
                    id.cached.stencil_test_mask
                } else {
                    0xFF
                },
                replace: if id.has_stencil_test_mask {
                    id.cached.stencil_ref
                } else {
                    id.stencil_test_ref
                },
                fail_op: id.stencil_fail_op,
                depth_func: id.depth_test_func,
                depth_fail_op: id.depth_fail_op,
                pass_op: id.depth_pass_op,
            });
        } else if id.depth_test_func != CompareFunc::Always {
            ops.push(PixelOp::DepthTest {
                func: id.depth_test_func,
            });
        }
        if id.depth_write {
            ops.push(PixelOp::WriteDepth);
        }
    }

    if !id.clear_mode && id.alpha_blend {
        ops.push(blend_op(id));
    } else {
        ops.push(PixelOp::Pack {
            dither: id.dithering,
        });
    }

    if !id.clear_mode && id.apply_logic_op {
        ops.push(PixelOp::LogicOpApply {
            op: id.cached.logic_op,
        });
    }

    if id.clear_mode && (!id.color_clear || !id.stencil_clear) {
        ops.push(PixelOp::ClearChannelMask {
            color_clear: id.color_clear,
            stencil_clear: id.stencil_clear,
        });
    }

    ops.push(PixelOp::WriteColor);

    PixelProgram {
        fmt: id.fb_format,
        fb_stride: id.cached.fb_stride,
        depth_stride: id.cached.depth_stride,
        write_mask: if id.apply_color_write_mask {
            id.cached.color_write_mask
        } else {
            0
        },
        dither_matrix: id.cached.dither_matrix,
        ops: ops.into_boxed_slice(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use softrast_pixel::BufferFormat;

    #[test]
    fn disabled_stages_emit_no_ops() {
        let id = PixelStateKey::default();
        let program = compile_program(&id);
        // LoadStencil, Pack, WriteColor only.
        assert_eq!(program.op_count(), 3);
    }

    #[test]
    fn classic_alpha_blend_compiles_to_mix_op() {
        let id = PixelStateKey {
            alpha_blend: true,
            blend_eq: BlendEquation::MulAdd,
            blend_src: BlendFactor::SrcAlpha,
            blend_dst: BlendFactor::InvSrcAlpha,
            ..Default::default()
        };
        let program = compile_program(&id);
        assert!(program
            .ops
            .iter()
            .any(|op| matches!(op, PixelOp::BlendAlphaMix { .. })));
    }

    #[test]
    fn fixed_factors_are_pre_evaluated() {
        let mut id = PixelStateKey {
            alpha_blend: true,
            blend_eq: BlendEquation::MulAdd,
            blend_src: BlendFactor::Fix,
            blend_dst: BlendFactor::Zero,
            ..Default::default()
        };
        id.cached.blend_fix_a = 0x0012_3456;
        let program = compile_program(&id);
        let found = program.ops.iter().find_map(|op| match op {
            PixelOp::BlendConstFactors { sf, df, .. } => Some((*sf, *df)),
            _ => None,
        });
        assert_eq!(found, Some(([0x56, 0x34, 0x12], [0, 0, 0])));
    }

    #[test]
    fn clear_mode_compiles_clear_forms() {
        let id = PixelStateKey {
            clear_mode: true,
            color_clear: true,
            stencil_clear: false,
            depth_write: true,
            fb_format: BufferFormat::Rgba4444,
            ..Default::default()
        };
        let program = compile_program(&id);
        assert!(matches!(program.ops[0], PixelOp::StencilFromAlpha));
        assert!(matches!(program.ops[1], PixelOp::ClearDepth));
        assert!(program
            .ops
            .iter()
            .any(|op| matches!(op, PixelOp::ClearChannelMask { .. })));
    }
}
