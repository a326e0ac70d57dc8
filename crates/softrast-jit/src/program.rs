//! The compiled form of a pixel state key: a flat op program with every
//! constant resolved at compile time.
//!
//! Stages the key disables are simply absent from the op list, and the
//! format/clear-mode switches are gone; what remains is a straight-line walk
//! the per-pixel interpreter executes. Every op bottoms out in the same
//! primitive helpers the generic processor uses, which is what makes the two
//! paths bit-exact for equal keys.

use softrast_pixel::blend::{blend_combine, blend_factor};
use softrast_pixel::color::{pack_rgb_clamped, unpack_rgb, Vec4i};
use softrast_pixel::draw::{
    apply_logic_op, apply_stencil_op, color_compare_passes, compare_passes, depth_test_passed,
    dither_offset, get_pixel_color, get_pixel_stencil, set_pixel_color, set_pixel_depth,
    set_pixel_stencil,
};
use softrast_pixel::{
    BlendEquation, BlendFactor, BufferFormat, CompareFunc, LogicOp, RenderTarget, StencilOp,
};

/// One resolved pipeline stage. Test ops discard by returning early from the
/// interpreter; the stencil stage performs its own write-backs on failure,
/// mirroring the generic pipeline exactly.
#[derive(Debug, Clone, Copy)]
pub enum PixelOp {
    DepthRange {
        minz: u16,
        maxz: u16,
    },
    AlphaTest {
        func: CompareFunc,
        reference: u8,
        mask: u8,
    },
    Fog {
        color: u32,
    },
    ColorTest {
        func: CompareFunc,
        reference: u32,
        mask: u32,
    },
    /// Normal mode: read the stencil channel from the framebuffer.
    LoadStencil,
    /// Clear mode: the source alpha doubles as the stencil value.
    StencilFromAlpha,
    /// Clear mode with depth clearing on.
    ClearDepth,
    StencilDepthTest {
        func: CompareFunc,
        reference: u8,
        mask: u8,
        replace: u8,
        fail_op: StencilOp,
        depth_func: CompareFunc,
        depth_fail_op: StencilOp,
        pass_op: StencilOp,
    },
    DepthTest {
        func: CompareFunc,
    },
    WriteDepth,
    /// General factored blend; factors evaluated per pixel.
    Blend {
        eq: BlendEquation,
        src: BlendFactor,
        dst: BlendFactor,
        fix_a: u32,
        fix_b: u32,
        dither: bool,
    },
    /// Min/Max/AbsDiff: factors are irrelevant.
    BlendEquationOnly {
        eq: BlendEquation,
        dither: bool,
    },
    /// Both factors are constants (Zero/One/Fix), pre-evaluated at compile
    /// time.
    BlendConstFactors {
        eq: BlendEquation,
        sf: [i32; 3],
        df: [i32; 3],
        dither: bool,
    },
    /// The classic SrcAlpha/InvSrcAlpha single-alpha mix, detected through
    /// the blend state's inverse-pairing flag.
    BlendAlphaMix {
        dither: bool,
    },
    /// No blending: dither (optionally) and pack the source color.
    Pack {
        dither: bool,
    },
    LogicOpApply {
        op: LogicOp,
    },
    /// Clear mode with one or both channel clears disabled.
    ClearChannelMask {
        color_clear: bool,
        stencil_clear: bool,
    },
    WriteColor,
}

/// A specialized, directly callable pixel routine. Immutable once compiled;
/// shared by `Arc` out of the cache and safe to call concurrently for
/// disjoint pixels, like the generic processor.
#[derive(Debug)]
pub struct PixelProgram {
    pub(crate) fmt: BufferFormat,
    pub(crate) fb_stride: i32,
    pub(crate) depth_stride: i32,
    pub(crate) write_mask: u32,
    pub(crate) dither_matrix: [i8; 16],
    pub(crate) ops: Box<[PixelOp]>,
}

impl PixelProgram {
    /// Bytes this program occupies in the cache's code region.
    pub fn size_bytes(&self) -> usize {
        core::mem::size_of::<PixelProgram>()
            + self.ops.len() * core::mem::size_of::<PixelOp>()
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    fn load_old_color(&self, target: &RenderTarget, x: i32, y: i32) -> u32 {
        get_pixel_color(self.fmt, &target.fb, self.fb_stride, x, y)
    }

    #[inline]
    fn finish_rgb(&self, mut rgb: [i32; 3], dither: bool, stencil: u8, x: i32, y: i32) -> u32 {
        if dither {
            let d = dither_offset(&self.dither_matrix, x, y);
            rgb = [rgb[0] + d, rgb[1] + d, rgb[2] + d];
        }
        pack_rgb_clamped(rgb) | (stencil as u32) << 24
    }

    /// Executes the program for one pixel. Same contract as the generic
    /// processor: never fails, never allocates, writes nothing on discard
    /// beyond the stencil stage's own write-backs.
    pub fn run(&self, target: &RenderTarget, x: i32, y: i32, z: u16, fog: i32, color: Vec4i) {
        let fmt = self.fmt;
        let mut prim = color.clamped255();
        let mut stencil: u8 = 0;
        let mut old_color: u32 = 0;
        let mut new_color: u32 = 0;

        for op in self.ops.iter() {
            match *op {
                PixelOp::DepthRange { minz, maxz } => {
                    if z < minz || z > maxz {
                        return;
                    }
                }
                PixelOp::AlphaTest {
                    func,
                    reference,
                    mask,
                } => {
                    if !compare_passes(func, prim.a & mask as i32, reference as i32) {
                        return;
                    }
                }
                PixelOp::Fog { color } => {
                    let f = unpack_rgb(color);
                    prim.r = (prim.r * fog + f[0] * (255 - fog)) / 255;
                    prim.g = (prim.g * fog + f[1] * (255 - fog)) / 255;
                    prim.b = (prim.b * fog + f[2] * (255 - fog)) / 255;
                }
                PixelOp::ColorTest {
                    func,
                    reference,
                    mask,
                } => {
                    let c = pack_rgb_clamped(prim.rgb()) & mask;
                    if !color_compare_passes(func, c, reference) {
                        return;
                    }
                }
                PixelOp::LoadStencil => {
                    stencil = get_pixel_stencil(fmt, &target.fb, self.fb_stride, x, y);
                }
                PixelOp::StencilFromAlpha => stencil = prim.a as u8,
                PixelOp::ClearDepth => {
                    set_pixel_depth(&target.depth, self.depth_stride, x, y, z);
                }
                PixelOp::StencilDepthTest {
                    func,
                    reference,
                    mask,
                    replace,
                    fail_op,
                    depth_func,
                    depth_fail_op,
                    pass_op,
                } => {
                    if !compare_passes(func, reference as i32, (stencil & mask) as i32) {
                        let s = apply_stencil_op(fmt, replace, fail_op, stencil);
                        set_pixel_stencil(fmt, &target.fb, self.fb_stride, self.write_mask, x, y, s);
                        return;
                    }
                    if depth_func != CompareFunc::Always
                        && !depth_test_passed(depth_func, &target.depth, self.depth_stride, x, y, z)
                    {
                        let s = apply_stencil_op(fmt, replace, depth_fail_op, stencil);
                        set_pixel_stencil(fmt, &target.fb, self.fb_stride, self.write_mask, x, y, s);
                        return;
                    }
                    stencil = apply_stencil_op(fmt, replace, pass_op, stencil);
                }
                PixelOp::DepthTest { func } => {
                    if !depth_test_passed(func, &target.depth, self.depth_stride, x, y, z) {
                        return;
                    }
                }
                PixelOp::WriteDepth => {
                    set_pixel_depth(&target.depth, self.depth_stride, x, y, z);
                }
                PixelOp::Blend {
                    eq,
                    src,
                    dst,
                    fix_a,
                    fix_b,
                    dither,
                } => {
                    old_color = self.load_old_color(target, x, y);
                    let d = Vec4i::from_rgba8888(old_color);
                    let sf = blend_factor(src, fix_a, prim.a, d.a, d.rgb());
                    let df = blend_factor(dst, fix_b, prim.a, d.a, prim.rgb());
                    let rgb = blend_combine(eq, prim.rgb(), sf, d.rgb(), df);
                    new_color = self.finish_rgb(rgb, dither, stencil, x, y);
                }
                PixelOp::BlendEquationOnly { eq, dither } => {
                    old_color = self.load_old_color(target, x, y);
                    let d = Vec4i::from_rgba8888(old_color);
                    let rgb = blend_combine(eq, prim.rgb(), [0; 3], d.rgb(), [0; 3]);
                    new_color = self.finish_rgb(rgb, dither, stencil, x, y);
                }
                PixelOp::BlendConstFactors { eq, sf, df, dither } => {
                    old_color = self.load_old_color(target, x, y);
                    let d = Vec4i::from_rgba8888(old_color);
                    let rgb = blend_combine(eq, prim.rgb(), sf, d.rgb(), df);
                    new_color = self.finish_rgb(rgb, dither, stencil, x, y);
                }
                PixelOp::BlendAlphaMix { dither } => {
                    old_color = self.load_old_color(target, x, y);
                    let d = Vec4i::from_rgba8888(old_color);
                    let a = prim.a;
                    let rgb = blend_combine(
                        BlendEquation::MulAdd,
                        prim.rgb(),
                        [a, a, a],
                        d.rgb(),
                        [255 - a, 255 - a, 255 - a],
                    );
                    new_color = self.finish_rgb(rgb, dither, stencil, x, y);
                }
                PixelOp::Pack { dither } => {
                    old_color = self.load_old_color(target, x, y);
                    if dither {
                        let d = dither_offset(&self.dither_matrix, x, y);
                        prim.r += d;
                        prim.g += d;
                        prim.b += d;
                    }
                    new_color = pack_rgb_clamped(prim.rgb()) | (stencil as u32) << 24;
                }
                PixelOp::LogicOpApply { op } => {
                    new_color = apply_logic_op(op, old_color, new_color);
                }
                PixelOp::ClearChannelMask {
                    color_clear,
                    stencil_clear,
                } => {
                    if !color_clear {
                        new_color = (new_color & 0xFF00_0000) | (old_color & 0x00FF_FFFF);
                    }
                    if !stencil_clear {
                        new_color = (new_color & 0x00FF_FFFF) | (old_color & 0xFF00_0000);
                    }
                }
                PixelOp::WriteColor => {
                    set_pixel_color(
                        fmt,
                        &target.fb,
                        self.fb_stride,
                        x,
                        y,
                        new_color,
                        old_color,
                        self.write_mask,
                    );
                }
            }
        }
    }
}
