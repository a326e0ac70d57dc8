//! The pixel state key: an immutable descriptor of one fragment-pipeline
//! configuration.
//!
//! A [`PixelStateKey`] plays two roles:
//! - it is the hash/equality key the specialization cache is indexed by, and
//! - it is the parameter set driving the generic per-pixel algorithm.
//!
//! The central contract of the whole subsystem hangs off key equality: two
//! keys that compare equal must produce bit-identical framebuffer, depthbuffer
//! and stencil writes for identical per-pixel inputs, regardless of which
//! implementation (generic or specialized) services the call. To keep that
//! trivially true the derived scalars in [`PixelCached`] take part in
//! `Eq`/`Hash` as well.

use std::fmt::Write as _;

/// Emulated framebuffer pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BufferFormat {
    Rgb565 = 0,
    Rgba5551 = 1,
    Rgba4444 = 2,
    #[default]
    Rgba8888 = 3,
}

impl BufferFormat {
    pub const ALL: [BufferFormat; 4] = [
        BufferFormat::Rgb565,
        BufferFormat::Rgba5551,
        BufferFormat::Rgba4444,
        BufferFormat::Rgba8888,
    ];

    /// Inverse of `as u8`, for const-generic monomorphization of the draw
    /// routine. A raw value outside the enum is an invariant violation
    /// upstream and aborts rather than being mapped to a sentinel.
    #[inline]
    pub const fn from_raw(v: u8) -> Self {
        match v {
            0 => BufferFormat::Rgb565,
            1 => BufferFormat::Rgba5551,
            2 => BufferFormat::Rgba4444,
            3 => BufferFormat::Rgba8888,
            _ => panic!("invalid framebuffer format"),
        }
    }

    /// Bytes per pixel in the framebuffer (depth is always 16-bit).
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            BufferFormat::Rgba8888 => 4,
            _ => 2,
        }
    }
}

/// Comparison function for the alpha, stencil, depth and color tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunc {
    Never,
    #[default]
    Always,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl CompareFunc {
    pub const ALL: [CompareFunc; 8] = [
        CompareFunc::Never,
        CompareFunc::Always,
        CompareFunc::Equal,
        CompareFunc::NotEqual,
        CompareFunc::Less,
        CompareFunc::LessEqual,
        CompareFunc::Greater,
        CompareFunc::GreaterEqual,
    ];
}

/// Stencil update operation for the fail / depth-fail / pass cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    Invert,
    Increment,
    Decrement,
}

/// Blend equation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendEquation {
    #[default]
    MulAdd,
    MulSub,
    MulSubReverse,
    Min,
    Max,
    AbsDiff,
}

/// Symbolic blend factor. `OtherColor` refers to the opposite operand's RGB
/// (destination color when used as a source factor and vice versa); `Fix`
/// reads the fixed color cached in [`PixelCached`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFactor {
    Zero,
    #[default]
    One,
    OtherColor,
    InvOtherColor,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
    DoubleSrcAlpha,
    DoubleInvSrcAlpha,
    DoubleDstAlpha,
    DoubleInvDstAlpha,
    Fix,
}

/// The 16 standard bitwise logic ops, applied post-blend to RGB only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogicOp {
    Clear,
    And,
    AndReverse,
    #[default]
    Copy,
    AndInverted,
    Noop,
    Xor,
    Or,
    Nor,
    Equiv,
    Inverted,
    OrReverse,
    CopyInverted,
    OrInverted,
    Nand,
    Set,
}

impl LogicOp {
    pub const ALL: [LogicOp; 16] = [
        LogicOp::Clear,
        LogicOp::And,
        LogicOp::AndReverse,
        LogicOp::Copy,
        LogicOp::AndInverted,
        LogicOp::Noop,
        LogicOp::Xor,
        LogicOp::Or,
        LogicOp::Nor,
        LogicOp::Equiv,
        LogicOp::Inverted,
        LogicOp::OrReverse,
        LogicOp::CopyInverted,
        LogicOp::OrInverted,
        LogicOp::Nand,
        LogicOp::Set,
    ];
}

/// Derived scalars bundled with the key for fast per-pixel access. These are
/// a pure function of the raster state the key was built from, so including
/// them in equality/hashing cannot split otherwise-equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PixelCached {
    pub alpha_test_mask: u8,
    pub color_test_func: CompareFunc,
    pub color_test_ref: u32,
    pub color_test_mask: u32,
    pub stencil_test_mask: u8,
    /// Unmasked stencil reference; used as the REPLACE value when a stencil
    /// test mask is present (the key's `stencil_test_ref` is pre-masked).
    pub stencil_ref: u8,
    pub minz: u16,
    pub maxz: u16,
    pub fog_color: u32,
    /// 4x4 dither offsets, row-major, indexed by `(y & 3) * 4 + (x & 3)`.
    pub dither_matrix: [i8; 16],
    pub fb_stride: i32,
    pub depth_stride: i32,
    /// Format-space bitmask of framebuffer bits that must be preserved.
    pub color_write_mask: u32,
    pub logic_op: LogicOp,
    pub blend_fix_a: u32,
    pub blend_fix_b: u32,
}

/// Immutable value object fully describing one fragment-pipeline
/// configuration. Built once per draw configuration and passed by reference
/// everywhere; cheap to clone for cache insertion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PixelStateKey {
    /// Buffer-clear invocation rather than normal fragment shading.
    pub clear_mode: bool,
    pub fb_format: BufferFormat,

    pub alpha_test_func: CompareFunc,
    pub alpha_test_ref: u8,
    pub has_alpha_test_mask: bool,

    pub stencil_test_func: CompareFunc,
    /// Stencil reference as compared (pre-masked when a mask is in use).
    pub stencil_test_ref: u8,
    pub has_stencil_test_mask: bool,
    pub stencil_fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub depth_pass_op: StencilOp,

    pub depth_test_func: CompareFunc,

    pub blend_eq: BlendEquation,
    pub blend_src: BlendFactor,
    pub blend_dst: BlendFactor,

    pub alpha_blend: bool,
    pub stencil_test: bool,
    pub color_test: bool,
    pub depth_write: bool,
    pub dithering: bool,
    pub apply_fog: bool,
    pub apply_depth_range: bool,
    pub apply_color_write_mask: bool,
    pub apply_logic_op: bool,

    /// Clear-mode channel gates: when clear, whether the color / stencil
    /// channels of the framebuffer are actually cleared.
    pub color_clear: bool,
    pub stencil_clear: bool,

    pub cached: PixelCached,
}

impl PixelStateKey {
    /// In clear mode the depth channel is cleared iff depth writes are on.
    #[inline]
    pub fn depth_clear(&self) -> bool {
        self.depth_write
    }

    /// Compact human-readable summary, used by the cache's crash-reporting
    /// address lookup.
    pub fn describe(&self) -> String {
        let mut s = String::new();
        s.push_str(match self.fb_format {
            BufferFormat::Rgb565 => "565",
            BufferFormat::Rgba5551 => "5551",
            BufferFormat::Rgba4444 => "4444",
            BufferFormat::Rgba8888 => "8888",
        });
        if self.clear_mode {
            s.push_str(":clear");
            if self.color_clear {
                s.push_str(":c");
            }
            if self.stencil_clear {
                s.push_str(":s");
            }
            if self.depth_clear() {
                s.push_str(":d");
            }
            return s;
        }
        if self.alpha_test_func != CompareFunc::Always {
            let _ = write!(s, ":atf={:?}", self.alpha_test_func);
        }
        if self.stencil_test {
            let _ = write!(s, ":stf={:?}", self.stencil_test_func);
        }
        if self.depth_test_func != CompareFunc::Always {
            let _ = write!(s, ":ztf={:?}", self.depth_test_func);
        }
        if self.color_test {
            s.push_str(":ctest");
        }
        if self.alpha_blend {
            let _ = write!(
                s,
                ":blend={:?},{:?},{:?}",
                self.blend_eq, self.blend_src, self.blend_dst
            );
        }
        if self.apply_logic_op {
            let _ = write!(s, ":logic={:?}", self.cached.logic_op);
        }
        if self.depth_write {
            s.push_str(":zwrite");
        }
        if self.apply_fog {
            s.push_str(":fog");
        }
        if self.dithering {
            s.push_str(":dither");
        }
        if self.apply_color_write_mask {
            s.push_str(":wmask");
        }
        s
    }
}
