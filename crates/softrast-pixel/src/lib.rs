//! Per-pixel fragment pipeline for the software rasterizer.
//!
//! This crate is the portable half of the fragment engine:
//! - [`state::PixelStateKey`]: immutable descriptor of one pipeline
//!   configuration, also the specialization cache key.
//! - [`blend`]: blend factor/equation math plus the derived
//!   [`blend::PixelBlendState`] flags specializers use to pick a strategy.
//! - [`draw`]: the generic fragment processor, eight monomorphized
//!   `(clear mode, format)` variants behind [`draw::generic_single_func`].
//! - [`buffer`]: interior-mutable color/depth surfaces with the disjoint-pixel
//!   concurrency contract.
//!
//! The specialization cache and its compiled counterpart live in
//! `softrast-jit`; both implementations share the primitive helpers in
//! [`draw`], which is what keeps them bit-exact for equal state keys.

pub mod blend;
pub mod buffer;
pub mod color;
pub mod draw;
pub mod state;

pub use blend::{compute_blend_state, PixelBlendState};
pub use buffer::{FormatBuffer, RenderTarget};
pub use color::Vec4i;
pub use draw::{generic_single_func, SinglePixelFn};
pub use state::{
    BlendEquation, BlendFactor, BufferFormat, CompareFunc, LogicOp, PixelCached, PixelStateKey,
    StencilOp,
};
