//! Runtime specialization for the per-pixel fragment pipeline.
//!
//! `softrast-pixel` provides the generic, always-correct fragment processor;
//! this crate caches a specialized routine per
//! [`PixelStateKey`](softrast_pixel::PixelStateKey):
//! - [`compile`] flattens a key into a [`program::PixelProgram`], a
//!   straight-line op list with all constants resolved.
//! - [`backend`] owns the bounded code region programs are charged against
//!   and defines the [`backend::SpecializerBackend`] seam a native emitter
//!   would plug into.
//! - [`cache`] is the keyed cache plus the dispatcher that falls back to the
//!   generic processor whenever specialization is off or fails.
//!
//! Compiled and generic paths produce identical framebuffer and depth bytes
//! for equal keys; the equivalence suite in `tests/` drives both over
//! randomized state and asserts exactly that.

pub mod backend;
pub mod cache;
pub mod compile;
pub mod program;

pub use backend::{BytecodeBackend, CompileError, NullBackend, SpecializerBackend};
pub use cache::{JitConfig, PixelJitCache, SingleFunc};
pub use compile::compile_program;
pub use program::{PixelOp, PixelProgram};
