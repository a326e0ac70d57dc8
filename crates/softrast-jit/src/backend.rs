//! Specializer backends: the narrow contract the cache compiles through.
//!
//! Two implementations ship here: [`BytecodeBackend`], the portable
//! specializer that owns a bounded virtual code region, and [`NullBackend`],
//! which reports no specialization available (disabled config or unsupported
//! platform). A native machine-code emitter would be a third implementation
//! of the same trait; the rest of the subsystem cannot tell backends apart.

use std::sync::Arc;

use softrast_pixel::PixelStateKey;
use thiserror::Error;

use crate::compile::compile_program;
use crate::program::PixelProgram;

/// Capacity of the code region. Plenty of space for plenty of variations.
pub const CODE_REGION_CAPACITY: usize = 256 * 1024;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no space left in the code region")]
    OutOfSpace,
    #[error("specialization not supported by this backend")]
    Unsupported,
}

/// A freshly compiled entry: its start address within the backend's code
/// region plus the callable itself.
#[derive(Debug, Clone)]
pub struct CompiledEntry {
    pub start: usize,
    pub program: Arc<PixelProgram>,
}

/// The code-generator collaborator contract consumed by the cache.
pub trait SpecializerBackend: Send {
    fn compile(&mut self, id: &PixelStateKey) -> Result<CompiledEntry, CompileError>;

    /// Bytes still available in the code region.
    fn space_left(&self) -> usize;

    /// Current write pointer (offset of the next entry).
    fn write_offset(&self) -> usize;

    /// Whether an address falls inside the owned code region.
    fn contains(&self, addr: usize) -> bool;

    /// Resets the code region; all previously returned entries are dead.
    fn clear(&mut self);
}

/// Backend used when specialization is disabled: every compile fails, the
/// dispatcher falls through to the generic processor.
#[derive(Debug, Default)]
pub struct NullBackend;

impl SpecializerBackend for NullBackend {
    fn compile(&mut self, _id: &PixelStateKey) -> Result<CompiledEntry, CompileError> {
        Err(CompileError::Unsupported)
    }

    fn space_left(&self) -> usize {
        0
    }

    fn write_offset(&self) -> usize {
        0
    }

    fn contains(&self, _addr: usize) -> bool {
        false
    }

    fn clear(&mut self) {}
}

/// Portable specializer. Owns a bounded virtual code region: compiled
/// programs are charged against it at their in-memory size and assigned
/// monotonically increasing start addresses, so the cache's flush policy and
/// address diagnostics behave exactly as they would over an executable
/// buffer.
#[derive(Debug)]
pub struct BytecodeBackend {
    capacity: usize,
    used: usize,
}

impl BytecodeBackend {
    pub fn new() -> Self {
        Self::with_capacity(CODE_REGION_CAPACITY)
    }

    /// Smaller regions are useful in tests to force flushes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity, used: 0 }
    }
}

impl Default for BytecodeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecializerBackend for BytecodeBackend {
    fn compile(&mut self, id: &PixelStateKey) -> Result<CompiledEntry, CompileError> {
        let program = compile_program(id);
        let size = program.size_bytes();
        if size > self.space_left() {
            return Err(CompileError::OutOfSpace);
        }
        let start = self.used;
        self.used += size;
        Ok(CompiledEntry {
            start,
            program: Arc::new(program),
        })
    }

    fn space_left(&self) -> usize {
        self.capacity - self.used
    }

    fn write_offset(&self) -> usize {
        self.used
    }

    fn contains(&self, addr: usize) -> bool {
        addr < self.capacity
    }

    fn clear(&mut self) {
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytecode_backend_accounts_space() {
        let mut backend = BytecodeBackend::new();
        let before = backend.space_left();
        let entry = backend.compile(&PixelStateKey::default()).unwrap();
        assert_eq!(entry.start, 0);
        assert_eq!(backend.space_left(), before - entry.program.size_bytes());
        assert_eq!(backend.write_offset(), entry.program.size_bytes());

        backend.clear();
        assert_eq!(backend.space_left(), before);
    }

    #[test]
    fn null_backend_never_compiles() {
        let mut backend = NullBackend;
        assert!(matches!(
            backend.compile(&PixelStateKey::default()),
            Err(CompileError::Unsupported)
        ));
        assert!(!backend.contains(0));
    }
}
