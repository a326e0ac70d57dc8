//! The specialization cache and dispatcher.
//!
//! One mutex guards the whole cache: lookups and compiles are serialized
//! system-wide, so a lookup racing a compile blocks until the compile
//! finishes and then either hits or still misses. Eviction is a full flush,
//! never per-entry: when the code region's free space drops below
//! [`FLUSH_THRESHOLD`], everything (region, key map, address table) is reset
//! together. Returned callables are therefore only valid until the next
//! flush; callers must fetch, call, and discard within one invocation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use softrast_pixel::draw::generic_single_func;
use softrast_pixel::{PixelStateKey, RenderTarget, SinglePixelFn, Vec4i};
use tracing::{debug, trace};

use crate::backend::{BytecodeBackend, NullBackend, SpecializerBackend};
use crate::program::PixelProgram;

/// Flush the entire cache when less than this much code space remains.
/// Individual programs are far smaller; the margin keeps compiles from ever
/// failing mid-draw.
pub const FLUSH_THRESHOLD: usize = 64 * 1024;

/// Runtime configuration gating specialization.
#[derive(Debug, Clone, Copy)]
pub struct JitConfig {
    pub enabled: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// The fastest available callable for one state key. Fetch per invocation
/// and discard; holding one across a cache flush just wastes memory on a
/// stale program.
#[derive(Clone)]
pub enum SingleFunc {
    Generic(SinglePixelFn),
    Compiled(Arc<PixelProgram>),
}

impl SingleFunc {
    /// Draws one pixel. The key is only consulted on the generic path; a
    /// compiled program carries its own constants.
    #[inline]
    pub fn draw(
        &self,
        target: &RenderTarget,
        id: &PixelStateKey,
        x: i32,
        y: i32,
        z: u16,
        fog: i32,
        color: Vec4i,
    ) {
        match self {
            SingleFunc::Generic(f) => f(target, id, x, y, z, fog, color),
            SingleFunc::Compiled(p) => p.run(target, x, y, z, fog, color),
        }
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self, SingleFunc::Compiled(_))
    }
}

struct CacheInner {
    enabled: bool,
    backend: Box<dyn SpecializerBackend>,
    entries: HashMap<PixelStateKey, Arc<PixelProgram>>,
    /// Start address of each compiled entry, for crash-reporting lookups.
    addresses: Vec<(usize, PixelStateKey)>,
    #[cfg(any(test, debug_assertions))]
    hits: u64,
    #[cfg(any(test, debug_assertions))]
    misses: u64,
}

impl CacheInner {
    fn flush(&mut self) {
        self.backend.clear();
        self.entries.clear();
        self.addresses.clear();
    }
}

/// Keyed cache from pixel state key to compiled pixel routine, plus the
/// dispatcher choosing between compiled and generic paths.
///
/// Construction allocates the backend's code region; dropping the cache
/// releases it along with every compiled program.
pub struct PixelJitCache {
    inner: Mutex<CacheInner>,
}

impl PixelJitCache {
    pub fn new(config: JitConfig) -> Self {
        let backend: Box<dyn SpecializerBackend> = if config.enabled {
            Box::new(BytecodeBackend::new())
        } else {
            Box::new(NullBackend)
        };
        Self::with_backend(config, backend)
    }

    /// Injects a custom backend; used by tests and by embedders that bring
    /// their own code generator.
    pub fn with_backend(config: JitConfig, backend: Box<dyn SpecializerBackend>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                enabled: config.enabled,
                backend,
                entries: HashMap::new(),
                addresses: Vec::new(),
                #[cfg(any(test, debug_assertions))]
                hits: 0,
                #[cfg(any(test, debug_assertions))]
                misses: 0,
            }),
        }
    }

    /// The dispatcher: returns the fastest available callable for a key.
    /// Never fails; any specialization failure silently degrades to the
    /// generic fragment processor with identical observable results.
    pub fn get_single(&self, id: &PixelStateKey) -> SingleFunc {
        if let Some(program) = self.get_compiled(id) {
            return SingleFunc::Compiled(program);
        }
        SingleFunc::Generic(generic_single_func(id))
    }

    fn get_compiled(&self, id: &PixelStateKey) -> Option<Arc<PixelProgram>> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(program) = inner.entries.get(id).cloned() {
            #[cfg(any(test, debug_assertions))]
            {
                inner.hits += 1;
            }
            return Some(program);
        }

        #[cfg(any(test, debug_assertions))]
        {
            inner.misses += 1;
        }

        if !inner.enabled {
            return None;
        }

        if inner.backend.space_left() < FLUSH_THRESHOLD {
            debug!(
                used = inner.backend.write_offset(),
                entries = inner.entries.len(),
                "pixel code region low on space, flushing cache"
            );
            inner.flush();
        }

        match inner.backend.compile(id) {
            Ok(entry) => {
                trace!(start = entry.start, key = %id.describe(), "compiled pixel routine");
                inner.addresses.push((entry.start, id.clone()));
                inner.entries.insert(id.clone(), entry.program.clone());
                Some(entry.program)
            }
            Err(err) => {
                debug!(%err, "pixel specialization unavailable, using generic path");
                None
            }
        }
    }

    /// Full flush: code region, key map and address table reset together,
    /// never partially.
    pub fn clear(&self) {
        self.inner.lock().unwrap().flush();
    }

    /// Whether an address lies inside the cache's code region.
    pub fn is_in_space(&self, addr: usize) -> bool {
        self.inner.lock().unwrap().backend.contains(addr)
    }

    /// Crash-reporting hook: describes the compiled entry whose start is the
    /// closest preceding address, or `None` if the address is outside the
    /// owned region (or precedes every entry).
    pub fn describe_address(&self, addr: usize) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        if !inner.backend.contains(addr) {
            return None;
        }
        let mut best: Option<&(usize, PixelStateKey)> = None;
        for entry in &inner.addresses {
            if entry.0 <= addr && best.map_or(true, |b| entry.0 >= b.0) {
                best = Some(entry);
            }
        }
        best.map(|(_, id)| id.describe())
    }

    pub fn compiled_count(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

#[cfg(any(test, debug_assertions))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}
