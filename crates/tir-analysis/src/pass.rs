//! The pass framework.
//!
//! Analyses are pure functions over IR containers; their results are
//! cached in a `PassManager` keyed by the pass type and stamped with the
//! container's version at computation time. Any mutation bumps the
//! container version, so stale entries expire on the next request — a
//! transform never has to invalidate caches by hand.

use std::any::{Any, TypeId};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tir_core::{BlockId, FuncId, Module};

/// An analysis over a single function.
pub trait FunctionAnalysis: 'static {
    type Result: 'static;

    fn run(module: &Module, function: FuncId) -> Self::Result;
}

/// An analysis over a whole module.
pub trait ModuleAnalysis: 'static {
    type Result: 'static;

    fn run(module: &Module) -> Self::Result;
}

/// A transform over a single function. Returns whether anything changed;
/// a `true` return implies the function version was bumped, expiring
/// every cached analysis of it (and of the module).
pub trait FunctionTransform {
    fn run(module: &mut Module, function: FuncId, passes: &mut PassManager) -> bool;
}

/// A transform over a single basic block.
pub trait BlockTransform {
    fn run(module: &mut Module, function: FuncId, block: BlockId, passes: &mut PassManager)
    -> bool;
}

struct CacheEntry {
    version: u64,
    value: Rc<dyn Any>,
}

/// Version-stamped analysis cache.
#[derive(Default)]
pub struct PassManager {
    function_cache: FxHashMap<(FuncId, TypeId), CacheEntry>,
    module_cache: FxHashMap<TypeId, CacheEntry>,
}

impl PassManager {
    pub fn new() -> Self {
        PassManager::default()
    }

    /// Get (or compute) a function analysis result.
    pub fn function_analysis<A: FunctionAnalysis>(
        &mut self,
        module: &Module,
        function: FuncId,
    ) -> Rc<A::Result> {
        let key = (function, TypeId::of::<A>());
        let version = module.function(function).version();
        if let Some(entry) = self.function_cache.get(&key) {
            if entry.version == version {
                if let Ok(value) = entry.value.clone().downcast::<A::Result>() {
                    return value;
                }
            }
        }
        tracing::trace!(
            pass = std::any::type_name::<A>(),
            function = ?function,
            "running function analysis"
        );
        let value = Rc::new(A::run(module, function));
        self.function_cache.insert(
            key,
            CacheEntry {
                version,
                value: value.clone(),
            },
        );
        value
    }

    /// Get (or compute) a module analysis result.
    pub fn module_analysis<A: ModuleAnalysis>(&mut self, module: &Module) -> Rc<A::Result> {
        let key = TypeId::of::<A>();
        let epoch = module.epoch();
        if let Some(entry) = self.module_cache.get(&key) {
            if entry.version == epoch {
                if let Ok(value) = entry.value.clone().downcast::<A::Result>() {
                    return value;
                }
            }
        }
        tracing::trace!(pass = std::any::type_name::<A>(), "running module analysis");
        let value = Rc::new(A::run(module));
        self.module_cache.insert(
            key,
            CacheEntry {
                version: epoch,
                value: value.clone(),
            },
        );
        value
    }

    /// Drop every cached result.
    pub fn clear(&mut self) {
        self.function_cache.clear();
        self.module_cache.clear();
    }
}
