use std::fmt;
use std::sync::Arc;

use junction_config::JunctionConfig;
use junction_signature::ClassHierarchy;

use crate::machine::Machine;
use crate::thunk::{Interpreter, ThunkCache, ThunkCompiler};

/// Everything a call target needs at invocation time, shared by every target built
/// against the same host.
pub struct Runtime {
    hierarchy: Arc<dyn ClassHierarchy>,
    machine: Arc<dyn Machine>,
    thunks: ThunkCache,
    config: JunctionConfig,
}

impl Runtime {
    /// A runtime with the default configuration and the interpreting stub compiler.
    pub fn new(hierarchy: Arc<dyn ClassHierarchy>, machine: Arc<dyn Machine>) -> Arc<Self> {
        Runtime::with_config(
            hierarchy,
            machine,
            Arc::new(Interpreter),
            JunctionConfig::default(),
        )
    }

    pub fn with_config(
        hierarchy: Arc<dyn ClassHierarchy>,
        machine: Arc<dyn Machine>,
        compiler: Arc<dyn ThunkCompiler>,
        config: JunctionConfig,
    ) -> Arc<Self> {
        let thunks = ThunkCache::new(compiler, &config.thunk_cache);
        Arc::new(Runtime {
            hierarchy,
            machine,
            thunks,
            config,
        })
    }

    pub fn hierarchy(&self) -> &dyn ClassHierarchy {
        self.hierarchy.as_ref()
    }

    pub fn machine(&self) -> &dyn Machine {
        self.machine.as_ref()
    }

    pub fn thunks(&self) -> &ThunkCache {
        &self.thunks
    }

    pub fn config(&self) -> &JunctionConfig {
        &self.config
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("thunks", &self.thunks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
