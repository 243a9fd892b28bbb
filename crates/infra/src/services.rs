use std::sync::Arc;

use crate::allocator::{AllocatorConfig, IdentifierAllocator};
use crate::audit::ConsistencyChecker;
use crate::config::CoreConfig;
use crate::ledger::LedgerCoordinator;
use crate::store::Storage;

/// The three core components wired over one shared storage engine.
#[derive(Debug)]
pub struct CoreServices<S> {
    pub registry: IdentifierAllocator<Arc<S>>,
    pub ledger: LedgerCoordinator<Arc<S>>,
    pub checker: ConsistencyChecker<Arc<S>>,
}

impl<S> CoreServices<S>
where
    S: Storage,
{
    pub fn new(storage: Arc<S>, config: &CoreConfig) -> Self {
        Self {
            registry: IdentifierAllocator::with_config(
                Arc::clone(&storage),
                AllocatorConfig::from(config),
            ),
            ledger: LedgerCoordinator::new(Arc::clone(&storage)),
            checker: ConsistencyChecker::new(storage),
        }
    }
}
