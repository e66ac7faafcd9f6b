//! # Processor Registry
//!
//! Maps report discriminators to the processor that handles them. The
//! registry is built once and shared read-only (behind an `Arc`) by every
//! session.

use crate::processors::{
    DocumentProcessor, DocumentStage, MessagingEvent, MessagingProcessor, Navigation,
    NavigationProcessor, Processor, PropertyAccess, PropertyProcessor, StatementProcessor,
    StorageKind, StorageProcessor, WindowCloseProcessor, WindowOpenProcessor,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Discriminator to processor table.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: BTreeMap<&'static str, Arc<dyn Processor>>,
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("discriminators", &self.processors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProcessorRegistry {
    /// An empty registry. Every report is unknown until processors are added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in report family.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        for stage in DocumentStage::ALL {
            registry.register(Arc::new(DocumentProcessor::new(stage)));
        }
        registry.register(Arc::new(WindowOpenProcessor));
        registry.register(Arc::new(WindowCloseProcessor));
        for kind in Navigation::ALL {
            registry.register(Arc::new(NavigationProcessor::new(kind)));
        }
        for kind in PropertyAccess::ALL {
            registry.register(Arc::new(PropertyProcessor::new(kind)));
        }
        for event in MessagingEvent::ALL {
            registry.register(Arc::new(MessagingProcessor::new(event)));
        }
        for kind in StorageKind::ALL {
            registry.register(Arc::new(StorageProcessor::new(kind)));
        }
        registry.register(Arc::new(StatementProcessor));

        registry
    }

    /// Register `processor` under all of its discriminators.
    ///
    /// A later registration replaces an earlier one for the same
    /// discriminator.
    pub fn register(&mut self, processor: Arc<dyn Processor>) {
        for discriminator in processor.discriminators() {
            self.processors.insert(discriminator, Arc::clone(&processor));
        }
    }

    #[must_use]
    pub fn lookup(&self, discriminator: &str) -> Option<&Arc<dyn Processor>> {
        self.processors.get(discriminator)
    }

    /// Number of registered discriminators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Registered discriminators in sorted order.
    pub fn discriminators(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.processors.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DistinctError;
    use crate::diagram::LogEntry;
    use crate::processors::ContextState;
    use crate::Report;

    struct Noop;

    impl Processor for Noop {
        fn discriminators(&self) -> &'static [&'static str] {
            &["windowopen"]
        }

        fn apply(
            &self,
            _state: &mut ContextState,
            _report: &Report,
        ) -> Result<Vec<LogEntry>, DistinctError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn defaults_cover_every_family() {
        let registry = ProcessorRegistry::with_defaults();
        for discriminator in [
            "documentinit",
            "init",
            "beforeunload",
            "windowopen",
            "windowclose",
            "httpredirect",
            "closedaccessed",
            "postmessagereceived",
            "messagechannelreceived",
            "idbadd",
            "statement",
            "report",
        ] {
            assert!(
                registry.lookup(discriminator).is_some(),
                "{discriminator} should be registered"
            );
        }
        // 10 document, 2 window, 7 navigation, 3 property, 11 messaging, 5 storage, 2 statement
        assert_eq!(registry.len(), 40);
    }

    #[test]
    fn unknown_discriminator_is_absent() {
        let registry = ProcessorRegistry::with_defaults();
        assert!(registry.lookup("serviceworkerregistered").is_none());
        assert!(ProcessorRegistry::new().is_empty());
    }

    #[test]
    fn later_registration_wins() {
        let mut registry = ProcessorRegistry::with_defaults();
        let before = registry.len();
        registry.register(Arc::new(Noop));
        assert_eq!(registry.len(), before);

        let mut state = ContextState::default();
        let report = Report::new("windowopen", 1u64, 1u64, serde_json::Map::new());
        let entries = registry
            .lookup("windowopen")
            .expect("registered")
            .apply(&mut state, &report)
            .expect("noop applies");
        assert!(entries.is_empty());
    }

    #[test]
    fn discriminators_are_sorted() {
        let registry = ProcessorRegistry::with_defaults();
        let all: Vec<_> = registry.discriminators().collect();
        let mut sorted = all.clone();
        sorted.sort_unstable();
        assert_eq!(all, sorted);
    }
}
