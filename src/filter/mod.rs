//! Filter language: tokenizer, compiler and evaluator, plus the shared
//! handle holding the filter currently applied by the capture loop.

pub mod compiler;
pub mod evaluator;
pub mod lexer;

use log::{info, warn};
use parking_lot::RwLock;
use std::sync::Arc;

pub use compiler::compile;
pub use evaluator::{evaluate, PacketFields};

use crate::models::filter::CompiledFilter;
use crate::utils::error::FilterSyntaxError;

/// The active filter, shared between the capture loop and whoever updates it.
///
/// Readers take an `Arc` snapshot; writers replace the whole filter, so a
/// reader always sees one complete filter.
#[derive(Debug, Clone, Default)]
pub struct FilterHandle {
    active: Arc<RwLock<Arc<CompiledFilter>>>,
}

impl FilterHandle {
    pub fn new(filter: CompiledFilter) -> Self {
        Self {
            active: Arc::new(RwLock::new(Arc::new(filter))),
        }
    }

    /// Snapshot of the active filter
    pub fn current(&self) -> Arc<CompiledFilter> {
        self.active.read().clone()
    }

    /// Install an already compiled filter, returning the one it replaced
    pub fn replace(&self, filter: CompiledFilter) -> Arc<CompiledFilter> {
        let mut active = self.active.write();
        std::mem::replace(&mut *active, Arc::new(filter))
    }

    /// Compile `text` and install it. On error the active filter is left as it was.
    pub fn update(&self, text: &str) -> Result<(), FilterSyntaxError> {
        match compile(text) {
            Ok(filter) => {
                info!("Filter set to: {}", filter.source());
                self.replace(filter);
                Ok(())
            }
            Err(e) => {
                warn!("Invalid filter expression '{}': {}; keeping current filter", text, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_from(src_ip: &str) -> PacketFields<'_> {
        PacketFields {
            src_ip,
            dst_ip: "10.0.0.2",
            protocol: "TCP",
        }
    }

    #[test]
    fn default_handle_accepts_all() {
        let handle = FilterHandle::default();
        assert!(handle.current().is_accept_all());
    }

    #[test]
    fn update_swaps_whole_filter() {
        let handle = FilterHandle::default();
        handle.update("src=10.0.0.1").unwrap();

        let active = handle.current();
        assert_eq!(active.source(), "src=10.0.0.1");
        assert!(evaluate(&active, &tcp_from("10.0.0.1")));
        assert!(!evaluate(&active, &tcp_from("10.0.0.9")));
    }

    #[test]
    fn failed_update_keeps_previous_filter() {
        let handle = FilterHandle::new(compile("proto=TCP").unwrap());
        let before = handle.current();

        let err = handle.update("foo=1").unwrap_err();
        assert!(matches!(err, FilterSyntaxError::UnknownField { .. }));
        assert_eq!(*handle.current(), *before);
    }

    #[test]
    fn failed_update_keeps_accept_all() {
        let handle = FilterHandle::default();
        assert!(matches!(
            handle.update("proto='TCP"),
            Err(FilterSyntaxError::UnterminatedString { position: 6 })
        ));
        assert!(matches!(
            handle.update("src=10.0.0.1 or"),
            Err(FilterSyntaxError::EmptyExpression { position: 15 })
        ));
        assert!(handle.current().is_accept_all());
    }

    #[test]
    fn snapshot_survives_replacement() {
        let handle = FilterHandle::new(compile("proto=TCP").unwrap());
        let snapshot = handle.current();

        let old = handle.replace(compile("proto=UDP").unwrap());
        assert_eq!(old.source(), "proto=TCP");
        assert_eq!(snapshot.source(), "proto=TCP");
        assert_eq!(handle.current().source(), "proto=UDP");
    }

    #[test]
    fn clones_share_the_active_filter() {
        let handle = FilterHandle::default();
        let writer = handle.clone();

        std::thread::spawn(move || writer.update("dst=10.0.0.2").unwrap())
            .join()
            .unwrap();

        assert_eq!(handle.current().source(), "dst=10.0.0.2");
    }
}
