//! Build generations.
//!
//! Every detected change advances the generation counter. A build holds
//! the ticket it was started with and checks it before writing; if the
//! counter has moved on, a newer build owns the outputs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic counter shared by the watcher and in-flight builds.
#[derive(Debug, Clone, Default)]
pub struct BuildGeneration(Arc<AtomicU64>);

impl BuildGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, superseding every outstanding ticket.
    pub fn advance(&self) -> BuildTicket {
        let current = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        BuildTicket { counter: Some(Arc::clone(&self.0)), generation: current }
    }

    /// A ticket for the current generation.
    pub fn ticket(&self) -> BuildTicket {
        BuildTicket { counter: Some(Arc::clone(&self.0)), generation: self.current() }
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A build's claim on one generation.
#[derive(Debug, Clone)]
pub struct BuildTicket {
    counter: Option<Arc<AtomicU64>>,
    generation: u64,
}

impl BuildTicket {
    /// A ticket that is never superseded, for one-shot builds.
    pub fn detached() -> Self {
        Self { counter: None, generation: 0 }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_superseded(&self) -> bool {
        match &self.counter {
            Some(counter) => counter.load(Ordering::SeqCst) != self.generation,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_supersedes_older_tickets() {
        let generation = BuildGeneration::new();
        let first = generation.advance();
        assert!(!first.is_superseded());

        let second = generation.advance();
        assert!(first.is_superseded());
        assert!(!second.is_superseded());
        assert_eq!(second.generation(), 2);
    }

    #[test]
    fn test_ticket_tracks_current() {
        let generation = BuildGeneration::new();
        generation.advance();
        let ticket = generation.ticket();
        assert_eq!(ticket.generation(), 1);
        assert!(!ticket.is_superseded());
    }

    #[test]
    fn test_detached_never_superseded() {
        let ticket = BuildTicket::detached();
        assert!(!ticket.is_superseded());
    }
}
