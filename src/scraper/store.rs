// src/scraper/store.rs
// =============================================================================
// A thread-safe, insertion-ordered collection of fetch outcomes.
//
// Many fetch tasks write here at the same time. The first outcome recorded
// for a URL wins; later ones for the same URL are dropped silently, because
// the same link is often discovered from several pages at once.
//
// Rust concepts:
// - Mutex: one lock guards both the Vec and the HashSet so they never drift
// - Interior mutability: add() takes &self, so the store can live in an Arc
// =============================================================================

use super::types::FetchOutcome;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<FetchOutcome>,
    seen: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct ResultStore {
    inner: Mutex<Inner>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Records an outcome unless one already exists for its URL.
    //
    // Returns true when the outcome was admitted.
    pub fn add(&self, outcome: FetchOutcome) -> bool {
        let mut inner = self.lock();
        if !inner.seen.insert(outcome.url.clone()) {
            return false;
        }
        inner.entries.push(outcome);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    // Copies all outcomes in completion order. The copy is independent of
    // the store, so later add() calls never show up in it.
    pub fn snapshot(&self) -> Vec<FetchOutcome> {
        self.lock().entries.clone()
    }

    // A panic in another writer must not lose the results collected so far,
    // so a poisoned lock is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
