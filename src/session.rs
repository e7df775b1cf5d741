//! # Session State
//!
//! Everything the viewer remembers between the moment a response arrives and
//! the moment the next request starts: the concept records fetched for its
//! mentions, the reference lookup built from its `references[]`, and which
//! request it belongs to.
//!
//! Each request calls [`Session::begin`], which discards the previous
//! response's state and hands out a new [`Generation`]. Asynchronous results
//! carry the generation they were requested under; a result whose generation
//! is no longer current is dropped instead of overwriting newer state.
//!
//! Wikipedia thumbnails do not depend on the response and survive `begin`.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::error::{DatastetError, Result};
use crate::model::{AnnotationResponse, Concept};

/// Token identifying one request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct Session {
    generation: u64,
    concepts: HashMap<u64, Concept>,
    /// Concept ids requested in this cycle whose answer has not arrived.
    pending: HashSet<u64>,
    references: HashMap<i64, String>,
    references_installed: bool,
    thumbnails: HashMap<(String, u64), String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request cycle, dropping the previous response's state.
    pub fn begin(&mut self) -> Generation {
        self.generation += 1;
        self.concepts.clear();
        self.pending.clear();
        self.references.clear();
        self.references_installed = false;
        Generation(self.generation)
    }

    pub fn current(&self) -> Generation {
        Generation(self.generation)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation.0 == self.generation
    }

    /// Fail with [`DatastetError::Stale`] if `generation` has been superseded.
    pub fn check(&self, generation: Generation) -> Result<()> {
        if self.is_current(generation) {
            Ok(())
        } else {
            Err(DatastetError::Stale {
                generation: generation.0,
            })
        }
    }

    /// Build the reference lookup from a response. Only the first call per
    /// cycle has an effect; the lookup never changes afterwards.
    pub fn install_references(
        &mut self,
        generation: Generation,
        response: &AnnotationResponse,
    ) -> Result<()> {
        self.check(generation)?;
        if self.references_installed {
            return Ok(());
        }
        self.references = response
            .references
            .iter()
            .filter_map(|r| r.tei.as_ref().map(|tei| (r.ref_key, tei.clone())))
            .collect();
        self.references_installed = true;
        Ok(())
    }

    pub fn reference(&self, ref_key: i64) -> Option<&str> {
        self.references.get(&ref_key).map(String::as_str)
    }

    /// Whether a concept should be requested, marking it requested if so.
    ///
    /// Returns `false` for an id that is already cached or already requested
    /// in this cycle.
    pub fn claim_concept(&mut self, id: u64) -> bool {
        if self.concepts.contains_key(&id) {
            return false;
        }
        self.pending.insert(id)
    }

    /// Store a fetched concept. Returns `false` (and stores nothing) when the
    /// request was made under a superseded generation.
    pub fn insert_concept(&mut self, generation: Generation, id: u64, concept: Concept) -> bool {
        if !self.is_current(generation) {
            warn!(
                "Dropping concept {} from superseded request (generation {})",
                id, generation.0
            );
            return false;
        }
        self.pending.remove(&id);
        self.concepts.entry(id).or_insert(concept);
        true
    }

    /// Forget a failed request so a later cycle may retry it.
    pub fn release_concept(&mut self, generation: Generation, id: u64) {
        if self.is_current(generation) {
            self.pending.remove(&id);
        }
    }

    pub fn concept(&self, id: u64) -> Option<&Concept> {
        self.concepts.get(&id)
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    pub fn thumbnail(&self, lang: &str, id: u64) -> Option<&str> {
        self.thumbnails
            .get(&(lang.to_string(), id))
            .map(String::as_str)
    }

    pub fn insert_thumbnail(&mut self, lang: &str, id: u64, url: String) {
        self.thumbnails.insert((lang.to_string(), id), url);
    }
}
