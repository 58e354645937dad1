//! In-memory host.
//!
//! Holds a small form database, per-reference world contexts and leveled lists.
//! Intended for embedding, tools that validate rule files offline, and tests.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::filter::WorldContext;
use crate::form::{FormId, FormKind};
use crate::host::traits::{FormResolver, LeveledListEvaluator, ObjectRef, WorldContextProvider};
use crate::rng::{salt, RandomGenerator};

fn normalize_key(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

#[derive(Debug, Default)]
struct HostState {
    kinds: HashMap<FormId, FormKind>,
    editor_ids: HashMap<String, FormId>,
    sources: HashMap<String, u8>,
    contexts: HashMap<FormId, WorldContext>,
    leveled: HashMap<FormId, Vec<FormId>>,
}

/// Thread-safe in-memory host.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: RwLock<HostState>,
}

impl InMemoryHost {
    /// Create a new empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HostState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HostState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a form, optionally with an editor id. Returns `id`.
    pub fn add_form(&self, id: FormId, kind: FormKind, editor_id: Option<&str>) -> FormId {
        let mut state = self.write();
        state.kinds.insert(id, kind);
        if let Some(edid) = editor_id {
            state.editor_ids.insert(normalize_key(edid), id);
        }
        id
    }

    /// Registers a source (plugin) at a load index; its forms live at
    /// `index << 24 | local`.
    pub fn add_source(&self, name: &str, index: u8) {
        self.write().sources.insert(normalize_key(name), index);
    }

    /// Sets the context returned for a reference.
    pub fn set_context(&self, reference: FormId, context: WorldContext) {
        self.write().contexts.insert(reference, context);
    }

    /// Registers a leveled list and its entries.
    pub fn add_leveled_list(&self, id: FormId, editor_id: Option<&str>, entries: Vec<FormId>) -> FormId {
        self.add_form(id, FormKind::LeveledItem, editor_id);
        self.write().leveled.insert(id, entries);
        id
    }
}

impl FormResolver for InMemoryHost {
    fn lookup_editor_id(&self, editor_id: &str) -> Option<FormId> {
        self.read().editor_ids.get(&normalize_key(editor_id)).copied()
    }

    fn lookup_in_source(&self, local: u32, source: &str) -> Option<FormId> {
        let state = self.read();
        let index = *state.sources.get(&normalize_key(source))?;
        let id = FormId::new((u32::from(index) << 24) | (local & 0x00FF_FFFF));
        state.kinds.contains_key(&id).then_some(id)
    }

    fn kind_of(&self, id: FormId) -> Option<FormKind> {
        self.read().kinds.get(&id).copied()
    }
}

impl WorldContextProvider for InMemoryHost {
    fn snapshot(&self, reference: &ObjectRef, _base: FormId) -> WorldContext {
        self.read().contexts.get(&reference.id).cloned().unwrap_or_default()
    }
}

impl LeveledListEvaluator for InMemoryHost {
    fn evaluate(&self, list: FormId, reference: &ObjectRef) -> Option<FormId> {
        let state = self.read();
        let entries = state.leveled.get(&list)?;
        if entries.is_empty() {
            return None;
        }
        let index = RandomGenerator::seeded(reference.id, salt::LEVELED).generate_index(entries.len());
        entries.get(index).copied()
    }
}
