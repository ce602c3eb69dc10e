//! In-memory program storage for testing.
//!
//! This module provides a thread-safe in-memory implementation of the
//! ProgramStore trait, primarily for use in unit tests.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::Program;
use crate::error::Result;
use crate::storage::ProgramStore;

/// In-memory program store for testing.
///
/// Programs are stored in memory and lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryProgramStore {
    programs: RwLock<HashMap<String, Program>>,
}

impl MemoryProgramStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of programs in the store.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Clear all programs from the store.
    pub fn clear(&self) {
        self.write().clear();
    }

    // A panic while holding the lock cannot leave a half-written program
    // behind, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Program>> {
        self.programs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Program>> {
        self.programs.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProgramStore for MemoryProgramStore {
    fn get(&self, id: &str) -> Result<Option<Program>> {
        Ok(self.read().get(id).cloned())
    }

    fn put(&self, program: &Program) -> Result<()> {
        self.write().insert(program.id.clone(), program.clone());
        Ok(())
    }

    fn list(&self, limit: usize) -> Result<Vec<Program>> {
        let mut result: Vec<Program> = self.read().values().cloned().collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result.truncate(limit);
        Ok(result)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.write().remove(id);
        Ok(())
    }
}
