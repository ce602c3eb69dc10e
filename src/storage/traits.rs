//! Program storage traits for Overload.
//!
//! This module defines the `ProgramStore` trait for program persistence.

use std::sync::Arc;

use crate::core::Program;
use crate::error::{OverloadError, Result};

/// Trait for program storage backends.
///
/// Implementations persist whole programs, including per-exercise
/// progression flags, overrides and states.
pub trait ProgramStore: Send + Sync {
    /// Retrieve a program by ID.
    ///
    /// Returns `Ok(None)` if the program doesn't exist.
    fn get(&self, id: &str) -> Result<Option<Program>>;

    /// Save a program.
    ///
    /// Creates a new program or replaces an existing one.
    fn put(&self, program: &Program) -> Result<()>;

    /// List programs.
    ///
    /// Returns up to `limit` programs, ordered by most recently updated.
    fn list(&self, limit: usize) -> Result<Vec<Program>>;

    /// Delete a program.
    ///
    /// Returns `Ok(())` even if the program doesn't exist.
    fn delete(&self, id: &str) -> Result<()>;

    /// Check if a program exists.
    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Retrieve a program that must exist.
    fn require(&self, id: &str) -> Result<Program> {
        self.get(id)?.ok_or_else(|| OverloadError::program_not_found(id))
    }
}

/// Blanket implementation of ProgramStore for Arc-wrapped stores.
impl<T: ProgramStore + ?Sized> ProgramStore for Arc<T> {
    fn get(&self, id: &str) -> Result<Option<Program>> {
        (**self).get(id)
    }

    fn put(&self, program: &Program) -> Result<()> {
        (**self).put(program)
    }

    fn list(&self, limit: usize) -> Result<Vec<Program>> {
        (**self).list(limit)
    }

    fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id)
    }
}
