//! Program storage for Overload.
//!
//! This module provides persistent storage for programs and the progression
//! data they own, supporting file-based and in-memory backends.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileProgramStore;
pub use memory::MemoryProgramStore;
pub use traits::ProgramStore;
