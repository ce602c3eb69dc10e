//! File-based program storage for Overload.
//!
//! Programs are stored as JSON files in `~/.overload/programs/`.
//! Atomic writes are achieved via temp file + rename pattern.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::config::programs_dir;
use crate::core::Program;
use crate::error::{OverloadError, Result};
use crate::storage::ProgramStore;
use crate::util::{read_to_string_limited, validate_id};

/// File-based program storage.
///
/// Stores one pretty-printed JSON file per program.
#[derive(Debug, Clone)]
pub struct FileProgramStore {
    /// Directory where program files are stored.
    programs_dir: PathBuf,
}

impl FileProgramStore {
    /// Create a new file program store with the default directory.
    ///
    /// Uses `~/.overload/programs/` or `$OVERLOAD_HOME/programs/`.
    pub fn new() -> Result<Self> {
        let dir = programs_dir().ok_or_else(|| {
            OverloadError::config("Could not determine programs directory (no home directory)")
        })?;
        Self::with_dir(dir)
    }

    /// Create a new file program store with a custom directory.
    pub fn with_dir(programs_dir: impl Into<PathBuf>) -> Result<Self> {
        let programs_dir = programs_dir.into();

        if !programs_dir.exists() {
            fs::create_dir_all(&programs_dir)
                .map_err(|e| OverloadError::storage(&programs_dir, e))?;
        }

        Ok(Self { programs_dir })
    }

    /// Directory the store writes to.
    pub fn dir(&self) -> &PathBuf {
        &self.programs_dir
    }

    /// Get the path for a program file.
    fn program_path(&self, id: &str) -> PathBuf {
        self.programs_dir.join(format!("{}.json", id))
    }

    /// Get the path for a temp file used during atomic writes.
    fn temp_path(&self, id: &str) -> PathBuf {
        self.programs_dir.join(format!(".{}.json.tmp", id))
    }

    /// Write a program atomically using temp file + rename.
    fn atomic_write(&self, program: &Program) -> Result<()> {
        let final_path = self.program_path(&program.id);
        let temp_path = self.temp_path(&program.id);

        let json = serde_json::to_string_pretty(program)?;

        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| OverloadError::storage(&temp_path, e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| OverloadError::storage(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| OverloadError::storage(&temp_path, e))?;
        }

        fs::rename(&temp_path, &final_path)
            .map_err(|e| OverloadError::storage(&final_path, e))?;

        Ok(())
    }
}

impl ProgramStore for FileProgramStore {
    fn get(&self, id: &str) -> Result<Option<Program>> {
        validate_id(id)?;
        let path = self.program_path(id);

        if !path.exists() {
            return Ok(None);
        }

        let content = read_to_string_limited(&path)?;
        let program: Program = serde_json::from_str(&content)?;

        Ok(Some(program.normalized()))
    }

    fn put(&self, program: &Program) -> Result<()> {
        validate_id(&program.id)?;
        self.atomic_write(program)?;
        tracing::debug!(program_id = %program.id, "saved program");
        Ok(())
    }

    fn list(&self, limit: usize) -> Result<Vec<Program>> {
        if !self.programs_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.programs_dir)
            .map_err(|e| OverloadError::storage(&self.programs_dir, e))?;

        let mut programs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| OverloadError::storage(&self.programs_dir, e))?;
            let path = entry.path();

            // Skip non-JSON files and temp files
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            if path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
            {
                continue;
            }

            match read_to_string_limited(&path)
                .and_then(|content| Ok(serde_json::from_str::<Program>(&content)?))
            {
                Ok(program) => programs.push(program.normalized()),
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "skipping unreadable program")
                }
            }
        }

        programs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        programs.truncate(limit);

        Ok(programs)
    }

    fn delete(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        let path = self.program_path(id);

        if path.exists() {
            fs::remove_file(&path).map_err(|e| OverloadError::storage(&path, e))?;
        }

        let temp_path = self.temp_path(id);
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }

        Ok(())
    }
}
