//! Durable memory facts
//!
//! A flat ordered list of facts the assistant has been asked to remember,
//! loaded at startup and rewritten on every mutation. Last writer wins;
//! there is no versioning or migration format.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Memory fact categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    /// Facts about the user themselves
    Personal,
    /// How the user likes things done
    Preference,
    /// Things the user wants done
    Task,
    /// Everything else
    General,
}

impl MemoryCategory {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Preference => "preference",
            Self::Task => "task",
            Self::General => "general",
        }
    }

    /// Parse a category name, returning `None` for unknown values
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "personal" => Some(Self::Personal),
            "preference" => Some(Self::Preference),
            "task" => Some(Self::Task),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One remembered fact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFact {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub category: MemoryCategory,
}

impl MemoryFact {
    /// Create a new fact stamped with the current time
    #[must_use]
    pub fn new(content: String, category: MemoryCategory) -> Self {
        Self {
            id: format!("mem_{}", Uuid::new_v4()),
            timestamp: Utc::now(),
            content,
            category,
        }
    }
}

/// File-backed store of memory facts, newest first
#[derive(Debug)]
pub struct MemoryStore {
    path: PathBuf,
    facts: Vec<MemoryFact>,
}

impl MemoryStore {
    /// Load the store from disk; a missing file yields an empty store
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let facts = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)
                .map_err(|e| Error::Memory(format!("corrupt store at {}: {e}", path.display())))?
        } else {
            Vec::new()
        };

        tracing::debug!(path = %path.display(), count = facts.len(), "memory store loaded");
        Ok(Self { path, facts })
    }

    /// Add a fact and persist the whole list
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be written
    pub fn add(&mut self, content: String, category: MemoryCategory) -> Result<MemoryFact> {
        let fact = MemoryFact::new(content, category);
        self.facts.insert(0, fact.clone());
        self.persist()?;
        Ok(fact)
    }

    /// Remove a fact by id and persist; returns whether anything changed
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be written
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let before = self.facts.len();
        self.facts.retain(|fact| fact.id != id);
        if self.facts.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Facts, newest first, optionally filtered by category
    #[must_use]
    pub fn list(&self, category: Option<MemoryCategory>) -> Vec<&MemoryFact> {
        self.facts
            .iter()
            .filter(|fact| category.is_none_or(|c| fact.category == c))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Rewrite the backing file with the current list
    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.facts)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
