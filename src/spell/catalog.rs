//! Read-only spell lookup by id within a named line

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SpellError};
use crate::core::types::SpellId;
use crate::spell::definition::SpellDefinition;

/// A named line of spells sharing a specialization key.
///
/// Baseline lines get the wider damage variance; specialization lines
/// always roll at the top of the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellLine {
    pub key: String,
    pub spec: String,
    pub baseline: bool,
}

impl SpellLine {
    pub fn baseline(key: &str, spec: &str) -> Self {
        Self {
            key: key.to_string(),
            spec: spec.to_string(),
            baseline: true,
        }
    }

    pub fn specialization(key: &str, spec: &str) -> Self {
        Self {
            key: key.to_string(),
            spec: spec.to_string(),
            baseline: false,
        }
    }
}

struct Line {
    info: SpellLine,
    spells: AHashMap<SpellId, Arc<SpellDefinition>>,
}

/// Process-lifetime registry of spell definitions, built at startup and
/// passed by reference. Never a hidden singleton.
#[derive(Default)]
pub struct SpellCatalog {
    lines: AHashMap<String, Line>,
}

/// On-disk catalog shape: one record per line with its spells inline.
#[derive(Serialize, Deserialize)]
struct LineRecord {
    #[serde(flatten)]
    line: SpellLine,
    spells: Vec<SpellDefinition>,
}

impl SpellCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a catalog from its JSON form, an array of line records.
    pub fn from_json(data: &str) -> Result<Self> {
        let records: Vec<LineRecord> = serde_json::from_str(data)?;
        let mut catalog = Self::new();
        for record in records {
            let key = record.line.key.clone();
            catalog.add_line(record.line);
            for spell in record.spells {
                catalog.add_spell(&key, spell);
            }
        }
        Ok(catalog)
    }

    pub fn add_line(&mut self, line: SpellLine) {
        self.lines.entry(line.key.clone()).or_insert(Line {
            info: line,
            spells: AHashMap::new(),
        });
    }

    pub fn add_spell(&mut self, line_key: &str, spell: SpellDefinition) {
        let line = self
            .lines
            .entry(line_key.to_string())
            .or_insert_with(|| Line {
                info: SpellLine::baseline(line_key, line_key),
                spells: AHashMap::new(),
            });
        line.spells.insert(spell.id, Arc::new(spell));
    }

    pub fn line(&self, key: &str) -> Result<&SpellLine> {
        self.lines
            .get(key)
            .map(|l| &l.info)
            .ok_or_else(|| SpellError::UnknownLine(key.to_string()))
    }

    pub fn find(&self, line_key: &str, id: SpellId) -> Result<(Arc<SpellDefinition>, SpellLine)> {
        let line = self
            .lines
            .get(line_key)
            .ok_or_else(|| SpellError::UnknownLine(line_key.to_string()))?;
        let spell = line
            .spells
            .get(&id)
            .cloned()
            .ok_or_else(|| SpellError::UnknownSpell(line_key.to_string(), id))?;
        Ok((spell, line.info.clone()))
    }
}
