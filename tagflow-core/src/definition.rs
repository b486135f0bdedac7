//! Table definition files.
//!
//! Definitions are JSON or YAML documents naming handlers instead of
//! embedding them:
//!
//! ```json
//! {
//!   "initial": "START",
//!   "states": {
//!     "START": {"o:item": ["ITEM", "count"]},
//!     "ITEM": {"c:item": "START", "t": {"to": "ITEM", "handler": "collect_text"}},
//!     "*": {"e": "DONE"}
//!   }
//! }
//! ```
//!
//! An entry is a bare next-state string, a `[target, handler]` pair, or a
//! `{to, handler}` map. Handler names are bound through a
//! [`HandlerRegistry`] when the definition is compiled.

use crate::error::CoreError;
use crate::registry::HandlerRegistry;
use crate::table::{TransitionEntry, TransitionTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One entry as written in a definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryDefinition {
    Bare(String),
    Pair(String, String),
    Handled { to: String, handler: String },
}

impl EntryDefinition {
    pub fn target(&self) -> &str {
        match self {
            EntryDefinition::Bare(to) => to,
            EntryDefinition::Pair(to, _) => to,
            EntryDefinition::Handled { to, .. } => to,
        }
    }

    pub fn handler(&self) -> Option<&str> {
        match self {
            EntryDefinition::Bare(_) => None,
            EntryDefinition::Pair(_, handler) => Some(handler),
            EntryDefinition::Handled { handler, .. } => Some(handler),
        }
    }
}

/// Transition table as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Suggested initial state for machines driven by this table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,

    /// State -> action -> entry. The `"*"` key is the wildcard row.
    pub states: BTreeMap<String, BTreeMap<String, EntryDefinition>>,

    /// Optional metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl TableDefinition {
    pub fn from_json(json: &serde_json::Value) -> Result<Self, CoreError> {
        let def: TableDefinition = serde_json::from_value(json.clone())?;
        def.validate()?;
        Ok(def)
    }

    pub fn from_json_str(s: &str) -> Result<Self, CoreError> {
        let def: TableDefinition = serde_json::from_str(s)?;
        def.validate()?;
        Ok(def)
    }

    pub fn from_yaml(s: &str) -> Result<Self, CoreError> {
        let def: TableDefinition = serde_yaml::from_str(s)?;
        def.validate()?;
        Ok(def)
    }

    /// Checks structural rules that serde cannot express.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(initial) = &self.initial {
            if initial.is_empty() {
                return Err(CoreError::InvalidDefinition {
                    reason: "initial state name is empty".to_string(),
                });
            }
        }

        for (state, row) in &self.states {
            if state.is_empty() {
                return Err(CoreError::InvalidDefinition {
                    reason: "state name is empty".to_string(),
                });
            }
            for (action, entry) in row {
                if action.is_empty() {
                    return Err(CoreError::InvalidDefinition {
                        reason: format!("empty action name in state '{}'", state),
                    });
                }
                if entry.target().is_empty() {
                    return Err(CoreError::InvalidDefinition {
                        reason: format!(
                            "empty target for '{}' in state '{}'",
                            action, state
                        ),
                    });
                }
                if entry.handler() == Some("") {
                    return Err(CoreError::InvalidDefinition {
                        reason: format!(
                            "empty handler name for '{}' in state '{}'",
                            action, state
                        ),
                    });
                }
            }
        }

        Ok(())
    }

    /// Returns every handler name referenced, sorted and deduplicated.
    pub fn handler_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .states
            .values()
            .flat_map(|row| row.values())
            .filter_map(EntryDefinition::handler)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// CRC32C of the canonical JSON form.
    pub fn checksum(&self) -> Result<String, CoreError> {
        let json_bytes = serde_json::to_vec(self)?;
        Ok(format!("{:08x}", crc32c::crc32c(&json_bytes)))
    }

    /// Binds handler names and builds the transition table.
    pub fn compile<D, A>(
        &self,
        registry: &HandlerRegistry<D, A>,
    ) -> Result<TransitionTable<D, A>, CoreError> {
        let mut table = TransitionTable::new();

        for (state, row) in &self.states {
            for (action, entry) in row {
                let compiled = match entry.handler() {
                    None => TransitionEntry::Bare(entry.target().to_string()),
                    Some(name) => {
                        let handler =
                            registry
                                .get(name)
                                .ok_or_else(|| CoreError::UnknownHandler {
                                    name: name.to_string(),
                                    state: state.clone(),
                                    action: action.clone(),
                                })?;
                        TransitionEntry::Handled {
                            target: entry.target().to_string(),
                            handler: Arc::clone(handler),
                        }
                    }
                };
                table.insert(state.clone(), action.clone(), compiled);
            }
        }

        tracing::debug!(
            "compiled table: {} states, {} entries",
            self.states.len(),
            table.len()
        );

        Ok(table)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }
}
