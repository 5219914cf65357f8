//! Validated boundary for externally-emitted board commands.
//!
//! The chat assistant (or any loosely-typed caller) produces free text with
//! one embedded JSON command object. This module extracts the first
//! balanced object from the text, deserializes it into a typed
//! [`Directive`], validates field bounds, and only then drives the public
//! mutation API. Unvalidated input never reaches the store, and the store
//! has no awareness of who the caller was.

use serde::{Deserialize, Serialize};

use crate::models::{Connection, HandleSide, NodeDataPatch, Position, TaskStatus};
use crate::store::BoardStore;
use crate::{Error, Result};

/// Maximum accepted title length for directive-created entities.
pub const TITLE_MAX: usize = 500;

/// A structured board command, tagged by `action`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Directive {
    /// Create a task card.
    AddTask {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        status: Option<TaskStatus>,
        #[serde(default)]
        estimated_hours: Option<f64>,
        #[serde(default)]
        position: Option<Position>,
    },

    /// Merge fields into an existing card.
    UpdateTask {
        id: String,
        #[serde(flatten)]
        patch: NodeDataPatch,
    },

    /// Remove a card (and its edges).
    DeleteTask { id: String },

    /// Append a checklist item to a card.
    AddSubtask {
        id: String,
        title: String,
        #[serde(default)]
        estimated_minutes: Option<u32>,
    },

    /// Connect two cards.
    Connect {
        source: String,
        target: String,
        #[serde(default)]
        source_handle: Option<HandleSide>,
        #[serde(default)]
        target_handle: Option<HandleSide>,
    },
}

impl Directive {
    /// The wire name of this directive's action.
    pub fn action(&self) -> &'static str {
        match self {
            Directive::AddTask { .. } => "add_task",
            Directive::UpdateTask { .. } => "update_task",
            Directive::DeleteTask { .. } => "delete_task",
            Directive::AddSubtask { .. } => "add_subtask",
            Directive::Connect { .. } => "connect",
        }
    }
}

/// What a directive did, shaped for the caller's confirmation output.
#[derive(Debug, Clone, Serialize)]
pub struct Applied {
    pub action: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtask_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,

    /// Set when a connect gesture was silently dropped (missing endpoint)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped: Option<bool>,
}

impl Applied {
    fn new(action: &'static str) -> Self {
        Self {
            action,
            node_id: None,
            subtask_id: None,
            edge_id: None,
            dropped: None,
        }
    }
}

/// Extract the first balanced JSON object embedded in `text`.
///
/// Tracks string and escape state so braces inside string literals do not
/// confuse the scan. Returns `None` when no balanced object is present.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse and validate a directive out of free chat text.
pub fn parse(text: &str) -> Result<Directive> {
    let raw = extract_json(text)
        .ok_or_else(|| Error::InvalidInput("no command object found in text".to_string()))?;
    let directive: Directive = serde_json::from_str(raw)
        .map_err(|err| Error::InvalidInput(format!("malformed command: {}", err)))?;
    validate(&directive)?;
    Ok(directive)
}

fn validate(directive: &Directive) -> Result<()> {
    match directive {
        Directive::AddTask { title, .. } => require_title(title),
        Directive::UpdateTask { id, patch } => {
            require_id(id)?;
            if let Some(title) = &patch.title {
                require_title(title)?;
            }
            if patch.is_empty() {
                return Err(Error::InvalidInput(
                    "update_task carries no fields to update".to_string(),
                ));
            }
            Ok(())
        }
        Directive::DeleteTask { id } => require_id(id),
        Directive::AddSubtask { id, title, .. } => {
            require_id(id)?;
            require_title(title)
        }
        Directive::Connect { source, target, .. } => {
            require_id(source)?;
            require_id(target)
        }
    }
}

fn require_title(title: &str) -> Result<()> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("title must not be empty".to_string()));
    }
    if trimmed.chars().count() > TITLE_MAX {
        return Err(Error::InvalidInput(format!(
            "title exceeds {} characters",
            TITLE_MAX
        )));
    }
    Ok(())
}

fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidId("empty id".to_string()));
    }
    Ok(())
}

/// Drive the mutation engine with a validated directive.
///
/// "Id not found" stays a benign no-op, exactly as for any other caller;
/// a self-loop connect surfaces the store's validation error.
pub fn apply(directive: &Directive, store: &mut BoardStore) -> Result<Applied> {
    let mut applied = Applied::new(directive.action());
    match directive {
        Directive::AddTask {
            title,
            description,
            status,
            estimated_hours,
            position,
        } => {
            let patch = NodeDataPatch {
                title: Some(title.trim().to_string()),
                description: description.clone(),
                status: *status,
                estimated_hours: *estimated_hours,
                ..NodeDataPatch::default()
            };
            applied.node_id = Some(store.add_task(&patch, *position));
        }
        Directive::UpdateTask { id, patch } => {
            store.update_node_data(id, patch, true);
            applied.node_id = Some(id.clone());
        }
        Directive::DeleteTask { id } => {
            store.delete_node(id);
            applied.node_id = Some(id.clone());
        }
        Directive::AddSubtask {
            id,
            title,
            estimated_minutes,
        } => {
            applied.node_id = Some(id.clone());
            applied.subtask_id = store.add_subtask(id, title.trim(), estimated_minutes.unwrap_or(0));
        }
        Directive::Connect {
            source,
            target,
            source_handle,
            target_handle,
        } => {
            let connection = Connection {
                source: source.clone(),
                target: target.clone(),
                source_handle: *source_handle,
                target_handle: *target_handle,
            };
            match store.add_edge(&connection)? {
                Some(edge_id) => applied.edge_id = Some(edge_id),
                None => applied.dropped = Some(true),
            }
        }
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Board;

    fn store() -> BoardStore {
        let mut store = BoardStore::new("proj");
        store.replace_board(Board::default(), true);
        store
    }

    #[test]
    fn test_extract_json_from_prose() {
        let text = r#"Sure, I'll add that task: {"action": "add_task", "title": "Design"} done."#;
        assert_eq!(
            extract_json(text),
            Some(r#"{"action": "add_task", "title": "Design"}"#)
        );
    }

    #[test]
    fn test_extract_json_nested_and_braces_in_strings() {
        let text = r#"{"action": "update_task", "id": "pb-1", "description": "use {braces} here", "position": {"x": 1.0, "y": 2.0}}"#;
        assert_eq!(extract_json(text), Some(text));
    }

    #[test]
    fn test_extract_json_none_when_unbalanced() {
        assert!(extract_json("no object here").is_none());
        assert!(extract_json(r#"{"action": "add_task""#).is_none());
    }

    #[test]
    fn test_parse_rejects_malformed_command() {
        let result = parse(r#"{"action": "add_task", "title": 42}"#);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_parse_rejects_unknown_action() {
        let result = parse(r#"{"action": "explode", "id": "pb-1"}"#);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_parse_rejects_empty_title() {
        let result = parse(r#"{"action": "add_task", "title": "   "}"#);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_parse_rejects_update_without_fields() {
        let result = parse(r#"{"action": "update_task", "id": "pb-1"}"#);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_add_and_update_round_trip() {
        let mut store = store();

        let directive =
            parse(r#"Adding it now {"action": "add_task", "title": "Design", "estimated_hours": 2.5}"#)
                .unwrap();
        let applied = apply(&directive, &mut store).unwrap();
        let id = applied.node_id.unwrap();
        assert_eq!(store.node(&id).unwrap().data.estimated_hours, 2.5);

        let update = parse(&format!(
            r#"{{"action": "update_task", "id": "{}", "status": "in_progress"}}"#,
            id
        ))
        .unwrap();
        apply(&update, &mut store).unwrap();
        assert_eq!(
            store.node(&id).unwrap().data.status,
            TaskStatus::InProgress
        );
    }

    #[test]
    fn test_delete_missing_is_benign() {
        let mut store = store();
        let directive = parse(r#"{"action": "delete_task", "id": "pb-missing"}"#).unwrap();
        let applied = apply(&directive, &mut store).unwrap();
        assert_eq!(applied.action, "delete_task");
    }

    #[test]
    fn test_add_subtask_reports_sentinel_for_missing_node() {
        let mut store = store();
        let directive =
            parse(r#"{"action": "add_subtask", "id": "pb-missing", "title": "item"}"#).unwrap();
        let applied = apply(&directive, &mut store).unwrap();
        assert!(applied.subtask_id.is_none());
    }

    #[test]
    fn test_connect_self_loop_surfaces_validation_error() {
        let mut store = store();
        let directive = parse(
            r#"{"action": "add_task", "title": "Only"}"#,
        )
        .unwrap();
        let id = apply(&directive, &mut store).unwrap().node_id.unwrap();

        let connect = parse(&format!(
            r#"{{"action": "connect", "source": "{id}", "target": "{id}"}}"#
        ))
        .unwrap();
        assert!(matches!(
            apply(&connect, &mut store),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_connect_missing_endpoint_reports_dropped() {
        let mut store = store();
        let connect =
            parse(r#"{"action": "connect", "source": "pb-a", "target": "pb-b"}"#).unwrap();
        let applied = apply(&connect, &mut store).unwrap();
        assert_eq!(applied.dropped, Some(true));
        assert!(applied.edge_id.is_none());
    }
}
