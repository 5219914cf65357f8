//! Data models for the pinboard canvas.
//!
//! This module defines the core data structures:
//! - `TaskNode` - A task card placed on the board, with position and payload
//! - `Subtask` - A checklist item owned by exactly one node
//! - `BoardEdge` - A directed connection between two nodes
//! - `Board` - The serialized `{nodes, edges}` aggregate used for snapshots
//!   and history entries
//! - `Connection` - The drag-connect gesture input for edge creation

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum subtask title length; longer titles are truncated at construction.
pub const SUBTASK_TITLE_MAX: usize = 160;

/// Task status shown on a card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Done,
    Blocked,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(TaskStatus::NotStarted),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "blocked" => Ok(TaskStatus::Blocked),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// A point on the canvas. Always defined for every node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Which side of a card an edge attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleSide {
    Top,
    Bottom,
    Left,
    Right,
}

impl fmt::Display for HandleSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandleSide::Top => "top",
            HandleSide::Bottom => "bottom",
            HandleSide::Left => "left",
            HandleSide::Right => "right",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for HandleSide {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "top" => Ok(HandleSide::Top),
            "bottom" => Ok(HandleSide::Bottom),
            "left" => Ok(HandleSide::Left),
            "right" => Ok(HandleSide::Right),
            _ => Err(format!("Unknown handle side: {}", s)),
        }
    }
}

/// A checklist item owned by exactly one node.
///
/// The id is unique within the parent node's subtask list only, not
/// globally. Estimated durations are canonically minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    /// Identifier unique within the parent node (e.g., "pbs-a1b2")
    pub id: String,

    /// Subtask title, truncated to `SUBTASK_TITLE_MAX` characters
    pub title: String,

    /// Whether the item is checked off
    #[serde(default)]
    pub completed: bool,

    /// Estimated duration in minutes
    #[serde(default)]
    pub estimated_minutes: u32,

    /// Time spent in seconds
    #[serde(default)]
    pub time_spent_secs: u64,

    /// Advisory display ordering; the engine never re-sorts by it
    #[serde(default)]
    pub sort_order: u32,
}

impl Subtask {
    /// Create a new subtask. The title is truncated to the documented bound;
    /// completion defaults to false and time spent to zero.
    pub fn new(id: String, title: &str, estimated_minutes: u32, sort_order: u32) -> Self {
        Self {
            id,
            title: bounded_title(title),
            completed: false,
            estimated_minutes,
            time_spent_secs: 0,
            sort_order,
        }
    }
}

fn bounded_title(title: &str) -> String {
    if title.chars().count() <= SUBTASK_TITLE_MAX {
        title.to_string()
    } else {
        title.chars().take(SUBTASK_TITLE_MAX).collect()
    }
}

/// The data payload of a task card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Card title
    pub title: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Current status
    #[serde(default)]
    pub status: TaskStatus,

    /// Estimated effort in hours
    #[serde(default)]
    pub estimated_hours: f64,

    /// Time spent in seconds (incremented by timer ticks)
    #[serde(default)]
    pub time_spent_secs: u64,

    /// Checklist items, in insertion order
    #[serde(default)]
    pub subtasks: Vec<Subtask>,

    /// Opaque comment references owned by an external collaborator
    #[serde(default)]
    pub comments: Vec<String>,

    /// Opaque member references owned by an external collaborator
    #[serde(default)]
    pub members: Vec<String>,
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            title: "Untitled task".to_string(),
            description: String::new(),
            status: TaskStatus::default(),
            estimated_hours: 0.0,
            time_spent_secs: 0,
            subtasks: Vec::new(),
            comments: Vec::new(),
            members: Vec::new(),
        }
    }
}

impl NodeData {
    /// Defaults with a caller-supplied patch merged over them.
    pub fn from_patch(patch: &NodeDataPatch) -> Self {
        let mut data = Self::default();
        patch.apply_to(&mut data);
        data
    }

    /// Sum of subtask estimates, in minutes.
    pub fn estimated_minutes_total(&self) -> u32 {
        self.subtasks.iter().map(|s| s.estimated_minutes).sum()
    }
}

/// A shallow field-level update for `NodeData`. `None` fields are left
/// untouched; subtasks are managed through the dedicated subtask operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDataPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

impl NodeDataPatch {
    /// Merge the provided fields into `data`, leaving the rest alone.
    pub fn apply_to(&self, data: &mut NodeData) {
        if let Some(title) = &self.title {
            data.title = title.clone();
        }
        if let Some(description) = &self.description {
            data.description = description.clone();
        }
        if let Some(status) = self.status {
            data.status = status;
        }
        if let Some(hours) = self.estimated_hours {
            data.estimated_hours = hours;
        }
        if let Some(secs) = self.time_spent_secs {
            data.time_spent_secs = secs;
        }
        if let Some(comments) = &self.comments {
            data.comments = comments.clone();
        }
        if let Some(members) = &self.members {
            data.members = members.clone();
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.estimated_hours.is_none()
            && self.time_spent_secs.is_none()
            && self.comments.is_none()
            && self.members.is_none()
    }
}

/// A field-level update for a `Subtask`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<u32>,
}

impl SubtaskPatch {
    /// Merge the provided fields into `subtask`. Titles stay bounded.
    pub fn apply_to(&self, subtask: &mut Subtask) {
        if let Some(title) = &self.title {
            subtask.title = bounded_title(title);
        }
        if let Some(completed) = self.completed {
            subtask.completed = completed;
        }
        if let Some(minutes) = self.estimated_minutes {
            subtask.estimated_minutes = minutes;
        }
        if let Some(secs) = self.time_spent_secs {
            subtask.time_spent_secs = secs;
        }
        if let Some(order) = self.sort_order {
            subtask.sort_order = order;
        }
    }
}

/// A task card placed on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    /// Unique identifier (e.g., "pb-a1b2c3d4"), stable for the node's lifetime
    pub id: String,

    /// Canvas position
    pub position: Position,

    /// Card payload
    pub data: NodeData,
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardEdge {
    /// Unique identifier (e.g., "pbe-a1b2c3d4")
    pub id: String,

    /// Source node id
    pub source: String,

    /// Target node id
    pub target: String,

    /// Side of the source card the edge leaves from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<HandleSide>,

    /// Side of the target card the edge arrives at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<HandleSide>,
}

/// The drag-connect gesture input for `add_edge`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub source: String,
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<HandleSide>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<HandleSide>,
}

/// The full `{nodes, edges}` aggregate: the snapshot payload and the
/// history entry type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    #[serde(default)]
    pub nodes: Vec<TaskNode>,

    #[serde(default)]
    pub edges: Vec<BoardEdge>,
}

fn short_hex(len: usize) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..len].to_string()
}

/// Generate a node id unused by any node in `existing`.
pub fn new_node_id(existing: &[TaskNode]) -> String {
    loop {
        let id = format!("pb-{}", short_hex(8));
        if !existing.iter().any(|n| n.id == id) {
            return id;
        }
    }
}

/// Generate an edge id unused by any edge in `existing`.
pub fn new_edge_id(existing: &[BoardEdge]) -> String {
    loop {
        let id = format!("pbe-{}", short_hex(8));
        if !existing.iter().any(|e| e.id == id) {
            return id;
        }
    }
}

/// Generate a subtask id unused within one parent's list.
pub fn new_subtask_id(existing: &[Subtask]) -> String {
    loop {
        let id = format!("pbs-{}", short_hex(4));
        if !existing.iter().any(|s| s.id == id) {
            return id;
        }
    }
}

/// Sort order for a subtask appended at the end of the list.
pub fn next_sort_order(existing: &[Subtask]) -> u32 {
    existing
        .iter()
        .map(|s| s.sort_order)
        .max()
        .map(|max| max + 1)
        .unwrap_or(0)
}

const AUTO_ORIGIN: f64 = 120.0;
const AUTO_STEP: f64 = 48.0;

/// Auto-placement for nodes created without an explicit position: a
/// diagonal offset from the canvas origin, nudged until it does not
/// exactly overlap an existing node.
pub fn auto_position(existing: &[TaskNode]) -> Position {
    let k = existing.len() as f64;
    let mut pos = Position::new(AUTO_ORIGIN + AUTO_STEP * k, AUTO_ORIGIN + AUTO_STEP * k);
    while existing
        .iter()
        .any(|n| n.position.x == pos.x && n.position.y == pos.y)
    {
        pos.x += AUTO_STEP;
        pos.y += AUTO_STEP;
    }
    pos
}

/// The documented default board: a single instructional card.
pub fn starter_board() -> Board {
    let data = NodeData {
        title: "Welcome to your board".to_string(),
        description: "Add tasks, connect them with edges, and break work down \
                      into subtasks. Everything here is autosaved."
            .to_string(),
        ..NodeData::default()
    };
    let node = TaskNode {
        id: new_node_id(&[]),
        position: Position::new(160.0, 120.0),
        data,
    };
    Board {
        nodes: vec![node],
        edges: Vec::new(),
    }
}
