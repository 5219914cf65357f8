//! CLI argument definitions for pinboard.

use clap::{Parser, Subcommand};

use crate::models::{HandleSide, Position, TaskStatus};
use crate::storage::SnapshotKind;

/// Pinboard - a project-planning canvas in the terminal.
///
/// Cards live on a per-project board, connected by directed edges. Every
/// mutating command persists a snapshot; `pb session` opens an interactive
/// loop with undo/redo and autosave.
#[derive(Parser, Debug)]
#[command(name = "pb")]
#[command(author, version, about = "A project-planning canvas with snapshot autosave", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Project to operate on. Can also be set via PB_PROJECT.
    #[arg(
        short = 'p',
        long = "project",
        global = true,
        env = "PB_PROJECT",
        default_value = "default"
    )]
    pub project: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Task card commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Subtask (checklist) commands
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommands,
    },

    /// Edge commands (connections between cards)
    Link {
        #[command(subcommand)]
        command: LinkCommands,
    },

    /// Whole-board commands
    Board {
        #[command(subcommand)]
        command: BoardCommands,
    },

    /// Persist a manual snapshot of the current board
    Save {
        /// Optional summary stored with the snapshot
        #[arg(long)]
        summary: Option<String>,
    },

    /// Snapshot history commands
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },

    /// Interactive stdin session with undo/redo and autosave
    ///
    /// Reads one command per line: free text with an embedded JSON
    /// directive, or `save`, `undo`, `redo`, `show`, `reset`, `quit`.
    Session {
        /// Override the configured autosave interval (seconds)
        #[arg(long)]
        autosave_secs: Option<u64>,
    },

    /// System administration commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

/// Task card subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task card
    Add {
        /// Card title
        title: String,

        /// Free-text description
        #[arg(long)]
        description: Option<String>,

        /// Initial status (not_started, in_progress, done, blocked)
        #[arg(long)]
        status: Option<TaskStatus>,

        /// Estimated effort in hours
        #[arg(long)]
        hours: Option<f64>,

        /// Explicit canvas position; auto-placed when omitted
        #[arg(long, value_parser = parse_position, value_name = "X,Y")]
        at: Option<Position>,
    },

    /// Merge fields into an existing card
    Update {
        /// Node id (e.g., pb-a1b2c3d4)
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        status: Option<TaskStatus>,

        #[arg(long)]
        hours: Option<f64>,

        /// Total time spent in seconds
        #[arg(long)]
        time_spent_secs: Option<u64>,
    },

    /// Reposition a card
    Move {
        /// Node id
        id: String,
        x: f64,
        y: f64,
    },

    /// Delete a card and every edge touching it
    Delete {
        /// Node id
        id: String,
    },

    /// List cards on the board
    List,

    /// Show one card in full
    Show {
        /// Node id
        id: String,
    },
}

/// Subtask subcommands
#[derive(Subcommand, Debug)]
pub enum SubtaskCommands {
    /// Append a checklist item to a card
    Add {
        /// Parent node id
        node_id: String,

        /// Subtask title
        title: String,

        /// Estimated duration in minutes
        #[arg(long)]
        minutes: Option<u32>,
    },

    /// Merge fields into a checklist item
    Update {
        /// Parent node id
        node_id: String,

        /// Subtask id (e.g., pbs-a1b2)
        subtask_id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        completed: Option<bool>,

        /// Estimated duration in minutes
        #[arg(long)]
        minutes: Option<u32>,

        /// Time spent in seconds
        #[arg(long)]
        time_spent_secs: Option<u64>,

        /// Advisory display order
        #[arg(long)]
        sort_order: Option<u32>,
    },

    /// Remove a checklist item
    Delete {
        /// Parent node id
        node_id: String,

        /// Subtask id
        subtask_id: String,
    },
}

/// Edge subcommands
#[derive(Subcommand, Debug)]
pub enum LinkCommands {
    /// Connect two cards
    Add {
        /// Source node id
        source: String,

        /// Target node id
        target: String,

        /// Side of the source card (top, bottom, left, right)
        #[arg(long)]
        from_side: Option<HandleSide>,

        /// Side of the target card
        #[arg(long)]
        to_side: Option<HandleSide>,
    },

    /// Remove an edge by id
    Delete {
        /// Edge id (e.g., pbe-a1b2c3d4)
        id: String,
    },

    /// List edges on the board
    List,
}

/// Whole-board subcommands
#[derive(Subcommand, Debug)]
pub enum BoardCommands {
    /// Print the full board
    Show,

    /// Replace the board with the starter content
    Reset,
}

/// Snapshot subcommands
#[derive(Subcommand, Debug)]
pub enum SnapshotCommands {
    /// List persisted snapshots, newest first
    List {
        /// Maximum rows (0 for all)
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Filter by kind (manual, autosave, ai_generated)
        #[arg(long)]
        kind: Option<SnapshotKind>,
    },

    /// Show one snapshot's board payload
    Show {
        /// Snapshot id (e.g., snap-a1b2c3d4)
        id: String,
    },

    /// Replace the board with a historical snapshot and re-save it
    Restore {
        /// Snapshot id
        id: String,
    },
}

/// System administration subcommands
#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Initialize snapshot storage for the project
    Init,

    /// Show version, build, and storage information
    Info,
}

fn parse_position(raw: &str) -> Result<Position, String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", raw))?;
    let x: f64 = x.trim().parse().map_err(|_| format!("invalid x: '{}'", x))?;
    let y: f64 = y.trim().parse().map_err(|_| format!("invalid y: '{}'", y))?;
    Ok(Position::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("10,20").unwrap(), Position::new(10.0, 20.0));
        assert_eq!(
            parse_position(" 1.5 , -3 ").unwrap(),
            Position::new(1.5, -3.0)
        );
        assert!(parse_position("10").is_err());
        assert!(parse_position("a,b").is_err());
    }

    #[test]
    fn test_cli_parses_task_add() {
        let cli = Cli::try_parse_from([
            "pb", "task", "add", "Design", "--status", "in_progress", "--at", "10,20",
        ])
        .unwrap();
        match cli.command {
            Commands::Task {
                command: TaskCommands::Add { title, status, at, .. },
            } => {
                assert_eq!(title, "Design");
                assert_eq!(status, Some(TaskStatus::InProgress));
                assert_eq!(at, Some(Position::new(10.0, 20.0)));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_bad_status() {
        assert!(Cli::try_parse_from(["pb", "task", "add", "Design", "--status", "later"]).is_err());
    }
}
