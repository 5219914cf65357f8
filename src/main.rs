//! Pinboard CLI - a project-planning canvas with snapshot autosave.

use clap::Parser;
use std::process;
use std::time::Instant;

use pinboard::action_log;
use pinboard::cli::{
    BoardCommands, Cli, Commands, LinkCommands, SnapshotCommands, SubtaskCommands, SystemCommands,
    TaskCommands,
};
use pinboard::commands::{self, CommandOutput, Ctx};
use pinboard::config::{Config, OutputFormat};
use pinboard::session;

fn main() {
    init_tracing();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: failed to load config: {}", err);
            process::exit(1);
        }
    };
    let human = cli.human_readable || config.output_format == OutputFormat::Human;

    let ctx = Ctx {
        project: cli.project.clone(),
        config,
    };
    let (cmd_name, args_json) = describe_command(&cli.command);

    let start = Instant::now();
    let result = run_command(cli.command, &ctx);
    let duration = start.elapsed().as_millis() as u64;

    let (success, error) = match &result {
        Ok(_) => (true, None),
        Err(err) => (false, Some(err.to_string())),
    };
    action_log::log_action(&ctx.project, &cmd_name, args_json, success, error, duration);

    match result {
        Ok(Some(output)) => print_output(&output, human),
        Ok(None) => {}
        Err(err) => {
            if human {
                eprintln!("Error: {}", err);
            } else {
                eprintln!("{}", serde_json::json!({"error": err.to_string()}));
            }
            process::exit(1);
        }
    }
}

/// Tracing goes to stderr so the JSON protocol on stdout stays clean.
/// Silent unless RUST_LOG asks for output.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_output(output: &CommandOutput, human: bool) {
    if human {
        println!("{}", output.human);
    } else {
        println!("{}", output.json);
    }
}

fn run_command(
    command: Commands,
    ctx: &Ctx,
) -> Result<Option<CommandOutput>, pinboard::Error> {
    let output = match command {
        Commands::System { command } => match command {
            SystemCommands::Init => commands::system_init(ctx)?,
            SystemCommands::Info => commands::system_info(ctx)?,
        },
        Commands::Task { command } => match command {
            TaskCommands::Add {
                title,
                description,
                status,
                hours,
                at,
            } => commands::task_add(ctx, &title, description, status, hours, at)?,
            TaskCommands::Update {
                id,
                title,
                description,
                status,
                hours,
                time_spent_secs,
            } => commands::task_update(ctx, &id, title, description, status, hours, time_spent_secs)?,
            TaskCommands::Move { id, x, y } => commands::task_move(ctx, &id, x, y)?,
            TaskCommands::Delete { id } => commands::task_delete(ctx, &id)?,
            TaskCommands::List => commands::task_list(ctx)?,
            TaskCommands::Show { id } => commands::task_show(ctx, &id)?,
        },
        Commands::Subtask { command } => match command {
            SubtaskCommands::Add {
                node_id,
                title,
                minutes,
            } => commands::subtask_add(ctx, &node_id, &title, minutes)?,
            SubtaskCommands::Update {
                node_id,
                subtask_id,
                title,
                completed,
                minutes,
                time_spent_secs,
                sort_order,
            } => commands::subtask_update(
                ctx,
                &node_id,
                &subtask_id,
                title,
                completed,
                minutes,
                time_spent_secs,
                sort_order,
            )?,
            SubtaskCommands::Delete {
                node_id,
                subtask_id,
            } => commands::subtask_delete(ctx, &node_id, &subtask_id)?,
        },
        Commands::Link { command } => match command {
            LinkCommands::Add {
                source,
                target,
                from_side,
                to_side,
            } => commands::link_add(ctx, &source, &target, from_side, to_side)?,
            LinkCommands::Delete { id } => commands::link_delete(ctx, &id)?,
            LinkCommands::List => commands::link_list(ctx)?,
        },
        Commands::Board { command } => match command {
            BoardCommands::Show => commands::board_show(ctx)?,
            BoardCommands::Reset => commands::board_reset(ctx)?,
        },
        Commands::Save { summary } => commands::save(ctx, summary)?,
        Commands::Snapshot { command } => match command {
            SnapshotCommands::List { limit, kind } => commands::snapshot_list(ctx, limit, kind)?,
            SnapshotCommands::Show { id } => commands::snapshot_show(ctx, &id)?,
            SnapshotCommands::Restore { id } => commands::snapshot_restore(ctx, &id)?,
        },
        Commands::Session { autosave_secs } => {
            session::run(ctx, autosave_secs)?;
            return Ok(None);
        }
    };
    Ok(Some(output))
}

/// Command name and argument summary for the action log.
fn describe_command(command: &Commands) -> (String, serde_json::Value) {
    use serde_json::json;
    match command {
        Commands::System { command } => match command {
            SystemCommands::Init => ("system init".to_string(), json!({})),
            SystemCommands::Info => ("system info".to_string(), json!({})),
        },
        Commands::Task { command } => match command {
            TaskCommands::Add { title, .. } => ("task add".to_string(), json!({"title": title})),
            TaskCommands::Update { id, .. } => ("task update".to_string(), json!({"id": id})),
            TaskCommands::Move { id, x, y } => {
                ("task move".to_string(), json!({"id": id, "x": x, "y": y}))
            }
            TaskCommands::Delete { id } => ("task delete".to_string(), json!({"id": id})),
            TaskCommands::List => ("task list".to_string(), json!({})),
            TaskCommands::Show { id } => ("task show".to_string(), json!({"id": id})),
        },
        Commands::Subtask { command } => match command {
            SubtaskCommands::Add { node_id, title, .. } => (
                "subtask add".to_string(),
                json!({"node_id": node_id, "title": title}),
            ),
            SubtaskCommands::Update {
                node_id,
                subtask_id,
                ..
            } => (
                "subtask update".to_string(),
                json!({"node_id": node_id, "subtask_id": subtask_id}),
            ),
            SubtaskCommands::Delete {
                node_id,
                subtask_id,
            } => (
                "subtask delete".to_string(),
                json!({"node_id": node_id, "subtask_id": subtask_id}),
            ),
        },
        Commands::Link { command } => match command {
            LinkCommands::Add { source, target, .. } => (
                "link add".to_string(),
                json!({"source": source, "target": target}),
            ),
            LinkCommands::Delete { id } => ("link delete".to_string(), json!({"id": id})),
            LinkCommands::List => ("link list".to_string(), json!({})),
        },
        Commands::Board { command } => match command {
            BoardCommands::Show => ("board show".to_string(), json!({})),
            BoardCommands::Reset => ("board reset".to_string(), json!({})),
        },
        Commands::Save { summary } => ("save".to_string(), json!({"summary": summary})),
        Commands::Snapshot { command } => match command {
            SnapshotCommands::List { limit, kind } => (
                "snapshot list".to_string(),
                json!({"limit": limit, "kind": kind.as_ref().map(|k| k.to_string())}),
            ),
            SnapshotCommands::Show { id } => ("snapshot show".to_string(), json!({"id": id})),
            SnapshotCommands::Restore { id } => {
                ("snapshot restore".to_string(), json!({"id": id}))
            }
        },
        Commands::Session { autosave_secs } => (
            "session".to_string(),
            json!({"autosave_secs": autosave_secs}),
        ),
    }
}
