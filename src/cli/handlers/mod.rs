mod init;
pub use init::cmd_init;

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use regex::Regex;

/// Global override for the working directory (set by -C flag)
static DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::drag;
use crate::io::config_io;
use crate::model::board::Board;
use crate::model::fields::{FieldKey, TaskPatch};
use crate::model::task::Priority;
use crate::ops::{hierarchy, search};
use crate::store;
use crate::sync::api::{ExportFormat, HttpApi, TaskDraft};
use crate::sync::session::Session;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;

    // Store -C override for discover_config()
    if let Some(ref dir) = cli.dir {
        let abs = fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?;
        DIR_OVERRIDE
            .lock()
            .map_err(|_| "directory override lock poisoned")?
            .replace(abs);
    }

    match cli.command {
        None => {
            // No subcommand → show the board
            cmd_board(json)
        }
        Some(cmd) => match cmd {
            // Init is handled before config discovery
            Commands::Init(args) => cmd_init(args),

            // Config edits don't need a live session
            Commands::Config(args) => cmd_config(args, json),

            // Read commands
            Commands::Board => cmd_board(json),
            Commands::Show(args) => cmd_show(args, json),
            Commands::Search(args) => cmd_search(args, json),

            // Write commands
            Commands::Add(args) => cmd_add(args, json),
            Commands::Edit(args) => cmd_edit(args),
            Commands::Mv(args) => cmd_mv(args),
            Commands::Close(args) => cmd_close(args),
            Commands::Reopen(args) => cmd_reopen(args),
            Commands::Parent(args) => cmd_parent(args),
            Commands::Import(args) => cmd_import(args, json),
            Commands::Export(args) => cmd_export(args),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn working_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let guard = DIR_OVERRIDE
        .lock()
        .map_err(|_| "directory override lock poisoned")?;
    match guard.as_ref() {
        Some(dir) => Ok(dir.clone()),
        None => Ok(std::env::current_dir()?),
    }
}

fn config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
    Ok(config_io::discover_config(&working_dir()?)?)
}

/// Load config and open a session against the bound board.
fn connect() -> Result<Session, Box<dyn std::error::Error>> {
    let path = config_path()?;
    let (config, _) = config_io::read_config(&path)?;
    if config.board.id.is_empty() {
        return Err("no board bound; run `cork config set-board <id>`".into());
    }
    let api = HttpApi::new(config.api.base_url.as_str(), config.api.timeout_secs);
    Ok(Session::connect(Box::new(api), &config.board.id)?)
}

/// Resolve a column reference: exact id first, then case-insensitive name.
fn resolve_column(board: &Board, reference: &str) -> Option<String> {
    if board.column(reference).is_some() {
        return Some(reference.to_string());
    }
    board
        .columns
        .values()
        .find(|c| c.name.eq_ignore_ascii_case(reference))
        .map(|c| c.id.clone())
}

/// Ask for confirmation on destructive operations.
fn confirm(prompt: &str) -> Result<bool, Box<dyn std::error::Error>> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_board(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = connect()?;
    let board = session.board();

    if json {
        let columns = board
            .columns
            .values()
            .map(|c| ColumnJson {
                id: c.id.clone(),
                name: c.name.clone(),
                tasks: store::tasks_in_column(board, &c.id)
                    .iter()
                    .map(|t| task_to_json(t))
                    .collect(),
            })
            .collect();
        return print_json(&BoardJson {
            id: board.id.clone(),
            name: board.name.clone(),
            columns,
        });
    }

    println!("{}", board.name);
    for column in board.columns.values() {
        let tasks = store::tasks_in_column(board, &column.id);
        println!("\n{} ({})", column.name, tasks.len());
        for task in tasks {
            println!("  {}", format_task_line(task));
        }
    }
    Ok(())
}

fn cmd_show(args: ShowArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = connect()?;
    if args.fresh {
        session.refresh_task(&args.id)?;
    }
    let board = session.board();
    let task = board
        .task(&args.id)
        .ok_or_else(|| format!("no task with id '{}'", args.id))?;

    let chain = if args.context {
        hierarchy::breadcrumbs(board, &args.id)
    } else {
        Vec::new()
    };
    let subtasks = hierarchy::children_of(board, &args.id);

    if json {
        return print_json(&ShowJson {
            breadcrumbs: chain.iter().map(|t| t.title.clone()).collect(),
            task: task_to_json(task),
            subtasks: subtasks.iter().map(|t| task_to_json(t)).collect(),
        });
    }

    if chain.len() > 1 {
        println!("{}", format_breadcrumbs(&chain));
        println!();
    }
    for line in format_task_detail(task) {
        println!("{}", line);
    }
    if !subtasks.is_empty() {
        println!("\nsubtasks:");
        for sub in subtasks {
            println!("  {}", format_task_line(sub));
        }
    }
    Ok(())
}

fn cmd_search(args: SearchArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let re = Regex::new(&args.pattern).map_err(|e| format!("invalid pattern: {}", e))?;
    let session = connect()?;
    let hits = search::search_tasks(session.board(), &re, args.closed);

    if json {
        let hits: Vec<_> = hits.iter().map(search_hit_to_json).collect();
        return print_json(&hits);
    }
    for hit in &hits {
        println!("{}", format_search_hit(hit));
    }
    if hits.is_empty() {
        println!("no matches");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = connect()?;
    let column_id = resolve_column(session.board(), &args.column)
        .ok_or_else(|| format!("no column '{}'", args.column))?;

    let mut draft = TaskDraft::new(args.title, column_id);
    draft.parent_task_ids = args.parent;
    draft.primary_parent_id = args.primary;
    draft.description = args.description;
    if let Some(p) = args.priority {
        draft.priority = Some(
            Priority::parse(&p).ok_or_else(|| format!("invalid priority '{}'", p))?,
        );
    }

    let created = session.create_task(draft)?;
    if json {
        return print_json(&task_to_json(&created));
    }
    println!("added {}", format_task_line(&created));
    Ok(())
}

fn cmd_edit(args: EditArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.fields.len() % 2 != 0 {
        return Err("fields must come in FIELD VALUE pairs".into());
    }
    let mut patch: TaskPatch = Vec::new();
    for pair in args.fields.chunks(2) {
        let key = FieldKey::from_cli_name(&pair[0])?;
        patch.push((key, key.decode(&pair[1])?));
    }

    let mut session = connect()?;
    session.patch_task(&args.id, patch)?;
    let task = session
        .board()
        .task(&args.id)
        .ok_or_else(|| format!("no task with id '{}'", args.id))?;
    println!("updated {}", format_task_line(task));
    Ok(())
}

fn cmd_mv(args: MvArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = connect()?;
    let board = session.board();

    let gesture = drag::begin_drag(board, &args.id)
        .ok_or_else(|| format!("task '{}' is not on the board", args.id))?;
    let target = match resolve_column(board, &args.onto) {
        Some(column_id) => drag::DropTarget::Column(column_id),
        None if board.task(&args.onto).is_some() => drag::DropTarget::Card(args.onto.clone()),
        None => return Err(format!("no column or task '{}'", args.onto).into()),
    };

    let Some(intent) = drag::resolve_drop(board, &gesture, &target) else {
        println!("{} already there", args.id);
        return Ok(());
    };
    session.move_task(&intent.task_id, &intent.to_column_id)?;

    let board = session.board();
    let column_name = board
        .column(&intent.to_column_id)
        .map(|c| c.name.as_str())
        .unwrap_or(intent.to_column_id.as_str());
    println!("moved {} to {}", args.id, column_name);
    Ok(())
}

fn cmd_close(args: CloseArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = connect()?;
    let task = session
        .board()
        .task(&args.id)
        .ok_or_else(|| format!("no task with id '{}'", args.id))?;
    let open_subtasks = hierarchy::children_of(session.board(), &args.id)
        .iter()
        .filter(|t| !t.is_closed())
        .count();

    if !args.yes {
        let mut prompt = format!("close '{}'", task.title);
        if open_subtasks > 0 {
            prompt.push_str(&format!(" ({} open subtasks stay open)", open_subtasks));
        }
        prompt.push('?');
        if !confirm(&prompt)? {
            println!("aborted");
            return Ok(());
        }
    }

    session.close_task(&args.id)?;
    println!("closed {}", args.id);
    Ok(())
}

fn cmd_reopen(args: ReopenArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = connect()?;
    session.reopen_task(&args.id, &args.reason)?;
    println!("reopened {}", args.id);
    Ok(())
}

fn cmd_parent(cmd: ParentCmd) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = connect()?;
    match cmd.action {
        ParentAction::Add(args) => {
            session.add_parent(&args.id, &args.parent)?;
            println!("linked {} under {}", args.id, args.parent);
        }
        ParentAction::Rm(args) => {
            session.remove_parent(&args.id, &args.parent)?;
            println!("unlinked {} from {}", args.id, args.parent);
        }
        ParentAction::Primary(args) => {
            session.set_primary_parent(&args.id, &args.parent)?;
            println!("primary parent of {} is now {}", args.id, args.parent);
        }
        ParentAction::Clear(args) => {
            if !args.yes && !confirm(&format!("remove all parent links from {}?", args.id))? {
                println!("aborted");
                return Ok(());
            }
            session.clear_parents(&args.id)?;
            println!("cleared parents of {}", args.id);
        }
    }
    Ok(())
}

fn cmd_import(args: ImportArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = PathBuf::from(&args.file);
    let bytes = fs::read(&path).map_err(|e| format!("cannot read {}: {}", args.file, e))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("bad file name: {}", args.file))?;

    let mut session = connect()?;
    let outcome = session.import_subtasks(&args.id, filename, &bytes)?;

    if json {
        return print_json(&import_to_json(outcome));
    }
    println!(
        "imported {} subtasks ({} rows skipped)",
        outcome.created, outcome.skipped
    );
    Ok(())
}

fn cmd_export(args: ExportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let format = match args.format.as_str() {
        "csv" => ExportFormat::Csv,
        "xlsx" => ExportFormat::Xlsx,
        other => return Err(format!("unknown format '{}' (csv or xlsx)", other).into()),
    };

    let session = connect()?;
    let bytes = session.export_task(&args.id, format)?;
    let out = args
        .out
        .unwrap_or_else(|| format!("{}.{}", args.id, format.as_str()));
    fs::write(&out, &bytes)?;
    println!("wrote {} ({} bytes)", out, bytes.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Config handlers
// ---------------------------------------------------------------------------

fn cmd_config(cmd: ConfigCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path()?;
    match cmd.action {
        ConfigAction::Show => {
            let (config, _) = config_io::read_config(&path)?;
            if json {
                return print_json(&config);
            }
            println!("config: {}", path.display());
            println!("api.base_url = {}", config.api.base_url);
            println!("api.timeout_secs = {}", config.api.timeout_secs);
            println!("board.id = {}", config.board.id);
            if !config.user.email.is_empty() {
                println!("user.email = {}", config.user.email);
            }
        }
        ConfigAction::SetBoard(arg) => {
            let (_, mut doc) = config_io::read_config(&path)?;
            config_io::set_board_id(&mut doc, &arg.value);
            config_io::write_config(&path, &doc)?;
            println!("board.id = {}", arg.value);
        }
        ConfigAction::SetUrl(arg) => {
            let (_, mut doc) = config_io::read_config(&path)?;
            config_io::set_base_url(&mut doc, &arg.value);
            config_io::write_config(&path, &doc)?;
            println!("api.base_url = {}", arg.value);
        }
    }
    Ok(())
}
