use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cork", about = concat!("[#] corkboard v", env!("CARGO_PKG_VERSION"), " - kanban from the terminal"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different working directory
    #[arg(short = 'C', long = "dir", global = true)]
    pub dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a corkboard.toml in the current directory
    Init(InitArgs),
    /// Show the board: columns and their top-level cards
    Board,
    /// Show task details
    Show(ShowArgs),
    /// Create a task in a column
    Add(AddArgs),
    /// Edit task fields (field value pairs, e.g. `edit t1 priority high`)
    Edit(EditArgs),
    /// Move a task onto a column or onto another card
    Mv(MvArgs),
    /// Close a task (soft delete; history is kept)
    Close(CloseArgs),
    /// Reopen a closed task with a reason
    Reopen(ReopenArgs),
    /// Manage parent links
    Parent(ParentCmd),
    /// Upload a spreadsheet of subtasks for a task
    Import(ImportArgs),
    /// Download a task and its subtasks as CSV or XLSX
    Export(ExportArgs),
    /// Search tasks by regex
    Search(SearchArgs),
    /// View or edit the local configuration
    Config(ConfigCmd),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// API base URL (default: http://localhost:3000/api)
    #[arg(long)]
    pub url: Option<String>,
    /// Board id to bind this directory to
    #[arg(long)]
    pub board: Option<String>,
    /// Overwrite an existing corkboard.toml
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ShowArgs {
    /// Task ID to show
    pub id: String,
    /// Include ancestor context (breadcrumb chain)
    #[arg(long)]
    pub context: bool,
    /// Refetch this task from the server before showing it
    #[arg(long)]
    pub fresh: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern to search for
    pub pattern: String,
    /// Include closed tasks
    #[arg(long)]
    pub closed: bool,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Column to add the task to (id or name)
    pub column: String,
    /// Task title
    pub title: String,
    /// Parent task ID (repeatable)
    #[arg(long)]
    pub parent: Vec<String>,
    /// Primary parent task ID (implies --parent)
    #[arg(long)]
    pub primary: Option<String>,
    /// Priority (low, medium, high, critical)
    #[arg(long)]
    pub priority: Option<String>,
    /// Description text
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task ID
    pub id: String,
    /// Field value pairs: title, description, state, status, priority, xp,
    /// est-hours, notes, deps, start, end, log-hours
    #[arg(required = true, num_args = 2.., value_names = ["FIELD", "VALUE"])]
    pub fields: Vec<String>,
}

#[derive(Args)]
pub struct MvArgs {
    /// Task ID
    pub id: String,
    /// Drop target: a column (id or name) or another task ID
    #[arg(long)]
    pub onto: String,
}

#[derive(Args)]
pub struct CloseArgs {
    /// Task ID
    pub id: String,
    /// Skip confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ReopenArgs {
    /// Task ID
    pub id: String,
    /// Why the task is being reopened
    pub reason: String,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Task ID to import subtasks under
    pub id: String,
    /// Spreadsheet file to upload
    pub file: String,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Task ID to export
    pub id: String,
    /// Output format: csv or xlsx
    #[arg(long, default_value = "csv")]
    pub format: String,
    /// Output file (default: <task-id>.<format>)
    #[arg(long)]
    pub out: Option<String>,
}

// ---------------------------------------------------------------------------
// Parent links
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ParentCmd {
    #[command(subcommand)]
    pub action: ParentAction,
}

#[derive(Subcommand)]
pub enum ParentAction {
    /// Link a task under a parent
    Add(ParentLinkArgs),
    /// Unlink a task from a parent
    Rm(ParentLinkArgs),
    /// Set the primary parent (adds the link if missing)
    Primary(ParentLinkArgs),
    /// Remove all parent links
    Clear(ParentClearArgs),
}

#[derive(Args)]
pub struct ParentLinkArgs {
    /// Child task ID
    pub id: String,
    /// Parent task ID
    pub parent: String,
}

#[derive(Args)]
pub struct ParentClearArgs {
    /// Child task ID
    pub id: String,
    /// Skip confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the resolved configuration
    Show,
    /// Bind this directory to a board
    SetBoard(ConfigValueArg),
    /// Set the API base URL
    SetUrl(ConfigValueArg),
}

#[derive(Args)]
pub struct ConfigValueArg {
    pub value: String,
}
