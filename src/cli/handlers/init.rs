use std::fs;

use crate::cli::commands::InitArgs;
use crate::io::config_io::CONFIG_FILE;

const CONFIG_TEMPLATE: &str = r#"[api]
# Base URL of the persistence API.
base_url = "{url}"
# Request timeout in seconds.
timeout_secs = 30

[board]
# Bind this directory to a board: cork config set-board <id>
id = "{board}"

[user]
# Informational only; sessions are handled upstream.
email = ""
"#;

const DEFAULT_URL: &str = "http://localhost:3000/api";

pub fn cmd_init(args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::current_dir()?.join(CONFIG_FILE);
    if path.exists() && !args.force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }

    let content = CONFIG_TEMPLATE
        .replace("{url}", args.url.as_deref().unwrap_or(DEFAULT_URL))
        .replace("{board}", args.board.as_deref().unwrap_or(""));
    fs::write(&path, content)?;

    println!("wrote {}", path.display());
    if args.board.is_none() {
        println!("next: cork config set-board <id>");
    }
    Ok(())
}
