use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use std::path::PathBuf;
use tasklist::config::{self, Backend, Config};
use tasklist::{Slots, Task, TaskListStore};
use tracing::Level;

#[derive(Parser)]
#[command(name = "tasklist")]
#[command(about = "Keep a small persisted list of tasks")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/tasklist/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the persisted list
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Storage backend
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Slot key the list is stored under
    #[arg(short, long)]
    key: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show all tasks in order
    List,

    /// Add a task
    Add {
        /// Task text; words are joined with spaces
        text: Vec<String>,
    },

    /// Replace the text of a task
    Edit {
        /// 1-based list position, or id prefix; digits-only input up to the list length is read as a position
        id: String,
        /// New text; may be empty
        text: Vec<String>,
    },

    /// Mark a task done, or not done again
    Toggle {
        /// 1-based list position, or id prefix; digits-only input up to the list length is read as a position
        id: String,
    },

    /// Remove a task
    Delete {
        /// 1-based list position, or id prefix; digits-only input up to the list length is read as a position
        id: String,
    },

    /// Remove every completed task
    ClearDone,

    /// Print the persisted JSON
    Export,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    // Only the default location may be missing
    let mut config = match &cli.config {
        Some(path) => Config::load_required(path)?,
        None => Config::load(config::default_config_path())?,
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(key) = cli.key {
        config.key = key;
    }
    config.validate()?;

    let mut store = TaskListStore::open_with_key(config.open_slots()?, &config.key)?;
    run(&mut store, cli.command)
}

fn run<S: Slots>(store: &mut TaskListStore<S>, command: Commands) -> Result<()> {
    match command {
        Commands::List => {
            if store.tasks().is_empty() {
                println!("No tasks");
            }
            for (i, task) in store.tasks().iter().enumerate() {
                println!("{}", render(i + 1, task));
            }
        }
        Commands::Add { text } => {
            store.set_draft_input(text.join(" "));
            match store.add_task()? {
                Some(id) => println!("Added {}", id),
                None => println!("Nothing to add"),
            }
        }
        Commands::Edit { id, text } => {
            let id = resolve_target(store, &id)?;
            let current = store.get(&id).map(|t| t.text.clone()).unwrap_or_default();
            store.begin_edit(id.clone(), current);
            store.update_edit_draft(text.join(" "));
            store.commit_edit()?;
            println!("Edited {}", id);
        }
        Commands::Toggle { id } => {
            let id = resolve_target(store, &id)?;
            store.toggle_done(&id)?;
            let done = store.get(&id).is_some_and(|t| t.done);
            println!("{} {}", if done { "Done" } else { "Reopened" }, id);
        }
        Commands::Delete { id } => {
            let id = resolve_target(store, &id)?;
            store.delete_task(&id)?;
            println!("Deleted {}", id);
        }
        Commands::ClearDone => {
            let done: Vec<String> = store.tasks().iter().filter(|t| t.done).map(|t| t.id.clone()).collect();
            for id in &done {
                store.delete_task(id)?;
            }
            println!("Removed {} completed task(s)", done.len());
        }
        Commands::Export => {
            let blob = store.slots().get(store.key())?.unwrap_or_else(|| "[]".to_string());
            println!("{}", blob);
        }
    }

    Ok(())
}

/// Accept a 1-based list position or a unique id prefix
fn resolve_target<S: Slots>(store: &TaskListStore<S>, arg: &str) -> Result<String> {
    if let Ok(pos) = arg.parse::<usize>()
        && (1..=store.tasks().len()).contains(&pos)
    {
        return Ok(store.tasks()[pos - 1].id.clone());
    }
    store
        .resolve_id(arg)
        .map(str::to_string)
        .map_err(|e| eyre!("{} (use a list position or id prefix)", e))
}

fn render(pos: usize, task: &Task) -> String {
    if task.done {
        format!(
            "{:>3}. {} {}  {}",
            pos,
            "[x]".green(),
            task.text.strikethrough().dimmed(),
            task.id.dimmed()
        )
    } else {
        format!("{:>3}. [ ] {}  {}", pos, task.text, task.id.dimmed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tasklist::MemorySlots;

    fn store_with(texts: &[&str]) -> TaskListStore<MemorySlots> {
        let mut store = TaskListStore::open(MemorySlots::new()).unwrap();
        for text in texts {
            store.set_draft_input(*text);
            store.add_task().unwrap();
        }
        store
    }

    #[test]
    fn test_resolve_target_by_position() {
        let store = store_with(&["a", "b"]);
        assert_eq!(resolve_target(&store, "2").unwrap(), store.tasks()[1].id);
        assert!(resolve_target(&store, "3").is_err());
    }

    #[test]
    fn test_id_help_explains_positions() {
        let cmd = Cli::command();
        for name in ["edit", "toggle", "delete"] {
            let sub = cmd.find_subcommand(name).unwrap();
            let arg = sub.get_arguments().find(|a| a.get_id() == "id").unwrap();
            let help = arg.get_help().unwrap().to_string();
            assert!(help.contains("digits-only"), "{}: {}", name, help);
        }
    }

    #[test]
    fn test_resolve_target_by_id() {
        let store = store_with(&["a"]);
        let id = store.tasks()[0].id.clone();
        assert_eq!(resolve_target(&store, &id).unwrap(), id);
    }

    #[test]
    fn test_run_add_edit_toggle_clear() {
        let mut store = store_with(&[]);

        run(&mut store, Commands::Add { text: vec!["buy".into(), "milk".into()] }).unwrap();
        assert_eq!(store.tasks()[0].text, "buy milk");

        run(&mut store, Commands::Add { text: vec!["  ".into()] }).unwrap();
        assert_eq!(store.tasks().len(), 1);

        run(&mut store, Commands::Edit { id: "1".into(), text: vec!["buy oat milk".into()] }).unwrap();
        assert_eq!(store.tasks()[0].text, "buy oat milk");

        run(&mut store, Commands::Toggle { id: "1".into() }).unwrap();
        assert!(store.tasks()[0].done);

        run(&mut store, Commands::ClearDone).unwrap();
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn test_run_delete_unknown_is_error() {
        let mut store = store_with(&["a"]);
        assert!(run(&mut store, Commands::Delete { id: "zzz".into() }).is_err());
        assert_eq!(store.tasks().len(), 1);
    }

    #[test]
    fn test_render_marks_done() {
        colored::control::set_override(false);
        let mut task = Task::new("write report");
        assert!(render(1, &task).contains("  1. [ ] write report"));
        task.done = true;
        assert!(render(1, &task).contains("[x] write report"));
    }
}
