use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ai-assistant")]
#[command(about = "Hotkey screenshot → Gemini → answer pasted at the cursor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (default: <config dir>/ai-assistant/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run in the background and listen for hotkeys (default)
    Run,

    /// Manage Gemini API keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Send a tiny request with the active key
    Test,

    /// Take one screenshot to check capture works
    Capture {
        /// Save the PNG even if screenshot.save_to_disk is off
        #[arg(long)]
        save: bool,
    },

    /// Launch on login
    Startup {
        #[command(subcommand)]
        action: StartupAction,
    },

    /// Print the config file location
    ConfigPath,
}

#[derive(Subcommand, Debug)]
pub enum KeysAction {
    /// List keys (masked) and mark the active one
    List,
    /// Append a key to the rotation
    Add { key: String },
    /// Remove the key at a position
    Remove { position: usize },
    /// Move a key to a new position
    Move { from: usize, to: usize },
    /// Make the key at a position active
    Use { position: usize },
    /// Turn rotation on quota errors on or off
    Rotate {
        #[arg(action = clap::ArgAction::Set, value_parser = clap::builder::BoolishValueParser::new())]
        enabled: bool,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum StartupAction {
    Enable,
    Disable,
    Status,
}
