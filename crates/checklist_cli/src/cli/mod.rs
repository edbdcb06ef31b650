use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "checklist", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a local account
    ///
    /// Example: checklist register ana@example.com secret
    Register { email: String, password: String },
    /// Sign in
    ///
    /// Example: checklist login ana@example.com secret
    Login { email: String, password: String },
    /// Sign out
    Logout,
    /// Add a task (daily unless --monthly)
    ///
    /// Example: checklist add "Water plants"
    /// Example: checklist add "Pay rent" --monthly
    Add {
        text: Option<String>,
        #[arg(long)]
        monthly: bool,
    },
    /// Toggle a task's completion flag
    ///
    /// Example: checklist toggle <id>
    Toggle { id: String },
    /// Delete a task
    ///
    /// Example: checklist delete <id>
    Delete { id: String },
    /// List tasks
    ///
    /// Example: checklist list daily
    List {
        #[command(subcommand)]
        list: Option<ListCommand>,
    },
    /// Show or change preferences
    ///
    /// Example: checklist prefs reset-time 12:00
    Prefs {
        #[command(subcommand)]
        prefs: Option<PrefsCommand>,
    },
    /// Hold live subscriptions and run the daily reset until sign-out
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// List daily tasks
    Daily,
    /// List monthly tasks
    Monthly,
    /// List every task
    All,
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    /// Show current preferences
    Show,
    /// Set the daily reset time
    ///
    /// Example: checklist prefs reset-time 12:00
    ResetTime { time: String },
    /// Turn dark mode on or off
    ///
    /// Example: checklist prefs dark-mode on
    DarkMode { state: String },
}

pub fn parse_on_off(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "true" => Ok(true),
        "off" | "false" => Ok(false),
        other => Err(format!("expected on or off, got '{other}'")),
    }
}
