use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "ytrackie",
    version,
    about = "Track progress through YouTube playlists as courses"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List tracked courses with their progress
    List,
    /// Show the video checklist of a course
    Show { course: String },
    /// Fetch a playlist through the YouTube Data API and add it as a course
    Add {
        url: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Add a course from a saved, rendered playlist page
    Import {
        #[command(flatten)]
        page: PageArgs,
        #[arg(short, long)]
        yes: bool,
        /// Refuse pages that show fewer videos than the playlist reports
        #[arg(long)]
        strict: bool,
    },
    /// Answer a getPlaylistInfo request against a saved playlist page
    Scrape {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Mark a video watched, or unwatched if it already is
    Toggle { course: String, video: String },
    /// Set or clear the target completion date (YYYY-MM-DD)
    Target {
        course: String,
        #[arg(required_unless_present = "clear")]
        date: Option<String>,
        #[arg(long, conflicts_with = "date")]
        clear: bool,
    },
    /// Delete a course
    Remove { course: String },
    /// Store the YouTube Data API key
    SetKey {
        #[arg(required_unless_present = "clear")]
        key: Option<String>,
        /// Forget the stored key instead
        #[arg(long, conflicts_with = "key")]
        clear: bool,
    },
    /// Open the interactive course browser (the default)
    Tui,
}

impl Cli {
    pub fn launches_tui(&self) -> bool {
        matches!(self.command, None | Some(Command::Tui))
    }
}

#[derive(Debug, Args)]
pub struct PageArgs {
    /// Address the page was saved from; must carry the `list` parameter
    #[arg(long)]
    pub page_url: String,
    /// HTML of the page as rendered by the browser
    #[arg(long)]
    pub html: PathBuf,
}
