use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "planetboy-wallpaper", version, about = "Static and looping video desktop wallpaper.")]
pub struct Args {
    /// Override config path (default: ~/.planetboy_wallpaper/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log everything regardless of the configured level
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Set a wallpaper; videos keep playing until `stop` or Ctrl+C.
    /// Handed to the running wallpaper process when there is one.
    Set {
        path: PathBuf,
    },

    /// Stop the running video wallpaper
    Stop,

    /// Show what the running wallpaper process is playing
    Status,

    /// Re-apply the last wallpaper recorded in the library
    Apply,

    /// Import a file into the library
    Add {
        path: PathBuf,
        /// Also set it as the wallpaper
        #[arg(long)]
        set: bool,
    },

    /// Remove a library entry and its stored file
    Remove {
        path: PathBuf,
    },

    /// List library entries (current one marked with *)
    List,

    /// List monitors as the wallpaper sees them
    Monitors,

    /// Show the detected desktop shell layout
    Shell,

    /// Write a preview image of a wallpaper file
    Thumbnail {
        path: PathBuf,
        #[arg(long, short = 'o')]
        out: PathBuf,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
    },
}
