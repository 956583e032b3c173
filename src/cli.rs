use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "media-service")]
#[command(author, version, about = "HLS transcode queue for uploaded videos")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue videos for HLS encoding and wait until the queue is drained
    Enqueue {
        /// Uploaded video files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the encode status of a video as JSON
    Status {
        /// Video id (upload file name without extension)
        id: String,
    },

    /// Create the status table and its index if missing
    InitDb,
}
