use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use mdconvert_core::TaskId;

use super::logging::LogDestination;

#[derive(Parser, Debug)]
#[command(
    name = "mdconvert",
    version,
    about = "Upload documents to a conversion server and track them until they become Markdown"
)]
pub struct Cli {
    /// Base URL of the conversion server.
    #[arg(long, env = "MDCONVERT_SERVER", default_value = "http://localhost:5000")]
    pub server: String,

    /// Directory holding the task list and the device identifier.
    #[arg(long, env = "MDCONVERT_STATE_DIR", default_value = ".mdconvert")]
    pub state_dir: PathBuf,

    /// Directory downloaded Markdown files are written to.
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// Status polling interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Also write the log to ./mdconvert.log.
    #[arg(long)]
    pub log_file: bool,

    /// Log debug output.
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload files and wait until every conversion has finished.
    Convert {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Save every converted file into the output directory.
        #[arg(long)]
        download: bool,
    },
    /// Show the task list.
    Status {
        /// Keep polling until no task is converting.
        #[arg(long)]
        wait: bool,
    },
    /// Submit a failed task again.
    Retry { id: TaskId },
    /// Remove a task that was never submitted.
    Remove { id: TaskId },
    /// Forget every task, locally and on the server.
    Clear,
    /// Print the Markdown produced for a completed task.
    Preview { id: TaskId },
    /// Save the Markdown produced for a completed task.
    Download { id: TaskId },
}

impl Cli {
    pub fn log_destination(&self) -> LogDestination {
        if self.log_file {
            LogDestination::Both
        } else {
            LogDestination::Terminal
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn convert_takes_files_and_download_flag() {
        let cli = Cli::try_parse_from(["mdconvert", "convert", "a.pdf", "b.docx", "--download"])
            .unwrap();
        match cli.command {
            Command::Convert { files, download } => {
                assert_eq!(files.len(), 2);
                assert!(download);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn convert_requires_a_file() {
        assert!(Cli::try_parse_from(["mdconvert", "convert"]).is_err());
    }

    #[test]
    fn global_flags_apply_to_subcommands() {
        let cli = Cli::try_parse_from([
            "mdconvert",
            "--server",
            "http://conv.local:8080",
            "--poll-interval-ms",
            "250",
            "retry",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://conv.local:8080");
        assert_eq!(cli.poll_interval().as_millis(), 250);
        assert!(matches!(cli.command, Command::Retry { id: 7 }));
    }
}
