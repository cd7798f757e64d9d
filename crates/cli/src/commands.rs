use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Split text into sentences and print them as a JSON array
    Segment {
        #[arg(long, help = "Input text file; reads stdin when omitted")]
        input: Option<PathBuf>,

        #[arg(long, help = "Use the abbreviation-aware segmentation engine")]
        abbreviation_aware: bool,
    },
    /// Build the manifest for a text
    Manifest {
        #[arg(long, help = "Input text file; reads stdin when omitted")]
        input: Option<PathBuf>,

        #[arg(long, help = "Print chunking statistics instead of the manifest")]
        stats: bool,
    },
    /// Submit a text, wait for the batch result and print the run report
    Run {
        #[arg(long, help = "Input text file; reads stdin when omitted")]
        input: Option<PathBuf>,

        #[arg(
            long,
            help = "If specified, writes the JSON report to this file instead of stdout"
        )]
        output: Option<PathBuf>,
    },
    /// Check that the backend is reachable and healthy
    Health,
    Status {
        #[arg(long, help = "Backend batch identifier")]
        batch_id: String,
    },
    Cancel {
        #[arg(long, help = "Backend batch identifier")]
        batch_id: String,
    },
}
