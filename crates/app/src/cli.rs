use clap::Parser;

use crate::tracker::TrackerCliArgs;

/// Follow live ambulance missions and serve their routes to the dispatch map.
#[derive(Debug, Parser)]
#[command(name = "dispatch-tracker", version)]
pub struct Cli {
    #[command(flatten)]
    pub tracker: TrackerCliArgs,
}
