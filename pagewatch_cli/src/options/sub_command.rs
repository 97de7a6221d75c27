use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Capture a competitor now and print the resulting `CaptureResult`.
    Capture {
        /// Competitor id to capture.
        competitor_id: String,
        /// Read rendered HTML from this file instead of calling the renderer service.
        #[clap(long)]
        simulate_file: Option<String>,
        /// Bypass the `monitoring_enabled` gate (a user-initiated recheck).
        #[clap(long)]
        manual: bool,
        /// Mark this as the competitor's first-ever capture, enabling the
        /// renderer-outage placeholder fallback.
        #[clap(long)]
        initial: bool,
    },
    /// Print the version history for a competitor, oldest first.
    History {
        /// Competitor id to list.
        competitor_id: String,
    },
    /// Reconstruct and print the full HTML at a given version.
    Reconstruct {
        /// Competitor id.
        competitor_id: String,
        /// Version number to reconstruct.
        version: i64,
    },
    /// Run the retention sweep across every monitored competitor.
    Retain,
    /// Print cumulative engine telemetry as JSON.
    Stats,
}
