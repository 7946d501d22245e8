// Cantus index: CLI entry point.
//
// Loads a piece (JSON piece description, or a Standard MIDI File when the
// extension is .mid/.midi), runs the dissonance analysis chain and prints
// the reconciled per-voice figures as a text table or JSON. The optional
// stages add their tables after it; their flags override the config file.
//
// Usage:
//   cantus PIECE [--config settings.json] [--workers N] [--json]
//                [--active-voices] [--ngrams N] [--durations] [--measures]
//
// Logging goes to stderr and is controlled by RUST_LOG (default "info").

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cantus_index::active_voices::ActiveVoicesSettings;
use cantus_index::config::AnalysisConfig;
use cantus_index::error::IndexResult;
use cantus_index::exec::Execution;
use cantus_index::midi;
use cantus_index::ngram::NGramSettings;
use cantus_index::pipeline::{DissonanceAnalysis, DissonancePipeline};
use cantus_index::reconcile::Reconciled;
use cantus_index::score::Piece;
use cantus_index::table::EventTable;
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "cantus",
    author,
    version,
    about = "Classify contrapuntal dissonances in a score"
)]
struct Args {
    /// Piece to analyse: JSON piece description or .mid/.midi file
    #[arg(value_name = "PIECE")]
    input: PathBuf,

    /// JSON analysis settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run indexers on a worker pool of this size (0 picks automatically)
    #[arg(long)]
    workers: Option<usize>,

    /// Print the tables as one JSON object
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Also count the sounding voices at each offset
    #[arg(long, default_value_t = false)]
    active_voices: bool,

    /// Also index vertical interval n-grams of this length
    #[arg(long, value_name = "N")]
    ngrams: Option<usize>,

    /// Also give each event its duration
    #[arg(long, default_value_t = false)]
    durations: bool,

    /// Also give each event its measure number
    #[arg(long, default_value_t = false)]
    measures: bool,
}

/// JSON output: the reconciled figures plus whichever optional tables ran.
#[derive(Serialize)]
struct Report<'a> {
    reconciled: &'a EventTable<Reconciled>,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_voices: Option<&'a EventTable<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ngrams: Option<&'a EventTable<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    durations: Option<&'a EventTable<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    measures: Option<&'a EventTable<u32>>,
}

impl<'a> Report<'a> {
    fn new(analysis: &'a DissonanceAnalysis) -> Self {
        Report {
            reconciled: &analysis.reconciled,
            active_voices: analysis.active_voices.as_ref(),
            ngrams: analysis.ngrams.as_ref(),
            durations: analysis.durations.as_ref(),
            measures: analysis.measures.as_ref(),
        }
    }

    fn summary(&self) -> String {
        let mut out = self.reconciled.summary();
        let sections = [
            ("active voices", self.active_voices.map(EventTable::summary)),
            ("n-grams", self.ngrams.map(EventTable::summary)),
            ("durations", self.durations.map(EventTable::summary)),
            ("measures", self.measures.map(EventTable::summary)),
        ];
        for (title, table) in sections {
            if let Some(table) = table {
                out.push_str(&format!("\n{title}:\n{table}"));
            }
        }
        out
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> IndexResult<String> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.execution = Execution::parallel(workers);
    }
    if args.active_voices && config.active_voices.is_none() {
        config.active_voices = Some(ActiveVoicesSettings::default());
    }
    if let Some(n) = args.ngrams {
        let settings = config.ngram.take().unwrap_or_default();
        config.ngram = Some(NGramSettings { n, ..settings });
    }
    config.durations |= args.durations;
    config.measures |= args.measures;

    let piece = load_piece(&args.input)?;
    info!(path = %args.input.display(), parts = piece.parts.len(), "loaded piece");
    let analysis = DissonancePipeline::new(config).run(&piece)?;

    let report = Report::new(&analysis);
    if args.json {
        Ok(serde_json::to_string_pretty(&report)?)
    } else {
        Ok(report.summary())
    }
}

fn load_piece(path: &Path) -> IndexResult<Piece> {
    let is_midi = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            extension.eq_ignore_ascii_case("mid") || extension.eq_ignore_ascii_case("midi")
        });
    if is_midi {
        midi::load_file(path)
    } else {
        Piece::load(path)
    }
}
