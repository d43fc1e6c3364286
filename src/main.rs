use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use simplelog::{Config, LevelFilter, WriteLogger};

use pagediff::compare::{
    CompareObserver, CompareOperation, CompareResult, DiffKind, MupdfRenderer, Notice,
    OperationStatus, Pane, PdfFile, PreviewStore, write_summary,
};
use pagediff::panic_handler;
use pagediff::settings;
use pagediff::sync::{Command, SyncController};

#[derive(Parser, Debug)]
#[command(author, version, about = "Word-level comparison of two PDF documents")]
struct Args {
    /// The base (original) document
    base: PathBuf,

    /// The comparison (revised) document
    comparison: PathBuf,

    /// Directory for the JSON summary
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Tokens per diff window
    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long, default_value = "pagediff.log")]
    log_file: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Print the tagged token stream
    #[arg(long)]
    print: bool,

    /// Render page previews and report where each change sits in the
    /// side-by-side layout
    #[arg(long)]
    previews: bool,

    /// Preview render scale
    #[arg(long, default_value_t = 1.0)]
    scale: f32,
}

/// Reports run progress on stderr
struct ConsoleObserver;

impl CompareObserver for ConsoleObserver {
    fn on_status(&mut self, status: OperationStatus) {
        info!("Status: {status}");
        if status.is_running() {
            eprintln!("{status}...");
        }
    }

    fn on_warning(&mut self, message: &str) {
        warn!("{message}");
        eprintln!("warning: {message}");
    }

    fn on_notice(&mut self, notice: &Notice) {
        match notice {
            Notice::LongRunning { pages } => {
                eprintln!("note: {pages} pages in total, this may take a while");
            }
            Notice::EarlyDissimilarity {
                seen,
                changed_ratio,
            } => {
                eprintln!(
                    "note: {:.0}% of the first {seen} tokens differ",
                    changed_ratio * 100.0
                );
            }
        }
    }
}

fn main() -> Result<()> {
    panic_handler::initialize_panic_handler();
    let args = Args::parse();

    WriteLogger::init(
        if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("creating log file {}", args.log_file.display()))?,
    )?;

    info!("Starting pagediff");
    settings::load_settings();
    if let Some(batch_size) = args.batch_size {
        settings::set_batch_size(batch_size);
    }

    let base = PdfFile::new(&args.base);
    let comparison = PdfFile::new(&args.comparison);
    let mut operation = CompareOperation::new(settings::get_operation_config());

    let result = match operation.run(&base, &comparison, &mut ConsoleObserver) {
        Ok(result) => result,
        Err(e) => {
            error!("Comparison failed: {e}");
            return Err(e).context("comparison failed");
        }
    };

    let path = write_summary(result, &args.output)
        .with_context(|| format!("writing summary to {}", args.output.display()))?;

    print_report(result);
    if args.print {
        print_tokens(result);
    }
    if args.previews {
        report_layout(&args, result)?;
    }
    println!("Summary written to {}", path.display());

    info!("Shutting down pagediff");
    Ok(())
}

fn print_report(result: &CompareResult) {
    let totals = &result.totals;
    println!(
        "{} ({} words) vs {} ({} words)",
        result.base.name, result.base.word_count, result.comparison.name, result.comparison.word_count
    );
    println!(
        "+{} -{} ={} in {:.0} ms, {} changes",
        totals.added,
        totals.removed,
        totals.unchanged,
        totals.duration_ms,
        result.changes.len()
    );
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
}

fn print_tokens(result: &CompareResult) {
    for token in &result.tokens {
        let marker = match token.kind {
            DiffKind::Added => '+',
            DiffKind::Removed => '-',
            DiffKind::Unchanged => ' ',
        };
        println!("{marker} {}", token.text);
    }
}

/// Render both documents and place every change in the linked layout
fn report_layout(args: &Args, result: &CompareResult) -> Result<()> {
    let mut sync = SyncController::new(settings::get_sync_options());
    let mut stores = [PreviewStore::new(), PreviewStore::new()];

    for (pane, path) in [(Pane::Base, &args.base), (Pane::Comparison, &args.comparison)] {
        let mut renderer = MupdfRenderer::open(path, args.scale)
            .with_context(|| format!("opening {} for previews", path.display()))?;
        let store = &mut stores[pane.index()];
        store.render_all(&mut renderer)?;
        let _ = sync.apply(Command::SetPages {
            pane,
            pages: store.previews().cloned().collect(),
        });
    }

    println!(
        "Layout: {} rows, {:.0} px",
        sync.rows().rows().len(),
        sync.rows().total_height(Pane::Base)
    );
    for change in &result.changes {
        for pane in [Pane::Base, Pane::Comparison] {
            let Some(page) = change.page_for(pane) else {
                continue;
            };
            if let Some(top) = sync.rows().page_top(pane, page) {
                println!("{} {}: page {page} at {top:.0} px", change.id, pane.as_str());
            }
        }
    }

    for store in &mut stores {
        store.reset();
    }
    Ok(())
}
