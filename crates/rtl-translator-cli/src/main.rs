//! RTL Translator CLI - translate PDF documents into right-to-left languages.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rtl_translator_core::{
    AppConfig, CancelToken, DocumentTranslator, Lang, ProgressCallback, RunReport, SOURCE_LANGUAGES, TextColor,
    create_translator, default_output_path, translation_cache_path,
};
use tracing::{Level, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Clone, ValueEnum)]
enum ColorOption {
    Black,
    DarkRed,
    Blue,
}

impl From<ColorOption> for TextColor {
    fn from(opt: ColorOption) -> Self {
        match opt {
            ColorOption::Black => Self::black(),
            ColorOption::DarkRed => Self::dark_red(),
            ColorOption::Blue => Self::blue(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "rtl-translate")]
#[command(author, version, about = "Translate PDF text into a right-to-left language", long_about = None)]
struct Args {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Output PDF file (default: <stem>_translated.pdf)
    #[arg(short, long = "out")]
    out: Option<PathBuf>,

    /// Source language code
    #[arg(long = "src", value_parser = clap::builder::PossibleValuesParser::new(SOURCE_LANGUAGES.iter().copied()))]
    src: Option<String>,

    /// Target language code [default: fa]
    #[arg(long = "tgt", env = "RTL_TARGET_LANG")]
    tgt: Option<String>,

    /// Maximum characters per translation chunk [default: 450]
    #[arg(long)]
    max_chars: Option<usize>,

    /// TrueType font with glyphs for the target script
    #[arg(long, env = "RTL_FONT")]
    font: Option<PathBuf>,

    /// Skip blocks shorter than this many characters [default: 2]
    #[arg(long)]
    min_block_chars: Option<usize>,

    /// Skip tiny blocks (small area or a single short token)
    #[arg(long)]
    skip_small: bool,

    /// Line advance as a multiple of the font size [default: 1.35]
    #[arg(long)]
    line_gap: Option<f32>,

    /// Smallest font size in points [default: 7]
    #[arg(long)]
    min_font: Option<f32>,

    /// Largest font size in points [default: 14]
    #[arg(long)]
    max_font: Option<f32>,

    /// Outline block rectangles and baselines
    #[arg(long)]
    debug_layout: bool,

    /// Keep the minimum size and overflow instead of eliding
    #[arg(long)]
    shrink_to_fit: bool,

    /// Persist translations in a SQLite file (default location when no path is given)
    #[arg(long, num_args = 0..=1, value_name = "PATH")]
    cache: Option<Option<PathBuf>>,

    /// Replace an existing output file
    #[arg(long)]
    overwrite: bool,

    /// Translate and report, but do not write the output
    #[arg(long)]
    dry_run: bool,

    /// Number of samples shown by --dry-run [default: 5]
    #[arg(long)]
    dry_run_preview: Option<usize>,

    /// Translate blocks that are mostly URLs or e-mail addresses
    #[arg(long)]
    no_url_filter: bool,

    /// Translate blocks dominated by digits and symbols
    #[arg(long)]
    no_numeric_filter: bool,

    /// Give up after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Translation text color
    #[arg(long, value_enum)]
    color: Option<ColorOption>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Layer the command line over the file configuration.
    fn apply(self, config: &mut AppConfig) -> (PathBuf, PathBuf) {
        if let Some(src) = self.src {
            config.source_lang = Lang::new(src);
        }
        if let Some(tgt) = self.tgt {
            config.target_lang = Lang::new(tgt);
        }
        if let Some(max_chars) = self.max_chars {
            config.chunking.max_chars = max_chars;
        }

        let filter = &mut config.filter;
        if let Some(min) = self.min_block_chars {
            filter.min_block_chars = min;
        }
        filter.skip_small |= self.skip_small;
        filter.skip_urls &= !self.no_url_filter;
        filter.skip_numeric &= !self.no_numeric_filter;

        let layout = &mut config.layout;
        if let Some(font) = self.font {
            layout.font_path = font;
        }
        if let Some(gap) = self.line_gap {
            layout.line_gap = gap;
        }
        if let Some(min) = self.min_font {
            layout.min_font = min;
        }
        if let Some(max) = self.max_font {
            layout.max_font = max;
        }
        if let Some(color) = self.color {
            layout.text_color = color.into();
        }
        layout.debug_overlay |= self.debug_layout;
        layout.shrink_to_fit |= self.shrink_to_fit;

        if let Some(cache) = self.cache {
            config.cache.path = Some(cache.unwrap_or_else(translation_cache_path));
        }

        let run = &mut config.run;
        run.dry_run |= self.dry_run;
        run.overwrite |= self.overwrite;
        if let Some(preview) = self.dry_run_preview {
            run.dry_run_preview = preview;
        }
        if self.timeout.is_some() {
            run.timeout_secs = self.timeout;
        }

        let output = self.out.unwrap_or_else(|| default_output_path(&self.input));
        (self.input, output)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG wins over -v when set
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

// CLI output is intentional
#[allow(clippy::print_stdout)]
fn print_report(report: &RunReport, output: &std::path::Path) {
    if report.dry_run {
        println!("Dry run: {} sample(s)", report.samples.len());
        for sample in &report.samples {
            println!("--- {} ---", sample.block);
            println!("  original:   {}", sample.original.replace('\n', " "));
            println!("  translated: {}", sample.translated.replace('\n', " "));
        }
    } else {
        println!("Translated PDF saved to: {}", output.display());
    }

    println!(
        "{} page(s), {} block(s): {} translated, {} failed, {} dropped ({} elided, {} shrunk)",
        report.pages,
        report.blocks_considered,
        report.blocks_translated,
        report.blocks_failed,
        report.blocks_dropped,
        report.blocks_elided,
        report.blocks_shrunk
    );
    if !report.dropped_by_reason.is_empty() {
        let reasons: Vec<String> = report
            .dropped_by_reason
            .iter()
            .map(|(reason, n)| format!("{reason}={n}"))
            .collect();
        println!("Dropped: {}", reasons.join(", "));
    }
    println!(
        "Chunks: {} from cache, {} fetched",
        report.cache_hits, report.chunks_fetched
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    let (input, output) = args.apply(&mut config);
    let config = config.validate().context("Invalid configuration")?;

    let (handle, mut cancel) = CancelToken::new();
    if let Some(secs) = config.run.timeout_secs {
        cancel = cancel.with_timeout(Duration::from_secs(secs));
    }
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current step");
            handle.cancel();
        }
    });

    let translator =
        create_translator(&config.translator).context("Failed to initialize translator")?;
    info!(
        "Translating {} -> {} with {}",
        config.source_lang,
        config.target_lang,
        translator.name()
    );

    let pipeline = DocumentTranslator::new(config, translator, cancel);

    let pb = ProgressBar::new(0);
    // Template is hardcoded and valid
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    let bar = pb.clone();
    #[allow(clippy::cast_possible_truncation)]
    let progress: ProgressCallback = Box::new(move |done: usize, total: usize| {
        bar.set_length(total as u64);
        bar.set_position(done as u64);
    });

    let report = pipeline
        .translate_file(&input, &output, Some(progress))
        .await
        .with_context(|| format!("Failed to translate {}", input.display()))?;

    pb.finish_and_clear();
    print_report(&report, &output);

    Ok(())
}
