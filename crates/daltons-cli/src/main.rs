mod input;

use daltons::{
    EngineConfig, MissingMeasurement, Report, SearchControl, Strategy, UsageRange, WidthLookup,
};
use input::CsvError;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "DALTONS_LOG";

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    InvalidValue { flag: &'static str, value: String },
    Io { path: String, source: std::io::Error },
    Csv { path: String, source: CsvError },
    Json(serde_json::Error),
    Engine(daltons::Error),
    OutputExists(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::InvalidValue { flag, value } => {
                write!(f, "invalid value for {flag}: {value:?}\n\n{}", usage())
            }
            CliError::Io { path, source } => write!(f, "I/O error on {path}: {source}"),
            CliError::Csv { path, source } => write!(f, "{path}: {source}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Engine(err) => write!(f, "{err}"),
            CliError::OutputExists(path) => {
                write!(f, "output file {path} already exists, refusing to overwrite it")
            }
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<daltons::Error> for CliError {
    fn from(value: daltons::Error) -> Self {
        Self::Engine(value)
    }
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) | CliError::InvalidValue { .. } => 2,
            CliError::Engine(daltons::Error::EmptyDataset { .. }) => 3,
            CliError::Engine(daltons::Error::SearchSpaceTooLarge { .. }) => 4,
            _ => 1,
        }
    }
}

/// Flag values; `None` leaves the configuration file (or the default) in place.
#[derive(Debug, Default)]
struct Args {
    stats: Option<String>,
    variations: Option<String>,
    config: Option<String>,
    min_viewport: Option<u32>,
    max_viewport: Option<u32>,
    min_density: Option<f64>,
    max_density: Option<f64>,
    min_percentage: Option<f64>,
    widths_divisor: Option<u32>,
    widths_number: Option<usize>,
    search_limit: Option<usize>,
    approximate: bool,
    strict_measurements: bool,
    sequential: bool,
    seed: Option<u64>,
    timeout_ms: Option<u64>,
    out: Option<String>,
    json: bool,
    pretty: bool,
    verbose: bool,
}

fn usage() -> &'static str {
    "daltons\n\
\n\
USAGE:\n\
  daltons --stats <file.csv> --variations <file.csv> [options]\n\
\n\
OPTIONS:\n\
  -c, --stats <path>            visitor stats: viewport width, screen density, page views\n\
  -m, --variations <path>       measured image widths: viewport width; image width\n\
      --config <path>           JSON engine configuration (camelCase keys)\n\
  -i, --min-viewport <px>       ignore narrower viewports\n\
  -x, --max-viewport <px>       ignore wider viewports\n\
      --min-density <x>         ignore lower screen densities\n\
      --max-density <x>         ignore higher screen densities\n\
      --min-percentage <x>      drop widths with a smaller share of views (fraction, default 0.0001)\n\
  -o, --widths-divisor <n>      round computed widths up to a multiple of n (default 10)\n\
  -n, --widths-number <n>       number of widths to recommend (default 5)\n\
      --search-limit <n>        most widths searched exhaustively (default 20, max 63)\n\
      --approximate             use k-means clustering when the search limit is exceeded\n\
      --strict-measurements     fail when a viewport has no measured image width\n\
      --sequential              evaluate candidates on a single thread\n\
      --seed <n>                random seed for the clustering approximation\n\
      --timeout-ms <ms>         abort the search after this many milliseconds\n\
  -f, --out <path>              write the result to a new file\n\
      --json                    print the full report as JSON\n\
      --pretty                  indent JSON output\n\
  -v, --verbose                 log the demand histogram and search progress\n\
\n\
NOTES:\n\
  - Flags override values from --config, which override the built-in defaults.\n\
  - Set DALTONS_LOG (e.g. DALTONS_LOG=debug) to control log output on stderr.\n\
"
}

fn value<'a>(
    it: &mut impl Iterator<Item = &'a String>,
    flag: &'static str,
) -> Result<&'a str, CliError> {
    it.next()
        .map(String::as_str)
        .ok_or(CliError::InvalidValue {
            flag,
            value: String::new(),
        })
}

fn parsed<'a, T: std::str::FromStr>(
    it: &mut impl Iterator<Item = &'a String>,
    flag: &'static str,
) -> Result<T, CliError> {
    let raw = value(it, flag)?;
    raw.trim().parse::<T>().map_err(|_| CliError::InvalidValue {
        flag,
        value: raw.to_string(),
    })
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "--stats" | "-c" => args.stats = Some(value(&mut it, "--stats")?.to_string()),
            "--variations" | "-m" => {
                args.variations = Some(value(&mut it, "--variations")?.to_string())
            }
            "--config" => args.config = Some(value(&mut it, "--config")?.to_string()),
            "--min-viewport" | "-i" => {
                args.min_viewport = Some(parsed(&mut it, "--min-viewport")?)
            }
            "--max-viewport" | "-x" => {
                args.max_viewport = Some(parsed(&mut it, "--max-viewport")?)
            }
            "--min-density" => args.min_density = Some(parsed(&mut it, "--min-density")?),
            "--max-density" => args.max_density = Some(parsed(&mut it, "--max-density")?),
            "--min-percentage" => {
                args.min_percentage = Some(parsed(&mut it, "--min-percentage")?)
            }
            "--widths-divisor" | "-o" => {
                args.widths_divisor = Some(parsed(&mut it, "--widths-divisor")?)
            }
            "--widths-number" | "-n" => {
                args.widths_number = Some(parsed(&mut it, "--widths-number")?)
            }
            "--search-limit" => args.search_limit = Some(parsed(&mut it, "--search-limit")?),
            "--approximate" => args.approximate = true,
            "--strict-measurements" => args.strict_measurements = true,
            "--sequential" => args.sequential = true,
            "--seed" => args.seed = Some(parsed(&mut it, "--seed")?),
            "--timeout-ms" => args.timeout_ms = Some(parsed(&mut it, "--timeout-ms")?),
            "--out" | "-f" => args.out = Some(value(&mut it, "--out")?.to_string()),
            "--json" => args.json = true,
            "--pretty" => args.pretty = true,
            "--verbose" | "-v" => args.verbose = true,
            _ => return Err(CliError::Usage(usage())),
        }
    }

    if args.stats.is_none() || args.variations.is_none() {
        return Err(CliError::Usage(usage()));
    }
    Ok(args)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_file(path: &str) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_string(),
        source,
    })
}

fn load_config(args: &Args) -> Result<EngineConfig, CliError> {
    let mut cfg = match &args.config {
        Some(path) => serde_json::from_str::<EngineConfig>(&read_file(path)?)?,
        None => EngineConfig::default(),
    };

    if let Some(v) = args.min_viewport {
        cfg.min_viewport = Some(v);
    }
    if let Some(v) = args.max_viewport {
        cfg.max_viewport = Some(v);
    }
    if let Some(v) = args.min_density {
        cfg.min_density = Some(v);
    }
    if let Some(v) = args.max_density {
        cfg.max_density = Some(v);
    }
    if let Some(v) = args.min_percentage {
        cfg.min_percentage = v;
    }
    if let Some(v) = args.widths_divisor {
        cfg.widths_divisor = v;
    }
    if let Some(v) = args.widths_number {
        cfg.widths_number = v;
    }
    if let Some(v) = args.search_limit {
        cfg.exhaustive_search_limit = v;
    }
    if let Some(v) = args.seed {
        cfg.random_seed = v;
    }
    if args.approximate {
        cfg.approximate_on_overflow = true;
    }
    if args.strict_measurements {
        cfg.missing_measurement = MissingMeasurement::Fail;
    }
    if args.sequential {
        cfg.parallel = false;
    }

    cfg.validate()?;
    Ok(cfg)
}

/// Warns about viewports inside the usage range that the variations file does not cover.
fn check_coverage(range: &UsageRange, lookup: &impl WidthLookup) {
    let mut missing = range
        .viewports()
        .filter(|&v| lookup.rendered_width(v).is_none());
    if let Some(first) = missing.next() {
        let count = 1 + missing.count();
        tracing::warn!(
            missing = count,
            first_missing = first,
            "image widths are not measured for every viewport from {} to {}px",
            range.min_viewport,
            range.max_viewport
        );
    }
}

fn log_shares(report: &Report) {
    for share in &report.shares {
        tracing::info!(
            width = share.width,
            views = share.views,
            "{:>6}px {:>8.4}%",
            share.width,
            share.percentage * 100.0
        );
    }
}

fn strategy_name(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::AllWidths => "all widths",
        Strategy::Exhaustive => "exhaustive search",
        Strategy::Clustering => "k-means approximation",
    }
}

fn widths_line(report: &Report) -> String {
    report
        .recommendation
        .widths
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn write_json(mut out: impl Write, value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(&mut out, value)?;
    } else {
        serde_json::to_writer(&mut out, value)?;
    }
    writeln!(out).map_err(|source| CliError::Io {
        path: "<stdout>".to_string(),
        source,
    })?;
    Ok(())
}

fn write_result_file(path: &str, report: &Report) -> Result<(), CliError> {
    let io_err = |source: std::io::Error| CliError::Io {
        path: path.to_string(),
        source,
    };
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| {
            if source.kind() == std::io::ErrorKind::AlreadyExists {
                CliError::OutputExists(path.to_string())
            } else {
                io_err(source)
            }
        })?;
    let rec = &report.recommendation;
    writeln!(file, "widths in srcset: {}", widths_line(report)).map_err(io_err)?;
    writeln!(file, "distance: {}", rec.distance).map_err(io_err)?;
    writeln!(file, "strategy: {}", strategy_name(rec.strategy)).map_err(io_err)?;
    Ok(())
}

fn run(args: Args) -> Result<(), CliError> {
    init_tracing(args.verbose);

    let cfg = load_config(&args)?;

    if let Some(out) = &args.out {
        if Path::new(out).exists() {
            return Err(CliError::OutputExists(out.clone()));
        }
    }

    let (Some(stats_path), Some(variations_path)) = (&args.stats, &args.variations) else {
        return Err(CliError::Usage(usage()));
    };
    let records = input::parse_stats(&read_file(stats_path)?).map_err(|source| CliError::Csv {
        path: stats_path.clone(),
        source,
    })?;
    tracing::info!(records = records.len(), "imported stats");

    let lookup =
        input::parse_variations(&read_file(variations_path)?).map_err(|source| CliError::Csv {
            path: variations_path.clone(),
            source,
        })?;
    tracing::info!(viewports = lookup.len(), "imported image width variations");

    if let Some(range) = daltons::bounds::effective_range(&records, &cfg) {
        check_coverage(&range, &lookup);
    }

    let last_decile = AtomicU64::new(0);
    let progress = |evaluated: u64, total: u64| {
        if total == 0 {
            return;
        }
        let decile = evaluated.saturating_mul(10) / total;
        if last_decile.fetch_max(decile, Ordering::Relaxed) < decile {
            tracing::info!(evaluated, total, "search {}% done", decile * 10);
        }
    };

    let mut control = SearchControl::default();
    if args.verbose {
        control = control.with_progress(&progress);
    }
    if let Some(ms) = args.timeout_ms {
        control = control.with_deadline(Instant::now() + Duration::from_millis(ms));
    }

    let report = daltons::recommend(&records, &lookup, &cfg, &control)?;
    if args.verbose {
        log_shares(&report);
    }
    tracing::info!(
        distance = report.recommendation.distance,
        strategy = strategy_name(report.recommendation.strategy),
        "recommended widths: {}",
        widths_line(&report)
    );

    if let Some(out) = &args.out {
        write_result_file(out, &report)?;
    }
    if args.json {
        write_json(std::io::stdout().lock(), &report, args.pretty)?;
    } else if args.out.is_none() {
        println!("{}", widths_line(&report));
    }
    Ok(())
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(err.exit_code());
        }
    };

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(err.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::{Args, CliError, load_config, parse_args, write_json};
    use daltons::MissingMeasurement;
    use std::io::Write;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("daltons")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parse_args_reads_flags_and_short_aliases() {
        let args = parse_args(&argv(&[
            "-c", "stats.csv", "-m", "widths.csv", "-n", "3", "-o", "20", "--approximate",
            "--timeout-ms", "500", "-v",
        ]))
        .unwrap();
        assert_eq!(args.stats.as_deref(), Some("stats.csv"));
        assert_eq!(args.variations.as_deref(), Some("widths.csv"));
        assert_eq!(args.widths_number, Some(3));
        assert_eq!(args.widths_divisor, Some(20));
        assert_eq!(args.timeout_ms, Some(500));
        assert!(args.approximate);
        assert!(args.verbose);
    }

    #[test]
    fn parse_args_requires_both_inputs() {
        let err = parse_args(&argv(&["--stats", "stats.csv"])).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn parse_args_rejects_malformed_numbers() {
        let err = parse_args(&argv(&["-c", "a", "-m", "b", "-n", "five"])).unwrap_err();
        assert!(matches!(
            err,
            CliError::InvalidValue {
                flag: "--widths-number",
                ..
            }
        ));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args {
            widths_number: Some(3),
            max_density: Some(2.0),
            strict_measurements: true,
            sequential: true,
            ..Default::default()
        };
        let cfg = load_config(&args).unwrap();
        assert_eq!(cfg.widths_number, 3);
        assert_eq!(cfg.max_density, Some(2.0));
        assert_eq!(cfg.missing_measurement, MissingMeasurement::Fail);
        assert!(!cfg.parallel);
        assert_eq!(cfg.widths_divisor, 10);
    }

    #[test]
    fn invalid_flag_values_fail_validation() {
        let args = Args {
            widths_number: Some(0),
            ..Default::default()
        };
        let err = load_config(&args).unwrap_err();
        assert!(matches!(
            err,
            CliError::Engine(daltons::Error::InvalidConfiguration { .. })
        ));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn engine_errors_map_to_distinct_exit_codes() {
        let empty = CliError::Engine(daltons::Error::EmptyDataset { reason: "none" });
        assert_eq!(empty.exit_code(), 3);
        let oversize = CliError::Engine(daltons::Error::SearchSpaceTooLarge {
            candidate_widths: 30,
            limit: 20,
        });
        assert_eq!(oversize.exit_code(), 4);
        assert_eq!(CliError::Engine(daltons::Error::Cancelled).exit_code(), 1);
    }

    /// Accepts everything except a lone trailing newline.
    struct FailsOnNewline(Vec<u8>);

    impl Write for FailsOnNewline {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf == b"\n" {
                return Err(std::io::Error::other("stdout closed"));
            }
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_json_ends_with_a_newline() {
        let mut out = Vec::new();
        write_json(&mut out, &[300u32, 600], false).unwrap();
        assert_eq!(out, b"[300,600]\n");
    }

    #[test]
    fn write_json_reports_a_failed_trailing_newline() {
        let mut out = FailsOnNewline(Vec::new());
        let err = write_json(&mut out, &[300u32, 600], false).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }), "{err}");
        assert_eq!(err.exit_code(), 1);
        assert_eq!(out.0, b"[300,600]");
    }
}
