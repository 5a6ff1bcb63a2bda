use crate::{
    config::{self, Config},
    engine::{self, OcrEngine},
    pipeline::Pipeline,
    probe,
    threads,
    util::{ensure_dir, hash_file, now_rfc3339, sha256_hex},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tessbridge")]
#[command(about = "Tesseract invocation orchestrator for page-parallel OCR pipelines")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./tessbridge.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe the engine binary and print its capabilities.
    Doctor {},
    /// List the languages the installed engine can recognize.
    Langs {},
    /// Run page-orientation detection on a single image.
    Orientation {
        #[arg(long)]
        input: PathBuf,
    },
    /// Run skew estimation on a single image.
    Deskew {
        #[arg(long)]
        input: PathBuf,
    },
    /// OCR a document given as page images (files or a directory).
    Run {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;

    match &args.cmd {
        Command::Doctor {} => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg, None).as_deref())?;
            doctor(&cfg)
        }
        Command::Langs {} => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg, None).as_deref())?;
            langs(&cfg)
        }
        Command::Orientation { input } => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg, None).as_deref())?;
            orientation(&cfg, input)
        }
        Command::Deskew { input } => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg, None).as_deref())?;
            deskew(&cfg, input)
        }
        Command::Run { input, out_dir } => run(&args, cfg, input, out_dir.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("tessbridge.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("tessbridge.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let report = probe::probe(&cfg.engine)?;
    let engine = engine::create(&cfg, report.clone());
    let languages = engine.languages().unwrap_or_default();
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "report": report,
            "languages": languages,
        }))?
    );
    Ok(())
}

fn langs(cfg: &Config) -> Result<()> {
    let report = probe::probe(&cfg.engine)?;
    let engine = engine::create(&cfg, report);
    for lang in engine.languages()? {
        println!("{lang}");
    }
    Ok(())
}

fn orientation(cfg: &Config, input: &Path) -> Result<()> {
    let report = probe::probe(&cfg.engine)?;
    let engine = engine::create(&cfg, report);
    // A one-off diagnostic call: a single page, a single worker.
    let budget = threads::thread_budget_from_env(1, 1)?;
    match engine.detect_orientation(input, budget) {
        Ok(o) => println!("{}", serde_json::to_string_pretty(&o)?),
        Err(err) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "error": err.to_string(),
                    "assumed_degrees": 0,
                }))?
            );
        }
    }
    Ok(())
}

fn deskew(cfg: &Config, input: &Path) -> Result<()> {
    let report = probe::probe(&cfg.engine)?;
    let engine = engine::create(&cfg, report);
    let budget = threads::thread_budget_from_env(1, 1)?;
    let degrees = engine.detect_skew(input, budget);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "skew_degrees": degrees }))?
    );
    Ok(())
}

fn run(args: &Args, mut cfg: Config, inputs: &[PathBuf], out_override: Option<&Path>) -> Result<()> {
    let pages = expand_inputs(inputs)?;
    if pages.is_empty() {
        return Err(anyhow!("no page images found in the given inputs"));
    }

    // Job identity comes from the configuration as loaded plus the input
    // bytes; it is stable whether or not validation later resolves "auto"
    // values.
    let cfg_hash = sha256_hex(cfg.normalized_for_hash().as_bytes());
    let mut identity = cfg_hash;
    for page in &pages {
        let h = hash_file(&cfg.hashing, page)
            .with_context(|| format!("hashing input: {}", page.display()))?;
        identity.push(':');
        identity.push_str(&h);
    }
    let job_id = sha256_hex(identity.as_bytes());

    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    let job_dir = out_root.join(&job_id);

    ensure_dir(&job_dir)?;
    ensure_dir(&job_dir.join("final"))?;
    ensure_dir(&job_dir.join("logs"))?;
    ensure_dir(&job_dir.join("pages"))?;

    let log_path = resolve_log_path(&cfg, Some(&job_dir));
    let _guard = init_logging(args, &cfg, log_path.as_deref())?;

    info!("job_id={job_id} out={}", job_dir.display());

    // Probe and validate before any page work; startup failures (missing
    // binary, stale version, bad thread-limit override) land here, and the
    // advisory warnings fire exactly once per run.
    let report = probe::probe(&cfg.engine)?;
    let engine = engine::create(&cfg, report.clone());
    let installed = engine.languages().ok();
    config::validate(&mut cfg, &report, installed.as_ref())?;

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(&cfg).unwrap_or_default();
        std::fs::write(job_dir.join("effective-config.toml"), raw)?;
    }

    let started = now_rfc3339();
    let pipeline = Pipeline::new(&cfg, engine);
    let result = pipeline.run_job(&pages, &job_dir)?;

    if cfg.output.write_text {
        std::fs::write(
            job_dir.join("final").join(&cfg.output.text_filename),
            &result.text,
        )?;
    }

    if cfg.output.write_report_json {
        std::fs::write(
            job_dir.join("final").join(&cfg.output.report_filename),
            serde_json::to_string_pretty(&result.report)?,
        )?;
    }

    if cfg.output.write_page_json {
        for page in &result.report.pages {
            let path = job_dir.join("pages").join(format!("{:06}.json", page.index));
            std::fs::write(&path, serde_json::to_string_pretty(page)?)?;
        }
    }

    if !cfg.output.keep_page_artifacts {
        cleanup_page_artifacts(&result.report)?;
    }

    let index = serde_json::json!({
        "job_id": job_id,
        "started": started,
        "finished": now_rfc3339(),
        "creator": result.report.creator_tag,
        "final_text": format!("final/{}", cfg.output.text_filename),
        "report": format!("final/{}", cfg.output.report_filename),
    });
    std::fs::write(
        job_dir.join("index.json"),
        serde_json::to_string_pretty(&index)?,
    )?;

    let hard_failures = result.report.hard_failures();
    if hard_failures > 0 && cfg.pipeline.fail_on_page_error {
        return Err(anyhow!(
            "{hard_failures} page(s) failed hard; see {}",
            job_dir
                .join("final")
                .join(&cfg.output.report_filename)
                .display()
        ));
    }
    if hard_failures > 0 {
        warn!("{hard_failures} page(s) failed hard; continuing per pipeline.fail_on_page_error");
    }

    Ok(())
}

const PAGE_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "pnm", "ppm"];

/// Expand `--input` arguments into an ordered page list. Directories are
/// scanned one level deep for page images, sorted by file name.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut pages = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("reading directory {}", input.display()))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .map(|e| PAGE_IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                        .unwrap_or(false)
                })
                .collect();
            entries.sort();
            if entries.is_empty() {
                debug!("no page images in {}", input.display());
            }
            pages.extend(entries);
        } else if input.exists() {
            pages.push(input.clone());
        } else {
            return Err(anyhow!("input does not exist: {}", input.display()));
        }
    }
    Ok(pages)
}

fn cleanup_page_artifacts(report: &crate::report::JobReport) -> Result<()> {
    for page in &report.pages {
        for path in [&page.layer, &page.text].into_iter().flatten() {
            let _ = std::fs::remove_file(path);
        }
    }
    Ok(())
}

fn resolve_log_path(cfg: &Config, job_dir: Option<&Path>) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    if let Some(job_dir) = job_dir {
        return Some(job_dir.join("logs").join("tessbridge.log"));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("tessbridge.log"))
}
