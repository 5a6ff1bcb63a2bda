use super::{OcrEngine, OrientationResult, RenderMode, TextLayerOutcome, TextLayerRequest};
use crate::config;
use crate::error::EngineError;
use crate::probe::{CapabilityReport, EngineVersion};
use crate::runner::{self, InvocationOutcome};
use crate::threads::OMP_THREAD_LIMIT;
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

/// Production engine: drives the external `tesseract` binary.
pub struct TesseractEngine {
    opts: config::Engine,
    report: CapabilityReport,
    keep_stderr: bool,
}

impl TesseractEngine {
    pub fn new(opts: &config::Engine, report: CapabilityReport, keep_stderr: bool) -> Self {
        Self {
            opts: opts.clone(),
            report,
            keep_stderr,
        }
    }

    fn timeout(&self) -> Option<Duration> {
        runner::deadline_from_secs(self.opts.timeout_seconds)
    }

    fn base_cmd(&self, thread_budget: u32) -> Command {
        let mut cmd = Command::new(&self.opts.binary);
        cmd.env(OMP_THREAD_LIMIT, thread_budget.to_string());
        cmd
    }

    fn lang_arg(&self) -> String {
        self.opts.languages.join("+")
    }

    /// Options common to every recognition call. Thresholding rides along
    /// only when the probed version understands it; the advisory warning for
    /// the unsupported case was already emitted at validation time.
    fn recognition_args(&self, cmd: &mut Command) {
        if let Some(psm) = self.opts.page_seg_mode {
            cmd.arg("--psm").arg(psm.to_string());
        }
        if let Some(oem) = self.opts.engine_mode {
            cmd.arg("--oem").arg(oem.to_string());
        }
        if self.report.has_thresholding {
            if let Some(id) = config::thresholding_id(&self.opts.thresholding) {
                cmd.arg("-c").arg(format!("thresholding_method={id}"));
            }
        }
        if !self.opts.user_words.is_empty() {
            cmd.arg("--user-words").arg(&self.opts.user_words);
        }
        if !self.opts.user_patterns.is_empty() {
            cmd.arg("--user-patterns").arg(&self.opts.user_patterns);
        }
    }

    /// Assemble the full engine invocation for a text-layer request.
    ///
    /// Separate from the actual spawn so the argument contract is
    /// inspectable without an engine installed.
    pub fn text_layer_command(&self, req: &TextLayerRequest<'_>) -> Command {
        let mut cmd = self.base_cmd(req.thread_budget);
        cmd.arg(req.image)
            .arg(req.output_base)
            .arg("-l")
            .arg(self.lang_arg());
        self.recognition_args(&mut cmd);
        cmd.arg(req.mode.output_config()).arg("txt");
        for fragment in &self.opts.config_files {
            cmd.arg(fragment);
        }
        cmd
    }

    fn log_stderr(&self, what: &str, outcome: &InvocationOutcome) {
        if !self.keep_stderr {
            return;
        }
        let stderr = outcome.stderr_lossy();
        if !stderr.is_empty() {
            debug!("tesseract stderr ({what}): {stderr}");
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn version(&self) -> &EngineVersion {
        &self.report.version
    }

    fn creator_tag(&self, mode: RenderMode) -> String {
        let tag = match mode {
            RenderMode::Sandwich => "-PDF",
            RenderMode::Hocr => "",
        };
        format!("Tesseract OCR{tag} {}", self.report.version)
    }

    fn languages(&self) -> Result<BTreeSet<String>> {
        let mut cmd = Command::new(&self.opts.binary);
        cmd.arg("--list-langs");
        let outcome = runner::run_bounded(&mut cmd, self.timeout())?;
        match outcome {
            InvocationOutcome::Completed { stdout, stderr } => {
                // Old releases print the list on stderr.
                let text = if stdout.is_empty() { stderr } else { stdout };
                Ok(parse_list_langs(&String::from_utf8_lossy(&text)))
            }
            other => anyhow::bail!(
                "tesseract --list-langs did not complete: {}",
                other.stderr_lossy()
            ),
        }
    }

    fn detect_orientation(
        &self,
        image: &Path,
        thread_budget: u32,
    ) -> Result<OrientationResult, EngineError> {
        let mut cmd = self.base_cmd(thread_budget);
        cmd.arg(image).arg("stdout").arg("--psm").arg("0").arg("-l").arg("osd");
        if let Some(oem) = self.opts.engine_mode {
            cmd.arg("--oem").arg(oem.to_string());
        }

        let outcome = runner::run_bounded(&mut cmd, self.timeout())
            .map_err(|e| EngineError::DetectionFailed(format!("{e:#}")))?;
        self.log_stderr("osd", &outcome);
        match outcome {
            InvocationOutcome::Completed { stdout, .. } => {
                parse_osd(&String::from_utf8_lossy(&stdout))
            }
            InvocationOutcome::TimedOut { elapsed, .. } => Err(EngineError::DetectionFailed(
                format!("orientation probe timed out after {elapsed:?}"),
            )),
            InvocationOutcome::Failed { stderr, .. } => {
                Err(EngineError::DetectionFailed(failure_detail(&stderr)))
            }
        }
    }

    fn detect_skew(&self, image: &Path, thread_budget: u32) -> f32 {
        let mut cmd = self.base_cmd(thread_budget);
        cmd.arg(image)
            .arg("stdout")
            .arg("--psm")
            .arg("2")
            .arg("-l")
            .arg(self.lang_arg());
        if let Some(oem) = self.opts.engine_mode {
            cmd.arg("--oem").arg(oem.to_string());
        }

        match runner::run_bounded(&mut cmd, self.timeout()) {
            Ok(InvocationOutcome::Completed { stdout, .. }) => {
                parse_deskew(&String::from_utf8_lossy(&stdout)).unwrap_or_else(|| {
                    debug!("no deskew angle in output for {}", image.display());
                    0.0
                })
            }
            Ok(other) => {
                debug!(
                    "skew probe inconclusive for {}: {}",
                    image.display(),
                    other.stderr_lossy()
                );
                0.0
            }
            Err(err) => {
                debug!("skew probe failed for {}: {err:#}", image.display());
                0.0
            }
        }
    }

    fn generate_text_layer(&self, req: &TextLayerRequest<'_>) -> Result<TextLayerOutcome> {
        let mut cmd = self.text_layer_command(req);

        let layer_path = req.output_base.with_extension(req.mode.layer_extension());
        let text_path = req.output_base.with_extension("txt");

        let outcome = runner::run_bounded(&mut cmd, self.timeout())
            .with_context(|| format!("invoking tesseract on {}", req.image.display()))?;
        self.log_stderr("recognize", &outcome);

        match outcome {
            InvocationOutcome::Completed { .. } => {
                if !layer_path.exists() || !text_path.exists() {
                    return Ok(TextLayerOutcome::Failed {
                        exit_code: Some(0),
                        stderr: format!(
                            "engine exited 0 but produced no {} artifact",
                            if layer_path.exists() { "text" } else { "layer" }
                        ),
                    });
                }
                Ok(TextLayerOutcome::Completed {
                    layer: layer_path,
                    text: text_path,
                })
            }
            InvocationOutcome::TimedOut { elapsed, .. } => {
                warn!(
                    "tesseract timed out on {} after {elapsed:?}; keeping partial output",
                    req.image.display()
                );
                Ok(TextLayerOutcome::TimedOut {
                    layer: existing(layer_path),
                    text: existing(text_path),
                })
            }
            InvocationOutcome::Failed {
                exit_code, stderr, ..
            } => Ok(TextLayerOutcome::Failed {
                exit_code,
                stderr: failure_detail(&stderr),
            }),
        }
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    if path.exists() { Some(path) } else { None }
}

fn failure_detail(stderr: &[u8]) -> String {
    let detail = String::from_utf8_lossy(stderr).trim().to_string();
    if detail.is_empty() {
        "engine exited non-zero with no diagnostics".to_string()
    } else {
        detail
    }
}

/// Parse `tesseract --list-langs` output: a header line ending in `:`
/// followed by one language code per line.
pub fn parse_list_langs(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.ends_with(':'))
        .map(str::to_string)
        .collect()
}

/// Parse the OSD block an `--psm 0` pass prints on stdout.
pub fn parse_osd(text: &str) -> Result<OrientationResult, EngineError> {
    let deg_re = Regex::new(r"Orientation in degrees:\s*(\d+)").expect("static regex");
    let conf_re = Regex::new(r"Orientation confidence:\s*([\d.]+)").expect("static regex");

    let degrees: u16 = deg_re
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| {
            EngineError::DetectionFailed("no orientation in OSD output".to_string())
        })?;
    if !matches!(degrees, 0 | 90 | 180 | 270) {
        return Err(EngineError::DetectionFailed(format!(
            "implausible orientation angle {degrees}"
        )));
    }

    let confidence: f32 = conf_re
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0);

    Ok(OrientationResult {
        degrees,
        confidence,
    })
}

/// Parse the `Deskew angle: 0.1234` line a `--psm 2` pass prints.
pub fn parse_deskew(text: &str) -> Option<f32> {
    let re = Regex::new(r"Deskew angle:\s*(-?[\d.]+)").expect("static regex");
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
