use serde::{Deserialize, Serialize};

/// Per-page disposition after the pool drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Text layer generated.
    Ok,
    /// Engine timed out; page keeps its pre-OCR rendering.
    Fallback,
    /// Engine failed hard (data or configuration problem).
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    pub index: usize,
    pub input: String,
    pub status: PageStatus,
    pub orientation_degrees: u16,
    pub orientation_confidence: f32,
    pub skew_degrees: f32,
    pub layer: Option<String>,
    pub text: Option<String>,
    pub warnings: Vec<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub engine_version: String,
    pub creator_tag: String,
    pub renderer: String,
    pub workers: usize,
    pub thread_budget: u32,
    pub page_count: usize,
    pub pages: Vec<PageReport>,
}

impl JobReport {
    /// Pages that failed for non-timeout reasons. Escalation policy for
    /// these lives with the caller.
    pub fn hard_failures(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.status == PageStatus::Failed)
            .count()
    }
}
