use crate::error::EngineError;
use tracing::debug;

/// Environment variable Tesseract's OpenMP runtime honors for its internal
/// thread count. We never write it into our own environment; each child
/// process receives it explicitly.
pub const OMP_THREAD_LIMIT: &str = "OMP_THREAD_LIMIT";

/// Empirical ceiling: past 3 internal threads Tesseract shows diminishing
/// returns on commodity hardware. Deliberately not derived from detected
/// core count.
pub const MAX_ENGINE_THREADS: u32 = 3;

/// Decide how many internal threads each engine invocation may use.
///
/// The engine is internally multithreaded and we also run one invocation per
/// page worker, so `workers * engine_threads` can vastly oversubscribe the
/// machine. With many pages the workers already saturate the cores and the
/// engine is forced single-threaded; with few pages each invocation may use
/// up to [`MAX_ENGINE_THREADS`].
///
/// An operator-provided `OMP_THREAD_LIMIT` value is adopted verbatim and
/// never recomputed; a value that is not a non-negative integer is a
/// configuration error, not something to silently default.
pub fn resolve_thread_budget(
    env_override: Option<&str>,
    workers: usize,
    page_count: usize,
) -> Result<u32, EngineError> {
    if let Some(raw) = env_override {
        return match raw.trim().parse::<u32>() {
            Ok(n) => {
                debug!("using operator thread limit {OMP_THREAD_LIMIT}={n}");
                Ok(n)
            }
            Err(_) => Err(EngineError::InvalidThreadLimit {
                value: raw.to_string(),
            }),
        };
    }

    let pages = page_count.max(1);
    let budget = ((workers / pages) as u32).clamp(1, MAX_ENGINE_THREADS);
    debug!("engine thread budget {budget} (workers={workers}, pages={pages})");
    Ok(budget)
}

/// [`resolve_thread_budget`] with the override taken from this process's
/// environment.
pub fn thread_budget_from_env(workers: usize, page_count: usize) -> Result<u32, EngineError> {
    let env = std::env::var(OMP_THREAD_LIMIT).ok();
    resolve_thread_budget(env.as_deref(), workers, page_count)
}
