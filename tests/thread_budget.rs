use tessbridge::error::EngineError;
use tessbridge::threads::{MAX_ENGINE_THREADS, resolve_thread_budget};

#[test]
fn budget_stays_within_bounds() {
    for workers in 1..=32usize {
        for pages in 1..=64usize {
            let b = resolve_thread_budget(None, workers, pages).unwrap();
            assert!((1..=MAX_ENGINE_THREADS).contains(&b), "w={workers} p={pages} b={b}");
        }
    }
}

#[test]
fn budget_non_increasing_in_page_count() {
    for workers in 1..=16usize {
        let mut prev = u32::MAX;
        for pages in 1..=64usize {
            let b = resolve_thread_budget(None, workers, pages).unwrap();
            assert!(b <= prev, "w={workers} p={pages}: {b} > {prev}");
            prev = b;
        }
    }
}

#[test]
fn worked_examples() {
    assert_eq!(resolve_thread_budget(None, 4, 1).unwrap(), 3);
    assert_eq!(resolve_thread_budget(None, 4, 10).unwrap(), 1);
    assert_eq!(resolve_thread_budget(None, 8, 2).unwrap(), 3);
}

#[test]
fn zero_pages_treated_as_one() {
    assert_eq!(
        resolve_thread_budget(None, 4, 0).unwrap(),
        resolve_thread_budget(None, 4, 1).unwrap()
    );
}

#[test]
fn operator_override_is_verbatim() {
    // Regardless of what the heuristic would pick.
    assert_eq!(resolve_thread_budget(Some("7"), 4, 100).unwrap(), 7);
    assert_eq!(resolve_thread_budget(Some("0"), 4, 1).unwrap(), 0);
    assert_eq!(resolve_thread_budget(Some(" 2 "), 16, 1).unwrap(), 2);
}

#[test]
fn non_numeric_override_is_a_configuration_error() {
    for bad in ["three", "", "-1", "2.5"] {
        let err = resolve_thread_budget(Some(bad), 4, 1).unwrap_err();
        assert!(
            matches!(err, EngineError::InvalidThreadLimit { .. }),
            "{bad:?} -> {err:?}"
        );
    }
}
