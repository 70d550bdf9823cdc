//! Purpose: Disable the embedded runtime's pointer and foreign-call checks before startup.
//! Exports: `RUNTIME_DEBUG_VAR`, `DISABLED_CHECKS`, `configure`, `merged_value`, `is_configured`.
//! Role: First startup stage; runs before logging and before the sidecar exists.
//! Invariants: Both checks are forced off unconditionally; unrelated entries are preserved.
//! Invariants: No error path. A missing or non-UTF-8 variable is treated as empty.

/// Comma-separated `key=value` list read by the embedded node's runtime at init.
pub const RUNTIME_DEBUG_VAR: &str = "GODEBUG";

/// Pointer-validity check and foreign-call argument check, both disabled.
pub const DISABLED_CHECKS: [(&str, &str); 2] = [("invalidptr", "0"), ("cgocheck", "0")];

/// Writes the merged debug variable into the process environment.
pub fn configure() {
    let existing = std::env::var(RUNTIME_DEBUG_VAR).ok();
    let value = merged_value(existing.as_deref());
    // SAFETY: startup runs this before the runtime or the node spawn any threads.
    unsafe {
        std::env::set_var(RUNTIME_DEBUG_VAR, &value);
    }
    tracing::trace!(variable = RUNTIME_DEBUG_VAR, %value, "boundary checks disabled");
}

pub fn merged_value(existing: Option<&str>) -> String {
    let mut entries: Vec<(String, String)> = existing
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
            None => (entry.to_string(), String::new()),
        })
        .filter(|(key, _)| !DISABLED_CHECKS.iter().any(|(disabled, _)| key == disabled))
        .collect();

    // The runtime honours the last occurrence of a key, so the forced entries go last.
    entries.extend(
        DISABLED_CHECKS
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string())),
    );

    entries
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

pub fn is_configured() -> bool {
    std::env::var(RUNTIME_DEBUG_VAR).is_ok_and(|current| checks_disabled(&current))
}

/// Whether the last occurrence of every disabled check in `current` is off.
pub fn checks_disabled(current: &str) -> bool {
    DISABLED_CHECKS.iter().all(|(key, value)| {
        current
            .split(',')
            .filter_map(|entry| entry.trim().split_once('='))
            .filter(|(existing_key, _)| existing_key.trim() == *key)
            .last()
            .is_some_and(|(_, existing_value)| existing_value.trim() == *value)
    })
}

#[cfg(test)]
mod tests {
    use super::{checks_disabled, merged_value};

    #[test]
    fn empty_variable_gets_both_checks() {
        assert_eq!(merged_value(None), "invalidptr=0,cgocheck=0");
        assert_eq!(merged_value(Some("")), "invalidptr=0,cgocheck=0");
    }

    #[test]
    fn unrelated_entries_are_kept_in_order() {
        assert_eq!(
            merged_value(Some("gctrace=1, madvdontneed=1")),
            "gctrace=1,madvdontneed=1,invalidptr=0,cgocheck=0"
        );
    }

    #[test]
    fn existing_checks_are_replaced_at_the_end() {
        assert_eq!(
            merged_value(Some("cgocheck=2,gctrace=1,invalidptr=1")),
            "gctrace=1,invalidptr=0,cgocheck=0"
        );
    }

    #[test]
    fn duplicate_checks_are_all_dropped() {
        let merged = merged_value(Some("cgocheck=1,gctrace=1,cgocheck=2,invalidptr=1,invalidptr=1"));
        assert_eq!(merged, "gctrace=1,invalidptr=0,cgocheck=0");
        assert!(checks_disabled(&merged));
    }

    #[test]
    fn later_occurrence_wins_when_checking() {
        assert!(!checks_disabled("cgocheck=0,invalidptr=0,cgocheck=2"));
        assert!(checks_disabled("cgocheck=2,invalidptr=0,cgocheck=0"));
        assert!(!checks_disabled("invalidptr=0"));
        assert!(!checks_disabled(""));
    }

    #[test]
    fn bare_keys_survive_the_merge() {
        assert_eq!(
            merged_value(Some("panicnil,,")),
            "panicnil,invalidptr=0,cgocheck=0"
        );
    }
}
