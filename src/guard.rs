use std::collections::HashSet;

/// Client-side duplicate pre-check for per-parent uniqueness keys (gurukul
/// names, offering G-types per gurukul, milestone levels per offering, topic
/// and subtopic names per parent). Returns true when `candidate` may be used.
///
/// `exclude_self` carries the entity's own current value during a rename, so
/// keeping the value is never flagged as a duplicate against itself. The
/// backend stays authoritative; this only saves a doomed round trip.
pub fn value_is_free(
    candidate: &str,
    siblings: &HashSet<String>,
    exclude_self: Option<&str>,
) -> bool {
    if exclude_self.is_some_and(|own| own == candidate) {
        return true;
    }
    !siblings.contains(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn taken_value_is_rejected() {
        assert!(!value_is_free("L1", &set(&["L1", "L2"]), None));
    }

    #[test]
    fn renaming_to_own_value_is_allowed() {
        assert!(value_is_free("L1", &set(&["L1"]), Some("L1")));
    }

    #[test]
    fn free_value_passes() {
        assert!(value_is_free("L3", &set(&["L1", "L2"]), None));
        assert!(value_is_free("L3", &set(&[]), None));
    }

    #[test]
    fn exclude_self_does_not_cover_other_siblings() {
        assert!(!value_is_free("L2", &set(&["L1", "L2"]), Some("L1")));
    }
}
