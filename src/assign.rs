use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Full target membership for a replace-all assignment, computed from the
/// ids the UI picked. Duplicate picks collapse; ordering is irrelevant to the
/// backend.
pub fn desired_set(ids: &[i64]) -> BTreeSet<i64> {
    ids.iter().copied().collect()
}

/// Replace-all payload for teacher-subject assignments. The backend deletes
/// every existing link for the user and inserts exactly this set. It also
/// forces `isapprover` to false on the inserted rows, so no approver flag is
/// sent from here.
pub fn subjects_payload(desired: &BTreeSet<i64>) -> Value {
    json!({ "subject_ids": desired.iter().collect::<Vec<_>>() })
}

/// Couple the two single-valued placement relations: a milestone may never
/// outlive its gurukul, so an unassigned gurukul forces the milestone to
/// "none" no matter what the UI still has cached.
pub fn coupled_placement(
    gurukul_id: Option<i64>,
    milestone_id: Option<i64>,
) -> (Option<i64>, Option<i64>) {
    if gurukul_id.is_none() {
        (None, None)
    } else {
        (gurukul_id, milestone_id)
    }
}

/// Gurukul/milestone placement payload for the users API. Both keys are
/// always present: `null` means "unassign", while a missing key would mean
/// "leave unchanged" to the backend.
pub fn placement_payload(gurukul_id: Option<i64>, milestone_id: Option<i64>) -> Value {
    let (gurukul_id, milestone_id) = coupled_placement(gurukul_id, milestone_id);
    json!({ "gurukul_id": gurukul_id, "milestone_id": milestone_id })
}
