use serde::Serialize;

/// A dropdown option as handed to the UI. The id travels with the label from
/// the moment the option is built, so ids are never re-parsed out of display
/// strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionItem {
    pub id: i64,
    pub label: String,
}

/// One selectable entity inside a chain level. `parent` is the id it links to
/// on the level above; root-level items carry `None`.
#[derive(Debug, Clone)]
pub struct ChainItem {
    pub id: i64,
    pub parent: Option<i64>,
    pub label: String,
}

impl ChainItem {
    pub fn root(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            parent: None,
            label: label.into(),
        }
    }

    pub fn child(id: i64, parent: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            parent: Some(parent),
            label: label.into(),
        }
    }
}

/// Scoped selection state for one page's dependent dropdowns. Each level's
/// candidate set is derived from the selection one level up; changing an
/// upstream selection re-resolves everything below it, and a selection that
/// falls out of its candidate set is reset to "none selected", never kept.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    levels: Vec<Vec<ChainItem>>,
    selection: Vec<Option<i64>>,
}

impl SelectorChain {
    pub fn new(depth: usize) -> Self {
        Self {
            levels: vec![Vec::new(); depth],
            selection: vec![None; depth],
        }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn selection(&self, level: usize) -> Option<i64> {
        self.selection.get(level).copied().flatten()
    }

    pub fn selections(&self) -> &[Option<i64>] {
        &self.selection
    }

    /// Candidate set at `level` under the current upstream selection. Level 0
    /// is unfiltered; deeper levels filter on the parent link, and an
    /// unselected parent yields an empty set.
    pub fn options(&self, level: usize) -> Vec<&ChainItem> {
        let Some(items) = self.levels.get(level) else {
            return Vec::new();
        };
        if level == 0 {
            return items.iter().collect();
        }
        match self.selection[level - 1] {
            Some(parent) => items
                .iter()
                .filter(|item| item.parent == Some(parent))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn option_items(&self, level: usize) -> Vec<OptionItem> {
        self.options(level)
            .into_iter()
            .map(|item| OptionItem {
                id: item.id,
                label: item.label.clone(),
            })
            .collect()
    }

    /// Set the selection at `level` and re-resolve every level below it. An id
    /// that is not in the current candidate set (a stale click after a
    /// refresh) collapses to "none selected" instead of being kept.
    pub fn set_selection(&mut self, level: usize, id: Option<i64>) {
        if level >= self.depth() {
            return;
        }
        let valid =
            id.filter(|candidate| self.options(level).iter().any(|item| item.id == *candidate));
        self.selection[level] = valid;
        self.revalidate_from(level + 1);
    }

    /// Swap in fresh level snapshots after a refetch, dropping any selection
    /// that is no longer valid under the new data.
    pub fn reload(&mut self, levels: Vec<Vec<ChainItem>>) {
        self.selection.resize(levels.len(), None);
        self.levels = levels;
        self.revalidate_from(0);
    }

    fn revalidate_from(&mut self, start: usize) {
        for level in start..self.depth() {
            if let Some(current) = self.selection[level] {
                if !self.options(level).iter().any(|item| item.id == current) {
                    self.selection[level] = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Gurukuls 1 and 2, offerings under each, milestones under the offerings.
    fn three_level_chain() -> SelectorChain {
        let mut chain = SelectorChain::new(3);
        chain.reload(vec![
            vec![ChainItem::root(1, "Veda"), ChainItem::root(2, "Arya")],
            vec![
                ChainItem::child(10, 1, "G1"),
                ChainItem::child(11, 1, "G2"),
                ChainItem::child(20, 2, "G2"),
            ],
            vec![
                ChainItem::child(100, 10, "L1"),
                ChainItem::child(101, 11, "L5"),
                ChainItem::child(200, 20, "L6"),
            ],
        ]);
        chain
    }

    #[test]
    fn grandchild_options_follow_the_selected_parent() {
        let mut chain = three_level_chain();
        assert_eq!(chain.options(0).len(), 2);
        // Nothing selected upstream: deeper levels are empty, not an error.
        assert!(chain.options(1).is_empty());
        assert!(chain.options(2).is_empty());

        chain.set_selection(0, Some(1));
        let offerings: Vec<i64> = chain.options(1).iter().map(|i| i.id).collect();
        assert_eq!(offerings, vec![10, 11]);

        chain.set_selection(1, Some(11));
        let milestones: Vec<i64> = chain.options(2).iter().map(|i| i.id).collect();
        assert_eq!(milestones, vec![101]);

        chain.set_selection(0, Some(2));
        let offerings: Vec<i64> = chain.options(1).iter().map(|i| i.id).collect();
        assert_eq!(offerings, vec![20]);
    }

    #[test]
    fn parent_change_resets_invalidated_descendants() {
        let mut chain = three_level_chain();
        chain.set_selection(0, Some(1));
        chain.set_selection(1, Some(11));
        chain.set_selection(2, Some(101));

        chain.set_selection(0, Some(2));
        assert_eq!(chain.selection(0), Some(2));
        assert_eq!(chain.selection(1), None);
        assert_eq!(chain.selection(2), None);
        assert!(chain.options(2).is_empty());
    }

    #[test]
    fn clearing_the_root_empties_everything_below() {
        let mut chain = three_level_chain();
        chain.set_selection(0, Some(2));
        chain.set_selection(1, Some(20));
        chain.set_selection(2, Some(200));

        chain.set_selection(0, None);
        assert_eq!(chain.selections(), &[None, None, None]);
        assert!(chain.options(1).is_empty());
    }

    #[test]
    fn stale_id_collapses_to_none() {
        let mut chain = three_level_chain();
        chain.set_selection(0, Some(99));
        assert_eq!(chain.selection(0), None);

        chain.set_selection(0, Some(1));
        // Offering 20 belongs to gurukul 2; selecting it under gurukul 1 is stale.
        chain.set_selection(1, Some(20));
        assert_eq!(chain.selection(1), None);
    }

    #[test]
    fn reload_drops_selections_missing_from_fresh_data() {
        let mut chain = three_level_chain();
        chain.set_selection(0, Some(1));
        chain.set_selection(1, Some(10));

        chain.reload(vec![
            vec![ChainItem::root(1, "Veda")],
            vec![ChainItem::child(11, 1, "G2")],
            vec![],
        ]);
        assert_eq!(chain.selection(0), Some(1));
        assert_eq!(chain.selection(1), None);
    }
}
