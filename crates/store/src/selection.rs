use filex_core::{EntityId, ExplorerPage};
use rustc_hash::FxHashSet;

/// Checked files on the current page. Always a subset of the page's ids.
#[derive(Debug, Default, Clone)]
pub struct Selection {
    ids: FxHashSet<EntityId>,
}

impl Selection {
    pub fn len(&self) -> usize { self.ids.len() }
    pub fn is_empty(&self) -> bool { self.ids.is_empty() }
    pub fn contains(&self, id: &EntityId) -> bool { self.ids.contains(id) }

    /// Refuses ids that are not on `page`.
    pub fn select(&mut self, page: &ExplorerPage, id: &EntityId) -> bool {
        if !page.contains(id) { return false; }
        self.ids.insert(id.clone());
        true
    }

    pub fn deselect(&mut self, id: &EntityId) -> bool { self.ids.remove(id) }

    pub fn select_all(&mut self, page: &ExplorerPage) {
        self.ids.extend(page.ids().cloned());
    }

    pub fn clear(&mut self) { self.ids.clear(); }

    /// Selected ids in page order.
    pub fn ordered(&self, page: &ExplorerPage) -> Vec<EntityId> {
        page.ids().filter(|id| self.ids.contains(*id)).cloned().collect()
    }

    pub fn all_selected(&self, page: &ExplorerPage) -> bool {
        !page.items.is_empty() && page.ids().all(|id| self.ids.contains(id))
    }
}
