//! The working set of items, in insertion order.

use crate::item::{ImageItem, ItemId, ItemStatus};

/// Owned arena of [`ImageItem`]s keyed by id.
#[derive(Debug, Default)]
pub struct ImageStore {
    items: Vec<ImageItem>,
}

impl ImageStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Append an item.
    pub fn insert(&mut self, item: ImageItem) -> ItemId {
        let id = item.id();
        self.items.push(item);
        id
    }

    /// Look up an item.
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&ImageItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Look up an item for mutation.
    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut ImageItem> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    /// Remove an item, returning it.
    pub fn remove(&mut self, id: ItemId) -> Option<ImageItem> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(index))
    }

    /// All items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ImageItem> {
        self.items.iter()
    }

    /// Ids of items whose status satisfies `pred`, in insertion order.
    pub fn ids_where(&self, pred: impl Fn(ItemStatus) -> bool) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|item| pred(item.status()))
            .map(ImageItem::id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::IngestFile;
    use crate::region::Region;

    fn item(name: &str) -> ImageItem {
        ImageItem::new(IngestFile::new(name, "image/png", vec![]), Region::default())
    }

    #[test]
    fn keeps_insertion_order_and_removes_by_id() {
        let mut store = ImageStore::new();
        let a = store.insert(item("a.png"));
        let b = store.insert(item("b.png"));
        let c = store.insert(item("c.png"));
        assert_eq!(store.len(), 3);

        let removed = store.remove(b).unwrap();
        assert_eq!(removed.file_name(), "b.png");
        assert!(store.get(b).is_none());
        assert!(store.remove(b).is_none());

        let names: Vec<_> = store.iter().map(ImageItem::file_name).collect();
        assert_eq!(names, ["a.png", "c.png"]);
        assert_eq!(store.ids_where(ItemStatus::is_submittable), vec![a, c]);
    }

    #[test]
    fn filters_by_status() {
        let mut store = ImageStore::new();
        let a = store.insert(item("a.png"));
        let b = store.insert(item("b.png"));
        store.get_mut(a).unwrap().status = ItemStatus::Done;
        assert_eq!(store.ids_where(|s| s == ItemStatus::Done), vec![a]);
        assert_eq!(store.ids_where(ItemStatus::is_submittable), vec![b]);
    }
}
