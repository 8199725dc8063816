//! The id-index: a process-wide map from controller-assigned id to a weak
//! handle on its block. The index does not itself keep a block alive —
//! ownership flows from surface/composite parent to block, never the
//! reverse (spec §9, "refcounted blocks").

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::{Block, BlockHandle};

#[derive(Debug, Default)]
pub struct BlockCache {
    by_id: HashMap<u64, Weak<std::cell::RefCell<Block>>>,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `block_get`: if `id > 0` and the index has a live entry, return a
    /// clone of the handle (bumping the strong refcount) without
    /// rebuilding. Otherwise run `build` and, if `id > 0`, register the
    /// result's weak handle.
    pub fn get_or_build(&mut self, id: u64, build: impl FnOnce() -> Option<Block>) -> Option<BlockHandle> {
        if let Some(handle) = self.lookup(id) {
            return Some(handle);
        }
        let block = build()?;
        Some(self.insert(id, block))
    }

    /// Look up a live entry by id without building. `id == 0` never hits
    /// (anonymous blocks are never registered). Used by the block parser,
    /// which needs to interleave lookups with recursive parsing of
    /// composite children and so cannot hold a single `FnOnce` closure for
    /// the whole subtree.
    pub fn lookup(&mut self, id: u64) -> Option<BlockHandle> {
        if id == 0 {
            return None;
        }
        if let Some(weak) = self.by_id.get(&id) {
            if let Some(handle) = weak.upgrade() {
                return Some(handle);
            }
            self.by_id.remove(&id);
        }
        None
    }

    /// Wrap a freshly built `Block` in a handle and, if `id > 0`, register
    /// it in the id-index.
    pub fn insert(&mut self, id: u64, block: Block) -> BlockHandle {
        let handle: BlockHandle = Rc::new(std::cell::RefCell::new(block));
        if id > 0 {
            self.by_id.insert(id, Rc::downgrade(&handle));
        }
        handle
    }

    /// Drop any dead weak entries. Call periodically or after a
    /// reconciliation pass that released blocks.
    pub fn prune_dead(&mut self) {
        self.by_id.retain(|_, weak| weak.strong_count() > 0);
    }

    pub fn live_count(&self) -> usize {
        self.by_id.values().filter(|w| w.strong_count() > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;
    use crate::color::Color;
    use crate::geometry::{Anchor, ContentAnchor, ContentTransform};
    use crate::size_language::SizeValue;

    fn spacer(id: u64) -> Block {
        Block {
            id,
            kind: BlockKind::Spacer,
            anchor: Anchor::Left,
            color: Some(Color(0)),
            min_width: SizeValue::Auto,
            max_width: SizeValue::Auto,
            min_height: SizeValue::Auto,
            max_height: SizeValue::Auto,
            content_width: SizeValue::Auto,
            content_height: SizeValue::Auto,
            content_transform: ContentTransform::Normal,
            content_anchor: ContentAnchor::LeftCenter,
            borders: Default::default(),
            render: true,
            content: None,
            natural_width: 0,
            natural_height: 0,
        }
    }

    #[test]
    fn same_id_reuses_without_rebuilding() {
        let mut cache = BlockCache::new();
        let mut build_calls = 0;
        let a = cache
            .get_or_build(42, || {
                build_calls += 1;
                Some(spacer(42))
            })
            .unwrap();
        let b = cache
            .get_or_build(42, || {
                build_calls += 1;
                Some(spacer(42))
            })
            .unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(build_calls, 1);
    }

    #[test]
    fn zero_id_never_caches() {
        let mut cache = BlockCache::new();
        let mut build_calls = 0;
        let _a = cache
            .get_or_build(0, || {
                build_calls += 1;
                Some(spacer(0))
            })
            .unwrap();
        let _b = cache
            .get_or_build(0, || {
                build_calls += 1;
                Some(spacer(0))
            })
            .unwrap();
        assert_eq!(build_calls, 2);
        assert_eq!(cache.live_count(), 0);
    }

    #[test]
    fn dropping_last_strong_ref_frees_id_slot() {
        let mut cache = BlockCache::new();
        let handle = cache.get_or_build(7, || Some(spacer(7))).unwrap();
        assert_eq!(cache.live_count(), 1);
        drop(handle);
        cache.prune_dead();
        assert_eq!(cache.live_count(), 0);
    }
}
