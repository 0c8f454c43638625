//! Broad Phase Pair Management
//!
//! Wraps the [`DynamicTree`] with a move buffer. Proxies created, moved out
//! of their fat AABB or explicitly touched are queried against the tree in
//! [`BroadPhase::update_pairs`]; the resulting candidate pairs are emitted
//! once each, sorted by proxy id so pair creation order is deterministic.

use crate::collision::{Aabb, RayCastInput};
use crate::dynamic_bvh::{DynamicTree, NULL_NODE};
use crate::math::Vec2;

/// Proxy id inside the broad phase (a leaf of the dynamic tree).
pub type ProxyId = u32;

/// Broad phase: dynamic tree plus move buffer and pair buffer.
#[derive(Clone, Debug)]
pub struct BroadPhase<T> {
    tree: DynamicTree<T>,
    proxy_count: usize,
    move_buffer: Vec<ProxyId>,
    pair_buffer: Vec<(ProxyId, ProxyId)>,
}

impl<T: Copy> BroadPhase<T> {
    /// Create an empty broad phase
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: DynamicTree::new(),
            proxy_count: 0,
            move_buffer: Vec::new(),
            pair_buffer: Vec::new(),
        }
    }

    /// Create a proxy with a tight AABB. Pairs for it are reported on the
    /// next `update_pairs`.
    pub fn create_proxy(&mut self, aabb: &Aabb, data: T) -> ProxyId {
        let proxy_id = self.tree.create_proxy(aabb, data);
        self.proxy_count += 1;
        self.buffer_move(proxy_id);
        proxy_id
    }

    /// Destroy a proxy. Pairs involving it must be dropped by the caller.
    pub fn destroy_proxy(&mut self, proxy_id: ProxyId) {
        self.unbuffer_move(proxy_id);
        self.proxy_count = self.proxy_count.saturating_sub(1);
        self.tree.destroy_proxy(proxy_id);
    }

    /// Move a proxy. Only buffers it for pairing if the tree re-inserted it.
    pub fn move_proxy(&mut self, proxy_id: ProxyId, aabb: &Aabb, displacement: Vec2) {
        if self.tree.move_proxy(proxy_id, aabb, displacement) {
            self.buffer_move(proxy_id);
        }
    }

    /// Force a proxy to be re-paired on the next update (filter changes).
    pub fn touch_proxy(&mut self, proxy_id: ProxyId) {
        self.buffer_move(proxy_id);
    }

    /// Fat AABB of a proxy.
    #[inline]
    #[must_use]
    pub fn fat_aabb(&self, proxy_id: ProxyId) -> Aabb {
        self.tree.fat_aabb(proxy_id)
    }

    /// Payload of a proxy.
    #[inline]
    #[must_use]
    pub fn user_data(&self, proxy_id: ProxyId) -> Option<T> {
        self.tree.user_data(proxy_id)
    }

    /// Whether the fat AABBs of two proxies overlap.
    #[inline]
    #[must_use]
    pub fn test_overlap(&self, proxy_a: ProxyId, proxy_b: ProxyId) -> bool {
        self.tree
            .fat_aabb(proxy_a)
            .overlaps(&self.tree.fat_aabb(proxy_b))
    }

    /// Number of live proxies.
    #[inline]
    #[must_use]
    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    /// Height of the underlying tree.
    #[must_use]
    pub fn tree_height(&self) -> i32 {
        self.tree.height()
    }

    /// Balance of the underlying tree.
    #[must_use]
    pub fn tree_balance(&self) -> i32 {
        self.tree.max_balance()
    }

    /// Quality metric of the underlying tree.
    #[must_use]
    pub fn tree_quality(&self) -> f32 {
        self.tree.area_ratio()
    }

    /// Report new candidate pairs to `callback` as `(data_a, data_b)`.
    ///
    /// Each moved proxy is queried against the tree. A pair where both
    /// proxies moved is only emitted from the lower id. The pair buffer is
    /// sorted and deduplicated before any callback runs.
    pub fn update_pairs<F: FnMut(T, T)>(&mut self, mut callback: F) {
        self.pair_buffer.clear();

        {
            let tree = &self.tree;
            let pairs = &mut self.pair_buffer;
            for &query_proxy in &self.move_buffer {
                if query_proxy == NULL_NODE {
                    continue;
                }

                // Query tree, create pairs and add them to the pair buffer.
                let fat_aabb = tree.fat_aabb(query_proxy);
                tree.query(&fat_aabb, |proxy_id| {
                    if proxy_id == query_proxy {
                        return true;
                    }

                    // Both proxies are moving. Avoid duplicate pairs.
                    if tree.was_moved(proxy_id) && proxy_id > query_proxy {
                        return true;
                    }

                    pairs.push((proxy_id.min(query_proxy), proxy_id.max(query_proxy)));
                    true
                });
            }
        }

        self.pair_buffer.sort_unstable();
        self.pair_buffer.dedup();

        for &(proxy_a, proxy_b) in &self.pair_buffer {
            if let (Some(a), Some(b)) = (self.tree.user_data(proxy_a), self.tree.user_data(proxy_b)) {
                callback(a, b);
            }
        }

        // Clear move flags
        for &proxy_id in &self.move_buffer {
            if proxy_id != NULL_NODE {
                self.tree.clear_moved(proxy_id);
            }
        }
        self.move_buffer.clear();
    }

    /// Visit proxies overlapping `aabb`. Return false to stop.
    pub fn query<F: FnMut(ProxyId) -> bool>(&self, aabb: &Aabb, callback: F) {
        self.tree.query(aabb, callback);
    }

    /// Ray cast against proxies; see [`DynamicTree::ray_cast`].
    pub fn ray_cast<F: FnMut(&RayCastInput, ProxyId) -> f32>(&self, input: &RayCastInput, callback: F) {
        self.tree.ray_cast(input, callback);
    }

    /// Translate all proxies by `-new_origin`.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        self.tree.shift_origin(new_origin);
    }

    /// Check the tree structure.
    #[must_use]
    pub fn validate(&self) -> bool {
        self.tree.validate()
    }

    fn buffer_move(&mut self, proxy_id: ProxyId) {
        self.move_buffer.push(proxy_id);
    }

    fn unbuffer_move(&mut self, proxy_id: ProxyId) {
        for id in &mut self.move_buffer {
            if *id == proxy_id {
                *id = NULL_NODE;
            }
        }
    }
}

impl<T: Copy> Default for BroadPhase<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f32, y: f32) -> Aabb {
        Aabb::new(Vec2::new(x, y), Vec2::new(x + 1.0, y + 1.0))
    }

    fn pairs(bp: &mut BroadPhase<u32>) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        bp.update_pairs(|a, b| out.push((a.min(b), a.max(b))));
        out
    }

    #[test]
    fn test_new_proxies_pair_once() {
        let mut bp = BroadPhase::new();
        bp.create_proxy(&unit_box(0.0, 0.0), 10u32);
        bp.create_proxy(&unit_box(0.5, 0.5), 11);
        bp.create_proxy(&unit_box(10.0, 10.0), 12);

        assert_eq!(pairs(&mut bp), vec![(10, 11)]);
        // Nothing moved since: no pairs.
        assert!(pairs(&mut bp).is_empty());
    }

    #[test]
    fn test_move_into_overlap() {
        let mut bp = BroadPhase::new();
        bp.create_proxy(&unit_box(0.0, 0.0), 0u32);
        let p1 = bp.create_proxy(&unit_box(5.0, 0.0), 1);
        assert!(pairs(&mut bp).is_empty());

        bp.move_proxy(p1, &unit_box(0.5, 0.0), Vec2::new(-4.5, 0.0));
        assert_eq!(pairs(&mut bp), vec![(0, 1)]);
    }

    #[test]
    fn test_destroyed_proxy_not_reported() {
        let mut bp = BroadPhase::new();
        bp.create_proxy(&unit_box(0.0, 0.0), 0u32);
        let p1 = bp.create_proxy(&unit_box(0.5, 0.0), 1);
        bp.destroy_proxy(p1);
        assert!(pairs(&mut bp).is_empty());
        assert_eq!(bp.proxy_count(), 1);
        assert!(bp.validate());
    }

    #[test]
    fn test_touch_proxy_repairs() {
        let mut bp = BroadPhase::new();
        let p0 = bp.create_proxy(&unit_box(0.0, 0.0), 0u32);
        bp.create_proxy(&unit_box(0.5, 0.0), 1);
        assert_eq!(pairs(&mut bp).len(), 1);
        bp.touch_proxy(p0);
        assert_eq!(pairs(&mut bp), vec![(0, 1)]);
    }

    #[test]
    fn test_pairs_are_sorted() {
        let mut bp = BroadPhase::new();
        for i in 0..6u32 {
            bp.create_proxy(&unit_box(i as f32 * 0.5, 0.0), i);
        }
        let mut seen = Vec::new();
        bp.update_pairs(|a, b| seen.push((a, b)));
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(seen, sorted);
    }
}
