//! Dynamic AABB Tree (Incremental BVH)
//!
//! A self-balancing binary tree of AABBs for broad-phase collision detection
//! with moving objects. Supports O(log n) insert, remove and move.
//!
//! # Features
//!
//! - **Fat AABBs**: leaves are enlarged by `AABB_EXTENSION` and by the
//!   predicted displacement, so most per-step moves need no restructuring
//! - **Perimeter cost insertion**: the sibling is chosen by the surface-area
//!   heuristic (perimeter in 2D)
//! - **Tree rotations**: one balancing rotation per ancestor on every insert
//!   and remove
//! - **Moved flags**: re-inserted leaves are marked until the broad phase
//!   has generated their pairs
//! - **Ray casts** with caller-controlled clipping
//! - **Maintenance**: validation, metrics, bottom-up rebuild, origin shift
//!
//! Node ids are stable for the lifetime of a proxy; internal nodes and freed
//! leaves are recycled through a free list.

use crate::collision::{Aabb, RayCastInput};
use crate::math::Vec2;
use crate::settings::{AABB_EXTENSION, AABB_MULTIPLIER};

/// Null node sentinel
pub const NULL_NODE: u32 = u32::MAX;

/// A node in the dynamic AABB tree
#[derive(Clone, Debug)]
struct DynamicNode<T> {
    /// Fat AABB (enlarged for movement prediction)
    aabb: Aabb,
    /// Parent node index (NULL_NODE if root), or next free node when free
    parent: u32,
    /// Left child (NULL_NODE if leaf)
    left: u32,
    /// Right child (NULL_NODE if leaf)
    right: u32,
    /// Height: 0 for leaf, -1 for free node
    height: i32,
    /// Payload, present on leaves only
    data: Option<T>,
    /// Leaf was re-inserted since the last pair update
    moved: bool,
}

impl<T> DynamicNode<T> {
    fn free() -> Self {
        Self {
            aabb: Aabb::default(),
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            height: -1,
            data: None,
            moved: false,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left == NULL_NODE
    }
}

/// Dynamic AABB tree holding a copyable payload per leaf.
#[derive(Clone, Debug)]
pub struct DynamicTree<T> {
    /// Node pool
    nodes: Vec<DynamicNode<T>>,
    /// Free list (indices of unused nodes)
    free_list: Vec<u32>,
    /// Root node index
    root: u32,
}

impl<T: Copy> DynamicTree<T> {
    /// Create a new empty tree
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
            root: NULL_NODE,
        }
    }

    /// Create a proxy for a tight AABB. Returns the proxy (leaf node) id.
    pub fn create_proxy(&mut self, aabb: &Aabb, data: T) -> u32 {
        let proxy_id = self.alloc_node();
        let node = &mut self.nodes[proxy_id as usize];
        node.aabb = aabb.fattened(AABB_EXTENSION);
        node.data = Some(data);
        node.height = 0;
        node.moved = true;

        self.insert_leaf(proxy_id);
        proxy_id
    }

    /// Destroy a proxy. Ids that are not live leaves are ignored.
    pub fn destroy_proxy(&mut self, proxy_id: u32) {
        if !self.is_live_leaf(proxy_id) {
            return;
        }
        self.remove_leaf(proxy_id);
        self.free_node(proxy_id);
    }

    /// Move a proxy with a swept AABB.
    ///
    /// Only re-inserts if the tight AABB has left the fat AABB, or if the
    /// fat AABB has grown far larger than the object needs. Returns true if
    /// the leaf was re-inserted, in which case it also gets flagged as moved.
    pub fn move_proxy(&mut self, proxy_id: u32, aabb: &Aabb, displacement: Vec2) -> bool {
        if !self.is_live_leaf(proxy_id) {
            return false;
        }

        // Extend AABB
        let mut fat_aabb = aabb.fattened(AABB_EXTENSION);

        // Predict AABB movement
        let d = displacement * AABB_MULTIPLIER;
        if d.x < 0.0 {
            fat_aabb.lower.x += d.x;
        } else {
            fat_aabb.upper.x += d.x;
        }
        if d.y < 0.0 {
            fat_aabb.lower.y += d.y;
        } else {
            fat_aabb.upper.y += d.y;
        }

        let tree_aabb = self.nodes[proxy_id as usize].aabb;
        if tree_aabb.contains(aabb) {
            // The tree AABB still contains the object, but it might be too large.
            // Perhaps the object was moving fast but has since gone to sleep.
            let huge_aabb = fat_aabb.fattened(4.0 * AABB_EXTENSION);
            if huge_aabb.contains(&tree_aabb) {
                // The tree AABB contains the object AABB and is not too large.
                // No tree update needed.
                return false;
            }
            // Otherwise the tree AABB is huge and needs to be shrunk
        }

        self.remove_leaf(proxy_id);
        self.nodes[proxy_id as usize].aabb = fat_aabb;
        self.insert_leaf(proxy_id);
        self.nodes[proxy_id as usize].moved = true;
        true
    }

    /// Payload of a proxy.
    #[inline]
    #[must_use]
    pub fn user_data(&self, proxy_id: u32) -> Option<T> {
        self.nodes.get(proxy_id as usize).and_then(|n| n.data)
    }

    /// Whether the proxy was re-inserted since its flag was last cleared.
    #[inline]
    #[must_use]
    pub fn was_moved(&self, proxy_id: u32) -> bool {
        self.nodes.get(proxy_id as usize).is_some_and(|n| n.moved)
    }

    /// Clear the moved flag.
    #[inline]
    pub fn clear_moved(&mut self, proxy_id: u32) {
        if let Some(node) = self.nodes.get_mut(proxy_id as usize) {
            node.moved = false;
        }
    }

    /// Fat AABB of a proxy.
    #[inline]
    #[must_use]
    pub fn fat_aabb(&self, proxy_id: u32) -> Aabb {
        self.nodes[proxy_id as usize].aabb
    }

    /// Visit every proxy whose fat AABB overlaps `aabb`. The callback
    /// returns false to stop the query.
    pub fn query<F: FnMut(u32) -> bool>(&self, aabb: &Aabb, mut callback: F) {
        if self.root == NULL_NODE {
            return;
        }

        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id as usize];
            if !node.aabb.overlaps(aabb) {
                continue;
            }

            if node.is_leaf() {
                if !callback(node_id) {
                    return;
                }
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    /// Cast a ray against the proxies in the tree.
    ///
    /// The callback performs the exact shape ray cast and returns the new
    /// `max_fraction`: `0` terminates the cast, a value in `(0, 1]` clips
    /// the ray, and a negative value ignores the proxy.
    pub fn ray_cast<F: FnMut(&RayCastInput, u32) -> f32>(&self, input: &RayCastInput, mut callback: F) {
        if self.root == NULL_NODE {
            return;
        }

        let p1 = input.p1;
        let p2 = input.p2;
        let r = (p2 - p1).normalized();
        if r == Vec2::ZERO {
            return;
        }

        // v is perpendicular to the segment.
        let v = Vec2::scalar_cross(1.0, r);
        let abs_v = v.abs();

        // Separating axis for segment (Gino, p80).
        // |dot(v, p1 - c)| > dot(|v|, h)

        let mut max_fraction = input.max_fraction;

        // Build a bounding box for the segment.
        let segment_aabb = |max_fraction: f32| {
            let t = p1 + (p2 - p1) * max_fraction;
            Aabb::new(p1.min(t), p1.max(t))
        };
        let mut segment = segment_aabb(max_fraction);

        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id as usize];
            if !node.aabb.overlaps(&segment) {
                continue;
            }

            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            if node.is_leaf() {
                let sub_input = RayCastInput {
                    p1,
                    p2,
                    max_fraction,
                };

                let value = callback(&sub_input, node_id);

                if value == 0.0 {
                    // The client has terminated the ray cast.
                    return;
                }

                if value > 0.0 {
                    // Update segment bounding box.
                    max_fraction = value;
                    segment = segment_aabb(max_fraction);
                }
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    /// Number of live proxies (leaf nodes)
    #[must_use]
    pub fn proxy_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.height == 0 && n.data.is_some())
            .count()
    }

    /// Tree height (0 for an empty tree or a single leaf)
    #[must_use]
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root as usize].height
        }
    }

    /// Maximum height difference between the children of any internal node.
    #[must_use]
    pub fn max_balance(&self) -> i32 {
        self.nodes
            .iter()
            .filter(|n| n.height > 1)
            .map(|n| (self.nodes[n.right as usize].height - self.nodes[n.left as usize].height).abs())
            .max()
            .unwrap_or(0)
    }

    /// Sum of node perimeters over the root perimeter.
    #[must_use]
    pub fn area_ratio(&self) -> f32 {
        if self.root == NULL_NODE {
            return 0.0;
        }
        let root_area = self.nodes[self.root as usize].aabb.perimeter();
        let total_area: f32 = self
            .nodes
            .iter()
            .filter(|n| n.height >= 0)
            .map(|n| n.aabb.perimeter())
            .sum();
        total_area / root_area
    }

    /// Check parent links, heights and bounding boxes of the whole tree.
    #[must_use]
    pub fn validate(&self) -> bool {
        if self.root != NULL_NODE && self.nodes[self.root as usize].parent != NULL_NODE {
            return false;
        }
        if !self.validate_node(self.root) {
            return false;
        }
        if self.height() != self.compute_height(self.root) {
            return false;
        }
        let live = self.nodes.iter().filter(|n| n.height >= 0).count();
        live + self.free_list.len() == self.nodes.len()
    }

    fn validate_node(&self, index: u32) -> bool {
        if index == NULL_NODE {
            return true;
        }
        let node = &self.nodes[index as usize];
        if node.is_leaf() {
            return node.right == NULL_NODE && node.height == 0 && node.data.is_some();
        }

        let (left, right) = (node.left, node.right);
        if right == NULL_NODE {
            return false;
        }
        let (ln, rn) = (&self.nodes[left as usize], &self.nodes[right as usize]);
        if ln.parent != index || rn.parent != index {
            return false;
        }
        if node.height != 1 + ln.height.max(rn.height) {
            return false;
        }
        let combined = ln.aabb.union(&rn.aabb);
        if combined != node.aabb {
            return false;
        }
        self.validate_node(left) && self.validate_node(right)
    }

    fn compute_height(&self, index: u32) -> i32 {
        if index == NULL_NODE {
            return 0;
        }
        let node = &self.nodes[index as usize];
        if node.is_leaf() {
            return 0;
        }
        1 + self.compute_height(node.left).max(self.compute_height(node.right))
    }

    /// Rebuild an optimal tree from the current leaves. Slow; meant for
    /// static scenes after loading.
    pub fn rebuild_bottom_up(&mut self) {
        let mut leaves: Vec<u32> = Vec::new();

        // Build array of leaves. Free the rest.
        for i in 0..self.nodes.len() as u32 {
            let node = &mut self.nodes[i as usize];
            if node.height < 0 {
                // free node in pool
                continue;
            }
            if node.is_leaf() {
                node.parent = NULL_NODE;
                leaves.push(i);
            } else {
                self.free_node(i);
            }
        }

        while leaves.len() > 1 {
            let mut min_cost = f32::MAX;
            let (mut i_min, mut j_min) = (0, 1);
            for i in 0..leaves.len() {
                let aabb_i = self.nodes[leaves[i] as usize].aabb;
                for j in i + 1..leaves.len() {
                    let aabb_j = self.nodes[leaves[j] as usize].aabb;
                    let cost = aabb_i.union(&aabb_j).perimeter();
                    if cost < min_cost {
                        i_min = i;
                        j_min = j;
                        min_cost = cost;
                    }
                }
            }

            let index1 = leaves[i_min];
            let index2 = leaves[j_min];

            let parent = self.alloc_node();
            let (aabb, height) = {
                let (c1, c2) = (&self.nodes[index1 as usize], &self.nodes[index2 as usize]);
                (c1.aabb.union(&c2.aabb), 1 + c1.height.max(c2.height))
            };
            let node = &mut self.nodes[parent as usize];
            node.left = index1;
            node.right = index2;
            node.height = height;
            node.aabb = aabb;
            node.parent = NULL_NODE;

            self.nodes[index1 as usize].parent = parent;
            self.nodes[index2 as usize].parent = parent;

            leaves[j_min] = leaves[leaves.len() - 1];
            leaves[i_min] = parent;
            leaves.pop();
        }

        self.root = leaves.first().copied().unwrap_or(NULL_NODE);
    }

    /// Translate every node by `-new_origin`.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        for node in &mut self.nodes {
            node.aabb.lower -= new_origin;
            node.aabb.upper -= new_origin;
        }
    }

    // =========== Internal methods ===========

    fn is_live_leaf(&self, proxy_id: u32) -> bool {
        self.nodes
            .get(proxy_id as usize)
            .is_some_and(|n| n.height == 0 && n.data.is_some())
    }

    fn alloc_node(&mut self) -> u32 {
        let id = if let Some(id) = self.free_list.pop() {
            self.nodes[id as usize] = DynamicNode::free();
            id
        } else {
            let id = self.nodes.len() as u32;
            self.nodes.push(DynamicNode::free());
            id
        };
        self.nodes[id as usize].height = 0;
        id
    }

    fn free_node(&mut self, node_id: u32) {
        self.nodes[node_id as usize] = DynamicNode::free();
        self.free_list.push(node_id);
    }

    fn insert_leaf(&mut self, leaf: u32) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf as usize].parent = NULL_NODE;
            return;
        }

        // Find the best sibling for this node
        let leaf_aabb = self.nodes[leaf as usize].aabb;
        let mut sibling = self.root;

        while !self.nodes[sibling as usize].is_leaf() {
            let left = self.nodes[sibling as usize].left;
            let right = self.nodes[sibling as usize].right;

            let area = self.nodes[sibling as usize].aabb.perimeter();
            let combined = leaf_aabb.union(&self.nodes[sibling as usize].aabb);
            let combined_area = combined.perimeter();

            // Cost of creating a new parent for this node and the new leaf
            let cost = 2.0 * combined_area;

            // Minimum cost of pushing the leaf further down the tree
            let inheritance_cost = 2.0 * (combined_area - area);

            let cost_left = self.child_insertion_cost(left, &leaf_aabb, inheritance_cost);
            let cost_right = self.child_insertion_cost(right, &leaf_aabb, inheritance_cost);

            // Descend according to the minimum cost.
            if cost < cost_left && cost < cost_right {
                break;
            }

            sibling = if cost_left < cost_right { left } else { right };
        }

        // Create a new parent.
        let old_parent = self.nodes[sibling as usize].parent;
        let new_parent = self.alloc_node();
        {
            let sibling_node = &self.nodes[sibling as usize];
            let aabb = leaf_aabb.union(&sibling_node.aabb);
            let height = sibling_node.height + 1;
            let node = &mut self.nodes[new_parent as usize];
            node.parent = old_parent;
            node.aabb = aabb;
            node.height = height;
        }

        if old_parent != NULL_NODE {
            // The sibling was not the root.
            if self.nodes[old_parent as usize].left == sibling {
                self.nodes[old_parent as usize].left = new_parent;
            } else {
                self.nodes[old_parent as usize].right = new_parent;
            }
        } else {
            // The sibling was the root.
            self.root = new_parent;
        }

        self.nodes[new_parent as usize].left = sibling;
        self.nodes[new_parent as usize].right = leaf;
        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;

        // Walk back up the tree fixing heights and AABBs
        self.fix_upwards(new_parent);
    }

    fn child_insertion_cost(&self, child: u32, leaf_aabb: &Aabb, inheritance: f32) -> f32 {
        let combined = leaf_aabb.union(&self.nodes[child as usize].aabb);
        if self.nodes[child as usize].is_leaf() {
            combined.perimeter() + inheritance
        } else {
            let old_area = self.nodes[child as usize].aabb.perimeter();
            let new_area = combined.perimeter();
            (new_area - old_area) + inheritance
        }
    }

    fn remove_leaf(&mut self, leaf: u32) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grand_parent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].left == leaf {
            self.nodes[parent as usize].right
        } else {
            self.nodes[parent as usize].left
        };

        if grand_parent != NULL_NODE {
            // Destroy parent and connect sibling to grand_parent.
            if self.nodes[grand_parent as usize].left == parent {
                self.nodes[grand_parent as usize].left = sibling;
            } else {
                self.nodes[grand_parent as usize].right = sibling;
            }
            self.nodes[sibling as usize].parent = grand_parent;
            self.free_node(parent);

            // Adjust ancestor bounds.
            self.fix_upwards(grand_parent);
        } else {
            self.root = sibling;
            self.nodes[sibling as usize].parent = NULL_NODE;
            self.free_node(parent);
        }
    }

    fn fix_upwards(&mut self, start: u32) {
        let mut node_id = start;
        while node_id != NULL_NODE {
            node_id = self.balance(node_id);

            let left = self.nodes[node_id as usize].left;
            let right = self.nodes[node_id as usize].right;

            let lh = self.nodes[left as usize].height;
            let rh = self.nodes[right as usize].height;
            self.nodes[node_id as usize].height = 1 + lh.max(rh);
            self.nodes[node_id as usize].aabb = self.nodes[left as usize]
                .aabb
                .union(&self.nodes[right as usize].aabb);

            node_id = self.nodes[node_id as usize].parent;
        }
    }

    /// Perform a left or right rotation if node A is imbalanced.
    /// Returns the new root index of the subtree.
    ///
    /// ```text
    ///         A
    ///       /   \
    ///      B     C
    ///     / \   / \
    ///    D   E F   G
    /// ```
    fn balance(&mut self, i_a: u32) -> u32 {
        let a = &self.nodes[i_a as usize];
        if a.is_leaf() || a.height < 2 {
            return i_a;
        }

        let i_b = a.left;
        let i_c = a.right;
        let balance = self.nodes[i_c as usize].height - self.nodes[i_b as usize].height;

        if balance > 1 {
            self.rotate_up(i_a, i_b, i_c, true)
        } else if balance < -1 {
            self.rotate_up(i_a, i_c, i_b, false)
        } else {
            i_a
        }
    }

    /// Rotate child `i_up` of `i_a` above it; `i_other` is the child that
    /// stays. `up_is_right` tells which side `i_up` hangs on.
    fn rotate_up(&mut self, i_a: u32, i_other: u32, i_up: u32, up_is_right: bool) -> u32 {
        let i_f = self.nodes[i_up as usize].left;
        let i_g = self.nodes[i_up as usize].right;

        // Swap A and the rising child
        let a_parent = self.nodes[i_a as usize].parent;
        self.nodes[i_up as usize].left = i_a;
        self.nodes[i_up as usize].parent = a_parent;
        self.nodes[i_a as usize].parent = i_up;

        // A's old parent should point to the rising child
        if a_parent != NULL_NODE {
            if self.nodes[a_parent as usize].left == i_a {
                self.nodes[a_parent as usize].left = i_up;
            } else {
                self.nodes[a_parent as usize].right = i_up;
            }
        } else {
            self.root = i_up;
        }

        // Keep the taller grandchild on the rising node; hand the other to A.
        let (keep, give) = if self.nodes[i_f as usize].height > self.nodes[i_g as usize].height {
            (i_f, i_g)
        } else {
            (i_g, i_f)
        };

        self.nodes[i_up as usize].right = keep;
        if up_is_right {
            self.nodes[i_a as usize].right = give;
        } else {
            self.nodes[i_a as usize].left = give;
        }
        self.nodes[give as usize].parent = i_a;

        let other = &self.nodes[i_other as usize];
        let given = &self.nodes[give as usize];
        let a_aabb = other.aabb.union(&given.aabb);
        let a_height = 1 + other.height.max(given.height);
        self.nodes[i_a as usize].aabb = a_aabb;
        self.nodes[i_a as usize].height = a_height;

        let kept = &self.nodes[keep as usize];
        let up_aabb = a_aabb.union(&kept.aabb);
        let up_height = 1 + a_height.max(kept.height);
        self.nodes[i_up as usize].aabb = up_aabb;
        self.nodes[i_up as usize].height = up_height;

        i_up
    }
}

impl<T: Copy> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_aabb(x: f32, y: f32) -> Aabb {
        Aabb::new(Vec2::new(x, y), Vec2::new(x + 1.0, y + 1.0))
    }

    fn collect(tree: &DynamicTree<u32>, aabb: &Aabb) -> Vec<u32> {
        let mut out = Vec::new();
        tree.query(aabb, |id| {
            out.push(tree.user_data(id).unwrap());
            true
        });
        out.sort_unstable();
        out
    }

    #[test]
    fn test_insert_and_query() {
        let mut tree = DynamicTree::new();

        tree.create_proxy(&make_aabb(0.0, 0.0), 0u32);
        tree.create_proxy(&make_aabb(10.0, 10.0), 1);
        tree.create_proxy(&make_aabb(20.0, 20.0), 2);

        assert_eq!(tree.proxy_count(), 3);
        assert!(tree.validate());

        // Query near first proxy
        let results = collect(&tree, &make_aabb(-1.0, -1.0));
        assert_eq!(results, vec![0]);

        // Query large area
        let all = collect(&tree, &Aabb::new(Vec2::new(-100.0, -100.0), Vec2::new(100.0, 100.0)));
        assert_eq!(all, vec![0, 1, 2]);
    }

    #[test]
    fn test_destroy() {
        let mut tree = DynamicTree::new();

        tree.create_proxy(&make_aabb(0.0, 0.0), 0u32);
        let p1 = tree.create_proxy(&make_aabb(5.0, 5.0), 1);
        tree.create_proxy(&make_aabb(10.0, 10.0), 2);

        tree.destroy_proxy(p1);
        assert_eq!(tree.proxy_count(), 2);
        assert!(tree.validate());

        let all = collect(&tree, &Aabb::new(Vec2::new(-100.0, -100.0), Vec2::new(100.0, 100.0)));
        assert_eq!(all, vec![0, 2]);

        // Double destroy is ignored.
        tree.destroy_proxy(p1);
        assert!(tree.validate());
    }

    #[test]
    fn test_move_within_fat_margin_keeps_leaf() {
        let mut tree = DynamicTree::new();
        let p0 = tree.create_proxy(&make_aabb(0.0, 0.0), 0u32);
        tree.clear_moved(p0);

        // Small movement within fat AABB margin: no reinsert
        let tiny_move = make_aabb(0.05, 0.0);
        assert!(!tree.move_proxy(p0, &tiny_move, Vec2::new(0.05, 0.0)));
        assert!(!tree.was_moved(p0));
    }

    #[test]
    fn test_move_far_reinserts_with_prediction() {
        let mut tree = DynamicTree::new();
        let p0 = tree.create_proxy(&make_aabb(0.0, 0.0), 0u32);
        tree.create_proxy(&make_aabb(50.0, 0.0), 1);

        let far_move = make_aabb(100.0, 100.0);
        assert!(tree.move_proxy(p0, &far_move, Vec2::new(1.0, 0.0)));
        assert!(tree.was_moved(p0));
        assert!(tree.validate());

        // Fat box is extended ahead of the motion only.
        let fat = tree.fat_aabb(p0);
        assert!((fat.upper.x - (101.0 + AABB_EXTENSION + AABB_MULTIPLIER)).abs() < 1e-4);
        assert!((fat.lower.x - (100.0 - AABB_EXTENSION)).abs() < 1e-4);

        let results = collect(&tree, &make_aabb(99.0, 99.0));
        assert_eq!(results, vec![0]);
    }

    #[test]
    fn test_huge_fat_box_is_shrunk() {
        let mut tree = DynamicTree::new();
        let p0 = tree.create_proxy(&make_aabb(0.0, 0.0), 0u32);
        // Fast move grows the fat box a lot.
        assert!(tree.move_proxy(p0, &make_aabb(2.0, 0.0), Vec2::new(2.0, 0.0)));
        // Object stops inside the fat box; the box is now too large.
        assert!(tree.move_proxy(p0, &make_aabb(2.1, 0.0), Vec2::ZERO));
        let fat = tree.fat_aabb(p0);
        assert!(fat.upper.x < 3.2 + 1e-4);
    }

    #[test]
    fn test_tree_balance() {
        let mut tree = DynamicTree::new();

        // Insert many proxies in a line; rotations keep the tree shallow
        for i in 0..100u32 {
            tree.create_proxy(&make_aabb(i as f32 * 3.0, 0.0), i);
        }

        assert_eq!(tree.proxy_count(), 100);
        assert!(tree.validate());
        assert!(tree.height() < 20, "height={}", tree.height());
        assert!(tree.max_balance() <= 2);
        assert!(tree.area_ratio() >= 1.0);
    }

    #[test]
    fn test_ray_cast_clips_and_terminates() {
        let mut tree = DynamicTree::new();
        for i in 0..5u32 {
            tree.create_proxy(&make_aabb(i as f32 * 4.0, 0.0), i);
        }
        let input = RayCastInput {
            p1: Vec2::new(-1.0, 0.5),
            p2: Vec2::new(30.0, 0.5),
            max_fraction: 1.0,
        };

        let mut hits = Vec::new();
        tree.ray_cast(&input, |_, id| {
            hits.push(tree.user_data(id).unwrap());
            -1.0
        });
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1, 2, 3, 4]);

        let mut count = 0;
        tree.ray_cast(&input, |_, _| {
            count += 1;
            0.0
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn test_rebuild_and_shift() {
        let mut tree = DynamicTree::new();
        let ids: Vec<u32> = (0..20u32)
            .map(|i| tree.create_proxy(&make_aabb((i % 5) as f32 * 2.0, (i / 5) as f32 * 2.0), i))
            .collect();
        tree.destroy_proxy(ids[3]);
        tree.rebuild_bottom_up();
        assert!(tree.validate());
        assert_eq!(tree.proxy_count(), 19);

        tree.shift_origin(Vec2::new(100.0, 0.0));
        let results = collect(&tree, &make_aabb(-100.0, 0.0));
        assert!(results.contains(&0));
    }

    #[test]
    fn test_empty_tree() {
        let tree: DynamicTree<u32> = DynamicTree::new();
        assert_eq!(tree.proxy_count(), 0);
        assert_eq!(tree.height(), 0);
        assert!(tree.validate());
        assert!(collect(&tree, &make_aabb(0.0, 0.0)).is_empty());
    }
}
