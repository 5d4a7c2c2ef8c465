use core::cmp::Ordering;
use core::mem::MaybeUninit;

use alloc::vec::Vec;

use crate::iter::{Iter, Range};

/// Index of the shared nil sentinel. Never dereferenced; all structural
/// reads go through the nil-guarded accessors so the sentinel behaves as a
/// permanently black node with no key.
pub(crate) const NIL: usize = usize::MAX;

/// Node colors used to maintain the balance properties.
///
/// The tree stays balanced by ensuring:
/// - Red nodes have black children
/// - All paths from the root to a leaf cross equal black node counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Red node - cannot be adjacent to another red node
    Red,
    /// Black node - contributes to the black height of its paths
    Black,
}

/// A tree vertex stored in the arena.
///
/// The key lives in a `MaybeUninit` slot so a freed node can drop its key
/// immediately while the structural fields stay plain and readable without
/// branching. A slot's key is initialized exactly while the slot is linked
/// into the tree.
#[derive(Debug)]
struct Node<K> {
    /// The stored key; initialized iff the slot is live
    key: MaybeUninit<K>,

    /// Multiplicity of the key (multiset behavior)
    count: u32,

    /// Arena index of the parent node (`NIL` for the root)
    parent: usize,

    /// Arena index of the left child (`NIL` if none)
    left: usize,

    /// Arena index of the right child (`NIL` if none)
    right: usize,

    /// Color of this node for rebalancing
    color: Color,

    /// Elements in this node's subtree, duplicates included.
    /// Drives rank, selection and range counting.
    size: usize,
}

/// A self-balancing ordered multiset with order-statistics queries.
///
/// Keys are held in a red-black tree whose nodes live in a growable arena
/// and reference each other by index; removed slots are recycled through a
/// free list. Each node also carries its subtree element count, so rank,
/// k-th element and range counting run in O(log n) alongside the usual
/// O(log n) insert/remove/search.
///
/// Key properties:
/// - Multiset semantics: equal keys share one node and bump a multiplicity
/// - Neighbor navigation (`predecessor`/`successor`) over arbitrary probe
///   keys, present or not
/// - Lazy in-order iteration with an explicit stack, restartable at will
/// - Single-threaded; wrap the whole tree in a lock if shared
#[derive(Debug)]
pub struct RbTree<K> {
    /// Arena of node slots; free slots hold no live key
    nodes: Vec<Node<K>>,

    /// Stack of recycled slot indices
    free: Vec<usize>,

    /// Arena index of the root node (`NIL` when empty)
    root: usize,

    /// Number of distinct keys
    len: usize,

    /// Number of stored elements, duplicates included
    total: usize,
}

impl<K> RbTree<K> {
    /// Creates an empty tree.
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NIL,
            len: 0,
            total: 0,
        }
    }

    /// Creates an empty tree with arena space for `capacity` distinct keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            root: NIL,
            len: 0,
            total: 0,
        }
    }

    /// Returns the number of distinct keys in the tree.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of stored elements, counting duplicates.
    #[inline]
    pub const fn total_count(&self) -> usize {
        self.total
    }

    /// Returns `true` if the tree holds no elements.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a lazy in-order iterator over the stored elements.
    ///
    /// Keys with multiplicity above one are yielded once per element. The
    /// walk is driven by an explicit stack and can be restarted at any time
    /// by calling `iter` again.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter::new(self)
    }

    /// Removes every element, recycling the arena for reuse.
    pub fn reset(&mut self) {
        self.drop_keys();
        self.nodes.clear();
        self.free.clear();
        self.root = NIL;
        self.len = 0;
        self.total = 0;
    }

    #[inline]
    pub(crate) const fn root_index(&self) -> usize {
        self.root
    }

    /// Key of a live slot. The caller must only pass indices reachable from
    /// the tree links, which are live by construction.
    #[inline]
    pub(crate) fn key_at(&self, idx: usize) -> &K {
        debug_assert!(idx != NIL && idx < self.nodes.len());
        unsafe { self.nodes[idx].key.assume_init_ref() }
    }

    #[inline]
    pub(crate) fn count_at(&self, idx: usize) -> u32 {
        self.nodes[idx].count
    }

    #[inline]
    pub(crate) fn left_of(&self, idx: usize) -> usize {
        if idx == NIL { NIL } else { self.nodes[idx].left }
    }

    #[inline]
    pub(crate) fn right_of(&self, idx: usize) -> usize {
        if idx == NIL { NIL } else { self.nodes[idx].right }
    }

    #[inline]
    fn parent_of(&self, idx: usize) -> usize {
        if idx == NIL { NIL } else { self.nodes[idx].parent }
    }

    #[inline]
    fn color_of(&self, idx: usize) -> Color {
        if idx == NIL {
            Color::Black
        } else {
            self.nodes[idx].color
        }
    }

    #[inline]
    fn set_color(&mut self, idx: usize, color: Color) {
        if idx != NIL {
            self.nodes[idx].color = color;
        }
    }

    #[inline]
    fn is_red(&self, idx: usize) -> bool {
        self.color_of(idx) == Color::Red
    }

    #[inline]
    fn is_black(&self, idx: usize) -> bool {
        self.color_of(idx) == Color::Black
    }

    #[inline]
    fn size_of(&self, idx: usize) -> usize {
        if idx == NIL { 0 } else { self.nodes[idx].size }
    }

    /// Recomputes `size` for one node from its children.
    #[inline]
    fn refresh_size(&mut self, idx: usize) {
        debug_assert!(idx != NIL);
        let left = self.size_of(self.nodes[idx].left);
        let right = self.size_of(self.nodes[idx].right);
        self.nodes[idx].size = self.nodes[idx].count as usize + left + right;
    }

    /// Recomputes `size` bottom-up from `idx` to the root.
    fn propagate_sizes(&mut self, mut idx: usize) {
        while idx != NIL {
            self.refresh_size(idx);
            idx = self.nodes[idx].parent;
        }
    }

    fn allocate(&mut self, key: K, parent: usize) -> usize {
        let node = Node {
            key: MaybeUninit::new(key),
            count: 1,
            parent,
            left: NIL,
            right: NIL,
            color: Color::Red,
            size: 1,
        };
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = node;
            idx
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    /// Drops the slot's key and returns the slot to the free list.
    fn release(&mut self, idx: usize) {
        debug_assert!(idx < self.nodes.len());
        unsafe { self.nodes[idx].key.assume_init_drop() };
        self.free.push(idx);
    }

    /// Drops every live key via an explicit-stack walk from the root.
    fn drop_keys(&mut self) {
        if !core::mem::needs_drop::<K>() {
            self.root = NIL;
            return;
        }
        let mut stack = Vec::new();
        if self.root != NIL {
            stack.push(self.root);
        }
        while let Some(idx) = stack.pop() {
            let left = self.nodes[idx].left;
            let right = self.nodes[idx].right;
            if left != NIL {
                stack.push(left);
            }
            if right != NIL {
                stack.push(right);
            }
            unsafe { self.nodes[idx].key.assume_init_drop() };
        }
        self.root = NIL;
    }

    /// Index of the smallest key in `idx`'s subtree.
    fn min_index(&self, mut idx: usize) -> usize {
        while idx != NIL {
            let left = self.nodes[idx].left;
            if left == NIL {
                break;
            }
            idx = left;
        }
        idx
    }

    /// Index of the largest key in `idx`'s subtree.
    fn max_index(&self, mut idx: usize) -> usize {
        while idx != NIL {
            let right = self.nodes[idx].right;
            if right == NIL {
                break;
            }
            idx = right;
        }
        idx
    }

    fn rotate_left(&mut self, x: usize) {
        debug_assert!(x != NIL);
        let y = self.nodes[x].right;
        debug_assert!(y != NIL, "rotate_left requires a real right child");

        let y_left = self.nodes[y].left;
        self.nodes[x].right = y_left;
        if y_left != NIL {
            self.nodes[y_left].parent = x;
        }

        let x_parent = self.nodes[x].parent;
        self.nodes[y].parent = x_parent;
        if x_parent == NIL {
            self.root = y;
        } else if x == self.nodes[x_parent].left {
            self.nodes[x_parent].left = y;
        } else {
            self.nodes[x_parent].right = y;
        }

        self.nodes[y].left = x;
        self.nodes[x].parent = y;

        self.refresh_size(x);
        self.refresh_size(y);
    }

    fn rotate_right(&mut self, y: usize) {
        debug_assert!(y != NIL);
        let x = self.nodes[y].left;
        debug_assert!(x != NIL, "rotate_right requires a real left child");

        let x_right = self.nodes[x].right;
        self.nodes[y].left = x_right;
        if x_right != NIL {
            self.nodes[x_right].parent = y;
        }

        let y_parent = self.nodes[y].parent;
        self.nodes[x].parent = y_parent;
        if y_parent == NIL {
            self.root = x;
        } else if y == self.nodes[y_parent].left {
            self.nodes[y_parent].left = x;
        } else {
            self.nodes[y_parent].right = x;
        }

        self.nodes[x].right = y;
        self.nodes[y].parent = x;

        self.refresh_size(y);
        self.refresh_size(x);
    }
}

impl<K: Ord> RbTree<K> {
    /// Inserts one element.
    ///
    /// Duplicates follow multiset semantics: a key equal to one already
    /// stored shares its node and bumps the multiplicity.
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if the key was not previously present
    pub fn insert(&mut self, key: K) -> bool {
        let mut parent = NIL;
        let mut cur = self.root;
        let mut went_left = false;

        while cur != NIL {
            parent = cur;
            match key.cmp(self.key_at(cur)) {
                Ordering::Equal => {
                    self.nodes[cur].count += 1;
                    self.total += 1;
                    self.propagate_sizes(cur);
                    #[cfg(debug_assertions)]
                    debug_assert!(
                        self.check(),
                        "red-black invariants violated after insert"
                    );
                    return false;
                }
                Ordering::Less => {
                    went_left = true;
                    cur = self.nodes[cur].left;
                }
                Ordering::Greater => {
                    went_left = false;
                    cur = self.nodes[cur].right;
                }
            }
        }

        let idx = self.allocate(key, parent);
        if parent == NIL {
            self.root = idx;
        } else if went_left {
            self.nodes[parent].left = idx;
        } else {
            self.nodes[parent].right = idx;
        }

        self.len += 1;
        self.total += 1;
        self.propagate_sizes(idx);
        self.insert_fixup(idx);

        #[cfg(debug_assertions)]
        debug_assert!(self.check(), "red-black invariants violated after insert");

        true
    }

    /// Removes one element equal to `key`.
    ///
    /// A key with multiplicity above one only decrements; the node is
    /// spliced out of the tree once the last element goes.
    ///
    /// # Returns
    ///
    /// * `bool` - `true` if an element was removed, `false` if absent
    pub fn remove(&mut self, key: &K) -> bool {
        let idx = self.find(key);
        if idx == NIL {
            return false;
        }

        if self.nodes[idx].count > 1 {
            self.nodes[idx].count -= 1;
            self.total -= 1;
            self.propagate_sizes(idx);
        } else {
            self.remove_node(idx);
            self.len -= 1;
            self.total -= 1;
        }

        #[cfg(debug_assertions)]
        debug_assert!(self.check(), "red-black invariants violated after remove");

        true
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        self.find(key) != NIL
    }

    /// Returns a reference to the stored key equal to `key`, if any.
    pub fn get(&self, key: &K) -> Option<&K> {
        let idx = self.find(key);
        if idx == NIL { None } else { Some(self.key_at(idx)) }
    }

    /// Returns how many elements equal to `key` are stored.
    pub fn multiplicity(&self, key: &K) -> usize {
        let idx = self.find(key);
        if idx == NIL {
            0
        } else {
            self.nodes[idx].count as usize
        }
    }

    /// Returns the smallest key, or `None` if the tree is empty.
    pub fn min(&self) -> Option<&K> {
        if self.root == NIL {
            return None;
        }
        Some(self.key_at(self.min_index(self.root)))
    }

    /// Returns the largest key, or `None` if the tree is empty.
    pub fn max(&self) -> Option<&K> {
        if self.root == NIL {
            return None;
        }
        Some(self.key_at(self.max_index(self.root)))
    }

    /// Returns the largest stored key strictly less than `key`.
    ///
    /// The probe key does not have to be present.
    pub fn predecessor(&self, key: &K) -> Option<&K> {
        let mut best = NIL;
        let mut cur = self.root;
        while cur != NIL {
            if self.key_at(cur) < key {
                best = cur;
                cur = self.nodes[cur].right;
            } else {
                cur = self.nodes[cur].left;
            }
        }
        if best == NIL { None } else { Some(self.key_at(best)) }
    }

    /// Returns the smallest stored key strictly greater than `key`.
    ///
    /// The probe key does not have to be present.
    pub fn successor(&self, key: &K) -> Option<&K> {
        let mut best = NIL;
        let mut cur = self.root;
        while cur != NIL {
            if self.key_at(cur) > key {
                best = cur;
                cur = self.nodes[cur].left;
            } else {
                cur = self.nodes[cur].right;
            }
        }
        if best == NIL { None } else { Some(self.key_at(best)) }
    }

    /// Returns the number of stored elements less than or equal to `key`,
    /// counting duplicates.
    pub fn rank(&self, key: &K) -> usize {
        let mut acc = 0;
        let mut cur = self.root;
        while cur != NIL {
            if key < self.key_at(cur) {
                cur = self.nodes[cur].left;
            } else {
                acc += self.size_of(self.nodes[cur].left) + self.nodes[cur].count as usize;
                cur = self.nodes[cur].right;
            }
        }
        acc
    }

    /// Returns the number of stored elements in `[low, high]` inclusive,
    /// counting duplicates. Empty when `low > high`.
    pub fn count_range(&self, low: &K, high: &K) -> usize {
        if low > high {
            return 0;
        }
        self.rank(high) - self.rank_below(low)
    }

    /// Returns the `k`-th smallest element, zero-based and counting
    /// duplicates, or `None` if `k` is out of range.
    pub fn select(&self, k: usize) -> Option<&K> {
        if k >= self.total {
            return None;
        }
        let mut cur = self.root;
        let mut remaining = k;
        while cur != NIL {
            let left = self.size_of(self.nodes[cur].left);
            let here = self.nodes[cur].count as usize;
            if remaining < left {
                cur = self.nodes[cur].left;
            } else if remaining < left + here {
                return Some(self.key_at(cur));
            } else {
                remaining -= left + here;
                cur = self.nodes[cur].right;
            }
        }
        None
    }

    /// Returns a lazy in-order iterator over the elements in
    /// `[low, high]` inclusive, duplicates included.
    pub fn range<'a>(&'a self, low: &K, high: &'a K) -> Range<'a, K> {
        Range::new(self, low, high)
    }

    /// Elements strictly less than `key`, counting duplicates.
    fn rank_below(&self, key: &K) -> usize {
        let mut acc = 0;
        let mut cur = self.root;
        while cur != NIL {
            if self.key_at(cur) < key {
                acc += self.size_of(self.nodes[cur].left) + self.nodes[cur].count as usize;
                cur = self.nodes[cur].right;
            } else {
                cur = self.nodes[cur].left;
            }
        }
        acc
    }

    fn find(&self, key: &K) -> usize {
        let mut cur = self.root;
        while cur != NIL {
            match key.cmp(self.key_at(cur)) {
                Ordering::Equal => return cur,
                Ordering::Less => cur = self.nodes[cur].left,
                Ordering::Greater => cur = self.nodes[cur].right,
            }
        }
        NIL
    }

    fn insert_fixup(&mut self, mut idx: usize) {
        while idx != self.root && self.is_red(self.parent_of(idx)) {
            let parent = self.parent_of(idx);
            let grand = self.parent_of(parent);

            if parent == self.left_of(grand) {
                let uncle = self.right_of(grand);

                if self.is_red(uncle) {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grand, Color::Red);
                    idx = grand;
                } else {
                    if idx == self.right_of(parent) {
                        idx = parent;
                        self.rotate_left(idx);
                    }
                    let parent = self.parent_of(idx);
                    let grand = self.parent_of(parent);
                    self.set_color(parent, Color::Black);
                    self.set_color(grand, Color::Red);
                    self.rotate_right(grand);
                }
            } else {
                let uncle = self.left_of(grand);

                if self.is_red(uncle) {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grand, Color::Red);
                    idx = grand;
                } else {
                    if idx == self.left_of(parent) {
                        idx = parent;
                        self.rotate_right(idx);
                    }
                    let parent = self.parent_of(idx);
                    let grand = self.parent_of(parent);
                    self.set_color(parent, Color::Black);
                    self.set_color(grand, Color::Red);
                    self.rotate_left(grand);
                }
            }
        }
        self.set_color(self.root, Color::Black);
    }

    fn remove_node(&mut self, idx: usize) {
        let (spliced_color, fix, fix_parent) = self.splice_out(idx);

        if spliced_color == Color::Black {
            self.delete_fixup(fix, fix_parent);
        }

        if fix_parent != NIL {
            self.propagate_sizes(fix_parent);
        } else if self.root != NIL {
            self.propagate_sizes(self.root);
        }

        self.release(idx);
    }

    /// Unlinks `idx` from the tree, substituting its successor when both
    /// children are real. Returns the color removed from the tree together
    /// with the node now occupying the vacated position and that node's
    /// parent; the parent travels separately because the vacated position
    /// may be the keyless sentinel.
    fn splice_out(&mut self, idx: usize) -> (Color, usize, usize) {
        let spliced_color = self.nodes[idx].color;
        let left = self.nodes[idx].left;
        let right = self.nodes[idx].right;

        if left == NIL {
            let fix_parent = self.nodes[idx].parent;
            self.transplant(idx, right);
            (spliced_color, right, fix_parent)
        } else if right == NIL {
            let fix_parent = self.nodes[idx].parent;
            self.transplant(idx, left);
            (spliced_color, left, fix_parent)
        } else {
            let succ = self.min_index(right);
            let succ_color = self.nodes[succ].color;
            let fix = self.nodes[succ].right;
            let fix_parent;

            if self.nodes[succ].parent == idx {
                fix_parent = succ;
            } else {
                fix_parent = self.nodes[succ].parent;
                self.transplant(succ, fix);
                self.nodes[succ].right = right;
                self.nodes[right].parent = succ;
            }

            self.transplant(idx, succ);
            self.nodes[succ].left = left;
            self.nodes[left].parent = succ;
            self.nodes[succ].color = spliced_color;

            (succ_color, fix, fix_parent)
        }
    }

    /// Replaces the subtree rooted at `old` with the one rooted at `new`
    /// in `old`'s parent.
    fn transplant(&mut self, old: usize, new: usize) {
        let parent = self.nodes[old].parent;
        if parent == NIL {
            self.root = new;
        } else if old == self.nodes[parent].left {
            self.nodes[parent].left = new;
        } else {
            self.nodes[parent].right = new;
        }
        if new != NIL {
            self.nodes[new].parent = parent;
        }
    }

    /// Restores the black-height invariant after a black node was spliced
    /// out above `idx`. `parent` is threaded explicitly because `idx` may
    /// be the sentinel, which carries no parent link.
    fn delete_fixup(&mut self, mut idx: usize, mut parent: usize) {
        while idx != self.root && self.is_black(idx) {
            if idx != NIL {
                parent = self.nodes[idx].parent;
            }
            if parent == NIL {
                break;
            }

            if idx == self.left_of(parent) {
                let mut sibling = self.right_of(parent);

                if self.is_red(sibling) {
                    self.set_color(sibling, Color::Black);
                    self.set_color(parent, Color::Red);
                    self.rotate_left(parent);
                    sibling = self.right_of(parent);
                }

                if self.is_black(self.left_of(sibling)) && self.is_black(self.right_of(sibling)) {
                    self.set_color(sibling, Color::Red);
                    idx = parent;
                } else {
                    if self.is_black(self.right_of(sibling)) {
                        self.set_color(self.left_of(sibling), Color::Black);
                        self.set_color(sibling, Color::Red);
                        self.rotate_right(sibling);
                        sibling = self.right_of(parent);
                    }
                    self.set_color(sibling, self.color_of(parent));
                    self.set_color(parent, Color::Black);
                    self.set_color(self.right_of(sibling), Color::Black);
                    self.rotate_left(parent);
                    idx = self.root;
                }
            } else {
                let mut sibling = self.left_of(parent);

                if self.is_red(sibling) {
                    self.set_color(sibling, Color::Black);
                    self.set_color(parent, Color::Red);
                    self.rotate_right(parent);
                    sibling = self.left_of(parent);
                }

                if self.is_black(self.right_of(sibling)) && self.is_black(self.left_of(sibling)) {
                    self.set_color(sibling, Color::Red);
                    idx = parent;
                } else {
                    if self.is_black(self.left_of(sibling)) {
                        self.set_color(self.right_of(sibling), Color::Black);
                        self.set_color(sibling, Color::Red);
                        self.rotate_left(sibling);
                        sibling = self.left_of(parent);
                    }
                    self.set_color(sibling, self.color_of(parent));
                    self.set_color(parent, Color::Black);
                    self.set_color(self.left_of(sibling), Color::Black);
                    self.rotate_right(parent);
                    idx = self.root;
                }
            }
        }
        self.set_color(idx, Color::Black);
    }

    #[cfg(any(test, debug_assertions))]
    fn check(&self) -> bool {
        if self.root == NIL {
            return self.len == 0 && self.total == 0;
        }
        if self.is_red(self.root) || self.nodes[self.root].parent != NIL {
            return false;
        }
        self.check_subtree(self.root, NIL, None, None)
            .is_some_and(|(_, size)| size == self.total)
    }

    /// Validates coloring, black height, BST bounds, parent links and size
    /// sums below `idx`. Returns the subtree's black height and element
    /// count, or `None` on the first violation.
    #[cfg(any(test, debug_assertions))]
    fn check_subtree(
        &self,
        idx: usize,
        parent: usize,
        low: Option<&K>,
        high: Option<&K>,
    ) -> Option<(usize, usize)> {
        if idx == NIL {
            return Some((1, 0));
        }

        let node = &self.nodes[idx];
        if node.parent != parent || node.count == 0 {
            return None;
        }
        if node.color == Color::Red && (self.is_red(node.left) || self.is_red(node.right)) {
            return None;
        }

        let key = self.key_at(idx);
        if low.is_some_and(|bound| key <= bound) || high.is_some_and(|bound| key >= bound) {
            return None;
        }

        let (left_height, left_size) = self.check_subtree(node.left, idx, low, Some(key))?;
        let (right_height, right_size) = self.check_subtree(node.right, idx, Some(key), high)?;
        if left_height != right_height {
            return None;
        }

        let size = node.count as usize + left_size + right_size;
        if size != node.size {
            return None;
        }

        let height = if node.color == Color::Black {
            left_height + 1
        } else {
            left_height
        };
        Some((height, size))
    }
}

impl<K> Default for RbTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for RbTree<K> {
    fn drop(&mut self) {
        self.drop_keys();
    }
}
