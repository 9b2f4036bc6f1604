use conv::ValueFrom;
use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::{
    index::{bounds_on, Index},
    node::Node,
    partition::{intersect_candidates, union_partitions},
    rect::Rect,
    slots::Slots,
    Coord, Id, Partitioning, Point, WorkerPool,
};

const DEFAULT_FANOUT: usize = 16;

/// Dynamic R-tree with forced reinsertion and variance-guided splits.
pub struct RTree {
    dimensions: usize,
    min_fanout: usize,
    max_fanout: usize,
    reinsert_fanout: usize,
    reinsert_height: usize,
    root: usize,
    count: usize,
    nodes: Vec<Node>,
    slots: Slots,
}

impl RTree {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self::build(dimensions, DEFAULT_FANOUT)
    }

    /// Returns `None` if `fanout` is below 4.
    #[must_use]
    pub fn with_fanout(dimensions: usize, fanout: usize) -> Option<Self> {
        if fanout < 4 {
            return None;
        }
        Some(Self::build(dimensions, fanout))
    }

    fn build(dimensions: usize, fanout: usize) -> Self {
        RTree {
            dimensions,
            min_fanout: fanout / 2,
            max_fanout: fanout,
            reinsert_fanout: fanout / 3,
            reinsert_height: 1,
            root: usize::MAX,
            count: 0,
            nodes: Vec::new(),
            slots: Slots::new(),
        }
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.nodes.get(self.root).map_or(0, |node| node.height)
    }

    // Slot of the matching point entry with the smallest identifier.
    fn locate(&self, point: &[Coord]) -> Option<usize> {
        let root = self.nodes.get(self.root)?;
        if !root.rect.contains(point) {
            return None;
        }
        let mut best: Option<usize> = None;
        let mut stack = vec![self.root];
        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];
            if node.is_point() {
                if node.coords() == point && best.map_or(true, |b| node.id < self.nodes[b].id) {
                    best = Some(node_id);
                }
                continue;
            }
            for &child_id in &node.children {
                if self.nodes[child_id].rect.contains(point) {
                    stack.push(child_id);
                }
            }
        }
        best
    }

    fn search_subtree(&self, start: usize, lower: &[Coord], upper: &[Coord], out: &mut Vec<Id>) {
        let mut stack = vec![start];
        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];
            if node.is_point() {
                out.push(node.id);
                continue;
            }
            for &child_id in &node.children {
                if self.nodes[child_id].rect.intersects(lower, upper) {
                    stack.push(child_id);
                }
            }
        }
    }

    // Candidates on a single dimension: prunes only on that dimension.
    fn search_dimension(&self, dimension: usize, lower: Coord, upper: Coord) -> Vec<Id> {
        let mut out = Vec::new();
        let Some(root) = self.nodes.get(self.root) else {
            return out;
        };
        if !root.rect.intersects_on(dimension, lower, upper) {
            return out;
        }
        let mut stack = vec![self.root];
        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];
            if node.is_point() {
                out.push(node.id);
                continue;
            }
            for &child_id in &node.children {
                if self.nodes[child_id].rect.intersects_on(dimension, lower, upper) {
                    stack.push(child_id);
                }
            }
        }
        out
    }

    // Subtrees that together hold every match, expanded until there are at
    // least `parts` of them or only leaves remain.
    fn frontier(&self, lower: &[Coord], upper: &[Coord], parts: usize) -> Vec<usize> {
        let Some(root) = self.nodes.get(self.root) else {
            return Vec::new();
        };
        if !root.rect.intersects(lower, upper) {
            return Vec::new();
        }
        let mut frontier = vec![self.root];
        while frontier.len() < parts && frontier.iter().any(|&n| !self.nodes[n].is_leaf()) {
            let mut next = Vec::with_capacity(frontier.len() * self.max_fanout);
            for node_id in frontier {
                let node = &self.nodes[node_id];
                if node.is_leaf() {
                    next.push(node_id);
                } else {
                    next.extend(
                        node.children
                            .iter()
                            .copied()
                            .filter(|&c| self.nodes[c].rect.intersects(lower, upper)),
                    );
                }
            }
            frontier = next;
        }
        frontier
    }

    fn reinsert_nodes(&mut self, reinsert_list: &mut Vec<usize>) {
        while let Some(entry_id) = reinsert_list.pop() {
            let res = self.insert_entry(self.root, entry_id);
            reinsert_list.extend(res);
            self.reinsert_height += 1;
        }
        self.adjust_tree();
    }

    // Insert a node into the tree
    // Split the node if it has too many children
    fn insert_entry(&mut self, node: usize, entry: usize) -> Vec<usize> {
        if self.nodes[node].height == self.nodes[entry].height + 1 {
            self.nodes[node].children.push(entry);
            self.reshape(node);

            let mut to_be_reinserted = Vec::new();
            if self.nodes[node].children.len() > self.max_fanout && node != self.root {
                if self.reinsert_height == self.nodes[node].height && self.reinsert_fanout > 0 {
                    to_be_reinserted.extend(self.pop_farthest_children(node));
                } else {
                    to_be_reinserted.push(self.split(node));
                }
            }
            to_be_reinserted
        } else {
            let best_child = self.choose_subtree(node, entry);
            let result = self.insert_entry(best_child, entry);
            self.reshape(node);
            result
        }
    }

    fn delete_entry(&mut self, entry: usize) -> Vec<usize> {
        let mut current = self.nodes[entry].parent;
        self.nodes[current].children.retain(|&x| x != entry);
        self.delete_slot(entry);

        let mut reinsert_list = Vec::new();
        while current != usize::MAX {
            self.reshape(current);
            let parent = self.nodes[current].parent;
            if current != self.root && self.nodes[current].children.len() < self.min_fanout {
                self.nodes[parent].children.retain(|&x| x != current);
                reinsert_list.extend(self.nodes[current].children.clone());
                self.delete_slot(current);
            }
            current = parent;
        }
        reinsert_list
    }

    fn adjust_tree(&mut self) {
        self.reshape(self.root);
        if self.nodes[self.root].children.len() > self.max_fanout {
            let sibling = self.split(self.root);
            let new_root = Node::internal(self.dimensions, vec![self.root, sibling]);
            self.root = self.add_slot(new_root);
            self.reshape(self.root);
        } else if self.nodes[self.root].height > 1 && self.nodes[self.root].children.len() == 1 {
            let new_root = self.nodes[self.root].children[0];
            self.delete_slot(self.root);
            self.root = new_root;
            self.nodes[self.root].parent = usize::MAX;
        } else if self.nodes[self.root].children.is_empty() {
            self.delete_slot(self.root);
            self.root = usize::MAX;
        }
    }

    // Least margin enlargement, then smallest margin.
    fn choose_subtree(&self, node: usize, entry: usize) -> usize {
        let entry_rect = &self.nodes[entry].rect;
        self.nodes[node]
            .children
            .iter()
            .copied()
            .min_by_key(|&child_id| {
                let rect = &self.nodes[child_id].rect;
                (
                    OrderedFloat(rect.enlargement(entry_rect)),
                    OrderedFloat(rect.margin()),
                )
            })
            .unwrap_or(usize::MAX)
    }

    fn pop_farthest_children(&mut self, node: usize) -> Vec<usize> {
        let mut children = self.nodes[node].children.clone();
        children.sort_by_key(|child| {
            OrderedFloat(self.nodes[*child].rect.center_distance(&self.nodes[node].rect))
        });
        let to_be_reinserted = children.split_off(children.len() - self.reinsert_fanout);
        self.nodes[node].children = children;
        self.reshape(node);
        to_be_reinserted
    }

    fn split(&mut self, slot_id: usize) -> usize {
        // Find the split dimension
        let split_dimension = self.split_dimension(slot_id);

        // Sort the children along the split dimension
        let mut left = self.nodes[slot_id].children.clone();
        left.sort_by_key(|child| {
            let rect = &self.nodes[*child].rect;
            let lower = f64::from(rect.lower[split_dimension]);
            let upper = f64::from(rect.upper[split_dimension]);
            OrderedFloat(lower + upper)
        });

        // Split the children into two groups
        let mut right = left.split_off(self.min_fanout);
        right.reverse();
        let mut remaining = right.split_off(self.min_fanout);

        let left_rect = self.bounding(&left);
        let right_rect = self.bounding(&right);
        let left_dist = left_rect.center_distance(&self.nodes[slot_id].rect);
        let right_dist = right_rect.center_distance(&self.nodes[slot_id].rect);

        if right_dist < left_dist {
            std::mem::swap(&mut left, &mut right);
        }

        // Create two new nodes
        self.nodes[slot_id].children = left;
        self.reshape(slot_id);

        let sibling = Node::internal(self.dimensions, right);
        let sibling = self.add_slot(sibling);
        self.reshape(sibling);

        // Reinsert the remaining children
        while let Some(entry) = remaining.pop() {
            let entry_rect = &self.nodes[entry].rect;
            let node_dist = entry_rect.center_distance(&self.nodes[slot_id].rect);
            let sibling_dist = entry_rect.center_distance(&self.nodes[sibling].rect);
            if node_dist < sibling_dist {
                self.nodes[slot_id].children.push(entry);
            } else {
                self.nodes[sibling].children.push(entry);
            }
        }

        // Finalize the split
        self.reshape(slot_id);
        self.reshape(sibling);

        sibling
    }

    fn split_dimension(&self, slot_id: usize) -> usize {
        // Calculate the variance at each dimension
        let variance = self.calculate_variance(slot_id);

        // Find the dimension with the maximum variance
        variance
            .iter()
            .enumerate()
            .max_by_key(|(_, &variance)| OrderedFloat(variance))
            .map_or(0, |(i, _)| i)
    }

    fn calculate_variance(&self, slot_id: usize) -> Vec<f64> {
        let children = &self.nodes[slot_id].children;
        let mut mean = vec![0.0; self.dimensions];
        let mut variance = vec![0.0; self.dimensions];
        if children.is_empty() {
            return variance;
        }
        let weight = f64::value_from(children.len()).unwrap_or(f64::MAX);
        let centers: Vec<Vec<f64>> = children
            .iter()
            .map(|child_id| self.nodes[*child_id].rect.center())
            .collect();
        for center in &centers {
            for (m, x) in mean.iter_mut().zip(center) {
                *m += x / weight;
            }
        }
        for center in &centers {
            for (i, x) in center.iter().enumerate() {
                variance[i] += (x - mean[i]).powi(2) / weight;
            }
        }
        variance
    }

    fn bounding(&self, children: &[usize]) -> Rect {
        let mut rect = Rect::empty(self.dimensions);
        for child_id in children {
            rect.expand(&self.nodes[*child_id].rect);
        }
        rect
    }

    fn reshape(&mut self, slot_id: usize) {
        // Calculate the bounding rectangle
        self.nodes[slot_id].rect = self.bounding(&self.nodes[slot_id].children);

        // Calculate the height
        self.nodes[slot_id].height = self.nodes[slot_id]
            .children
            .iter()
            .fold(0, |max, child_id| max.max(self.nodes[*child_id].height))
            + 1;

        // Update parent of the children
        for child_id in self.nodes[slot_id].children.clone() {
            self.nodes[child_id].parent = slot_id;
        }
    }

    fn add_slot(&mut self, mut node: Node) -> usize {
        let slot_id = self.slots.acquire();
        node.slot_id = slot_id;
        if slot_id == self.nodes.len() {
            self.nodes.push(node);
        } else {
            self.nodes[slot_id] = node;
        }
        slot_id
    }

    fn delete_slot(&mut self, slot_id: usize) {
        self.slots.release(slot_id);
        self.nodes[slot_id] = Node::default();
    }
}

impl Index for RTree {
    fn name(&self) -> &'static str {
        "R-Tree"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn insert(&mut self, point: Point, id: Id) {
        // Create the root node if it doesn't exist
        if self.root == usize::MAX {
            let node = Node::leaf(self.dimensions);
            self.root = self.add_slot(node);
        }

        // Create a point node (reuse a slot in the node vector if possible)
        let entry = self.add_slot(Node::point(&point, id));

        // Insert the point node into the tree
        let mut reinsert_list = vec![entry];
        self.reinsert_height = 1;
        self.reinsert_nodes(&mut reinsert_list);
        self.count += 1;
    }

    fn search_point(&self, point: &[Coord]) -> Option<Id> {
        self.locate(point).map(|slot| self.nodes[slot].id)
    }

    fn search_range(&self, lower: &[Coord], upper: &[Coord]) -> Vec<Id> {
        let mut result = Vec::new();
        match self.nodes.get(self.root) {
            Some(root) if root.rect.intersects(lower, upper) => {
                self.search_subtree(self.root, lower, upper, &mut result);
            }
            _ => {}
        }
        result
    }

    fn search_range_parallel(
        &self,
        lower: &[Coord],
        upper: &[Coord],
        partitioning: Partitioning,
        pool: &WorkerPool,
    ) -> Vec<Id> {
        match partitioning {
            Partitioning::Vertical => {
                let candidates = pool.install(|| {
                    (0..self.dimensions)
                        .into_par_iter()
                        .map(|d| {
                            let (lo, hi) = bounds_on(lower, upper, d);
                            self.search_dimension(d, lo, hi)
                        })
                        .collect::<Vec<_>>()
                });
                intersect_candidates(candidates)
            }
            Partitioning::Horizontal => {
                let frontier = self.frontier(lower, upper, pool.threads());
                let parts = pool.install(|| {
                    frontier
                        .par_iter()
                        .map(|&node_id| {
                            let mut out = Vec::new();
                            self.search_subtree(node_id, lower, upper, &mut out);
                            out
                        })
                        .collect::<Vec<_>>()
                });
                union_partitions(parts)
            }
        }
    }

    fn delete(&mut self, point: &[Coord]) -> bool {
        let Some(entry) = self.locate(point) else {
            return false;
        };
        let mut reinsert_list = self.delete_entry(entry);
        self.reinsert_height = 1;
        self.reinsert_nodes(&mut reinsert_list);
        self.count -= 1;
        true
    }

    fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::RTree;
    use crate::{index::contains, node::Node, Index};

    #[test]
    fn reshape() {
        let mut rtree = RTree::new(2);

        // Create some point nodes
        let node_a = rtree.add_slot(Node::point(&[0.0, 0.0], 1));
        let node_b = rtree.add_slot(Node::point(&[0.0, 2.0], 2));
        let node_c = rtree.add_slot(Node::point(&[2.0, 0.0], 3));
        let node_d = rtree.add_slot(Node::point(&[2.0, 2.0], 4));

        // Create a parent node
        let mut parent = Node::leaf(2);
        parent.children = vec![node_a, node_b, node_c, node_d];
        let node_parent = rtree.add_slot(parent);

        // Reshape the parent node
        rtree.reshape(node_parent);

        // Check the parent node's rectangle
        let parent = &rtree.nodes[node_parent];
        assert_eq!(parent.rect.lower, vec![0.0, 0.0]);
        assert_eq!(parent.rect.upper, vec![2.0, 2.0]);
        assert_eq!(parent.height, 1);

        // Check the parent-child relationship
        assert_eq!(rtree.nodes[node_a].parent, node_parent);
        assert_eq!(rtree.nodes[node_b].parent, node_parent);
        assert_eq!(rtree.nodes[node_c].parent, node_parent);
        assert_eq!(rtree.nodes[node_d].parent, node_parent);
    }

    #[test]
    fn split() {
        let fanout = 8;
        let mut rtree = RTree::with_fanout(2, fanout).expect("Invalid fanout");

        // Create 9 point nodes, as the fanout of 8 will trigger a split
        let coords: [[f32; 2]; 9] = [
            [0.0, 0.0],
            [0.0, 2.0],
            [1.0, 1.0],
            [2.0, 0.0],
            [2.0, 2.0],
            [10.0, 1.0],
            [10.0, 2.0],
            [11.0, 1.0],
            [11.0, 2.0],
        ];
        let point_nodes: Vec<usize> = coords
            .iter()
            .zip(1..)
            .map(|(c, id)| rtree.add_slot(Node::point(c, id)))
            .collect();

        // Create a node
        let mut node = Node::leaf(2);
        node.children = point_nodes;
        let node = rtree.add_slot(node);
        rtree.reshape(node);

        // Check the split dimension
        assert_eq!(rtree.split_dimension(node), 0);

        // Split the parent node
        let sibling = rtree.split(node);

        // Check the node's rectangle
        let node = &rtree.nodes[node];
        assert_eq!(node.rect.lower, vec![0.0, 0.0]);
        assert_eq!(node.rect.upper, vec![2.0, 2.0]);
        assert_eq!(node.children.len(), 5);

        // Check the sibling's rectangle
        let sibling = &rtree.nodes[sibling];
        assert_eq!(sibling.rect.lower, vec![10.0, 1.0]);
        assert_eq!(sibling.rect.upper, vec![11.0, 2.0]);
        assert_eq!(sibling.children.len(), 4);
    }

    #[test]
    fn update() {
        let fanout = 8;
        let mut rtree = RTree::with_fanout(2, fanout).expect("Invalid fanout");
        // The tree should be empty
        assert_eq!(rtree.height(), 0);

        // Insert 8 points to fill the root node
        let mut points = Vec::new();
        for i in 0..fanout {
            let point = vec![i as f32, i as f32];
            rtree.insert(point.clone(), i as u32 + 1);
            points.push(point);
        }

        // The tree should be of height 1 since
        // the number of points is equal to the fanout
        assert_eq!(rtree.height(), 1);

        // Insert one more point to trigger a split (so the tree grows in height)
        let last = vec![fanout as f32, fanout as f32];
        rtree.insert(last.clone(), fanout as u32 + 1);
        points.push(last);
        assert_eq!(rtree.height(), 2);
        assert_eq!(rtree.count(), fanout + 1);

        // Delete two points to trigger a merge (so the tree shrinks in height)
        assert!(rtree.delete(&points.pop().unwrap()));
        assert!(rtree.delete(&points.pop().unwrap()));

        // The tree should be of height 1 again
        assert_eq!(rtree.height(), 1);

        // Delete all remaining points
        for point in points {
            assert!(rtree.delete(&point));
        }

        // The tree should be empty again
        assert_eq!(rtree.height(), 0);
        assert_eq!(rtree.count(), 0);
        assert_eq!(rtree.slots.in_use(), 0);
    }

    #[test]
    fn query() {
        let mut rtree = RTree::new(2);

        // Insert some points
        let mut points = Vec::new();
        for i in 0..100u32 {
            let point = vec![i as f32, (i % 10) as f32];
            rtree.insert(point.clone(), i + 1);
            points.push((i + 1, point));
        }

        let lower = [20.0, 2.0];
        let upper = [60.0, 5.0];

        // Find the expected points within the box
        let mut expected: Vec<u32> = points
            .iter()
            .filter(|(_, p)| contains(&lower, &upper, p))
            .map(|(id, _)| *id)
            .collect();
        expected.sort_unstable();

        // Query the tree for the points within the box
        let mut result = rtree.search_range(&lower, &upper);
        result.sort_unstable();
        assert_eq!(expected, result);

        // Every point is found again by exact lookup
        for (id, point) in &points {
            assert_eq!(rtree.search_point(point), Some(*id));
        }
        assert_eq!(rtree.search_point(&[0.5, 0.5]), None);
    }

    #[test]
    fn duplicates_resolve_to_smallest_id() {
        let mut rtree = RTree::with_fanout(1, 4).expect("Invalid fanout");
        for id in [7, 3, 5] {
            rtree.insert(vec![1.0], id);
        }
        for id in 10..30 {
            rtree.insert(vec![id as f32], id);
        }
        assert_eq!(rtree.search_point(&[1.0]), Some(3));
        assert!(rtree.delete(&[1.0]));
        assert_eq!(rtree.search_point(&[1.0]), Some(5));
        assert!(rtree.delete(&[1.0]));
        assert!(rtree.delete(&[1.0]));
        assert!(!rtree.delete(&[1.0]));
        assert_eq!(rtree.count(), 20);
    }

    #[test]
    fn verify_fanout_params() {
        let mut rtree = RTree::new(2);
        let n = 1000;
        let mut rng = StdRng::seed_from_u64(0);
        let deletion_probability = 0.2;

        // Perform a random sequence of insertions and deletions
        let mut points: Vec<Vec<f32>> = Vec::new();
        for id in 1..=n {
            let should_delete = rng.gen_bool(deletion_probability);
            if should_delete && !points.is_empty() {
                let random_index = rng.gen_range(0..points.len());
                let point = points.swap_remove(random_index);
                assert!(rtree.delete(&point));
            } else {
                let point = vec![rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)];
                rtree.insert(point.clone(), id);
                points.push(point);
            }

            // Check the fanout constraints after each operation
            for node in &rtree.nodes {
                if !node.is_point() && node.slot_id != rtree.root && !node.is_deleted() {
                    assert!(node.children.len() >= rtree.min_fanout);
                    assert!(node.children.len() <= rtree.max_fanout);
                }
            }
            assert_eq!(rtree.count(), points.len());
        }
    }
}
