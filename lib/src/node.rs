use crate::{rect::Rect, Coord, Id};

/// R-tree arena node. Height 0 nodes are point entries, height 1 nodes are
/// leaves, anything above is internal.
pub struct Node {
    pub slot_id: usize,
    pub height: usize,
    pub parent: usize,
    pub rect: Rect,
    pub children: Vec<usize>,
    pub id: Id,
}

impl Node {
    #[must_use]
    pub fn new(height: usize, rect: Rect, children: Vec<usize>) -> Node {
        Node {
            slot_id: usize::MAX,
            height,
            parent: usize::MAX,
            rect,
            children,
            id: 0,
        }
    }

    #[must_use]
    pub fn point(point: &[Coord], id: Id) -> Node {
        let mut node = Self::new(0, Rect::point(point), Vec::new());
        node.id = id;
        node
    }

    #[must_use]
    pub fn leaf(dimensions: usize) -> Node {
        Self::new(1, Rect::empty(dimensions), Vec::new())
    }

    #[must_use]
    pub fn internal(dimensions: usize, children: Vec<usize>) -> Node {
        Self::new(2, Rect::empty(dimensions), children)
    }

    pub fn is_point(&self) -> bool {
        self.height == 0
    }

    pub fn is_leaf(&self) -> bool {
        self.height == 1
    }

    #[cfg(test)]
    pub fn is_deleted(&self) -> bool {
        self.slot_id == usize::MAX
    }

    /// Coordinates of a point entry.
    pub fn coords(&self) -> &[Coord] {
        &self.rect.lower
    }
}

impl Default for Node {
    fn default() -> Self {
        Node::new(0, Rect::empty(0), Vec::new())
    }
}
