/// Hands out arena slot ids, reusing released ones first.
pub struct Slots {
    deleted_slots: Vec<usize>,
    len: usize,
}

impl Default for Slots {
    fn default() -> Self {
        Self::new()
    }
}

impl Slots {
    #[must_use]
    pub fn new() -> Self {
        Slots {
            deleted_slots: Vec::new(),
            len: 0,
        }
    }

    // Allocate or reuse a slot.
    pub fn acquire(&mut self) -> usize {
        if let Some(slot_id) = self.deleted_slots.pop() {
            slot_id
        } else {
            self.len += 1;
            self.len - 1
        }
    }

    // Return a slot to the free list.
    pub fn release(&mut self, slot_id: usize) {
        self.deleted_slots.push(slot_id);
    }

    #[cfg(test)]
    pub fn in_use(&self) -> usize {
        self.len - self.deleted_slots.len()
    }
}
