/// A sorted vector holding at most `capacity` of the smallest values pushed
/// into it.
#[derive(Debug, Clone)]
pub struct BoundedSorted<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T: Ord> BoundedSorted<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// The largest value kept, if any.
    pub fn worst(&self) -> Option<&T> {
        self.items.last()
    }

    /// Inserts `value` in order, evicting the largest value when over
    /// capacity. Equal values are kept in insertion order.
    pub fn push(&mut self, value: T) {
        if self.capacity == 0 {
            return;
        }
        if self.is_full() {
            match self.items.last() {
                Some(worst) if value >= *worst => return,
                _ => {}
            }
        }
        let at = self.items.partition_point(|item| *item <= value);
        self.items.insert(at, value);
        self.items.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}
