//! Bounded row buffer between projection and the sink.

/// Rows awaiting one sink flush. Each row has exactly one value per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBatch {
    rows: Vec<Vec<String>>,
    capacity: usize,
}

impl RowBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            rows: Vec::with_capacity(capacity.min(64 * 1024)),
            capacity,
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Empty the batch, keeping its allocation.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_to_capacity() {
        let mut b = RowBatch::with_capacity(2);
        assert!(b.is_empty());
        b.push(vec!["1".into()]);
        assert!(!b.is_full());
        b.push(vec!["2".into()]);
        assert!(b.is_full());
        b.clear();
        assert!(b.is_empty());
    }

    #[test]
    fn zero_capacity_means_one() {
        let mut b = RowBatch::with_capacity(0);
        b.push(Vec::new());
        assert!(b.is_full());
    }
}
