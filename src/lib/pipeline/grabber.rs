use ringbuffer::{AllocRingBuffer, RingBuffer};

use super::agent::Agent;

/// Keeps the last `capacity` values that passed through, oldest overwritten first.
/// Values are forwarded unchanged.
pub struct Grabber<T> {
    history: AllocRingBuffer<T>,
}

impl<T: Clone> Grabber<T> {
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Grabber capacity must be at least 1");
        Self {
            history: AllocRingBuffer::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }

    /// Captured values, oldest first.
    pub fn captured(&self) -> Vec<T> {
        self.history.to_vec()
    }
}

impl<T: Clone> Agent for Grabber<T> {
    type Input = T;
    type Output = T;
    type State = AllocRingBuffer<T>;

    fn apply(&mut self, input: T) -> T {
        self.history.push(input.clone());
        input
    }

    fn state(&self) -> &AllocRingBuffer<T> {
        &self.history
    }

    fn finish(self) -> AllocRingBuffer<T> {
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_values_oldest_first() {
        let mut grabber = Grabber::new(3);
        for value in 1..=5 {
            assert_eq!(grabber.apply(value), value);
        }

        assert_eq!(grabber.captured(), vec![3, 4, 5]);
        assert_eq!(grabber.finish().to_vec(), vec![3, 4, 5]);
    }

    #[test]
    fn partially_filled_has_no_holes() {
        let mut grabber = Grabber::new(4);
        grabber.apply("a".to_string());

        assert_eq!(grabber.captured(), vec!["a".to_string()]);
        assert_eq!(grabber.capacity(), 4);
    }
}
