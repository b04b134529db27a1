use bytemuck::Zeroable;

use crate::vertex::InstanceVertex;

/// Reusable instance staging array.
///
/// The backing storage only grows; the logical length is tracked separately
/// and is the only part ever handed to a backend.
#[derive(Debug, Default)]
pub struct InstanceStream {
    backing: Vec<InstanceVertex>,
    len: usize,
    grows: usize,
}

impl InstanceStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            backing: vec![InstanceVertex::zeroed(); capacity],
            len: 0,
            grows: 0,
        }
    }

    /// Replace the contents with `instances`.
    pub fn fill<I>(&mut self, instances: I) -> &[InstanceVertex]
    where
        I: IntoIterator<Item = InstanceVertex>,
        I::IntoIter: ExactSizeIterator,
    {
        let instances = instances.into_iter();
        let needed = instances.len();
        if needed > self.backing.len() {
            let capacity = needed.next_power_of_two();
            tracing::trace!(from = self.backing.len(), to = capacity, "instance stream grows");
            self.backing.resize(capacity, InstanceVertex::zeroed());
            self.grows += 1;
        }
        self.len = 0;
        for (slot, instance) in self.backing.iter_mut().zip(instances) {
            *slot = instance;
            self.len += 1;
        }
        self.as_slice()
    }

    pub fn as_slice(&self) -> &[InstanceVertex] {
        &self.backing[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.backing.len()
    }

    /// How many times the backing array had to grow.
    pub fn grow_count(&self) -> usize {
        self.grows
    }
}
