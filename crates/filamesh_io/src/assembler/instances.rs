//! Fixed-length instance storage.

use std::ops::Index;

use crate::error::{AssembleError, AssembleResult};

/// Instances of one assembled mesh.
///
/// The length is fixed at construction to a value in `1..=capacity` and
/// never changes: there is no push or remove, only indexed access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderableInstances<T> {
    items: Box<[T]>,
    capacity: usize,
}

/// Checks that `requested` is a valid instance count for `capacity`.
///
/// # Errors
///
/// Returns [`AssembleError::InstanceCountInvalid`] if `requested` is zero or
/// exceeds `capacity`.
pub fn check_instance_count(requested: usize, capacity: usize) -> AssembleResult<()> {
    if requested == 0 || requested > capacity {
        return Err(AssembleError::InstanceCountInvalid { requested, capacity });
    }
    Ok(())
}

impl<T> RenderableInstances<T> {
    /// Wraps `items`.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::InstanceCountInvalid`] if `items` is empty or
    /// longer than `capacity`.
    pub fn new(items: Vec<T>, capacity: usize) -> AssembleResult<Self> {
        check_instance_count(items.len(), capacity)?;
        Ok(Self {
            items: items.into_boxed_slice(),
            capacity,
        })
    }

    /// Number of instances.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always `false`; kept for API symmetry with slices.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Capacity the length was checked against.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Instance at `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// All instances.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Iterates the instances.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Unwraps the instances.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.items.into_vec()
    }
}

impl<T> Index<usize> for RenderableInstances<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a RenderableInstances<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> IntoIterator for RenderableInstances<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_bounds() {
        assert!(RenderableInstances::new(vec![1, 2, 3], 3).is_ok());
        assert_eq!(
            RenderableInstances::new(vec![1, 2, 3, 4], 3),
            Err(AssembleError::InstanceCountInvalid { requested: 4, capacity: 3 })
        );
        assert_eq!(
            RenderableInstances::<u8>::new(Vec::new(), 3),
            Err(AssembleError::InstanceCountInvalid { requested: 0, capacity: 3 })
        );
    }

    #[test]
    fn test_access() {
        let instances = RenderableInstances::new(vec!['a', 'b'], 8).unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances.capacity(), 8);
        assert_eq!(instances[1], 'b');
        assert_eq!(instances.get(2), None);
        assert_eq!(instances.iter().collect::<String>(), "ab");
        assert_eq!(instances.into_vec(), vec!['a', 'b']);
    }
}
