//! Fixed-capacity arena addressed by small integer indices.
//!
//! Used for the scanner and central tables.  A freed index is handed out
//! again by the next insertion.

pub struct Registry<T, const N: usize> {
    entries: [Option<T>; N],
}

impl<T, const N: usize> Default for Registry<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Registry<T, N> {
    pub fn new() -> Self {
        Self {
            entries: core::array::from_fn(|_| None),
        }
    }

    /// Lowest free index, if any.
    pub fn vacant(&self) -> Option<usize> {
        self.entries.iter().position(Option::is_none)
    }

    /// Store `value` at the lowest free index; gives the value back when full.
    pub fn insert(&mut self, value: T) -> Result<usize, T> {
        match self.vacant() {
            Some(index) => {
                self.entries[index] = Some(value);
                Ok(index)
            }
            None => Err(value),
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.entries.get_mut(index)?.take()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.entries.get_mut(index)?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|v| (i, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(i, e)| e.as_mut().map(|v| (i, v)))
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.vacant().is_none()
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}
