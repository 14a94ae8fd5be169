//! Sort-ordered child collections.
//!
//! Authors on a post, carousel images on the home page, menu items, and
//! contact form fields are all owned rows with an explicit `sort_order`.
//! [`Ordered`] keeps those keys dense: after any edit they read `0, 1, 2, …`
//! in iteration order, and reordering only rewrites keys, never the rows
//! themselves.
//!
//! Size limits ("1 to 8 authors") are not enforced while editing. They are
//! checked with [`Cardinality::check`] when the owner is published.

use crate::stream::is_permutation;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Index {index} out of range for collection of {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Invalid order {order:?} for collection of {len}")]
    InvalidPermutation { order: Vec<usize>, len: usize },
    #[error("Page has no `{0}` collection")]
    NoSuchCollection(String),
}

/// One row of an ordered collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orderable<T> {
    pub sort_order: u32,
    pub value: T,
}

/// A collection whose iteration order is its `sort_order` sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Ordered<T> {
    rows: Vec<Orderable<T>>,
}

impl<T> Default for Ordered<T> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

// Stored keys may have gaps or arrive out of order; they are sorted and
// renumbered on load.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Ordered<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut rows = Vec::<Orderable<T>>::deserialize(deserializer)?;
        rows.sort_by_key(|r| r.sort_order);
        let mut ordered = Ordered { rows };
        ordered.renumber();
        Ok(ordered)
    }
}

impl<T> Ordered<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.rows.get(index).map(|r| &r.value)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.rows.get_mut(index).map(|r| &mut r.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.iter().map(|r| &r.value)
    }

    pub fn rows(&self) -> &[Orderable<T>] {
        &self.rows
    }

    pub fn push(&mut self, value: T) {
        let sort_order = self.rows.len() as u32;
        self.rows.push(Orderable { sort_order, value });
    }

    /// Insert before `index`; `index == len` appends.
    pub fn insert_at(&mut self, index: usize, value: T) -> Result<(), OrderError> {
        if index > self.rows.len() {
            return Err(OrderError::IndexOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        self.rows.insert(
            index,
            Orderable {
                sort_order: 0,
                value,
            },
        );
        self.renumber();
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<T, OrderError> {
        if index >= self.rows.len() {
            return Err(OrderError::IndexOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        let row = self.rows.remove(index);
        self.renumber();
        Ok(row.value)
    }

    /// Drop every row matching `pred`. Returns how many were removed.
    pub fn remove_where(&mut self, pred: impl Fn(&T) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| !pred(&r.value));
        self.renumber();
        before - self.rows.len()
    }

    /// Position `i` receives the row previously at `permutation[i]`.
    pub fn reorder(&mut self, permutation: &[usize]) -> Result<(), OrderError> {
        if !is_permutation(permutation, self.rows.len()) {
            return Err(OrderError::InvalidPermutation {
                order: permutation.to_vec(),
                len: self.rows.len(),
            });
        }
        let mut slots: Vec<Option<Orderable<T>>> = self.rows.drain(..).map(Some).collect();
        self.rows = permutation
            .iter()
            .filter_map(|&from| slots[from].take())
            .collect();
        self.renumber();
        Ok(())
    }

    fn renumber(&mut self) {
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.sort_order = i as u32;
        }
    }
}

impl<T> FromIterator<T> for Ordered<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut ordered = Ordered::new();
        for value in iter {
            ordered.push(value);
        }
        ordered
    }
}

// ============================================================================
// Cardinality
// ============================================================================

/// Which end of a [`Cardinality`] range was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min(usize),
    Max(usize),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Min(n) => write!(f, "at least {n}"),
            Bound::Max(n) => write!(f, "at most {n}"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{collection}` needs {bound} item(s), has {actual}")]
pub struct CardinalityError {
    pub collection: String,
    pub bound: Bound,
    pub actual: usize,
}

/// Inclusive size range for an ordered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cardinality {
    pub min: usize,
    pub max: usize,
}

impl Cardinality {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn check(&self, collection: &str, actual: usize) -> Result<(), CardinalityError> {
        let bound = if actual < self.min {
            Bound::Min(self.min)
        } else if actual > self.max {
            Bound::Max(self.max)
        } else {
            return Ok(());
        };
        Err(CardinalityError {
            collection: collection.to_string(),
            bound,
            actual,
        })
    }
}
