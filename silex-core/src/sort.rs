//! Interned sorts.

use rustc_hash::FxHashMap;
use std::fmt;

/// Index of an interned sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortId(pub u32);

/// The shape of a sort.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SortKind {
    /// The Boolean sort.
    Bool,
    /// The integer sort.
    Int,
    /// The real sort.
    Real,
    /// `(Array index element)`.
    Array(SortId, SortId),
    /// A declared uninterpreted sort, by declaration index.
    Uninterpreted(u32),
}

/// The sort table. Sorts are interned; `SortId` equality is sort equality.
#[derive(Debug)]
pub struct SortTable {
    sorts: Vec<SortKind>,
    unify: FxHashMap<SortKind, SortId>,
    /// The Boolean sort.
    pub bool_sort: SortId,
    /// The integer sort.
    pub int_sort: SortId,
    /// The real sort.
    pub real_sort: SortId,
}

impl SortTable {
    /// Create a table with the three built-in sorts.
    pub fn new() -> Self {
        let mut table = SortTable {
            sorts: Vec::new(),
            unify: FxHashMap::default(),
            bool_sort: SortId(0),
            int_sort: SortId(0),
            real_sort: SortId(0),
        };
        table.bool_sort = table.intern(SortKind::Bool);
        table.int_sort = table.intern(SortKind::Int);
        table.real_sort = table.intern(SortKind::Real);
        table
    }

    /// Intern a sort.
    pub fn intern(&mut self, kind: SortKind) -> SortId {
        if let Some(&id) = self.unify.get(&kind) {
            return id;
        }
        let id = SortId(self.sorts.len() as u32);
        self.sorts.push(kind.clone());
        self.unify.insert(kind, id);
        id
    }

    /// Intern an array sort.
    pub fn array(&mut self, index: SortId, element: SortId) -> SortId {
        self.intern(SortKind::Array(index, element))
    }

    /// Declare a fresh uninterpreted sort.
    pub fn declare(&mut self) -> SortId {
        let n = self
            .sorts
            .iter()
            .filter(|k| matches!(k, SortKind::Uninterpreted(_)))
            .count() as u32;
        self.intern(SortKind::Uninterpreted(n))
    }

    /// Look up a sort.
    pub fn kind(&self, id: SortId) -> &SortKind {
        &self.sorts[id.0 as usize]
    }

    /// Is this the Boolean sort?
    pub fn is_bool(&self, id: SortId) -> bool {
        id == self.bool_sort
    }

    /// Is this Int or Real?
    pub fn is_numeric(&self, id: SortId) -> bool {
        id == self.int_sort || id == self.real_sort
    }

    /// Is this an array sort?
    pub fn is_array(&self, id: SortId) -> bool {
        matches!(self.kind(id), SortKind::Array(..))
    }

    /// The element sort of an array sort.
    pub fn array_element(&self, id: SortId) -> Option<SortId> {
        match self.kind(id) {
            SortKind::Array(_, elem) => Some(*elem),
            _ => None,
        }
    }

    /// The index sort of an array sort.
    pub fn array_index(&self, id: SortId) -> Option<SortId> {
        match self.kind(id) {
            SortKind::Array(idx, _) => Some(*idx),
            _ => None,
        }
    }
}

impl Default for SortTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKind::Bool => write!(f, "Bool"),
            SortKind::Int => write!(f, "Int"),
            SortKind::Real => write!(f, "Real"),
            SortKind::Array(i, e) => write!(f, "(Array s{} s{})", i.0, e.0),
            SortKind::Uninterpreted(n) => write!(f, "U{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sorts_distinct() {
        let t = SortTable::new();
        assert_ne!(t.bool_sort, t.int_sort);
        assert_ne!(t.int_sort, t.real_sort);
    }

    #[test]
    fn test_array_sorts_interned() {
        let mut t = SortTable::new();
        let a1 = t.array(t.int_sort, t.real_sort);
        let a2 = t.array(t.int_sort, t.real_sort);
        assert_eq!(a1, a2);
        assert_eq!(t.array_index(a1), Some(t.int_sort));
        assert_eq!(t.array_element(a1), Some(t.real_sort));
    }
}
