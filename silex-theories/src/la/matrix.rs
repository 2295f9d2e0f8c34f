//! The sparse tableau matrix.
//!
//! A doubly-linked sparse matrix over arena-allocated entries: every
//! non-zero cell belongs to one circular row chain (through a basic
//! variable's head) and one circular column chain (through a non-basic
//! variable's head). Row chains are kept sorted by column position so row
//! merges are linear. Coefficients are integers; each row carries its
//! denominator in the head entry as a negative coefficient, and every row
//! is kept in lowest terms.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

/// Index of a tableau variable (creation order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub u32);

/// Index of a matrix entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u32);

impl EntryId {
    const NONE: EntryId = EntryId(u32::MAX);

    fn is_none(self) -> bool {
        self == EntryId::NONE
    }
}

#[derive(Debug)]
struct Entry {
    row: VarId,
    col: VarId,
    coeff: BigInt,
    next_in_row: EntryId,
    prev_in_row: EntryId,
    next_in_col: EntryId,
    prev_in_col: EntryId,
}

/// The sparse matrix. Owns all entry topology; the variable records live
/// in the solver.
#[derive(Debug, Default)]
pub struct Matrix {
    entries: Vec<Entry>,
    free: Vec<EntryId>,
    /// Column head per variable; `EntryId::NONE` until registered.
    heads: Vec<EntryId>,
}

impl Matrix {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Matrix::default()
    }

    fn alloc(&mut self, entry: Entry) -> EntryId {
        if let Some(id) = self.free.pop() {
            self.entries[id.0 as usize] = entry;
            id
        } else {
            let id = EntryId(self.entries.len() as u32);
            self.entries.push(entry);
            id
        }
    }

    fn entry(&self, id: EntryId) -> &Entry {
        &self.entries[id.0 as usize]
    }

    fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        &mut self.entries[id.0 as usize]
    }

    /// Register a new variable; it starts non-basic with a bare column
    /// head (self-linked, zero coefficient).
    pub fn add_var(&mut self, v: VarId) {
        debug_assert_eq!(self.heads.len(), v.0 as usize);
        let head = self.alloc(Entry {
            row: v,
            col: v,
            coeff: BigInt::zero(),
            next_in_row: EntryId::NONE,
            prev_in_row: EntryId::NONE,
            next_in_col: EntryId::NONE,
            prev_in_col: EntryId::NONE,
        });
        let h = head;
        let e = self.entry_mut(head);
        e.next_in_row = h;
        e.prev_in_row = h;
        e.next_in_col = h;
        e.prev_in_col = h;
        self.heads.push(head);
    }

    /// The head entry of a variable's chain.
    pub fn head(&self, v: VarId) -> EntryId {
        self.heads[v.0 as usize]
    }

    /// The row denominator head coefficient of a basic variable
    /// (negative by invariant).
    pub fn head_coeff(&self, v: VarId) -> &BigInt {
        &self.entry(self.head(v)).coeff
    }

    /// The positive denominator of a basic variable's row.
    pub fn denominator(&self, v: VarId) -> BigInt {
        let c = self.head_coeff(v);
        debug_assert!(c.is_negative(), "head coefficient must be negative");
        -c
    }

    /// Iterate the row of a basic variable as `(column, coefficient)`,
    /// head excluded, in ascending column position.
    pub fn row(&self, basic: VarId) -> RowIter<'_> {
        let head = self.head(basic);
        RowIter {
            matrix: self,
            head,
            next: self.entry(head).next_in_row,
        }
    }

    /// Iterate the column of a non-basic variable as
    /// `(row variable, coefficient)`, head excluded.
    pub fn col(&self, nonbasic: VarId) -> ColIter<'_> {
        let head = self.head(nonbasic);
        ColIter {
            matrix: self,
            head,
            next: self.entry(head).next_in_col,
        }
    }

    /// The number of entries in a variable's column (its dependency
    /// chain length, used by the pivot heuristic).
    pub fn col_len(&self, v: VarId) -> u32 {
        let mut n = 0;
        for _ in self.col(v) {
            n += 1;
        }
        n
    }

    /// Is a non-basic variable's column empty?
    pub fn col_is_empty(&self, v: VarId) -> bool {
        let head = self.head(v);
        self.entry(head).next_in_col == head
    }

    /// The coefficient at `(basic, col)`, if the cell is non-zero.
    pub fn coeff_at(&self, basic: VarId, col: VarId) -> Option<BigInt> {
        self.row(basic)
            .find(|(c, _)| *c == col)
            .map(|(_, coeff)| coeff)
    }

    fn unlink_from_col(&mut self, id: EntryId) {
        let (prev, next) = {
            let e = self.entry(id);
            (e.prev_in_col, e.next_in_col)
        };
        self.entry_mut(prev).next_in_col = next;
        self.entry_mut(next).prev_in_col = prev;
    }

    fn link_into_col(&mut self, id: EntryId, col: VarId) {
        // insert right after the column head; column order is irrelevant
        let head = self.head(col);
        let next = self.entry(head).next_in_col;
        self.entry_mut(id).prev_in_col = head;
        self.entry_mut(id).next_in_col = next;
        self.entry_mut(head).next_in_col = id;
        self.entry_mut(next).prev_in_col = id;
    }

    /// Read a basic variable's row, head excluded.
    pub fn row_to_vec(&self, basic: VarId) -> Vec<(VarId, BigInt)> {
        self.row(basic).collect()
    }

    /// Unregister the most recently added variable. Its row must be
    /// cleared and its column empty.
    pub fn remove_last_var(&mut self, v: VarId) {
        debug_assert_eq!(self.heads.len(), v.0 as usize + 1);
        let head = self.heads[v.0 as usize];
        debug_assert_eq!(self.entry(head).next_in_row, head);
        debug_assert_eq!(self.entry(head).next_in_col, head);
        self.free.push(head);
        self.heads.pop();
    }

    /// Drop every non-head entry of a basic variable's row, unlinking
    /// from the column chains. The head keeps its coefficient.
    pub fn clear_row(&mut self, basic: VarId) {
        let head = self.head(basic);
        let mut cur = self.entry(head).next_in_row;
        while cur != head {
            let next = self.entry(cur).next_in_row;
            self.unlink_from_col(cur);
            self.free.push(cur);
            cur = next;
        }
        let e = self.entry_mut(head);
        e.next_in_row = head;
        e.prev_in_row = head;
    }

    /// Install a complete row for `basic`: head coefficient plus sorted
    /// entries. Any previous row content is discarded. The entry list
    /// must be sorted by column, free of zeros and of `basic` itself;
    /// the head coefficient must be negative and the row in lowest terms.
    pub fn set_row(&mut self, basic: VarId, head_coeff: BigInt, entries: &[(VarId, BigInt)]) {
        debug_assert!(head_coeff.is_negative());
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        debug_assert!(entries.iter().all(|(c, q)| !q.is_zero() && *c != basic));
        self.clear_row(basic);
        let head = self.head(basic);
        self.entry_mut(head).coeff = head_coeff;
        let mut prev = head;
        for (col, coeff) in entries {
            let id = self.alloc(Entry {
                row: basic,
                col: *col,
                coeff: coeff.clone(),
                next_in_row: head,
                prev_in_row: prev,
                next_in_col: EntryId::NONE,
                prev_in_col: EntryId::NONE,
            });
            self.entry_mut(prev).next_in_row = id;
            self.entry_mut(head).prev_in_row = id;
            self.link_into_col(id, *col);
            prev = id;
        }
    }

    /// Normalize a dense row representation: divide by the gcd and make
    /// the head coefficient negative. `head_coeff` pairs with `entries`
    /// as the full linear form `head_coeff * basic + sum entries = 0`.
    pub fn normalize_row(head_coeff: &mut BigInt, entries: &mut Vec<(VarId, BigInt)>) {
        entries.retain(|(_, c)| !c.is_zero());
        let mut gcd = head_coeff.abs();
        for (_, c) in entries.iter() {
            gcd = gcd.gcd(c);
            if gcd.is_one() {
                break;
            }
        }
        if !gcd.is_one() && !gcd.is_zero() {
            *head_coeff = &*head_coeff / &gcd;
            for (_, c) in entries.iter_mut() {
                *c = &*c / &gcd;
            }
        }
        if head_coeff.is_positive() {
            *head_coeff = -&*head_coeff;
            for (_, c) in entries.iter_mut() {
                *c = -&*c;
            }
        }
    }

    /// `target := n_coeff * target - t_coeff * pivot_row`, eliminating
    /// the pivot variable from the target row. Both rows are given as
    /// full linear forms (head included conceptually); the caller passes
    /// the pivot row of the now-basic variable `pivot` and the
    /// coefficient `t_coeff` that `pivot` has in the target row.
    ///
    /// Returns the new, normalized row of `target` (entries exclude the
    /// target head; its new head coefficient is returned separately).
    pub fn eliminate(
        target: VarId,
        target_head: &BigInt,
        target_row: &[(VarId, BigInt)],
        pivot: VarId,
        pivot_head: &BigInt,
        pivot_row: &[(VarId, BigInt)],
        t_coeff: &BigInt,
    ) -> (BigInt, Vec<(VarId, BigInt)>) {
        // scale factors: a = pivot_head (coefficient of pivot in its own
        // row), b = -t_coeff; row' = a * target_row + b * pivot_row
        let a = pivot_head;
        let b = -t_coeff;
        let mut merged: Vec<(VarId, BigInt)> = Vec::with_capacity(target_row.len() + pivot_row.len());
        let mut head_coeff = BigInt::zero();
        let mut i = 0;
        let mut j = 0;
        let mut push = |col: VarId, coeff: BigInt, head: &mut BigInt| {
            if coeff.is_zero() {
                return;
            }
            if col == pivot {
                // a * t_coeff cancels against b * pivot_head
                debug_assert_eq!(coeff, -(&b * a));
                return;
            }
            if col == target {
                *head += coeff;
            } else {
                merged.push((col, coeff));
            }
        };
        while i < target_row.len() || j < pivot_row.len() {
            let next_t = target_row.get(i).map(|(c, _)| *c);
            let next_p = pivot_row.get(j).map(|(c, _)| *c);
            match (next_t, next_p) {
                (Some(ct), Some(cp)) if ct == cp => {
                    let coeff = a * &target_row[i].1 + &b * &pivot_row[j].1;
                    push(ct, coeff, &mut head_coeff);
                    i += 1;
                    j += 1;
                }
                (Some(ct), Some(cp)) if ct < cp => {
                    push(ct, a * &target_row[i].1, &mut head_coeff);
                    i += 1;
                }
                (Some(_), Some(cp)) => {
                    push(cp, &b * &pivot_row[j].1, &mut head_coeff);
                    j += 1;
                }
                (Some(ct), None) => {
                    push(ct, a * &target_row[i].1, &mut head_coeff);
                    i += 1;
                }
                (None, Some(cp)) => {
                    push(cp, &b * &pivot_row[j].1, &mut head_coeff);
                    j += 1;
                }
                (None, None) => unreachable!(),
            }
        }
        // contribution of the old target head
        head_coeff += a * target_head;
        debug_assert!(!merged.iter().any(|(c, _)| *c == pivot));
        let mut entries: Vec<(VarId, BigInt)> = merged;
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        let mut hc = head_coeff;
        Matrix::normalize_row(&mut hc, &mut entries);
        (hc, entries)
    }
}

/// Iterator over a row chain (head excluded).
pub struct RowIter<'a> {
    matrix: &'a Matrix,
    head: EntryId,
    next: EntryId,
}

impl<'a> Iterator for RowIter<'a> {
    type Item = (VarId, BigInt);

    fn next(&mut self) -> Option<(VarId, BigInt)> {
        if self.next == self.head || self.next.is_none() {
            return None;
        }
        let e = self.matrix.entry(self.next);
        self.next = e.next_in_row;
        Some((e.col, e.coeff.clone()))
    }
}

/// Iterator over a column chain (head excluded).
pub struct ColIter<'a> {
    matrix: &'a Matrix,
    head: EntryId,
    next: EntryId,
}

impl<'a> Iterator for ColIter<'a> {
    type Item = (VarId, BigInt);

    fn next(&mut self) -> Option<(VarId, BigInt)> {
        if self.next == self.head || self.next.is_none() {
            return None;
        }
        let e = self.matrix.entry(self.next);
        self.next = e.next_in_col;
        Some((e.row, e.coeff.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(n: i64) -> BigInt {
        BigInt::from(n)
    }

    #[test]
    fn test_set_row_and_iterate() {
        let mut m = Matrix::new();
        for i in 0..4 {
            m.add_var(VarId(i));
        }
        // row for v3: -1*v3 + 2*v0 + 3*v2 = 0
        m.set_row(VarId(3), b(-1), &[(VarId(0), b(2)), (VarId(2), b(3))]);
        assert_eq!(m.denominator(VarId(3)), b(1));
        let row = m.row_to_vec(VarId(3));
        assert_eq!(row, vec![(VarId(0), b(2)), (VarId(2), b(3))]);
        // column of v0 contains v3
        let col: Vec<_> = m.col(VarId(0)).collect();
        assert_eq!(col, vec![(VarId(3), b(2))]);
        assert_eq!(m.col_len(VarId(0)), 1);
        assert!(m.col_is_empty(VarId(1)));
    }

    #[test]
    fn test_normalize_row() {
        let mut head = b(4);
        let mut entries = vec![(VarId(0), b(-6)), (VarId(1), b(2))];
        Matrix::normalize_row(&mut head, &mut entries);
        assert_eq!(head, b(-2));
        assert_eq!(entries, vec![(VarId(0), b(3)), (VarId(1), b(-1))]);
    }

    #[test]
    fn test_eliminate_cancels_pivot() {
        // target row (v2): -1*v2 + 1*v0 + 1*v1 = 0      (v2 = v0 + v1)
        // pivot row (v0):  -2*v0 + 1*v1 = 0              (v0 = v1/2)
        // eliminating v0 from target: v2 = 3/2 v1
        let target_row = vec![(VarId(0), b(1)), (VarId(1), b(1))];
        let pivot_row = vec![(VarId(1), b(1))];
        let (head, entries) = Matrix::eliminate(
            VarId(2),
            &b(-1),
            &target_row,
            VarId(0),
            &b(-2),
            &pivot_row,
            &b(1),
        );
        assert_eq!(head, b(-2));
        assert_eq!(entries, vec![(VarId(1), b(3))]);
    }

    #[test]
    fn test_clear_row_unlinks_columns() {
        let mut m = Matrix::new();
        for i in 0..3 {
            m.add_var(VarId(i));
        }
        m.set_row(VarId(2), b(-1), &[(VarId(0), b(1)), (VarId(1), b(1))]);
        assert_eq!(m.col_len(VarId(0)), 1);
        m.clear_row(VarId(2));
        assert!(m.col_is_empty(VarId(0)));
        assert!(m.col_is_empty(VarId(1)));
        assert!(m.row_to_vec(VarId(2)).is_empty());
    }
}
