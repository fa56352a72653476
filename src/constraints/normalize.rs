//! Normalization of constraint specifications.
//!
//! Normalization resolves every selector against the parameter index and
//! partitions the rows into fixed rows and free equivalence classes. The
//! free classes define the optimizer-facing parameter vector: one entry per
//! class, ordered by the smallest row position of each class.

use super::spec::ConstraintSpec;
use crate::error::{Result, SkillOptError};
use crate::params::{Bounds, ParamsIndex, ParamsTable};
use ndarray::{Array1, ArrayView1};
use tracing::debug;

/// Role of a single row after normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowKind {
    /// Pinned to a value; excluded from the free vector
    Fixed(f64),

    /// Member of the free parameter at this position of the free vector
    Free(usize),
}

/// One entry of the free vector: a class of rows sharing a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeParameter {
    members: Vec<usize>,
}

impl FreeParameter {
    /// Row positions of the class, ascending.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// The smallest member, which defines the class's place in the free vector.
    pub fn representative(&self) -> usize {
        self.members[0]
    }

    /// Whether more than one row shares this parameter.
    pub fn is_tied(&self) -> bool {
        self.members.len() > 1
    }
}

/// Disjoint-set forest over row positions.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // path compression
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Canonical, conflict-free constraint partition over a parameter index.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedConstraints {
    index: ParamsIndex,
    kinds: Vec<RowKind>,
    free: Vec<FreeParameter>,
}

impl NormalizedConstraints {
    /// Normalize `constraints` against `index`.
    ///
    /// # Errors
    ///
    /// * [`SkillOptError::SelectorResolution`] if a selector matches nothing
    /// * [`SkillOptError::ConstraintConflict`] if a row is both fixed and tied,
    ///   or fixed to two different values
    /// * [`SkillOptError::InvalidConstraint`] for malformed constraints, e.g.
    ///   pairwise selections of different sizes
    pub fn new(index: &ParamsIndex, constraints: &[ConstraintSpec]) -> Result<Self> {
        let n = index.len();
        let mut fixed: Vec<Option<(f64, usize)>> = vec![None; n];
        let mut tied_by: Vec<Option<usize>> = vec![None; n];
        let mut sets = UnionFind::new(n);

        for (number, constraint) in constraints.iter().enumerate() {
            constraint.validate()?;
            match constraint {
                ConstraintSpec::Fixed { selector, value } => {
                    for pos in selector.resolve(index)? {
                        match fixed[pos] {
                            Some((previous, other)) if previous != *value => {
                                return Err(conflict(
                                    index,
                                    pos,
                                    format!(
                                        "fixed to {previous} by constraint {other} ({}) and to {value} by constraint {number} ({constraint})",
                                        constraints[other]
                                    ),
                                ));
                            }
                            Some(_) => {}
                            None => fixed[pos] = Some((*value, number)),
                        }
                    }
                }
                ConstraintSpec::Equality { selector } => {
                    let positions = selector.resolve(index)?;
                    for &pos in &positions {
                        sets.union(positions[0], pos);
                        tied_by[pos].get_or_insert(number);
                    }
                }
                ConstraintSpec::PairwiseEquality { selectors } => {
                    let selections = selectors
                        .iter()
                        .map(|selector| selector.resolve(index))
                        .collect::<Result<Vec<_>>>()?;
                    let size = selections[0].len();
                    if let Some(odd) = selections.iter().find(|s| s.len() != size) {
                        return Err(SkillOptError::InvalidConstraint(format!(
                            "{constraint}: selections must have equal sizes, got {size} and {}",
                            odd.len()
                        )));
                    }
                    for selection in &selections {
                        for (k, &pos) in selection.iter().enumerate() {
                            sets.union(selections[0][k], pos);
                            tied_by[pos].get_or_insert(number);
                        }
                    }
                }
            }
        }

        let mut kinds = Vec::with_capacity(n);
        let mut free: Vec<FreeParameter> = Vec::new();
        let mut class_of_root: Vec<Option<usize>> = vec![None; n];
        for pos in 0..n {
            let root = sets.find(pos);
            match (fixed[pos], tied_by[pos]) {
                (Some((_, fixed_by)), Some(tie)) => {
                    return Err(conflict(
                        index,
                        pos,
                        format!(
                            "fixed by constraint {fixed_by} ({}) and tied to other parameters by constraint {tie} ({})",
                            constraints[fixed_by], constraints[tie]
                        ),
                    ));
                }
                (Some((value, _)), None) => kinds.push(RowKind::Fixed(value)),
                (None, _) => {
                    let class = *class_of_root[root].get_or_insert_with(|| {
                        free.push(FreeParameter {
                            members: Vec::new(),
                        });
                        free.len() - 1
                    });
                    free[class].members.push(pos);
                    kinds.push(RowKind::Free(class));
                }
            }
        }

        let normalized = Self {
            index: index.clone(),
            kinds,
            free,
        };
        debug!(
            n_rows = n,
            n_fixed = normalized.n_fixed(),
            n_free = normalized.n_free(),
            n_tied = normalized.free.iter().filter(|p| p.is_tied()).count(),
            "normalized {} constraints",
            constraints.len()
        );
        Ok(normalized)
    }

    /// The partition with no constraints: every row is its own free parameter.
    pub fn unconstrained(index: &ParamsIndex) -> Self {
        Self {
            index: index.clone(),
            kinds: (0..index.len()).map(RowKind::Free).collect(),
            free: (0..index.len())
                .map(|pos| FreeParameter { members: vec![pos] })
                .collect(),
        }
    }

    /// The index the partition was built against.
    pub fn index(&self) -> &ParamsIndex {
        &self.index
    }

    /// Length of the free vector.
    pub fn n_free(&self) -> usize {
        self.free.len()
    }

    /// Number of fixed rows.
    pub fn n_fixed(&self) -> usize {
        self.kinds
            .iter()
            .filter(|kind| matches!(kind, RowKind::Fixed(_)))
            .count()
    }

    /// Free parameters in free-vector order.
    pub fn free_parameters(&self) -> &[FreeParameter] {
        &self.free
    }

    /// Role of the row at `position`.
    pub fn row_kind(&self, position: usize) -> Option<RowKind> {
        self.kinds.get(position).copied()
    }

    /// Check that `table` is laid out on this partition's index.
    pub fn check_index(&self, table: &ParamsTable) -> Result<()> {
        if table.index() != &self.index {
            let detail = table
                .index()
                .iter()
                .zip(self.index.iter())
                .find(|(a, b)| a != b)
                .map(|(a, _)| a.to_string())
                .unwrap_or_else(|| format!("{} rows", table.len()));
            return Err(SkillOptError::ParameterValidation {
                key: detail,
                message: format!(
                    "parameter table does not match the model's {} parameters",
                    self.index.len()
                ),
            });
        }
        Ok(())
    }

    /// Free vector of a filled table, with validation.
    ///
    /// Every member of a free class must have a finite value inside its
    /// bounds, and tied members must agree. Table values of fixed rows are
    /// ignored, but the fixed value itself must lie inside the row's bounds.
    pub fn free_values(&self, table: &ParamsTable) -> Result<Array1<f64>> {
        self.check_index(table)?;
        for (pos, kind) in self.kinds.iter().enumerate() {
            let RowKind::Fixed(value) = *kind else {
                continue;
            };
            let bounds = table.bounds()[pos];
            if !bounds.contains(value) {
                return Err(SkillOptError::invalid_param(
                    &self.index.keys()[pos],
                    format!(
                        "fixed value {value} is outside its bounds [{}, {}]",
                        bounds.lower, bounds.upper
                    ),
                ));
            }
        }
        let mut free = Array1::zeros(self.n_free());
        for (i, parameter) in self.free.iter().enumerate() {
            let first = table.values()[parameter.representative()];
            for &pos in parameter.members() {
                let row = table.row(pos).ok_or_else(|| {
                    SkillOptError::DimensionMismatch(format!("row {pos} is missing"))
                })?;
                if row.value.is_nan() {
                    return Err(SkillOptError::invalid_param(row.key, "value is not set"));
                }
                if !row.value.is_finite() {
                    return Err(SkillOptError::invalid_param(
                        row.key,
                        format!("value {} is not finite", row.value),
                    ));
                }
                if !row.bounds.contains(row.value) {
                    return Err(SkillOptError::invalid_param(
                        row.key,
                        format!(
                            "value {} is outside its bounds [{}, {}]",
                            row.value, row.bounds.lower, row.bounds.upper
                        ),
                    ));
                }
                if row.value != first {
                    return Err(SkillOptError::invalid_param(
                        row.key,
                        format!(
                            "value {} differs from {} of the tied parameter {}",
                            row.value,
                            first,
                            self.index.keys()[parameter.representative()]
                        ),
                    ));
                }
            }
            free[i] = first;
        }
        Ok(free)
    }

    /// Bounds of every free parameter: the intersection of its members' bounds.
    pub fn free_bounds(&self, table: &ParamsTable) -> Result<(Array1<f64>, Array1<f64>)> {
        self.check_index(table)?;
        let mut lower = Array1::zeros(self.n_free());
        let mut upper = Array1::zeros(self.n_free());
        for (i, parameter) in self.free.iter().enumerate() {
            let mut bounds = Bounds::unbounded();
            for &pos in parameter.members() {
                bounds = bounds.intersect(&table.bounds()[pos]).map_err(|e| {
                    SkillOptError::invalid_param(&self.index.keys()[pos], e.to_string())
                })?;
            }
            lower[i] = bounds.lower;
            upper[i] = bounds.upper;
        }
        Ok((lower, upper))
    }

    /// Full parameter vector for a free vector.
    ///
    /// This is the trusted path: `free` must have length [`Self::n_free`].
    pub fn expand(&self, free: ArrayView1<'_, f64>) -> Array1<f64> {
        debug_assert_eq!(free.len(), self.n_free());
        self.kinds
            .iter()
            .map(|kind| match kind {
                RowKind::Fixed(value) => *value,
                RowKind::Free(i) => free[*i],
            })
            .collect()
    }

    /// Copy of `table` with values taken from a free vector; fixed rows get
    /// their fixed values.
    pub fn to_table(&self, table: &ParamsTable, free: ArrayView1<'_, f64>) -> Result<ParamsTable> {
        self.check_index(table)?;
        if free.len() != self.n_free() {
            return Err(SkillOptError::DimensionMismatch(format!(
                "expected {} free values, got {}",
                self.n_free(),
                free.len()
            )));
        }
        let mut result = table.clone();
        result.set_values(self.expand(free))?;
        Ok(result)
    }

    /// Reduce a derivative with respect to every row to one with respect to
    /// the free vector: fixed rows drop out, tied rows sum.
    pub fn reduce_gradient(&self, full: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        if full.len() != self.kinds.len() {
            return Err(SkillOptError::DimensionMismatch(format!(
                "expected a gradient over {} rows, got {}",
                self.kinds.len(),
                full.len()
            )));
        }
        Ok(self
            .free
            .iter()
            .map(|parameter| parameter.members().iter().map(|&pos| full[pos]).sum())
            .collect())
    }
}

fn conflict(index: &ParamsIndex, pos: usize, message: String) -> SkillOptError {
    SkillOptError::ConstraintConflict {
        key: index.keys()[pos].to_string(),
        message,
    }
}
