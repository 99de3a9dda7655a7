//! Tunable knobs - the independent dimensions of a configuration space.

use serde::{Deserialize, Serialize};

/// The finite domain of one knob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum KnobDomain {
    /// Tile/split factor for a loop of the given extent. Candidates are the
    /// divisors of the extent, so every choice yields a legal split.
    Split { extent: usize, factors: Vec<usize> },
    /// Reordering of a fixed axis set. Candidates are all permutations of
    /// `0..axes.len()`.
    Permutation {
        axes: Vec<String>,
        orders: Vec<Vec<usize>>,
    },
    /// On/off toggle (vectorize, unroll, ...).
    Flag,
    /// Explicit list of discrete values.
    Choice { options: Vec<i64> },
}

/// One concrete choice for a knob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum KnobValue {
    Split(usize),
    Permutation(Vec<usize>),
    Flag(bool),
    Choice(i64),
}

impl std::fmt::Display for KnobValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KnobValue::Split(v) => write!(f, "{}", v),
            KnobValue::Permutation(order) => {
                let parts: Vec<String> = order.iter().map(|a| a.to_string()).collect();
                write!(f, "[{}]", parts.join(","))
            }
            KnobValue::Flag(v) => write!(f, "{}", v),
            KnobValue::Choice(v) => write!(f, "{}", v),
        }
    }
}

/// A named tunable dimension with a finite domain.
///
/// Knobs are declared once when the space is constructed and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Knob {
    pub name: String,
    pub domain: KnobDomain,
}

impl Knob {
    /// Split knob over the divisors of `extent`.
    pub fn split(name: &str, extent: usize) -> Self {
        Self {
            name: name.into(),
            domain: KnobDomain::Split {
                extent,
                factors: divisors(extent),
            },
        }
    }

    /// Permutation knob over all orders of the given axes.
    pub fn permutation(name: &str, axes: &[&str]) -> Self {
        Self {
            name: name.into(),
            domain: KnobDomain::Permutation {
                axes: axes.iter().map(|a| a.to_string()).collect(),
                orders: permutations(axes.len()),
            },
        }
    }

    /// Boolean toggle knob.
    pub fn flag(name: &str) -> Self {
        Self {
            name: name.into(),
            domain: KnobDomain::Flag,
        }
    }

    /// Knob over an explicit value list.
    pub fn choice(name: &str, options: &[i64]) -> Self {
        Self {
            name: name.into(),
            domain: KnobDomain::Choice {
                options: options.to_vec(),
            },
        }
    }

    /// Number of values in this knob's domain.
    pub fn cardinality(&self) -> usize {
        match &self.domain {
            KnobDomain::Split { factors, .. } => factors.len(),
            KnobDomain::Permutation { orders, .. } => orders.len(),
            KnobDomain::Flag => 2,
            KnobDomain::Choice { options } => options.len(),
        }
    }

    /// Value at position `i` in the domain. `i` must be < `cardinality()`;
    /// the space decoder guarantees this.
    pub(crate) fn value_at(&self, i: usize) -> KnobValue {
        debug_assert!(i < self.cardinality());
        match &self.domain {
            KnobDomain::Split { factors, .. } => KnobValue::Split(factors[i]),
            KnobDomain::Permutation { orders, .. } => KnobValue::Permutation(orders[i].clone()),
            KnobDomain::Flag => KnobValue::Flag(i == 1),
            KnobDomain::Choice { options } => KnobValue::Choice(options[i]),
        }
    }

    /// Width this knob contributes to the feature vector.
    pub fn feature_width(&self) -> usize {
        match &self.domain {
            KnobDomain::Split { .. } => 1,
            KnobDomain::Permutation { axes, .. } => axes.len(),
            KnobDomain::Flag => 1,
            KnobDomain::Choice { .. } => 1,
        }
    }

    /// Append this knob's numeric encoding of `value` to `out`.
    ///
    /// Splits encode as log2 of the factor (tile factors grow geometrically),
    /// permutations as the position of each axis, flags as 0/1, choices as
    /// the raw value.
    pub(crate) fn encode_into(&self, value: &KnobValue, out: &mut Vec<f64>) {
        match value {
            KnobValue::Split(v) => out.push((*v as f64).max(1.0).log2()),
            KnobValue::Permutation(order) => {
                for axis in order {
                    out.push(*axis as f64);
                }
            }
            KnobValue::Flag(v) => out.push(if *v { 1.0 } else { 0.0 }),
            KnobValue::Choice(v) => out.push(*v as f64),
        }
    }
}

/// All divisors of `n` in ascending order.
pub fn divisors(n: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut d = 1;
    while d * d <= n {
        if n % d == 0 {
            out.push(d);
            if d != n / d {
                out.push(n / d);
            }
        }
        d += 1;
    }
    out.sort_unstable();
    out
}

/// All permutations of `0..n` in lexicographic order. Intended for small axis
/// sets (n <= ~6); the domain grows factorially.
pub fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut current: Vec<usize> = (0..n).collect();
    let mut used = vec![false; n];
    fn recurse(
        n: usize,
        depth: usize,
        current: &mut Vec<usize>,
        used: &mut Vec<bool>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if depth == n {
            out.push(current.clone());
            return;
        }
        for v in 0..n {
            if !used[v] {
                used[v] = true;
                current[depth] = v;
                recurse(n, depth + 1, current, used, out);
                used[v] = false;
            }
        }
    }
    recurse(n, 0, &mut current, &mut used, &mut out);
    out
}
