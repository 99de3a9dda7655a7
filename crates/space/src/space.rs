//! Config space - addressable Cartesian product of knob domains.

use crate::knob::{Knob, KnobValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from config space addressing. Index misuse is a programming error
/// and escalates, unlike per-trial build/run failures.
#[derive(Debug, Error)]
pub enum SpaceError {
    #[error("config index {index} out of range for space of size {size}")]
    OutOfRange { index: u64, size: u64 },
    #[error("entity has {got} knob values, space declares {expected} knobs")]
    KnobCountMismatch { got: usize, expected: usize },
}

/// One concrete point in a config space: the stable index plus the
/// materialized knob values. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigEntity {
    pub index: u64,
    pub values: Vec<KnobValue>,
}

impl std::fmt::Display for ConfigEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "#{} {{{}}}", self.index, parts.join(", "))
    }
}

/// Ordered, immutable collection of knobs. The addressable points are the
/// full Cartesian product in mixed-radix order: the first knob is the
/// fastest-varying digit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigSpace {
    knobs: Vec<Knob>,
}

impl ConfigSpace {
    pub fn builder() -> ConfigSpaceBuilder {
        ConfigSpaceBuilder { knobs: Vec::new() }
    }

    pub fn knobs(&self) -> &[Knob] {
        &self.knobs
    }

    /// Total number of addressable points. Saturates at `u64::MAX` for
    /// spaces too large to count exactly; such spaces are still indexable
    /// over the representable prefix.
    pub fn size(&self) -> u64 {
        self.knobs
            .iter()
            .fold(1u64, |acc, k| acc.saturating_mul(k.cardinality() as u64))
    }

    /// Decode `index` into a config entity. Every in-range index yields a
    /// structurally valid point.
    pub fn get(&self, index: u64) -> Result<ConfigEntity, SpaceError> {
        let size = self.size();
        if index >= size {
            return Err(SpaceError::OutOfRange { index, size });
        }
        let mut rest = index;
        let mut values = Vec::with_capacity(self.knobs.len());
        for knob in &self.knobs {
            let card = knob.cardinality() as u64;
            values.push(knob.value_at((rest % card) as usize));
            rest /= card;
        }
        Ok(ConfigEntity { index, values })
    }

    /// Length of the feature vector produced by [`encode`](Self::encode).
    pub fn feature_len(&self) -> usize {
        self.knobs.iter().map(|k| k.feature_width()).sum()
    }

    /// Encode an entity into the fixed-length numeric feature vector the
    /// cost model consumes.
    pub fn encode(&self, entity: &ConfigEntity) -> Result<Vec<f64>, SpaceError> {
        if entity.values.len() != self.knobs.len() {
            return Err(SpaceError::KnobCountMismatch {
                got: entity.values.len(),
                expected: self.knobs.len(),
            });
        }
        let mut out = Vec::with_capacity(self.feature_len());
        for (knob, value) in self.knobs.iter().zip(&entity.values) {
            knob.encode_into(value, &mut out);
        }
        Ok(out)
    }

    /// Look up a knob value on an entity by knob name.
    pub fn value_of<'a>(&self, entity: &'a ConfigEntity, name: &str) -> Option<&'a KnobValue> {
        let pos = self.knobs.iter().position(|k| k.name == name)?;
        entity.values.get(pos)
    }
}

/// Builder for declaring knobs once at space-construction time.
pub struct ConfigSpaceBuilder {
    knobs: Vec<Knob>,
}

impl ConfigSpaceBuilder {
    pub fn split(mut self, name: &str, extent: usize) -> Self {
        self.knobs.push(Knob::split(name, extent));
        self
    }

    pub fn permutation(mut self, name: &str, axes: &[&str]) -> Self {
        self.knobs.push(Knob::permutation(name, axes));
        self
    }

    pub fn flag(mut self, name: &str) -> Self {
        self.knobs.push(Knob::flag(name));
        self
    }

    pub fn choice(mut self, name: &str, options: &[i64]) -> Self {
        self.knobs.push(Knob::choice(name, options));
        self
    }

    pub fn knob(mut self, knob: Knob) -> Self {
        self.knobs.push(knob);
        self
    }

    pub fn build(self) -> ConfigSpace {
        ConfigSpace { knobs: self.knobs }
    }
}
