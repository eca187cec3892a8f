//! Mixed-radix packing of a combo set into a single integer index
//!
//! Each combo occupies one digit whose radix is its cardinality. Digit `i` is
//! scaled by the product of the cardinalities before it, starting from a seed:
//! `1` for the dynamic set, and the dynamic set's total cardinality for the
//! static set so both indices can be added into one combo-space index.
//!
//! Values are packed as given (`value - 0`), matching the generated
//! `GetIndex` bodies.

use crate::error::{PrepError, Result};
use crate::model::Combo;

/// Smallest `w >= 1` with `2^w >= count`
pub fn bit_width(count: u64) -> u32 {
    if count <= 2 {
        1
    } else {
        u64::BITS - (count - 1).leading_zeros()
    }
}

/// Placement of one combo inside a packed index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: String,
    pub min_val: i32,
    pub max_val: i32,
    pub cardinality: u64,
    /// Bit-field width in the generated index type
    pub bits: u32,
    /// Multiplier applied to this combo's value in `GetIndex`
    pub scale: u64,
}

/// Packing of an ordered combo set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboLayout {
    fields: Vec<FieldLayout>,
    cardinality: u64,
    max_index: u64,
}

impl ComboLayout {
    /// Lay out `combos` starting from `seed_scale`.
    ///
    /// Fails when a range is reversed or when the scaled combo space no
    /// longer fits in a `u64`.
    pub fn new(combos: &[Combo], seed_scale: u64) -> Result<Self> {
        // Scale of the next field; only an error once a field actually needs it
        let mut next_scale = Some(seed_scale);
        let mut cardinality = 1u64;
        let mut max_index = 0u64;
        let mut fields = Vec::with_capacity(combos.len());

        for combo in combos {
            let field_cardinality = combo.cardinality().ok_or_else(|| PrepError::InvalidComboRange {
                name: combo.name.clone(),
                min_val: combo.min_val,
                max_val: combo.max_val,
            })?;
            let overflow = || PrepError::ComboSpaceOverflow {
                name: combo.name.clone(),
            };
            let scale = next_scale.ok_or_else(overflow)?;

            max_index = scale
                .checked_mul(u64::from(combo.max_val.max(0).unsigned_abs()))
                .and_then(|top| max_index.checked_add(top))
                .ok_or_else(overflow)?;
            cardinality = cardinality.checked_mul(field_cardinality).ok_or_else(overflow)?;

            fields.push(FieldLayout {
                name: combo.name.clone(),
                min_val: combo.min_val,
                max_val: combo.max_val,
                cardinality: field_cardinality,
                bits: bit_width(field_cardinality),
                scale,
            });
            next_scale = scale.checked_mul(field_cardinality);
        }

        Ok(Self {
            fields,
            cardinality,
            max_index,
        })
    }

    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    pub fn scales(&self) -> Vec<u64> {
        self.fields.iter().map(|f| f.scale).collect()
    }

    /// Number of distinct assignments, `Π cardinality` (1 for an empty set)
    pub fn cardinality(&self) -> u64 {
        self.cardinality
    }

    /// Index for one value per field, in declaration order.
    ///
    /// Returns `None` when the arity is wrong or a value is out of range.
    pub fn index_of(&self, values: &[i32]) -> Option<u64> {
        if values.len() != self.fields.len() {
            return None;
        }

        self.fields
            .iter()
            .zip(values)
            .try_fold(0u64, |acc, (field, &value)| {
                if value < field.min_val || value > field.max_val {
                    return None;
                }
                Some(acc + field.scale * u64::try_from(value).ok()?)
            })
    }

    /// Inverse of [`index_of`](Self::index_of) for zero-based ranges
    pub fn decode(&self, index: u64) -> Vec<i32> {
        self.fields
            .iter()
            .map(|field| ((index / field.scale) % field.cardinality) as i32)
            .collect()
    }

    /// Largest index produced by this set (every field at its maximum)
    pub fn max_index(&self) -> u64 {
        self.max_index
    }
}
