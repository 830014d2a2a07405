//! Carry/reduce schedules.
//!
//! A schedule is an ordered list of [`CarryReduce`] operations over a vector
//! of accumulator slots `c0, c1, ...`, where slot `i` carries weight
//! `2^(i * bits_per_limb)`. The full schedule runs after a multiplication
//! (`2n - 1` input slots), the small one after additions (`n` input slots).
//! Both leave the field element in slots `0..n`.

use core::fmt::{self, Display};

/// Single step of a carry/reduce schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CarryReduce {
    /// Propagate the overflow of slot `i` into slot `i + 1`.
    Carry(usize),

    /// Fold slot `i`, which lies beyond the modulus, back into lower slots
    /// using the field's reduction terms.
    Reduce(usize),
}

impl CarryReduce {
    /// Slot this operation reads from.
    pub const fn index(&self) -> usize {
        match *self {
            CarryReduce::Carry(i) | CarryReduce::Reduce(i) => i,
        }
    }

    /// Is this a [`CarryReduce::Carry`]?
    pub const fn is_carry(&self) -> bool {
        matches!(self, CarryReduce::Carry(_))
    }
}

impl Display for CarryReduce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CarryReduce::Carry(i) => write!(f, "carry({i})"),
            CarryReduce::Reduce(i) => write!(f, "reduce({i})"),
        }
    }
}

/// Highest slot touched by `sequence`. A carry out of slot `i` writes `i + 1`.
pub fn max_slot(sequence: &[CarryReduce]) -> Option<usize> {
    sequence
        .iter()
        .map(|cr| match *cr {
            CarryReduce::Carry(i) => i + 1,
            CarryReduce::Reduce(i) => i,
        })
        .max()
}

/// Carry every slot but the last of an `num_slots`-wide vector, lowest first.
pub fn full_carry(num_slots: usize) -> Vec<CarryReduce> {
    (0..num_slots.saturating_sub(1))
        .map(CarryReduce::Carry)
        .collect()
}

/// Reduce the high half `n..=2n-2` of a product, most significant first.
///
/// A reduction whose distance is not limb aligned writes two lower slots;
/// going from the top down keeps it from touching a high slot that was
/// already folded.
pub fn full_reduce(num_limbs: usize) -> Vec<CarryReduce> {
    (num_limbs..2 * num_limbs - 1)
        .rev()
        .map(CarryReduce::Reduce)
        .collect()
}

/// Normalization after additions: carry the top two limbs out into slot
/// `n`, fold it back in, then carry everything.
pub fn simple_small_cr_sequence(num_limbs: usize) -> Vec<CarryReduce> {
    let mut result = vec![
        CarryReduce::Carry(num_limbs - 2),
        CarryReduce::Carry(num_limbs - 1),
        CarryReduce::Reduce(num_limbs),
    ];
    result.extend(full_carry(num_limbs));
    result
}

/// Conservative full schedule: four rounds of carry-everything then
/// reduce-everything. Not tuned for any particular modulus.
pub fn simple_cr_sequence(num_limbs: usize) -> Vec<CarryReduce> {
    let mut result = Vec::new();
    for _ in 0..4 {
        result.extend(full_carry(2 * num_limbs - 1));
        result.extend(full_reduce(num_limbs));
    }
    result
}

/// Curve25519 (`n = 10`, 26-bit limbs).
///
/// The top two product slots are folded first so that slots 8 and 9 can be
/// carried into slot `n` before the rest of the high half is reduced.
pub fn curve25519_cr_sequence(num_limbs: usize) -> Vec<CarryReduce> {
    let n = num_limbs;
    let mut result = vec![
        CarryReduce::Reduce(2 * n - 3),
        CarryReduce::Reduce(2 * n - 2),
        CarryReduce::Carry(n - 2),
        CarryReduce::Carry(n - 1),
    ];
    result.extend((n..2 * n - 3).map(CarryReduce::Reduce));
    result.extend(full_carry(n));
    result
}

/// Curve448 (`n = 16`, 28-bit limbs). `2^224` sits exactly on limb 8, so the
/// high half is folded in quarters.
pub fn curve448_cr_sequence(num_limbs: usize) -> Vec<CarryReduce> {
    let n = num_limbs;
    let mut result: Vec<_> = (n + 8..2 * n - 1).map(CarryReduce::Reduce).collect();
    result.extend((n + 4..n + 8).map(CarryReduce::Reduce));
    result.push(CarryReduce::Carry(n - 2));
    result.push(CarryReduce::Carry(n - 1));
    result.extend((n..n + 4).map(CarryReduce::Reduce));
    result.extend(full_carry(n));
    result
}

/// P-256: reduce the high half, then normalize like an addition.
pub fn p256_cr_sequence(num_limbs: usize) -> Vec<CarryReduce> {
    let mut result = full_reduce(num_limbs);
    result.extend(simple_small_cr_sequence(num_limbs));
    result
}

/// P-384: reduce the high half, then normalize like an addition.
pub fn p384_cr_sequence(num_limbs: usize) -> Vec<CarryReduce> {
    let mut result = full_reduce(num_limbs);
    result.extend(simple_small_cr_sequence(num_limbs));
    result
}

/// P-521: reduce the high half, then normalize like an addition.
pub fn p521_cr_sequence(num_limbs: usize) -> Vec<CarryReduce> {
    let mut result = full_reduce(num_limbs);
    result.extend(simple_small_cr_sequence(num_limbs));
    result
}

/// Full schedule for a scalar field.
///
/// Group orders have dense reduction terms covering roughly half the limbs,
/// so every slot is carried before anything is folded, and the fold happens
/// in two rounds: the high half first, then the single slot that the second
/// carry pass pushes out.
pub fn order_field_cr_sequence(num_limbs: usize) -> Vec<CarryReduce> {
    let n = num_limbs;
    let mut result = full_carry(2 * n);
    result.push(CarryReduce::Reduce(2 * n - 1));
    result.extend(full_reduce(n));
    result.extend(full_carry(n + 1));
    result.push(CarryReduce::Reduce(n));
    result.extend(full_carry(n));
    result
}

/// Small schedule for a scalar field.
pub fn order_field_small_cr_sequence(num_limbs: usize) -> Vec<CarryReduce> {
    let n = num_limbs;
    let mut result = full_carry(n + 1);
    result.push(CarryReduce::Reduce(n));
    result.extend(full_carry(n));
    result
}

/// Full schedule for the P-521 group order: the high-half fold is split in
/// two with a carry pass in between.
///
/// Ten dense terms make the upper fold pile into slots `n..n + n/2`, which
/// must be carried before they are multiplied by a term coefficient. The
/// last of those carries lands in slot `n + n/2`, so that slot is left for
/// the second half.
pub fn o521_cr_sequence(num_limbs: usize) -> Vec<CarryReduce> {
    let n = num_limbs;
    let mid = n + n / 2;

    let mut result = full_carry(2 * n);
    result.extend((mid + 1..2 * n).rev().map(CarryReduce::Reduce));
    result.extend((n..mid).map(CarryReduce::Carry));
    result.extend((n..=mid).rev().map(CarryReduce::Reduce));
    result.extend(order_field_small_cr_sequence(n));
    result
}
