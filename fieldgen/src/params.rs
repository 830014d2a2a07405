//! Field descriptors.
//!
//! A field is described by its limb layout and a reduction polynomial: the
//! modulus is written as
//!
//! ```text
//! p = 2^power + Σ coefficient_i · 2^power_i
//! ```
//!
//! where each `(power_i, coefficient_i)` is a [`Term`]. Folding a value that
//! sits at `2^power` back into the field then amounts to adding
//! `-coefficient_i · 2^power_i` for every term.

use crate::{
    Error, Result,
    sequence::{self, CarryReduce},
};
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

/// One summand `coefficient · 2^power` of a modulus' deviation from a power
/// of two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Term {
    /// Exponent of two.
    pub power: u32,

    /// Signed multiplier.
    pub coefficient: i64,
}

impl Term {
    /// Create a new [`Term`].
    pub const fn new(power: u32, coefficient: i64) -> Self {
        Self { power, coefficient }
    }
}

/// How a descriptor states its modulus.
#[derive(Clone, Copy, Debug)]
pub enum Reduction {
    /// Explicit term list.
    Terms(&'static [Term]),

    /// Big-endian hex modulus, decomposed into limb-aligned terms.
    Modulus(&'static str),
}

/// Schedule builder: takes the number of limbs.
pub type ScheduleFn = fn(usize) -> Vec<CarryReduce>;

/// Compiled-in description of one field.
#[derive(Clone, Copy, Debug)]
pub struct FieldDescriptor {
    /// Name of the generated type.
    pub name: &'static str,

    /// File stem of the generated module.
    pub module: &'static str,

    /// Bits carried by each limb in normalized form.
    pub bits_per_limb: u32,

    /// Number of limbs.
    pub num_limbs: usize,

    /// Additions allowed before a reduction is required.
    pub max_adds: u32,

    /// Bit length of the modulus' leading power of two.
    pub power: u32,

    /// Reduction polynomial.
    pub reduction: Reduction,

    /// Schedule run after multiplication and squaring.
    pub cr_sequence: ScheduleFn,

    /// Schedule run after additions.
    pub small_cr_sequence: ScheduleFn,
}

/// Curve25519 base field: `p = 2^255 - 19`.
pub const CURVE25519: FieldDescriptor = FieldDescriptor {
    name: "IntegerPolynomial25519",
    module: "integer_polynomial_25519",
    bits_per_limb: 26,
    num_limbs: 10,
    max_adds: 1,
    power: 255,
    reduction: Reduction::Terms(&[Term::new(0, -19)]),
    cr_sequence: sequence::curve25519_cr_sequence,
    small_cr_sequence: sequence::simple_small_cr_sequence,
};

/// Curve448 base field: `p = 2^448 - 2^224 - 1`.
pub const CURVE448: FieldDescriptor = FieldDescriptor {
    name: "IntegerPolynomial448",
    module: "integer_polynomial_448",
    bits_per_limb: 28,
    num_limbs: 16,
    max_adds: 1,
    power: 448,
    reduction: Reduction::Terms(&[Term::new(224, -1), Term::new(0, -1)]),
    cr_sequence: sequence::curve448_cr_sequence,
    small_cr_sequence: sequence::simple_small_cr_sequence,
};

/// NIST P-256 base field: `p = 2^256 - 2^224 + 2^192 + 2^96 - 1`.
pub const P256: FieldDescriptor = FieldDescriptor {
    name: "IntegerPolynomialP256",
    module: "integer_polynomial_p256",
    bits_per_limb: 26,
    num_limbs: 10,
    max_adds: 2,
    power: 256,
    reduction: Reduction::Terms(&[
        Term::new(224, -1),
        Term::new(192, 1),
        Term::new(96, 1),
        Term::new(0, -1),
    ]),
    cr_sequence: sequence::p256_cr_sequence,
    small_cr_sequence: sequence::simple_small_cr_sequence,
};

/// NIST P-384 base field: `p = 2^384 - 2^128 - 2^96 + 2^32 - 1`.
pub const P384: FieldDescriptor = FieldDescriptor {
    name: "IntegerPolynomialP384",
    module: "integer_polynomial_p384",
    bits_per_limb: 28,
    num_limbs: 14,
    max_adds: 2,
    power: 384,
    reduction: Reduction::Terms(&[
        Term::new(128, -1),
        Term::new(96, -1),
        Term::new(32, 1),
        Term::new(0, -1),
    ]),
    cr_sequence: sequence::p384_cr_sequence,
    small_cr_sequence: sequence::simple_small_cr_sequence,
};

/// NIST P-521 base field: `p = 2^521 - 1`.
pub const P521: FieldDescriptor = FieldDescriptor {
    name: "IntegerPolynomialP521",
    module: "integer_polynomial_p521",
    bits_per_limb: 28,
    num_limbs: 19,
    max_adds: 2,
    power: 521,
    reduction: Reduction::Terms(&[Term::new(0, -1)]),
    cr_sequence: sequence::p521_cr_sequence,
    small_cr_sequence: sequence::simple_small_cr_sequence,
};

/// Order of the P-256 base point.
pub const P256_ORDER: FieldDescriptor = FieldDescriptor {
    name: "P256OrderField",
    module: "p256_order_field",
    bits_per_limb: 26,
    num_limbs: 10,
    max_adds: 1,
    power: 256,
    reduction: Reduction::Modulus(
        "FFFFFFFF00000000FFFFFFFFFFFFFFFFBCE6FAADA7179E84F3B9CAC2FC632551",
    ),
    cr_sequence: sequence::order_field_cr_sequence,
    small_cr_sequence: sequence::order_field_small_cr_sequence,
};

/// Order of the P-384 base point.
pub const P384_ORDER: FieldDescriptor = FieldDescriptor {
    name: "P384OrderField",
    module: "p384_order_field",
    bits_per_limb: 28,
    num_limbs: 14,
    max_adds: 1,
    power: 384,
    reduction: Reduction::Modulus(
        "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFC7634D81F4372DDF581A0DB248B0A77AECEC196ACCC52973",
    ),
    cr_sequence: sequence::order_field_cr_sequence,
    small_cr_sequence: sequence::order_field_small_cr_sequence,
};

/// Order of the P-521 base point.
pub const P521_ORDER: FieldDescriptor = FieldDescriptor {
    name: "P521OrderField",
    module: "p521_order_field",
    bits_per_limb: 28,
    num_limbs: 19,
    max_adds: 1,
    power: 521,
    reduction: Reduction::Modulus(
        "01FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFA51868783BF2F966B7FCC0148F709A5D03BB5C9B8899C47AEBB6FB71E91386409",
    ),
    cr_sequence: sequence::o521_cr_sequence,
    small_cr_sequence: sequence::order_field_small_cr_sequence,
};

/// Order of the Curve25519 prime-order subgroup.
pub const CURVE25519_ORDER: FieldDescriptor = FieldDescriptor {
    name: "Curve25519OrderField",
    module: "curve25519_order_field",
    bits_per_limb: 26,
    num_limbs: 10,
    max_adds: 1,
    power: 252,
    reduction: Reduction::Modulus(
        "1000000000000000000000000000000014def9dea2f79cd65812631a5cf5d3ed",
    ),
    cr_sequence: sequence::order_field_cr_sequence,
    small_cr_sequence: sequence::order_field_small_cr_sequence,
};

/// Order of the Curve448 prime-order subgroup.
pub const CURVE448_ORDER: FieldDescriptor = FieldDescriptor {
    name: "Curve448OrderField",
    module: "curve448_order_field",
    bits_per_limb: 28,
    num_limbs: 16,
    max_adds: 1,
    power: 446,
    reduction: Reduction::Modulus(
        "3fffffffffffffffffffffffffffffffffffffffffffffffffffffff7cca23e9c44edb49aed63690216cc2728dc58f552378c292ab5844f3",
    ),
    cr_sequence: sequence::order_field_cr_sequence,
    small_cr_sequence: sequence::order_field_small_cr_sequence,
};

/// Every field the generator emits, in output order.
pub const FIELDS: &[FieldDescriptor] = &[
    CURVE25519,
    CURVE448,
    P256,
    P384,
    P521,
    P256_ORDER,
    P384_ORDER,
    P521_ORDER,
    CURVE25519_ORDER,
    CURVE448_ORDER,
];

/// Fully built field: terms and both schedules materialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldParams {
    name: &'static str,
    module: &'static str,
    bits_per_limb: u32,
    num_limbs: usize,
    max_adds: u32,
    power: u32,
    terms: Vec<Term>,
    cr_sequence: Vec<CarryReduce>,
    small_cr_sequence: Vec<CarryReduce>,
}

impl FieldParams {
    /// Build a field from an explicit term list and schedules.
    ///
    /// The layout must satisfy:
    /// - `1 <= bits_per_limb <= 31`, so a product of two limbs fits an `i64`;
    /// - `bits_per_limb * (num_limbs - 1) < power <= bits_per_limb * num_limbs`,
    ///   so the top limb holds at least one bit of the modulus;
    /// - every term lies strictly below `2^power`.
    ///
    /// Anything else is rejected with [`Error::InvalidLayout`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &'static str,
        module: &'static str,
        bits_per_limb: u32,
        num_limbs: usize,
        max_adds: u32,
        power: u32,
        terms: Vec<Term>,
        cr_sequence: Vec<CarryReduce>,
        small_cr_sequence: Vec<CarryReduce>,
    ) -> Result<Self> {
        check_layout(name, bits_per_limb, num_limbs, power)?;
        if let Some(t) = terms.iter().find(|t| t.power >= power) {
            return Err(Error::InvalidLayout {
                field: name,
                reason: format!("term 2^{} is not below 2^{power}", t.power),
            });
        }

        Ok(Self {
            name,
            module,
            bits_per_limb,
            num_limbs,
            max_adds,
            power,
            terms,
            cr_sequence,
            small_cr_sequence,
        })
    }

    /// Build a field from a compiled-in descriptor.
    ///
    /// Fails when a hex modulus does not parse or the layout is rejected by
    /// [`FieldParams::new`].
    pub fn from_descriptor(desc: &FieldDescriptor) -> Result<Self> {
        check_layout(desc.name, desc.bits_per_limb, desc.num_limbs, desc.power)?;
        let terms = match desc.reduction {
            Reduction::Terms(terms) => terms.to_vec(),
            Reduction::Modulus(hex) => {
                let modulus = BigInt::parse_bytes(hex.as_bytes(), 16).ok_or(
                    Error::InvalidModulus {
                        field: desc.name,
                        hex,
                    },
                )?;
                decompose_modulus(desc.bits_per_limb, desc.power, &modulus)
            }
        };

        Self::new(
            desc.name,
            desc.module,
            desc.bits_per_limb,
            desc.num_limbs,
            desc.max_adds,
            desc.power,
            terms,
            (desc.cr_sequence)(desc.num_limbs),
            (desc.small_cr_sequence)(desc.num_limbs),
        )
    }

    /// Name of the generated type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// File stem of the generated module.
    pub fn module(&self) -> &'static str {
        self.module
    }

    /// Bits per limb.
    pub fn bits_per_limb(&self) -> u32 {
        self.bits_per_limb
    }

    /// Number of limbs.
    pub fn num_limbs(&self) -> usize {
        self.num_limbs
    }

    /// Additions allowed before a reduction is required.
    pub fn max_adds(&self) -> u32 {
        self.max_adds
    }

    /// Bit length of the modulus' leading power of two.
    pub fn power(&self) -> u32 {
        self.power
    }

    /// Reduction terms.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Schedule run after multiplication and squaring.
    pub fn cr_sequence(&self) -> &[CarryReduce] {
        &self.cr_sequence
    }

    /// Schedule run after additions.
    pub fn small_cr_sequence(&self) -> &[CarryReduce] {
        &self.small_cr_sequence
    }

    /// Evaluate `2^power + Σ coefficient · 2^power_i`.
    pub fn modulus(&self) -> BigInt {
        self.terms
            .iter()
            .fold(BigInt::one() << self.power, |acc, t| {
                acc + (BigInt::from(t.coefficient) << t.power)
            })
    }

    /// Whether some reduction lands between limb boundaries, so emitted code
    /// has to split a value with `LIMB_MASK`.
    pub fn needs_limb_mask(&self) -> bool {
        let bits = self.bits_per_limb;
        let padded = bits * self.num_limbs as u32;
        self.terms.iter().any(|t| {
            (self.power - t.power) % bits != 0 || (padded - t.power) % bits != 0
        })
    }
}

fn check_layout(field: &'static str, bits: u32, num_limbs: usize, power: u32) -> Result<()> {
    let invalid = |reason: String| Err(Error::InvalidLayout { field, reason });
    if !(1..=31).contains(&bits) {
        return invalid(format!("{bits} bits per limb is outside 1..=31"));
    }
    let padded = u64::from(bits) * num_limbs as u64;
    let top = u64::from(power);
    if num_limbs == 0 || top > padded || top + u64::from(bits) <= padded {
        return invalid(format!(
            "2^{power} does not end in the top limb of {num_limbs} x {bits} bits"
        ));
    }
    Ok(())
}

/// Split `2^power - modulus` into limb-aligned terms using balanced digits
/// in radix `2^bits_per_limb`.
///
/// Every coefficient produced satisfies `|c| <= 2^(bits_per_limb - 1)`, and
/// at most one term is produced per limb position.
///
/// # Panics
///
/// If `bits_per_limb` is zero or at least 64. [`FieldParams::from_descriptor`]
/// checks the layout before calling this.
pub fn decompose_modulus(bits_per_limb: u32, power: u32, modulus: &BigInt) -> Vec<Term> {
    let mut sub = (BigInt::one() << power) - modulus;
    let negate = sub.is_negative();
    if negate {
        sub = -sub;
    }

    let mask = (1u64 << bits_per_limb) - 1;
    let half = 1i64 << (bits_per_limb - 1);

    let mut terms = Vec::new();
    let mut limb = 0u32;
    while !sub.is_zero() {
        let low = sub.magnitude().iter_u64_digits().next().unwrap_or(0);
        let digit = (low & mask) as i64;

        let (mut coefficient, plus_one) = if digit > half {
            (digit - (1i64 << bits_per_limb), true)
        } else {
            (digit, false)
        };
        if negate {
            coefficient = -coefficient;
        }
        if coefficient != 0 {
            terms.push(Term::new(limb * bits_per_limb, -coefficient));
        }

        sub >>= bits_per_limb;
        if plus_one {
            sub += 1u32;
        }
        limb += 1;
    }

    terms
}
