//! Tree form of the emitted arithmetic.
//!
//! Emitted code works on `i64` scalars and `i64` slices only, so the tree is
//! deliberately small: every value is an `i64`, every array is a limb slice.

use core::fmt;

/// Index into a limb slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Index {
    /// Fixed position: `limbs[3]`.
    At(usize),

    /// Offset below the runtime index parameter: `limbs[i - 3]`.
    Below(usize),
}

/// Binary operators used by emitted code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `*`
    Mul,
    /// `<<`
    Shl,
    /// `>>` (arithmetic)
    Shr,
    /// `&`
    And,
}

impl BinOp {
    /// Source token.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Mul => "*",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::And => "&",
        }
    }
}

/// Named module-level constants referenced from routine bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Constant {
    /// `1 << (BITS_PER_LIMB - 1)`, the rounding bias of a carry.
    CarryAdd,

    /// `(1 << BITS_PER_LIMB) - 1`.
    LimbMask,
}

impl Constant {
    /// Identifier in emitted code.
    pub fn name(self) -> &'static str {
        match self {
            Constant::CarryAdd => "CARRY_ADD",
            Constant::LimbMask => "LIMB_MASK",
        }
    }
}

/// Expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    /// Integer literal.
    Lit(i64),

    /// Module constant.
    Const(Constant),

    /// Scalar variable or parameter.
    Var(String),

    /// Element of a slice parameter.
    Elem(String, Index),

    /// Binary operation.
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Scalar variable.
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    /// Slice element at a fixed index.
    pub fn elem(array: impl Into<String>, index: usize) -> Self {
        Expr::Elem(array.into(), Index::At(index))
    }

    /// `lhs op rhs`.
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    /// `lhs + rhs`.
    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Add, lhs, rhs)
    }

    /// `lhs * rhs`.
    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Mul, lhs, rhs)
    }

    /// `self << bits`.
    pub fn shl(self, bits: u32) -> Self {
        Self::binary(BinOp::Shl, self, Expr::Lit(bits.into()))
    }

    /// `self >> bits`.
    pub fn shr(self, bits: u32) -> Self {
        Self::binary(BinOp::Shr, self, Expr::Lit(bits.into()))
    }

    /// `self & LIMB_MASK`.
    pub fn mask(self) -> Self {
        Self::binary(BinOp::And, self, Expr::Const(Constant::LimbMask))
    }

    /// Left-nested sum of `terms`; `None` when empty.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Option<Self> {
        terms.into_iter().reduce(Expr::add)
    }
}

/// Assignable location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Place {
    /// Scalar variable.
    Var(String),

    /// Element of a mutable slice parameter.
    Elem(String, Index),
}

impl Place {
    /// Scalar variable.
    pub fn var(name: impl Into<String>) -> Self {
        Place::Var(name.into())
    }
}

/// Assignment operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Set,
    /// `+=`
    Add,
    /// `-=`
    Sub,
}

impl AssignOp {
    /// Source token.
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
        }
    }
}

/// Statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    /// `let mut name = value;`
    Let {
        /// Variable name.
        name: String,
        /// Initial value.
        value: Expr,
    },

    /// `let mut name: i64;`
    Declare(String),

    /// `place op value;`
    Assign {
        /// Target.
        place: Place,
        /// Operator.
        op: AssignOp,
        /// Right-hand side.
        value: Expr,
    },

    /// `Self::callee(out, args...);`
    Call {
        /// Carry/reduce routine to call.
        callee: String,
        /// Output slice passed through.
        out: String,
        /// Scalar arguments.
        args: Vec<Expr>,
    },

    /// `// text`
    Comment(String),

    /// Empty line.
    Blank,
}

/// Parameter type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// `&[i64]`
    Limbs,
    /// `&mut [i64]`
    LimbsMut,
    /// `i64`, rebindable inside the body.
    Scalar,
    /// `usize` limb position.
    Position,
}

/// Function parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    /// Name.
    pub name: String,
    /// Type.
    pub kind: ParamKind,
}

impl Param {
    /// Create a new parameter.
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Emitted routine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    /// Name.
    pub name: String,

    /// Parameters in declaration order.
    pub params: Vec<Param>,

    /// Whether this routine implements a method of the base trait.
    pub is_trait_method: bool,

    /// Body.
    pub body: Vec<Stmt>,
}

impl Function {
    /// Empty routine.
    pub fn new(name: impl Into<String>, params: Vec<Param>, is_trait_method: bool) -> Self {
        Self {
            name: name.into(),
            params,
            is_trait_method,
            body: Vec::new(),
        }
    }

    /// Carry/reduce routine: `fn name(r: &mut [i64], c0: i64, ..)`.
    pub fn carry_reduce(name: impl Into<String>, num_slots: usize) -> Self {
        let mut params = vec![Param::new("r", ParamKind::LimbsMut)];
        params.extend((0..num_slots).map(|i| Param::new(slot(i), ParamKind::Scalar)));
        Self::new(name, params, false)
    }

    /// Names of the variables this routine declares with `let`.
    pub fn declared(&self) -> impl Iterator<Item = &str> {
        self.body.iter().filter_map(|stmt| match stmt {
            Stmt::Let { name, .. } => Some(name.as_str()),
            Stmt::Declare(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// A complete generated module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Module {
    /// Generated type name.
    pub name: String,

    /// Header text copied verbatim to the top of the file.
    pub header: String,

    /// One-line description of the modulus, e.g. `2^255 - 19`.
    pub modulus_expr: String,

    /// Bits per limb.
    pub bits_per_limb: u32,

    /// Number of limbs.
    pub num_limbs: usize,

    /// Pass-through addition bound.
    pub max_adds: u32,

    /// Bit length of the modulus' leading power of two.
    pub power: u32,

    /// `(power, coefficient)` reduction terms.
    pub terms: Vec<(u32, i64)>,

    /// Whether `LIMB_MASK` is defined.
    pub limb_mask: bool,

    /// Path and name of the base trait, e.g. `super::IntegerPolynomial`.
    pub base_path: String,

    /// Base trait name.
    pub base_trait: String,

    /// Routines in emission order.
    pub functions: Vec<Function>,
}

impl Module {
    /// Look up a routine by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Carry/reduce helpers split off by the routine-size limiter.
    pub fn split_helpers(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| {
            f.name
                .strip_prefix("carry_reduce")
                .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        })
    }
}

/// Name of accumulator slot `i`.
pub fn slot(i: usize) -> String {
    format!("c{i}")
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::At(i) => write!(f, "{i}"),
            Index::Below(0) => f.write_str("i"),
            Index::Below(k) => write!(f, "i - {k}"),
        }
    }
}
