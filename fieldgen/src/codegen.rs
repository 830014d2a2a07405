//! Code emission.
//!
//! [`emit_module`] turns a [`FieldParams`] into an [`ir::Module`]; [`generate`]
//! renders that module as Rust source. Every routine works on signed `i64`
//! limbs in radix `2^bits_per_limb`.

pub mod ir;
pub mod render;

mod buffer;

use self::{
    buffer::CodeBuffer,
    ir::{AssignOp, Constant, Expr, Function, Index, Module, Param, ParamKind, Place, Stmt, slot},
};
use crate::{
    params::{FieldParams, Term},
    sequence::{self, CarryReduce},
};

/// Emission settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Text copied verbatim to the top of every generated file.
    pub header: String,

    /// Trait the generated type implements.
    pub base_trait: String,

    /// Module path the trait is imported from.
    pub base_path: String,

    /// Longest run of same-kind carry/reduce steps kept in one routine.
    /// `None` keeps every schedule in a single routine.
    pub split_threshold: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            header: String::new(),
            base_trait: "IntegerPolynomial".into(),
            base_path: "super".into(),
            split_threshold: Some(8),
        }
    }
}

/// Generate the source text of the module for `params`.
pub fn generate(params: &FieldParams, options: &Options) -> String {
    render::render(&emit_module(params, options))
}

/// Build the routines for `params`.
pub fn emit_module(params: &FieldParams, options: &Options) -> Module {
    let n = params.num_limbs();

    let mut buf = CodeBuffer::new(options.split_threshold);
    carry_reduce(&mut buf, params, "carry_reduce", 2 * n - 1, params.cr_sequence());
    carry_reduce(&mut buf, params, "carry_reduce_small", n, params.small_cr_sequence());
    let splits = buf.splits();

    reduce_in(&mut buf, params);
    final_carry_reduce_last(&mut buf, params);
    mult(&mut buf, params);
    reduce(&mut buf, params);
    square(&mut buf, params);

    let functions = buf.finish();

    tracing::debug!(
        field = params.name(),
        bits_per_limb = params.bits_per_limb(),
        num_limbs = n,
        terms = params.terms().len(),
        cr_sequence = params.cr_sequence().len(),
        small_cr_sequence = params.small_cr_sequence().len(),
        splits,
        "emitted module"
    );

    Module {
        name: params.name().into(),
        header: options.header.clone(),
        modulus_expr: modulus_expr(params),
        bits_per_limb: params.bits_per_limb(),
        num_limbs: n,
        max_adds: params.max_adds(),
        power: params.power(),
        terms: params
            .terms()
            .iter()
            .map(|t| (t.power, t.coefficient))
            .collect(),
        limb_mask: params.needs_limb_mask(),
        base_path: options.base_path.clone(),
        base_trait: options.base_trait.clone(),
        functions,
    }
}

/// `2^power - 2^224 + ...`, highest term first.
fn modulus_expr(params: &FieldParams) -> String {
    let mut terms = params.terms().to_vec();
    terms.sort_by(|a, b| b.power.cmp(&a.power));

    let mut out = format!("2^{}", params.power());
    for t in terms {
        let sign = if t.coefficient < 0 { '-' } else { '+' };
        let magnitude = t.coefficient.unsigned_abs();
        let value = match (magnitude, t.power) {
            (m, 0) => m.to_string(),
            (1, p) => format!("2^{p}"),
            (m, p) => format!("{m} * 2^{p}"),
        };
        out.push_str(&format!(" {sign} {value}"));
    }
    out
}

/// Add `-coefficient * source * 2^(-reduce_bits)` into the limbs below the
/// source position. `place(d)` names the limb `d` positions below it.
fn fold(
    buf: &mut CodeBuffer,
    bits_per_limb: u32,
    source: Expr,
    term: &Term,
    reduce_bits: u32,
    place: impl Fn(usize) -> Place,
) {
    let (value, op, temp) = match term.coefficient {
        1 => (source, AssignOp::Sub, None),
        -1 => (source, AssignOp::Add, None),
        c => {
            let temp = buf.get_temp(Expr::mul(Expr::Lit(c), source));
            (temp.expr(), AssignOp::Sub, Some(temp))
        }
    };

    if reduce_bits % bits_per_limb == 0 {
        buf.assign(place((reduce_bits / bits_per_limb) as usize), op, value);
    } else {
        let s = reduce_bits / bits_per_limb;
        let bit_offset = (s + 1) * bits_per_limb - reduce_bits;
        buf.assign(
            place(s as usize + 1),
            op,
            value.clone().shl(bit_offset).mask(),
        );
        buf.assign(place(s as usize), op, value.shr(bits_per_limb - bit_offset));
    }

    if let Some(temp) = temp {
        buf.free_temp(temp);
    }
}

fn carry(buf: &mut CodeBuffer, bits_per_limb: u32, i: usize) {
    let t = buf.get_temp(
        Expr::add(Expr::var(slot(i)), Expr::Const(Constant::CarryAdd)).shr(bits_per_limb),
    );
    buf.assign(Place::var(slot(i)), AssignOp::Sub, t.expr().shl(bits_per_limb));
    buf.assign(Place::var(slot(i + 1)), AssignOp::Add, t.expr());
    buf.free_temp(t);
}

fn reduce_slot(buf: &mut CodeBuffer, params: &FieldParams, i: usize, reused: bool) {
    buf.comment(format!("reduce from position {i}"));
    for term in params.terms() {
        fold(
            buf,
            params.bits_per_limb(),
            Expr::var(slot(i)),
            term,
            params.power() - term.power,
            |d| Place::var(slot(i - d)),
        );
    }
    if reused {
        buf.assign(Place::var(slot(i)), AssignOp::Set, Expr::Lit(0));
    }
}

/// `fn name(r, c0, .., c{width-1})`: run `schedule` over the slots and write
/// the low `n` slots to `r`.
fn carry_reduce(
    buf: &mut CodeBuffer,
    params: &FieldParams,
    name: &str,
    width: usize,
    schedule: &[CarryReduce],
) {
    let slots = sequence::max_slot(schedule).map_or(width, |m| width.max(m + 1));
    buf.begin_carry_reduce(Function::carry_reduce(name, width), slots);

    for overflow in width..slots {
        buf.let_mut(slot(overflow), Expr::Lit(0));
    }

    for (pos, &cr) in schedule.iter().enumerate() {
        buf.track(cr);
        match cr {
            CarryReduce::Carry(i) => carry(buf, params.bits_per_limb(), i),
            CarryReduce::Reduce(i) => {
                let reused = schedule[pos + 1..].iter().any(|later| later.index() == i);
                reduce_slot(buf, params, i, reused);
            }
        }
    }

    for i in 0..params.num_limbs() {
        buf.assign(
            Place::Elem("r".into(), Index::At(i)),
            AssignOp::Set,
            Expr::var(slot(i)),
        );
    }
}

/// `fn reduce_in(limbs, v, i)`: fold `v * 2^(i * bits_per_limb)` into the
/// limbs below position `i`.
fn reduce_in(buf: &mut CodeBuffer, params: &FieldParams) {
    buf.begin(Function::new(
        "reduce_in",
        vec![
            Param::new("limbs", ParamKind::LimbsMut),
            Param::new("v", ParamKind::Scalar),
            Param::new("i", ParamKind::Position),
        ],
        true,
    ));

    for term in params.terms() {
        fold(
            buf,
            params.bits_per_limb(),
            Expr::var("v"),
            term,
            params.power() - term.power,
            |d| Place::Elem("limbs".into(), Index::Below(d)),
        );
    }
}

/// `fn final_carry_reduce_last(limbs)`: move the bits of the top limb at and
/// above `2^power` back down.
fn final_carry_reduce_last(buf: &mut CodeBuffer, params: &FieldParams) {
    buf.begin(Function::new(
        "final_carry_reduce_last",
        vec![Param::new("limbs", ParamKind::LimbsMut)],
        true,
    ));

    let bpl = params.bits_per_limb();
    let n = params.num_limbs();
    let padded = bpl * n as u32;
    let high_bits = bpl - (padded - params.power());
    let top = Place::Elem("limbs".into(), Index::At(n - 1));

    buf.let_mut("c", Expr::elem("limbs", n - 1).shr(high_bits));
    buf.assign(top, AssignOp::Sub, Expr::var("c").shl(high_bits));

    for term in params.terms() {
        fold(
            buf,
            bpl,
            Expr::var("c"),
            term,
            padded - term.power,
            |d| Place::Elem("limbs".into(), Index::At(n - d)),
        );
    }
}

/// `fn mult(a, b, r)`: schoolbook product into `2n - 1` slots.
fn mult(buf: &mut CodeBuffer, params: &FieldParams) {
    buf.begin(Function::new(
        "mult",
        vec![
            Param::new("a", ParamKind::Limbs),
            Param::new("b", ParamKind::Limbs),
            Param::new("r", ParamKind::LimbsMut),
        ],
        true,
    ));

    let n = params.num_limbs();
    for i in 0..2 * n - 1 {
        let lo = i.saturating_sub(n - 1);
        let hi = i.min(n - 1);
        let products = (lo..=hi).map(|j| Expr::mul(Expr::elem("a", j), Expr::elem("b", i - j)));
        if let Some(sum) = Expr::sum(products) {
            buf.let_mut(slot(i), sum);
        }
    }

    buf.push(Stmt::Blank);
    call_carry_reduce(buf, "carry_reduce", "r", 2 * n - 1);
}

/// `fn square(a, r)`: like `mult` with the symmetric products doubled.
fn square(buf: &mut CodeBuffer, params: &FieldParams) {
    buf.begin(Function::new(
        "square",
        vec![
            Param::new("a", ParamKind::Limbs),
            Param::new("r", ParamKind::LimbsMut),
        ],
        true,
    ));

    let n = params.num_limbs();
    for i in 0..2 * n - 1 {
        let lo = i.saturating_sub(n - 1);
        let hi = i.min(n - 1);

        let cross = Expr::sum(
            (lo..=hi)
                .take_while(|&j| j < i - j)
                .map(|j| Expr::mul(Expr::elem("a", j), Expr::elem("a", i - j))),
        )
        .map(|sum| Expr::mul(Expr::Lit(2), sum));
        let diagonal = ((hi - lo) % 2 == 0)
            .then(|| Expr::mul(Expr::elem("a", i / 2), Expr::elem("a", i / 2)));

        if let Some(value) = Expr::sum(cross.into_iter().chain(diagonal)) {
            buf.let_mut(slot(i), value);
        }
    }

    buf.push(Stmt::Blank);
    call_carry_reduce(buf, "carry_reduce", "r", 2 * n - 1);
}

/// `fn reduce(a)`: normalize `a` in place with the small schedule.
fn reduce(buf: &mut CodeBuffer, params: &FieldParams) {
    buf.begin(Function::new(
        "reduce",
        vec![Param::new("a", ParamKind::LimbsMut)],
        true,
    ));

    // `a` is reborrowed mutably by the call, so its limbs are read first
    let n = params.num_limbs();
    for i in 0..n {
        buf.let_mut(slot(i), Expr::elem("a", i));
    }
    buf.push(Stmt::Blank);
    call_carry_reduce(buf, "carry_reduce_small", "a", n);
}

fn call_carry_reduce(buf: &mut CodeBuffer, callee: &str, out: &str, width: usize) {
    buf.push(Stmt::Call {
        callee: callee.into(),
        out: out.into(),
        args: (0..width).map(|i| Expr::var(slot(i))).collect(),
    });
}
