//! Rust source output.

use super::ir::{BinOp, Expr, Function, Module, ParamKind, Place, Stmt};

const INDENT: &str = "    ";

/// Lines longer than this have their argument lists broken one per line.
const MAX_WIDTH: usize = 100;

/// Lints the generated arithmetic trips by construction.
const ALLOWED_LINTS: &[&str] = &[
    "clippy::too_many_arguments",
    "clippy::identity_op",
    "unused_mut",
    "unused_assignments",
    "unused_variables",
];

/// Render `module` as the text of one `.rs` file.
pub fn render(module: &Module) -> String {
    let mut out = Printer::default();

    if !module.header.is_empty() {
        out.raw(&module.header);
        if !module.header.ends_with('\n') {
            out.raw("\n");
        }
    }

    out.line(&format!(
        "//! Arithmetic modulo `{}` over {} signed {}-bit limbs.",
        module.modulus_expr, module.num_limbs, module.bits_per_limb
    ));
    out.line("//!");
    out.line("//! This file is generated by `fieldgen`. Do not edit.");
    out.blank();

    out.line("#![allow(");
    for lint in ALLOWED_LINTS {
        out.line(&format!("{INDENT}{lint},"));
    }
    out.line(")]");
    out.blank();

    out.line(&format!("use {}::{};", module.base_path, module.base_trait));
    out.line("use num_bigint::BigInt;");
    out.line("use std::sync::LazyLock;");
    out.blank();

    out.line(&format!("/// Integers modulo `{}`.", module.modulus_expr));
    out.line(&format!("pub struct {};", module.name));
    out.blank();

    constants(&mut out, module);
    evaluate_modulus(&mut out, module);

    out.line(&format!("impl {} {{", module.name));
    out.indent += 1;
    functions(&mut out, module, false);
    out.indent -= 1;
    out.line("}");
    out.blank();

    out.line(&format!("impl {} for {} {{", module.base_trait, module.name));
    out.indent += 1;
    out.line("const BITS_PER_LIMB: u32 = BITS_PER_LIMB;");
    out.line("const NUM_LIMBS: usize = NUM_LIMBS;");
    out.line("const MAX_ADDS: u32 = MAX_ADDS;");
    out.blank();
    out.line("fn modulus() -> &'static BigInt {");
    out.line(&format!("{INDENT}&MODULUS"));
    out.line("}");
    out.blank();
    functions(&mut out, module, true);
    out.indent -= 1;
    out.line("}");

    out.text
}

fn constants(out: &mut Printer, module: &Module) {
    out.line(&format!("const BITS_PER_LIMB: u32 = {};", module.bits_per_limb));
    out.line(&format!("const NUM_LIMBS: usize = {};", module.num_limbs));
    out.line(&format!("const MAX_ADDS: u32 = {};", module.max_adds));
    out.line("const CARRY_ADD: i64 = 1 << (BITS_PER_LIMB - 1);");
    if module.limb_mask {
        out.line("const LIMB_MASK: i64 = (1 << BITS_PER_LIMB) - 1;");
    }
    out.blank();

    out.line("/// The modulus.");
    out.line("pub static MODULUS: LazyLock<BigInt> = LazyLock::new(evaluate_modulus);");
    out.blank();
}

fn evaluate_modulus(out: &mut Printer, module: &Module) {
    let terms = module
        .terms
        .iter()
        .map(|(power, coefficient)| format!("({power}, {coefficient})"))
        .collect::<Vec<_>>()
        .join(", ");
    out.line(&format!("// terms: {terms}"));

    out.line("fn evaluate_modulus() -> BigInt {");
    out.indent += 1;
    out.line(&format!("let mut result = BigInt::from(1u64) << {};", module.power));
    for &(power, coefficient) in &module.terms {
        let op = if coefficient < 0 { "-=" } else { "+=" };
        let magnitude = coefficient.unsigned_abs();
        if power == 0 {
            out.line(&format!("result {op} BigInt::from({magnitude}u64);"));
        } else {
            out.line(&format!("result {op} BigInt::from({magnitude}u64) << {power};"));
        }
    }
    out.line("result");
    out.indent -= 1;
    out.line("}");
    out.blank();
}

fn functions(out: &mut Printer, module: &Module, trait_methods: bool) {
    let mut first = true;
    for function in module
        .functions
        .iter()
        .filter(|f| f.is_trait_method == trait_methods)
    {
        if !first {
            out.blank();
        }
        first = false;
        function_item(out, function);
    }
}

fn function_item(out: &mut Printer, function: &Function) {
    let params: Vec<_> = function
        .params
        .iter()
        .map(|p| match p.kind {
            ParamKind::Limbs => format!("{}: &[i64]", p.name),
            ParamKind::LimbsMut => format!("{}: &mut [i64]", p.name),
            ParamKind::Scalar => format!("mut {}: i64", p.name),
            ParamKind::Position => format!("{}: usize", p.name),
        })
        .collect();
    out.list(&format!("fn {}(", function.name), &params, ") {");

    out.indent += 1;
    for stmt in &function.body {
        statement(out, stmt);
    }
    out.indent -= 1;
    out.line("}");
}

fn statement(out: &mut Printer, stmt: &Stmt) {
    match stmt {
        Stmt::Let { name, value } => out.line(&format!("let mut {name} = {};", expr(value))),
        Stmt::Declare(name) => out.line(&format!("let mut {name}: i64;")),
        Stmt::Assign { place, op, value } => {
            let place = match place {
                Place::Var(name) => name.clone(),
                Place::Elem(array, index) => format!("{array}[{index}]"),
            };
            out.line(&format!("{place} {} {};", op.symbol(), expr(value)));
        }
        Stmt::Call { callee, out: target, args } => {
            let mut items = vec![target.clone()];
            items.extend(args.iter().map(expr));
            out.list(&format!("Self::{callee}("), &items, ");");
        }
        Stmt::Comment(text) => out.line(&format!("// {text}")),
        Stmt::Blank => out.blank(),
    }
}

/// Render an expression with the parentheses Rust needs, plus a few it
/// doesn't for readability: only products inside sums and left-nested
/// chains of one operator are left bare.
pub fn expr(e: &Expr) -> String {
    match e {
        Expr::Lit(v) => v.to_string(),
        Expr::Const(c) => c.name().into(),
        Expr::Var(name) => name.clone(),
        Expr::Elem(array, index) => format!("{array}[{index}]"),
        Expr::Binary(op, lhs, rhs) => format!(
            "{} {} {}",
            operand(*op, lhs, false),
            op.symbol(),
            operand(*op, rhs, true)
        ),
    }
}

fn operand(parent: BinOp, child: &Expr, right: bool) -> String {
    let bare = match child {
        Expr::Binary(op, ..) => {
            (*op == parent && !right) || (*op == BinOp::Mul && parent == BinOp::Add)
        }
        Expr::Lit(v) => !(right && *v < 0),
        _ => true,
    };
    if bare {
        expr(child)
    } else {
        format!("({})", expr(child))
    }
}

#[derive(Default)]
struct Printer {
    text: String,
    indent: usize,
}

impl Printer {
    fn raw(&mut self, s: &str) {
        self.text.push_str(s);
    }

    fn line(&mut self, s: &str) {
        for _ in 0..self.indent {
            self.text.push_str(INDENT);
        }
        self.text.push_str(s);
        self.text.push('\n');
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }

    /// `open item, item, .. close`, broken one item per line when too wide.
    fn list(&mut self, open: &str, items: &[String], close: &str) {
        let single = format!("{open}{}{close}", items.join(", "));
        if self.indent * INDENT.len() + single.len() <= MAX_WIDTH {
            self.line(&single);
            return;
        }

        self.line(open);
        self.indent += 1;
        for item in items {
            self.text.push_str(&INDENT.repeat(self.indent));
            self.text.push_str(item);
            self.text.push_str(",\n");
        }
        self.indent -= 1;
        self.line(close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codegen::{
            Options, emit_module, generate,
            ir::{AssignOp, Constant, Index},
        },
        params::{CURVE448, CURVE25519, FIELDS, FieldParams, P521_ORDER},
    };

    fn source(desc: &crate::params::FieldDescriptor) -> String {
        generate(&FieldParams::from_descriptor(desc).unwrap(), &Options::default())
    }

    #[test]
    fn expression_parentheses() {
        let carry = Expr::add(Expr::var("c3"), Expr::Const(Constant::CarryAdd)).shr(26);
        assert_eq!(expr(&carry), "(c3 + CARRY_ADD) >> 26");

        let products = Expr::sum([
            Expr::mul(Expr::elem("a", 0), Expr::elem("b", 1)),
            Expr::mul(Expr::elem("a", 1), Expr::elem("b", 0)),
        ])
        .unwrap();
        assert_eq!(expr(&products), "a[0] * b[1] + a[1] * b[0]");

        let doubled = Expr::mul(
            Expr::Lit(2),
            Expr::mul(Expr::elem("a", 0), Expr::elem("a", 1)),
        );
        assert_eq!(expr(&doubled), "2 * (a[0] * a[1])");

        let split = Expr::var("t0").shl(5).mask();
        assert_eq!(expr(&split), "(t0 << 5) & LIMB_MASK");

        assert_eq!(expr(&Expr::mul(Expr::Lit(-19), Expr::var("v"))), "-19 * v");
    }

    #[test]
    fn curve25519_layout() {
        let header = "// Copyright header\n";
        let options = Options {
            header: header.into(),
            ..Options::default()
        };
        let params = FieldParams::from_descriptor(&CURVE25519).unwrap();
        let text = generate(&params, &options);

        assert!(text.starts_with(header));
        assert!(text.contains("//! Arithmetic modulo `2^255 - 19` over 10 signed 26-bit limbs."));
        assert!(text.contains("use super::IntegerPolynomial;"));
        assert!(text.contains("pub struct IntegerPolynomial25519;"));
        assert!(text.contains("const BITS_PER_LIMB: u32 = 26;"));
        assert!(text.contains("const NUM_LIMBS: usize = 10;"));
        assert!(text.contains("const MAX_ADDS: u32 = 1;"));
        assert!(text.contains("const LIMB_MASK: i64 = (1 << BITS_PER_LIMB) - 1;"));
        assert!(text.contains("// terms: (0, -19)"));
        assert!(text.contains("result -= BigInt::from(19u64);"));
        assert!(text.contains("impl IntegerPolynomial for IntegerPolynomial25519 {"));
        assert!(text.contains("fn reduce_in(limbs: &mut [i64], mut v: i64, i: usize) {"));
        assert!(text.contains("let mut t0 = -19 * v;"));
        assert!(text.contains("limbs[i - 10] -= (t0 << 5) & LIMB_MASK;"));
        assert!(text.contains("limbs[i - 9] -= t0 >> 21;"));
        assert!(text.contains("fn mult(a: &[i64], b: &[i64], r: &mut [i64]) {"));
        assert!(text.contains("// reduce from position 18"));
        assert!(text.contains("fn square(a: &[i64], r: &mut [i64]) {"));

        let trait_impl = text.find("impl IntegerPolynomial for").unwrap();
        let helper = text.find("fn carry_reduce(").unwrap();
        assert!(helper < trait_impl);
    }

    #[test]
    fn aligned_field_has_no_mask() {
        let text = source(&CURVE448);
        assert!(!text.contains("LIMB_MASK"));
        assert!(text.contains("// terms: (224, -1), (0, -1)"));
        assert!(text.contains("result -= BigInt::from(1u64) << 224;"));
    }

    #[test]
    fn split_helpers_are_inherent() {
        let text = source(&P521_ORDER);
        let trait_impl = text.find("impl IntegerPolynomial for").unwrap();
        let helper = text.find("fn carry_reduce0(").unwrap();
        assert!(helper < trait_impl);
        assert!(text.contains("Self::carry_reduce0("));
        assert!(text.contains("let mut t0: i64;"));
    }

    #[test]
    fn wide_calls_break_per_argument() {
        let params = FieldParams::from_descriptor(&CURVE25519).unwrap();
        let module = emit_module(&params, &Options::default());
        let text = render(&module);
        assert!(text.contains("        Self::carry_reduce(\n            r,\n            c0,\n"));
        for line in text.lines() {
            assert!(!line.ends_with(' '), "trailing whitespace: {line:?}");
        }
    }

    /// Reads rendered statements back with Rust's operator precedence.
    struct Reader {
        tokens: Vec<String>,
        pos: usize,
    }

    impl Reader {
        fn new(text: &str) -> Self {
            let chars: Vec<char> = text.chars().collect();
            let word = |c: char| c.is_ascii_alphanumeric() || c == '_';
            let mut tokens = Vec::new();
            let mut i = 0;
            while i < chars.len() {
                let c = chars[i];
                if c.is_whitespace() {
                    i += 1;
                    continue;
                }
                let start = i;
                if word(c) {
                    while i < chars.len() && word(chars[i]) {
                        i += 1;
                    }
                } else {
                    let pair: String = chars[i..chars.len().min(i + 2)].iter().collect();
                    let joined = ["<<", ">>", "+=", "-=", "::"].contains(&pair.as_str());
                    i += if joined { 2 } else { 1 };
                }
                tokens.push(chars[start..i].iter().collect());
            }
            Self { tokens, pos: 0 }
        }

        fn peek(&self) -> Option<&str> {
            self.tokens.get(self.pos).map(String::as_str)
        }

        fn next(&mut self) -> String {
            let token = self.tokens[self.pos].clone();
            self.pos += 1;
            token
        }

        fn expect(&mut self, token: &str) {
            assert_eq!(self.next(), token, "in {:?}", self.tokens);
        }

        fn eat(&mut self, token: &str) -> bool {
            let found = self.peek() == Some(token);
            if found {
                self.pos += 1;
            }
            found
        }

        fn statement(&mut self) -> Stmt {
            let stmt = if self.eat("let") {
                self.expect("mut");
                let name = self.next();
                if self.eat(":") {
                    self.expect("i64");
                    Stmt::Declare(name)
                } else {
                    self.expect("=");
                    Stmt::Let { name, value: self.expr() }
                }
            } else if self.eat("Self") {
                self.expect("::");
                let callee = self.next();
                self.expect("(");
                let out = self.next();
                let mut args = Vec::new();
                while self.eat(",") {
                    if self.peek() == Some(")") {
                        break;
                    }
                    args.push(self.expr());
                }
                self.expect(")");
                Stmt::Call { callee, out, args }
            } else {
                let name = self.next();
                let place = match self.index() {
                    Some(index) => Place::Elem(name, index),
                    None => Place::Var(name),
                };
                let op = match self.next().as_str() {
                    "=" => AssignOp::Set,
                    "+=" => AssignOp::Add,
                    "-=" => AssignOp::Sub,
                    other => panic!("unexpected operator {other}"),
                };
                Stmt::Assign { place, op, value: self.expr() }
            };
            self.expect(";");
            assert_eq!(self.peek(), None, "trailing tokens in {:?}", self.tokens);
            stmt
        }

        fn index(&mut self) -> Option<Index> {
            if !self.eat("[") {
                return None;
            }
            let first = self.next();
            let index = if first == "i" {
                let below = if self.eat("-") { self.next().parse().unwrap() } else { 0 };
                Index::Below(below)
            } else {
                Index::At(first.parse().unwrap())
            };
            self.expect("]");
            Some(index)
        }

        fn expr(&mut self) -> Expr {
            self.level(0)
        }

        /// Binary levels from loosest to tightest.
        fn level(&mut self, depth: usize) -> Expr {
            const LEVELS: [&[(&str, BinOp)]; 4] = [
                &[("&", BinOp::And)],
                &[("<<", BinOp::Shl), (">>", BinOp::Shr)],
                &[("+", BinOp::Add)],
                &[("*", BinOp::Mul)],
            ];
            if depth == LEVELS.len() {
                return self.primary();
            }
            let mut lhs = self.level(depth + 1);
            let op_at = |reader: &Self| {
                let token = reader.peek()?;
                LEVELS[depth].iter().find(|(t, _)| *t == token).map(|&(_, op)| op)
            };
            while let Some(op) = op_at(self) {
                self.pos += 1;
                lhs = Expr::binary(op, lhs, self.level(depth + 1));
            }
            lhs
        }

        fn primary(&mut self) -> Expr {
            let token = self.next();
            match token.as_str() {
                "(" => {
                    let inner = self.expr();
                    self.expect(")");
                    inner
                }
                "-" => Expr::Lit(-self.next().parse::<i64>().unwrap()),
                "CARRY_ADD" => Expr::Const(Constant::CarryAdd),
                "LIMB_MASK" => Expr::Const(Constant::LimbMask),
                t if t.starts_with(|c: char| c.is_ascii_digit()) => Expr::Lit(t.parse().unwrap()),
                _ => match self.index() {
                    Some(index) => Expr::Elem(token, index),
                    None => Expr::Var(token),
                },
            }
        }
    }

    fn reread(stmt: &Stmt) -> Stmt {
        let mut out = Printer::default();
        statement(&mut out, stmt);
        let text = out.text.trim();
        if text.is_empty() {
            Stmt::Blank
        } else if let Some(comment) = text.strip_prefix("// ") {
            Stmt::Comment(comment.into())
        } else {
            Reader::new(text).statement()
        }
    }

    #[test]
    fn rendered_statements_read_back_unchanged() {
        for desc in FIELDS {
            let params = FieldParams::from_descriptor(desc).unwrap();
            for threshold in [None, Some(8)] {
                let options = Options { split_threshold: threshold, ..Options::default() };
                let module = emit_module(&params, &options);
                for function in &module.functions {
                    for stmt in &function.body {
                        assert_eq!(reread(stmt), *stmt, "{}::{}", desc.name, function.name);
                    }
                }
            }
        }
    }

    #[test]
    fn reader_applies_rust_precedence() {
        let read = |text: &str| Reader::new(text).expr();
        assert_eq!(
            read("(t0 << 5) & LIMB_MASK"),
            Expr::var("t0").shl(5).mask()
        );
        // `+` binds tighter than `>>`
        assert_eq!(
            read("c3 + CARRY_ADD >> 26"),
            Expr::add(Expr::var("c3"), Expr::Const(Constant::CarryAdd)).shr(26)
        );
        assert_eq!(read("-19 * v"), Expr::mul(Expr::Lit(-19), Expr::var("v")));
        assert_ne!(
            read("2 * a[0] * a[1]"),
            Expr::mul(Expr::Lit(2), Expr::mul(Expr::elem("a", 0), Expr::elem("a", 1)))
        );
    }
}
