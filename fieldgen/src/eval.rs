//! Direct execution of emitted modules.
//!
//! [`Machine`] runs the routines of an [`ir::Module`](crate::codegen::ir::Module)
//! with the integer semantics of the generated Rust in a debug build: `+`,
//! `*`, `+=` and `-=` fail on overflow, `<<` silently drops high bits, `>>`
//! is arithmetic. This lets emitted arithmetic be checked against a
//! big-integer oracle without compiling it.

use crate::{
    Error, Result,
    codegen::ir::{AssignOp, BinOp, Constant, Expr, Function, Index, Module, ParamKind, Place, Stmt},
};
use std::collections::HashMap;

/// Interpreter for one module.
pub struct Machine<'m> {
    module: &'m Module,
}

impl<'m> Machine<'m> {
    /// Create a new [`Machine`].
    pub fn new(module: &'m Module) -> Self {
        Self { module }
    }

    /// The module being run.
    pub fn module(&self) -> &'m Module {
        self.module
    }

    /// Run routine `name`.
    ///
    /// `arrays` bind to the slice parameters in order, `scalars` to the `i64`
    /// and `usize` parameters in order.
    pub fn call(&self, name: &str, arrays: &mut [&mut [i64]], scalars: &[i64]) -> Result<()> {
        let function = self
            .module
            .function(name)
            .ok_or_else(|| Error::eval(format!("no routine named `{name}`")))?;
        self.run(function, arrays, scalars)
    }

    /// `r = a * b`.
    pub fn mult(&self, a: &[i64], b: &[i64]) -> Result<Vec<i64>> {
        let mut a = a.to_vec();
        let mut b = b.to_vec();
        let mut r = vec![0; self.module.num_limbs];
        self.call("mult", &mut [&mut a[..], &mut b[..], &mut r[..]], &[])?;
        Ok(r)
    }

    /// `r = a * a`.
    pub fn square(&self, a: &[i64]) -> Result<Vec<i64>> {
        let mut a = a.to_vec();
        let mut r = vec![0; self.module.num_limbs];
        self.call("square", &mut [&mut a[..], &mut r[..]], &[])?;
        Ok(r)
    }

    /// Normalize `a` in place.
    pub fn reduce(&self, a: &mut [i64]) -> Result<()> {
        self.call("reduce", &mut [a], &[])
    }

    /// Fold `v` at limb position `i` into `limbs`.
    pub fn reduce_in(&self, limbs: &mut [i64], v: i64, i: usize) -> Result<()> {
        let i = i64::try_from(i).map_err(|_| Error::eval("limb position out of range"))?;
        self.call("reduce_in", &mut [limbs], &[v, i])
    }

    /// Fold the bits of the top limb at and above the modulus back down.
    pub fn final_carry_reduce_last(&self, limbs: &mut [i64]) -> Result<()> {
        self.call("final_carry_reduce_last", &mut [limbs], &[])
    }

    fn run(&self, function: &Function, arrays: &mut [&mut [i64]], scalars: &[i64]) -> Result<()> {
        let mut frame = Frame::bind(self.module, function, arrays, scalars)?;
        for stmt in &function.body {
            self.exec(&mut frame, stmt)
                .map_err(|e| match e {
                    Error::Eval(msg) => Error::eval(format!("{}: {msg}", function.name)),
                    other => other,
                })?;
        }
        Ok(())
    }

    fn exec(&self, frame: &mut Frame<'_, '_, '_>, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Let { name, value } => {
                let value = frame.eval(value)?;
                frame.vars.insert(name.clone(), Some(value));
            }
            Stmt::Declare(name) => {
                frame.vars.insert(name.clone(), None);
            }
            Stmt::Assign { place, op, value } => {
                let value = frame.eval(value)?;
                frame.store(place, *op, value)?;
            }
            Stmt::Call { callee, out, args } => {
                let args = args
                    .iter()
                    .map(|arg| frame.eval(arg))
                    .collect::<Result<Vec<_>>>()?;
                let target = self
                    .module
                    .function(callee)
                    .ok_or_else(|| Error::eval(format!("no routine named `{callee}`")))?;
                let slot = frame.array(out, true)?;
                self.run(target, &mut [&mut *frame.arrays[slot]], &args)?;
            }
            Stmt::Comment(_) | Stmt::Blank => {}
        }
        Ok(())
    }
}

/// Bindings of one routine invocation.
struct Frame<'m, 'f, 'a> {
    module: &'m Module,
    array_names: Vec<(&'m str, bool)>,
    arrays: &'f mut [&'a mut [i64]],
    vars: HashMap<String, Option<i64>>,
    position: Option<(&'m str, usize)>,
}

impl<'m, 'f, 'a> Frame<'m, 'f, 'a> {
    fn bind(
        module: &'m Module,
        function: &'m Function,
        arrays: &'f mut [&'a mut [i64]],
        scalars: &[i64],
    ) -> Result<Self> {
        let mut array_names = Vec::new();
        let mut vars = HashMap::new();
        let mut position = None;
        let mut scalars = scalars.iter().copied();

        for param in &function.params {
            match param.kind {
                ParamKind::Limbs | ParamKind::LimbsMut => {
                    array_names.push((param.name.as_str(), param.kind == ParamKind::LimbsMut));
                }
                ParamKind::Scalar => {
                    let value = scalars.next().ok_or_else(|| arity(function))?;
                    vars.insert(param.name.clone(), Some(value));
                }
                ParamKind::Position => {
                    let value = scalars.next().ok_or_else(|| arity(function))?;
                    let value = usize::try_from(value)
                        .map_err(|_| Error::eval(format!("negative `{}`", param.name)))?;
                    position = Some((param.name.as_str(), value));
                }
            }
        }

        if scalars.next().is_some() || array_names.len() != arrays.len() {
            return Err(arity(function));
        }

        Ok(Self {
            module,
            array_names,
            arrays,
            vars,
            position,
        })
    }

    fn array(&self, name: &str, write: bool) -> Result<usize> {
        let (slot, &(_, mutable)) = self
            .array_names
            .iter()
            .enumerate()
            .find(|(_, (n, _))| *n == name)
            .ok_or_else(|| Error::eval(format!("unknown slice `{name}`")))?;
        if write && !mutable {
            return Err(Error::eval(format!("`{name}` is not mutable")));
        }
        Ok(slot)
    }

    fn index(&self, array: &str, index: Index) -> Result<usize> {
        let i = match index {
            Index::At(i) => Some(i),
            Index::Below(k) => {
                let (_, base) = self
                    .position
                    .ok_or_else(|| Error::eval("relative index without a position"))?;
                base.checked_sub(k)
            }
        };
        i.ok_or_else(|| Error::eval(format!("index `{array}[{index}]` underflows")))
    }

    fn element(&mut self, array: &str, index: Index, write: bool) -> Result<&mut i64> {
        let slot = self.array(array, write)?;
        let i = self.index(array, index)?;
        self.arrays[slot]
            .get_mut(i)
            .ok_or_else(|| Error::eval(format!("index {i} out of range for `{array}`")))
    }

    fn eval(&mut self, e: &Expr) -> Result<i64> {
        Ok(match e {
            Expr::Lit(v) => *v,
            Expr::Const(Constant::CarryAdd) => 1i64 << (self.module.bits_per_limb - 1),
            Expr::Const(Constant::LimbMask) => {
                if !self.module.limb_mask {
                    return Err(Error::eval("LIMB_MASK is not defined"));
                }
                (1i64 << self.module.bits_per_limb) - 1
            }
            Expr::Var(name) => self.read(name)?,
            Expr::Elem(array, index) => *self.element(array, *index, false)?,
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, lhs, rhs)?
            }
        })
    }

    fn read(&self, name: &str) -> Result<i64> {
        if let Some((position, value)) = self.position {
            if position == name {
                return i64::try_from(value).map_err(|_| Error::eval("position out of range"));
            }
        }
        match self.vars.get(name) {
            Some(Some(v)) => Ok(*v),
            Some(None) => Err(Error::eval(format!("`{name}` read before assignment"))),
            None => Err(Error::eval(format!("unknown variable `{name}`"))),
        }
    }

    fn store(&mut self, place: &Place, op: AssignOp, value: i64) -> Result<()> {
        match place {
            Place::Var(name) => {
                let var = self
                    .vars
                    .get_mut(name.as_str())
                    .ok_or_else(|| Error::eval(format!("unknown variable `{name}`")))?;
                *var = Some(update(op, *var, value)?);
            }
            Place::Elem(array, index) => {
                let cell = self.element(array, *index, true)?;
                *cell = update(op, Some(*cell), value)?;
            }
        }
        Ok(())
    }
}

fn update(op: AssignOp, current: Option<i64>, value: i64) -> Result<i64> {
    let initialized =
        || current.ok_or_else(|| Error::eval("compound assignment before initialization"));
    match op {
        AssignOp::Set => Ok(value),
        AssignOp::Add => initialized()?
            .checked_add(value)
            .ok_or_else(|| Error::eval("overflow in `+=`")),
        AssignOp::Sub => initialized()?
            .checked_sub(value)
            .ok_or_else(|| Error::eval("overflow in `-=`")),
    }
}

fn binary(op: BinOp, lhs: i64, rhs: i64) -> Result<i64> {
    let overflow = || Error::eval(format!("overflow in `{lhs} {} {rhs}`", op.symbol()));
    match op {
        BinOp::Add => lhs.checked_add(rhs).ok_or_else(overflow),
        BinOp::Mul => lhs.checked_mul(rhs).ok_or_else(overflow),
        BinOp::Shl | BinOp::Shr => {
            let bits = u32::try_from(rhs)
                .ok()
                .filter(|&b| b < i64::BITS)
                .ok_or_else(overflow)?;
            Ok(if op == BinOp::Shl {
                lhs.wrapping_shl(bits)
            } else {
                lhs >> bits
            })
        }
        BinOp::And => Ok(lhs & rhs),
    }
}

fn arity(function: &Function) -> Error {
    Error::eval(format!("wrong arguments for `{}`", function.name))
}
