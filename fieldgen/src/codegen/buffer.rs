//! Emission state for one generated module.

use super::ir::{AssignOp, Expr, Function, Place, Stmt, slot};
use crate::sequence::CarryReduce;
use std::collections::BTreeSet;

/// Handle to a temporary variable `t<k>`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Temp(usize);

impl Temp {
    pub(crate) fn name(&self) -> String {
        temp_name(self.0)
    }

    pub(crate) fn expr(&self) -> Expr {
        Expr::var(self.name())
    }
}

fn temp_name(k: usize) -> String {
    format!("t{k}")
}

/// Routine under construction plus everything already finished.
///
/// Temporaries come from a LIFO pool: a freed name is handed out again
/// before a new one is minted. Pool and counter are per routine scope, and
/// a routine split off by [`CodeBuffer::track`] stays in the same scope.
pub(crate) struct CodeBuffer {
    done: Vec<Function>,
    current: Option<Function>,

    free: Vec<usize>,
    next_temp: usize,
    declared: BTreeSet<usize>,
    live: usize,
    high_water: usize,

    slots: usize,
    run: Option<(bool, usize)>,
    split_threshold: Option<usize>,
    splits: usize,
}

impl CodeBuffer {
    pub(crate) fn new(split_threshold: Option<usize>) -> Self {
        Self {
            done: Vec::new(),
            current: None,
            free: Vec::new(),
            next_temp: 0,
            declared: BTreeSet::new(),
            live: 0,
            high_water: 0,
            slots: 0,
            run: None,
            split_threshold,
            splits: 0,
        }
    }

    /// Close the current routine, if any, and start `function` in a fresh
    /// scope.
    pub(crate) fn begin(&mut self, function: Function) {
        if let Some(finished) = self.current.replace(function) {
            self.check_pool(&finished);
            self.done.push(finished);
        }

        self.free.clear();
        self.next_temp = 0;
        self.declared.clear();
        self.live = 0;
        self.high_water = 0;
        self.slots = 0;
        self.run = None;
    }

    /// Start a carry/reduce routine whose schedule spans `slots` slots.
    pub(crate) fn begin_carry_reduce(&mut self, function: Function, slots: usize) {
        self.begin(function);
        self.slots = slots;
    }

    pub(crate) fn push(&mut self, stmt: Stmt) {
        debug_assert!(self.current.is_some(), "statement outside a routine: {stmt:?}");
        if let Some(function) = &mut self.current {
            function.body.push(stmt);
        }
    }

    pub(crate) fn let_mut(&mut self, name: impl Into<String>, value: Expr) {
        self.push(Stmt::Let {
            name: name.into(),
            value,
        });
    }

    pub(crate) fn assign(&mut self, place: Place, op: AssignOp, value: Expr) {
        self.push(Stmt::Assign { place, op, value });
    }

    pub(crate) fn comment(&mut self, text: impl Into<String>) {
        self.push(Stmt::Comment(text.into()));
    }

    /// Bind `value` to a temporary, reusing a free name when there is one.
    pub(crate) fn get_temp(&mut self, value: Expr) -> Temp {
        let k = match self.free.pop() {
            Some(k) => {
                self.assign(Place::var(temp_name(k)), AssignOp::Set, value);
                k
            }
            None => {
                let k = self.next_temp;
                self.next_temp += 1;
                self.let_mut(temp_name(k), value);
                self.declared.insert(k);
                k
            }
        };
        self.live += 1;
        self.high_water = self.high_water.max(self.live);
        Temp(k)
    }

    pub(crate) fn free_temp(&mut self, temp: Temp) {
        debug_assert!(self.live > 0);
        self.live -= 1;
        self.free.push(temp.0);
    }

    /// Record the next schedule step, splitting the routine when a long run
    /// of same-kind steps ends.
    pub(crate) fn track(&mut self, cr: CarryReduce) {
        let kind = cr.is_carry();
        self.run = match self.run {
            Some((last, len)) if last == kind => Some((kind, len + 1)),
            Some((_, len)) => {
                if self.split_threshold.is_some_and(|limit| len > limit) {
                    self.insert_cr_method_break();
                }
                Some((kind, 1))
            }
            None => Some((kind, 1)),
        };
    }

    /// End the current routine with a tail call to a fresh helper taking
    /// every slot, and continue emitting into that helper.
    fn insert_cr_method_break(&mut self) {
        let name = format!("carry_reduce{}", self.splits);
        self.splits += 1;

        let args = (0..self.slots).map(|i| Expr::var(slot(i))).collect();
        self.push(Stmt::Call {
            callee: name.clone(),
            out: "r".into(),
            args,
        });

        let next = Function::carry_reduce(name, self.slots);
        if let Some(finished) = self.current.replace(next) {
            self.check_pool(&finished);
            self.done.push(finished);
        }

        let mut known = self.free.clone();
        known.sort_unstable();
        self.declared.clear();
        for k in known {
            self.push(Stmt::Declare(temp_name(k)));
            self.declared.insert(k);
        }
    }

    /// Every temporary is released before its routine closes, and a routine
    /// never declares more names than were live at once in its scope.
    fn check_pool(&self, function: &Function) {
        debug_assert_eq!(self.live, 0, "{}: temporaries still live", function.name);
        debug_assert!(
            self.declared.len() <= self.high_water,
            "{}: {} temporaries declared, at most {} live",
            function.name,
            self.declared.len(),
            self.high_water
        );
    }

    /// Temporaries currently handed out.
    #[cfg(test)]
    pub(crate) fn live_temps(&self) -> usize {
        self.live
    }

    /// Most temporaries live at once in this scope.
    #[cfg(test)]
    pub(crate) fn high_water(&self) -> usize {
        self.high_water
    }

    /// Temporaries declared by the routine under construction.
    #[cfg(test)]
    pub(crate) fn declared_temps(&self) -> usize {
        self.declared.len()
    }

    /// Helpers split off so far.
    pub(crate) fn splits(&self) -> usize {
        self.splits
    }

    pub(crate) fn finish(mut self) -> Vec<Function> {
        if let Some(last) = self.current.take() {
            self.check_pool(&last);
            self.done.push(last);
        }
        self.done
    }
}
