#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod codegen;
pub mod driver;
pub mod eval;
pub mod params;
pub mod sequence;

mod error;

pub use crate::{
    codegen::{Options, emit_module, generate},
    error::{Error, Result},
    params::{FIELDS, FieldDescriptor, FieldParams, Term},
    sequence::CarryReduce,
};
pub use num_bigint::BigInt;
