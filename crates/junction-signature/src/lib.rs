//! Call signature algebra for the junction method-handle engine.
//!
//! - [`Type`] / [`PrimitiveKind`] / [`ClassName`]: the closed type universe
//! - [`SignatureType`]: immutable `(params)return` values with derivation operations
//! - JVM-style descriptor parsing and formatting
//! - [`ClassHierarchy`]: the subtype oracle conversions are checked against
//! - [`conversion`]: implicit (`asType`) and explicit (cast) conversion rules
#![forbid(unsafe_code)]

pub mod conversion;
mod descriptor;
mod error;
mod hierarchy;
mod signature;
mod types;

pub use crate::conversion::{
    classify, is_convertible, plan_signature, Conversion, SignaturePlan, UnboxSource,
};
pub use crate::descriptor::{
    field_descriptor, method_descriptor, parse_field_descriptor, parse_method_descriptor,
    MAX_ARRAY_DIMENSIONS,
};
pub use crate::error::{Result, SignatureError};
pub use crate::hierarchy::{
    ClassHierarchy, ClassInfo, ClassTable, ACC_ABSTRACT, ACC_FINAL, ACC_INTERFACE, ACC_PRIVATE,
    ACC_PROTECTED, ACC_PUBLIC, ACC_STATIC, ACC_VARARGS, ACC_VOLATILE,
};
pub use crate::signature::{SignatureType, MAX_PARAMETER_SLOTS};
pub use crate::types::{well_known, ClassName, PrimitiveKind, Type};
