//! Typed, composable call targets.
//!
//! A [`Lookup`] turns symbolic references into [`CallTarget`]s through the host's
//! [`Resolver`] and [`AccessChecker`]. Targets are adapted with the free functions in this
//! crate (`filter_return_value`, `permute_arguments`, `guard_with_test`, ...) and with
//! [`CallTarget::as_type`], and invoked through dispatch stubs shared per canonical
//! signature in the runtime's [`ThunkCache`]. [`CallSite`] binds a fixed signature to a
//! replaceable target.

#![forbid(unsafe_code)]

pub mod access;
mod callsite;
mod error;
mod handle;
mod lookup;
mod machine;
mod object;
mod resolve;
mod runtime;
pub mod thunk;
mod value;

pub use crate::access::{AccessChecker, PermitAll};
pub use crate::callsite::{CallSite, CallSitePolicy};
pub use crate::error::{InvokeError, LinkError, Result};
pub use crate::handle::{
    array_element_getter, array_element_setter, array_length, catch_exception, constant,
    drop_arguments, exact_invoker, explicit_cast_arguments, filter_arguments,
    filter_return_value, fold_arguments, guard_with_test, identity, insert_arguments, invoker,
    permute_arguments, throw_exception, zero, CallTarget, TargetKind,
};
pub use crate::lookup::{Lookup, CONSTRUCTOR_NAME};
pub use crate::machine::{CodeAddress, Machine, MemberSlot};
pub use crate::object::{FieldCell, ObjRef};
pub use crate::resolve::{CallingContext, FieldIdentity, MethodIdentity, MethodKind, Resolver};
pub use crate::runtime::Runtime;
pub use crate::thunk::{Interpreter, Thunk, ThunkCache, ThunkCacheStats, ThunkCompiler, ThunkKey};
pub use crate::value::Value;
