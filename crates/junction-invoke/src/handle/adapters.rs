//! Adapter construction.
//!
//! Every function validates its inputs against the signatures involved and fails with a
//! [`LinkError`] before any node is built; nothing here is deferred to invocation except
//! checks that depend on runtime values.

use std::sync::Arc;

use junction_signature::{
    plan_signature, well_known, ClassName, SignatureError, SignatureType, Type,
};

use super::{convert, CallTarget, Form};
use crate::error::{LinkError, Result};
use crate::runtime::Runtime;
use crate::thunk::ThunkExtra;
use crate::value::Value;

/// Calls `target`, then `filter` with its result (or with nothing when `target` returns
/// `void`).
pub fn filter_return_value(target: &CallTarget, filter: &CallTarget) -> Result<CallTarget> {
    let ret = target.signature().return_type();
    let expected: &[Type] = if ret.is_void() {
        &[]
    } else {
        std::slice::from_ref(ret)
    };
    let params = filter.signature().parameters();
    if params != expected {
        let to = params.first().cloned().unwrap_or(Type::VOID);
        return Err(SignatureError::mismatch(None, ret, &to).into());
    }
    let signature = target
        .signature()
        .change_return_type(filter.signature().return_type().clone());
    CallTarget::build(
        target.runtime(),
        signature,
        Form::FilterReturn {
            target: target.clone(),
            filter: filter.clone(),
        },
    )
}

/// Pre-processes arguments `pos..pos + filters.len()` with unary filters; `None` leaves
/// the argument alone.
pub fn filter_arguments(
    target: &CallTarget,
    pos: usize,
    filters: &[Option<CallTarget>],
) -> Result<CallTarget> {
    let count = target.signature().parameter_count();
    if pos + filters.len() > count {
        return Err(LinkError::IllegalArgument(format!(
            "{} filters at position {pos} exceed {count} parameters",
            filters.len()
        )));
    }
    let mut signature = target.signature().clone();
    for (offset, filter) in filters.iter().enumerate() {
        let Some(filter) = filter else {
            continue;
        };
        let index = pos + offset;
        let param = &target.signature().parameters()[index];
        let filter_sig = filter.signature();
        if filter_sig.parameter_count() != 1 {
            return Err(SignatureError::Arity {
                expected: 1,
                found: filter_sig.parameter_count(),
            }
            .into());
        }
        if filter_sig.return_type() != param {
            return Err(
                SignatureError::mismatch(Some(index), filter_sig.return_type(), param).into(),
            );
        }
        signature = signature.change_parameter_type(index, filter_sig.parameters()[0].clone())?;
    }
    if filters.iter().all(Option::is_none) {
        return Ok(target.clone());
    }
    CallTarget::build(
        target.runtime(),
        signature,
        Form::FilterArguments {
            target: target.clone(),
            pos,
            filters: filters.to_vec(),
        },
    )
}

/// Adapts `target` to `new_type`, where target argument `i` is incoming argument
/// `reorder[i]`. Indices may repeat (duplicating an argument) or be skipped (dropping one).
pub fn permute_arguments(
    target: &CallTarget,
    new_type: &SignatureType,
    reorder: &[usize],
) -> Result<CallTarget> {
    let old = target.signature();
    if reorder.len() != old.parameter_count() {
        return Err(LinkError::IllegalArgument(format!(
            "reorder list has {} entries for {} target parameters",
            reorder.len(),
            old.parameter_count()
        )));
    }
    if new_type.return_type() != old.return_type() {
        return Err(
            SignatureError::mismatch(None, old.return_type(), new_type.return_type()).into(),
        );
    }
    for (index, &source) in reorder.iter().enumerate() {
        let Some(from) = new_type.parameter_type(source) else {
            return Err(LinkError::IllegalArgument(format!(
                "reorder index {source} is out of range for {new_type}"
            )));
        };
        let to = &old.parameters()[index];
        if from != to {
            return Err(SignatureError::mismatch(Some(index), from, to).into());
        }
    }
    CallTarget::build(
        target.runtime(),
        new_type.clone(),
        Form::Permute {
            target: target.clone(),
            reorder: reorder.to_vec(),
        },
    )
}

/// Fixes arguments `pos..pos + values.len()` to constants, converted with the implicit
/// rules.
pub fn insert_arguments(target: &CallTarget, pos: usize, values: Vec<Value>) -> Result<CallTarget> {
    let count = target.signature().parameter_count();
    if pos + values.len() > count {
        return Err(LinkError::IllegalArgument(format!(
            "{} values at position {pos} exceed {count} parameters",
            values.len()
        )));
    }
    if values.is_empty() {
        return Ok(target.clone());
    }
    let hierarchy = target.hierarchy();
    let converted = values
        .into_iter()
        .enumerate()
        .map(|(offset, value)| {
            let ty = &target.signature().parameters()[pos + offset];
            let description = value.describe_type();
            convert::convert_constant(hierarchy, value, ty).ok_or_else(|| {
                LinkError::IllegalArgument(format!(
                    "cannot insert {description} as parameter {} of type {ty}",
                    pos + offset
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let signature = target
        .signature()
        .drop_parameter_types(pos, pos + converted.len())?;
    CallTarget::build(
        target.runtime(),
        signature,
        Form::Insert {
            target: target.clone(),
            pos,
            values: converted,
        },
    )
}

/// Accepts extra arguments of `types` at `pos` and ignores them.
pub fn drop_arguments(target: &CallTarget, pos: usize, types: &[Type]) -> Result<CallTarget> {
    if types.is_empty() {
        return Ok(target.clone());
    }
    let signature = target.signature().insert_parameter_types(pos, types)?;
    CallTarget::build(
        target.runtime(),
        signature,
        Form::Drop {
            target: target.clone(),
            pos,
            count: types.len(),
        },
    )
}

/// Runs `combiner` on a prefix of the arguments and, unless it returns `void`, passes its
/// result to `target` ahead of the original arguments.
pub fn fold_arguments(target: &CallTarget, combiner: &CallTarget) -> Result<CallTarget> {
    let folded = combiner.signature().return_type();
    let signature = if folded.is_void() {
        target.signature().clone()
    } else {
        match target.signature().parameter_type(0) {
            Some(first) if first == folded => {}
            Some(first) => return Err(SignatureError::mismatch(Some(0), folded, first).into()),
            None => {
                return Err(SignatureError::Arity {
                    expected: 1,
                    found: 0,
                }
                .into())
            }
        }
        target.signature().drop_parameter_types(0, 1)?
    };
    check_prefix(combiner.signature(), &signature)?;
    CallTarget::build(
        target.runtime(),
        signature,
        Form::Fold {
            target: target.clone(),
            combiner: combiner.clone(),
        },
    )
}

/// `if test(prefix) { then(args) } else { otherwise(args) }`.
pub fn guard_with_test(
    test: &CallTarget,
    then: &CallTarget,
    otherwise: &CallTarget,
) -> Result<CallTarget> {
    if then.signature() != otherwise.signature() {
        return Err(LinkError::IllegalArgument(format!(
            "branch signatures differ: {} and {}",
            then.signature(),
            otherwise.signature()
        )));
    }
    if test.signature().return_type() != &Type::BOOLEAN {
        return Err(
            SignatureError::mismatch(None, test.signature().return_type(), &Type::BOOLEAN).into(),
        );
    }
    check_prefix(test.signature(), then.signature())?;
    CallTarget::build(
        then.runtime(),
        then.signature().clone(),
        Form::Guard {
            test: test.clone(),
            then: then.clone(),
            otherwise: otherwise.clone(),
        },
    )
}

/// Invokes `target`; errors that are instances of `kind` are handed to `handler` together
/// with a prefix of the original arguments. Every other error propagates unchanged.
pub fn catch_exception(
    target: &CallTarget,
    kind: &ClassName,
    handler: &CallTarget,
) -> Result<CallTarget> {
    if !target.hierarchy().is_throwable(kind) {
        return Err(LinkError::IllegalArgument(format!("{kind} is not a throwable type")));
    }
    let handler_sig = handler.signature();
    let caught = Type::Class(kind.clone());
    match handler_sig.parameter_type(0) {
        Some(first) if *first == caught => {}
        Some(first) => return Err(SignatureError::mismatch(Some(0), first, &caught).into()),
        None => {
            return Err(SignatureError::Arity {
                expected: 1,
                found: 0,
            }
            .into())
        }
    }
    if handler_sig.return_type() != target.signature().return_type() {
        return Err(SignatureError::mismatch(
            None,
            handler_sig.return_type(),
            target.signature().return_type(),
        )
        .into());
    }
    check_prefix(&handler_sig.drop_parameter_types(0, 1)?, target.signature())?;
    CallTarget::build(
        target.runtime(),
        target.signature().clone(),
        Form::Catch {
            target: target.clone(),
            kind: kind.clone(),
            handler: handler.clone(),
        },
    )
}

/// Adapts `target` to `new_type` with the explicit conversion rules: narrowing primitive
/// conversions, checked reference casts, boxing followed by a cast and unchecked
/// interface casts.
pub fn explicit_cast_arguments(
    target: &CallTarget,
    new_type: &SignatureType,
) -> Result<CallTarget> {
    if target.signature() == new_type {
        return Ok(target.clone());
    }
    let plan = plan_signature(target.hierarchy(), new_type, target.signature(), true)?;
    target.convert(new_type, plan)
}

/// `() -> ty` returning `value`, converted to `ty` with the implicit rules.
pub fn constant(runtime: &Arc<Runtime>, ty: &Type, value: Value) -> Result<CallTarget> {
    if ty.is_void() {
        return Err(LinkError::IllegalArgument("constant of type void".to_string()));
    }
    let description = value.describe_type();
    let value = convert::convert_constant(runtime.hierarchy(), value, ty).ok_or_else(|| {
        LinkError::IllegalArgument(format!("{description} is not a constant of type {ty}"))
    })?;
    CallTarget::build(runtime, SignatureType::new(ty.clone(), Vec::new())?, Form::Constant(value))
}

/// `(ty) -> ty`.
pub fn identity(runtime: &Arc<Runtime>, ty: &Type) -> Result<CallTarget> {
    if ty.is_void() {
        return Err(LinkError::IllegalArgument("identity of type void".to_string()));
    }
    CallTarget::build(runtime, SignatureType::new(ty.clone(), vec![ty.clone()])?, Form::Identity)
}

/// `() -> ty` returning the zero value; `() -> void` does nothing.
pub fn zero(runtime: &Arc<Runtime>, ty: &Type) -> Result<CallTarget> {
    CallTarget::build(
        runtime,
        SignatureType::new(ty.clone(), Vec::new())?,
        Form::Constant(Value::zero(ty)),
    )
}

/// `(exception) -> ret` throwing its argument.
pub fn throw_exception(
    runtime: &Arc<Runtime>,
    ret: &Type,
    exception: &ClassName,
) -> Result<CallTarget> {
    if !runtime.hierarchy().is_throwable(exception) {
        return Err(LinkError::IllegalArgument(format!("{exception} is not a throwable type")));
    }
    let signature = SignatureType::new(ret.clone(), vec![Type::Class(exception.clone())])?;
    CallTarget::build(runtime, signature, Form::Throw)
}

/// `(T[], int) -> T`.
pub fn array_element_getter(runtime: &Arc<Runtime>, array_type: &Type) -> Result<CallTarget> {
    let component = array_component(array_type)?;
    let signature = SignatureType::new(component, vec![array_type.clone(), Type::INT])?;
    CallTarget::build(runtime, signature, Form::ArrayGet)
}

/// `(T[], int, T) -> void`.
pub fn array_element_setter(runtime: &Arc<Runtime>, array_type: &Type) -> Result<CallTarget> {
    let component = array_component(array_type)?;
    let signature = SignatureType::new(Type::VOID, vec![array_type.clone(), Type::INT, component])?;
    CallTarget::build(runtime, signature, Form::ArraySet)
}

/// `(T[]) -> int`.
pub fn array_length(runtime: &Arc<Runtime>, array_type: &Type) -> Result<CallTarget> {
    array_component(array_type)?;
    let signature = SignatureType::new(Type::INT, vec![array_type.clone()])?;
    CallTarget::build(runtime, signature, Form::ArrayLength)
}

/// `(MethodHandle, A...) -> R` invoking its first argument exactly with type `ty`.
pub fn exact_invoker(runtime: &Arc<Runtime>, ty: &SignatureType) -> Result<CallTarget> {
    build_invoker(runtime, ty, true)
}

/// `(MethodHandle, A...) -> R` invoking its first argument as if through `ty`.
pub fn invoker(runtime: &Arc<Runtime>, ty: &SignatureType) -> Result<CallTarget> {
    build_invoker(runtime, ty, false)
}

fn build_invoker(runtime: &Arc<Runtime>, ty: &SignatureType, exact: bool) -> Result<CallTarget> {
    let signature = ty.insert_parameter_types(0, &[Type::class(well_known::METHOD_HANDLE)])?;
    let extra = if exact { "exactInvoker" } else { "invoker" };
    CallTarget::build_keyed(
        runtime,
        signature,
        Form::Invoker {
            exact,
            ty: ty.clone(),
        },
        0..1,
        Some(ThunkExtra::Object(extra.into())),
    )
}

fn array_component(array_type: &Type) -> Result<Type> {
    array_type
        .component()
        .cloned()
        .ok_or_else(|| LinkError::IllegalArgument(format!("{array_type} is not an array type")))
}

/// `prefix`'s parameters must equal the leading parameters of `of`.
fn check_prefix(prefix: &SignatureType, of: &SignatureType) -> Result<()> {
    let params = prefix.parameters();
    if params.len() > of.parameter_count() {
        return Err(SignatureError::Arity {
            expected: of.parameter_count(),
            found: params.len(),
        }
        .into());
    }
    for (index, (from, to)) in params.iter().zip(of.parameters()).enumerate() {
        if from != to {
            return Err(SignatureError::mismatch(Some(index), from, to).into());
        }
    }
    Ok(())
}
