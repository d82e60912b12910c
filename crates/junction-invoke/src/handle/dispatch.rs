use junction_config::targets;
use junction_signature::{well_known, ClassName, Type};

use super::{convert, CallTarget, Form};
use crate::error::InvokeError;
use crate::object::ObjRef;
use crate::resolve::{MethodIdentity, MethodKind};
use crate::value::Value;

type Result<T> = std::result::Result<T, InvokeError>;

impl CallTarget {
    /// Runs this node's own behaviour, entering wrapped targets through their stubs.
    ///
    /// Stub implementations call this once they have checked the argument count; it is not
    /// meant to be called with arguments that do not match the signature.
    pub fn interpret(&self, mut args: Vec<Value>) -> Result<Value> {
        let runtime = self.runtime();
        let machine = runtime.machine();
        let hierarchy = runtime.hierarchy();

        match self.form() {
            Form::Direct {
                method,
                kind,
                entry,
            } => match kind {
                MethodKind::Static => machine.call(*entry, &args),
                MethodKind::Constructor => {
                    let instance = machine.allocate(&method.declaring_class)?;
                    args.insert(0, Value::Ref(instance.clone()));
                    machine.call(*entry, &args)?;
                    Ok(Value::Ref(instance))
                }
                MethodKind::Virtual | MethodKind::Interface | MethodKind::Special => {
                    receiver(&args, method)?;
                    machine.call(*entry, &args)
                }
            },

            Form::Virtual { method, slot } => {
                let receiver_type = receiver(&args, method)?.runtime_type().clone();
                let entry = machine
                    .virtual_entry(&receiver_type, *slot)
                    .ok_or_else(|| abstract_method(method, &receiver_type))?;
                machine.call(entry, &args)
            }

            Form::Interface { method, slot } => {
                let receiver_type = receiver(&args, method)?.runtime_type().clone();
                let interface = &method.declaring_class;
                if !hierarchy.is_assignable(&receiver_type, &Type::Class(interface.clone())) {
                    return Err(InvokeError::CastError {
                        from: receiver_type.to_string(),
                        to: Type::Class(interface.clone()),
                    });
                }
                let entry = machine
                    .interface_entry(&receiver_type, interface, *slot)
                    .ok_or_else(|| abstract_method(method, &receiver_type))?;
                machine.call(entry, &args)
            }

            Form::FieldGet { field, offset } => {
                let volatile = field.is_volatile();
                if field.is_static() {
                    let cell = machine
                        .static_field(&field.declaring_class, *offset)
                        .ok_or_else(|| missing_field(&field.declaring_class, &field.name))?;
                    Ok(cell.load(volatile))
                } else {
                    let obj = field_receiver(&args, &field.name)?;
                    let cell = obj
                        .field(*offset)
                        .ok_or_else(|| missing_field(&field.declaring_class, &field.name))?;
                    Ok(cell.load(volatile))
                }
            }

            Form::FieldSet { field, offset } => {
                let volatile = field.is_volatile();
                if field.is_static() {
                    let value = args.pop().unwrap_or(Value::Null);
                    let cell = machine
                        .static_field(&field.declaring_class, *offset)
                        .ok_or_else(|| missing_field(&field.declaring_class, &field.name))?;
                    cell.store(value, volatile);
                } else {
                    let value = args.pop().unwrap_or(Value::Null);
                    let obj = field_receiver(&args, &field.name)?;
                    obj.field(*offset)
                        .ok_or_else(|| missing_field(&field.declaring_class, &field.name))?
                        .store(value, volatile);
                }
                Ok(Value::Void)
            }

            Form::Bound { target, receiver } => {
                args.insert(0, receiver.clone());
                target.enter(args)
            }

            Form::ConvertArguments {
                target,
                conversions,
            } => {
                let converted = args
                    .into_iter()
                    .zip(conversions)
                    .map(|(value, conversion)| convert::apply(hierarchy, conversion, value))
                    .collect::<Result<Vec<_>>>()?;
                target.enter(converted)
            }

            Form::ConvertReturn { target, conversion } => {
                let result = target.enter(args)?;
                convert::apply(hierarchy, conversion, result)
            }

            Form::FilterReturn { target, filter } => {
                let result = target.enter(args)?;
                if target.signature().return_type().is_void() {
                    filter.enter(Vec::new())
                } else {
                    filter.enter(vec![result])
                }
            }

            Form::FilterArguments {
                target,
                pos,
                filters,
            } => {
                for (index, filter) in filters.iter().enumerate() {
                    let Some(filter) = filter else {
                        continue;
                    };
                    let slot = args
                        .get_mut(pos + index)
                        .ok_or_else(|| arity(self, pos + index + 1))?;
                    let value = std::mem::replace(slot, Value::Null);
                    *slot = filter.enter(vec![value])?;
                }
                target.enter(args)
            }

            Form::Collect {
                target,
                component,
                count,
            } => {
                let start = args.len().checked_sub(*count).ok_or_else(|| arity(self, *count))?;
                // A fresh array per call: the same adapter may run concurrently.
                let tail = args.split_off(start);
                args.push(Value::Ref(ObjRef::array(component.clone(), tail)));
                target.enter(args)
            }

            Form::Spread { target, count } => {
                match args.pop() {
                    Some(Value::Null) if *count == 0 => {}
                    Some(Value::Null) => {
                        return Err(InvokeError::IllegalArgument(format!(
                            "null array cannot supply {count} spread arguments"
                        )))
                    }
                    Some(Value::Ref(array)) => {
                        let elements = array.array_elements().ok_or_else(|| {
                            InvokeError::CastError {
                                from: array.runtime_type().to_string(),
                                to: Type::array_of(Type::object()),
                            }
                        })?;
                        if elements.len() != *count {
                            return Err(InvokeError::IllegalArgument(format!(
                                "array of length {} cannot supply {count} spread arguments",
                                elements.len()
                            )));
                        }
                        args.extend(elements);
                    }
                    Some(other) => {
                        return Err(InvokeError::type_mismatch("an array", other.describe_type()))
                    }
                    None => return Err(arity(self, 1)),
                }
                target.enter(args)
            }

            Form::Permute { target, reorder } => {
                let permuted = reorder
                    .iter()
                    .map(|&index| args.get(index).cloned().ok_or_else(|| arity(self, index + 1)))
                    .collect::<Result<Vec<_>>>()?;
                target.enter(permuted)
            }

            Form::Insert {
                target,
                pos,
                values,
            } => {
                args.splice(*pos..*pos, values.iter().cloned());
                target.enter(args)
            }

            Form::Drop { target, pos, count } => {
                args.drain(*pos..*pos + *count);
                target.enter(args)
            }

            Form::Fold { target, combiner } => {
                let prefix = prefix(&args, combiner.signature().parameter_count(), self)?;
                let folded = combiner.enter(prefix)?;
                if !combiner.signature().return_type().is_void() {
                    args.insert(0, folded);
                }
                target.enter(args)
            }

            Form::Guard {
                test,
                then,
                otherwise,
            } => {
                let prefix = prefix(&args, test.signature().parameter_count(), self)?;
                match test.enter(prefix)? {
                    Value::Boolean(true) => then.enter(args),
                    Value::Boolean(false) => otherwise.enter(args),
                    other => Err(InvokeError::type_mismatch("boolean", other.describe_type())),
                }
            }

            Form::Catch {
                target,
                kind,
                handler,
            } => {
                let kept = handler.signature().parameter_count().saturating_sub(1);
                let prefix = prefix(&args, kept, self)?;
                match target.enter(args) {
                    Err(err) if err.is_instance_of(hierarchy, kind) => {
                        tracing::trace!(
                            target: targets::HANDLE,
                            caught = %err.exception_class(),
                            "exception guard invoking handler"
                        );
                        let mut handler_args = Vec::with_capacity(kept + 1);
                        handler_args.push(Value::Ref(err.to_throwable()));
                        handler_args.extend(prefix);
                        handler.enter(handler_args)
                    }
                    other => other,
                }
            }

            Form::Varargs { target, .. } => target.enter(args),

            Form::Site(site) => site.target().enter(args),

            Form::Constant(value) => Ok(value.clone()),

            Form::Identity => args.into_iter().next().ok_or_else(|| arity(self, 1)),

            Form::Throw => match args.into_iter().next() {
                Some(Value::Ref(thrown)) => Err(InvokeError::Thrown(thrown)),
                _ => Err(InvokeError::NullReference("thrown exception is null".to_string())),
            },

            Form::ArrayGet => {
                let (array, index) = array_and_index(&args)?;
                array.array_get(index).ok_or_else(|| out_of_bounds(array, index as i64))
            }

            Form::ArraySet => {
                let value = args.pop().unwrap_or(Value::Null);
                let (array, index) = array_and_index(&args)?;
                let component = array.array_component().cloned().unwrap_or_else(Type::object);
                if !value.conforms_to(hierarchy, &component) {
                    return Err(InvokeError::ArrayStore {
                        value: value.describe_type(),
                        component,
                    });
                }
                if array.array_set(index, value) {
                    Ok(Value::Void)
                } else {
                    Err(out_of_bounds(array, index as i64))
                }
            }

            Form::ArrayLength => {
                let array = array_arg(&args)?;
                let len = array.array_len().unwrap_or(0);
                Ok(Value::Int(i32::try_from(len).unwrap_or(i32::MAX)))
            }

            Form::Invoker { exact, ty } => {
                let mut rest = args;
                if rest.is_empty() {
                    return Err(arity(self, 1));
                }
                let handle = match rest.remove(0) {
                    Value::Ref(obj) => obj.as_handle().cloned().ok_or_else(|| {
                        InvokeError::CastError {
                            from: obj.runtime_type().to_string(),
                            to: Type::class(well_known::METHOD_HANDLE),
                        }
                    })?,
                    _ => {
                        return Err(InvokeError::NullReference(
                            "invoked call target is null".to_string(),
                        ))
                    }
                };
                if *exact {
                    handle.invoke_exact_typed(ty, rest)
                } else {
                    handle.invoke_typed(ty, rest)
                }
            }

            Form::Unlinked => Err(InvokeError::IllegalState(format!(
                "call site of type {} has no target",
                self.signature()
            ))),
        }
    }
}

fn receiver<'a>(args: &'a [Value], method: &MethodIdentity) -> Result<&'a ObjRef> {
    match args.first() {
        Some(Value::Ref(obj)) => Ok(obj),
        Some(Value::Null) | None => Err(InvokeError::NullReference(format!(
            "receiver of {}.{}",
            method.declaring_class, method.name
        ))),
        Some(other) => Err(InvokeError::type_mismatch(
            &method.declaring_class,
            other.describe_type(),
        )),
    }
}

fn field_receiver<'a>(args: &'a [Value], name: &str) -> Result<&'a ObjRef> {
    match args.first() {
        Some(Value::Ref(obj)) => Ok(obj),
        _ => Err(InvokeError::NullReference(format!("receiver of field {name}"))),
    }
}

fn array_arg(args: &[Value]) -> Result<&ObjRef> {
    match args.first() {
        Some(Value::Ref(obj)) if obj.array_len().is_some() => Ok(obj),
        Some(Value::Ref(obj)) => Err(InvokeError::type_mismatch(
            "an array",
            obj.runtime_type(),
        )),
        _ => Err(InvokeError::NullReference("array is null".to_string())),
    }
}

fn array_and_index(args: &[Value]) -> Result<(&ObjRef, usize)> {
    let array = array_arg(args)?;
    let len = array.array_len().unwrap_or(0);
    match args.get(1) {
        Some(Value::Int(index)) => usize::try_from(*index)
            .ok()
            .filter(|index| *index < len)
            .map(|index| (array, index))
            .ok_or(InvokeError::ArrayIndexOutOfBounds {
                index: i64::from(*index),
                len,
            }),
        Some(other) => Err(InvokeError::type_mismatch("int", other.describe_type())),
        None => Err(InvokeError::type_mismatch("int", "nothing")),
    }
}

fn out_of_bounds(array: &ObjRef, index: i64) -> InvokeError {
    InvokeError::ArrayIndexOutOfBounds {
        index,
        len: array.array_len().unwrap_or(0),
    }
}

fn prefix(args: &[Value], len: usize, target: &CallTarget) -> Result<Vec<Value>> {
    args.get(..len)
        .map(<[Value]>::to_vec)
        .ok_or_else(|| arity(target, len))
}

fn arity(target: &CallTarget, needed: usize) -> InvokeError {
    InvokeError::type_mismatch(
        target.signature(),
        format!("fewer than {needed} arguments"),
    )
}

fn abstract_method(method: &MethodIdentity, receiver: &Type) -> InvokeError {
    InvokeError::AbstractMethod {
        owner: method.declaring_class.clone(),
        name: method.name.clone(),
        receiver: receiver.to_string(),
    }
}

fn missing_field(owner: &ClassName, name: &str) -> InvokeError {
    InvokeError::IllegalState(format!("no storage for field {owner}.{name}"))
}
