//! Call-time application of the conversions planned by `junction_signature::classify`.

use junction_signature::{
    classify, ClassHierarchy, Conversion, PrimitiveKind, Type, UnboxSource,
};

use crate::error::InvokeError;
use crate::object::ObjRef;
use crate::value::Value;

pub(crate) fn apply(
    hierarchy: &dyn ClassHierarchy,
    conversion: &Conversion,
    value: Value,
) -> Result<Value, InvokeError> {
    match conversion {
        Conversion::Identity | Conversion::Upcast | Conversion::UncheckedInterfaceCast(_) => {
            Ok(value)
        }
        Conversion::Widen { from, to } | Conversion::Narrow { from, to } => value
            .cast_primitive(*to)
            .ok_or_else(|| InvokeError::type_mismatch(from.name(), value.describe_type())),
        Conversion::Box { kind, cast } => {
            let boxed = ObjRef::boxed(value.clone())
                .filter(|obj| obj.runtime_type() == &Type::Class(kind.wrapper()))
                .ok_or_else(|| InvokeError::type_mismatch(kind.name(), value.describe_type()))?;
            match cast {
                Some(ty) => check_cast(hierarchy, Value::Ref(boxed), ty),
                None => Ok(Value::Ref(boxed)),
            }
        }
        Conversion::Unbox {
            source,
            to,
            explicit,
        } => unbox(value, *source, *to, *explicit),
        Conversion::Cast(ty) => check_cast(hierarchy, value, ty),
        Conversion::ZeroValue(ty) => Ok(Value::zero(ty)),
        Conversion::Discard => Ok(Value::Void),
    }
}

fn check_cast(
    hierarchy: &dyn ClassHierarchy,
    value: Value,
    ty: &Type,
) -> Result<Value, InvokeError> {
    match &value {
        Value::Null => Ok(value),
        Value::Ref(obj) if hierarchy.is_assignable(obj.runtime_type(), ty) => Ok(value),
        Value::Ref(obj) => Err(InvokeError::CastError {
            from: obj.runtime_type().to_string(),
            to: ty.clone(),
        }),
        other => Err(InvokeError::type_mismatch(ty, other.describe_type())),
    }
}

fn unbox(
    value: Value,
    source: UnboxSource,
    to: PrimitiveKind,
    explicit: bool,
) -> Result<Value, InvokeError> {
    let obj = match &value {
        Value::Ref(obj) => obj,
        Value::Null => {
            return Err(InvokeError::NullReference(format!("cannot unbox null to {}", to.name())))
        }
        other => return Err(InvokeError::type_mismatch("a boxed value", other.describe_type())),
    };
    let cast_error = || InvokeError::CastError {
        from: obj.runtime_type().to_string(),
        to: Type::Class(to.wrapper()),
    };

    let inner = obj.unboxed().ok_or_else(cast_error)?;
    let kind = inner.primitive_kind().ok_or_else(cast_error)?;
    let source_ok = match source {
        UnboxSource::Wrapper(expected) => kind == expected,
        UnboxSource::Number => kind.is_numeric() && kind != PrimitiveKind::Char,
        UnboxSource::Dynamic => true,
    };
    if !source_ok || (!explicit && kind != to && !kind.widens_to(to)) {
        return Err(cast_error());
    }
    inner.cast_primitive(to).ok_or_else(cast_error)
}

/// Converts a constant (bound receiver, inserted argument, `constant` value) to `ty` with
/// the implicit rules. Returns `None` when no implicit conversion applies or it fails.
pub(crate) fn convert_constant(
    hierarchy: &dyn ClassHierarchy,
    value: Value,
    ty: &Type,
) -> Option<Value> {
    if ty.is_void() || matches!(value, Value::Void) {
        return None;
    }
    let from = match value.runtime_type() {
        Some(from) => from,
        None => return ty.is_reference().then_some(Value::Null),
    };
    let conversion = classify(hierarchy, &from, ty, false)?;
    apply(hierarchy, &conversion, value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_signature::{well_known, ClassTable};

    #[test]
    fn dynamic_unboxing_checks_the_boxed_kind() {
        let table = ClassTable::with_well_known();
        let conversion = classify(&table, &Type::object(), &Type::LONG, false).unwrap();

        let int_box = Value::Ref(ObjRef::boxed(Value::Int(4)).unwrap());
        assert_eq!(apply(&table, &conversion, int_box).unwrap(), Value::Long(4));

        let double_box = Value::Ref(ObjRef::boxed(Value::Double(1.5)).unwrap());
        assert!(matches!(
            apply(&table, &conversion, double_box),
            Err(InvokeError::CastError { .. })
        ));
        assert!(matches!(
            apply(&table, &conversion, Value::string("x")),
            Err(InvokeError::CastError { .. })
        ));
        assert!(matches!(
            apply(&table, &conversion, Value::Null),
            Err(InvokeError::NullReference(_))
        ));
    }

    #[test]
    fn explicit_number_unboxing_narrows() {
        let table = ClassTable::with_well_known();
        let number = Type::class(well_known::NUMBER);
        let conversion = classify(&table, &number, &Type::BYTE, true).unwrap();
        let boxed = Value::Ref(ObjRef::boxed(Value::Long(0x1ff)).unwrap());
        assert_eq!(apply(&table, &conversion, boxed).unwrap(), Value::Byte(-1));

        let boolean_box = Value::Ref(ObjRef::boxed(Value::Boolean(true)).unwrap());
        assert!(apply(&table, &conversion, boolean_box).is_err());
    }

    #[test]
    fn checked_casts_fail_at_call_time() {
        let table = ClassTable::with_well_known();
        let conversion = classify(&table, &Type::object(), &Type::string(), true).unwrap();
        assert_eq!(
            apply(&table, &conversion, Value::string("ok")).unwrap(),
            Value::string("ok")
        );
        assert_eq!(apply(&table, &conversion, Value::Null).unwrap(), Value::Null);
        let err = apply(&table, &conversion, Value::Ref(ObjRef::boxed(Value::Int(1)).unwrap()))
            .unwrap_err();
        assert!(matches!(err, InvokeError::CastError { to, .. } if to == Type::string()));
    }

    #[test]
    fn unchecked_interface_casts_pass_anything() {
        let table = ClassTable::with_well_known();
        let char_seq = Type::class(well_known::CHAR_SEQUENCE);
        let integer = Type::class(well_known::INTEGER);
        let conversion = classify(&table, &integer, &char_seq, true).unwrap();
        let boxed = Value::Ref(ObjRef::boxed(Value::Int(1)).unwrap());
        assert_eq!(apply(&table, &conversion, boxed.clone()).unwrap(), boxed);
    }

    #[test]
    fn constants_use_implicit_rules() {
        let table = ClassTable::with_well_known();
        assert_eq!(convert_constant(&table, Value::Byte(3), &Type::LONG), Some(Value::Long(3)));
        assert_eq!(convert_constant(&table, Value::Long(3), &Type::INT), None);
        assert_eq!(convert_constant(&table, Value::Null, &Type::string()), Some(Value::Null));
        assert_eq!(convert_constant(&table, Value::Null, &Type::INT), None);
        assert_eq!(convert_constant(&table, Value::Int(1), &Type::VOID), None);
        assert_eq!(
            convert_constant(&table, Value::Int(9), &Type::object()),
            Some(Value::Ref(ObjRef::boxed(Value::Int(9)).unwrap()))
        );
        assert_eq!(
            convert_constant(&table, Value::string("s"), &Type::class(well_known::INTEGER)),
            None
        );
    }
}
