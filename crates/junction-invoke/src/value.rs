use std::fmt;

use junction_signature::{ClassHierarchy, PrimitiveKind, Type};

use crate::handle::CallTarget;
use crate::object::ObjRef;

/// A runtime value flowing through call targets.
///
/// `Void` is only produced as the result of a target whose return type is `void`.
#[derive(Clone)]
pub enum Value {
    Void,
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Ref(ObjRef),
}

impl Value {
    /// Zero / `false` / `null` of `ty` (`Void` for `void`).
    pub fn zero(ty: &Type) -> Value {
        match ty {
            Type::Primitive(kind) => Value::zero_primitive(*kind),
            _ => Value::Null,
        }
    }

    pub fn zero_primitive(kind: PrimitiveKind) -> Value {
        match kind {
            PrimitiveKind::Boolean => Value::Boolean(false),
            PrimitiveKind::Byte => Value::Byte(0),
            PrimitiveKind::Short => Value::Short(0),
            PrimitiveKind::Char => Value::Char(0),
            PrimitiveKind::Int => Value::Int(0),
            PrimitiveKind::Long => Value::Long(0),
            PrimitiveKind::Float => Value::Float(0.0),
            PrimitiveKind::Double => Value::Double(0.0),
            PrimitiveKind::Void => Value::Void,
        }
    }

    pub fn string(text: impl Into<String>) -> Value {
        Value::Ref(ObjRef::string(text))
    }

    pub fn handle(target: CallTarget) -> Value {
        Value::Ref(ObjRef::handle(target))
    }

    /// Primitive kind of this value, `None` for references and `null`.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Value::Void => Some(PrimitiveKind::Void),
            Value::Boolean(_) => Some(PrimitiveKind::Boolean),
            Value::Byte(_) => Some(PrimitiveKind::Byte),
            Value::Short(_) => Some(PrimitiveKind::Short),
            Value::Char(_) => Some(PrimitiveKind::Char),
            Value::Int(_) => Some(PrimitiveKind::Int),
            Value::Long(_) => Some(PrimitiveKind::Long),
            Value::Float(_) => Some(PrimitiveKind::Float),
            Value::Double(_) => Some(PrimitiveKind::Double),
            Value::Null | Value::Ref(_) => None,
        }
    }

    /// Dynamic type of the value; `None` for `null`.
    pub fn runtime_type(&self) -> Option<Type> {
        match self {
            Value::Null => None,
            Value::Ref(obj) => Some(obj.runtime_type().clone()),
            other => other.primitive_kind().map(Type::Primitive),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Null | Value::Ref(_))
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Ref(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_object().and_then(ObjRef::as_str)
    }

    /// Whether this value may be stored in a slot of type `ty` without any conversion.
    pub fn conforms_to(&self, hierarchy: &dyn ClassHierarchy, ty: &Type) -> bool {
        match (self, ty) {
            (Value::Null, ty) => ty.is_reference(),
            (Value::Ref(obj), ty) => hierarchy.is_assignable(obj.runtime_type(), ty),
            (value, Type::Primitive(kind)) => value.primitive_kind() == Some(*kind),
            _ => false,
        }
    }

    /// Integral view used by primitive casts; `boolean` is a one-bit integer.
    fn integral(&self) -> Option<i64> {
        match self {
            Value::Boolean(value) => Some(i64::from(*value)),
            Value::Byte(value) => Some(i64::from(*value)),
            Value::Short(value) => Some(i64::from(*value)),
            Value::Char(value) => Some(i64::from(*value)),
            Value::Int(value) => Some(i64::from(*value)),
            Value::Long(value) => Some(*value),
            _ => None,
        }
    }

    /// Primitive-to-primitive conversion with JVM cast semantics.
    ///
    /// Integral narrowing keeps the low bits, `char` is an unsigned 16-bit narrowing,
    /// float-to-integral saturates (NaN becomes zero) and any conversion to `boolean` goes
    /// through `byte` and keeps the low bit. Returns `None` for non-primitive inputs.
    pub fn cast_primitive(&self, to: PrimitiveKind) -> Option<Value> {
        if self.primitive_kind() == Some(to) {
            return Some(self.clone());
        }
        if to == PrimitiveKind::Void {
            return Some(Value::Void);
        }

        let floating = match self {
            Value::Float(value) => Some(f64::from(*value)),
            Value::Double(value) => Some(*value),
            _ => None,
        };

        let value = match (floating, self.integral()) {
            (Some(value), _) => match to {
                PrimitiveKind::Boolean => Value::Boolean((value as i32 as i8) & 1 != 0),
                PrimitiveKind::Byte => Value::Byte(value as i32 as i8),
                PrimitiveKind::Short => Value::Short(value as i32 as i16),
                PrimitiveKind::Char => Value::Char(value as i32 as u16),
                PrimitiveKind::Int => Value::Int(value as i32),
                PrimitiveKind::Long => Value::Long(value as i64),
                PrimitiveKind::Float => Value::Float(value as f32),
                PrimitiveKind::Double => Value::Double(value),
                PrimitiveKind::Void => Value::Void,
            },
            (None, Some(value)) => match to {
                PrimitiveKind::Boolean => Value::Boolean((value as i8) & 1 != 0),
                PrimitiveKind::Byte => Value::Byte(value as i8),
                PrimitiveKind::Short => Value::Short(value as i16),
                PrimitiveKind::Char => Value::Char(value as u16),
                PrimitiveKind::Int => Value::Int(value as i32),
                PrimitiveKind::Long => Value::Long(value),
                PrimitiveKind::Float => Value::Float(value as f32),
                PrimitiveKind::Double => Value::Double(value as f64),
                PrimitiveKind::Void => Value::Void,
            },
            (None, None) => return None,
        };
        Some(value)
    }

    /// Raw bit pattern of a primitive value, as stored in field cells.
    pub(crate) fn to_bits(&self) -> u64 {
        match self {
            Value::Float(value) => u64::from(value.to_bits()),
            Value::Double(value) => value.to_bits(),
            other => other.integral().unwrap_or(0) as u64,
        }
    }

    pub(crate) fn from_bits(kind: PrimitiveKind, bits: u64) -> Value {
        match kind {
            PrimitiveKind::Boolean => Value::Boolean(bits & 1 != 0),
            PrimitiveKind::Byte => Value::Byte(bits as i8),
            PrimitiveKind::Short => Value::Short(bits as i16),
            PrimitiveKind::Char => Value::Char(bits as u16),
            PrimitiveKind::Int => Value::Int(bits as i32),
            PrimitiveKind::Long => Value::Long(bits as i64),
            PrimitiveKind::Float => Value::Float(f32::from_bits(bits as u32)),
            PrimitiveKind::Double => Value::Double(f64::from_bits(bits)),
            PrimitiveKind::Void => Value::Void,
        }
    }

    /// Short description for error messages: the dynamic type, or `null`.
    pub(crate) fn describe_type(&self) -> String {
        match self.runtime_type() {
            Some(ty) => ty.to_string(),
            None => "null".to_string(),
        }
    }
}

/// Primitives compare by value (floating point by bit pattern), boxes and strings by
/// content, every other object by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (a, b) => match (a.primitive_kind(), b.primitive_kind()) {
                (Some(ka), Some(kb)) if ka == kb => a.integral() == b.integral(),
                _ => false,
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::Null => f.write_str("null"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Byte(value) => write!(f, "{value}b"),
            Value::Short(value) => write!(f, "{value}s"),
            Value::Char(value) => match char::from_u32(u32::from(*value)) {
                Some(c) => write!(f, "{c:?}"),
                None => write!(f, "\\u{value:04x}"),
            },
            Value::Int(value) => write!(f, "{value}"),
            Value::Long(value) => write!(f, "{value}L"),
            Value::Float(value) => write!(f, "{value}f"),
            Value::Double(value) => write!(f, "{value}d"),
            Value::Ref(obj) => write!(f, "{obj:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i8> for Value {
    fn from(value: i8) -> Self {
        Value::Byte(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::Short(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<ObjRef> for Value {
    fn from(value: ObjRef) -> Self {
        Value::Ref(value)
    }
}

impl From<Option<ObjRef>> for Value {
    fn from(value: Option<ObjRef>) -> Self {
        value.map(Value::Ref).unwrap_or(Value::Null)
    }
}
