use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use junction_signature::{well_known, ClassName, PrimitiveKind, Type};
use parking_lot::RwLock;

use crate::handle::CallTarget;
use crate::value::Value;

/// Shared reference to a heap object.
#[derive(Clone)]
pub struct ObjRef(Arc<Object>);

struct Object {
    ty: Type,
    body: Body,
}

enum Body {
    Instance(Box<[FieldCell]>),
    Boxed(Value),
    Str(String),
    Array(RwLock<Vec<Value>>),
    Throwable(Option<String>),
    Handle(CallTarget),
}

impl ObjRef {
    fn new(ty: Type, body: Body) -> Self {
        ObjRef(Arc::new(Object { ty, body }))
    }

    /// A plain instance with one zeroed cell per field type.
    pub fn instance(class: ClassName, field_types: &[Type]) -> Self {
        let fields = field_types.iter().map(FieldCell::new).collect();
        ObjRef::new(Type::Class(class), Body::Instance(fields))
    }

    /// Boxes a primitive into its wrapper class. Returns `None` for references and `void`.
    pub fn boxed(value: Value) -> Option<Self> {
        let kind = value.primitive_kind().filter(|kind| *kind != PrimitiveKind::Void)?;
        Some(ObjRef::new(Type::Class(kind.wrapper()), Body::Boxed(value)))
    }

    pub fn string(text: impl Into<String>) -> Self {
        ObjRef::new(Type::string(), Body::Str(text.into()))
    }

    pub fn array(component: Type, elements: Vec<Value>) -> Self {
        ObjRef::new(Type::array_of(component), Body::Array(RwLock::new(elements)))
    }

    /// A fresh array of `len` zero elements.
    pub fn new_array(component: Type, len: usize) -> Self {
        let elements = vec![Value::zero(&component); len];
        ObjRef::array(component, elements)
    }

    pub fn throwable(class: ClassName, message: Option<String>) -> Self {
        ObjRef::new(Type::Class(class), Body::Throwable(message))
    }

    pub fn handle(target: CallTarget) -> Self {
        ObjRef::new(Type::class(well_known::METHOD_HANDLE), Body::Handle(target))
    }

    pub fn runtime_type(&self) -> &Type {
        &self.0.ty
    }

    pub fn ptr_eq(&self, other: &ObjRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn field(&self, offset: u32) -> Option<&FieldCell> {
        match &self.0.body {
            Body::Instance(fields) => fields.get(offset as usize),
            _ => None,
        }
    }

    /// The primitive inside a box, `None` for every other object.
    pub fn unboxed(&self) -> Option<&Value> {
        match &self.0.body {
            Body::Boxed(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.0.body {
            Body::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&CallTarget> {
        match &self.0.body {
            Body::Handle(target) => Some(target),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match &self.0.body {
            Body::Throwable(message) => message.as_deref(),
            _ => None,
        }
    }

    pub fn array_component(&self) -> Option<&Type> {
        match &self.0.body {
            Body::Array(_) => self.0.ty.component(),
            _ => None,
        }
    }

    pub fn array_len(&self) -> Option<usize> {
        match &self.0.body {
            Body::Array(elements) => Some(elements.read().len()),
            _ => None,
        }
    }

    pub fn array_get(&self, index: usize) -> Option<Value> {
        match &self.0.body {
            Body::Array(elements) => elements.read().get(index).cloned(),
            _ => None,
        }
    }

    /// Stores without an element type check; returns `false` when out of bounds.
    pub fn array_set(&self, index: usize, value: Value) -> bool {
        match &self.0.body {
            Body::Array(elements) => match elements.write().get_mut(index) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Snapshot of the elements of an array object.
    pub fn array_elements(&self) -> Option<Vec<Value>> {
        match &self.0.body {
            Body::Array(elements) => Some(elements.read().clone()),
            _ => None,
        }
    }
}

/// Boxes and strings compare by content; everything else by identity.
impl PartialEq for ObjRef {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (&self.0.body, &other.0.body) {
            (Body::Boxed(a), Body::Boxed(b)) => a == b,
            (Body::Str(a), Body::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.body {
            Body::Boxed(value) => write!(f, "{}({value:?})", self.0.ty),
            Body::Str(text) => write!(f, "{text:?}"),
            Body::Array(elements) => write!(f, "{}{:?}", self.0.ty, elements.read()),
            Body::Throwable(Some(message)) => write!(f, "{}: {message}", self.0.ty),
            Body::Handle(target) => write!(f, "MethodHandle{}", target.signature()),
            Body::Throwable(None) | Body::Instance(_) => {
                write!(f, "{}@{:p}", self.0.ty, Arc::as_ptr(&self.0))
            }
        }
    }
}

/// Storage for one field.
///
/// Primitive fields are stored as bit patterns in an atomic word so that non-volatile
/// access can use relaxed ordering; volatile access is sequentially consistent. Reference
/// fields sit behind a lock, which is at least as strong as either ordering.
pub struct FieldCell {
    repr: CellRepr,
}

enum CellRepr {
    Primitive { kind: PrimitiveKind, bits: AtomicU64 },
    Reference(RwLock<Value>),
}

impl FieldCell {
    pub fn new(ty: &Type) -> Self {
        let repr = match ty {
            Type::Primitive(kind) => CellRepr::Primitive {
                kind: *kind,
                bits: AtomicU64::new(Value::zero_primitive(*kind).to_bits()),
            },
            _ => CellRepr::Reference(RwLock::new(Value::Null)),
        };
        FieldCell { repr }
    }

    pub fn load(&self, volatile: bool) -> Value {
        match &self.repr {
            CellRepr::Primitive { kind, bits } => {
                Value::from_bits(*kind, bits.load(ordering(volatile)))
            }
            CellRepr::Reference(value) => value.read().clone(),
        }
    }

    /// Stores `value`; primitive cells reinterpret it under the cell's declared kind.
    pub fn store(&self, value: Value, volatile: bool) {
        match &self.repr {
            CellRepr::Primitive { bits, .. } => bits.store(value.to_bits(), ordering(volatile)),
            CellRepr::Reference(slot) => *slot.write() = value,
        }
    }
}

fn ordering(volatile: bool) -> Ordering {
    if volatile {
        Ordering::SeqCst
    } else {
        Ordering::Relaxed
    }
}

impl fmt::Debug for FieldCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldCell({:?})", self.load(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxes_carry_wrapper_types() {
        let boxed = ObjRef::boxed(Value::Int(3)).unwrap();
        assert_eq!(boxed.runtime_type(), &Type::class(well_known::INTEGER));
        assert_eq!(boxed.unboxed(), Some(&Value::Int(3)));
        assert!(ObjRef::boxed(Value::Null).is_none());
        assert!(ObjRef::boxed(Value::Void).is_none());
    }

    #[test]
    fn field_cells_zero_initialize() {
        let obj = ObjRef::instance(ClassName::new("Point"), &[Type::INT, Type::string()]);
        assert_eq!(obj.field(0).unwrap().load(false), Value::Int(0));
        assert_eq!(obj.field(1).unwrap().load(true), Value::Null);
        obj.field(0).unwrap().store(Value::Int(9), true);
        assert_eq!(obj.field(0).unwrap().load(false), Value::Int(9));
        assert!(obj.field(2).is_none());
    }

    #[test]
    fn arrays_check_bounds() {
        let array = ObjRef::new_array(Type::INT, 2);
        assert_eq!(array.array_len(), Some(2));
        assert!(array.array_set(1, Value::Int(5)));
        assert!(!array.array_set(2, Value::Int(5)));
        assert_eq!(array.array_get(1), Some(Value::Int(5)));
        assert_eq!(array.array_get(2), None);
    }
}
