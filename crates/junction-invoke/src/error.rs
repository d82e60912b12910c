use junction_signature::{
    well_known, ClassHierarchy, ClassName, SignatureError, SignatureType, Type,
};

use crate::object::ObjRef;

pub type Result<T> = std::result::Result<T, LinkError>;

/// Failures raised while constructing call targets (lookups and adapters).
#[derive(Debug, Clone, thiserror::Error)]
pub enum LinkError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("no such method: {owner}.{name}{signature}")]
    NoSuchMethod {
        owner: ClassName,
        name: String,
        signature: SignatureType,
    },

    #[error("no such field: {owner}.{name}")]
    NoSuchField { owner: ClassName, name: String },

    #[error("illegal access to {owner}.{member} from {caller}: {reason}")]
    IllegalAccess {
        owner: ClassName,
        member: String,
        caller: ClassName,
        reason: String,
    },

    #[error("security policy rejected access to {owner}.{member}: {reason}")]
    SecurityViolation {
        owner: ClassName,
        member: String,
        reason: String,
    },

    /// A call site refused a target whose signature differs from the site's.
    #[error("target type {found} does not match call site type {expected}")]
    TypeMismatch {
        expected: SignatureType,
        found: SignatureType,
    },

    #[error("failed to compile dispatch stub for {key}: {reason}")]
    ThunkCompile { key: String, reason: String },
}

/// Failures raised while a call target runs.
///
/// Adapters propagate these unchanged; only the exception-guard adapter inspects them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvokeError {
    #[error("expected call type {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("cannot cast {from} to {to}")]
    CastError { from: String, to: Type },

    #[error("null reference: {0}")]
    NullReference(String),

    #[error("array index {index} out of bounds for length {len}")]
    ArrayIndexOutOfBounds { index: i64, len: usize },

    #[error("array store: {value} into {component}[]")]
    ArrayStore { value: String, component: Type },

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("no implementation of {owner}.{name} for receiver {receiver}")]
    AbstractMethod {
        owner: ClassName,
        name: String,
        receiver: String,
    },

    #[error("{}", describe_thrown(.0))]
    Thrown(ObjRef),
}

fn describe_thrown(obj: &ObjRef) -> String {
    match obj.message() {
        Some(message) => format!("{}: {message}", obj.runtime_type()),
        None => obj.runtime_type().to_string(),
    }
}

impl InvokeError {
    pub fn type_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        InvokeError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// The exception class this error surfaces as.
    pub fn exception_class(&self) -> ClassName {
        let name = match self {
            InvokeError::TypeMismatch { .. } => well_known::WRONG_METHOD_TYPE_EXCEPTION,
            InvokeError::CastError { .. } => well_known::CLASS_CAST_EXCEPTION,
            InvokeError::NullReference(_) => well_known::NULL_POINTER_EXCEPTION,
            InvokeError::ArrayIndexOutOfBounds { .. } => {
                well_known::ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION
            }
            InvokeError::ArrayStore { .. } => well_known::ARRAY_STORE_EXCEPTION,
            InvokeError::IllegalArgument(_) => well_known::ILLEGAL_ARGUMENT_EXCEPTION,
            InvokeError::IllegalState(_) => well_known::ILLEGAL_STATE_EXCEPTION,
            InvokeError::AbstractMethod { .. } => well_known::ABSTRACT_METHOD_ERROR,
            InvokeError::Thrown(obj) => {
                return match obj.runtime_type() {
                    Type::Class(name) => name.clone(),
                    _ => ClassName::new(well_known::THROWABLE),
                }
            }
        };
        ClassName::new(name)
    }

    pub fn is_instance_of(&self, hierarchy: &dyn ClassHierarchy, kind: &ClassName) -> bool {
        hierarchy.is_subclass_of(&self.exception_class(), kind)
    }

    /// The throwable object handed to exception handlers. Host-thrown objects are passed
    /// through as-is; runtime errors are materialized with their message.
    pub fn to_throwable(&self) -> ObjRef {
        match self {
            InvokeError::Thrown(obj) => obj.clone(),
            other => ObjRef::throwable(other.exception_class(), Some(other.to_string())),
        }
    }
}

impl From<ObjRef> for InvokeError {
    fn from(obj: ObjRef) -> Self {
        InvokeError::Thrown(obj)
    }
}
