use crate::types::Type;

pub type Result<T> = std::result::Result<T, SignatureError>;

/// Errors produced while building, deriving or converting signatures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error(
        "signature needs {slots} parameter slots; at most {max} are allowed",
        max = crate::MAX_PARAMETER_SLOTS
    )]
    TooManyParameters { slots: usize },

    #[error("parameter {index} has type void")]
    VoidParameter { index: usize },

    #[error("parameter index {index} out of range for {len} parameters")]
    ParameterIndex { index: usize, len: usize },

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// `index == None` names the return slot.
    #[error("{}: cannot convert {from} to {to}", describe_slot(*.index))]
    Mismatch {
        index: Option<usize>,
        from: Type,
        to: Type,
    },

    #[error("arity mismatch: expected {expected} parameters, found {found}")]
    Arity { expected: usize, found: usize },
}

impl SignatureError {
    pub fn mismatch(index: Option<usize>, from: &Type, to: &Type) -> Self {
        SignatureError::Mismatch {
            index,
            from: from.clone(),
            to: to.clone(),
        }
    }
}

fn describe_slot(index: Option<usize>) -> String {
    match index {
        Some(index) => format!("parameter {index}"),
        None => "return value".to_string(),
    }
}
