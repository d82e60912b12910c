use std::fmt;

use junction_signature::{
    ClassName, SignatureType, Type, ACC_FINAL, ACC_PRIVATE, ACC_STATIC, ACC_VARARGS, ACC_VOLATILE,
};

use crate::error::LinkError;
use crate::machine::MemberSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Static,
    Virtual,
    Interface,
    Special,
    Constructor,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MethodKind::Static => "static",
            MethodKind::Virtual => "virtual",
            MethodKind::Interface => "interface",
            MethodKind::Special => "special",
            MethodKind::Constructor => "constructor",
        })
    }
}

/// The class on whose behalf a lookup runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallingContext {
    pub caller: ClassName,
}

impl CallingContext {
    pub fn new(caller: ClassName) -> Self {
        Self { caller }
    }
}

/// A resolved method. `signature` never includes the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodIdentity {
    /// Class that declares the method (may be a supertype of the requested owner).
    pub declaring_class: ClassName,
    pub name: String,
    pub signature: SignatureType,
    pub access_flags: u16,
    pub slot: MemberSlot,
}

impl MethodIdentity {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_private(&self) -> bool {
        self.access_flags & ACC_PRIVATE != 0
    }

    pub fn is_final(&self) -> bool {
        self.access_flags & ACC_FINAL != 0
    }

    pub fn is_varargs(&self) -> bool {
        self.access_flags & ACC_VARARGS != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIdentity {
    pub declaring_class: ClassName,
    pub name: String,
    pub ty: Type,
    pub access_flags: u16,
    pub slot: MemberSlot,
}

impl FieldIdentity {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_volatile(&self) -> bool {
        self.access_flags & ACC_VOLATILE != 0
    }

    pub fn is_final(&self) -> bool {
        self.access_flags & ACC_FINAL != 0
    }
}

/// Symbol resolution supplied by the host.
///
/// Resolution errors (`NoSuchMethod`, `NoSuchField`, `IllegalAccess`) are surfaced to the
/// lookup caller unchanged.
pub trait Resolver: Send + Sync {
    fn resolve_method(
        &self,
        owner: &ClassName,
        name: &str,
        signature: &SignatureType,
        kind: MethodKind,
        context: &CallingContext,
    ) -> Result<MethodIdentity, LinkError>;

    fn resolve_field(
        &self,
        owner: &ClassName,
        name: &str,
        field_type: &Type,
        context: &CallingContext,
    ) -> Result<FieldIdentity, LinkError>;
}
