use std::fmt;
use std::sync::Arc;

use junction_signature::{ClassName, Type};

use crate::error::InvokeError;
use crate::object::{FieldCell, ObjRef};
use crate::value::Value;

/// Entry point of executable code owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeAddress(pub u64);

impl fmt::Display for CodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Where a resolved member lives. Each member kind carries its own payload instead of
/// sharing one integer whose meaning depends on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberSlot {
    /// Statically bound code (static, special, constructor, final or private methods).
    ResolvedAddress(CodeAddress),
    /// Index into the receiver class's virtual table.
    VTableSlot(u32),
    /// Index into the receiver class's table for the method's interface.
    ITableSlot(u32),
    /// Field offset: instance cell index, or static cell index of the owner.
    FieldOffset(u32),
    None,
}

/// The host runtime executing resolved code.
///
/// Virtual and interface slots are re-read from the receiver's runtime class on every
/// call; implementations must not cache them per call target.
pub trait Machine: Send + Sync {
    fn call(&self, entry: CodeAddress, args: &[Value]) -> Result<Value, InvokeError>;

    fn virtual_entry(&self, receiver: &Type, slot: u32) -> Option<CodeAddress>;

    fn interface_entry(
        &self,
        receiver: &Type,
        interface: &ClassName,
        slot: u32,
    ) -> Option<CodeAddress>;

    /// Allocates an uninitialized instance for a constructor call.
    fn allocate(&self, class: &ClassName) -> Result<ObjRef, InvokeError>;

    fn static_field(&self, owner: &ClassName, offset: u32) -> Option<Arc<FieldCell>>;
}
