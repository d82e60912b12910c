//! The lookup factory: symbolic reference in, checked call target out.

use std::fmt;
use std::sync::Arc;

use junction_config::targets;
use junction_signature::{
    ClassName, SignatureError, SignatureType, Type, ACC_ABSTRACT, ACC_INTERFACE, ACC_PROTECTED,
};

use crate::access::{
    check_member_access, is_same_package, narrow_modes, AccessChecker, ALL_MODES, MODE_PRIVATE,
    MODE_PUBLIC,
};
use crate::error::{LinkError, Result};
use crate::handle::{CallTarget, Form};
use crate::machine::{CodeAddress, MemberSlot};
use crate::resolve::{CallingContext, MethodIdentity, MethodKind, Resolver};
use crate::runtime::Runtime;
use crate::value::Value;

/// Name under which constructors are resolved.
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Creates call targets on behalf of `lookup_class`, within its access `modes`.
///
/// Every `find_*` operation resolves through the [`Resolver`], applies the member access
/// decision table and then consults the [`AccessChecker`]. Errors from either collaborator
/// are returned unchanged.
#[derive(Clone)]
pub struct Lookup {
    runtime: Arc<Runtime>,
    resolver: Arc<dyn Resolver>,
    checker: Arc<dyn AccessChecker>,
    lookup_class: ClassName,
    modes: u8,
}

impl Lookup {
    /// A lookup with full access on behalf of `lookup_class`.
    pub fn new(
        runtime: Arc<Runtime>,
        resolver: Arc<dyn Resolver>,
        checker: Arc<dyn AccessChecker>,
        lookup_class: ClassName,
    ) -> Self {
        Lookup {
            runtime,
            resolver,
            checker,
            lookup_class,
            modes: ALL_MODES,
        }
    }

    pub fn lookup_class(&self) -> &ClassName {
        &self.lookup_class
    }

    pub fn modes(&self) -> u8 {
        self.modes
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// A lookup that only reaches public members of public classes.
    pub fn public_lookup(&self) -> Lookup {
        Lookup {
            lookup_class: ClassName::object(),
            modes: MODE_PUBLIC,
            ..self.clone()
        }
    }

    /// The same lookup re-targeted to `class`, keeping only the modes still valid there.
    pub fn in_class(&self, class: &ClassName) -> Lookup {
        let modes = narrow_modes(self.runtime.hierarchy(), &self.lookup_class, class, self.modes);
        tracing::debug!(
            target: targets::LOOKUP,
            from = %self.lookup_class,
            to = %class,
            modes,
            "narrowed lookup"
        );
        Lookup {
            lookup_class: class.clone(),
            modes,
            ..self.clone()
        }
    }

    fn context(&self) -> CallingContext {
        CallingContext::new(self.lookup_class.clone())
    }

    pub fn find_static(
        &self,
        owner: &ClassName,
        name: &str,
        ty: &SignatureType,
    ) -> Result<CallTarget> {
        let method = self.resolve_method(owner, name, ty, MethodKind::Static)?;
        if !method.is_static() {
            return Err(self.illegal_access(owner, name, "expected a static method"));
        }
        self.check_access(&method.declaring_class, owner, method.access_flags, name)?;
        let entry = resolved_address(&method)?;
        let signature = method.signature.clone();
        let varargs = method.is_varargs();
        let target = CallTarget::build(
            &self.runtime,
            signature,
            Form::Direct {
                method,
                kind: MethodKind::Static,
                entry,
            },
        )?;
        with_varargs(target, varargs)
    }

    /// Instance method dispatched on the receiver's runtime class. An interface `owner`
    /// produces an interface call; methods resolved to a fixed address (final or private)
    /// are called directly.
    pub fn find_virtual(
        &self,
        owner: &ClassName,
        name: &str,
        ty: &SignatureType,
    ) -> Result<CallTarget> {
        let kind = if self.runtime.hierarchy().is_interface(owner) {
            MethodKind::Interface
        } else {
            MethodKind::Virtual
        };
        let method = self.resolve_method(owner, name, ty, kind)?;
        if method.is_static() {
            return Err(self.illegal_access(owner, name, "expected an instance method"));
        }
        self.check_access(&method.declaring_class, owner, method.access_flags, name)?;

        let receiver = self.receiver_type(owner, &method);
        let signature = method.signature.insert_parameter_types(0, &[receiver])?;
        let varargs = method.is_varargs();
        let form = match method.slot {
            MemberSlot::ResolvedAddress(entry) => Form::Direct {
                method,
                kind,
                entry,
            },
            MemberSlot::VTableSlot(slot) => Form::Virtual { method, slot },
            MemberSlot::ITableSlot(slot) => Form::Interface { method, slot },
            other => return Err(unexpected_slot(&method, other)),
        };
        let target = CallTarget::build(&self.runtime, signature, form)?;
        with_varargs(target, varargs)
    }

    /// Non-virtual call of `owner.name` with a receiver of type `special_caller`, which must
    /// be this lookup's class.
    pub fn find_special(
        &self,
        owner: &ClassName,
        name: &str,
        ty: &SignatureType,
        special_caller: &ClassName,
    ) -> Result<CallTarget> {
        if special_caller != &self.lookup_class || self.modes & MODE_PRIVATE == 0 {
            return Err(self.illegal_access(
                owner,
                name,
                "special calls need private access to the calling class",
            ));
        }
        if !self.runtime.hierarchy().is_subclass_of(special_caller, owner) {
            return Err(self.illegal_access(owner, name, "caller is not a subclass of the owner"));
        }
        let method = self.resolve_method(owner, name, ty, MethodKind::Special)?;
        if method.is_static() {
            return Err(self.illegal_access(owner, name, "expected an instance method"));
        }
        self.check_access(&method.declaring_class, owner, method.access_flags, name)?;
        let entry = self.special_entry(&method)?;
        let signature = method
            .signature
            .insert_parameter_types(0, &[Type::Class(special_caller.clone())])?;
        let varargs = method.is_varargs();
        let target = CallTarget::build(
            &self.runtime,
            signature,
            Form::Direct {
                method,
                kind: MethodKind::Special,
                entry,
            },
        )?;
        with_varargs(target, varargs)
    }

    /// Allocates an instance of `owner` and runs the constructor of type `ty`, which must
    /// return `void`. The resulting target returns the new instance.
    pub fn find_constructor(&self, owner: &ClassName, ty: &SignatureType) -> Result<CallTarget> {
        if !ty.return_type().is_void() {
            return Err(SignatureError::mismatch(None, ty.return_type(), &Type::VOID).into());
        }
        let abstract_class = self
            .runtime
            .hierarchy()
            .class_info(owner)
            .is_some_and(|info| info.access_flags & (ACC_ABSTRACT | ACC_INTERFACE) != 0);
        if abstract_class {
            return Err(self.illegal_access(owner, CONSTRUCTOR_NAME, "class is abstract"));
        }
        let method = self.resolve_method(owner, CONSTRUCTOR_NAME, ty, MethodKind::Constructor)?;
        self.check_access(&method.declaring_class, owner, method.access_flags, CONSTRUCTOR_NAME)?;
        let entry = resolved_address(&method)?;
        let signature = method.signature.change_return_type(Type::Class(owner.clone()));
        let varargs = method.is_varargs();
        let target = CallTarget::build(
            &self.runtime,
            signature,
            Form::Direct {
                method,
                kind: MethodKind::Constructor,
                entry,
            },
        )?;
        with_varargs(target, varargs)
    }

    /// `(owner) -> ty`.
    pub fn find_getter(&self, owner: &ClassName, name: &str, ty: &Type) -> Result<CallTarget> {
        self.find_field(owner, name, ty, false, false)
    }

    /// `(owner, ty) -> void`.
    pub fn find_setter(&self, owner: &ClassName, name: &str, ty: &Type) -> Result<CallTarget> {
        self.find_field(owner, name, ty, false, true)
    }

    /// `() -> ty`.
    pub fn find_static_getter(
        &self,
        owner: &ClassName,
        name: &str,
        ty: &Type,
    ) -> Result<CallTarget> {
        self.find_field(owner, name, ty, true, false)
    }

    /// `(ty) -> void`.
    pub fn find_static_setter(
        &self,
        owner: &ClassName,
        name: &str,
        ty: &Type,
    ) -> Result<CallTarget> {
        self.find_field(owner, name, ty, true, true)
    }

    /// `find_virtual` on the receiver's runtime class, bound to `receiver`.
    pub fn bind(&self, receiver: Value, name: &str, ty: &SignatureType) -> Result<CallTarget> {
        let class = match receiver.runtime_type() {
            Some(Type::Class(class)) => class,
            Some(other) => {
                return Err(LinkError::IllegalArgument(format!(
                    "cannot bind a method to a receiver of type {other}"
                )))
            }
            None => {
                return Err(LinkError::IllegalArgument(
                    "cannot bind a method to a null receiver".to_string(),
                ))
            }
        };
        let target = self.find_virtual(&class, name, ty)?;
        let bound = target.as_fixed_arity().bind_to(receiver)?;
        if !target.is_varargs_collector() {
            return Ok(bound);
        }
        let Some(array) = bound.signature().last_parameter_type().cloned() else {
            return Ok(bound);
        };
        bound.as_varargs_collector(&array)
    }

    fn find_field(
        &self,
        owner: &ClassName,
        name: &str,
        ty: &Type,
        want_static: bool,
        setter: bool,
    ) -> Result<CallTarget> {
        let field = self
            .resolver
            .resolve_field(owner, name, ty, &self.context())
            .map_err(|err| self.log_resolution_failure(owner, name, err))?;
        if field.is_static() != want_static {
            let reason = if want_static {
                "expected a static field"
            } else {
                "expected an instance field"
            };
            return Err(self.illegal_access(owner, name, reason));
        }
        if setter && field.is_final() {
            return Err(self.illegal_access(owner, name, "field is final"));
        }
        self.check_access(&field.declaring_class, owner, field.access_flags, name)?;

        let MemberSlot::FieldOffset(offset) = field.slot else {
            return Err(LinkError::IllegalArgument(format!(
                "field {owner}.{name} resolved to {:?}",
                field.slot
            )));
        };
        let receiver = Type::Class(owner.clone());
        let field_type = field.ty.clone();
        let (signature, form) = match (want_static, setter) {
            (false, false) => (
                SignatureType::new(field_type, vec![receiver])?,
                Form::FieldGet { field, offset },
            ),
            (false, true) => (
                SignatureType::new(Type::VOID, vec![receiver, field_type])?,
                Form::FieldSet { field, offset },
            ),
            (true, false) => (
                SignatureType::new(field_type, Vec::new())?,
                Form::FieldGet { field, offset },
            ),
            (true, true) => (
                SignatureType::new(Type::VOID, vec![field_type])?,
                Form::FieldSet { field, offset },
            ),
        };
        CallTarget::build(&self.runtime, signature, form)
    }

    fn resolve_method(
        &self,
        owner: &ClassName,
        name: &str,
        ty: &SignatureType,
        kind: MethodKind,
    ) -> Result<MethodIdentity> {
        let method = self
            .resolver
            .resolve_method(owner, name, ty, kind, &self.context())
            .map_err(|err| self.log_resolution_failure(owner, name, err))?;
        tracing::trace!(
            target: targets::LOOKUP,
            owner = %owner,
            name,
            %kind,
            declaring = %method.declaring_class,
            slot = ?method.slot,
            "resolved method"
        );
        Ok(method)
    }

    /// The declaring class's own code for `method`, bypassing overrides in subclasses.
    fn special_entry(&self, method: &MethodIdentity) -> Result<CodeAddress> {
        let declaring = Type::Class(method.declaring_class.clone());
        let machine = self.runtime.machine();
        let entry = match method.slot {
            MemberSlot::ResolvedAddress(entry) => Some(entry),
            MemberSlot::VTableSlot(slot) => machine.virtual_entry(&declaring, slot),
            MemberSlot::ITableSlot(slot) => {
                machine.interface_entry(&declaring, &method.declaring_class, slot)
            }
            other => return Err(unexpected_slot(method, other)),
        };
        entry.ok_or_else(|| {
            LinkError::IllegalArgument(format!(
                "abstract method {}.{} has no code for a special call",
                method.declaring_class, method.name
            ))
        })
    }

    fn log_resolution_failure(&self, owner: &ClassName, name: &str, err: LinkError) -> LinkError {
        tracing::debug!(
            target: targets::LOOKUP,
            owner = %owner,
            name,
            caller = %self.lookup_class,
            error = %err,
            "resolution failed"
        );
        err
    }

    /// Protected instance members reached from another package only accept receivers of
    /// the lookup class.
    fn receiver_type(&self, owner: &ClassName, method: &MethodIdentity) -> Type {
        let restricted = method.access_flags & ACC_PROTECTED != 0
            && !is_same_package(&method.declaring_class, &self.lookup_class)
            && self
                .runtime
                .hierarchy()
                .is_subclass_of(&self.lookup_class, owner);
        if restricted {
            Type::Class(self.lookup_class.clone())
        } else {
            Type::Class(owner.clone())
        }
    }

    fn check_access(
        &self,
        defining: &ClassName,
        reference: &ClassName,
        access_flags: u16,
        member: &str,
    ) -> Result<()> {
        let decision = check_member_access(
            self.runtime.hierarchy(),
            &self.lookup_class,
            self.modes,
            defining,
            reference,
            access_flags,
        );
        if let Err(reason) = decision {
            return Err(self.illegal_access(reference, member, reason));
        }
        self.checker
            .check(defining, reference, access_flags, &self.context())
            .map_err(|err| {
                tracing::debug!(
                    target: targets::LOOKUP,
                    owner = %reference,
                    member,
                    error = %err,
                    "access checker rejected member"
                );
                err
            })
    }

    fn illegal_access(&self, owner: &ClassName, member: &str, reason: &str) -> LinkError {
        tracing::debug!(
            target: targets::LOOKUP,
            owner = %owner,
            member,
            caller = %self.lookup_class,
            reason,
            "access denied"
        );
        LinkError::IllegalAccess {
            owner: owner.clone(),
            member: member.to_string(),
            caller: self.lookup_class.clone(),
            reason: reason.to_string(),
        }
    }
}

fn resolved_address(method: &MethodIdentity) -> Result<CodeAddress> {
    match method.slot {
        MemberSlot::ResolvedAddress(entry) => Ok(entry),
        other => Err(unexpected_slot(method, other)),
    }
}

fn unexpected_slot(method: &MethodIdentity, slot: MemberSlot) -> LinkError {
    LinkError::IllegalArgument(format!(
        "method {}.{} resolved to {slot:?}",
        method.declaring_class, method.name
    ))
}

/// Varargs methods come back as varargs collectors over their trailing array.
fn with_varargs(target: CallTarget, varargs: bool) -> Result<CallTarget> {
    let array = match target.signature().last_parameter_type() {
        Some(array) if varargs && array.is_array() => array.clone(),
        _ => return Ok(target),
    };
    target.as_varargs_collector(&array)
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookup")
            .field("lookup_class", &self.lookup_class)
            .field("modes", &self.modes)
            .finish_non_exhaustive()
    }
}
