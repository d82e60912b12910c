//! Call targets.
//!
//! A [`CallTarget`] is an immutable, typed, invokable node. Every node carries its
//! signature, the variant-specific payload (`Form`) and the shared dispatch stub for its
//! canonical signature. Adapters hold the targets they delegate to; invocation enters the
//! stub, which runs the node's behaviour and recurses into wrapped targets.
//!
//! The only mutable state on a node is the single-entry `as_type` memo. It holds a weak
//! reference, so an adapter produced by `as_type` never keeps itself alive through the
//! target it wraps, and concurrent writers simply overwrite each other: every candidate
//! is an equivalent adapter.

mod adapters;
mod convert;
mod dispatch;

use std::fmt;
use std::ops::Range;
use std::sync::{Arc, Weak};

use junction_config::targets;
use junction_signature::{
    plan_signature, ClassHierarchy, ClassName, Conversion, SignaturePlan, SignatureType, Type,
};
use parking_lot::Mutex;

use crate::callsite::CallSite;
use crate::error::{InvokeError, LinkError, Result};
use crate::machine::CodeAddress;
use crate::resolve::{FieldIdentity, MethodIdentity, MethodKind};
use crate::runtime::Runtime;
use crate::thunk::{Thunk, ThunkExtra, ThunkKey};
use crate::value::Value;

pub use adapters::{
    array_element_getter, array_element_setter, array_length, catch_exception, constant,
    drop_arguments, exact_invoker, explicit_cast_arguments, filter_arguments,
    filter_return_value, fold_arguments, guard_with_test, identity, insert_arguments, invoker,
    permute_arguments, throw_exception, zero,
};

/// Public discriminant of a call target's variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    DirectCall,
    VirtualCall,
    InterfaceCall,
    FieldRead,
    FieldWrite,
    BoundReceiver,
    ArgumentConvert,
    ReturnFilter,
    ArgumentFilter,
    Collect,
    Spread,
    Permute,
    Insert,
    Drop,
    Fold,
    GuardedDispatch,
    ExceptionGuard,
    VarargsCollector,
    DynamicCallSiteInvoker,
    Constant,
    Identity,
    Throw,
    ArrayElementGetter,
    ArrayElementSetter,
    ArrayLength,
    Invoker,
    Unlinked,
}

pub(crate) enum Form {
    /// Statically bound code. `kind` is the lookup kind; every kind except `Static` and
    /// `Constructor` takes a receiver in slot 0.
    Direct {
        method: MethodIdentity,
        kind: MethodKind,
        entry: CodeAddress,
    },
    Virtual {
        method: MethodIdentity,
        slot: u32,
    },
    Interface {
        method: MethodIdentity,
        slot: u32,
    },
    FieldGet {
        field: FieldIdentity,
        offset: u32,
    },
    FieldSet {
        field: FieldIdentity,
        offset: u32,
    },
    Bound {
        target: CallTarget,
        receiver: Value,
    },
    ConvertArguments {
        target: CallTarget,
        conversions: Vec<Conversion>,
    },
    ConvertReturn {
        target: CallTarget,
        conversion: Conversion,
    },
    FilterReturn {
        target: CallTarget,
        filter: CallTarget,
    },
    FilterArguments {
        target: CallTarget,
        pos: usize,
        filters: Vec<Option<CallTarget>>,
    },
    /// Packs the trailing `count` arguments into a fresh array of `component`.
    Collect {
        target: CallTarget,
        component: Type,
        count: usize,
    },
    /// Expands a trailing array into `count` arguments.
    Spread {
        target: CallTarget,
        count: usize,
    },
    /// Target argument `i` is incoming argument `reorder[i]`.
    Permute {
        target: CallTarget,
        reorder: Vec<usize>,
    },
    Insert {
        target: CallTarget,
        pos: usize,
        values: Vec<Value>,
    },
    Drop {
        target: CallTarget,
        pos: usize,
        count: usize,
    },
    Fold {
        target: CallTarget,
        combiner: CallTarget,
    },
    Guard {
        test: CallTarget,
        then: CallTarget,
        otherwise: CallTarget,
    },
    Catch {
        target: CallTarget,
        kind: ClassName,
        handler: CallTarget,
    },
    Varargs {
        target: CallTarget,
        array: Type,
    },
    Site(CallSite),
    Constant(Value),
    Identity,
    Throw,
    ArrayGet,
    ArraySet,
    ArrayLength,
    Invoker {
        exact: bool,
        ty: SignatureType,
    },
    Unlinked,
}

impl Form {
    fn kind(&self) -> TargetKind {
        match self {
            Form::Direct { .. } => TargetKind::DirectCall,
            Form::Virtual { .. } => TargetKind::VirtualCall,
            Form::Interface { .. } => TargetKind::InterfaceCall,
            Form::FieldGet { .. } => TargetKind::FieldRead,
            Form::FieldSet { .. } => TargetKind::FieldWrite,
            Form::Bound { .. } => TargetKind::BoundReceiver,
            Form::ConvertArguments { .. } => TargetKind::ArgumentConvert,
            Form::ConvertReturn { .. } | Form::FilterReturn { .. } => TargetKind::ReturnFilter,
            Form::FilterArguments { .. } => TargetKind::ArgumentFilter,
            Form::Collect { .. } => TargetKind::Collect,
            Form::Spread { .. } => TargetKind::Spread,
            Form::Permute { .. } => TargetKind::Permute,
            Form::Insert { .. } => TargetKind::Insert,
            Form::Drop { .. } => TargetKind::Drop,
            Form::Fold { .. } => TargetKind::Fold,
            Form::Guard { .. } => TargetKind::GuardedDispatch,
            Form::Catch { .. } => TargetKind::ExceptionGuard,
            Form::Varargs { .. } => TargetKind::VarargsCollector,
            Form::Site(_) => TargetKind::DynamicCallSiteInvoker,
            Form::Constant(_) => TargetKind::Constant,
            Form::Identity => TargetKind::Identity,
            Form::Throw => TargetKind::Throw,
            Form::ArrayGet => TargetKind::ArrayElementGetter,
            Form::ArraySet => TargetKind::ArrayElementSetter,
            Form::ArrayLength => TargetKind::ArrayLength,
            Form::Invoker { .. } => TargetKind::Invoker,
            Form::Unlinked => TargetKind::Unlinked,
        }
    }

    fn wrapped(&self) -> Vec<&CallTarget> {
        match self {
            Form::Bound { target, .. }
            | Form::ConvertArguments { target, .. }
            | Form::ConvertReturn { target, .. }
            | Form::Collect { target, .. }
            | Form::Spread { target, .. }
            | Form::Permute { target, .. }
            | Form::Insert { target, .. }
            | Form::Drop { target, .. }
            | Form::Varargs { target, .. } => vec![target],
            Form::FilterReturn { target, filter } => vec![target, filter],
            Form::FilterArguments {
                target, filters, ..
            } => std::iter::once(target).chain(filters.iter().flatten()).collect(),
            Form::Fold { target, combiner } => vec![combiner, target],
            Form::Guard {
                test,
                then,
                otherwise,
            } => vec![test, then, otherwise],
            Form::Catch {
                target, handler, ..
            } => vec![target, handler],
            _ => Vec::new(),
        }
    }
}

/// An immutable, typed reference to a method, field accessor or adapted composition.
///
/// Cloning is cheap and clones share identity (see [`CallTarget::ptr_eq`]).
#[derive(Clone)]
pub struct CallTarget(Arc<Node>);

struct Node {
    signature: SignatureType,
    form: Form,
    thunk: Arc<dyn Thunk>,
    runtime: Arc<Runtime>,
    as_type_memo: Mutex<Option<Weak<Node>>>,
}

impl CallTarget {
    pub(crate) fn build(
        runtime: &Arc<Runtime>,
        signature: SignatureType,
        form: Form,
    ) -> Result<CallTarget> {
        CallTarget::build_keyed(runtime, signature, form, 0..0, None)
    }

    /// Like [`CallTarget::build`], keeping the slots in `stop` exact in the stub key.
    pub(crate) fn build_keyed(
        runtime: &Arc<Runtime>,
        signature: SignatureType,
        form: Form,
        stop: Range<usize>,
        extra: Option<ThunkExtra>,
    ) -> Result<CallTarget> {
        let thunk = runtime.thunks().get_for(&signature, stop, extra)?;
        Ok(CallTarget(Arc::new(Node {
            signature,
            form,
            thunk,
            runtime: runtime.clone(),
            as_type_memo: Mutex::new(None),
        })))
    }

    pub fn signature(&self) -> &SignatureType {
        &self.0.signature
    }

    pub fn kind(&self) -> TargetKind {
        self.0.form.kind()
    }

    pub fn ptr_eq(&self, other: &CallTarget) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Targets this node delegates to, in invocation order.
    pub fn wrapped(&self) -> Vec<CallTarget> {
        self.0.form.wrapped().into_iter().cloned().collect()
    }

    pub fn thunk_key(&self) -> &ThunkKey {
        self.0.thunk.key()
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.0.runtime
    }

    pub(crate) fn form(&self) -> &Form {
        &self.0.form
    }

    pub(crate) fn hierarchy(&self) -> &dyn ClassHierarchy {
        self.0.runtime.hierarchy()
    }

    /// Enters this target's dispatch stub. Arguments must already match the signature.
    pub(crate) fn enter(&self, args: Vec<Value>) -> std::result::Result<Value, InvokeError> {
        self.0.thunk.enter(self, args)
    }

    /// Invokes with arguments that must match the signature exactly: primitives of the
    /// declared kind, references that are `null` or instances of the declared type.
    pub fn invoke_exact(&self, args: Vec<Value>) -> std::result::Result<Value, InvokeError> {
        self.check_arguments(&args)?;
        self.enter(args)
    }

    /// Invokes with a symbolic call type that must equal the signature.
    pub fn invoke_exact_typed(
        &self,
        call_type: &SignatureType,
        args: Vec<Value>,
    ) -> std::result::Result<Value, InvokeError> {
        if call_type != self.signature() {
            return Err(InvokeError::type_mismatch(self.signature(), call_type));
        }
        self.invoke_exact(args)
    }

    /// Invokes as if through a call site of type `call_type`, adapting with `as_type`.
    pub fn invoke_typed(
        &self,
        call_type: &SignatureType,
        args: Vec<Value>,
    ) -> std::result::Result<Value, InvokeError> {
        let adapted = self.as_type(call_type).map_err(|err| {
            tracing::trace!(target: targets::HANDLE, error = %err, "call type is not convertible");
            InvokeError::type_mismatch(self.signature(), call_type)
        })?;
        adapted.invoke_exact(args)
    }

    /// Arity- and type-flexible invocation.
    ///
    /// The call type is taken from the runtime types of `args` (`null` takes the declared
    /// parameter type, or `Object` for a primitive parameter) and the declared return type.
    /// Varargs collectors collect trailing arguments unless the call already passes an
    /// assignable array in the trailing position.
    pub fn invoke(&self, args: Vec<Value>) -> std::result::Result<Value, InvokeError> {
        let target = self.arity_adapted(&args)?;
        let call_type = target.call_type_of(&args)?;
        target.invoke_typed(&call_type, args)
    }

    fn check_arguments(&self, args: &[Value]) -> std::result::Result<(), InvokeError> {
        let params = self.signature().parameters();
        let hierarchy = self.hierarchy();
        let matches = args.len() == params.len()
            && args
                .iter()
                .zip(params)
                .all(|(value, ty)| value.conforms_to(hierarchy, ty));
        if matches {
            Ok(())
        } else {
            Err(InvokeError::type_mismatch(self.signature(), describe_arguments(args)))
        }
    }

    fn arity_adapted(&self, args: &[Value]) -> std::result::Result<CallTarget, InvokeError> {
        let Form::Varargs { target, array } = self.form() else {
            return Ok(self.clone());
        };
        let fixed = self.signature().parameter_count().saturating_sub(1);
        let trailing = args.get(fixed).filter(|_| args.len() == fixed + 1);
        if let (Some(value), Some(declared)) = (trailing, self.signature().parameter_type(fixed)) {
            if value.conforms_to(self.hierarchy(), declared) {
                return Ok(target.clone());
            }
        }
        if args.len() < fixed {
            return Err(InvokeError::type_mismatch(self.signature(), describe_arguments(args)));
        }
        tracing::trace!(
            target: targets::HANDLE,
            signature = %self.signature(),
            collected = args.len() - fixed,
            "collecting trailing arguments"
        );
        target
            .as_collector(array, args.len() - fixed)
            .map_err(|_| InvokeError::type_mismatch(self.signature(), describe_arguments(args)))
    }

    fn call_type_of(&self, args: &[Value]) -> std::result::Result<SignatureType, InvokeError> {
        let params = self.signature().parameters();
        if args.len() != params.len() {
            return Err(InvokeError::type_mismatch(self.signature(), describe_arguments(args)));
        }
        let types: Vec<Type> = args
            .iter()
            .zip(params)
            .map(|(value, declared)| match value.runtime_type() {
                Some(ty) => ty,
                None if declared.is_reference() => declared.clone(),
                None => Type::object(),
            })
            .collect();
        SignatureType::new(self.signature().return_type().clone(), types)
            .map_err(|_| InvokeError::type_mismatch(self.signature(), describe_arguments(args)))
    }

    /// Adapts this target to `ty` with the implicit conversion rules.
    ///
    /// Returns `self` when the signature already matches. Otherwise a return conversion is
    /// wrapped first and an argument conversion second, so each request adds at most two
    /// nodes. The most recent result is remembered per target.
    pub fn as_type(&self, ty: &SignatureType) -> Result<CallTarget> {
        if self.signature() == ty {
            return Ok(self.clone());
        }
        let memoize = self.0.runtime.config().invoke.memoize_as_type;
        if memoize {
            if let Some(previous) = self.memoized_as_type(ty) {
                return Ok(previous);
            }
        }

        let plan = plan_signature(self.hierarchy(), ty, self.signature(), false)?;
        let adapted = self.convert(ty, plan)?;

        if memoize {
            let mut memo = self.0.as_type_memo.lock();
            if memo.is_some() {
                tracing::trace!(
                    target: targets::HANDLE,
                    from = %self.signature(),
                    to = %ty,
                    "replacing as_type memo"
                );
            }
            *memo = Some(Arc::downgrade(&adapted.0));
        }
        Ok(adapted)
    }

    fn memoized_as_type(&self, ty: &SignatureType) -> Option<CallTarget> {
        let previous = self.0.as_type_memo.lock().as_ref()?.upgrade()?;
        (previous.signature == *ty).then(|| CallTarget(previous))
    }

    /// Wraps the return conversion, then the argument conversions, skipping identities.
    pub(crate) fn convert(&self, ty: &SignatureType, plan: SignaturePlan) -> Result<CallTarget> {
        let runtime = self.runtime();
        let mut current = self.clone();
        if self.signature().return_type() != ty.return_type() {
            let signature = self.signature().change_return_type(ty.return_type().clone());
            current = CallTarget::build(
                runtime,
                signature,
                Form::ConvertReturn {
                    target: current,
                    conversion: plan.ret,
                },
            )?;
        }
        if current.signature() != ty {
            current = CallTarget::build(
                runtime,
                ty.clone(),
                Form::ConvertArguments {
                    target: current,
                    conversions: plan.params,
                },
            )?;
        }
        Ok(current)
    }

    /// Fixes the leading parameter to `receiver`.
    ///
    /// The leading parameter must be a reference. A `null` receiver is accepted here and
    /// only fails when an instance method is invoked through the bound target.
    pub fn bind_to(&self, receiver: Value) -> Result<CallTarget> {
        let first = match self.signature().parameter_type(0) {
            Some(ty) if ty.is_reference() => ty.clone(),
            Some(ty) => {
                return Err(LinkError::IllegalArgument(format!(
                    "cannot bind a receiver to a leading {ty} parameter"
                )))
            }
            None => {
                return Err(LinkError::IllegalArgument(
                    "target has no leading parameter to bind".to_string(),
                ))
            }
        };
        let description = receiver.describe_type();
        let receiver = convert::convert_constant(self.hierarchy(), receiver, &first)
            .ok_or_else(|| {
                LinkError::IllegalArgument(format!("cannot bind {description} as {first}"))
            })?;
        let signature = self.signature().drop_parameter_types(0, 1)?;
        CallTarget::build(
            self.runtime(),
            signature,
            Form::Bound {
                target: self.clone(),
                receiver,
            },
        )
    }

    /// Replaces the trailing array parameter with `count` parameters of its component type.
    pub fn as_collector(&self, array_type: &Type, count: usize) -> Result<CallTarget> {
        self.check_trailing_array(array_type)?;
        let component = array_type.component().cloned().ok_or_else(|| not_an_array(array_type))?;
        let n = self.signature().parameter_count();
        let signature = self
            .signature()
            .drop_parameter_types(n - 1, n)?
            .append_parameter_types(&vec![component.clone(); count])?;
        CallTarget::build(
            self.runtime(),
            signature,
            Form::Collect {
                target: self.clone(),
                component,
                count,
            },
        )
    }

    /// Replaces the trailing `count` parameters with one array parameter whose elements
    /// are spread back out at call time.
    pub fn as_spreader(&self, array_type: &Type, count: usize) -> Result<CallTarget> {
        let component = array_type.component().cloned().ok_or_else(|| not_an_array(array_type))?;
        let n = self.signature().parameter_count();
        if count > n {
            return Err(LinkError::IllegalArgument(format!(
                "cannot spread {count} arguments into a target with {n} parameters"
            )));
        }
        let fixed = &self.signature().parameters()[..n - count];
        let ret = self.signature().return_type().clone();

        let mut spread_params = fixed.to_vec();
        spread_params.extend(std::iter::repeat(component).take(count));
        let adapted = self.as_type(&SignatureType::new(ret.clone(), spread_params)?)?;

        let mut params = fixed.to_vec();
        params.push(array_type.clone());
        CallTarget::build(
            self.runtime(),
            SignatureType::new(ret, params)?,
            Form::Spread {
                target: adapted,
                count,
            },
        )
    }

    /// Marks the target as accepting a variable number of trailing arguments through
    /// [`CallTarget::invoke`].
    pub fn as_varargs_collector(&self, array_type: &Type) -> Result<CallTarget> {
        self.check_trailing_array(array_type)?;
        if let Form::Varargs { array, .. } = self.form() {
            if array == array_type {
                return Ok(self.clone());
            }
        }
        let target = self.as_fixed_arity();
        CallTarget::build(
            self.runtime(),
            self.signature().clone(),
            Form::Varargs {
                target,
                array: array_type.clone(),
            },
        )
    }

    pub fn as_fixed_arity(&self) -> CallTarget {
        match self.form() {
            Form::Varargs { target, .. } => target.clone(),
            _ => self.clone(),
        }
    }

    pub fn is_varargs_collector(&self) -> bool {
        matches!(self.form(), Form::Varargs { .. })
    }

    fn check_trailing_array(&self, array_type: &Type) -> Result<()> {
        if !array_type.is_array() {
            return Err(not_an_array(array_type));
        }
        match self.signature().last_parameter_type() {
            Some(last) if last.is_array() && self.hierarchy().is_assignable(array_type, last) => {
                Ok(())
            }
            Some(last) => Err(LinkError::IllegalArgument(format!(
                "{array_type} is not assignable to trailing parameter {last}"
            ))),
            None => Err(LinkError::IllegalArgument(
                "target has no trailing array parameter".to_string(),
            )),
        }
    }
}

fn not_an_array(ty: &Type) -> LinkError {
    LinkError::IllegalArgument(format!("{ty} is not an array type"))
}

fn describe_arguments(args: &[Value]) -> String {
    let types: Vec<String> = args.iter().map(Value::describe_type).collect();
    format!("({})", types.join(","))
}

impl fmt::Debug for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{}", self.kind(), self.signature())
    }
}
