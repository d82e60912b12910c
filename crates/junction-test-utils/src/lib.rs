//! Utilities shared by junction integration tests.
//!
//! [`FixtureWorld`] is a small in-memory host: a class table, method bodies written as Rust
//! closures, virtual and interface tables, instance and static field storage, and an access
//! checker that can be told to reject whole classes. Build it, then call
//! [`FixtureWorld::build`] to get a [`Fixture`] with a [`Runtime`] and lookups.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Once};

use junction_config::JunctionConfig;
use junction_invoke::{
    AccessChecker, CallingContext, CodeAddress, FieldCell, FieldIdentity, Interpreter,
    InvokeError, LinkError, Lookup, Machine, MemberSlot, MethodIdentity, MethodKind, ObjRef,
    Resolver, Runtime, Value, CONSTRUCTOR_NAME,
};
use junction_signature::{
    ClassHierarchy, ClassInfo, ClassName, ClassTable, SignatureType, Type, ACC_ABSTRACT,
    ACC_FINAL, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC,
};
use parking_lot::Mutex;

pub type MethodBody = Arc<dyn Fn(&[Value]) -> Result<Value, InvokeError> + Send + Sync>;

/// Shorthand for building a valid signature in tests.
pub fn sig(ret: Type, params: &[Type]) -> SignatureType {
    SignatureType::new(ret, params.to_vec()).expect("test signature should be valid")
}

/// An exception object of `class` wrapped as an invocation error, for method bodies.
pub fn throw(class: &str, message: &str) -> InvokeError {
    InvokeError::Thrown(ObjRef::throwable(ClassName::new(class), Some(message.to_string())))
}

/// Installs a test-writer subscriber once so `RUST_LOG` works under `cargo test`.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Ordered record of labelled events, shared between method bodies and assertions.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }
}

pub struct FixtureWorld {
    classes: ClassTable,
    methods: Vec<MethodIdentity>,
    bodies: Vec<Option<MethodBody>>,
    implementations: HashMap<(ClassName, u32), CodeAddress>,
    next_slot: u32,
    fields: Vec<FieldIdentity>,
    layouts: HashMap<ClassName, Vec<Type>>,
    statics: HashMap<ClassName, Vec<Arc<FieldCell>>>,
    denied: HashSet<ClassName>,
}

impl Default for FixtureWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureWorld {
    pub fn new() -> Self {
        FixtureWorld {
            classes: ClassTable::with_well_known(),
            methods: Vec::new(),
            bodies: Vec::new(),
            implementations: HashMap::new(),
            next_slot: 0,
            fields: Vec::new(),
            layouts: HashMap::new(),
            statics: HashMap::new(),
            denied: HashSet::new(),
        }
    }

    pub fn add_class(&mut self, info: ClassInfo) -> &mut Self {
        self.classes.add(info);
        self
    }

    /// Declares a method with explicit access flags.
    ///
    /// Static, private and final methods get a fixed address. Other methods of a class get
    /// a virtual-table slot and methods of an interface an interface-table slot; a method
    /// with the name and signature of an inherited one reuses the inherited slot, so it
    /// overrides it. `body == None` declares an abstract method.
    pub fn method(
        &mut self,
        owner: &str,
        name: &str,
        signature: SignatureType,
        access_flags: u16,
        body: Option<MethodBody>,
    ) -> MemberSlot {
        let owner = ClassName::new(owner);
        let address = body.map(|body| self.push_body(body));

        let slot = if access_flags & (ACC_STATIC | ACC_PRIVATE | ACC_FINAL) != 0 {
            let Some(address) = address else {
                panic!("{owner}.{name} needs a body");
            };
            MemberSlot::ResolvedAddress(address)
        } else {
            let index = self.inherited_slot(&owner, name, &signature).unwrap_or_else(|| {
                self.next_slot += 1;
                self.next_slot
            });
            if let Some(address) = address {
                self.implementations.insert((owner.clone(), index), address);
            }
            if self.classes.is_interface(&owner) {
                MemberSlot::ITableSlot(index)
            } else {
                MemberSlot::VTableSlot(index)
            }
        };

        self.methods.push(MethodIdentity {
            declaring_class: owner,
            name: name.to_string(),
            signature,
            access_flags: if address.is_none() {
                access_flags | ACC_ABSTRACT
            } else {
                access_flags
            },
            slot,
        });
        slot
    }

    pub fn static_method<F>(
        &mut self,
        owner: &str,
        name: &str,
        signature: SignatureType,
        body: F,
    ) -> MemberSlot
    where
        F: Fn(&[Value]) -> Result<Value, InvokeError> + Send + Sync + 'static,
    {
        self.method(owner, name, signature, ACC_PUBLIC | ACC_STATIC, Some(Arc::new(body)))
    }

    /// Public overridable instance method; `args[0]` is the receiver.
    pub fn virtual_method<F>(
        &mut self,
        owner: &str,
        name: &str,
        signature: SignatureType,
        body: F,
    ) -> MemberSlot
    where
        F: Fn(&[Value]) -> Result<Value, InvokeError> + Send + Sync + 'static,
    {
        self.method(owner, name, signature, ACC_PUBLIC, Some(Arc::new(body)))
    }

    pub fn abstract_method(
        &mut self,
        owner: &str,
        name: &str,
        signature: SignatureType,
    ) -> MemberSlot {
        self.method(owner, name, signature, ACC_PUBLIC, None)
    }

    /// Public constructor taking `params`; the body receives the new instance first.
    pub fn constructor<F>(&mut self, owner: &str, params: &[Type], body: F) -> MemberSlot
    where
        F: Fn(&[Value]) -> Result<Value, InvokeError> + Send + Sync + 'static,
    {
        let address = self.push_body(Arc::new(body));
        let slot = MemberSlot::ResolvedAddress(address);
        self.methods.push(MethodIdentity {
            declaring_class: ClassName::new(owner),
            name: CONSTRUCTOR_NAME.to_string(),
            signature: sig(Type::VOID, params),
            access_flags: ACC_PUBLIC,
            slot,
        });
        slot
    }

    /// Declares a field and returns its offset. Superclass fields must be declared first.
    pub fn field(&mut self, owner: &str, name: &str, ty: Type, access_flags: u16) -> u32 {
        let owner = ClassName::new(owner);
        let offset = if access_flags & ACC_STATIC != 0 {
            let cells = self.statics.entry(owner.clone()).or_default();
            cells.push(Arc::new(FieldCell::new(&ty)));
            cells.len() - 1
        } else {
            let offset = self.instance_layout(&owner).len();
            self.layouts.entry(owner.clone()).or_default().push(ty.clone());
            offset
        };
        let offset = u32::try_from(offset).expect("field offset fits in u32");
        self.fields.push(FieldIdentity {
            declaring_class: owner,
            name: name.to_string(),
            ty,
            access_flags,
            slot: MemberSlot::FieldOffset(offset),
        });
        offset
    }

    /// Makes the access checker reject every member declared by `class`.
    pub fn deny(&mut self, class: &str) -> &mut Self {
        self.denied.insert(ClassName::new(class));
        self
    }

    pub fn build(self) -> Fixture {
        self.build_with_config(JunctionConfig::default())
    }

    pub fn build_with_config(self, config: JunctionConfig) -> Fixture {
        let world = Arc::new(self);
        let runtime = Runtime::with_config(
            world.clone(),
            world.clone(),
            Arc::new(Interpreter),
            config,
        );
        Fixture { world, runtime }
    }

    fn push_body(&mut self, body: MethodBody) -> CodeAddress {
        self.bodies.push(Some(body));
        CodeAddress(self.bodies.len() as u64 - 1)
    }

    fn inherited_slot(
        &self,
        owner: &ClassName,
        name: &str,
        signature: &SignatureType,
    ) -> Option<u32> {
        self.supertypes(owner).into_iter().skip(1).find_map(|class| {
            self.methods.iter().find_map(|method| match method.slot {
                MemberSlot::VTableSlot(index) | MemberSlot::ITableSlot(index)
                    if method.declaring_class == class
                        && method.name == name
                        && &method.signature == signature =>
                {
                    Some(index)
                }
                _ => None,
            })
        })
    }

    /// `class` followed by its supertypes, breadth first.
    fn supertypes(&self, class: &ClassName) -> Vec<ClassName> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([class.clone()]);
        while let Some(current) = queue.pop_front() {
            if out.contains(&current) {
                continue;
            }
            if let Some(info) = self.classes.class_info(&current) {
                queue.extend(info.super_class.iter().cloned());
                queue.extend(info.interfaces.iter().cloned());
            }
            out.push(current);
        }
        out
    }

    fn instance_layout(&self, class: &ClassName) -> Vec<Type> {
        let mut chain = Vec::new();
        let mut current = Some(class.clone());
        while let Some(name) = current {
            current = self
                .classes
                .class_info(&name)
                .and_then(|info| info.super_class.clone());
            chain.push(name);
        }
        chain
            .iter()
            .rev()
            .flat_map(|name| self.layouts.get(name).into_iter().flatten().cloned())
            .collect()
    }

    fn dispatch(&self, receiver: &Type, slot: u32) -> Option<CodeAddress> {
        let class = receiver.class_name().cloned().unwrap_or_else(ClassName::object);
        self.supertypes(&class)
            .into_iter()
            .find_map(|class| self.implementations.get(&(class, slot)).copied())
    }
}

impl ClassHierarchy for FixtureWorld {
    fn class_info(&self, name: &ClassName) -> Option<&ClassInfo> {
        self.classes.class_info(name)
    }
}

impl Resolver for FixtureWorld {
    fn resolve_method(
        &self,
        owner: &ClassName,
        name: &str,
        signature: &SignatureType,
        kind: MethodKind,
        _context: &CallingContext,
    ) -> Result<MethodIdentity, LinkError> {
        let search = if kind == MethodKind::Constructor {
            vec![owner.clone()]
        } else {
            self.supertypes(owner)
        };
        search
            .iter()
            .find_map(|class| {
                self.methods.iter().find(|method| {
                    &method.declaring_class == class
                        && method.name == name
                        && &method.signature == signature
                })
            })
            .cloned()
            .ok_or_else(|| LinkError::NoSuchMethod {
                owner: owner.clone(),
                name: name.to_string(),
                signature: signature.clone(),
            })
    }

    fn resolve_field(
        &self,
        owner: &ClassName,
        name: &str,
        field_type: &Type,
        _context: &CallingContext,
    ) -> Result<FieldIdentity, LinkError> {
        self.supertypes(owner)
            .iter()
            .find_map(|class| {
                self.fields.iter().find(|field| {
                    &field.declaring_class == class && field.name == name && &field.ty == field_type
                })
            })
            .cloned()
            .ok_or_else(|| LinkError::NoSuchField {
                owner: owner.clone(),
                name: name.to_string(),
            })
    }
}

impl Machine for FixtureWorld {
    fn call(&self, entry: CodeAddress, args: &[Value]) -> Result<Value, InvokeError> {
        match self.bodies.get(entry.0 as usize) {
            Some(Some(body)) => body(args),
            _ => Err(InvokeError::IllegalState(format!("no code at {entry}"))),
        }
    }

    fn virtual_entry(&self, receiver: &Type, slot: u32) -> Option<CodeAddress> {
        self.dispatch(receiver, slot)
    }

    fn interface_entry(
        &self,
        receiver: &Type,
        _interface: &ClassName,
        slot: u32,
    ) -> Option<CodeAddress> {
        self.dispatch(receiver, slot)
    }

    fn allocate(&self, class: &ClassName) -> Result<ObjRef, InvokeError> {
        Ok(ObjRef::instance(class.clone(), &self.instance_layout(class)))
    }

    fn static_field(&self, owner: &ClassName, offset: u32) -> Option<Arc<FieldCell>> {
        self.statics.get(owner)?.get(offset as usize).cloned()
    }
}

impl AccessChecker for FixtureWorld {
    fn check(
        &self,
        defining: &ClassName,
        reference: &ClassName,
        _access_flags: u16,
        context: &CallingContext,
    ) -> Result<(), LinkError> {
        if self.denied.contains(defining) {
            return Err(LinkError::SecurityViolation {
                owner: reference.clone(),
                member: format!("members of {defining}"),
                reason: format!("{} is not trusted", context.caller),
            });
        }
        Ok(())
    }
}

/// A built [`FixtureWorld`] together with the runtime targets are created against.
#[derive(Clone)]
pub struct Fixture {
    pub world: Arc<FixtureWorld>,
    pub runtime: Arc<Runtime>,
}

impl Fixture {
    /// A full-access lookup on behalf of `class`.
    pub fn lookup(&self, class: &str) -> Lookup {
        Lookup::new(
            self.runtime.clone(),
            self.world.clone(),
            self.world.clone(),
            ClassName::new(class),
        )
    }

    /// A fresh, zero-initialized instance of `class`.
    pub fn instance(&self, class: &str) -> ObjRef {
        self.world
            .allocate(&ClassName::new(class))
            .expect("fixture allocation cannot fail")
    }
}
