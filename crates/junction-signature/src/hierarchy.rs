use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::{well_known, ClassName, Type};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_VOLATILE: u16 = 0x0040;
pub const ACC_VARARGS: u16 = 0x0080;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub name: ClassName,
    pub access_flags: u16,
    pub super_class: Option<ClassName>,
    pub interfaces: Vec<ClassName>,
}

impl ClassInfo {
    /// A public class extending `java.lang.Object`.
    pub fn class(name: impl AsRef<str>) -> Self {
        ClassInfo {
            name: ClassName::new(name),
            access_flags: ACC_PUBLIC,
            super_class: Some(ClassName::object()),
            interfaces: Vec::new(),
        }
    }

    pub fn interface(name: impl AsRef<str>) -> Self {
        ClassInfo {
            name: ClassName::new(name),
            access_flags: ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
            super_class: None,
            interfaces: Vec::new(),
        }
    }

    pub fn extends(mut self, super_class: impl AsRef<str>) -> Self {
        self.super_class = Some(ClassName::new(super_class));
        self
    }

    pub fn implements(mut self, interface: impl AsRef<str>) -> Self {
        self.interfaces.push(ClassName::new(interface));
        self
    }

    pub fn with_flags(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    pub fn is_public(&self) -> bool {
        self.access_flags & ACC_PUBLIC != 0
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }
}

/// Class metadata the conversion rules and the access checks consult.
///
/// Unknown classes are treated as unrelated to everything except themselves and `Object`.
pub trait ClassHierarchy: Send + Sync {
    fn class_info(&self, name: &ClassName) -> Option<&ClassInfo>;

    fn is_interface(&self, name: &ClassName) -> bool {
        self.class_info(name).is_some_and(ClassInfo::is_interface)
    }

    /// Reflexive, transitive subclass/implements relation.
    fn is_subclass_of(&self, sub: &ClassName, sup: &ClassName) -> bool {
        if sub == sup || sup.is(well_known::OBJECT) {
            return true;
        }

        let mut queue: VecDeque<&ClassName> = VecDeque::new();
        let mut seen: HashSet<&ClassName> = HashSet::new();
        queue.push_back(sub);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if current == sup {
                return true;
            }
            let Some(info) = self.class_info(current) else {
                continue;
            };
            queue.extend(info.super_class.iter());
            queue.extend(info.interfaces.iter());
        }
        false
    }

    /// Static assignability of a value of type `from` to a slot of type `to`.
    fn is_assignable(&self, from: &Type, to: &Type) -> bool {
        match (from, to) {
            _ if from == to => true,
            (Type::Primitive(_), _) | (_, Type::Primitive(_)) => false,
            (Type::Class(from), Type::Class(to)) => self.is_subclass_of(from, to),
            (Type::Array(_), Type::Class(to)) => {
                to.is(well_known::OBJECT)
                    || to.is(well_known::CLONEABLE)
                    || to.is(well_known::SERIALIZABLE)
            }
            (Type::Array(from), Type::Array(to)) => {
                from.is_reference() && to.is_reference() && self.is_assignable(from, to)
            }
            (Type::Class(_), Type::Array(_)) => false,
        }
    }

    /// Whether `class` is `java.lang.Throwable` or one of its subclasses.
    fn is_throwable(&self, class: &ClassName) -> bool {
        self.is_subclass_of(class, &ClassName::new(well_known::THROWABLE))
    }
}

/// In-memory class table seeded with the classes the runtime itself relies on.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    classes: HashMap<ClassName, ClassInfo>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Object, the box classes, String, the core exception tree and `MethodHandle`.
    pub fn with_well_known() -> Self {
        use well_known::*;

        let mut table = ClassTable::new();
        table.add(ClassInfo {
            name: ClassName::object(),
            access_flags: ACC_PUBLIC,
            super_class: None,
            interfaces: Vec::new(),
        });
        for iface in [SERIALIZABLE, CLONEABLE, COMPARABLE, CHAR_SEQUENCE] {
            table.add(ClassInfo::interface(iface));
        }

        table.add(
            ClassInfo::class(NUMBER)
                .with_flags(ACC_PUBLIC | ACC_ABSTRACT)
                .implements(SERIALIZABLE),
        );
        for wrapper in [BYTE, SHORT, INTEGER, LONG, FLOAT, DOUBLE] {
            table.add(
                ClassInfo::class(wrapper)
                    .with_flags(ACC_PUBLIC | ACC_FINAL)
                    .extends(NUMBER)
                    .implements(COMPARABLE),
            );
        }
        for wrapper in [BOOLEAN, CHARACTER] {
            table.add(
                ClassInfo::class(wrapper)
                    .with_flags(ACC_PUBLIC | ACC_FINAL)
                    .implements(SERIALIZABLE)
                    .implements(COMPARABLE),
            );
        }
        table.add(ClassInfo::class(VOID).with_flags(ACC_PUBLIC | ACC_FINAL));
        table.add(
            ClassInfo::class(STRING)
                .with_flags(ACC_PUBLIC | ACC_FINAL)
                .implements(SERIALIZABLE)
                .implements(COMPARABLE)
                .implements(CHAR_SEQUENCE),
        );

        table.add(ClassInfo::class(THROWABLE).implements(SERIALIZABLE));
        let throwables: [(&str, &str); 17] = [
            (EXCEPTION, THROWABLE),
            (ERROR, THROWABLE),
            (RUNTIME_EXCEPTION, EXCEPTION),
            (ARITHMETIC_EXCEPTION, RUNTIME_EXCEPTION),
            (CLASS_CAST_EXCEPTION, RUNTIME_EXCEPTION),
            (NULL_POINTER_EXCEPTION, RUNTIME_EXCEPTION),
            (ILLEGAL_ARGUMENT_EXCEPTION, RUNTIME_EXCEPTION),
            (ILLEGAL_STATE_EXCEPTION, RUNTIME_EXCEPTION),
            (INDEX_OUT_OF_BOUNDS_EXCEPTION, RUNTIME_EXCEPTION),
            (ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION, INDEX_OUT_OF_BOUNDS_EXCEPTION),
            (ARRAY_STORE_EXCEPTION, RUNTIME_EXCEPTION),
            (WRONG_METHOD_TYPE_EXCEPTION, RUNTIME_EXCEPTION),
            (LINKAGE_ERROR, ERROR),
            (INCOMPATIBLE_CLASS_CHANGE_ERROR, LINKAGE_ERROR),
            (ABSTRACT_METHOD_ERROR, INCOMPATIBLE_CLASS_CHANGE_ERROR),
            (VIRTUAL_MACHINE_ERROR, ERROR),
            (OUT_OF_MEMORY_ERROR, VIRTUAL_MACHINE_ERROR),
        ];
        for (name, parent) in throwables {
            table.add(ClassInfo::class(name).extends(parent));
        }

        table.add(ClassInfo::class(METHOD_HANDLE).with_flags(ACC_PUBLIC | ACC_ABSTRACT));
        table
    }

    /// Inserts or replaces a class.
    pub fn add(&mut self, info: ClassInfo) {
        self.classes.insert(info.name.clone(), info);
    }

    pub fn contains(&self, name: &ClassName) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassHierarchy for ClassTable {
    fn class_info(&self, name: &ClassName) -> Option<&ClassInfo> {
        self.classes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrappers_are_numbers_and_comparable() {
        let table = ClassTable::with_well_known();
        let integer = Type::class(well_known::INTEGER);
        assert!(table.is_assignable(&integer, &Type::class(well_known::NUMBER)));
        assert!(table.is_assignable(&integer, &Type::class(well_known::COMPARABLE)));
        assert!(table.is_assignable(&integer, &Type::class(well_known::SERIALIZABLE)));
        let boolean = Type::class(well_known::BOOLEAN);
        assert!(!table.is_assignable(&boolean, &Type::class(well_known::NUMBER)));
        assert!(!table.is_assignable(&Type::object(), &integer));
    }

    #[test]
    fn arrays_are_covariant_for_references_only() {
        let table = ClassTable::with_well_known();
        let strings = Type::array_of(Type::string());
        let objects = Type::array_of(Type::object());
        assert!(table.is_assignable(&strings, &objects));
        assert!(!table.is_assignable(&objects, &strings));
        assert!(table.is_assignable(&strings, &Type::object()));
        assert!(table.is_assignable(&strings, &Type::class(well_known::CLONEABLE)));
        assert!(!table.is_assignable(&Type::array_of(Type::INT), &objects));
        assert!(!table.is_assignable(&Type::array_of(Type::INT), &Type::array_of(Type::LONG)));
    }

    #[test]
    fn exception_tree() {
        let table = ClassTable::with_well_known();
        let aioobe = ClassName::new(well_known::ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION);
        assert!(table.is_subclass_of(&aioobe, &ClassName::new(well_known::RUNTIME_EXCEPTION)));
        assert!(table.is_throwable(&aioobe));
        assert!(!table.is_throwable(&ClassName::new(well_known::STRING)));
        assert!(!table.is_subclass_of(
            &ClassName::new(well_known::ARITHMETIC_EXCEPTION),
            &ClassName::new(well_known::OUT_OF_MEMORY_ERROR)
        ));
    }

    #[test]
    fn unknown_classes_only_reach_object() {
        let table = ClassTable::with_well_known();
        let unknown = ClassName::new("com.example.Missing");
        assert!(table.is_subclass_of(&unknown, &unknown));
        assert!(table.is_subclass_of(&unknown, &ClassName::object()));
        assert!(!table.is_subclass_of(&unknown, &ClassName::new(well_known::NUMBER)));
    }
}
