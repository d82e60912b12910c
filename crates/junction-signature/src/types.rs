use std::fmt;
use std::sync::Arc;

/// Binary names of the classes the conversion rules and the invocation core know about.
pub mod well_known {
    pub const OBJECT: &str = "java.lang.Object";
    pub const NUMBER: &str = "java.lang.Number";
    pub const STRING: &str = "java.lang.String";
    pub const CHAR_SEQUENCE: &str = "java.lang.CharSequence";
    pub const COMPARABLE: &str = "java.lang.Comparable";
    pub const SERIALIZABLE: &str = "java.io.Serializable";
    pub const CLONEABLE: &str = "java.lang.Cloneable";

    pub const BOOLEAN: &str = "java.lang.Boolean";
    pub const BYTE: &str = "java.lang.Byte";
    pub const SHORT: &str = "java.lang.Short";
    pub const CHARACTER: &str = "java.lang.Character";
    pub const INTEGER: &str = "java.lang.Integer";
    pub const LONG: &str = "java.lang.Long";
    pub const FLOAT: &str = "java.lang.Float";
    pub const DOUBLE: &str = "java.lang.Double";
    pub const VOID: &str = "java.lang.Void";

    pub const THROWABLE: &str = "java.lang.Throwable";
    pub const EXCEPTION: &str = "java.lang.Exception";
    pub const RUNTIME_EXCEPTION: &str = "java.lang.RuntimeException";
    pub const ERROR: &str = "java.lang.Error";
    pub const ARITHMETIC_EXCEPTION: &str = "java.lang.ArithmeticException";
    pub const CLASS_CAST_EXCEPTION: &str = "java.lang.ClassCastException";
    pub const NULL_POINTER_EXCEPTION: &str = "java.lang.NullPointerException";
    pub const ILLEGAL_ARGUMENT_EXCEPTION: &str = "java.lang.IllegalArgumentException";
    pub const ILLEGAL_STATE_EXCEPTION: &str = "java.lang.IllegalStateException";
    pub const INDEX_OUT_OF_BOUNDS_EXCEPTION: &str = "java.lang.IndexOutOfBoundsException";
    pub const ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION: &str =
        "java.lang.ArrayIndexOutOfBoundsException";
    pub const ARRAY_STORE_EXCEPTION: &str = "java.lang.ArrayStoreException";
    pub const WRONG_METHOD_TYPE_EXCEPTION: &str = "java.lang.invoke.WrongMethodTypeException";
    pub const LINKAGE_ERROR: &str = "java.lang.LinkageError";
    pub const INCOMPATIBLE_CLASS_CHANGE_ERROR: &str = "java.lang.IncompatibleClassChangeError";
    pub const ABSTRACT_METHOD_ERROR: &str = "java.lang.AbstractMethodError";
    pub const VIRTUAL_MACHINE_ERROR: &str = "java.lang.VirtualMachineError";
    pub const OUT_OF_MEMORY_ERROR: &str = "java.lang.OutOfMemoryError";

    pub const METHOD_HANDLE: &str = "java.lang.invoke.MethodHandle";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 9] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Char,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
        PrimitiveKind::Void,
    ];

    pub const NUMERIC: [PrimitiveKind; 7] = [
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Char,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Void => "void",
        }
    }

    pub fn descriptor_char(self) -> char {
        match self {
            PrimitiveKind::Boolean => 'Z',
            PrimitiveKind::Byte => 'B',
            PrimitiveKind::Short => 'S',
            PrimitiveKind::Char => 'C',
            PrimitiveKind::Int => 'I',
            PrimitiveKind::Long => 'J',
            PrimitiveKind::Float => 'F',
            PrimitiveKind::Double => 'D',
            PrimitiveKind::Void => 'V',
        }
    }

    pub fn from_descriptor_char(c: char) -> Option<Self> {
        PrimitiveKind::ALL
            .into_iter()
            .find(|kind| kind.descriptor_char() == c)
    }

    /// Binary name of the box class for this primitive.
    pub fn wrapper_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => well_known::BOOLEAN,
            PrimitiveKind::Byte => well_known::BYTE,
            PrimitiveKind::Short => well_known::SHORT,
            PrimitiveKind::Char => well_known::CHARACTER,
            PrimitiveKind::Int => well_known::INTEGER,
            PrimitiveKind::Long => well_known::LONG,
            PrimitiveKind::Float => well_known::FLOAT,
            PrimitiveKind::Double => well_known::DOUBLE,
            PrimitiveKind::Void => well_known::VOID,
        }
    }

    pub fn wrapper(self) -> ClassName {
        ClassName::new(self.wrapper_name())
    }

    /// Inverse of [`PrimitiveKind::wrapper`]; `java.lang.Void` maps to `void`.
    pub fn from_wrapper(name: &ClassName) -> Option<Self> {
        PrimitiveKind::ALL
            .into_iter()
            .find(|kind| kind.wrapper_name() == name.as_str())
    }

    /// Number of JVM local-variable slots a value of this kind occupies.
    pub fn slot_width(self) -> usize {
        match self {
            PrimitiveKind::Long | PrimitiveKind::Double => 2,
            PrimitiveKind::Void => 0,
            _ => 1,
        }
    }

    /// Integral kinds narrower than `int`; they share the `int` calling convention.
    pub fn is_subword(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Boolean
                | PrimitiveKind::Byte
                | PrimitiveKind::Short
                | PrimitiveKind::Char
        )
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveKind::Boolean | PrimitiveKind::Void)
    }

    pub fn is_floating(self) -> bool {
        matches!(self, PrimitiveKind::Float | PrimitiveKind::Double)
    }

    /// Strict widening primitive conversion (`self != to`).
    ///
    /// Chains: `byte < short < int < long < float < double` and
    /// `char < int < long < float < double`.
    pub fn widens_to(self, to: PrimitiveKind) -> bool {
        use PrimitiveKind::*;
        match self {
            Byte => matches!(to, Short | Int | Long | Float | Double),
            Short | Char => matches!(to, Int | Long | Float | Double),
            Int => matches!(to, Long | Float | Double),
            Long => matches!(to, Float | Double),
            Float => matches!(to, Double),
            Boolean | Double | Void => false,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dotted binary class name (`java.lang.String`, `com.example.Outer$Inner`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassName(Arc<str>);

impl ClassName {
    pub fn new(name: impl AsRef<str>) -> Self {
        ClassName(Arc::from(name.as_ref()))
    }

    /// Accepts a slash-separated internal name (`java/lang/String`).
    pub fn from_internal(name: &str) -> Self {
        ClassName::new(name.replace('/', "."))
    }

    pub fn object() -> Self {
        ClassName::new(well_known::OBJECT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn internal_name(&self) -> String {
        self.0.replace('.', "/")
    }

    /// Package prefix; the empty string for the unnamed package.
    pub fn package(&self) -> &str {
        match self.0.rfind('.') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    pub fn simple_name(&self) -> &str {
        match self.0.rfind('.') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Outermost enclosing class, used as the nest host for private access.
    pub fn top_level(&self) -> &str {
        let start = self.0.rfind('.').map(|idx| idx + 1).unwrap_or(0);
        match self.0[start..].find('$') {
            Some(idx) => &self.0[..start + idx],
            None => &self.0,
        }
    }

    pub fn is(&self, name: &str) -> bool {
        &*self.0 == name
    }
}

impl fmt::Debug for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassName({})", self.0)
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassName {
    fn from(value: &str) -> Self {
        ClassName::new(value)
    }
}

/// A parameter or return type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveKind),
    Class(ClassName),
    Array(Arc<Type>),
}

impl Type {
    pub const VOID: Type = Type::Primitive(PrimitiveKind::Void);
    pub const BOOLEAN: Type = Type::Primitive(PrimitiveKind::Boolean);
    pub const BYTE: Type = Type::Primitive(PrimitiveKind::Byte);
    pub const SHORT: Type = Type::Primitive(PrimitiveKind::Short);
    pub const CHAR: Type = Type::Primitive(PrimitiveKind::Char);
    pub const INT: Type = Type::Primitive(PrimitiveKind::Int);
    pub const LONG: Type = Type::Primitive(PrimitiveKind::Long);
    pub const FLOAT: Type = Type::Primitive(PrimitiveKind::Float);
    pub const DOUBLE: Type = Type::Primitive(PrimitiveKind::Double);

    pub fn class(name: impl AsRef<str>) -> Self {
        Type::Class(ClassName::new(name))
    }

    pub fn object() -> Self {
        Type::Class(ClassName::object())
    }

    pub fn string() -> Self {
        Type::class(well_known::STRING)
    }

    pub fn array_of(component: Type) -> Self {
        Type::Array(Arc::new(component))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Primitive(_))
    }

    pub fn is_reference(&self) -> bool {
        !self.is_primitive()
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveKind::Void))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Type::Class(name) if name.is(well_known::OBJECT))
    }

    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            Type::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn class_name(&self) -> Option<&ClassName> {
        match self {
            Type::Class(name) => Some(name),
            _ => None,
        }
    }

    pub fn component(&self) -> Option<&Type> {
        match self {
            Type::Array(component) => Some(component),
            _ => None,
        }
    }

    pub fn slot_width(&self) -> usize {
        match self {
            Type::Primitive(kind) => kind.slot_width(),
            _ => 1,
        }
    }

    /// Box class for primitives; reference types map to themselves.
    pub fn wrap(&self) -> Type {
        match self {
            Type::Primitive(kind) => Type::Class(kind.wrapper()),
            other => other.clone(),
        }
    }

    /// Primitive for box classes; everything else maps to itself.
    pub fn unwrap(&self) -> Type {
        match self {
            Type::Class(name) => match PrimitiveKind::from_wrapper(name) {
                Some(kind) => Type::Primitive(kind),
                None => self.clone(),
            },
            other => other.clone(),
        }
    }

    /// The primitive boxed by this class, if it is one of the wrapper classes.
    pub fn unboxed_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Type::Class(name) => PrimitiveKind::from_wrapper(name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(kind) => f.write_str(kind.name()),
            Type::Class(name) => f.write_str(name.as_str()),
            Type::Array(component) => write!(f, "{component}[]"),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<PrimitiveKind> for Type {
    fn from(kind: PrimitiveKind) -> Self {
        Type::Primitive(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_name_parts() {
        let name = ClassName::new("com.example.Outer$Inner");
        assert_eq!(name.package(), "com.example");
        assert_eq!(name.simple_name(), "Outer$Inner");
        assert_eq!(name.top_level(), "com.example.Outer");
        assert_eq!(name.internal_name(), "com/example/Outer$Inner");
        assert_eq!(ClassName::new("Bare").package(), "");
    }

    #[test]
    fn wrappers_round_trip() {
        for kind in PrimitiveKind::ALL {
            assert_eq!(PrimitiveKind::from_wrapper(&kind.wrapper()), Some(kind));
            assert_eq!(Type::Primitive(kind).wrap().unwrap(), Type::Primitive(kind));
        }
        assert_eq!(Type::string().unwrap(), Type::string());
    }

    #[test]
    fn display_uses_source_names() {
        assert_eq!(Type::array_of(Type::array_of(Type::INT)).to_string(), "int[][]");
        assert_eq!(Type::string().to_string(), "java.lang.String");
    }
}
