use std::fmt;
use std::sync::Arc;

use crate::descriptor;
use crate::error::{Result, SignatureError};
use crate::types::Type;

/// Upper bound on parameter slots; `long` and `double` take two.
pub const MAX_PARAMETER_SLOTS: usize = 254;

/// Parameter types plus return type of a callable.
///
/// Values are immutable; every derivation returns a new signature and re-checks the slot
/// ceiling and the "no void parameter" rule.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SignatureType {
    params: Arc<[Type]>,
    ret: Type,
}

impl SignatureType {
    pub fn new(ret: Type, params: impl Into<Vec<Type>>) -> Result<Self> {
        let params: Vec<Type> = params.into();
        validate_params(&params)?;
        Ok(SignatureType {
            params: params.into(),
            ret,
        })
    }

    /// `(Object, ..., Object)Object` with `arity` parameters.
    pub fn generic(arity: usize) -> Result<Self> {
        SignatureType::new(Type::object(), vec![Type::object(); arity])
    }

    pub fn from_descriptor_string(desc: &str) -> Result<Self> {
        descriptor::parse_method_descriptor(desc)
    }

    pub fn to_descriptor_string(&self) -> String {
        descriptor::method_descriptor(self)
    }

    pub fn return_type(&self) -> &Type {
        &self.ret
    }

    pub fn parameters(&self) -> &[Type] {
        &self.params
    }

    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    pub fn parameter_type(&self, index: usize) -> Option<&Type> {
        self.params.get(index)
    }

    pub fn last_parameter_type(&self) -> Option<&Type> {
        self.params.last()
    }

    pub fn parameter_slot_count(&self) -> usize {
        self.params.iter().map(Type::slot_width).sum()
    }

    pub fn change_return_type(&self, ret: Type) -> Self {
        SignatureType {
            params: self.params.clone(),
            ret,
        }
    }

    pub fn change_parameter_type(&self, index: usize, ty: Type) -> Result<Self> {
        self.check_index(index, self.params.len())?;
        let mut params = self.params.to_vec();
        params[index] = ty;
        SignatureType::new(self.ret.clone(), params)
    }

    pub fn insert_parameter_types(&self, pos: usize, types: &[Type]) -> Result<Self> {
        self.check_index(pos, self.params.len() + 1)?;
        let mut params = Vec::with_capacity(self.params.len() + types.len());
        params.extend_from_slice(&self.params[..pos]);
        params.extend_from_slice(types);
        params.extend_from_slice(&self.params[pos..]);
        SignatureType::new(self.ret.clone(), params)
    }

    pub fn append_parameter_types(&self, types: &[Type]) -> Result<Self> {
        self.insert_parameter_types(self.params.len(), types)
    }

    /// Removes parameters `start..end`.
    pub fn drop_parameter_types(&self, start: usize, end: usize) -> Result<Self> {
        self.check_index(end, self.params.len() + 1)?;
        if start > end {
            return Err(SignatureError::ParameterIndex {
                index: start,
                len: self.params.len(),
            });
        }
        let mut params = self.params.to_vec();
        params.drain(start..end);
        SignatureType::new(self.ret.clone(), params)
    }

    /// Replaces every reference type (parameters and return) with `Object`.
    pub fn erase(&self) -> Self {
        let erase = |ty: &Type| if ty.is_reference() { Type::object() } else { ty.clone() };
        SignatureType {
            params: self.params.iter().map(erase).collect(),
            ret: erase(&self.ret),
        }
    }

    /// Boxes every primitive slot; `void` becomes `java.lang.Void`.
    pub fn wrap(&self) -> Self {
        SignatureType {
            params: self.params.iter().map(Type::wrap).collect(),
            ret: self.ret.wrap(),
        }
    }

    /// Unboxes every wrapper slot, the inverse of [`SignatureType::wrap`].
    ///
    /// Unboxing can widen `Long`/`Double` parameters to two slots and turns a
    /// `java.lang.Void` parameter into `void`, so the result is re-validated.
    pub fn unwrap(&self) -> Result<Self> {
        let params: Vec<Type> = self.params.iter().map(Type::unwrap).collect();
        SignatureType::new(self.ret.unwrap(), params)
    }

    pub fn has_primitives(&self) -> bool {
        self.ret.is_primitive() || self.params.iter().any(Type::is_primitive)
    }

    pub fn has_wrappers(&self) -> bool {
        self.ret.unboxed_kind().is_some() || self.params.iter().any(|p| p.unboxed_kind().is_some())
    }

    fn check_index(&self, index: usize, bound: usize) -> Result<()> {
        if index >= bound {
            return Err(SignatureError::ParameterIndex {
                index,
                len: self.params.len(),
            });
        }
        Ok(())
    }
}

fn validate_params(params: &[Type]) -> Result<()> {
    if let Some(index) = params.iter().position(Type::is_void) {
        return Err(SignatureError::VoidParameter { index });
    }
    let slots: usize = params.iter().map(Type::slot_width).sum();
    if slots > MAX_PARAMETER_SLOTS {
        return Err(SignatureError::TooManyParameters { slots });
    }
    Ok(())
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, "){}", self.ret)
    }
}

impl fmt::Debug for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureType{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sig(ret: Type, params: &[Type]) -> SignatureType {
        SignatureType::new(ret, params.to_vec()).unwrap()
    }

    #[test]
    fn derivations_return_new_values() {
        let base = sig(Type::INT, &[Type::INT, Type::string()]);

        let inserted = base.insert_parameter_types(1, &[Type::LONG]).unwrap();
        assert_eq!(inserted.parameters(), &[Type::INT, Type::LONG, Type::string()]);
        assert_eq!(base.parameter_count(), 2);

        let dropped = inserted.drop_parameter_types(0, 2).unwrap();
        assert_eq!(dropped.parameters(), &[Type::string()]);

        let changed = base.change_parameter_type(1, Type::object()).unwrap();
        assert_eq!(changed.to_string(), "(int,java.lang.Object)int");
        assert_eq!(base.change_return_type(Type::VOID).to_string(), "(int,java.lang.String)void");

        let appended = base.append_parameter_types(&[Type::BOOLEAN]).unwrap();
        assert_eq!(appended.last_parameter_type(), Some(&Type::BOOLEAN));
    }

    #[test]
    fn derivations_check_indices() {
        let base = sig(Type::VOID, &[Type::INT]);
        assert_eq!(
            base.change_parameter_type(1, Type::INT),
            Err(SignatureError::ParameterIndex { index: 1, len: 1 })
        );
        assert!(base.insert_parameter_types(2, &[Type::INT]).is_err());
        assert!(base.drop_parameter_types(1, 0).is_err());
        assert!(base.drop_parameter_types(0, 2).is_err());
    }

    #[test]
    fn void_parameters_are_rejected_everywhere() {
        assert_eq!(
            SignatureType::new(Type::VOID, vec![Type::INT, Type::VOID]),
            Err(SignatureError::VoidParameter { index: 1 })
        );
        let base = sig(Type::VOID, &[Type::INT]);
        assert!(base.change_parameter_type(0, Type::VOID).is_err());
        assert!(base.append_parameter_types(&[Type::VOID]).is_err());
    }

    #[test]
    fn slot_ceiling_counts_wide_primitives_twice() {
        assert!(SignatureType::new(Type::VOID, vec![Type::INT; 254]).is_ok());
        assert_eq!(
            SignatureType::new(Type::VOID, vec![Type::INT; 255]),
            Err(SignatureError::TooManyParameters { slots: 255 })
        );
        assert!(SignatureType::new(Type::VOID, vec![Type::LONG; 127]).is_ok());
        assert_eq!(
            SignatureType::new(Type::VOID, vec![Type::DOUBLE; 128]),
            Err(SignatureError::TooManyParameters { slots: 256 })
        );

        let full = SignatureType::new(Type::VOID, vec![Type::INT; 254]).unwrap();
        assert_eq!(
            full.append_parameter_types(&[Type::INT]),
            Err(SignatureError::TooManyParameters { slots: 255 })
        );
        assert_eq!(
            full.change_parameter_type(0, Type::LONG),
            Err(SignatureError::TooManyParameters { slots: 255 })
        );
    }

    #[test]
    fn erase_wrap_unwrap() {
        let base = sig(
            Type::string(),
            &[Type::INT, Type::array_of(Type::INT), Type::class("java.lang.Integer")],
        );
        assert_eq!(
            base.erase().to_string(),
            "(int,java.lang.Object,java.lang.Object)java.lang.Object"
        );
        assert_eq!(
            base.wrap().to_string(),
            "(java.lang.Integer,int[],java.lang.Integer)java.lang.String"
        );
        let unwrapped = base.wrap().unwrap().expect("wrapped signature unwraps");
        assert_eq!(unwrapped.to_string(), "(int,int[],int)java.lang.String");
        assert!(base.has_primitives());
        assert!(base.has_wrappers());
        assert_eq!(SignatureType::generic(2).unwrap().erase(), SignatureType::generic(2).unwrap());
    }

    #[test]
    fn unwrap_revalidates_slots_and_void() {
        let boxed_longs = sig(Type::VOID, &vec![Type::class("java.lang.Long"); 200]);
        assert_eq!(boxed_longs.parameter_slot_count(), 200);
        assert_eq!(
            boxed_longs.unwrap(),
            Err(SignatureError::TooManyParameters { slots: 400 })
        );

        let boxed_void = sig(Type::VOID, &[Type::INT, Type::class("java.lang.Void")]);
        assert_eq!(
            boxed_void.unwrap(),
            Err(SignatureError::VoidParameter { index: 1 })
        );

        // Boxing never adds slots, so a full signature still wraps.
        let full = sig(Type::LONG, &vec![Type::LONG; 127]);
        let wrapped = full.wrap();
        assert_eq!(wrapped.parameter_slot_count(), 127);
        assert_eq!(wrapped.unwrap(), Ok(full));
    }
}
