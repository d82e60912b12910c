//! Conversion rules between parameter/return types.
//!
//! Two strengths exist:
//! - *implicit* conversions are the ones `asType` may insert: identity, primitive widening,
//!   boxing to the wrapper or one of its supertypes, unboxing (optionally followed by
//!   widening) and static reference upcasts;
//! - *explicit* conversions additionally allow primitive narrowing (bit-level truncation,
//!   `boolean` treated as a one-bit integer), checked reference casts, boxing followed by a
//!   checked cast, and unchecked casts to interface types.
//!
//! `void` only ever appears in return position: converting from `void` produces the zero
//! value of the target, converting to `void` discards the value.

use crate::error::{Result, SignatureError};
use crate::hierarchy::ClassHierarchy;
use crate::signature::SignatureType;
use crate::types::{well_known, PrimitiveKind, Type};

/// Where an unboxing conversion reads its primitive from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnboxSource {
    /// Statically known wrapper class.
    Wrapper(PrimitiveKind),
    /// `java.lang.Number`: any numeric wrapper, checked at call time.
    Number,
    /// `java.lang.Object`: any wrapper, checked at call time.
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    Identity,
    /// Statically assignable reference; no runtime work.
    Upcast,
    Widen {
        from: PrimitiveKind,
        to: PrimitiveKind,
    },
    /// Explicit-only truncating primitive conversion.
    Narrow {
        from: PrimitiveKind,
        to: PrimitiveKind,
    },
    /// Box `kind`; when `cast` is set the box is then checked against that type.
    Box {
        kind: PrimitiveKind,
        cast: Option<Type>,
    },
    /// Unbox, then convert the primitive to `to`. Implicit unboxing only accepts a widening
    /// (or identity) step after unboxing; explicit unboxing accepts any primitive step.
    Unbox {
        source: UnboxSource,
        to: PrimitiveKind,
        explicit: bool,
    },
    /// Checked reference cast; fails at call time with a cast error.
    Cast(Type),
    /// Explicit cast to an interface type that is not verified at call time.
    UncheckedInterfaceCast(Type),
    /// `void -> T`: produce the zero value of `T`.
    ZeroValue(Type),
    /// `T -> void`: drop the value.
    Discard,
}

impl Conversion {
    pub fn is_identity(&self) -> bool {
        matches!(self, Conversion::Identity | Conversion::Upcast)
    }

    /// Whether applying this conversion can fail at call time.
    pub fn is_checked(&self) -> bool {
        match self {
            Conversion::Cast(_) => true,
            Conversion::Box { cast, .. } => cast.is_some(),
            Conversion::Unbox { .. } => true,
            _ => false,
        }
    }
}

/// Classifies the conversion of a value of type `from` into a slot of type `to`.
///
/// Returns `None` when the pair is not convertible at the requested strength.
pub fn classify(
    hierarchy: &dyn ClassHierarchy,
    from: &Type,
    to: &Type,
    explicit: bool,
) -> Option<Conversion> {
    if from == to {
        return Some(Conversion::Identity);
    }

    match (from, to) {
        (Type::Primitive(PrimitiveKind::Void), _) => Some(Conversion::ZeroValue(to.clone())),
        (_, Type::Primitive(PrimitiveKind::Void)) => Some(Conversion::Discard),

        (Type::Primitive(from), Type::Primitive(to)) => {
            if from.widens_to(*to) {
                Some(Conversion::Widen {
                    from: *from,
                    to: *to,
                })
            } else if explicit {
                Some(Conversion::Narrow {
                    from: *from,
                    to: *to,
                })
            } else {
                None
            }
        }

        (Type::Primitive(kind), _) => {
            let wrapper = Type::Class(kind.wrapper());
            if hierarchy.is_assignable(&wrapper, to) {
                Some(Conversion::Box {
                    kind: *kind,
                    cast: None,
                })
            } else if explicit {
                Some(Conversion::Box {
                    kind: *kind,
                    cast: Some(to.clone()),
                })
            } else {
                None
            }
        }

        (_, Type::Primitive(to)) => classify_unbox(from, *to, explicit),

        _ => {
            if hierarchy.is_assignable(from, to) {
                Some(Conversion::Upcast)
            } else if !explicit {
                None
            } else if to.class_name().is_some_and(|name| hierarchy.is_interface(name)) {
                Some(Conversion::UncheckedInterfaceCast(to.clone()))
            } else {
                Some(Conversion::Cast(to.clone()))
            }
        }
    }
}

fn classify_unbox(from: &Type, to: PrimitiveKind, explicit: bool) -> Option<Conversion> {
    let source = if from.is_object() {
        UnboxSource::Dynamic
    } else if from.class_name().is_some_and(|name| name.is(well_known::NUMBER)) {
        if !to.is_numeric() && !explicit {
            return None;
        }
        UnboxSource::Number
    } else {
        let kind = from.unboxed_kind().filter(|kind| *kind != PrimitiveKind::Void)?;
        if !explicit && kind != to && !kind.widens_to(to) {
            return None;
        }
        UnboxSource::Wrapper(kind)
    };
    Some(Conversion::Unbox {
        source,
        to,
        explicit,
    })
}

/// `isConvertibleTo(from, to, explicit)`.
pub fn is_convertible(
    hierarchy: &dyn ClassHierarchy,
    from: &Type,
    to: &Type,
    explicit: bool,
) -> bool {
    classify(hierarchy, from, to, explicit).is_some()
}

/// Per-slot conversions turning a call of type `caller` into a call of type `callee`.
///
/// Parameters convert caller-to-callee, the return value converts callee-to-caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePlan {
    pub params: Vec<Conversion>,
    pub ret: Conversion,
}

impl SignaturePlan {
    pub fn is_identity(&self) -> bool {
        self.ret.is_identity() && self.params.iter().all(Conversion::is_identity)
    }

    pub fn params_are_identity(&self) -> bool {
        self.params.iter().all(Conversion::is_identity)
    }
}

pub fn plan_signature(
    hierarchy: &dyn ClassHierarchy,
    caller: &SignatureType,
    callee: &SignatureType,
    explicit: bool,
) -> Result<SignaturePlan> {
    if caller.parameter_count() != callee.parameter_count() {
        return Err(SignatureError::Arity {
            expected: callee.parameter_count(),
            found: caller.parameter_count(),
        });
    }

    let params = caller
        .parameters()
        .iter()
        .zip(callee.parameters())
        .enumerate()
        .map(|(index, (from, to))| {
            classify(hierarchy, from, to, explicit)
                .ok_or_else(|| SignatureError::mismatch(Some(index), from, to))
        })
        .collect::<Result<Vec<_>>>()?;

    let ret = classify(hierarchy, callee.return_type(), caller.return_type(), explicit)
        .ok_or_else(|| {
            SignatureError::mismatch(None, callee.return_type(), caller.return_type())
        })?;

    Ok(SignaturePlan { params, ret })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::ClassTable;

    fn class(name: &str) -> Type {
        Type::class(name)
    }

    #[test]
    fn boxing_targets() {
        let table = ClassTable::with_well_known();
        let int = Type::INT;
        assert_eq!(
            classify(&table, &int, &class(well_known::INTEGER), false),
            Some(Conversion::Box {
                kind: PrimitiveKind::Int,
                cast: None
            })
        );
        assert!(is_convertible(&table, &int, &class(well_known::NUMBER), false));
        assert!(is_convertible(&table, &int, &Type::object(), false));
        assert!(!is_convertible(&table, &int, &class(well_known::LONG), false));
        assert_eq!(
            classify(&table, &int, &class(well_known::LONG), true),
            Some(Conversion::Box {
                kind: PrimitiveKind::Int,
                cast: Some(class(well_known::LONG))
            })
        );
    }

    #[test]
    fn unboxing_sources() {
        let table = ClassTable::with_well_known();
        let integer = class(well_known::INTEGER);
        assert!(is_convertible(&table, &integer, &Type::INT, false));
        assert!(is_convertible(&table, &integer, &Type::LONG, false));
        assert!(!is_convertible(&table, &integer, &Type::SHORT, false));
        assert!(is_convertible(&table, &integer, &Type::SHORT, true));

        assert_eq!(
            classify(&table, &Type::object(), &Type::INT, false),
            Some(Conversion::Unbox {
                source: UnboxSource::Dynamic,
                to: PrimitiveKind::Int,
                explicit: false
            })
        );
        assert!(is_convertible(&table, &class(well_known::NUMBER), &Type::DOUBLE, false));
        assert!(!is_convertible(&table, &class(well_known::NUMBER), &Type::BOOLEAN, false));
        assert!(!is_convertible(&table, &Type::string(), &Type::INT, true));
        assert!(!is_convertible(&table, &class(well_known::COMPARABLE), &Type::INT, false));
    }

    #[test]
    fn references_need_explicit_casts_to_narrow() {
        let table = ClassTable::with_well_known();
        assert_eq!(
            classify(&table, &Type::string(), &Type::object(), false),
            Some(Conversion::Upcast)
        );
        assert_eq!(classify(&table, &Type::object(), &Type::string(), false), None);
        assert_eq!(
            classify(&table, &Type::object(), &Type::string(), true),
            Some(Conversion::Cast(Type::string()))
        );
        assert_eq!(
            classify(&table, &class(well_known::INTEGER), &class(well_known::CHAR_SEQUENCE), true),
            Some(Conversion::UncheckedInterfaceCast(class(well_known::CHAR_SEQUENCE)))
        );
    }

    #[test]
    fn void_conversions_are_always_allowed() {
        let table = ClassTable::with_well_known();
        assert_eq!(
            classify(&table, &Type::VOID, &Type::INT, false),
            Some(Conversion::ZeroValue(Type::INT))
        );
        assert_eq!(
            classify(&table, &Type::string(), &Type::VOID, false),
            Some(Conversion::Discard)
        );
    }

    #[test]
    fn plan_reports_offending_slot() {
        let table = ClassTable::with_well_known();
        let caller = SignatureType::new(Type::INT, vec![Type::INT, Type::object()]).unwrap();
        let callee = SignatureType::new(Type::INT, vec![Type::LONG, Type::string()]).unwrap();
        assert_eq!(
            plan_signature(&table, &caller, &callee, false),
            Err(SignatureError::mismatch(Some(1), &Type::object(), &Type::string()))
        );

        let callee = SignatureType::new(Type::LONG, vec![Type::LONG, Type::object()]).unwrap();
        assert_eq!(
            plan_signature(&table, &caller, &callee, false),
            Err(SignatureError::mismatch(None, &Type::LONG, &Type::INT))
        );

        let plan = plan_signature(&table, &caller, &callee, true).unwrap();
        assert_eq!(
            plan.ret,
            Conversion::Narrow {
                from: PrimitiveKind::Long,
                to: PrimitiveKind::Int
            }
        );
        assert!(!plan.params_are_identity());
    }
}
