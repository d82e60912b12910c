//! Member access decisions for lookups.
//!
//! The decision table itself lives here; policy beyond it (security managers, module
//! boundaries, caller-sensitive restrictions) is delegated to an [`AccessChecker`].

use junction_signature::{ClassHierarchy, ClassName, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC};

use crate::error::LinkError;
use crate::resolve::CallingContext;

pub const MODE_PUBLIC: u8 = 0x1;
pub const MODE_PACKAGE: u8 = 0x2;
pub const MODE_PROTECTED: u8 = 0x4;
pub const MODE_PRIVATE: u8 = 0x8;
pub const ALL_MODES: u8 = MODE_PUBLIC | MODE_PACKAGE | MODE_PROTECTED | MODE_PRIVATE;

/// External access policy consulted after the decision table allowed an access.
pub trait AccessChecker: Send + Sync {
    fn check(
        &self,
        defining: &ClassName,
        reference: &ClassName,
        access_flags: u16,
        context: &CallingContext,
    ) -> Result<(), LinkError>;
}

/// Policy that allows everything the decision table allows.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAll;

impl AccessChecker for PermitAll {
    fn check(
        &self,
        _defining: &ClassName,
        _reference: &ClassName,
        _access_flags: u16,
        _context: &CallingContext,
    ) -> Result<(), LinkError> {
        Ok(())
    }
}

pub fn is_same_package(a: &ClassName, b: &ClassName) -> bool {
    a.package() == b.package()
}

pub fn is_same_nest(a: &ClassName, b: &ClassName) -> bool {
    a.top_level() == b.top_level()
}

pub fn is_class_accessible(
    hierarchy: &dyn ClassHierarchy,
    class: &ClassName,
    lookup_class: &ClassName,
    modes: u8,
) -> bool {
    if modes == 0 {
        return false;
    }
    match hierarchy.class_info(class) {
        Some(info) if info.is_public() => true,
        // Unknown classes are only reachable from their own package.
        _ => modes & MODE_PACKAGE != 0 && is_same_package(class, lookup_class),
    }
}

/// The member access decision table.
///
/// | member     | allowed when                                                        |
/// |------------|---------------------------------------------------------------------|
/// | public     | the referenced class is accessible                                  |
/// | protected  | same package (package or protected mode), or subclass (protected)   |
/// | package    | package mode and same package                                       |
/// | private    | private mode and same nest (same top-level class)                   |
pub fn check_member_access(
    hierarchy: &dyn ClassHierarchy,
    lookup_class: &ClassName,
    modes: u8,
    defining: &ClassName,
    reference: &ClassName,
    access_flags: u16,
) -> Result<(), &'static str> {
    if modes == 0 {
        return Err("lookup has no access modes");
    }
    if !is_class_accessible(hierarchy, reference, lookup_class, modes) {
        return Err("referenced class is not accessible");
    }

    if access_flags & ACC_PUBLIC != 0 {
        return Ok(());
    }
    if access_flags & ACC_PRIVATE != 0 {
        return if modes & MODE_PRIVATE != 0 && is_same_nest(defining, lookup_class) {
            Ok(())
        } else {
            Err("member is private")
        };
    }
    if access_flags & ACC_PROTECTED != 0 {
        if modes & (MODE_PACKAGE | MODE_PROTECTED) != 0 && is_same_package(defining, lookup_class)
        {
            return Ok(());
        }
        return if modes & MODE_PROTECTED != 0 && hierarchy.is_subclass_of(lookup_class, defining)
        {
            Ok(())
        } else {
            Err("member is protected")
        };
    }

    if modes & MODE_PACKAGE != 0 && is_same_package(defining, lookup_class) {
        Ok(())
    } else {
        Err("member is package-private")
    }
}

/// Modes a lookup keeps when it is re-targeted from `from` to `to`.
pub fn narrow_modes(
    hierarchy: &dyn ClassHierarchy,
    from: &ClassName,
    to: &ClassName,
    modes: u8,
) -> u8 {
    if from == to {
        return modes;
    }
    let mut narrowed = modes;
    if !is_same_nest(from, to) {
        narrowed &= !MODE_PRIVATE;
    }
    if !is_same_package(from, to) {
        narrowed &= !(MODE_PACKAGE | MODE_PROTECTED | MODE_PRIVATE);
    }
    // Protected access is tied to the original lookup class's subclass relation.
    narrowed &= !MODE_PROTECTED;
    if !is_class_accessible(hierarchy, to, from, modes) {
        narrowed = 0;
    }
    narrowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_signature::{ClassInfo, ClassTable, ACC_STATIC};

    fn table() -> ClassTable {
        let mut table = ClassTable::with_well_known();
        table.add(ClassInfo::class("a.Base"));
        table.add(ClassInfo::class("b.Derived").extends("a.Base"));
        table.add(ClassInfo::class("a.Hidden").with_flags(0));
        table.add(ClassInfo::class("a.Base$Inner"));
        table
    }

    fn name(s: &str) -> ClassName {
        ClassName::new(s)
    }

    /// Checks a member declared on and referenced through `owner`.
    fn check(
        table: &ClassTable,
        caller: &str,
        modes: u8,
        owner: &str,
        flags: u16,
    ) -> Result<(), &'static str> {
        let owner = name(owner);
        check_member_access(table, &name(caller), modes, &owner, &owner, flags)
    }

    #[test]
    fn public_members_need_an_accessible_class() {
        let table = table();
        assert!(check(&table, "b.Derived", ALL_MODES, "a.Base", ACC_PUBLIC).is_ok());
        assert_eq!(
            check(&table, "b.Derived", ALL_MODES, "a.Hidden", ACC_PUBLIC),
            Err("referenced class is not accessible")
        );
        assert!(check(&table, "a.Base", ALL_MODES, "a.Hidden", ACC_PUBLIC).is_ok());
    }

    #[test]
    fn protected_members() {
        let table = table();
        assert!(check(&table, "b.Derived", ALL_MODES, "a.Base", ACC_PROTECTED).is_ok());
        let package_only = MODE_PUBLIC | MODE_PACKAGE;
        assert!(check(&table, "a.Other", package_only, "a.Base", ACC_PROTECTED).is_ok());
        assert_eq!(
            check(&table, "c.Stranger", ALL_MODES, "a.Base", ACC_PROTECTED),
            Err("member is protected")
        );
        assert!(check(&table, "b.Derived", MODE_PUBLIC, "a.Base", ACC_PROTECTED).is_err());
    }

    #[test]
    fn private_members_are_nest_scoped() {
        let table = table();
        let flags = ACC_PRIVATE | ACC_STATIC;
        assert!(check(&table, "a.Base$Inner", ALL_MODES, "a.Base", flags).is_ok());
        assert_eq!(
            check(&table, "a.Other", ALL_MODES, "a.Base", ACC_PRIVATE),
            Err("member is private")
        );
    }

    #[test]
    fn package_members() {
        let table = table();
        assert!(check(&table, "a.Other", ALL_MODES, "a.Base", 0).is_ok());
        assert!(check(&table, "b.Derived", ALL_MODES, "a.Base", 0).is_err());
        assert!(check(&table, "a.Other", MODE_PUBLIC, "a.Base", 0).is_err());
    }

    #[test]
    fn narrowing_drops_modes() {
        let table = table();
        let (base, derived) = (name("a.Base"), name("b.Derived"));
        assert_eq!(narrow_modes(&table, &base, &base, ALL_MODES), ALL_MODES);
        assert_eq!(
            narrow_modes(&table, &base, &name("a.Base$Inner"), ALL_MODES),
            MODE_PUBLIC | MODE_PACKAGE | MODE_PRIVATE
        );
        assert_eq!(narrow_modes(&table, &base, &derived, ALL_MODES), MODE_PUBLIC);
        assert_eq!(narrow_modes(&table, &derived, &name("a.Hidden"), ALL_MODES), 0);
    }
}
