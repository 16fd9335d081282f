//! Access flags for classes, fields and methods

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit set of access and property flags.
///
/// Bit values follow the class-file / dex encoding, with the dex-only
/// `constructor` bit in the upper half.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessFlags(u32);

impl AccessFlags {
    /// `public`
    pub const PUBLIC: AccessFlags = AccessFlags(0x0001);
    /// `private`
    pub const PRIVATE: AccessFlags = AccessFlags(0x0002);
    /// `protected`
    pub const PROTECTED: AccessFlags = AccessFlags(0x0004);
    /// `static`
    pub const STATIC: AccessFlags = AccessFlags(0x0008);
    /// `final`
    pub const FINAL: AccessFlags = AccessFlags(0x0010);
    /// `interface`
    pub const INTERFACE: AccessFlags = AccessFlags(0x0200);
    /// `abstract`
    pub const ABSTRACT: AccessFlags = AccessFlags(0x0400);
    /// `synthetic`
    pub const SYNTHETIC: AccessFlags = AccessFlags(0x1000);
    /// `constructor`
    pub const CONSTRUCTOR: AccessFlags = AccessFlags(0x1_0000);

    const VISIBILITY: u32 = 0x0001 | 0x0002 | 0x0004;

    /// No flags set (package-private)
    pub const fn empty() -> Self {
        AccessFlags(0)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set
    #[inline]
    pub const fn contains(self, other: AccessFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    fn set(&mut self, flag: AccessFlags) {
        self.0 |= flag.0;
    }

    #[inline]
    fn unset(&mut self, flag: AccessFlags) {
        self.0 &= !flag.0;
    }

    /// `public` is set
    pub fn is_public(self) -> bool {
        self.contains(Self::PUBLIC)
    }

    /// `private` is set
    pub fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    /// `protected` is set
    pub fn is_protected(self) -> bool {
        self.contains(Self::PROTECTED)
    }

    /// None of public/private/protected is set
    pub fn is_package_private(self) -> bool {
        self.0 & Self::VISIBILITY == 0
    }

    /// `static` is set
    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    /// `final` is set
    pub fn is_final(self) -> bool {
        self.contains(Self::FINAL)
    }

    /// `synthetic` is set
    pub fn is_synthetic(self) -> bool {
        self.contains(Self::SYNTHETIC)
    }

    /// `abstract` is set
    pub fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    /// `interface` is set
    pub fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    /// `constructor` is set
    pub fn is_constructor(self) -> bool {
        self.contains(Self::CONSTRUCTOR)
    }

    /// Set `public`
    pub fn set_public(&mut self) {
        self.set(Self::PUBLIC);
    }

    /// Clear `private`
    pub fn unset_private(&mut self) {
        self.unset(Self::PRIVATE);
    }

    /// Clear `protected`
    pub fn unset_protected(&mut self) {
        self.unset(Self::PROTECTED);
    }

    /// Set `final`
    pub fn set_final(&mut self) {
        self.set(Self::FINAL);
    }

    /// Set `synthetic`
    pub fn set_synthetic(&mut self) {
        self.set(Self::SYNTHETIC);
    }

    /// Make the entity public, clearing the other visibility bits
    pub fn promote_to_public(&mut self) {
        self.unset(AccessFlags(Self::VISIBILITY));
        self.set(Self::PUBLIC);
    }
}

impl BitOr for AccessFlags {
    type Output = AccessFlags;

    fn bitor(self, rhs: AccessFlags) -> AccessFlags {
        AccessFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for AccessFlags {
    fn bitor_assign(&mut self, rhs: AccessFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for AccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessFlags({})", self)
    }
}

impl fmt::Display for AccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(AccessFlags, &str); 9] = [
            (AccessFlags::PUBLIC, "public"),
            (AccessFlags::PRIVATE, "private"),
            (AccessFlags::PROTECTED, "protected"),
            (AccessFlags::STATIC, "static"),
            (AccessFlags::FINAL, "final"),
            (AccessFlags::INTERFACE, "interface"),
            (AccessFlags::ABSTRACT, "abstract"),
            (AccessFlags::SYNTHETIC, "synthetic"),
            (AccessFlags::CONSTRUCTOR, "constructor"),
        ];
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote_to_public() {
        let mut flags = AccessFlags::PRIVATE | AccessFlags::STATIC;
        flags.promote_to_public();
        assert!(flags.is_public());
        assert!(!flags.is_private());
        assert!(flags.is_static());

        let mut flags = AccessFlags::PROTECTED | AccessFlags::FINAL;
        flags.promote_to_public();
        assert_eq!(flags, AccessFlags::PUBLIC | AccessFlags::FINAL);
    }

    #[test]
    fn test_package_private() {
        assert!(AccessFlags::empty().is_package_private());
        assert!(AccessFlags::STATIC.is_package_private());
        assert!(!AccessFlags::PROTECTED.is_package_private());
    }

    #[test]
    fn test_mutators_are_independent() {
        let mut flags = AccessFlags::PRIVATE;
        flags.set_public();
        flags.unset_private();
        flags.set_final();
        assert_eq!(flags.to_string(), "public final");
    }
}
