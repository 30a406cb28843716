//! Address types.

use std::fmt;
use std::ops::{Add, Sub};

use crate::module::ModuleRef;

/// Strongly typed file address
///
/// This wrapper around `u64` keeps addresses from being mixed up with sizes,
/// counts or line numbers. Addresses handled by the registry are *file*
/// addresses: virtual addresses as recorded in the object file, before any
/// load slide is applied.
///
/// ## Example
///
/// ```rust
/// use modcache_core::types::Address;
///
/// let addr = Address::from(0x1000);
/// let next_addr = addr + 0x100;
/// assert_eq!(next_addr.value(), 0x1100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ```rust
    /// use modcache_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::from(0x1100)));
    /// assert_eq!(addr.checked_add(u64::MAX), None);
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Distance from `base` to this address, or `None` if `base` is above it.
    pub fn offset_from(self, base: Address) -> Option<u64>
    {
        self.0.checked_sub(base.0)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}

/// A file address that has been attributed to a module and section.
///
/// Produced by `resolve_file_address`. When `module` is set, symbol context
/// resolution goes straight to that module instead of scanning the list.
#[derive(Debug, Clone, Default)]
pub struct SectionAddress
{
    /// Module the address belongs to, once known.
    pub module: Option<ModuleRef>,
    /// Name of the containing section, once known.
    pub section: Option<String>,
    /// The file address itself.
    pub file_address: Address,
}

impl SectionAddress
{
    /// An address not yet attributed to any module.
    pub fn unresolved(file_address: impl Into<Address>) -> Self
    {
        Self {
            module: None,
            section: None,
            file_address: file_address.into(),
        }
    }
}
