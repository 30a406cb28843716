//! Unique build identifiers.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::error::ModuleError;

/// Content-derived build identifier of a module.
///
/// Holds a Mach-O `LC_UUID` (16 bytes) or an ELF GNU build-id (usually 20
/// bytes) without allocating. Equality is byte equality; two images with the
/// same identifier are the same build regardless of where they live on disk.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ModuleUuid(SmallVec<[u8; 20]>);

impl ModuleUuid
{
    /// Longest identifier accepted.
    pub const MAX_LEN: usize = 32;

    /// Wrap raw identifier bytes. Returns `None` for empty or oversized input.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self>
    {
        if bytes.is_empty() || bytes.len() > Self::MAX_LEN {
            return None;
        }
        Some(ModuleUuid(SmallVec::from_slice(bytes)))
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8]
    {
        &self.0
    }

    /// An identifier of all zero bytes carries no identity.
    pub fn is_valid(&self) -> bool
    {
        self.0.iter().any(|byte| *byte != 0)
    }
}

impl FromStr for ModuleUuid
{
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let digits: String = s.chars().filter(|c| *c != '-').collect();
        if digits.is_empty() || digits.len() % 2 != 0 || !digits.is_ascii() {
            return Err(ModuleError::InvalidUuid(s.to_string()));
        }
        let bytes = (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ModuleError::InvalidUuid(s.to_string()))?;
        ModuleUuid::from_bytes(&bytes).ok_or_else(|| ModuleError::InvalidUuid(s.to_string()))
    }
}

impl fmt::Display for ModuleUuid
{
    /// 16-byte identifiers print in the familiar `8-4-4-4-12` uppercase form,
    /// everything else as contiguous lowercase hex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        if self.0.len() == 16 {
            for (i, byte) in self.0.iter().enumerate() {
                if matches!(i, 4 | 6 | 8 | 10) {
                    f.write_str("-")?;
                }
                write!(f, "{byte:02X}")?;
            }
            return Ok(());
        }
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ModuleUuid
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "ModuleUuid({self})")
    }
}
