//! CPU architecture of a module.

use std::fmt;
use std::str::FromStr;

use crate::error::ModuleError;

/// CPU architecture of a binary image
///
/// ## Supported Architectures
///
/// - **Arm64**: 64-bit ARM (AArch64)
/// - **X86_64**: 64-bit x86 (Intel/AMD)
/// - **X86**: 32-bit x86
/// - **Arm**: 32-bit ARM
/// - **Unknown**: anything else the object reader reports
///
/// ## Example
///
/// ```rust
/// use modcache_core::types::Architecture;
///
/// let arch: Architecture = "aarch64".parse().unwrap();
/// assert_eq!(arch, Architecture::Arm64);
/// assert_eq!(arch.to_string(), "arm64");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture
{
    /// 64-bit ARM
    Arm64,
    /// 64-bit x86 (Intel/AMD)
    X86_64,
    /// 32-bit x86
    X86,
    /// 32-bit ARM
    Arm,
    /// Any other architecture (or unknown)
    ///
    /// The `&'static str` contains the architecture name (e.g., "riscv64", "powerpc64").
    Unknown(&'static str),
}

impl Architecture
{
    /// Get the architecture of the currently running binary
    ///
    /// ```rust
    /// use modcache_core::types::Architecture;
    ///
    /// let arch = Architecture::current();
    /// // On Apple Silicon: Architecture::Arm64
    /// // On Intel: Architecture::X86_64
    /// ```
    pub const fn current() -> Self
    {
        #[cfg(target_arch = "aarch64")]
        {
            Architecture::Arm64
        }

        #[cfg(target_arch = "x86_64")]
        {
            Architecture::X86_64
        }

        #[cfg(target_arch = "x86")]
        {
            Architecture::X86
        }

        #[cfg(target_arch = "arm")]
        {
            Architecture::Arm
        }

        #[cfg(not(any(
            target_arch = "aarch64",
            target_arch = "x86_64",
            target_arch = "x86",
            target_arch = "arm"
        )))]
        {
            Architecture::Unknown(std::env::consts::ARCH)
        }
    }

    /// Canonical lowercase name, as used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str
    {
        match self {
            Architecture::Arm64 => "arm64",
            Architecture::X86_64 => "x86_64",
            Architecture::X86 => "i386",
            Architecture::Arm => "arm",
            Architecture::Unknown(name) => name,
        }
    }

    /// Size of a pointer in bytes for this architecture.
    #[must_use]
    pub const fn pointer_size_bytes(self) -> u8
    {
        match self {
            Architecture::Arm64 | Architecture::X86_64 | Architecture::Unknown(_) => 8,
            Architecture::X86 | Architecture::Arm => 4,
        }
    }

    /// Whether an image built for `self` satisfies a request for `wanted`.
    #[must_use]
    pub fn is_compatible_with(self, wanted: Architecture) -> bool
    {
        self == wanted
    }
}

impl From<object::Architecture> for Architecture
{
    fn from(arch: object::Architecture) -> Self
    {
        match arch {
            object::Architecture::Aarch64 => Architecture::Arm64,
            object::Architecture::X86_64 => Architecture::X86_64,
            object::Architecture::I386 => Architecture::X86,
            object::Architecture::Arm => Architecture::Arm,
            object::Architecture::Riscv64 => Architecture::Unknown("riscv64"),
            object::Architecture::PowerPc64 => Architecture::Unknown("powerpc64"),
            _ => Architecture::Unknown("unknown"),
        }
    }
}

impl FromStr for Architecture
{
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "arm64" | "aarch64" | "arm64e" => Ok(Architecture::Arm64),
            "x86_64" | "x86-64" | "amd64" => Ok(Architecture::X86_64),
            "i386" | "i686" | "x86" => Ok(Architecture::X86),
            "arm" | "armv7" | "armv7k" | "armv7s" => Ok(Architecture::Arm),
            _ => Err(ModuleError::InvalidArchitecture(s.to_string())),
        }
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.name())
    }
}
