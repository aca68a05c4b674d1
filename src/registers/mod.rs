//! Register set model - named access into the `g`-packet register blob.
//!
//! The stub exchanges all CPU registers as one flat blob whose layout is
//! fixed per architecture. A [`RegisterSet`] knows that layout and resolves
//! names (including the arch-neutral `ip`/`sp`/`bp` aliases) to byte ranges
//! for little-endian reads and in-place writes.

use thiserror::Error;

use crate::rsp::Blob;

/// Register access errors
#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("unknown register {name:?}")]
    Unknown { name: String },

    #[error("register blob size mismatch: expected {expected} bytes, got {got}")]
    SizeMismatch { expected: usize, got: usize },
}

/// Target architecture profile, selected once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    /// 32-bit target, i386 register convention.
    Win32,
    /// 64-bit target, amd64 register convention.
    Win64,
}

impl Arch {
    /// Map an `ARCH_SIZE`-style value (32 or 64) onto a profile.
    pub fn from_size(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(Arch::Win32),
            64 => Some(Arch::Win64),
            _ => None,
        }
    }

    pub fn is_64bit(self) -> bool {
        self == Arch::Win64
    }
}

#[derive(Debug, Clone, Copy)]
struct Field {
    name: &'static str,
    offset: usize,
    width: usize,
}

/// Register order and widths of the amd64 `g` packet.
const WIN64_LAYOUT: &[(&str, usize)] = &[
    ("rax", 8),
    ("rbx", 8),
    ("rcx", 8),
    ("rdx", 8),
    ("rsi", 8),
    ("rdi", 8),
    ("rbp", 8),
    ("rsp", 8),
    ("r8", 8),
    ("r9", 8),
    ("r10", 8),
    ("r11", 8),
    ("r12", 8),
    ("r13", 8),
    ("r14", 8),
    ("r15", 8),
    ("rip", 8),
    ("eflags", 4),
    ("cs", 4),
    ("ss", 4),
    ("ds", 4),
    ("es", 4),
    ("fs", 4),
    ("gs", 4),
];

/// Register order and widths of the i386 `g` packet.
const WIN32_LAYOUT: &[(&str, usize)] = &[
    ("eax", 4),
    ("ecx", 4),
    ("edx", 4),
    ("ebx", 4),
    ("esp", 4),
    ("ebp", 4),
    ("esi", 4),
    ("edi", 4),
    ("eip", 4),
    ("eflags", 4),
    ("cs", 4),
    ("ss", 4),
    ("ds", 4),
    ("es", 4),
    ("fs", 4),
    ("gs", 4),
];

/// Named-register layout over the flat register blob.
pub struct RegisterSet {
    arch: Arch,
    fields: Vec<Field>,
    blob_len: usize,
}

impl RegisterSet {
    pub fn new(arch: Arch) -> Self {
        let layout = match arch {
            Arch::Win32 => WIN32_LAYOUT,
            Arch::Win64 => WIN64_LAYOUT,
        };
        let mut fields = Vec::with_capacity(layout.len());
        let mut offset = 0;
        for &(name, width) in layout {
            fields.push(Field {
                name,
                offset,
                width,
            });
            offset += width;
        }
        Self {
            arch,
            fields,
            blob_len: offset,
        }
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Fixed size of the architecture's register blob.
    pub fn blob_len(&self) -> usize {
        self.blob_len
    }

    /// Read the named register out of `blob` as a little-endian unsigned
    /// integer.
    pub fn read(&self, blob: &Blob, name: &str) -> Result<u64, RegisterError> {
        let field = self.field(name)?;
        self.check_len(blob)?;
        let bytes = &blob.as_slice()[field.offset..field.offset + field.width];
        let mut value: u64 = 0;
        for &b in bytes.iter().rev() {
            value = (value << 8) | u64::from(b);
        }
        Ok(value)
    }

    /// Overwrite the named register's byte range in `blob` with the
    /// little-endian encoding of `value`. All other bytes are untouched.
    pub fn write(&self, name: &str, value: u64, blob: &mut Blob) -> Result<(), RegisterError> {
        let field = self.field(name)?;
        self.check_len(blob)?;
        let bytes = &mut blob.as_mut_slice()[field.offset..field.offset + field.width];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (value >> (8 * i)) as u8;
        }
        Ok(())
    }

    /// Names of every register in the profile, in blob order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    fn check_len(&self, blob: &Blob) -> Result<(), RegisterError> {
        if blob.len() != self.blob_len {
            return Err(RegisterError::SizeMismatch {
                expected: self.blob_len,
                got: blob.len(),
            });
        }
        Ok(())
    }

    fn field(&self, name: &str) -> Result<&Field, RegisterError> {
        let resolved = self.resolve_alias(name);
        self.fields
            .iter()
            .find(|f| f.name == resolved)
            .ok_or_else(|| RegisterError::Unknown {
                name: name.to_string(),
            })
    }

    fn resolve_alias<'a>(&self, name: &'a str) -> &'a str {
        match (name, self.arch) {
            ("ip", Arch::Win64) => "rip",
            ("ip", Arch::Win32) => "eip",
            ("sp", Arch::Win64) => "rsp",
            ("sp", Arch::Win32) => "esp",
            ("bp", Arch::Win64) => "rbp",
            ("bp", Arch::Win32) => "ebp",
            _ => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_blob(set: &RegisterSet) -> Blob {
        Blob::from_bytes(&vec![0u8; set.blob_len()])
    }

    #[test]
    fn blob_sizes_are_fixed_per_arch() {
        assert_eq!(RegisterSet::new(Arch::Win64).blob_len(), 164);
        assert_eq!(RegisterSet::new(Arch::Win32).blob_len(), 64);
    }

    #[test]
    fn write_then_read_every_register() {
        for arch in [Arch::Win32, Arch::Win64] {
            let set = RegisterSet::new(arch);
            let mut blob = zero_blob(&set);
            for (i, name) in set.names().enumerate() {
                let value = 0x0102_0304u64.wrapping_add(i as u64);
                set.write(name, value, &mut blob).unwrap();
                assert_eq!(set.read(&blob, name).unwrap(), value, "{name}");
            }
        }
    }

    #[test]
    fn write_does_not_disturb_neighbors() {
        let set = RegisterSet::new(Arch::Win64);
        let mut blob = zero_blob(&set);
        for name in set.names() {
            set.write(name, 0x1111_1111, &mut blob).unwrap();
        }
        set.write("rbp", 0xdead_beef_0bad_f00d, &mut blob).unwrap();
        for name in set.names().filter(|n| *n != "rbp") {
            assert_eq!(set.read(&blob, name).unwrap(), 0x1111_1111, "{name}");
        }
        assert_eq!(set.read(&blob, "rbp").unwrap(), 0xdead_beef_0bad_f00d);
    }

    #[test]
    fn values_are_little_endian() {
        let set = RegisterSet::new(Arch::Win32);
        let mut blob = zero_blob(&set);
        set.write("eax", 0x12345678, &mut blob).unwrap();
        assert_eq!(&blob.as_slice()[..4], &[0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn aliases_resolve_per_arch() {
        let set64 = RegisterSet::new(Arch::Win64);
        let mut blob = zero_blob(&set64);
        set64.write("ip", 0xc00001000, &mut blob).unwrap();
        assert_eq!(set64.read(&blob, "rip").unwrap(), 0xc00001000);
        assert_eq!(set64.read(&blob, "ip").unwrap(), 0xc00001000);

        let set32 = RegisterSet::new(Arch::Win32);
        let mut blob = zero_blob(&set32);
        set32.write("sp", 0x1000, &mut blob).unwrap();
        assert_eq!(set32.read(&blob, "esp").unwrap(), 0x1000);
        set32.write("bp", 0x2000, &mut blob).unwrap();
        assert_eq!(set32.read(&blob, "ebp").unwrap(), 0x2000);
    }

    #[test]
    fn unknown_register_is_an_error() {
        let set = RegisterSet::new(Arch::Win32);
        let blob = zero_blob(&set);
        assert!(matches!(
            set.read(&blob, "rax"),
            Err(RegisterError::Unknown { .. })
        ));
    }

    #[test]
    fn wrong_size_blob_is_rejected() {
        let set = RegisterSet::new(Arch::Win64);
        let blob = Blob::from_bytes(&[0u8; 10]);
        assert!(matches!(
            set.read(&blob, "rip"),
            Err(RegisterError::SizeMismatch {
                expected: 164,
                got: 10
            })
        ));
    }
}
