// Packed binary record layouts shared with the simulator binary.
// Multi-byte values use the host byte order, both processes run on the same machine.

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    F64,
    I32,
    Bool,
}

impl FieldKind {
    pub const fn width(self) -> usize {
        match self {
            FieldKind::F64 => 8,
            FieldKind::I32 => 4,
            FieldKind::Bool => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub len: usize,
}

impl Field {
    pub const fn scalar(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, len: 1 }
    }

    pub const fn array(name: &'static str, kind: FieldKind, len: usize) -> Self {
        Self { name, kind, len }
    }

    pub const fn size(&self) -> usize {
        self.kind.width() * self.len
    }
}

/// Ordered field list of a packed C struct; offsets follow from declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub fields: &'static [Field],
}

impl Schema {
    pub const fn new(fields: &'static [Field]) -> Self {
        Self { fields }
    }

    pub fn size(&self) -> usize {
        self.fields.iter().map(Field::size).sum()
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Byte offset and description of `name`.
    pub fn locate(&self, name: &'static str) -> Result<(usize, Field), TransportError> {
        let mut offset = 0;
        for field in self.fields {
            if field.name == name {
                return Ok((offset, *field));
            }
            offset += field.size();
        }
        Err(TransportError::UnknownField(name))
    }

    pub fn read_f64(&self, bytes: &[u8], name: &'static str) -> Result<f64, TransportError> {
        let values = self.read_f64s(bytes, name)?;
        values
            .first()
            .copied()
            .ok_or(TransportError::UnknownField(name))
    }

    pub fn read_f64s(&self, bytes: &[u8], name: &'static str) -> Result<Vec<f64>, TransportError> {
        let (offset, field) = self.locate(name)?;
        debug_assert_eq!(field.kind, FieldKind::F64);

        Ok((0..field.len)
            .map(|i| {
                let start = offset + i * 8;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[start..start + 8]);
                f64::from_ne_bytes(raw)
            })
            .collect())
    }

    pub fn read_i32(&self, bytes: &[u8], name: &'static str, index: usize) -> Result<i32, TransportError> {
        let start = self.slot(name, index, FieldKind::I32)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[start..start + 4]);
        Ok(i32::from_ne_bytes(raw))
    }

    pub fn read_bool(&self, bytes: &[u8], name: &'static str, index: usize) -> Result<bool, TransportError> {
        let start = self.slot(name, index, FieldKind::Bool)?;
        Ok(bytes[start] != 0)
    }

    pub fn write_f64(
        &self,
        bytes: &mut [u8],
        name: &'static str,
        index: usize,
        value: f64,
    ) -> Result<(), TransportError> {
        let start = self.slot(name, index, FieldKind::F64)?;
        bytes[start..start + 8].copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    pub fn write_i32(
        &self,
        bytes: &mut [u8],
        name: &'static str,
        index: usize,
        value: i32,
    ) -> Result<(), TransportError> {
        let start = self.slot(name, index, FieldKind::I32)?;
        bytes[start..start + 4].copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    pub fn write_bool(
        &self,
        bytes: &mut [u8],
        name: &'static str,
        index: usize,
        value: bool,
    ) -> Result<(), TransportError> {
        let start = self.slot(name, index, FieldKind::Bool)?;
        bytes[start] = u8::from(value);
        Ok(())
    }

    fn slot(&self, name: &'static str, index: usize, kind: FieldKind) -> Result<usize, TransportError> {
        let (offset, field) = self.locate(name)?;
        debug_assert_eq!(field.kind, kind);
        if index >= field.len {
            return Err(TransportError::AgentIndex {
                index,
                capacity: field.len,
            });
        }
        Ok(offset + index * kind.width())
    }
}
