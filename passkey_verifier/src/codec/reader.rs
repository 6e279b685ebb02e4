use crate::errors::VerifyError;

/// Big-endian cursor over a borrowed buffer, used by the positional binary
/// formats (authenticator data, TPM structures).
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { buf, pos: 0, what }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub(crate) fn advance(&mut self, n: usize) -> Result<(), VerifyError> {
        self.read_bytes(n).map(|_| ())
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], VerifyError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                VerifyError::DataConversion(format!(
                    "{} is truncated: needed {} bytes at offset {}, {} available",
                    self.what,
                    n,
                    self.pos,
                    self.buf.len() - self.pos
                ))
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N], VerifyError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, VerifyError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, VerifyError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, VerifyError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, VerifyError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// TPM2B: u16 length prefix followed by that many bytes.
    pub(crate) fn read_sized(&mut self) -> Result<&'a [u8], VerifyError> {
        let len = self.read_u16()? as usize;
        self.read_bytes(len)
    }

    pub(crate) fn finish(&self) -> Result<(), VerifyError> {
        if self.pos != self.buf.len() {
            return Err(VerifyError::DataConversion(format!(
                "{} contains surplus data: {} trailing bytes",
                self.what,
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

pub(crate) fn write_sized(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), VerifyError> {
    let len = u16::try_from(bytes.len()).map_err(|_| {
        VerifyError::DataConversion(format!("Field of {} bytes exceeds u16 length", bytes.len()))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}
