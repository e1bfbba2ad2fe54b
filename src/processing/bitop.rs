use crate::{Error, Result};

/// MSB-first bit cursor over an immutable byte slice
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_offset: usize,
}

impl<'a> BitReader<'a> {
    /// Create new bit reader
    pub fn new(data: &'a [u8]) -> Self {
        BitReader { data, bit_offset: 0 }
    }

    pub fn bit_offset(&self) -> usize {
        self.bit_offset
    }

    pub fn size_in_bits(&self) -> usize {
        self.data.len() * 8
    }

    pub fn bits_left(&self) -> usize {
        self.size_in_bits() - self.bit_offset
    }

    /// Read up to 32 bits as an unsigned value
    pub fn read(&mut self, bit_count: u32) -> Result<u32> {
        if bit_count > 32 {
            return Err(Error::out_of_range(format!("Cannot read {} bits at once", bit_count)));
        }
        if bit_count as usize > self.bits_left() {
            return Err(Error::out_of_range(format!(
                "Read of {} bits at bit {} passes end of {} byte buffer",
                bit_count,
                self.bit_offset,
                self.data.len()
            )));
        }

        let mut value: u64 = 0;
        for _ in 0..bit_count {
            let byte = self.data[self.bit_offset / 8];
            let bit = (byte >> (7 - (self.bit_offset % 8))) & 1;
            value = (value << 1) | bit as u64;
            self.bit_offset += 1;
        }
        Ok(value as u32)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read(1)? == 1)
    }

    pub fn skip(&mut self, bit_count: usize) -> Result<()> {
        if bit_count > self.bits_left() {
            return Err(Error::out_of_range(format!(
                "Skip of {} bits at bit {} passes end of {} byte buffer",
                bit_count,
                self.bit_offset,
                self.data.len()
            )));
        }
        self.bit_offset += bit_count;
        Ok(())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(len.min(self.bits_left() / 8));
        for _ in 0..len {
            bytes.push(self.read(8)? as u8);
        }
        Ok(bytes)
    }

    /// Unsigned Exp-Golomb: `z` leading zeros, then 2^z - 1 + next `z` bits
    pub fn read_golomb(&mut self) -> Result<u32> {
        let mut zeros = 0u32;
        while !self.read_bit()? {
            zeros += 1;
            if zeros > 31 {
                return Err(Error::out_of_range("Exp-Golomb prefix longer than 31 bits"));
            }
        }
        let suffix = self.read(zeros)? as u64;
        Ok(((1u64 << zeros) - 1 + suffix) as u32)
    }

    /// Signed Exp-Golomb (se(v))
    pub fn read_signed_golomb(&mut self) -> Result<i64> {
        let code = self.read_golomb()? as i64;
        if code % 2 == 1 {
            Ok((code + 1) / 2)
        } else {
            Ok(-(code / 2))
        }
    }
}

/// MSB-first bit writer, the inverse of `BitReader`
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    bit_count: usize,
}

impl BitWriter {
    /// Create new bit writer
    pub fn new() -> Self {
        BitWriter::default()
    }

    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_count % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            if let Some(last) = self.data.last_mut() {
                *last |= 1 << (7 - (self.bit_count % 8));
            }
        }
        self.bit_count += 1;
    }

    /// Write the low `bits` bits of `value`, most significant first
    pub fn write(&mut self, bits: u32, value: u64) {
        for i in (0..bits.min(64)).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.push_bit(bit);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.write(8, *byte as u64);
        }
    }

    pub fn write_golomb(&mut self, value: u32) {
        let code = value as u64 + 1;
        let len = 64 - code.leading_zeros();
        self.write(len - 1, 0);
        self.write(len, code);
    }

    pub fn write_signed_golomb(&mut self, value: i32) {
        let code = if value > 0 {
            (value as i64) * 2 - 1
        } else {
            -(value as i64) * 2
        };
        self.write_golomb(code as u32);
    }

    /// Finished bytes; the last byte is zero padded
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
