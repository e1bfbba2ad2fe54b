use crate::amf::amf0::{markers, Amf0Object, Amf0Value};
use crate::{ByteBuffer, Error, Result};

pub struct Amf0Decoder<'a> {
    buffer: &'a mut ByteBuffer,
    /// First unsupported marker seen; once set, scans stop where they are
    unsupported: Option<u8>,
}

impl<'a> Amf0Decoder<'a> {
    pub fn new(buffer: &'a mut ByteBuffer) -> Self {
        Amf0Decoder {
            buffer,
            unsupported: None,
        }
    }

    /// Check if decoder has remaining data to decode
    pub fn has_remaining(&self) -> bool {
        self.buffer.remaining() > 0
    }

    /// Whether decoding stopped on a marker this codec does not model
    pub fn hit_unsupported(&self) -> bool {
        self.unsupported.is_some()
    }

    pub fn decode(&mut self) -> Result<Amf0Value> {
        let marker = self.buffer.read_u8()?;
        match marker {
            markers::NUMBER => Ok(Amf0Value::Number(self.buffer.read_f64_be()?)),
            markers::BOOLEAN => Ok(Amf0Value::Boolean(self.buffer.read_u8()? != 0)),
            markers::STRING => Ok(Amf0Value::String(self.read_utf8()?)),
            markers::OBJECT => Ok(Amf0Value::Object(self.decode_properties()?)),
            markers::NULL => Ok(Amf0Value::Null),
            markers::UNDEFINED => Ok(Amf0Value::Undefined),
            markers::ECMA_ARRAY => {
                let _count = self.buffer.read_u32_be()?; // advisory only
                Ok(Amf0Value::EcmaArray(self.decode_properties()?))
            }
            markers::STRICT_ARRAY => self.decode_strict_array(),
            _ => {
                self.unsupported = Some(marker);
                Err(Error::amf_decode(format!("Unsupported AMF0 marker: 0x{:02x}", marker)))
            }
        }
    }

    /// String body without a type marker (u16 length + UTF-8)
    fn read_utf8(&mut self) -> Result<String> {
        let len = self.buffer.read_u16_be()? as usize;
        let bytes = self.buffer.read_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::amf_decode(format!("Invalid UTF-8 in string: {}", e)))
    }

    /// Name/value pairs up to the 0x00 0x00 0x09 terminator
    fn decode_properties(&mut self) -> Result<Amf0Object> {
        let mut object = Amf0Object::new();
        loop {
            let name = self.read_utf8()?;
            if name.is_empty() && self.buffer.peek_u8() == Some(markers::OBJECT_END) {
                self.buffer.read_u8()?;
                break;
            }

            match self.decode() {
                Ok(value) => object.insert(name, value),
                Err(_) if self.hit_unsupported() => return Ok(object),
                Err(e) => return Err(e),
            }
            if self.hit_unsupported() {
                return Ok(object);
            }
        }
        Ok(object)
    }

    fn decode_strict_array(&mut self) -> Result<Amf0Value> {
        let count = self.buffer.read_u32_be()? as usize;
        // every element needs at least its marker byte
        if count > self.buffer.remaining() {
            return Err(Error::amf_decode(format!("Strict array count {} exceeds input", count)));
        }

        let mut array = Vec::with_capacity(count);
        for _ in 0..count {
            match self.decode() {
                Ok(value) => array.push(value),
                Err(_) if self.hit_unsupported() => break,
                Err(e) => return Err(e),
            }
            if self.hit_unsupported() {
                break;
            }
        }
        Ok(Amf0Value::StrictArray(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scalars() {
        let mut buffer = ByteBuffer::new(vec![
            0x00, 0x40, 0x59, 0, 0, 0, 0, 0, 0, // 100.0
            0x01, 0x01,                         // true
            0x02, 0x00, 0x02, b'o', b'k',       // "ok"
            0x05, 0x06,
        ]);
        let mut decoder = Amf0Decoder::new(&mut buffer);

        assert_eq!(decoder.decode().unwrap(), Amf0Value::Number(100.0));
        assert_eq!(decoder.decode().unwrap(), Amf0Value::Boolean(true));
        assert_eq!(decoder.decode().unwrap(), Amf0Value::String("ok".into()));
        assert_eq!(decoder.decode().unwrap(), Amf0Value::Null);
        assert_eq!(decoder.decode().unwrap(), Amf0Value::Undefined);
        assert!(!decoder.has_remaining());
    }

    #[test]
    fn test_ecma_array_ignores_count() {
        let mut buffer = ByteBuffer::new(vec![
            0x08, 0x00, 0x00, 0x00, 0x07, // count lies
            0x00, 0x01, b'a', 0x05,
            0x00, 0x00, 0x09,
        ]);
        let mut decoder = Amf0Decoder::new(&mut buffer);

        let value = decoder.decode().unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj.get("a"), Some(&Amf0Value::Null));
    }

    #[test]
    fn test_strict_array_count_guard() {
        let mut buffer = ByteBuffer::new(vec![0x0A, 0xFF, 0xFF, 0xFF, 0xFF, 0x05]);
        let mut decoder = Amf0Decoder::new(&mut buffer);

        assert!(decoder.decode().is_err());
        assert!(!decoder.hit_unsupported());
    }

    #[test]
    fn test_unterminated_object_is_error() {
        let mut buffer = ByteBuffer::new(vec![0x03, 0x00, 0x01, b'a', 0x05]);
        let mut decoder = Amf0Decoder::new(&mut buffer);
        assert!(decoder.decode().is_err());
    }
}
