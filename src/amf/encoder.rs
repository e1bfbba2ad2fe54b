use crate::amf::amf0::{markers, Amf0Object, Amf0Value};
use crate::{ByteBuffer, Error, Result};

pub struct Amf0Encoder {
    buffer: ByteBuffer,
}

impl Amf0Encoder {
    pub fn new() -> Self {
        Amf0Encoder {
            buffer: ByteBuffer::with_capacity(256),
        }
    }

    pub fn encode(&mut self, value: &Amf0Value) -> Result<()> {
        match value {
            Amf0Value::Number(n) => {
                self.buffer.write_u8(markers::NUMBER)?;
                self.buffer.write_f64_be(*n)?;
            }
            Amf0Value::Boolean(b) => {
                self.buffer.write_u8(markers::BOOLEAN)?;
                self.buffer.write_u8(u8::from(*b))?;
            }
            Amf0Value::String(s) => {
                self.buffer.write_u8(markers::STRING)?;
                self.write_utf8(s)?;
            }
            Amf0Value::Object(obj) => {
                self.buffer.write_u8(markers::OBJECT)?;
                self.encode_properties(obj)?;
            }
            Amf0Value::Null => self.buffer.write_u8(markers::NULL)?,
            Amf0Value::Undefined => self.buffer.write_u8(markers::UNDEFINED)?,
            Amf0Value::EcmaArray(obj) => {
                self.buffer.write_u8(markers::ECMA_ARRAY)?;
                self.buffer.write_u32_be(obj.len() as u32)?;
                self.encode_properties(obj)?;
            }
            Amf0Value::StrictArray(arr) => {
                self.buffer.write_u8(markers::STRICT_ARRAY)?;
                self.buffer.write_u32_be(arr.len() as u32)?;
                for item in arr {
                    self.encode(item)?;
                }
            }
        }
        Ok(())
    }

    fn encode_properties(&mut self, obj: &Amf0Object) -> Result<()> {
        for (key, value) in obj.iter() {
            self.write_utf8(key)?;
            self.encode(value)?;
        }
        self.buffer.write_u16_be(0)?;
        self.buffer.write_u8(markers::OBJECT_END)?;
        Ok(())
    }

    /// String body without a type marker (object keys and string values)
    fn write_utf8(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        let len = u16::try_from(bytes.len())
            .map_err(|_| Error::amf_encode(format!("String of {} bytes exceeds AMF0 limit", bytes.len())))?;
        self.buffer.write_u16_be(len)?;
        self.buffer.write_bytes(bytes)?;
        Ok(())
    }

    pub fn get_bytes(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.into_vec()
    }
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Amf0Encoder::new()
    }
}
