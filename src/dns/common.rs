use bitstream_io::{BitReader, BitWrite, BitWriter, Endianness};

use super::ParseError;

/// Longest encoded name allowed on the wire (RFC 1035 2.3.4)
pub const MAX_NAME_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 63;
const MAX_POINTER_HOPS: usize = 64;

pub trait PacketComponent {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;
    fn read<E: Endianness>(&mut self, reader: &mut BitReader<&[u8], E>) -> Result<(), ParseError>;

    fn write_name<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        name: &str,
    ) -> Result<(), ParseError> {
        let mut encoded_len = 1;
        for label in name_labels(name) {
            if label.len() > MAX_LABEL_LEN {
                return Err(ParseError::InvalidLabel);
            }
            encoded_len += label.len() + 1;
        }
        if encoded_len > MAX_NAME_LEN {
            return Err(ParseError::NameTooLong);
        }

        for label in name_labels(name) {
            writer.write_var::<u8>(8, label.len() as u8)?;
            writer.write_bytes(label.as_bytes())?;
        }
        writer.write_var::<u8>(8, 0)?;
        Ok(())
    }
}

/// Split a presentation name into its labels, ignoring the root label.
pub fn name_labels(name: &str) -> impl Iterator<Item = &str> {
    name.trim_end_matches('.').split('.').filter(|l| !l.is_empty())
}

/// Encode a name into uncompressed wire format.
pub fn encode_name(name: &str, out: &mut Vec<u8>) -> Result<(), ParseError> {
    let start = out.len();
    for label in name_labels(name) {
        if label.len() > MAX_LABEL_LEN {
            return Err(ParseError::InvalidLabel);
        }
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
    if out.len() - start > MAX_NAME_LEN {
        return Err(ParseError::NameTooLong);
    }
    Ok(())
}

/// Byte cursor over a whole DNS message.
///
/// Names may point anywhere earlier in the message, so decoding works on
/// absolute offsets instead of a forward-only bit stream.
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        let byte = *self.buf.get(self.pos).ok_or(ParseError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let end = self.pos.checked_add(len).ok_or(ParseError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(ParseError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    /// Read a possibly compressed name, returned in absolute presentation form
    /// (`example.com.`, or `.` for the root).
    pub fn read_name(&mut self) -> Result<String, ParseError> {
        let mut name = String::new();
        let mut cursor = self.pos;
        let mut resume_at = None;
        let mut hops = 0;
        let mut wire_len = 1;

        loop {
            let len = *self.buf.get(cursor).ok_or(ParseError::Truncated)? as usize;
            match len & 0xC0 {
                0x00 => {
                    if len == 0 {
                        cursor += 1;
                        break;
                    }
                    let label = self
                        .buf
                        .get(cursor + 1..cursor + 1 + len)
                        .ok_or(ParseError::Truncated)?;
                    wire_len += len + 1;
                    if wire_len > MAX_NAME_LEN {
                        return Err(ParseError::NameTooLong);
                    }
                    push_escaped_label(&mut name, label);
                    name.push('.');
                    cursor += len + 1;
                }
                0xC0 => {
                    let low = *self.buf.get(cursor + 1).ok_or(ParseError::Truncated)? as usize;
                    let target = ((len & 0x3F) << 8) | low;
                    if resume_at.is_none() {
                        resume_at = Some(cursor + 2);
                    }
                    hops += 1;
                    if hops > MAX_POINTER_HOPS || target >= self.buf.len() {
                        return Err(ParseError::PointerLoop);
                    }
                    cursor = target;
                }
                _ => return Err(ParseError::InvalidLabel),
            }
        }

        self.pos = resume_at.unwrap_or(cursor);
        if name.is_empty() {
            name.push('.');
        }
        Ok(name)
    }
}

/// Escape a raw label into presentation format (RFC 1035 5.1).
fn push_escaped_label(out: &mut String, label: &[u8]) {
    for &b in label {
        match b {
            b'.' | b'\\' | b'"' | b'(' | b')' | b';' | b'@' | b'$' => {
                out.push('\\');
                out.push(b as char);
            }
            0x21..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{:03}", b)),
        }
    }
}

/// Fixed-size header fields are read through bitstream-io.
pub fn read_component<C: PacketComponent + Default>(bytes: &[u8]) -> Result<C, ParseError> {
    let mut reader = BitReader::<_, bitstream_io::BigEndian>::new(bytes);
    let mut component = C::default();
    component.read(&mut reader)?;
    Ok(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::DNSPacket;
    use crate::dns::enums::DNSResourceType;

    #[test]
    fn test_read_plain_name() {
        let buf = b"\x07example\x03com\x00";
        let mut reader = WireReader::new(buf, 0);
        assert_eq!(reader.read_name().unwrap(), "example.com.");
        assert_eq!(reader.position(), buf.len());
    }

    #[test]
    fn test_read_root_name() {
        let mut reader = WireReader::new(&[0u8], 0);
        assert_eq!(reader.read_name().unwrap(), ".");
    }

    #[test]
    fn test_follow_compression_pointer() {
        // "example.com." at 0, then "www" + pointer to 0 at 13
        let mut buf = b"\x07example\x03com\x00".to_vec();
        buf.extend_from_slice(b"\x03www\xC0\x00");
        let mut reader = WireReader::new(&buf, 13);
        assert_eq!(reader.read_name().unwrap(), "www.example.com.");
        assert_eq!(reader.position(), buf.len());
    }

    #[test]
    fn test_reject_pointer_loop() {
        let buf = [0xC0u8, 0x00];
        let mut reader = WireReader::new(&buf, 0);
        assert!(matches!(reader.read_name(), Err(ParseError::PointerLoop)));
    }

    #[test]
    fn test_escape_special_bytes() {
        let buf = b"\x04a.b\x01\x00";
        let mut reader = WireReader::new(buf, 0);
        assert_eq!(reader.read_name().unwrap(), "a\\.b\\001.");
    }

    #[test]
    fn test_encode_name() {
        let mut out = Vec::new();
        encode_name("ns1.example.", &mut out).unwrap();
        assert_eq!(out, b"\x03ns1\x07example\x00");

        let mut root = Vec::new();
        encode_name(".", &mut root).unwrap();
        assert_eq!(root, vec![0]);
    }

    #[test]
    fn test_overlong_name_is_rejected_before_sending() {
        // Four 62-octet labels encode to 253 octets; a fifth pushes past 255
        let label = "a".repeat(62);
        let fits = vec![label.as_str(); 4].join(".");
        let too_long = format!("{}.{}", fits, label);

        assert!(DNSPacket::query(1, &fits, DNSResourceType::AXFR, false).serialize().is_ok());
        assert!(matches!(
            DNSPacket::query(1, &too_long, DNSResourceType::AXFR, false).serialize(),
            Err(ParseError::NameTooLong)
        ));

        let mut out = Vec::new();
        assert!(matches!(encode_name(&too_long, &mut out), Err(ParseError::NameTooLong)));
    }
}
