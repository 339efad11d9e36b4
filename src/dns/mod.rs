pub mod common;
pub mod enums;
pub mod header;
pub mod question;
pub mod rdata;
pub mod resource;

use bitstream_io::{BigEndian, BitWriter};
use common::{PacketComponent, WireReader, read_component};
use enums::{DNSResourceType, ResponseCode};
use header::{DNSHeader, HEADER_LEN};
use question::DNSQuestion;
use resource::DNSResource;
use tracing::trace;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
}

#[derive(Debug)]
pub enum ParseError {
    InvalidHeader,
    InvalidLabel,
    NameTooLong,
    PointerLoop,
    Truncated,
    InvalidRdata(String),
    InvalidBitStream(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidHeader => write!(f, "Invalid DNS header"),
            ParseError::InvalidLabel => write!(f, "Invalid DNS label"),
            ParseError::NameTooLong => write!(f, "DNS name exceeds 255 octets"),
            ParseError::PointerLoop => write!(f, "Invalid or looping compression pointer"),
            ParseError::Truncated => write!(f, "Message truncated"),
            ParseError::InvalidRdata(e) => write!(f, "Invalid rdata: {}", e),
            ParseError::InvalidBitStream(e) => write!(f, "Invalid bit stream: {}", e),
        }
    }
}

impl std::error::Error for ParseError {}

/// Normalise a user-supplied name to absolute form (`example.com.`, `.`).
pub fn absolute_name(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        ".".to_string()
    } else {
        format!("{}.", trimmed)
    }
}

impl DNSPacket {
    /// Build a single-question query.
    pub fn query(id: u16, name: &str, qtype: DNSResourceType, recursion_desired: bool) -> Self {
        DNSPacket {
            header: DNSHeader {
                id,
                rd: recursion_desired,
                qdcount: 1,
                ..Default::default()
            },
            questions: vec![DNSQuestion::new(name, qtype)],
            ..Default::default()
        }
    }

    pub fn response_code(&self) -> ResponseCode {
        self.header.response_code()
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        if buf.len() < HEADER_LEN {
            return Err(ParseError::InvalidHeader);
        }
        let header: DNSHeader = read_component(&buf[..HEADER_LEN])?;
        let mut reader = WireReader::new(buf, HEADER_LEN);

        let mut packet = DNSPacket {
            header,
            ..Default::default()
        };
        for _ in 0..packet.header.qdcount {
            packet.questions.push(DNSQuestion::read_from(&mut reader)?);
        }
        for _ in 0..packet.header.ancount {
            packet.answers.push(DNSResource::read_from(&mut reader)?);
        }
        for _ in 0..packet.header.nscount {
            packet.authorities.push(DNSResource::read_from(&mut reader)?);
        }
        for _ in 0..packet.header.arcount {
            packet.resources.push(DNSResource::read_from(&mut reader)?);
        }
        Ok(packet)
    }

    /// Serialize without name compression. Section counts are taken from
    /// the section vectors, not from the header.
    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut header = self.header.clone();
        header.qdcount = section_len(self.questions.len())?;
        header.ancount = section_len(self.answers.len())?;
        header.nscount = section_len(self.authorities.len())?;
        header.arcount = section_len(self.resources.len())?;

        let mut buf = Vec::new();
        {
            let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);
            header.write(&mut writer)?;
            for question in &self.questions {
                question.write(&mut writer)?;
            }
            for record in self
                .answers
                .iter()
                .chain(&self.authorities)
                .chain(&self.resources)
            {
                record.write(&mut writer)?;
            }
        }
        Ok(buf)
    }
}

fn section_len(len: usize) -> Result<u16, ParseError> {
    u16::try_from(len).map_err(|_| ParseError::InvalidHeader)
}

#[cfg(test)]
mod test {
    use super::*;
    use rdata::RData;
    use std::net::Ipv4Addr;

    #[test]
    fn test_query_wire_format() {
        let query = DNSPacket::query(0x1234, "example.com", DNSResourceType::AXFR, false);
        let wire = query.serialize().unwrap();
        assert_eq!(&wire[..HEADER_LEN], &[0x12, 0x34, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&wire[HEADER_LEN..], b"\x07example\x03com\x00\x00\xfc\x00\x01");
    }

    #[test]
    fn test_parse_serialized_response() {
        let mut response = DNSPacket::query(7, "example", DNSResourceType::A, true);
        response.header.qr = true;
        response.answers.push(DNSResource::new(
            "example.",
            DNSResourceType::A,
            300,
            RData::A(Ipv4Addr::new(192, 0, 2, 1)),
        ));
        let parsed = DNSPacket::parse(&response.serialize().unwrap()).unwrap();
        assert_eq!(parsed.header.ancount, 1);
        assert_eq!(parsed.answers, response.answers);
        assert_eq!(parsed.questions[0].name, "example.");
    }

    #[test]
    fn test_short_buffer_is_invalid_header() {
        assert!(matches!(
            DNSPacket::parse(&[0, 1, 2]),
            Err(ParseError::InvalidHeader)
        ));
    }

    #[test]
    fn test_absolute_name() {
        assert_eq!(absolute_name(""), ".");
        assert_eq!(absolute_name("."), ".");
        assert_eq!(absolute_name("com"), "com.");
        assert_eq!(absolute_name("example.com."), "example.com.");
    }
}
