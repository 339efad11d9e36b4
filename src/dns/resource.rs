use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::{
    ParseError,
    common::{PacketComponent, WireReader},
    enums::{DNSResourceClass, DNSResourceType},
    rdata::RData,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    /// Absolute owner name, `.` for the root
    pub name: String,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: RData,
}

impl DNSResource {
    pub fn new(name: &str, rtype: DNSResourceType, ttl: u32, rdata: RData) -> Self {
        Self {
            name: super::absolute_name(name),
            rtype,
            rclass: DNSResourceClass::IN,
            ttl,
            rdata,
        }
    }

    pub fn read_from(reader: &mut WireReader<'_>) -> Result<Self, ParseError> {
        let name = reader.read_name()?;
        let rtype: DNSResourceType = reader.read_u16()?.into();
        let rclass = reader.read_u16()?.into();
        let ttl = reader.read_u32()?;
        let rdlength = reader.read_u16()?;
        let rdata = RData::decode(rtype, reader, rdlength)?;
        Ok(Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        })
    }

    /// Owner name as written to zone dumps: no trailing dot, except the
    /// root which stays `.`.
    pub fn owner(&self) -> &str {
        match self.name.strip_suffix('.') {
            Some("") | None => &self.name,
            Some(stripped) => stripped,
        }
    }

    /// One zone-dump line: `<owner> <ttl> <rdata>`, without the newline.
    pub fn to_record_line(&self) -> String {
        format!("{} {} {}", self.owner(), self.ttl, self.rdata)
    }
}

impl PacketComponent for DNSResource {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        let mut rdata = Vec::new();
        self.rdata.encode(&mut rdata)?;
        let rdlength = u16::try_from(rdata.len())
            .map_err(|_| ParseError::InvalidRdata("rdata longer than 65535 octets".into()))?;

        self.write_name(writer, &self.name)?;
        writer.write_var::<u16>(16, self.rtype.into())?;
        writer.write_var::<u16>(16, self.rclass.into())?;
        writer.write_var::<u32>(32, self.ttl)?;
        writer.write_var::<u16>(16, rdlength)?;
        writer.write_bytes(&rdata)?;
        Ok(())
    }

    /// Reads a self-contained record (no compression pointers).
    fn read<E: Endianness>(&mut self, reader: &mut BitReader<&[u8], E>) -> Result<(), ParseError> {
        let mut wire = Vec::new();
        loop {
            let len = reader.read_var::<u8>(8)?;
            wire.push(len);
            if len == 0 {
                break;
            }
            if len & 0xC0 != 0 {
                return Err(ParseError::InvalidLabel);
            }
            let mut label = vec![0; len as usize];
            reader.read_bytes(&mut label)?;
            wire.extend_from_slice(&label);
        }
        let mut fixed = [0u8; 10];
        reader.read_bytes(&mut fixed)?;
        wire.extend_from_slice(&fixed);
        let rdlength = u16::from_be_bytes([fixed[8], fixed[9]]);
        let mut rdata = vec![0; rdlength as usize];
        reader.read_bytes(&mut rdata)?;
        wire.extend_from_slice(&rdata);

        *self = DNSResource::read_from(&mut WireReader::new(&wire, 0))?;
        Ok(())
    }
}
