use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::{
    ParseError,
    common::{PacketComponent, WireReader},
    enums::{DNSResourceClass, DNSResourceType},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSQuestion {
    /// Absolute name, `.` for the root
    pub name: String,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl DNSQuestion {
    pub fn new(name: &str, qtype: DNSResourceType) -> Self {
        Self {
            name: super::absolute_name(name),
            qtype,
            qclass: DNSResourceClass::IN,
        }
    }

    pub fn read_from(reader: &mut WireReader<'_>) -> Result<Self, ParseError> {
        let name = reader.read_name()?;
        let qtype = reader.read_u16()?.into();
        let qclass = reader.read_u16()?.into();
        Ok(Self {
            name,
            qtype,
            qclass,
        })
    }
}

impl PacketComponent for DNSQuestion {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        self.write_name(writer, &self.name)?;
        writer.write_var::<u16>(16, self.qtype.into())?;
        writer.write_var::<u16>(16, self.qclass.into())?;
        Ok(())
    }

    /// Questions are only read uncompressed here; messages go through
    /// [`DNSQuestion::read_from`].
    fn read<E: Endianness>(&mut self, reader: &mut BitReader<&[u8], E>) -> Result<(), ParseError> {
        let mut labels = Vec::new();
        loop {
            let len = reader.read_var::<u8>(8)?;
            if len == 0 {
                break;
            }
            if len & 0xC0 != 0 {
                return Err(ParseError::InvalidLabel);
            }
            let mut buf = vec![0; len as usize];
            reader.read_bytes(&mut buf)?;
            labels.push(String::from_utf8(buf).map_err(|_| ParseError::InvalidLabel)?);
        }
        self.name = super::absolute_name(&labels.join("."));
        self.qtype = reader.read_var::<u16>(16)?.into();
        self.qclass = reader.read_var::<u16>(16)?.into();
        Ok(())
    }
}
