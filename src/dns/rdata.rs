//! Typed record data and its zone-file presentation form.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use base64::{Engine, engine::general_purpose::STANDARD};

use super::{
    ParseError,
    common::{WireReader, encode_name},
    enums::DNSResourceType,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    /// NS, CNAME, PTR and DNAME targets
    Name(String),
    Mx {
        preference: u16,
        exchange: String,
    },
    Soa {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    /// TXT, SPF and HINFO character-strings
    Txt(Vec<Vec<u8>>),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    Caa {
        flags: u8,
        tag: String,
        value: Vec<u8>,
    },
    /// DS and CDS
    Ds {
        key_tag: u16,
        algorithm: u8,
        digest_type: u8,
        digest: Vec<u8>,
    },
    /// DNSKEY and CDNSKEY
    Dnskey {
        flags: u16,
        protocol: u8,
        algorithm: u8,
        public_key: Vec<u8>,
    },
    Rrsig {
        type_covered: DNSResourceType,
        algorithm: u8,
        labels: u8,
        original_ttl: u32,
        expiration: u32,
        inception: u32,
        key_tag: u16,
        signer: String,
        signature: Vec<u8>,
    },
    Nsec {
        next: String,
        types: Vec<DNSResourceType>,
    },
    Nsec3 {
        algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: Vec<u8>,
        next_hashed: Vec<u8>,
        types: Vec<DNSResourceType>,
    },
    Nsec3Param {
        algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: Vec<u8>,
    },
    Sshfp {
        algorithm: u8,
        fingerprint_type: u8,
        fingerprint: Vec<u8>,
    },
    Tlsa {
        usage: u8,
        selector: u8,
        matching_type: u8,
        data: Vec<u8>,
    },
    /// Anything without a typed representation, rendered per RFC 3597
    Opaque(Vec<u8>),
}

impl Default for RData {
    fn default() -> Self {
        RData::Opaque(Vec::new())
    }
}

impl RData {
    /// Decode `rdlength` octets at the reader's position as `rtype` data.
    pub fn decode(
        rtype: DNSResourceType,
        reader: &mut WireReader<'_>,
        rdlength: u16,
    ) -> Result<Self, ParseError> {
        let rdlength = rdlength as usize;
        if reader.remaining() < rdlength {
            return Err(ParseError::Truncated);
        }
        let end = reader.position() + rdlength;
        if rdlength == 0 {
            return Ok(RData::Opaque(Vec::new()));
        }

        let rdata = match rtype {
            DNSResourceType::A => {
                let b = reader.read_bytes(4.min(rdlength))?;
                match <[u8; 4]>::try_from(b) {
                    Ok(octets) => RData::A(Ipv4Addr::from(octets)),
                    Err(_) => return Err(ParseError::InvalidRdata("A record length".into())),
                }
            }
            DNSResourceType::AAAA => {
                let b = reader.read_bytes(16.min(rdlength))?;
                match <[u8; 16]>::try_from(b) {
                    Ok(octets) => RData::Aaaa(Ipv6Addr::from(octets)),
                    Err(_) => return Err(ParseError::InvalidRdata("AAAA record length".into())),
                }
            }
            DNSResourceType::NS
            | DNSResourceType::CNAME
            | DNSResourceType::PTR
            | DNSResourceType::DNAME => RData::Name(reader.read_name()?),
            DNSResourceType::MX => RData::Mx {
                preference: reader.read_u16()?,
                exchange: reader.read_name()?,
            },
            DNSResourceType::SOA => RData::Soa {
                mname: reader.read_name()?,
                rname: reader.read_name()?,
                serial: reader.read_u32()?,
                refresh: reader.read_u32()?,
                retry: reader.read_u32()?,
                expire: reader.read_u32()?,
                minimum: reader.read_u32()?,
            },
            DNSResourceType::TXT | DNSResourceType::SPF | DNSResourceType::HINFO => {
                let mut strings = Vec::new();
                while reader.position() < end {
                    let len = reader.read_u8()? as usize;
                    strings.push(reader.read_bytes(len)?.to_vec());
                }
                RData::Txt(strings)
            }
            DNSResourceType::SRV => RData::Srv {
                priority: reader.read_u16()?,
                weight: reader.read_u16()?,
                port: reader.read_u16()?,
                target: reader.read_name()?,
            },
            DNSResourceType::CAA => {
                let flags = reader.read_u8()?;
                let tag_len = reader.read_u8()? as usize;
                let tag = String::from_utf8_lossy(reader.read_bytes(tag_len)?).into_owned();
                let value = reader.read_bytes(tail(reader, end)?)?.to_vec();
                RData::Caa { flags, tag, value }
            }
            DNSResourceType::DS | DNSResourceType::CDS => RData::Ds {
                key_tag: reader.read_u16()?,
                algorithm: reader.read_u8()?,
                digest_type: reader.read_u8()?,
                digest: reader.read_bytes(tail(reader, end)?)?.to_vec(),
            },
            DNSResourceType::DNSKEY | DNSResourceType::CDNSKEY => RData::Dnskey {
                flags: reader.read_u16()?,
                protocol: reader.read_u8()?,
                algorithm: reader.read_u8()?,
                public_key: reader.read_bytes(tail(reader, end)?)?.to_vec(),
            },
            DNSResourceType::RRSIG => RData::Rrsig {
                type_covered: reader.read_u16()?.into(),
                algorithm: reader.read_u8()?,
                labels: reader.read_u8()?,
                original_ttl: reader.read_u32()?,
                expiration: reader.read_u32()?,
                inception: reader.read_u32()?,
                key_tag: reader.read_u16()?,
                signer: reader.read_name()?,
                signature: reader.read_bytes(tail(reader, end)?)?.to_vec(),
            },
            DNSResourceType::NSEC => {
                let next = reader.read_name()?;
                let bitmap = reader.read_bytes(tail(reader, end)?)?;
                RData::Nsec {
                    next,
                    types: decode_type_bitmap(bitmap)?,
                }
            }
            DNSResourceType::NSEC3 => {
                let algorithm = reader.read_u8()?;
                let flags = reader.read_u8()?;
                let iterations = reader.read_u16()?;
                let salt_len = reader.read_u8()? as usize;
                let salt = reader.read_bytes(salt_len)?.to_vec();
                let hash_len = reader.read_u8()? as usize;
                let next_hashed = reader.read_bytes(hash_len)?.to_vec();
                let bitmap = reader.read_bytes(tail(reader, end)?)?;
                RData::Nsec3 {
                    algorithm,
                    flags,
                    iterations,
                    salt,
                    next_hashed,
                    types: decode_type_bitmap(bitmap)?,
                }
            }
            DNSResourceType::NSEC3PARAM => {
                let algorithm = reader.read_u8()?;
                let flags = reader.read_u8()?;
                let iterations = reader.read_u16()?;
                let salt_len = reader.read_u8()? as usize;
                RData::Nsec3Param {
                    algorithm,
                    flags,
                    iterations,
                    salt: reader.read_bytes(salt_len)?.to_vec(),
                }
            }
            DNSResourceType::SSHFP => RData::Sshfp {
                algorithm: reader.read_u8()?,
                fingerprint_type: reader.read_u8()?,
                fingerprint: reader.read_bytes(tail(reader, end)?)?.to_vec(),
            },
            DNSResourceType::TLSA => RData::Tlsa {
                usage: reader.read_u8()?,
                selector: reader.read_u8()?,
                matching_type: reader.read_u8()?,
                data: reader.read_bytes(tail(reader, end)?)?.to_vec(),
            },
            _ => RData::Opaque(reader.read_bytes(rdlength)?.to_vec()),
        };

        if reader.position() != end {
            return Err(ParseError::InvalidRdata(format!(
                "{} rdata does not match its length ({} octets)",
                rtype, rdlength
            )));
        }
        Ok(rdata)
    }

    /// Append the uncompressed wire form of this data.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), ParseError> {
        match self {
            RData::A(ip) => out.extend_from_slice(&ip.octets()),
            RData::Aaaa(ip) => out.extend_from_slice(&ip.octets()),
            RData::Name(name) => encode_name(name, out)?,
            RData::Mx {
                preference,
                exchange,
            } => {
                out.extend_from_slice(&preference.to_be_bytes());
                encode_name(exchange, out)?;
            }
            RData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                encode_name(mname, out)?;
                encode_name(rname, out)?;
                for value in [serial, refresh, retry, expire, minimum] {
                    out.extend_from_slice(&value.to_be_bytes());
                }
            }
            RData::Txt(strings) => {
                for s in strings {
                    let len = u8::try_from(s.len())
                        .map_err(|_| ParseError::InvalidRdata("character-string too long".into()))?;
                    out.push(len);
                    out.extend_from_slice(s);
                }
            }
            RData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                out.extend_from_slice(&priority.to_be_bytes());
                out.extend_from_slice(&weight.to_be_bytes());
                out.extend_from_slice(&port.to_be_bytes());
                encode_name(target, out)?;
            }
            RData::Caa { flags, tag, value } => {
                out.push(*flags);
                out.push(tag.len() as u8);
                out.extend_from_slice(tag.as_bytes());
                out.extend_from_slice(value);
            }
            RData::Ds {
                key_tag,
                algorithm,
                digest_type,
                digest,
            } => {
                out.extend_from_slice(&key_tag.to_be_bytes());
                out.push(*algorithm);
                out.push(*digest_type);
                out.extend_from_slice(digest);
            }
            RData::Dnskey {
                flags,
                protocol,
                algorithm,
                public_key,
            } => {
                out.extend_from_slice(&flags.to_be_bytes());
                out.push(*protocol);
                out.push(*algorithm);
                out.extend_from_slice(public_key);
            }
            RData::Rrsig {
                type_covered,
                algorithm,
                labels,
                original_ttl,
                expiration,
                inception,
                key_tag,
                signer,
                signature,
            } => {
                out.extend_from_slice(&u16::from(*type_covered).to_be_bytes());
                out.push(*algorithm);
                out.push(*labels);
                out.extend_from_slice(&original_ttl.to_be_bytes());
                out.extend_from_slice(&expiration.to_be_bytes());
                out.extend_from_slice(&inception.to_be_bytes());
                out.extend_from_slice(&key_tag.to_be_bytes());
                encode_name(signer, out)?;
                out.extend_from_slice(signature);
            }
            RData::Nsec { next, types } => {
                encode_name(next, out)?;
                encode_type_bitmap(types, out);
            }
            RData::Nsec3 {
                algorithm,
                flags,
                iterations,
                salt,
                next_hashed,
                types,
            } => {
                out.push(*algorithm);
                out.push(*flags);
                out.extend_from_slice(&iterations.to_be_bytes());
                out.push(salt.len() as u8);
                out.extend_from_slice(salt);
                out.push(next_hashed.len() as u8);
                out.extend_from_slice(next_hashed);
                encode_type_bitmap(types, out);
            }
            RData::Nsec3Param {
                algorithm,
                flags,
                iterations,
                salt,
            } => {
                out.push(*algorithm);
                out.push(*flags);
                out.extend_from_slice(&iterations.to_be_bytes());
                out.push(salt.len() as u8);
                out.extend_from_slice(salt);
            }
            RData::Sshfp {
                algorithm,
                fingerprint_type,
                fingerprint,
            } => {
                out.push(*algorithm);
                out.push(*fingerprint_type);
                out.extend_from_slice(fingerprint);
            }
            RData::Tlsa {
                usage,
                selector,
                matching_type,
                data,
            } => {
                out.push(*usage);
                out.push(*selector);
                out.push(*matching_type);
                out.extend_from_slice(data);
            }
            RData::Opaque(bytes) => out.extend_from_slice(bytes),
        }
        Ok(())
    }
}

/// Octets left between the reader and the end of the current rdata.
fn tail(reader: &WireReader<'_>, end: usize) -> Result<usize, ParseError> {
    end.checked_sub(reader.position())
        .ok_or_else(|| ParseError::InvalidRdata("field overruns rdata".into()))
}

fn decode_type_bitmap(mut bitmap: &[u8]) -> Result<Vec<DNSResourceType>, ParseError> {
    let mut types = Vec::new();
    while !bitmap.is_empty() {
        if bitmap.len() < 2 {
            return Err(ParseError::InvalidRdata("type bitmap window".into()));
        }
        let window = bitmap[0] as u16;
        let len = bitmap[1] as usize;
        if len == 0 || len > 32 || bitmap.len() < 2 + len {
            return Err(ParseError::InvalidRdata("type bitmap length".into()));
        }
        for (i, byte) in bitmap[2..2 + len].iter().enumerate() {
            for bit in 0..8 {
                if byte & (0x80 >> bit) != 0 {
                    types.push(DNSResourceType::from(window * 256 + (i as u16) * 8 + bit));
                }
            }
        }
        bitmap = &bitmap[2 + len..];
    }
    Ok(types)
}

fn encode_type_bitmap(types: &[DNSResourceType], out: &mut Vec<u8>) {
    let mut codes: Vec<u16> = types.iter().map(|t| u16::from(*t)).collect();
    codes.sort_unstable();
    codes.dedup();

    let mut i = 0;
    while i < codes.len() {
        let window = codes[i] >> 8;
        let mut bits = [0u8; 32];
        let mut used = 0;
        while i < codes.len() && codes[i] >> 8 == window {
            let low = (codes[i] & 0xFF) as usize;
            bits[low / 8] |= 0x80 >> (low % 8);
            used = used.max(low / 8 + 1);
            i += 1;
        }
        out.push(window as u8);
        out.push(used as u8);
        out.extend_from_slice(&bits[..used]);
    }
}

fn write_char_string(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("\"")?;
    for &b in bytes {
        match b {
            b'"' | b'\\' => write!(f, "\\{}", b as char)?,
            0x20..=0x7E => write!(f, "{}", b as char)?,
            _ => write!(f, "\\{:03}", b)?,
        }
    }
    f.write_str("\"")
}

fn write_types(f: &mut fmt::Formatter<'_>, types: &[DNSResourceType]) -> fmt::Result {
    for t in types {
        write!(f, " {}", t)?;
    }
    Ok(())
}

fn salt_text(salt: &[u8]) -> String {
    if salt.is_empty() {
        "-".to_string()
    } else {
        hex::encode_upper(salt)
    }
}

fn signature_time(secs: u32) -> String {
    chrono::DateTime::from_timestamp(secs as i64, 0)
        .map(|t| t.format("%Y%m%d%H%M%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(ip) => write!(f, "{}", ip),
            RData::Aaaa(ip) => write!(f, "{}", ip),
            RData::Name(name) => f.write_str(name),
            RData::Mx {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            RData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{} {} {} {} {} {} {}",
                mname, rname, serial, refresh, retry, expire, minimum
            ),
            RData::Txt(strings) => {
                for (i, s) in strings.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write_char_string(f, s)?;
                }
                Ok(())
            }
            RData::Srv {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{} {} {} {}", priority, weight, port, target),
            RData::Caa { flags, tag, value } => {
                write!(f, "{} {} ", flags, tag)?;
                write_char_string(f, value)
            }
            RData::Ds {
                key_tag,
                algorithm,
                digest_type,
                digest,
            } => write!(
                f,
                "{} {} {} {}",
                key_tag,
                algorithm,
                digest_type,
                hex::encode_upper(digest)
            ),
            RData::Dnskey {
                flags,
                protocol,
                algorithm,
                public_key,
            } => write!(
                f,
                "{} {} {} {}",
                flags,
                protocol,
                algorithm,
                STANDARD.encode(public_key)
            ),
            RData::Rrsig {
                type_covered,
                algorithm,
                labels,
                original_ttl,
                expiration,
                inception,
                key_tag,
                signer,
                signature,
            } => write!(
                f,
                "{} {} {} {} {} {} {} {} {}",
                type_covered,
                algorithm,
                labels,
                original_ttl,
                signature_time(*expiration),
                signature_time(*inception),
                key_tag,
                signer,
                STANDARD.encode(signature)
            ),
            RData::Nsec { next, types } => {
                f.write_str(next)?;
                write_types(f, types)
            }
            RData::Nsec3 {
                algorithm,
                flags,
                iterations,
                salt,
                next_hashed,
                types,
            } => {
                let next = base32::encode(base32::Alphabet::Rfc4648Hex { padding: false }, next_hashed)
                    .to_lowercase();
                write!(
                    f,
                    "{} {} {} {} {}",
                    algorithm,
                    flags,
                    iterations,
                    salt_text(salt),
                    next
                )?;
                write_types(f, types)
            }
            RData::Nsec3Param {
                algorithm,
                flags,
                iterations,
                salt,
            } => write!(f, "{} {} {} {}", algorithm, flags, iterations, salt_text(salt)),
            RData::Sshfp {
                algorithm,
                fingerprint_type,
                fingerprint,
            } => write!(
                f,
                "{} {} {}",
                algorithm,
                fingerprint_type,
                hex::encode_upper(fingerprint)
            ),
            RData::Tlsa {
                usage,
                selector,
                matching_type,
                data,
            } => write!(
                f,
                "{} {} {} {}",
                usage,
                selector,
                matching_type,
                hex::encode_upper(data)
            ),
            RData::Opaque(bytes) if bytes.is_empty() => f.write_str("\\# 0"),
            RData::Opaque(bytes) => write!(f, "\\# {} {}", bytes.len(), hex::encode_upper(bytes)),
        }
    }
}
