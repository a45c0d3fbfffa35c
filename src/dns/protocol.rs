//! Implements the DNS message format in a transport agnostic fashion

use std::fmt;
use std::net::Ipv4Addr;

use crate::dns::buffer::{slice_bits, BufferError, PacketBuffer, VectorPacketBuffer};

#[derive(Debug)]
pub enum ProtocolError {
    /// Packet shorter than the fixed header, or the question ran past the
    /// end of the buffer. Callers drop the packet without responding.
    MalformedPacket,
    /// A domain name that cannot be wire-encoded (label over 63 octets or
    /// total length over 255).
    InvalidDomain(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MalformedPacket => write!(f, "Malformed packet"),
            ProtocolError::InvalidDomain(name) => write!(f, "Invalid domain name: {}", name),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<BufferError> for ProtocolError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::EndOfBuffer => ProtocolError::MalformedPacket,
            BufferError::LabelTooLong(name) | BufferError::NameTooLong(name) => {
                ProtocolError::InvalidDomain(name)
            }
        }
    }
}

type Result<T> = std::result::Result<T, ProtocolError>;

/// `QueryType` represents the requested Record Type of a query
///
/// The specific type Unknown retains the id of an unsupported query type so
/// the reply can echo the question verbatim. An integer can be converted to a
/// querytype using the `from_num` function, and back using `to_num`.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Copy)]
pub enum QueryType {
    Unknown(u16),
    A,     // 1
    Ns,    // 2
    Cname, // 5
    Soa,   // 6
    Mx,    // 15
    Txt,   // 16
}

impl QueryType {
    pub fn to_num(&self) -> u16 {
        match *self {
            QueryType::Unknown(x) => x,
            QueryType::A => 1,
            QueryType::Ns => 2,
            QueryType::Cname => 5,
            QueryType::Soa => 6,
            QueryType::Mx => 15,
            QueryType::Txt => 16,
        }
    }

    pub fn from_num(num: u16) -> QueryType {
        match num {
            1 => QueryType::A,
            2 => QueryType::Ns,
            5 => QueryType::Cname,
            6 => QueryType::Soa,
            15 => QueryType::Mx,
            16 => QueryType::Txt,
            _ => QueryType::Unknown(num),
        }
    }

    /// Parse a zone-file type mnemonic, case-insensitively.
    pub fn from_name(name: &str) -> Option<QueryType> {
        match name.to_ascii_lowercase().as_str() {
            "a" => Some(QueryType::A),
            "ns" => Some(QueryType::Ns),
            "cname" => Some(QueryType::Cname),
            "soa" => Some(QueryType::Soa),
            "mx" => Some(QueryType::Mx),
            "txt" => Some(QueryType::Txt),
            _ => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(*self, QueryType::Unknown(_))
    }
}

/// The result code for a DNS query, as described in RFC 1035
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ResultCode {
    #[default]
    NOERROR = 0,
    FORMERR = 1,
    SERVFAIL = 2,
    NXDOMAIN = 3,
    NOTIMP = 4,
    REFUSED = 5,
}

impl ResultCode {
    pub fn from_num(num: u8) -> ResultCode {
        match num {
            1 => ResultCode::FORMERR,
            2 => ResultCode::SERVFAIL,
            3 => ResultCode::NXDOMAIN,
            4 => ResultCode::NOTIMP,
            5 => ResultCode::REFUSED,
            _ => ResultCode::NOERROR,
        }
    }
}

/// Representation of a DNS header
///
/// Flag bytes follow RFC 1035 4.1.1: byte 2 is qr(1) opcode(4) aa(1) tc(1)
/// rd(1) from the MSB down, byte 3 is ra(1) z(3) rcode(4). Fields are masked
/// to their declared width on write, never validated.
#[derive(Clone, Debug, Default)]
pub struct DnsHeader {
    pub id: u16, // 16 bits

    pub response: bool,             // 1 bit
    pub opcode: u8,                 // 4 bits
    pub authoritative_answer: bool, // 1 bit
    pub truncated_message: bool,    // 1 bit
    pub recursion_desired: bool,    // 1 bit

    pub recursion_available: bool, // 1 bit
    pub z: u8,                     // 3 bits
    pub rescode: ResultCode,       // 4 bits

    pub questions: u16,             // 16 bits
    pub answers: u16,               // 16 bits
    pub authoritative_entries: u16, // 16 bits
    pub resource_entries: u16,      // 16 bits
}

impl DnsHeader {
    pub fn new() -> DnsHeader {
        DnsHeader::default()
    }

    pub fn read<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        self.id = buffer.read_u16()?;

        let a = buffer.read()?;
        self.response = slice_bits(a, 0, 1) == 1;
        self.opcode = slice_bits(a, 1, 4);
        self.authoritative_answer = slice_bits(a, 5, 1) == 1;
        self.truncated_message = slice_bits(a, 6, 1) == 1;
        self.recursion_desired = slice_bits(a, 7, 1) == 1;

        let b = buffer.read()?;
        self.recursion_available = slice_bits(b, 0, 1) == 1;
        self.z = slice_bits(b, 1, 3);
        self.rescode = ResultCode::from_num(slice_bits(b, 4, 4));

        self.questions = buffer.read_u16()?;
        self.answers = buffer.read_u16()?;
        self.authoritative_entries = buffer.read_u16()?;
        self.resource_entries = buffer.read_u16()?;

        Ok(())
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_u16(self.id)?;

        buffer.write_u8(
            ((self.response as u8) << 7)
                | ((self.opcode & 0x0F) << 3)
                | ((self.authoritative_answer as u8) << 2)
                | ((self.truncated_message as u8) << 1)
                | (self.recursion_desired as u8),
        )?;

        buffer.write_u8(
            ((self.recursion_available as u8) << 7)
                | ((self.z & 0x07) << 4)
                | ((self.rescode as u8) & 0x0F),
        )?;

        buffer.write_masked(u64::from(self.questions), 2)?;
        buffer.write_masked(u64::from(self.answers), 2)?;
        buffer.write_masked(u64::from(self.authoritative_entries), 2)?;
        buffer.write_masked(u64::from(self.resource_entries), 2)?;

        Ok(())
    }

    pub fn binary_len(&self) -> usize {
        12
    }
}

/// Representation of a DNS question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: QueryType,
    pub qclass: u16,
}

impl DnsQuestion {
    pub fn new(name: String, qtype: QueryType) -> DnsQuestion {
        DnsQuestion {
            name,
            qtype,
            qclass: 1,
        }
    }

    pub fn read<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        buffer.read_qname(&mut self.name)?;
        self.qtype = QueryType::from_num(buffer.read_u16()?);
        self.qclass = buffer.read_u16()?;

        Ok(())
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_qname(&self.name)?;
        buffer.write_u16(self.qtype.to_num())?;
        buffer.write_u16(self.qclass)?;

        Ok(())
    }
}

impl fmt::Display for DnsQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} type {:?}", self.name, self.qtype)
    }
}

/// `DnsRecord` is the wire-level representation of a resource record
///
/// One variant per supported record type; `Unknown` carries the length of
/// unrecognized rdata so a reader can skip over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsRecord {
    Unknown {
        domain: String,
        qtype: u16,
        data_len: u16,
        ttl: u32,
    }, // 0
    A {
        domain: String,
        addr: Ipv4Addr,
        ttl: u32,
    }, // 1
    Ns {
        domain: String,
        host: String,
        ttl: u32,
    }, // 2
    Cname {
        domain: String,
        host: String,
        ttl: u32,
    }, // 5
    Soa {
        domain: String,
        m_name: String,
        r_name: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
        ttl: u32,
    }, // 6
    Mx {
        domain: String,
        priority: u16,
        host: String,
        ttl: u32,
    }, // 15
    Txt {
        domain: String,
        data: String,
        ttl: u32,
    }, // 16
}

impl DnsRecord {
    pub fn read<T: PacketBuffer>(buffer: &mut T) -> Result<DnsRecord> {
        let mut domain = String::new();
        buffer.read_qname(&mut domain)?;

        let qtype_num = buffer.read_u16()?;
        let qtype = QueryType::from_num(qtype_num);
        let _class = buffer.read_u16()?;
        let ttl = buffer.read_u32()?;
        let data_len = buffer.read_u16()?;

        match qtype {
            QueryType::A => {
                let raw_addr = buffer.read_u32()?;
                let addr = Ipv4Addr::new(
                    ((raw_addr >> 24) & 0xFF) as u8,
                    ((raw_addr >> 16) & 0xFF) as u8,
                    ((raw_addr >> 8) & 0xFF) as u8,
                    (raw_addr & 0xFF) as u8,
                );

                Ok(DnsRecord::A { domain, addr, ttl })
            }
            QueryType::Ns => {
                let mut ns = String::new();
                buffer.read_qname(&mut ns)?;

                Ok(DnsRecord::Ns {
                    domain,
                    host: ns,
                    ttl,
                })
            }
            QueryType::Cname => {
                let mut cname = String::new();
                buffer.read_qname(&mut cname)?;

                Ok(DnsRecord::Cname {
                    domain,
                    host: cname,
                    ttl,
                })
            }
            QueryType::Mx => {
                let priority = buffer.read_u16()?;
                let mut mx = String::new();
                buffer.read_qname(&mut mx)?;

                Ok(DnsRecord::Mx {
                    domain,
                    priority,
                    host: mx,
                    ttl,
                })
            }
            QueryType::Soa => {
                let mut m_name = String::new();
                buffer.read_qname(&mut m_name)?;

                let mut r_name = String::new();
                buffer.read_qname(&mut r_name)?;

                let serial = buffer.read_u32()?;
                let refresh = buffer.read_u32()?;
                let retry = buffer.read_u32()?;
                let expire = buffer.read_u32()?;
                let minimum = buffer.read_u32()?;

                Ok(DnsRecord::Soa {
                    domain,
                    m_name,
                    r_name,
                    serial,
                    refresh,
                    retry,
                    expire,
                    minimum,
                    ttl,
                })
            }
            QueryType::Txt => {
                // rdata is a sequence of character strings
                let mut txt = String::new();
                let end = buffer.pos() + data_len as usize;
                while buffer.pos() < end {
                    let len = buffer.read()? as usize;
                    let pos = buffer.pos();
                    txt.push_str(&String::from_utf8_lossy(buffer.get_range(pos, len)?));
                    buffer.step(len)?;
                }

                Ok(DnsRecord::Txt {
                    domain,
                    data: txt,
                    ttl,
                })
            }
            QueryType::Unknown(_) => {
                buffer.step(data_len as usize)?;

                Ok(DnsRecord::Unknown {
                    domain,
                    qtype: qtype_num,
                    data_len,
                    ttl,
                })
            }
        }
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<usize> {
        let start_pos = buffer.pos();

        match *self {
            DnsRecord::A {
                ref domain,
                ref addr,
                ttl,
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(QueryType::A.to_num())?;
                buffer.write_u16(1)?;
                buffer.write_u32(ttl)?;
                buffer.write_u16(4)?;

                let octets = addr.octets();
                buffer.write_u8(octets[0])?;
                buffer.write_u8(octets[1])?;
                buffer.write_u8(octets[2])?;
                buffer.write_u8(octets[3])?;
            }
            DnsRecord::Ns {
                ref domain,
                ref host,
                ttl,
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(QueryType::Ns.to_num())?;
                buffer.write_u16(1)?;
                buffer.write_u32(ttl)?;

                let pos = buffer.pos();
                buffer.write_u16(0)?;

                buffer.write_qname(host)?;

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            DnsRecord::Cname {
                ref domain,
                ref host,
                ttl,
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(QueryType::Cname.to_num())?;
                buffer.write_u16(1)?;
                buffer.write_u32(ttl)?;

                let pos = buffer.pos();
                buffer.write_u16(0)?;

                buffer.write_qname(host)?;

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            DnsRecord::Mx {
                ref domain,
                priority,
                ref host,
                ttl,
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(QueryType::Mx.to_num())?;
                buffer.write_u16(1)?;
                buffer.write_u32(ttl)?;

                let pos = buffer.pos();
                buffer.write_u16(0)?;

                buffer.write_u16(priority)?;
                buffer.write_qname(host)?;

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            DnsRecord::Soa {
                ref domain,
                ref m_name,
                ref r_name,
                serial,
                refresh,
                retry,
                expire,
                minimum,
                ttl,
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(QueryType::Soa.to_num())?;
                buffer.write_u16(1)?;
                buffer.write_u32(ttl)?;

                let pos = buffer.pos();
                buffer.write_u16(0)?;

                buffer.write_qname(m_name)?;
                buffer.write_qname(r_name)?;
                buffer.write_u32(serial)?;
                buffer.write_u32(refresh)?;
                buffer.write_u32(retry)?;
                buffer.write_u32(expire)?;
                buffer.write_u32(minimum)?;

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            DnsRecord::Txt {
                ref domain,
                ref data,
                ttl,
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(QueryType::Txt.to_num())?;
                buffer.write_u16(1)?;
                buffer.write_u32(ttl)?;

                let pos = buffer.pos();
                buffer.write_u16(0)?;

                buffer.write_character_string(data)?;

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            DnsRecord::Unknown { .. } => {
                log::info!("Skipping record: {:?}", self);
            }
        }

        Ok(buffer.pos() - start_pos)
    }

    pub fn get_querytype(&self) -> QueryType {
        match *self {
            DnsRecord::Unknown { qtype, .. } => QueryType::Unknown(qtype),
            DnsRecord::A { .. } => QueryType::A,
            DnsRecord::Ns { .. } => QueryType::Ns,
            DnsRecord::Cname { .. } => QueryType::Cname,
            DnsRecord::Soa { .. } => QueryType::Soa,
            DnsRecord::Mx { .. } => QueryType::Mx,
            DnsRecord::Txt { .. } => QueryType::Txt,
        }
    }

    pub fn get_ttl(&self) -> u32 {
        match *self {
            DnsRecord::Unknown { ttl, .. }
            | DnsRecord::A { ttl, .. }
            | DnsRecord::Ns { ttl, .. }
            | DnsRecord::Cname { ttl, .. }
            | DnsRecord::Soa { ttl, .. }
            | DnsRecord::Mx { ttl, .. }
            | DnsRecord::Txt { ttl, .. } => ttl,
        }
    }
}

/// Representation of a complete DNS packet
///
/// A packet holds the header, the single question this server supports, and
/// the answer records. Authority and additional sections are not modeled;
/// their counts are emitted as zero.
#[derive(Clone, Debug, Default)]
pub struct DnsPacket {
    pub header: DnsHeader,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsRecord>,
}

impl DnsPacket {
    pub fn new() -> DnsPacket {
        DnsPacket {
            header: DnsHeader::new(),
            questions: Vec::new(),
            answers: Vec::new(),
        }
    }

    /// Decode a raw datagram into a packet.
    ///
    /// Exactly one question is parsed; additional questions are not
    /// supported. An unsupported question type is not a decode failure: the
    /// rcode is set to NXDOMAIN and the packet is returned so the pipeline
    /// can still answer with an empty response.
    pub fn from_datagram(data: &[u8]) -> Result<DnsPacket> {
        if data.len() < 12 {
            return Err(ProtocolError::MalformedPacket);
        }

        let mut buffer = VectorPacketBuffer::from_slice(data);
        let mut packet = DnsPacket::from_buffer(&mut buffer)?;

        if let Some(question) = packet.questions.first() {
            if !question.qtype.is_supported() {
                packet.header.rescode = ResultCode::NXDOMAIN;
            }
        }

        Ok(packet)
    }

    pub fn from_buffer<T: PacketBuffer>(buffer: &mut T) -> Result<DnsPacket> {
        let mut result = DnsPacket::new();
        result.header.read(buffer)?;

        if result.header.questions == 0 {
            return Err(ProtocolError::MalformedPacket);
        }

        let mut question = DnsQuestion::new(String::new(), QueryType::Unknown(0));
        question.read(buffer)?;
        result.questions.push(question);

        for _ in 0..result.header.answers {
            let rec = DnsRecord::read(buffer)?;
            result.answers.push(rec);
        }

        Ok(result)
    }

    /// Encode the packet into wire format.
    ///
    /// No name compression is performed: every record owner name is spelled
    /// out in full even when it matches the question name.
    pub fn to_datagram(&self) -> Result<Vec<u8>> {
        let mut buffer = VectorPacketBuffer::new();
        self.write(&mut buffer)?;

        Ok(buffer.into_bytes())
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        self.header.write(buffer)?;

        for question in &self.questions {
            question.write(buffer)?;
        }

        for rec in &self.answers {
            rec.write(buffer)?;
        }

        Ok(())
    }
}
