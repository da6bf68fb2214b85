//! RTTrPM datagram framing
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Bytes 0-1:   Int signature   0x4154 ("AT")                   │
//! │ Bytes 2-3:   Float signature 0x4334 ("C4")                   │
//! │ Bytes 4-5:   Version                                         │
//! │ Bytes 6-9:   Packet id                                       │
//! │ Byte  10:    Format                                          │
//! │ Bytes 11-12: Packet size                                     │
//! │ Bytes 13-16: Context                                         │
//! │ Byte  17:    Module count                                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Trackable modules (type 0x01 / 0x51):                        │
//! │   type u8, size u16, name len u8, name, sequence u32,        │
//! │   sub-module count u8, sub-modules...                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//! All multi-byte fields are big-endian. A trackable's size covers its
//! sub-modules, so each trackable is decoded from its own bounded slice.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tracing::debug;

use super::module::{
    code, ensure, put_short_string, read_short_string, Module, MODULE_HEADER_SIZE,
};

pub const INT_SIGNATURE: u16 = 0x4154;
pub const FLOAT_SIGNATURE: u16 = 0x4334;
pub const HEADER_SIZE: usize = 18;

/// Default protocol version written by the encoder
pub const VERSION: u16 = 0x0002;

/// Datagram decode failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RttrpmError {
    #[error("truncated datagram: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("bad signature: int {int:#06x}, float {float:#06x}")]
    BadSignature { int: u16, float: u16 },

    #[error("module {module_type:#04x} declares {size} bytes, only {remaining} remaining")]
    ModuleOverrun {
        module_type: u8,
        size: usize,
        remaining: usize,
    },

    #[error("module {module_type:#04x} declares {declared} bytes, layout needs {expected}")]
    ModuleSizeMismatch {
        module_type: u8,
        declared: usize,
        expected: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    pub version: u16,
    pub packet_id: u32,
    pub format: u8,
    pub packet_size: u16,
    pub context: u32,
    pub module_count: u8,
}

impl PacketHeader {
    fn decode(buf: &mut &[u8]) -> Result<Self, RttrpmError> {
        ensure(buf, HEADER_SIZE)?;
        let int = buf.get_u16();
        let float = buf.get_u16();
        if int != INT_SIGNATURE || float != FLOAT_SIGNATURE {
            return Err(RttrpmError::BadSignature { int, float });
        }
        Ok(Self {
            version: buf.get_u16(),
            packet_id: buf.get_u32(),
            format: buf.get_u8(),
            packet_size: buf.get_u16(),
            context: buf.get_u32(),
            module_count: buf.get_u8(),
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(INT_SIGNATURE);
        buf.put_u16(FLOAT_SIGNATURE);
        buf.put_u16(self.version);
        buf.put_u32(self.packet_id);
        buf.put_u8(self.format);
        buf.put_u16(self.packet_size);
        buf.put_u32(self.context);
        buf.put_u8(self.module_count);
    }
}

/// Named wrapper module holding the sub-modules of one tracked object
#[derive(Debug, Clone, PartialEq)]
pub struct Trackable {
    /// 0x01 or 0x51
    pub type_code: u8,
    pub name: String,
    pub sequence: u32,
    pub modules: Vec<Module>,
}

impl Trackable {
    pub fn new(name: impl Into<String>, sequence: u32, modules: Vec<Module>) -> Self {
        Self {
            type_code: code::TRACKABLE,
            name: name.into(),
            sequence,
            modules,
        }
    }

    /// Centroid positions of this trackable in module order
    pub fn centroid_positions(&self) -> impl Iterator<Item = &super::Vec3> {
        self.modules.iter().filter_map(|m| match m {
            Module::CentroidPosition { position, .. } => Some(position),
            _ => None,
        })
    }

    /// Decode the body following a trackable header; `body` is bounded by
    /// the trackable's declared size.
    fn decode_body(type_code: u8, mut body: &[u8]) -> Result<Self, RttrpmError> {
        let name = read_short_string(&mut body)?;
        ensure(body, 5)?;
        let sequence = body.get_u32();
        let sub_count = body.get_u8();

        let mut modules = Vec::with_capacity(sub_count as usize);
        for _ in 0..sub_count {
            if let Some((sub_type, payload)) = next_module(&mut body)? {
                match Module::decode_payload(sub_type, payload)? {
                    Some(module) => modules.push(module),
                    None => debug!("Skipping unknown RTTrPM sub-module {:#04x}", sub_type),
                }
            }
        }

        Ok(Self {
            type_code,
            name,
            sequence,
            modules,
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        let mut body = BytesMut::new();
        put_short_string(&mut body, &self.name);
        body.put_u32(self.sequence);
        body.put_u8(self.modules.len().min(u8::MAX as usize) as u8);
        for module in self.modules.iter().take(u8::MAX as usize) {
            module.encode(&mut body);
        }
        buf.put_u8(self.type_code);
        buf.put_u16((body.len() + MODULE_HEADER_SIZE) as u16);
        buf.extend_from_slice(&body);
    }
}

/// Split the next module off `buf`.
///
/// Returns the type code and the payload slice, or `None` for a module with
/// a zero (or header-only) size, whose header alone is consumed.
fn next_module<'a>(buf: &mut &'a [u8]) -> Result<Option<(u8, &'a [u8])>, RttrpmError> {
    let data: &'a [u8] = *buf;
    ensure(data, MODULE_HEADER_SIZE)?;
    let type_code = data[0];
    let size = u16::from_be_bytes([data[1], data[2]]) as usize;

    if size <= MODULE_HEADER_SIZE {
        debug!("Skipping empty RTTrPM module {:#04x}", type_code);
        *buf = &data[MODULE_HEADER_SIZE..];
        return Ok(None);
    }
    if size > data.len() {
        return Err(RttrpmError::ModuleOverrun {
            module_type: type_code,
            size,
            remaining: data.len(),
        });
    }

    let (module, rest) = data.split_at(size);
    *buf = rest;
    Ok(Some((type_code, &module[MODULE_HEADER_SIZE..])))
}

/// One decoded RTTrPM datagram
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RttrpmPacket {
    pub header: PacketHeader,
    pub trackables: Vec<Trackable>,
}

impl RttrpmPacket {
    pub fn new(packet_id: u32, trackables: Vec<Trackable>) -> Self {
        Self {
            header: PacketHeader {
                version: VERSION,
                packet_id,
                ..Default::default()
            },
            trackables,
        }
    }

    /// Decode a datagram.
    ///
    /// Never reads past the end of `data`. Top-level modules that are not
    /// trackables are skipped by their declared size.
    pub fn decode(data: &[u8]) -> Result<Self, RttrpmError> {
        let mut buf = data;
        let header = PacketHeader::decode(&mut buf)?;

        let mut trackables = Vec::with_capacity(header.module_count as usize);
        for _ in 0..header.module_count {
            let Some((type_code, body)) = next_module(&mut buf)? else {
                continue;
            };
            match type_code {
                code::TRACKABLE | code::TRACKABLE_WITH_TIMESTAMP => {
                    trackables.push(Trackable::decode_body(type_code, body)?);
                }
                other => debug!("Skipping RTTrPM top-level module {:#04x}", other),
            }
        }

        Ok(Self { header, trackables })
    }

    /// Encode with `packet_size` and `module_count` derived from the content
    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        let count = self.trackables.len().min(u8::MAX as usize);
        for trackable in self.trackables.iter().take(count) {
            trackable.encode(&mut body);
        }

        let header = PacketHeader {
            packet_size: (HEADER_SIZE + body.len()).min(u16::MAX as usize) as u16,
            module_count: count as u8,
            ..self.header
        };
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
        header.encode(&mut buf);
        buf.extend_from_slice(&body);
        buf.freeze()
    }

    /// Total number of decoded sub-modules
    pub fn module_count(&self) -> usize {
        self.trackables.iter().map(|t| t.modules.len()).sum()
    }

    /// Decoded sub-modules of every trackable in wire order, each paired
    /// with its 1-based index within the datagram. Skipped unknown
    /// sub-modules take no index.
    pub fn indexed_modules(&self) -> impl Iterator<Item = (i32, &Module)> {
        (1..).zip(self.trackables.iter().flat_map(|t| t.modules.iter()))
    }
}
