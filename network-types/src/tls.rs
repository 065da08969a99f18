//! TLS record and handshake headers, found at the start of a TCP payload.
//!
//! Record layer (RFC 8446 §5.1):
//!    0                   1                   2                   3
//!    0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!   | content_type  |        legacy_version         |    length     |
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!   |length (con't) |                   fragment                    |
//!   +-+-+-+-+-+-+-+-+                                               +
//!   /                              ...                              /
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!
//! Handshake message prefix, the first bytes of a handshake record's fragment,
//! followed by the hello's own legacy version:
//!    0                   1                   2                   3
//!    0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!   |   msg_type    |                    length                     |
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!   |         hello_version         |
//!   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

/// Length of the record header.
pub const TLS_RECORD_LEN: usize = 5;
/// Length of the handshake header plus the hello version.
pub const TLS_HANDSHAKE_LEN: usize = 6;

/// Largest plaintext fragment (2^14).
pub const TLS_MAX_PLAINTEXT: u16 = 1 << 14;
/// Largest protected record: plaintext plus 2048 bytes of expansion.
pub const TLS_MAX_RECORD: u16 = TLS_MAX_PLAINTEXT + 2048;

pub const CONTENT_CHANGE_CIPHER_SPEC: u8 = 0x14;
pub const CONTENT_ALERT: u8 = 0x15;
pub const CONTENT_HANDSHAKE: u8 = 0x16;
pub const CONTENT_APPLICATION_DATA: u8 = 0x17;

pub const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
pub const HANDSHAKE_SERVER_HELLO: u8 = 0x02;

pub const SSL_VERSION_20: u16 = 0x0200;
pub const SSL_VERSION_30: u16 = 0x0300;
pub const TLS_VERSION_10: u16 = 0x0301;
pub const TLS_VERSION_11: u16 = 0x0302;
pub const TLS_VERSION_12: u16 = 0x0303;
pub const TLS_VERSION_13: u16 = 0x0304;

pub type ContentType = u8;
pub type Version = [u8; 2];
pub type RecordLen = [u8; 2];
pub type HandshakeLen = [u8; 3];

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TlsRecordHdr {
    pub content_type: ContentType,
    pub version: Version,
    pub len: RecordLen,
}

impl TlsRecordHdr {
    pub const LEN: usize = TLS_RECORD_LEN;

    #[inline]
    pub fn version(&self) -> u16 {
        u16::from_be_bytes(self.version)
    }

    #[inline]
    pub fn len(&self) -> u16 {
        u16::from_be_bytes(self.len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TlsHandshakeHdr {
    pub msg_type: u8,
    pub len: HandshakeLen,
    pub hello_version: Version,
}

impl TlsHandshakeHdr {
    pub const LEN: usize = TLS_HANDSHAKE_LEN;

    /// Handshake body length (24 bits).
    #[inline]
    pub fn len(&self) -> u32 {
        ((self.len[0] as u32) << 16) | ((self.len[1] as u32) << 8) | (self.len[2] as u32)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn hello_version(&self) -> u16 {
        u16::from_be_bytes(self.hello_version)
    }

    #[inline]
    pub fn is_hello(&self) -> bool {
        self.msg_type == HANDSHAKE_CLIENT_HELLO || self.msg_type == HANDSHAKE_SERVER_HELLO
    }
}

/// True for SSL 2.0, SSL 3.0 and TLS 1.0 through 1.3.
#[inline]
pub fn is_valid_version(version: u16) -> bool {
    matches!(
        version,
        SSL_VERSION_20
            | SSL_VERSION_30
            | TLS_VERSION_10
            | TLS_VERSION_11
            | TLS_VERSION_12
            | TLS_VERSION_13
    )
}

#[inline]
pub fn is_known_content_type(content_type: ContentType) -> bool {
    (CONTENT_CHANGE_CIPHER_SPEC..=CONTENT_APPLICATION_DATA).contains(&content_type)
}
