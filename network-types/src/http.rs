//! HTTP/1.x start line prefix.
//!
//! Only the first [`HTTP_PREFIX_LEN`] bytes of a payload are ever inspected:
//! enough for the longest request method plus its trailing space, or for the
//! `HTTP/1.` version tag that opens a status line.

pub const HTTP_PREFIX_LEN: usize = 8;

pub type HttpPrefix = [u8; HTTP_PREFIX_LEN];

/// Request methods recognized at the start of a request line.
pub const METHODS: [&[u8]; 9] = [
    b"GET ",
    b"POST ",
    b"PUT ",
    b"DELETE ",
    b"HEAD ",
    b"OPTIONS ",
    b"PATCH ",
    b"CONNECT ",
    b"TRACE ",
];

pub const RESPONSE_TAG: &[u8] = b"HTTP/1.";

#[inline]
fn starts_with(prefix: &HttpPrefix, pattern: &[u8]) -> bool {
    if pattern.len() > prefix.len() {
        return false;
    }
    let mut i = 0;
    // explicit index loop keeps the verifier's bound obvious
    while i < pattern.len() {
        if prefix[i] != pattern[i] {
            return false;
        }
        i += 1;
    }
    true
}

#[inline]
pub fn is_request(prefix: &HttpPrefix) -> bool {
    let mut i = 0;
    while i < METHODS.len() {
        if starts_with(prefix, METHODS[i]) {
            return true;
        }
        i += 1;
    }
    false
}

#[inline]
pub fn is_response(prefix: &HttpPrefix) -> bool {
    starts_with(prefix, RESPONSE_TAG)
}
