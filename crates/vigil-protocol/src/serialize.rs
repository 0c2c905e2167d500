//! Frame encoding into a `BytesMut`.
//!
//! The watcher only ever sends arrays of bulk strings, but every variant
//! encodes so test fakes can answer with the same type.

use bytes::{BufMut, BytesMut};

use crate::types::Frame;

const CRLF: &[u8] = b"\r\n";

impl Frame {
    /// Appends the wire form of this frame to `dst`.
    pub fn serialize(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => line(dst, b'+', s.as_bytes()),
            Frame::Error(msg) => line(dst, b'-', msg.as_bytes()),
            Frame::Integer(n) => header(dst, b':', *n),
            Frame::Bulk(data) => {
                header(dst, b'$', data.len() as i64);
                dst.reserve(data.len() + CRLF.len());
                dst.put_slice(data);
                dst.put_slice(CRLF);
            }
            Frame::Null => header(dst, b'$', -1),
            Frame::Array(items) => {
                header(dst, b'*', items.len() as i64);
                items.iter().for_each(|item| item.serialize(dst));
            }
            Frame::NullArray => header(dst, b'*', -1),
        }
    }
}

fn line(dst: &mut BytesMut, tag: u8, body: &[u8]) {
    dst.put_u8(tag);
    dst.put_slice(body);
    dst.put_slice(CRLF);
}

/// Tag followed by a decimal number, formatted with `itoa`.
fn header(dst: &mut BytesMut, tag: u8, n: i64) {
    let mut digits = itoa::Buffer::new();
    line(dst, tag, digits.format(n).as_bytes());
}
