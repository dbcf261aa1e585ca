//! Packed-message cache & rotation group (spec.md §4.I).
//!
//! Grounded on the teacher's `DNSHandler::handle_request` for how a
//! hickory `Message` is assembled (`MessageResponseBuilder`-style direct
//! construction), generalized here to pre-pack every answer-section
//! rotation once and cache the wire bytes, so a hot hit costs only the
//! 3-byte header rewrite spec.md §4.I describes.

use hickory_server::proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_server::proto::rr::{Name, Record, RecordType};
use hickory_server::proto::serialize::binary::BinEncodable;

use crate::cache::rotation::rotations;
use crate::cache::SweepCache;
use crate::error::dns::DnsError;

type PackedKey = (String, String, String);

/// Builds one complete wire message for a fixed answer-section ordering.
/// The transaction ID is left at 0 and the RD bit cleared; both are
/// rewritten per request by [`rewrite_header`].
pub fn pack(
    qname: &Name,
    qtype: RecordType,
    answer: &[Record],
    authority: &[Record],
    additional: &[Record],
    aa: bool,
    rcode: ResponseCode,
) -> Result<Vec<u8>, DnsError> {
    let mut message = Message::new();
    message.set_message_type(MessageType::Response);
    message.set_op_code(OpCode::Query);
    message.set_authoritative(aa);
    message.set_response_code(rcode);
    message.add_query(Query::query(qname.clone(), qtype));
    for record in answer {
        message.add_answer(record.clone());
    }
    for record in authority {
        message.add_name_server(record.clone());
    }
    for record in additional {
        message.add_additional(record.clone());
    }
    message.to_bytes().map_err(|e| DnsError::PackFailure(e.to_string()))
}

/// Builds every answer-section rotation, one packed message each, in
/// rotation-distance order (spec.md §3, §4.I).
pub fn build_rotation_group(
    qname: &Name,
    qtype: RecordType,
    answer: &[Record],
    authority: &[Record],
    additional: &[Record],
    aa: bool,
    rcode: ResponseCode,
) -> Result<Vec<Vec<u8>>, DnsError> {
    rotations(answer)
        .into_iter()
        .map(|rotated| pack(qname, qtype, &rotated, authority, additional, aa, rcode))
        .collect()
}

/// Overwrites bytes 0-1 (transaction ID) and bit 0x01 of byte 2 (RD flag)
/// of a cached packed message, per spec.md §4.I, leaving the rest intact.
pub fn rewrite_header(bytes: &mut [u8], transaction_id: u16, recursion_desired: bool) {
    if bytes.len() < 3 {
        return;
    }
    bytes[0] = (transaction_id >> 8) as u8;
    bytes[1] = transaction_id as u8;
    if recursion_desired {
        bytes[2] |= 0x01;
    } else {
        bytes[2] &= !0x01;
    }
}

/// `(qname, view, qtype) -> rotation group`, consulted only for queries
/// whose qname was already all-lowercase (spec.md §4.I, §4.J step 4).
pub struct PackedCache {
    cache: SweepCache<PackedKey, Vec<Vec<u8>>>,
}

impl PackedCache {
    pub fn new(max_size: usize) -> Self {
        PackedCache { cache: SweepCache::new(max_size) }
    }

    pub async fn get(&self, qname: &str, view: &str, qtype: &str) -> Option<Vec<Vec<u8>>> {
        self.cache.get(&(qname.to_string(), view.to_string(), qtype.to_string())).await
    }

    pub async fn insert(&self, qname: &str, view: &str, qtype: &str, group: Vec<Vec<u8>>) {
        self.cache.insert((qname.to_string(), view.to_string(), qtype.to_string()), group).await;
    }

    pub async fn sweep(&self) {
        self.cache.sweep().await;
    }

    pub async fn clear(&self) {
        self.cache.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_header_sets_id_and_rd_bit() {
        let mut bytes = vec![0u8, 0, 0, 0, 0];
        rewrite_header(&mut bytes, 0x1234, true);
        assert_eq!(&bytes[0..2], &[0x12, 0x34]);
        assert_eq!(bytes[2] & 0x01, 0x01);
    }

    #[test]
    fn rewrite_header_clears_rd_bit_when_false() {
        let mut bytes = vec![0, 0, 0xff, 0, 0];
        rewrite_header(&mut bytes, 1, false);
        assert_eq!(bytes[2] & 0x01, 0);
    }

    #[test]
    fn rotation_group_has_one_entry_per_answer() {
        use hickory_server::proto::rr::rdata::A;
        use hickory_server::proto::rr::RData;
        use std::str::FromStr;

        let qname = Name::from_str("a.example.com.").unwrap();
        let answers = vec![
            Record::from_rdata(qname.clone(), 300, RData::A(A([192, 0, 2, 1].into()))),
            Record::from_rdata(qname.clone(), 300, RData::A(A([192, 0, 2, 2].into()))),
        ];
        let group = build_rotation_group(&qname, RecordType::A, &answers, &[], &[], true, ResponseCode::NoError).unwrap();
        assert_eq!(group.len(), 2);
        assert_ne!(group[0], group[1]);
    }
}
