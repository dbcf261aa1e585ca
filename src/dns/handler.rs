//! Query dispatcher (spec.md §4.J): wire handler for the DNS listener.
//!
//! The spec's packed-message rotation cache needs direct control over the
//! final byte buffer (a 3-byte header rewrite on every cache hit), which
//! hickory-server's `RequestHandler`/`ResponseHandler` abstraction doesn't
//! expose — it owns the encode step. So, unlike the teacher's
//! `DNSHandler`, this dispatcher talks to `tokio::net::{UdpSocket,
//! TcpListener}` directly and uses only `hickory_server::proto`'s wire
//! types (`Message`, `Record`, `Name`), the same types
//! `original_source/dns_setup.go`'s raw `miekg/dns` listener is built on.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use hickory_server::proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_server::proto::rr::{DNSClass, Name, Record, RecordType};
use hickory_server::proto::serialize::binary::BinDecodable;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use crate::dns::packed;
use crate::state::GlobalState;

pub async fn serve_udp(state: Arc<GlobalState>, addr: SocketAddr) -> std::io::Result<()> {
    let socket = Arc::new(UdpSocket::bind(addr).await?);
    log::info!("DNS UDP listener on {addr}");
    let mut buf = vec![0u8; 65535];
    loop {
        let (len, src) = socket.recv_from(&mut buf).await?;
        let data = buf[..len].to_vec();
        let state = Arc::clone(&state);
        let socket = Arc::clone(&socket);
        tokio::spawn(async move {
            if let Some(response) = handle_query(&state, &data, src).await {
                if let Err(err) = socket.send_to(&response, src).await {
                    log::warn!("failed to send UDP response to {src}: {err}");
                }
            }
        });
    }
}

pub async fn serve_tcp(state: Arc<GlobalState>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("DNS TCP listener on {addr}");
    loop {
        let (stream, src) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(err) = handle_tcp_connection(&state, stream, src).await {
                log::debug!("tcp connection from {src} ended: {err}");
            }
        });
    }
}

async fn handle_tcp_connection(state: &GlobalState, mut stream: TcpStream, src: SocketAddr) -> std::io::Result<()> {
    loop {
        let mut len_buf = [0u8; 2];
        if stream.read_exact(&mut len_buf).await.is_err() {
            return Ok(());
        }
        let len = u16::from_be_bytes(len_buf) as usize;
        let mut msg_buf = vec![0u8; len];
        stream.read_exact(&mut msg_buf).await?;

        if let Some(response) = handle_query(state, &msg_buf, src).await {
            stream.write_all(&(response.len() as u16).to_be_bytes()).await?;
            stream.write_all(&response).await?;
        }
    }
}

fn refused(message: &Message) -> Vec<u8> {
    build_header_only(message, false, ResponseCode::Refused)
}

fn servfail(message: &Message) -> Vec<u8> {
    build_header_only(message, false, ResponseCode::ServFail)
}

fn build_header_only(message: &Message, aa: bool, rcode: ResponseCode) -> Vec<u8> {
    let qname = message.queries().first().map(|q| q.name().clone()).unwrap_or_else(Name::root);
    let qtype = message.queries().first().map(|q| q.query_type()).unwrap_or(RecordType::A);
    packed::pack(&qname, qtype, &[], &[], &[], aa, rcode)
        .map(|mut bytes| {
            packed::rewrite_header(&mut bytes, message.id(), message.recursion_desired());
            bytes
        })
        .unwrap_or_default()
}

/// The full dispatch pipeline described in spec.md §4.J. Returns `None`
/// only when nothing can or should be sent back (malformed datagram, or a
/// packer failure — spec.md §7 `PackFailure`: "logged; no response
/// emitted").
pub async fn handle_query(state: &GlobalState, raw: &[u8], client: SocketAddr) -> Option<Vec<u8>> {
    let message = match Message::from_bytes(raw) {
        Ok(m) => m,
        Err(err) => {
            log::debug!("dropping unparseable datagram from {client}: {err}");
            return None;
        }
    };

    if message.op_code() != OpCode::Query {
        log::debug!("refusing non-Query opcode from {client}: {:?}", message.op_code());
        return Some(servfail(&message));
    }
    if message.message_type() != MessageType::Query {
        return Some(servfail(&message));
    }

    let query = message.queries().first()?;
    let qname_orig = query.name().to_string();
    let qname_lc = qname_orig.to_ascii_lowercase();
    let was_lc = qname_orig == qname_lc;
    let qtype = query.query_type();
    let qtype_str = qtype.to_string().to_ascii_uppercase();

    let snapshot = state.snapshot.load();
    let view = state.view.view_of(&client.to_string(), &snapshot.geo, &snapshot.view_map).await;

    if query.query_class() != DNSClass::IN || matches!(qtype, RecordType::AXFR | RecordType::IXFR) {
        return Some(refused(&message));
    }

    if was_lc {
        if let Some(group) = state.packed.get(&qname_lc, &view, &qtype_str).await {
            let idx = rand::thread_rng().gen_range(0..group.len().max(1));
            let mut bytes = group.get(idx).cloned().unwrap_or_default();
            packed::rewrite_header(&mut bytes, message.id(), message.recursion_desired());
            return Some(bytes);
        }
    }

    let mut result = state
        .frontend
        .resolve(&snapshot.zone, &state.health, &state.tokens, &state.backend, &qname_lc, &view, &qtype_str)
        .await;

    result.answer.shuffle(&mut rand::thread_rng());

    let mut answer = Vec::new();
    for line in &result.answer {
        match state.rr.parse(line).await {
            Ok(record) => answer.push(record),
            Err(err) => log::warn!("skipping unparseable answer line {:?}: {}", line, err),
        }
    }
    let mut authority = Vec::new();
    for line in &result.authority {
        match state.rr.parse(line).await {
            Ok(record) => authority.push(record),
            Err(err) => log::warn!("skipping unparseable authority line {:?}: {}", line, err),
        }
    }
    let mut additional = Vec::new();
    for line in &result.additional {
        match state.rr.parse(line).await {
            Ok(record) => additional.push(record),
            Err(err) => log::warn!("skipping unparseable additional line {:?}: {}", line, err),
        }
    }

    if !was_lc {
        apply_case_preservation(&mut answer, &qname_lc, &qname_orig);
        apply_case_preservation(&mut authority, &qname_lc, &qname_orig);
        apply_case_preservation(&mut additional, &qname_lc, &qname_orig);
    }

    let owner_name = query.name().clone();
    match packed::pack(&owner_name, qtype, &answer, &authority, &additional, result.aa, result.rcode) {
        Ok(mut bytes) => {
            if was_lc {
                if let Ok(group) = packed::build_rotation_group(&owner_name, qtype, &answer, &authority, &additional, result.aa, result.rcode) {
                    state.packed.insert(&qname_lc, &view, &qtype_str, group).await;
                }
            }
            packed::rewrite_header(&mut bytes, message.id(), message.recursion_desired());
            Some(bytes)
        }
        Err(err) => {
            log::error!("failed to pack response for {:?}: {}", qname_orig, err);
            None
        }
    }
}

/// The 0x20 hack (spec.md §4.J step 9): every record owner ending with
/// `qname_lc` has that suffix swapped for the client's original mixed-case
/// spelling, preserving their case entropy.
fn apply_case_preservation(records: &mut [Record], qname_lc: &str, qname_orig: &str) {
    for record in records.iter_mut() {
        let owner_lc = record.name().to_string().to_ascii_lowercase();
        if let Some(prefix_len) = owner_lc.len().checked_sub(qname_lc.len()) {
            if owner_lc.ends_with(qname_lc) {
                let rewritten = format!("{}{}", &owner_lc[..prefix_len], qname_orig);
                if let Ok(name) = Name::from_str(&rewritten) {
                    record.set_name(name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_preservation_rewrites_matching_suffix() {
        use hickory_server::proto::rr::{rdata::A, RData};
        let name = Name::from_str("a.example.com.").unwrap();
        let mut records = vec![Record::from_rdata(name, 300, RData::A(A([192, 0, 2, 1].into())))];
        apply_case_preservation(&mut records, "a.example.com.", "A.Example.Com.");
        assert_eq!(records[0].name().to_string(), "A.Example.Com.");
    }

    #[test]
    fn case_preservation_skips_unrelated_owner() {
        use hickory_server::proto::rr::{rdata::NS, RData};
        let name = Name::from_str("example.com.").unwrap();
        let mut records = vec![Record::from_rdata(name.clone(), 300, RData::NS(NS(name)))];
        apply_case_preservation(&mut records, "a.example.com.", "A.Example.Com.");
        assert_eq!(records[0].name().to_string(), "example.com.");
    }
}
