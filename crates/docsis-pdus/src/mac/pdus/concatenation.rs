use docsis_core::{Direction, PduParseErr};

use crate::mac::enums::mac_header_type::MacHeaderType;
use crate::mac::pdus::mac_header::MacHeader;

/// Builds a concatenated frame: a concatenation header followed by each
/// `(header, payload)` pair, encoded back to back.
pub fn build_concatenated(direction: Direction, frames: &[(MacHeader, Vec<u8>)]) -> Vec<u8> {
    let headers: Vec<MacHeader> = frames.iter().map(|(h, _)| h.clone()).collect();
    let concat = MacHeader::concatenation(direction, &headers);
    let mut payload = Vec::with_capacity(concat.payload_len as usize);
    for (h, p) in frames.iter() {
        payload.extend_from_slice(&h.encode(p));
    }
    concat.encode(&payload)
}

/// Splits the payload of a concatenation header into `count` frames.
/// Each entry is the decoded header and its payload bytes.
pub fn decode_concatenated(payload: &[u8], count: u8, direction: Direction) -> Result<Vec<(MacHeader, Vec<u8>)>, PduParseErr> {
    let mut frames = Vec::with_capacity(count as usize);
    let mut pos = 0;
    for _ in 0..count {
        if pos >= payload.len() {
            return Err(PduParseErr::InconsistentLength { expected: count as usize, found: frames.len() });
        }
        let (h, rest, consumed) = MacHeader::decode(&payload[pos..], direction)?;
        if h.mac_type == Some(MacHeaderType::Concatenation) {
            return Err(PduParseErr::Inconsistency { field: "frame", reason: "nested concatenation" });
        }
        let plen = h.payload_len as usize;
        if rest.len() < plen {
            return Err(PduParseErr::BufferEnded { field: Some("concatenated payload") });
        }
        frames.push((h, rest[..plen].to_vec()));
        pos += consumed + plen;
    }
    if pos != payload.len() {
        tracing::debug!("{} trailing bytes after {} concatenated frames", payload.len() - pos, count);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use docsis_core::debug;

    use super::*;
    use crate::mac::fields::ext_header::ExtHeaderElement;

    #[test]
    fn test_split_concatenation() {
        debug::setup_logging_verbose();
        let mut data = MacHeader::data_pdu(Direction::Upstream, 4);
        data.add_ext_header(ExtHeaderElement::Request { minislots: 3, sid: 9 });
        let frames = vec![
            (MacHeader::request(9, 2), vec![]),
            (data, vec![1, 2, 3, 4]),
            (MacHeader::queue_depth_request(9, 700), vec![]),
        ];
        let bytes = build_concatenated(Direction::Upstream, &frames);
        assert_eq!(bytes.len(), 6 + 6 + (6 + 4 + 4) + 7);

        let (h, rest, _) = MacHeader::decode(&bytes, Direction::Upstream).unwrap();
        assert_eq!(h.frame_count, Some(3));
        assert_eq!(rest.len(), h.payload_len as usize);
        let split = decode_concatenated(rest, 3, Direction::Upstream).unwrap();
        assert_eq!(split, frames);
    }

    #[test]
    fn test_count_exceeds_content() {
        let bytes = MacHeader::request(1, 1).encode(&[]);
        assert!(decode_concatenated(&bytes, 2, Direction::Upstream).is_err());
    }
}
