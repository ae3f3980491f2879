use docsis_core::{BitBuffer, Direction};
use docsis_pdus::data::pdu_header::DataPdu;
use docsis_pdus::mac::enums::mac_header_type::MacHeaderType;
use docsis_pdus::mac::pdus::concatenation::decode_concatenated;
use docsis_pdus::mac::pdus::mac_header::MacHeader;
use docsis_pdus::mgmt::pdus::map_msg::MapMessage;
use docsis_pdus::mgmt::pdus::mgmt_header::{MGMT_HEADER_LEN, MgmtHeader};

/// MAC frame parser for standalone PDU debugging
pub struct MacParser;

impl MacParser {
    /// Parse one MAC frame and print the result.
    /// Follows the receive paths of the modem (downstream) and head-end (upstream).
    pub fn parse(frame: &[u8], direction: Direction) {
        println!("=== MAC {} Parser ===", direction);
        println!("Input bytes: {}", BitBuffer::from_bytes(frame).dump_hex());
        println!();
        Self::parse_frame(frame, direction, 0);
    }

    fn parse_frame(frame: &[u8], direction: Direction, depth: usize) {
        let indent = "  ".repeat(depth);
        let (hdr, rest, used) = match MacHeader::decode(frame, direction) {
            Ok(v) => v,
            Err(e) => {
                println!("{}[!] Undecodable MAC header: {:?}", indent, e);
                return;
            }
        };
        println!("{}MAC header ({} bytes): {}", indent, used, hdr);
        for eh in hdr.ext_headers.iter() {
            println!("{}  EHDR {}", indent, eh);
        }
        if hdr.is_request() {
            return;
        }
        let Some(payload) = rest.get(..hdr.payload_len as usize) else {
            println!("{}[!] Payload truncated: header says {} bytes, {} left", indent, hdr.payload_len, rest.len());
            return;
        };
        if rest.len() > payload.len() {
            println!("{}[!] {} trailing bytes after frame", indent, rest.len() - payload.len());
        }

        if hdr.fc_type.is_data() {
            Self::parse_data(payload, &indent);
            return;
        }
        match hdr.mac_type {
            Some(MacHeaderType::Management) => Self::parse_management(payload, &indent),
            Some(MacHeaderType::Concatenation) => {
                let count = hdr.frame_count.unwrap_or(0);
                match decode_concatenated(payload, count, direction) {
                    Ok(frames) => {
                        println!("{}Concatenation of {} frames", indent, frames.len());
                        for (h, p) in frames {
                            let bytes = h.encode(&p);
                            Self::parse_frame(&bytes, direction, depth + 1);
                        }
                    }
                    Err(e) => println!("{}[!] Bad concatenation: {:?}", indent, e),
                }
            }
            other => println!("{}Payload of {:?}: {} bytes", indent, other, payload.len()),
        }
    }

    fn parse_data(payload: &[u8], indent: &str) {
        match DataPdu::decode(payload) {
            Ok(pdu) => {
                println!("{}Data PDU {} -> {} proto 0x{:04X}, {} bytes", indent, pdu.src, pdu.dst, pdu.protocol, pdu.packet.len());
                println!("{}  {}", indent, BitBuffer::from_bytes(&pdu.packet).dump_hex());
            }
            Err(e) => println!("{}[!] Bad data PDU: {:?}", indent, e),
        }
    }

    fn parse_management(payload: &[u8], indent: &str) {
        let mut buf = BitBuffer::from_bytes(payload);
        let mgmt = match MgmtHeader::from_bitbuf(&mut buf) {
            Ok(m) => m,
            Err(e) => {
                println!("{}[!] Bad management header: {:?}", indent, e);
                return;
            }
        };
        println!("{}{}", indent, mgmt);
        if !mgmt.is_map_packet() {
            return;
        }
        match MapMessage::decode(&payload[MGMT_HEADER_LEN..]) {
            Ok(map) => {
                println!("{}{}", indent, map);
                for i in 0..map.elements.len() {
                    if let Some((offset, len)) = map.slot_of(i) {
                        let ie = &map.elements[i];
                        println!("{}  sid {:>4} {:<24} minislots {}..{}", indent, ie.sid, ie.ie_type.to_string(), map.alloc_start_time + offset as u32, map.alloc_start_time + (offset + len) as u32);
                    }
                }
            }
            Err(e) => println!("{}[!] Bad MAP: {:?}", indent, e),
        }
    }
}
