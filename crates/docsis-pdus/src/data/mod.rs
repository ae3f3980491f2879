pub mod llc_snap;
pub mod pdu_header;
