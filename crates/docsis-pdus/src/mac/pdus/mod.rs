pub mod concatenation;
pub mod mac_header;
