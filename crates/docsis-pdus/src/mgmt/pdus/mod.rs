pub mod map_msg;
pub mod mgmt_header;
