pub mod ext_header_type;
pub mod frame_control_type;
pub mod mac_header_type;
