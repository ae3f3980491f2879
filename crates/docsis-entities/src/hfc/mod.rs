pub mod channel_state;
pub mod hfc_medium;
