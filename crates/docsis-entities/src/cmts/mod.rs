pub mod cmts_device;
pub mod components;
