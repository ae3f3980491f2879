pub mod cm_device;
pub mod components;
