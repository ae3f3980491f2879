pub mod ie_type;
pub mod mmm_type;
