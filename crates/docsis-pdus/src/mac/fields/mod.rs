pub mod ext_header;
