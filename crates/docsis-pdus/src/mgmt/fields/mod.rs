pub mod info_element;
