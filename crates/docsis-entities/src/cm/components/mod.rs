pub mod upstream_service;
