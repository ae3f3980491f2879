pub mod traffic_user;
