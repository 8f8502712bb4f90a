pub mod cleanup;
pub mod dto;
pub mod layout;
pub mod ports;
pub mod services;
