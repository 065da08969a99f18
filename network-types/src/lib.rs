#![no_std]

pub mod eth;
pub mod http;
pub mod ip;
pub mod tcp;
pub mod tls;
pub mod udp;
