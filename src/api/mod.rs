pub mod booking;
pub mod doctor;
pub mod service;
pub mod token;
pub mod user;
