pub mod booking;
pub mod customer;
pub mod flight;
pub mod keygen;
pub mod repository;
