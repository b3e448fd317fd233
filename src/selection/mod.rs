pub mod controller;
pub mod connections;
pub mod picking;
