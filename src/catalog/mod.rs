pub mod halo;
pub mod index;
pub mod stats;
pub mod schema;
pub mod demo;
