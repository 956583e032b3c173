pub mod encoder;
pub mod model;
pub mod repository;
pub mod service;

#[cfg(test)]
pub mod testing;
