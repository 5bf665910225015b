pub mod http;
pub mod store;
pub mod subsystems;

#[cfg(test)]
pub(crate) mod testing;
