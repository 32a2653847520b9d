pub mod credentials;
pub(crate) mod extractors;
pub mod gate;
pub mod password;
