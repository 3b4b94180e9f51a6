pub mod account;
pub mod execution;
pub mod identity;
pub mod instrument;
pub mod request;
pub mod result;
