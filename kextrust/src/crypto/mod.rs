// Crypto module declarations

pub mod random;
pub mod hash;
pub mod keys;
pub mod asymmetric;
pub mod symmetric;
