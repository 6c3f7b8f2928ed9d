pub mod criteria;
pub mod driver;
pub mod sequence;
pub mod strategy;
pub mod suite;
