pub mod aig;
pub mod area;
pub mod cost;
pub mod cut;
pub mod cutset;
pub mod error;
pub mod extract;
pub mod import;
pub mod mapper;
pub mod required;
pub mod store;
pub mod switching;
pub mod timing;
pub mod truth;
pub mod tt_store;

pub use error::{MapError, Result};
pub use extract::{LutMapping, MappedNetwork};
pub use mapper::{perform_mapping, MapperParams};
