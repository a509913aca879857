use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapError>;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("LUT size {size} is out of range ({min}..={max})")]
    InvalidLutSize { size: usize, min: usize, max: usize },

    #[error("cut count {count} is out of range (2..={max})")]
    InvalidCutCount { count: usize, max: usize },

    #[error("at least one delay or area-flow round is required")]
    NoRounds,

    #[error("timing manager expects {expected_cis} CIs and {expected_cos} COs, network has {cis} and {cos}")]
    InvalidTimingManager {
        expected_cis: usize,
        expected_cos: usize,
        cis: usize,
        cos: usize,
    },

    #[error("net {0} is used before it is driven (combinational loop?)")]
    DanglingNet(String),

    #[error("mapping check failed: {0}")]
    MappingCheck(String),
}
