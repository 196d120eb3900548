/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Markets, modes and the open parameter mapping
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

pub mod enums;
pub mod market;
pub mod params;

pub use enums::*;
pub use market::Market;
pub use params::Params;
