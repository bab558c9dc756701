//! Labeled containers: 1-D series, 2-D frame, 3-D cube, and the squeezed
//! `History` result.

pub mod cube;
pub mod frame;
pub mod history;
pub mod series;

pub use cube::DataCube;
pub use frame::Frame;
pub use history::History;
pub use series::Series;
