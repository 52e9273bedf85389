pub mod features;
pub mod product;
pub mod recommendation;
pub mod sales;
pub mod trend;
