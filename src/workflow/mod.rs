pub mod review_flow;

pub use review_flow::ReviewFlow;
