pub mod exam_flow;
pub mod guess;
pub mod ledger;
pub mod sweeper;
