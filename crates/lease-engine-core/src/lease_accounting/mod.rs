pub mod amortization;
pub mod calculate;
pub mod classification;
pub mod contract;
pub mod escalation;
pub mod journal;
pub mod maturity;
pub mod projection;
pub mod summary;
