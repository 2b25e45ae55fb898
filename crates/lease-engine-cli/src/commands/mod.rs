pub mod consolidation;
pub mod lease_accounting;
