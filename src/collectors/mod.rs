pub mod scan;
pub mod smartctl;
