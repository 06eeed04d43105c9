//! File housekeeping around data deliveries: integrity checks, staging into
//! the public tree, packaging, and QC read counts.
pub mod checksums;
pub mod kneaddata;
pub mod stage;
