pub mod ask;
pub mod backfill;
pub mod bootstrap;
pub mod doctor;
pub mod serve;
