pub mod circadian;
pub mod hrv;
