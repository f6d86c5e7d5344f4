pub mod archive;
pub mod reasoning;
pub mod serve;
