pub mod results;
pub mod runs;
pub mod scripts;
