mod reader;

pub use reader::{read_all, read_from, read_one, MAX_READ_DEPTH};
