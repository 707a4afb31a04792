mod parser;

pub use parser::{DEFAULT_IMPORT_SCALE, ScanError, import_graph};
