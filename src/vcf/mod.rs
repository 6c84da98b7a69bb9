mod reader;
mod record;
mod writer;

pub use reader::VcfReader;
pub use record::{FormatFields, VariantRecord};
pub use writer::VcfWriter;
