mod mask;
mod readers;
mod sequences;
mod util;

pub use mask::{MaskedIntervals, TruthMask};
pub use readers::open_text_reader;
pub use sequences::SequenceStore;
pub use util::{create_writer, format_number_with_commas, handle_error_and_exit, Result};
