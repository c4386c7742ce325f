pub mod convert;
pub mod format_check;
pub mod logging;

pub use format_check::{check_format, DefectCategory, FormatCheckError, FormatErrors};
