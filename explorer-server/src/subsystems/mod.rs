pub mod analyze;
pub mod evidence;
pub mod package;
pub mod translate;
