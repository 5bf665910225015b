pub mod category_map;
pub mod package;
pub mod trace;
pub mod translation;

pub use category_map::CategoryMap;
pub use package::{
    Capabilities, PackageFailure, PackageOutcome, PresentationAngle, PresentationPackage, Region,
    RegionalContext, WriConnection,
};
pub use trace::{Message, Role, Trace};
pub use translation::{MessageTranslation, TranslationBundle};
