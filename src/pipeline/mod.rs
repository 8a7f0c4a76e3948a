mod dispatch;
mod document;
mod dump;
mod orchestrator;
mod translate;

pub use dispatch::{effective_kind, sniff_family, Content, Family, FileKind};
pub use document::LoadedDocument;
pub use dump::{units_digest, UnitEntry, UnitsJson};
pub use orchestrator::Orchestrator;
pub use translate::{BatchTranslator, GlossaryTranslator, IdentityTranslator, Translator};
