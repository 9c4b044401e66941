pub mod file_resolver;

pub use file_resolver::{ResolutionOutcome, build_resolver, canonical, resolve_import};
