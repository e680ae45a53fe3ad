// Translator: turns template rules into per-group templates and renders
// source records into sink event payloads with them.

pub mod compiler;
pub mod render;

pub use compiler::{compile_for_group, CompiledTemplate, FieldManifest, Selector, TemplateSet};
pub use render::{describe, is_tagged, render, TAG_TITLE, TITLE_MAX_CHARS};
