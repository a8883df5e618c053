pub mod imports;

use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use tree_sitter::{Language, ParseOptions, Parser};

use imports::{RawImportRef, extract_imports};

// One Parser instance per rayon worker thread — avoids lock contention on the shared
// grammar and avoids reallocating a parser per file.
thread_local! {
    static PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&python_language()).expect("python grammar must load");
        p
    });
}

pub fn python_language() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

/// The result of parsing a single source file: its raw import references and a hash
/// of its contents, used for cache-staleness checks by the serializer.
pub struct ParseResult {
    pub refs: Vec<RawImportRef>,
    pub content_hash: u64,
}

fn content_hash(source: &[u8]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

/// Parse a single file, allocating a fresh `Parser`. Suitable for one-off calls;
/// bulk parsing should use [`parse_file_parallel`] instead.
///
/// Returns `None` if tree-sitter fails to produce a tree at all (a parse timeout, or a
/// truncated/binary file that confuses the lexer) — callers should record a
/// [`crate::error::Diagnostic::parse`] and register the file as an empty node rather
/// than treat this as fatal.
pub fn parse_file(source: &[u8], timeout_ms: Option<u64>) -> Option<ParseResult> {
    let mut parser = Parser::new();
    parser.set_language(&python_language()).expect("python grammar must load");
    parse_with(&mut parser, source, timeout_ms)
}

/// Parse a file using the calling thread's thread-local `Parser` (for use inside a
/// `rayon` parallel map over discovered files).
pub fn parse_file_parallel(source: &[u8], timeout_ms: Option<u64>) -> Option<ParseResult> {
    PARSER.with(|cell| parse_with(&mut cell.borrow_mut(), source, timeout_ms))
}

fn parse_with(parser: &mut Parser, source: &[u8], timeout_ms: Option<u64>) -> Option<ParseResult> {
    let tree = match timeout_ms {
        Some(ms) => {
            let deadline = Instant::now() + Duration::from_millis(ms);
            let mut on_progress = |_state: &_| {
                if Instant::now() >= deadline {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            };
            let options = ParseOptions::new().progress_callback(&mut on_progress);
            parser.parse_with_options(&mut |i, _| source.get(i..).unwrap_or_default(), None, Some(options))
        }
        None => parser.parse(source, None),
    }?;
    let refs = extract_imports(&tree, source);
    Some(ParseResult {
        refs,
        content_hash: content_hash(source),
    })
}
