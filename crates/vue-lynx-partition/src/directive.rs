//! Per-file layer directives
//!
//! A module may pin itself to a layer with a directive prologue entry
//! (`'use main-thread'`, `'use background'`) or a thread marker comment
//! (`// @lynx-main-thread`, `// @lynx-background-thread`). Only the
//! leading comments and directives are inspected; anything after the
//! first real statement is ignored.

use vue_lynx_thread::Layer;

/// Marker comment for main-thread modules
pub const MAIN_THREAD_MARKER: &str = "// @lynx-main-thread";

/// Marker comment for background modules
pub const BACKGROUND_MARKER: &str = "// @lynx-background-thread";

/// Marker comment for `layer`
pub fn thread_marker(layer: Layer) -> &'static str {
    match layer {
        Layer::MainThread => MAIN_THREAD_MARKER,
        Layer::Background => BACKGROUND_MARKER,
    }
}

/// Find an explicit layer directive at the top of `source`
///
/// When several directives are present the first one wins.
pub fn detect_directive(source: &str) -> Option<Layer> {
    scan_prologue(source).directive
}

/// Byte offset just past the leading comments and directives of `source`
///
/// Code inserted at this offset keeps the module's own directive prologue
/// (`'use strict'`, layer directives, shebang) in front of it.
pub fn prologue_end(source: &str) -> usize {
    scan_prologue(source).end
}

struct Prologue {
    directive: Option<Layer>,
    end: usize,
}

fn scan_prologue(source: &str) -> Prologue {
    let offset = |rest: &str| source.len() - rest.len();
    let mut directive = None;
    let mut rest = source.strip_prefix('\u{feff}').unwrap_or(source);
    if rest.starts_with("#!") {
        rest = rest.split_once('\n').map_or("", |(_, tail)| tail);
    }

    loop {
        let end = offset(rest);
        let item = rest.trim_start();
        if let Some(after) = item.strip_prefix("//") {
            let (comment, tail) = after.split_once('\n').unwrap_or((after, ""));
            if directive.is_none() {
                directive = marker_layer(comment.trim());
            }
            rest = tail;
        } else if let Some(after) = item.strip_prefix("/*") {
            match after.find("*/") {
                Some(close) => rest = &after[close + 2..],
                None => return Prologue { directive, end },
            }
        } else if let Some((literal, tail)) = string_statement(item) {
            if directive.is_none() {
                directive = directive_layer(literal);
            }
            rest = tail;
        } else {
            return Prologue { directive, end };
        }
    }
}

fn marker_layer(comment: &str) -> Option<Layer> {
    match comment {
        "@lynx-main-thread" => Some(Layer::MainThread),
        "@lynx-background-thread" => Some(Layer::Background),
        _ => None,
    }
}

fn directive_layer(literal: &str) -> Option<Layer> {
    match literal {
        "use main-thread" => Some(Layer::MainThread),
        "use background" => Some(Layer::Background),
        _ => None,
    }
}

/// Split a leading `'literal';` statement off `input`
fn string_statement(input: &str) -> Option<(&str, &str)> {
    let quote = input.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &input[1..];
    let end = body.find(|c: char| c == quote || c == '\n')?;
    if !body[end..].starts_with(quote) {
        return None;
    }
    let literal = &body[..end];
    let tail = body[end + 1..].trim_start_matches([' ', '\t']);
    let tail = tail.strip_prefix(';').unwrap_or(tail);
    Some((literal, tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_prologue() {
        assert_eq!(
            detect_directive("'use background';\nexport const x = 1;"),
            Some(Layer::Background)
        );
        assert_eq!(
            detect_directive("\"use main-thread\"\nimport a from 'a';"),
            Some(Layer::MainThread)
        );
    }

    #[test]
    fn test_marker_comments() {
        assert_eq!(
            detect_directive("// @lynx-background-thread\nexport default {}"),
            Some(Layer::Background)
        );
        assert_eq!(
            detect_directive("/* generated */\n// plain comment\n// @lynx-main-thread\n"),
            Some(Layer::MainThread)
        );
    }

    #[test]
    fn test_other_directives_are_skipped() {
        assert_eq!(
            detect_directive("'use strict';\n'use background';\nfoo();"),
            Some(Layer::Background)
        );
        assert_eq!(
            detect_directive("#!/usr/bin/env node\n'use background'\n"),
            Some(Layer::Background)
        );
    }

    #[test]
    fn test_directives_after_code_are_ignored() {
        assert_eq!(detect_directive("import a from 'a';\n'use background';"), None);
        assert_eq!(detect_directive("const s = '// @lynx-main-thread';"), None);
        assert_eq!(detect_directive(""), None);
        assert_eq!(detect_directive("/* unterminated"), None);
    }

    #[test]
    fn test_prologue_end() {
        let source = "#!/usr/bin/env node\n'use strict';\n// @lynx-background-thread\nfoo();\n";
        assert_eq!(&source[prologue_end(source)..], "foo();\n");
        assert_eq!(prologue_end("foo();"), 0);
        assert_eq!(prologue_end(""), 0);
        assert_eq!(prologue_end("'use strict'"), "'use strict'".len());
        assert_eq!(prologue_end("/* open\nfoo();"), 0);
    }

    #[test]
    fn test_first_directive_wins() {
        assert_eq!(
            detect_directive("// @lynx-main-thread\n'use background';"),
            Some(Layer::MainThread)
        );
    }
}
