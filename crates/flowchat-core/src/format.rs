//! Splitting of reply text into plain-text and fenced-code segments.
//!
//! A fence opens with three backticks, an optional language tag and a
//! newline, and closes at the next three backticks. An opening marker that
//! is never closed is left as plain text.

use std::sync::OnceLock;

use regex::Regex;

/// Tag assigned to code blocks with a missing or unknown language
pub const DEFAULT_LANGUAGE: &str = "text";

const FENCE: &str = "```";

/// Language tags the highlighter is expected to understand
const LANGUAGES: &[&str] = &[
    "bash", "c", "clojure", "cpp", "cs", "csharp", "css", "dart", "diff", "dockerfile", "elixir",
    "erlang", "go", "graphql", "haskell", "html", "ini", "java", "javascript", "js", "json", "jsx",
    "kotlin", "lua", "makefile", "markdown", "md", "objc", "perl", "php", "powershell", "py",
    "python", "r", "rb", "rs", "ruby", "rust", "scala", "scss", "sh", "shell", "sql", "swift",
    "text", "toml", "ts", "tsx", "typescript", "xml", "yaml", "yml", "zsh",
];

fn fence_regex() -> &'static Regex {
    static FENCE_RE: OnceLock<Regex> = OnceLock::new();
    FENCE_RE.get_or_init(|| {
        Regex::new(r"(?s)```([^\s`]*)[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
    })
}

/// A fenced code block inside a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock<'a> {
    /// Normalized tag, `DEFAULT_LANGUAGE` when missing or unrecognized
    pub language: &'static str,
    /// Tag exactly as written after the opening marker
    pub declared: Option<&'a str>,
    /// Code between the markers, without the newline before the closing marker
    pub code: &'a str,
    /// The whole fence including both markers
    pub raw: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Code(CodeBlock<'a>),
}

impl<'a> Segment<'a> {
    /// The exact slice of the input this segment covers
    pub fn raw(&self) -> &'a str {
        match self {
            Segment::Text(text) => *text,
            Segment::Code(block) => block.raw,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Segment::Code(_))
    }
}

/// Split `input` into ordered segments whose raw slices concatenate back
/// into `input`.
pub fn split_segments(input: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for caps in fence_regex().captures_iter(input) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(2)) else {
            continue;
        };

        if whole.start() > cursor {
            segments.push(Segment::Text(&input[cursor..whole.start()]));
        }

        let declared = caps
            .get(1)
            .map(|m| m.as_str())
            .filter(|tag| !tag.is_empty());

        segments.push(Segment::Code(CodeBlock {
            language: declared.map(normalize_language).unwrap_or(DEFAULT_LANGUAGE),
            declared,
            code: strip_closing_newline(body.as_str()),
            raw: whole.as_str(),
        }));

        cursor = whole.end();
    }

    if cursor < input.len() || segments.is_empty() {
        segments.push(Segment::Text(&input[cursor..]));
    }

    segments
}

/// Concatenate the raw slices of `segments`
pub fn reconstruct(segments: &[Segment<'_>]) -> String {
    segments.iter().map(Segment::raw).collect()
}

/// Map a fence tag onto the fixed language table
pub fn normalize_language(tag: &str) -> &'static str {
    let tag = tag.trim().to_ascii_lowercase();
    LANGUAGES
        .iter()
        .copied()
        .find(|lang| *lang == tag)
        .unwrap_or(DEFAULT_LANGUAGE)
}

pub fn has_code_block(input: &str) -> bool {
    input.contains(FENCE) && fence_regex().is_match(input)
}

/// Code of the last fenced block in `input`, if any
pub fn last_code_block(input: &str) -> Option<&str> {
    split_segments(input)
        .into_iter()
        .rev()
        .find_map(|segment| match segment {
            Segment::Code(block) => Some(block.code),
            Segment::Text(_) => None,
        })
}

fn strip_closing_newline(body: &str) -> &str {
    body.strip_suffix("\r\n")
        .or_else(|| body.strip_suffix('\n'))
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code<'a>(segment: &'a Segment<'a>) -> &'a CodeBlock<'a> {
        match segment {
            Segment::Code(block) => block,
            Segment::Text(text) => panic!("expected code segment, got text {text:?}"),
        }
    }

    #[test]
    fn test_inline_fence_example() {
        let input = "hello ```js\nconsole.log(1)\n``` world";
        let segments = split_segments(input);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Text("hello "));
        let block = code(&segments[1]);
        assert_eq!(block.language, "js");
        assert_eq!(block.code, "console.log(1)");
        assert_eq!(segments[2], Segment::Text(" world"));
        assert_eq!(reconstruct(&segments), input);
    }

    #[test]
    fn test_plain_text_is_one_segment() {
        let input = "just some words\nacross two lines";
        assert_eq!(split_segments(input), vec![Segment::Text(input)]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(split_segments(""), vec![Segment::Text("")]);
    }

    #[test]
    fn test_python_tag() {
        let segments = split_segments("```python\nprint('hi')\n```");
        assert_eq!(segments.len(), 1);
        let block = code(&segments[0]);
        assert_eq!(block.language, "python");
        assert_eq!(block.declared, Some("python"));
        assert_eq!(block.code, "print('hi')");
    }

    #[test]
    fn test_missing_tag_uses_default() {
        let segments = split_segments("```\nls -la\n```");
        let block = code(&segments[0]);
        assert_eq!(block.language, DEFAULT_LANGUAGE);
        assert_eq!(block.declared, None);
        assert_eq!(block.code, "ls -la");
    }

    #[test]
    fn test_unknown_tag_uses_default() {
        let segments = split_segments("```brainfudge\n+++\n```");
        let block = code(&segments[0]);
        assert_eq!(block.language, DEFAULT_LANGUAGE);
        assert_eq!(block.declared, Some("brainfudge"));
    }

    #[test]
    fn test_tag_is_case_insensitive() {
        assert_eq!(normalize_language("Rust"), "rust");
        assert_eq!(normalize_language("JSON"), "json");
        assert_eq!(normalize_language(""), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_unterminated_fence_stays_text() {
        let input = "before\n```rust\nfn main() {\n";
        let segments = split_segments(input);
        assert_eq!(segments, vec![Segment::Text(input)]);
    }

    #[test]
    fn test_fence_without_newline_stays_text() {
        let input = "use ```inline``` ticks";
        assert_eq!(split_segments(input), vec![Segment::Text(input)]);
    }

    #[test]
    fn test_adjacent_fences_have_no_empty_text_between() {
        let input = "```a\n1\n``````b\n2\n```";
        let segments = split_segments(input);
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(Segment::is_code));
        assert_eq!(reconstruct(&segments), input);
    }

    #[test]
    fn test_empty_code_body() {
        let segments = split_segments("x\n```\n```\ny");
        assert_eq!(segments.len(), 3);
        assert_eq!(code(&segments[1]).code, "");
    }

    #[test]
    fn test_crlf_line_endings() {
        let input = "```sh\r\necho hi\r\n```\r\n";
        let segments = split_segments(input);
        let block = code(&segments[0]);
        assert_eq!(block.language, "sh");
        assert_eq!(block.code, "echo hi");
        assert_eq!(segments[1], Segment::Text("\r\n"));
        assert_eq!(reconstruct(&segments), input);
    }

    #[test]
    fn test_round_trip_on_awkward_inputs() {
        let inputs = [
            "",
            "`",
            "``",
            "```",
            "``````",
            "````\n````",
            "```\n",
            "text ```rust\nlet x = 1;\n``` more ```\nplain\n``` end",
            "unicode ✓ ```py\nprint('é')\n``` ünïcode",
            "```js   \nspaces after tag\n```",
            "trailing fence ```",
            "\n\n```\n\n\n```\n\n",
        ];
        for input in inputs {
            let segments = split_segments(input);
            assert_eq!(reconstruct(&segments), input, "round trip failed for {input:?}");
            assert!(!segments.is_empty());
        }
    }

    /// xorshift64; deterministic so a failure names a reproducible input
    struct Pieces(u64);

    impl Pieces {
        const ALPHABET: [&'static str; 14] = [
            "```", "`", "``", "\n", "\r\n", "\r", "rust", "js", "PY", " ", "\t", "é", "✓", "日本",
        ];

        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn string(&mut self) -> String {
            let len = (self.next() % 24) as usize;
            (0..len)
                .map(|_| Self::ALPHABET[(self.next() % Self::ALPHABET.len() as u64) as usize])
                .collect()
        }
    }

    #[test]
    fn test_round_trip_on_generated_inputs() {
        let mut pieces = Pieces(0x5eed_f10c_4a7b_1e55);
        for _ in 0..5_000 {
            let input = pieces.string();
            let segments = split_segments(&input);
            assert_eq!(reconstruct(&segments), input, "round trip failed for {input:?}");
            assert!(!segments.is_empty(), "no segments for {input:?}");
            if !input.is_empty() {
                assert!(
                    segments.iter().all(|s| !s.raw().is_empty()),
                    "empty segment for {input:?}"
                );
            }
            let adjacent_text = segments
                .windows(2)
                .any(|pair| matches!(pair, [Segment::Text(_), Segment::Text(_)]));
            assert!(!adjacent_text, "adjacent text segments for {input:?}");
        }
    }

    #[test]
    fn test_no_empty_text_segments_except_for_empty_input() {
        let segments = split_segments("```rs\nfn a() {}\n```");
        assert!(segments.iter().all(|s| !s.raw().is_empty()));
    }

    #[test]
    fn test_last_code_block() {
        let input = "a ```js\none\n``` b ```py\ntwo\n``` c";
        assert_eq!(last_code_block(input), Some("two"));
        assert_eq!(last_code_block("nothing"), None);
    }

    #[test]
    fn test_has_code_block() {
        assert!(has_code_block("```\nx\n```"));
        assert!(!has_code_block("```x"));
        assert!(!has_code_block("plain"));
    }
}
