//! Per-line tokenizer for rule programs.
//!
//! A line is scanned with the state left by the line above it. Outside a
//! region the scanner reads up to two `spaces word` pairs; one of the region
//! keywords (`fact`, `idea`, `legal`) opens that region. Inside a region only
//! the leading spaces are consumed, and a line that is blank past them closes
//! the region again.

/// The kind of block a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Fact,
    Idea,
    Legal,
}

impl Region {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "fact" => Some(Self::Fact),
            "idea" => Some(Self::Idea),
            "legal" => Some(Self::Legal),
            _ => None,
        }
    }

    fn begin_kind(self) -> TokenKind {
        match self {
            Self::Fact => TokenKind::BeginFact,
            Self::Idea => TokenKind::BeginIdea,
            Self::Legal => TokenKind::BeginLegal,
        }
    }
}

/// Tokenizer state carried from one line to the next.
///
/// Only `region` takes part in equality; `line` is a running counter kept for
/// display and would otherwise defeat the ripple early stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexState {
    pub region: Option<Region>,
    pub line: usize,
}

impl PartialEq for LexState {
    fn eq(&self, other: &Self) -> bool {
        self.region == other.region
    }
}

impl Eq for LexState {}

impl LexState {
    pub fn in_fact(&self) -> bool {
        self.region == Some(Region::Fact)
    }

    pub fn in_idea(&self) -> bool {
        self.region == Some(Region::Idea)
    }

    pub fn in_legal(&self) -> bool {
        self.region == Some(Region::Legal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    BeginFact,
    BeginIdea,
    BeginLegal,
    Path,
    /// Zero-width marker at the end of a line that closes a region.
    Newline,
}

impl TokenKind {
    pub fn is_begin(self) -> bool {
        matches!(self, Self::BeginFact | Self::BeginIdea | Self::BeginLegal)
    }
}

/// A classified span `[begin_char, end_char)` of a line (byte offsets).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub begin_char: usize,
    pub end_char: usize,
    pub value: String,
}

/// Tokens of one line. Equality ignores `line_number`.
#[derive(Debug, Clone, Default)]
pub struct LineMetadata {
    pub line_number: usize,
    pub tokens: Vec<Token>,
}

impl PartialEq for LineMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens
    }
}

impl Eq for LineMetadata {}

// ── Scanner ──────────────────────────────────────────────────────────

/// Number of `spaces word` rounds read outside a region.
const WORD_ROUNDS: usize = 2;

fn is_space(b: u8) -> bool {
    b == b' '
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn take_while(&mut self, kind: TokenKind, pred: fn(u8) -> bool) -> Option<Token> {
        let begin = self.pos;
        while self.peek().is_some_and(pred) {
            self.advance();
        }
        (self.pos > begin).then(|| Token {
            kind,
            begin_char: begin,
            end_char: self.pos,
            value: self.text[begin..self.pos].to_string(),
        })
    }

    fn scan_spaces(&mut self) -> Option<Token> {
        self.take_while(TokenKind::Whitespace, is_space)
    }

    fn scan_word(&mut self) -> Option<Token> {
        let mut token = self.take_while(TokenKind::Path, is_word)?;
        if let Some(region) = Region::from_keyword(&token.value) {
            token.kind = region.begin_kind();
        }
        Some(token)
    }

    fn newline(&self) -> Token {
        Token {
            kind: TokenKind::Newline,
            begin_char: self.pos,
            end_char: self.pos,
            value: String::new(),
        }
    }
}

/// Tokenize one line given the state the previous line ended in.
/// Returns the state this line ends in and the line's tokens.
pub fn scan_line(text: &str, incoming: LexState) -> (LexState, LineMetadata) {
    let mut state = LexState {
        region: incoming.region,
        line: incoming.line + 1,
    };
    let mut tokens = Vec::new();
    let mut scanner = Scanner::new(text);

    if state.region.is_some() {
        tokens.extend(scanner.scan_spaces());
        if scanner.at_end() {
            tokens.push(scanner.newline());
            state.region = None;
        }
    } else {
        for _ in 0..WORD_ROUNDS {
            tokens.extend(scanner.scan_spaces());
            if let Some(word) = scanner.scan_word() {
                if let Some(region) = Region::from_keyword(&word.value) {
                    state.region = Some(region);
                }
                tokens.push(word);
            }
        }
    }

    let meta = LineMetadata {
        line_number: state.line,
        tokens,
    };
    (state, meta)
}
