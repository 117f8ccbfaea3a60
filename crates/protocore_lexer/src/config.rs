//! Lexer configuration: what to do with each keyword, and the escape /
//! affix switches that tune identifier, number, and string lexing.

use rustc_hash::FxHashMap;

/// What the lexer does when it finds a configured keyword at the cursor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeywordAction {
    /// Swallow the keyword without emitting a token (used for punctuation
    /// that a caller never wants to see, if any).
    Discard,
    /// Emit the keyword as an ordinary identifier/punctuation token.
    Keep,
    /// The keyword opens or closes a bracket; tracked on the bracket
    /// fusion stack. `is_open` distinguishes which side of the pair this
    /// spelling is.
    Bracket { is_open: bool },
    /// The keyword starts a line comment: consume through the next `\n`
    /// or EOF.
    LineComment,
    /// The keyword starts a block comment that ends at `close`. Block
    /// comments do not nest; a reopen found inside one is diagnosed.
    BlockComment { close: &'static str },
}

/// The kind of text being offered to [`LexerConfig::is_affix`]: a
/// potential string prefix (`r"..."`-style), or a numeric suffix (`1u32`
/// style).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AffixKind {
    StringPrefix,
    NumberSuffix,
}

/// The full configuration surface the lexer consults at every cursor
/// position: per-keyword actions plus the handful of dialect flags
/// below.
pub struct LexerConfig {
    keywords: FxHashMap<String, KeywordAction>,
    is_affix: Box<dyn Fn(&str, AffixKind) -> bool + Send + Sync>,

    pub number_can_start_with_dot: bool,
    pub old_style_octal: bool,
    pub require_ascii_ident: bool,

    pub escape_extended: bool,
    pub escape_ask: bool,
    pub escape_octal: bool,
    pub escape_partial_x: bool,
    pub escape_uppercase_x: bool,
    pub escape_old_style_unicode: bool,
}

impl LexerConfig {
    pub fn new() -> Self {
        LexerConfig {
            keywords: FxHashMap::default(),
            is_affix: Box::new(|_, _| false),
            number_can_start_with_dot: true,
            old_style_octal: true,
            require_ascii_ident: false,
            escape_extended: true,
            escape_ask: true,
            escape_octal: true,
            escape_partial_x: true,
            escape_uppercase_x: true,
            escape_old_style_unicode: false,
        }
    }

    pub fn set_keyword(&mut self, keyword: impl Into<String>, action: KeywordAction) {
        self.keywords.insert(keyword.into(), action);
    }

    pub fn on_keyword(&self, kw: &str) -> Option<&KeywordAction> {
        self.keywords.get(kw)
    }

    /// The longest configured keyword that is a prefix of `text`, if any.
    /// Protobuf's keyword set is small and fixed, so a linear scan over
    /// configured entries (there are at most a few dozen) is simpler and
    /// fast enough; a trie would only pay off for a much larger keyword
    /// table.
    pub fn longest_keyword_prefix<'a>(&self, text: &'a str) -> Option<(&'a str, &KeywordAction)> {
        self.keywords
            .keys()
            .filter(|kw| text.starts_with(kw.as_str()))
            .max_by_key(|kw| kw.len())
            .map(|kw| (&text[..kw.len()], self.keywords.get(kw.as_str()).unwrap()))
    }

    pub fn set_is_affix(&mut self, f: impl Fn(&str, AffixKind) -> bool + Send + Sync + 'static) {
        self.is_affix = Box::new(f);
    }

    pub fn is_affix(&self, text: &str, kind: AffixKind) -> bool {
        (self.is_affix)(text, kind)
    }

    /// The configuration Protobuf's own grammar needs: brackets for
    /// `(){}[]<>`, `//` and `/* */` comments, and no string/number
    /// affixes (Protobuf has no raw-string or suffixed-literal syntax).
    pub fn protobuf() -> Self {
        let mut config = LexerConfig::new();
        config.set_keyword("(", KeywordAction::Bracket { is_open: true });
        config.set_keyword(")", KeywordAction::Bracket { is_open: false });
        config.set_keyword("{", KeywordAction::Bracket { is_open: true });
        config.set_keyword("}", KeywordAction::Bracket { is_open: false });
        config.set_keyword("[", KeywordAction::Bracket { is_open: true });
        config.set_keyword("]", KeywordAction::Bracket { is_open: false });
        config.set_keyword("<", KeywordAction::Bracket { is_open: true });
        config.set_keyword(">", KeywordAction::Bracket { is_open: false });
        config.set_keyword("//", KeywordAction::LineComment);
        config.set_keyword("/*", KeywordAction::BlockComment { close: "*/" });
        for punct in [";", ",", "=", ".", ":", "-", "+"] {
            config.set_keyword(punct, KeywordAction::Keep);
        }
        config
    }
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protobuf_config_recognizes_brackets_and_comments() {
        let config = LexerConfig::protobuf();
        assert_eq!(config.on_keyword("{"), Some(&KeywordAction::Bracket { is_open: true }));
        assert_eq!(config.on_keyword("}"), Some(&KeywordAction::Bracket { is_open: false }));
        assert_eq!(config.on_keyword("//"), Some(&KeywordAction::LineComment));
        assert_eq!(config.on_keyword("/*"), Some(&KeywordAction::BlockComment { close: "*/" }));
    }

    #[test]
    fn longest_keyword_prefix_prefers_longer_match() {
        let mut config = LexerConfig::new();
        config.set_keyword("/", KeywordAction::Keep);
        config.set_keyword("//", KeywordAction::LineComment);
        let (matched, action) = config.longest_keyword_prefix("//rest").unwrap();
        assert_eq!(matched, "//");
        assert_eq!(*action, KeywordAction::LineComment);
    }

    #[test]
    fn is_affix_defaults_to_rejecting_everything() {
        let config = LexerConfig::new();
        assert!(!config.is_affix("r", AffixKind::StringPrefix));
    }

    #[test]
    fn is_affix_can_be_customized() {
        let mut config = LexerConfig::new();
        config.set_is_affix(|text, kind| kind == AffixKind::NumberSuffix && text == "u32");
        assert!(config.is_affix("u32", AffixKind::NumberSuffix));
        assert!(!config.is_affix("u64", AffixKind::NumberSuffix));
    }
}
