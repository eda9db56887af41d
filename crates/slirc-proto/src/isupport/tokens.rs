//! Structured views of the `PREFIX` and `CHANMODES` tokens.

/// Parsed `PREFIX` token: membership modes and their display symbols.
///
/// Entries are ordered from highest rank to lowest, as advertised.
///
/// # Example
///
/// ```
/// use slirc_proto::isupport::PrefixSpec;
///
/// let spec = PrefixSpec::parse("(qaohv)~&@%+").unwrap();
/// assert_eq!(spec.mode_for_prefix('@'), Some('o'));
/// assert_eq!(spec.prefix_for_mode('v'), Some('+'));
/// assert_eq!(spec.split_nick("@+alice"), (vec!['o', 'v'], "alice"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrefixSpec {
    modes: Vec<char>,
    symbols: Vec<char>,
}

impl Default for PrefixSpec {
    /// `(ov)@+`, assumed until the server says otherwise.
    fn default() -> Self {
        Self {
            modes: vec!['o', 'v'],
            symbols: vec!['@', '+'],
        }
    }
}

impl PrefixSpec {
    /// Parse a `PREFIX` value like `(ov)@+`.
    ///
    /// Returns `None` for malformed values or mismatched lengths. An empty
    /// value (`PREFIX=`) is valid and means no membership prefixes.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return Some(Self {
                modes: Vec::new(),
                symbols: Vec::new(),
            });
        }
        let rest = s.strip_prefix('(')?;
        let (modes, symbols) = rest.split_once(')')?;
        let modes: Vec<char> = modes.chars().collect();
        let symbols: Vec<char> = symbols.chars().collect();
        if modes.len() != symbols.len() {
            return None;
        }
        Some(Self { modes, symbols })
    }

    /// True if `mode` is a membership (prefix) mode.
    #[inline]
    pub fn is_prefix_mode(&self, mode: char) -> bool {
        self.modes.contains(&mode)
    }

    /// True if `symbol` is a membership prefix symbol.
    #[inline]
    pub fn is_prefix_symbol(&self, symbol: char) -> bool {
        self.symbols.contains(&symbol)
    }

    /// The symbol shown for a mode (`o` → `@`).
    pub fn prefix_for_mode(&self, mode: char) -> Option<char> {
        let i = self.modes.iter().position(|&m| m == mode)?;
        self.symbols.get(i).copied()
    }

    /// The mode behind a symbol (`@` → `o`).
    pub fn mode_for_prefix(&self, symbol: char) -> Option<char> {
        let i = self.symbols.iter().position(|&s| s == symbol)?;
        self.modes.get(i).copied()
    }

    /// Rank of a membership mode; 0 is the highest.
    pub fn rank(&self, mode: char) -> Option<usize> {
        self.modes.iter().position(|&m| m == mode)
    }

    /// Split a NAMES entry into its membership modes and the bare nick.
    ///
    /// Every leading symbol is stripped, so `multi-prefix` replies work.
    pub fn split_nick<'n>(&self, entry: &'n str) -> (Vec<char>, &'n str) {
        let mut modes = Vec::new();
        let mut rest = entry;
        while let Some(c) = rest.chars().next() {
            match self.mode_for_prefix(c) {
                Some(mode) => {
                    modes.push(mode);
                    rest = &rest[c.len_utf8()..];
                }
                None => break,
            }
        }
        (modes, rest)
    }

    /// Membership modes, highest rank first.
    pub fn modes(&self) -> &[char] {
        &self.modes
    }
}

/// How a channel mode consumes arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChanModeKind {
    /// Type A: list modes (`b`). Always take an argument; the list is not a single value.
    List,
    /// Type B: always take an argument (`k`).
    Always,
    /// Type C: take an argument only when set (`l`).
    OnSet,
    /// Type D: plain flags (`n`).
    Flag,
}

/// Parsed `CHANMODES` token (`A,B,C,D`).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChanModes {
    /// Type A: list modes.
    pub a: String,
    /// Type B: always parameterized.
    pub b: String,
    /// Type C: parameterized when set.
    pub c: String,
    /// Type D: flags.
    pub d: String,
}

impl Default for ChanModes {
    /// `beI,k,l,imnpst`, the common baseline.
    fn default() -> Self {
        Self {
            a: "beI".into(),
            b: "k".into(),
            c: "l".into(),
            d: "imnpst".into(),
        }
    }
}

impl ChanModes {
    /// Parse a `CHANMODES` value like `b,k,l,imnpst`.
    ///
    /// Servers may append further groups; those are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(',');
        Some(ChanModes {
            a: parts.next()?.to_owned(),
            b: parts.next()?.to_owned(),
            c: parts.next()?.to_owned(),
            d: parts.next()?.to_owned(),
        })
    }

    /// Classify a mode character; `None` if the server did not list it.
    pub fn kind(&self, mode: char) -> Option<ChanModeKind> {
        if self.a.contains(mode) {
            Some(ChanModeKind::List)
        } else if self.b.contains(mode) {
            Some(ChanModeKind::Always)
        } else if self.c.contains(mode) {
            Some(ChanModeKind::OnSet)
        } else if self.d.contains(mode) {
            Some(ChanModeKind::Flag)
        } else {
            None
        }
    }
}
