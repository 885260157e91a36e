//! Debug symbol data attached to a section.
//!
//! Symbols are kept per method, keyed by the method's token. Because the key is the token,
//! a method that is renamed in place keeps its source attribution; [`SymbolTable::refresh`]
//! only has to update the recorded names and drop entries of methods that no longer exist.

use std::collections::{BTreeMap, HashMap};

use crate::{config::SymbolFormat, metadata::token::Token};

/// Start line value that marks a hidden sequence point.
pub const HIDDEN_LINE: u32 = 0x00FE_EFEE;

/// Maps an IL offset to a source code location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePoint {
    /// Offset in the method's IL stream
    pub il_offset: u32,
    /// Source document
    pub document: String,
    /// Starting line in the source file
    pub start_line: u32,
    /// Starting column in the source file
    pub start_col: u16,
    /// Ending line in the source file
    pub end_line: u32,
    /// Ending column in the source file
    pub end_col: u16,
}

impl SequencePoint {
    /// True if this point hides its IL range from the debugger.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.start_line == HIDDEN_LINE
    }
}

/// Symbol data of one method.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodSymbols {
    /// Method name the symbols are recorded under
    pub name: String,
    /// Sequence points, ordered by IL offset
    pub points: Vec<SequencePoint>,
}

/// Outcome of [`SymbolTable::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymbolRefresh {
    /// Entries whose recorded method name changed
    pub renamed: usize,
    /// Entries removed because their method no longer exists
    pub dropped: usize,
}

/// Per-section symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    /// Format the symbols were read in
    pub format: SymbolFormat,
    /// Symbols per method
    pub methods: BTreeMap<Token, MethodSymbols>,
}

impl SymbolTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(format: SymbolFormat) -> Self {
        SymbolTable {
            format,
            methods: BTreeMap::new(),
        }
    }

    /// Symbols of the method with the given token.
    #[must_use]
    pub fn get(&self, token: Token) -> Option<&MethodSymbols> {
        self.methods.get(&token)
    }

    /// Records symbols for a method, replacing earlier ones.
    pub fn insert(&mut self, token: Token, symbols: MethodSymbols) {
        self.methods.insert(token, symbols);
    }

    /// Drops the sequence points of a method whose body was replaced.
    ///
    /// The method keeps one hidden point at offset 0 in its first document, so its IL stays
    /// attributed to the source file without pointing at offsets of the old body. Returns
    /// false if the method has no symbols.
    pub fn hide_method(&mut self, token: Token) -> bool {
        let Some(symbols) = self.methods.get_mut(&token) else {
            return false;
        };

        let hidden = symbols.points.first().map(|first| SequencePoint {
            il_offset: 0,
            document: first.document.clone(),
            start_line: HIDDEN_LINE,
            start_col: 0,
            end_line: HIDDEN_LINE,
            end_col: 0,
        });
        symbols.points = hidden.into_iter().collect();
        true
    }

    /// Brings the table in line with the current methods of the section.
    ///
    /// `live` yields the token and current name of every method.
    pub fn refresh<'a, I>(&mut self, live: I) -> SymbolRefresh
    where
        I: IntoIterator<Item = (Token, &'a str)>,
    {
        let live: HashMap<Token, &str> = live.into_iter().collect();
        let mut outcome = SymbolRefresh::default();

        self.methods.retain(|token, symbols| match live.get(token) {
            Some(name) => {
                if symbols.name != *name {
                    log::trace!("Symbols of {} now attributed to '{}'", token, name);
                    symbols.name = (*name).to_string();
                    outcome.renamed += 1;
                }
                true
            }
            None => {
                outcome.dropped += 1;
                false
            }
        });

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(offset: u32, line: u32) -> SequencePoint {
        SequencePoint {
            il_offset: offset,
            document: "MainPage.xaml.cs".to_string(),
            start_line: line,
            start_col: 9,
            end_line: line,
            end_col: 30,
        }
    }

    #[test]
    fn test_refresh_renames_and_drops() {
        let mut table = SymbolTable::new(SymbolFormat::Mdb);
        table.insert(
            Token::new(0x0600_0001),
            MethodSymbols {
                name: "InitializeComponent".to_string(),
                points: vec![point(0, 12)],
            },
        );
        table.insert(
            Token::new(0x0600_0002),
            MethodSymbols {
                name: ".ctor".to_string(),
                points: vec![point(0, 5), point(6, 7)],
            },
        );
        table.insert(
            Token::new(0x0600_0003),
            MethodSymbols {
                name: "Gone".to_string(),
                points: Vec::new(),
            },
        );

        let outcome = table.refresh([
            (Token::new(0x0600_0001), "__InitComponentRuntime"),
            (Token::new(0x0600_0002), ".ctor"),
            (Token::new(0x0600_0004), "InitializeComponent"),
        ]);

        assert_eq!(outcome, SymbolRefresh { renamed: 1, dropped: 1 });
        let renamed = table.get(Token::new(0x0600_0001)).unwrap();
        assert_eq!(renamed.name, "__InitComponentRuntime");
        assert_eq!(renamed.points, vec![point(0, 12)]);
        assert!(table.get(Token::new(0x0600_0003)).is_none());
        assert!(table.get(Token::new(0x0600_0004)).is_none());
    }

    #[test]
    fn test_hide_method_resets_points() {
        let mut table = SymbolTable::new(SymbolFormat::Pdb);
        table.insert(
            Token::new(0x0600_0003),
            MethodSymbols {
                name: ".ctor".to_string(),
                points: vec![point(0, 8), point(60, 11)],
            },
        );

        assert!(table.hide_method(Token::new(0x0600_0003)));
        assert!(!table.hide_method(Token::new(0x0600_0009)));

        let points = &table.get(Token::new(0x0600_0003)).unwrap().points;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].il_offset, 0);
        assert_eq!(points[0].document, "MainPage.xaml.cs");
        assert!(points[0].is_hidden());
    }

    #[test]
    fn test_hidden_point() {
        let mut hidden = point(4, 1);
        assert!(!hidden.is_hidden());
        hidden.start_line = HIDDEN_LINE;
        assert!(hidden.is_hidden());
    }
}
