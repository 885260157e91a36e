use std::fmt;

/// A metadata token referencing a row in a metadata table.
///
/// The high byte (bits 24-31) holds the table id, the low 24 bits the 1-based row index.
/// Only the tables this crate allocates rows in or refers to have named constants.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(pub u32);

impl Token {
    /// `TypeRef` table id
    pub const TYPE_REF: u8 = 0x01;
    /// `TypeDef` table id
    pub const TYPE_DEF: u8 = 0x02;
    /// `MethodDef` table id
    pub const METHOD_DEF: u8 = 0x06;
    /// `Param` table id
    pub const PARAM: u8 = 0x08;
    /// `MemberRef` table id
    pub const MEMBER_REF: u8 = 0x0A;
    /// `TypeSpec` table id
    pub const TYPE_SPEC: u8 = 0x1B;

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table id and a row index.
    ///
    /// Row indices wider than 24 bits are truncated.
    #[must_use]
    pub const fn from_parts(table: u8, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table id (high byte)
    #[must_use]
    pub const fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index (low 24 bits)
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is the null token
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the token points into the `MethodDef` table
    #[must_use]
    pub const fn is_method_def(&self) -> bool {
        self.table() == Self::METHOD_DEF
    }

    /// Returns true if the token points into the `MemberRef` table
    #[must_use]
    pub const fn is_member_ref(&self) -> bool {
        self.table() == Self::MEMBER_REF
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parts() {
        let token = Token::from_parts(Token::METHOD_DEF, 0x2A);
        assert_eq!(token.value(), 0x0600_002A);
        assert_eq!(token.table(), Token::METHOD_DEF);
        assert_eq!(token.row(), 0x2A);
        assert!(token.is_method_def());
        assert!(!token.is_member_ref());
    }

    #[test]
    fn test_token_row_truncated() {
        let token = Token::from_parts(Token::MEMBER_REF, 0x0100_0001);
        assert_eq!(token.table(), Token::MEMBER_REF);
        assert_eq!(token.row(), 1);
    }

    #[test]
    fn test_token_null() {
        assert!(Token::default().is_null());
        assert!(!Token::new(0x0200_0001).is_null());
    }

    #[test]
    fn test_token_format() {
        let token = Token(0x0600_0001);
        assert_eq!(token.to_string(), "0x06000001");
        let debug = format!("{token:?}");
        assert!(debug.contains("table: 0x06"));
        assert!(debug.contains("row: 1"));
    }

    #[test]
    fn test_token_ordering() {
        assert!(Token(0x0600_0001) < Token(0x0600_0002));
        assert!(Token(0x0600_FFFF) < Token(0x0A00_0001));
    }
}
