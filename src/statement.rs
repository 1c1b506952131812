use regex::Regex;
use std::{fmt, sync::LazyLock};

/// Marker written in place of every placeholder in the normalized SQL.
pub const DRIVER_MARKER: char = '?';

/// Tokens recognised by the lexer. Literals, quoted identifiers and comments
/// are matched whole so that anything placeholder-like inside them stays inert.
/// An unterminated literal or comment runs to the end of the text.
const LEXER_TOKENS: [&str; 9] = [
    r"'(?:[^'\\]|\\(?s:.)|'')*(?:'|$)",
    r#""(?:[^"\\]|\\(?s:.)|"")*(?:"|$)"#,
    r"`(?:[^`]|``)*(?:`|$)",
    r"--[^\n]*",
    r"#[^\n]*",
    r"/\*(?s:.*?)(?:\*/|$)",
    r"::",
    r"\?",
    r":[A-Za-z0-9_]+",
];

static LEXER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(&LEXER_TOKENS.join("|")));

/// One placeholder of a parsed statement.
///
/// Ordinals are 1-based and assigned left to right. Positional (`?`)
/// placeholders carry no name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub ordinal: usize,
    pub name: Option<String>,
}

impl Placeholder {
    /// How the placeholder is reported in error messages: its name, or `#n`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{}", self.ordinal),
        }
    }
}

/// The parsed, placeholder-normalized form of a SQL text.
///
/// Parsing never rejects SQL; names are only checked when bound. A statement
/// is immutable and can be shared between concurrent queries behind an `Arc`.
///
/// # Examples
///
/// ```
/// use sqlx_plus::Statement;
///
/// let statement = Statement::parse("SELECT * FROM users WHERE id = :id AND name = ?")?;
/// assert_eq!(statement.normalized(), "SELECT * FROM users WHERE id = ? AND name = ?");
/// assert_eq!(statement.len(), 2);
/// assert_eq!(statement.placeholders()[0].name.as_deref(), Some("id"));
/// assert_eq!(statement.placeholders()[1].name, None);
/// # Ok::<(), sqlx_plus::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    normalized: String,
    placeholders: Vec<Placeholder>,
}

impl Statement {
    /// Scans `sql` and replaces every `?` and `:name` found outside literals,
    /// quoted identifiers and comments with the driver marker.
    ///
    /// A `:` not followed by an identifier character, and the `::` cast
    /// operator, are copied verbatim.
    pub fn parse<T>(sql: T) -> crate::Result<Self>
    where
        T: Into<String>,
    {
        let sql = sql.into();
        let lexer = LEXER.as_ref().map_err(Clone::clone)?;
        let mut normalized = String::with_capacity(sql.len());
        let mut placeholders = Vec::new();
        let mut copied = 0;
        for token in lexer.find_iter(&sql) {
            let name = match token.as_str() {
                "?" => None,
                text if text.starts_with(':') && text != "::" => Some(text[1..].to_owned()),
                _ => continue,
            };
            normalized.push_str(&sql[copied..token.start()]);
            normalized.push(DRIVER_MARKER);
            copied = token.end();
            placeholders.push(Placeholder {
                ordinal: placeholders.len() + 1,
                name,
            });
        }
        normalized.push_str(&sql[copied..]);
        Ok(Self {
            sql,
            normalized,
            placeholders,
        })
    }

    /// The SQL text as written by the caller.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The SQL text sent to the driver.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    pub fn len(&self) -> usize {
        self.placeholders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }

    pub fn placeholder(&self, ordinal: usize) -> Option<&Placeholder> {
        ordinal
            .checked_sub(1)
            .and_then(|index| self.placeholders.get(index))
    }

    /// Every ordinal whose placeholder is called `name`, ascending.
    pub fn ordinals_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.placeholders
            .iter()
            .filter(move |p| p.name.as_deref() == Some(name))
            .map(|p| p.ordinal)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.ordinals_of(name).next().is_some()
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.placeholders.iter().filter_map(|p| p.name.as_deref()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
