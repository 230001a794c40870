//! Expense record types
//!
//! Field values arrive as loose text from the model. Each type here has a
//! strict `parse` that either yields a canonical value or explains what was
//! wrong, so nothing half-valid reaches the ledger.

use chrono::NaiveDate;
use std::fmt;

/// Kind of ledger movement; only expenses are recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseKind {
    Expense,
}

impl ExpenseKind {
    /// Accepts `expense` or `gasto`, case-insensitively
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "expense" | "gasto" => Ok(Self::Expense),
            other => Err(format!("unsupported record kind '{}'", other)),
        }
    }

    /// Value written to the `tipo` column
    pub fn ledger_value(&self) -> &'static str {
        match self {
            Self::Expense => "gasto",
        }
    }
}

/// Closed set of expense categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Food,
    Transport,
    Entertainment,
    Health,
    Education,
    Other,
}

impl Category {
    /// Every category, in display order
    pub const ALL: [Category; 6] = [
        Self::Food,
        Self::Transport,
        Self::Entertainment,
        Self::Health,
        Self::Education,
        Self::Other,
    ];

    /// Normalize an English or Spanish category name
    ///
    /// Matching ignores case and accents.
    ///
    /// # Examples
    ///
    /// ```
    /// use finbot::ledger::Category;
    ///
    /// assert_eq!(Category::parse("Alimentación"), Ok(Category::Food));
    /// assert_eq!(Category::parse("TRANSPORT"), Ok(Category::Transport));
    /// assert!(Category::parse("Vivienda").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, String> {
        let folded = fold(value.trim());
        let category = match folded.as_str() {
            "food" | "alimentacion" | "comida" => Self::Food,
            "transport" | "transportation" | "transporte" => Self::Transport,
            "entertainment" | "entretenimiento" => Self::Entertainment,
            "health" | "salud" => Self::Health,
            "education" | "educacion" => Self::Education,
            "other" | "others" | "otro" | "otros" => Self::Other,
            _ => return Err(format!("unknown category '{}'", value.trim())),
        };
        Ok(category)
    }

    /// Spanish label, as stored in the ledger and shown to users
    pub fn label(&self) -> &'static str {
        match self {
            Self::Food => "Alimentación",
            Self::Transport => "Transporte",
            Self::Entertainment => "Entretenimiento",
            Self::Health => "Salud",
            Self::Education => "Educación",
            Self::Other => "Otros",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lowercase and strip Spanish diacritics
fn fold(value: &str) -> String {
    value
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Non-negative decimal amount kept as canonical text
///
/// The canonical form uses `.` as the decimal separator and has no currency
/// symbol or thousands grouping, so it can be bound as `numeric` without any
/// floating-point step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount(String);

impl Amount {
    /// Parse a model-supplied amount
    ///
    /// Accepts an optional `S/` or `$` prefix and at most one separator,
    /// either `.` or `,`, followed by one or two decimal digits. Grouped
    /// forms such as `1,234` or `1.500` are ambiguous and rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use finbot::ledger::Amount;
    ///
    /// assert_eq!(Amount::parse("S/ 12,50").unwrap().as_str(), "12.50");
    /// assert_eq!(Amount::parse("$7").unwrap().as_str(), "7");
    /// assert!(Amount::parse("1,234").is_err());
    /// assert!(Amount::parse("-3").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, String> {
        let trimmed = value.trim();
        let unprefixed = trimmed
            .strip_prefix("S/")
            .or_else(|| trimmed.strip_prefix("s/"))
            .or_else(|| trimmed.strip_prefix('$'))
            .unwrap_or(trimmed)
            .trim_start();

        let (whole, fraction) = match unprefixed.split_once(['.', ',']) {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (unprefixed, None),
        };

        let valid = !whole.is_empty()
            && whole.chars().all(|c| c.is_ascii_digit())
            && fraction.map_or(true, |f| {
                (1..=2).contains(&f.len()) && f.chars().all(|c| c.is_ascii_digit())
            });

        if !valid {
            return Err(format!("invalid amount '{}'", trimmed));
        }

        Ok(Self(match fraction {
            Some(fraction) => format!("{}.{}", whole, fraction),
            None => whole.to_string(),
        }))
    }

    /// Canonical decimal text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    let trimmed = value.trim();
    if trimmed.len() != 10 {
        return Err(format!("invalid date '{}', expected YYYY-MM-DD", trimmed));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD", trimmed))
}

/// One fully specified expense
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseRecord {
    pub kind: ExpenseKind,
    pub amount: Amount,
    pub category: Category,
    pub date: NaiveDate,
    pub description: String,
}

impl ExpenseRecord {
    /// User-facing confirmation for a stored record
    ///
    /// # Examples
    ///
    /// ```
    /// use finbot::ledger::{Amount, Category, ExpenseKind, ExpenseRecord};
    /// use chrono::NaiveDate;
    ///
    /// let record = ExpenseRecord {
    ///     kind: ExpenseKind::Expense,
    ///     amount: Amount::parse("12.50").unwrap(),
    ///     category: Category::Transport,
    ///     date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
    ///     description: "Taxi".to_string(),
    /// };
    /// assert_eq!(
    ///     record.confirmation("S/"),
    ///     "Gasto registrado: Transporte - S/ 12.50 el 2024-05-03. Taxi"
    /// );
    /// ```
    pub fn confirmation(&self, currency_symbol: &str) -> String {
        format!(
            "Gasto registrado: {} - {} {} el {}. {}",
            self.category,
            currency_symbol,
            self.amount,
            self.date.format("%Y-%m-%d"),
            self.description
        )
    }
}
