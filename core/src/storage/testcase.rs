use lazy_regex::regex_is_match;

/// The four files a test case consists of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum TestSlot {
    Input,
    Answer,
    Output,
    Error,
}

impl TestSlot {
    pub fn extension(self) -> &'static str {
        use TestSlot::*;
        match self {
            Input => "in",
            Answer => "ans",
            Output => "out",
            Error => "err",
        }
    }

    /// Human readable name, as in "No answer file for ...".
    pub fn describe(self) -> &'static str {
        use TestSlot::*;
        match self {
            Input => "input",
            Answer => "answer",
            Output => "output",
            Error => "standard error",
        }
    }

    /// ```
    /// use pcu_core::storage::TestSlot;
    ///
    /// assert_eq!(TestSlot::Answer.filename("sample1"), "sample1.ans");
    /// ```
    pub fn filename(self, test_id: &str) -> String {
        format!("{}.{}", test_id, self.extension())
    }
}

/// Problem names and test ids become path components, so both are kept to a safe alphabet.
///
/// ```
/// use pcu_core::storage::is_valid_identifier;
///
/// assert!(is_valid_identifier("sample1"));
/// assert!(is_valid_identifier("abc-123_x.y"));
/// assert!(!is_valid_identifier(""));
/// assert!(!is_valid_identifier("a/b"));
/// assert!(!is_valid_identifier(".."));
/// ```
pub fn is_valid_identifier(s: &str) -> bool {
    regex_is_match!(r"^[A-Za-z0-9_.\-]+$", s) && s.chars().any(|c| c != '.')
}
