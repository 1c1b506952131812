use crate::Value;

/// One result row: column labels, as reported by the driver, paired with their
/// raw values in result order.
///
/// This is also the generic-map shape handed to callers that did not ask for
/// a record type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, value: Value) {
        self.columns.push((label.into(), value));
    }

    /// Value of the first column labelled `label`, compared case-insensitively.
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(l, _)| l == label)
            .or_else(|| self.columns.iter().find(|(l, _)| l.eq_ignore_ascii_case(label)))
            .map(|(_, v)| v)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(l, v)| (l.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl<L: Into<String>> FromIterator<(L, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (L, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(l, v)| (l.into(), v)).collect(),
        }
    }
}
