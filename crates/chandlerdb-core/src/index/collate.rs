use std::cmp::Ordering;

///
/// Collator
///
/// Case-insensitive string ordering for string indexes. Equal folded
/// strings tie-break on their raw form so the order stays total.
/// The locale is carried and persisted; tailoring beyond case folding is
/// not applied.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Collator {
    locale: String,
}

impl Collator {
    #[must_use]
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
        }
    }

    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    #[must_use]
    pub fn compare(&self, left: &str, right: &str) -> Ordering {
        let folded = left
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(right.chars().flat_map(char::to_lowercase));

        folded.then_with(|| left.cmp(right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_case_before_tie_break() {
        let collator = Collator::new("en");

        assert_eq!(collator.compare("apple", "Banana"), Ordering::Less);
        assert_eq!(collator.compare("Apple", "apple"), Ordering::Less);
        assert_eq!(collator.compare("apple", "apple"), Ordering::Equal);
        assert_eq!(collator.locale(), "en");
    }
}
