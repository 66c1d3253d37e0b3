use crate::index::{IndexSpec, RangeSet};

/// Index name of a selection collection kept in manual (numeric) order.
pub const ADHOC_INDEX: &str = "__adhoc__";

/// Attribute used to break ties in every attribute-sorted selection index.
pub const SECONDARY_SORT_ATTRIBUTE: &str = "date";

/// Spec for a selection index: `__adhoc__` is numeric, any other name sorts
/// on the attribute of that name and then on the date.
#[must_use]
pub fn selection_index_spec(index_name: &str) -> IndexSpec {
    if index_name == ADHOC_INDEX {
        return IndexSpec::Numeric;
    }

    let mut attributes = vec![index_name.to_string()];
    if index_name != SECONDARY_SORT_ATTRIBUTE {
        attributes.push(SECONDARY_SORT_ATTRIBUTE.to_string());
    }

    IndexSpec::Attribute {
        attributes,
        monitor: Vec::new(),
    }
}

/// Selection as a set of single positions; used when carrying a selection
/// over to another index.
pub(crate) fn single_positions(positions: impl IntoIterator<Item = usize>) -> RangeSet {
    RangeSet::from_ranges(positions.into_iter().map(|p| (p, p)))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adhoc_index_is_numeric() {
        assert!(!selection_index_spec(ADHOC_INDEX).is_sorted());
    }

    #[test]
    fn named_index_sorts_with_date_secondary() {
        let spec = selection_index_spec("title");

        assert_eq!(
            spec.monitored_attributes(),
            vec!["title".to_string(), "date".to_string()]
        );
        assert_eq!(selection_index_spec("date").monitored_attributes(), vec!["date".to_string()]);
    }

    #[test]
    fn single_positions_merge_into_ranges() {
        let ranges = single_positions([4, 1, 2]);

        assert_eq!(ranges.ranges(), &[(1, 2), (4, 4)]);
    }
}
