//! Property tests for text cleanup and tag matching.

use proptest::prelude::*;
use sierra_marc::text::clean;
use sierra_marc::{Field, Subfield};

proptest! {
    #[test]
    fn clean_reaches_a_fixed_point(s in "[A-Za-z0-9 .,:;/()\\[\\]-]{0,40}") {
        let once = clean(&s);
        prop_assert_eq!(clean(&once), once);
    }

    #[test]
    fn clean_is_idempotent_on_titles(
        words in prop::collection::vec("[A-Za-z]{1,8}", 1..6),
        sep in prop::sample::select(vec![" : ", " / ", " ; ", ", ", " "]),
        end in prop::sample::select(vec!["", ".", " /", " :", "..."]),
    ) {
        let title = format!("{}{end}", words.join(sep));
        let once = clean(&title);
        prop_assert_eq!(clean(&once), once);
    }

    #[test]
    fn field_matches_its_tags(
        tag in "[1-9][0-9]{2}",
        group in "[a-z]",
        other_tag in "[1-9][0-9]{2}",
        other_group in "[a-z]",
    ) {
        let group_tag = group.chars().next().unwrap();
        let field = Field::data(tag.as_str(), [' ', ' '], [Subfield::new('a', "x")])
            .unwrap()
            .with_group_tag(group_tag);

        let full_tag = format!("{group}{tag}");
        prop_assert!(field.matches_tag(&tag));
        prop_assert!(field.matches_tag(&group));
        prop_assert!(field.matches_tag(&full_tag));

        prop_assume!(other_tag != tag && other_group != group);
        let other_tag_same_group = format!("{group}{other_tag}");
        let same_tag_other_group = format!("{other_group}{tag}");
        prop_assert!(!field.matches_tag(&other_tag));
        prop_assert!(!field.matches_tag(&other_group));
        prop_assert!(!field.matches_tag(&other_tag_same_group));
        prop_assert!(!field.matches_tag(&same_tag_other_group));
    }
}

#[test]
fn test_clean_examples() {
    assert_eq!(clean("Songs of innocence /"), "Songs of innocence");
    assert_eq!(clean("  Spaced   out  title. "), "Spaced out title");
}
