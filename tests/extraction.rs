use civicdesk::services::extract::{
    attribute_percentages, extract_council_tax_changes, extract_currency, extract_numbers,
    extract_parties, extract_report, ChangeDirection,
};

#[test]
fn two_numbers_split_context_windows_without_cross_contamination() {
    let text = "The precept rises by 3 pounds while the levy adds 7 pounds overall.";
    let matches = extract_numbers(text);
    assert_eq!(matches.len(), 2);

    let first = &matches[0];
    let second = &matches[1];
    assert_eq!(first.raw, "3");
    assert_eq!(second.raw, "7");

    assert!(first.context_before.contains("precept rises by"));
    assert!(!first.context_after.contains('7'));
    assert!(!second.context_before.contains('3'));
    assert!(second.context_after.contains("pounds overall"));

    // The windows meet between the matches; neither reaches past the other.
    assert!(first.context_after.ends_with("adds "));
    assert!(second.context_before.starts_with(" pounds while"));
}

#[test]
fn adjacent_numbers_keep_disjoint_windows() {
    let text = "between 15 and 20 councils";
    let matches = extract_numbers(text);
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].context_after, " and ");
    assert_eq!(matches[1].context_before, " and ");
}

#[test]
fn window_is_bounded_for_long_text() {
    let filler = "x".repeat(500);
    let text = format!("{filler} 42 {filler}");
    let matches = extract_numbers(&text);
    assert_eq!(matches.len(), 1);
    assert!(matches[0].context_before.chars().count() <= 80);
    assert!(matches[0].context_after.chars().count() <= 80);
}

#[test]
fn council_tax_changes_across_directions() {
    let rise = extract_council_tax_changes("Council tax will increase by 4.99% next year.");
    assert_eq!(rise.len(), 1);
    assert_eq!(rise[0].direction, ChangeDirection::Increase);

    let freeze = extract_council_tax_changes("We will freeze council tax at 0% this term.");
    assert_eq!(freeze.len(), 1);
    assert_eq!(freeze[0].direction, ChangeDirection::Freeze);

    let unrelated = extract_council_tax_changes("Turnout was 38% across the borough.");
    assert!(unrelated.is_empty());
}

#[test]
fn currency_with_magnitude_suffixes() {
    let amounts = extract_currency("A £2.5 million reserve and a $400k grant.");
    assert_eq!(amounts.len(), 2);
    assert!((amounts[0].amount - 2_500_000.0).abs() < 1e-6);
    assert_eq!(amounts[0].currency, "£");
    assert!((amounts[1].amount - 400_000.0).abs() < 1e-6);
    assert_eq!(amounts[1].currency, "$");
}

#[test]
fn percentage_attribution_picks_nearest_party() {
    let text = "Labour pledged a 2% rise. The Conservatives countered with a 1% cut.";
    let attributed = attribute_percentages(text);
    assert_eq!(attributed.len(), 2);
    assert_eq!(attributed[0].0, "Labour");
    assert!((attributed[0].1.value - 2.0).abs() < 1e-9);
    assert_eq!(attributed[1].0, "Conservative");
    assert!((attributed[1].1.value - 1.0).abs() < 1e-9);
}

#[test]
fn report_collects_every_extractor() {
    let text = "The Labour council raised council tax by 4.99%, spending £1.2 million on roads.";
    let report = extract_report(text);
    assert!(!report.numbers.is_empty());
    assert_eq!(report.percentages.len(), 1);
    assert_eq!(report.currency.len(), 1);
    assert_eq!(report.parties.len(), 1);
    assert_eq!(report.parties[0].party, "Labour");
    assert_eq!(report.council_tax.len(), 1);
}

#[test]
fn party_mentions_are_case_insensitive() {
    let parties = extract_parties("the LIB DEMS and plaid cymru abstained");
    let names: Vec<&str> = parties.iter().map(|p| p.party.as_str()).collect();
    assert_eq!(names, vec!["Liberal Democrats", "Plaid Cymru"]);
}
