use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters of surrounding text kept on each side of a match.
pub const CONTEXT_WINDOW: usize = 80;

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?").unwrap());

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:,\d{3})*(?:\.\d+)?)\s*(?:%|percent\b|per\s+cent\b)").unwrap()
});

static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([£$€])\s?(\d{1,3}(?:,\d{3})*(?:\.\d+)?)(?:\s*(million|billion|bn|m|k)\b)?")
        .unwrap()
});

static COUNCIL_TAX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)council\s+tax").unwrap());

static INCREASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(increas\w*|ris\w*|rais\w*|up|higher|hike\w*)\b").unwrap());
static DECREASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(decreas\w*|cut\w*|reduc\w*|lower\w*|down)\b").unwrap());
static FREEZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(freez\w*|frozen)\b").unwrap());

/// Canonical party name, followed by the aliases matched in text. Longer
/// aliases must sort before their prefixes in the combined pattern.
const PARTY_ALIASES: &[(&str, &[&str])] = &[
    ("Labour", &["labour party", "labour"]),
    (
        "Conservative",
        &[
            "conservative party",
            "conservatives",
            "conservative",
            "tories",
            "tory",
        ],
    ),
    (
        "Liberal Democrats",
        &[
            "liberal democrats",
            "liberal democrat",
            "lib dems",
            "lib dem",
        ],
    ),
    ("Green", &["green party", "greens"]),
    ("SNP", &["scottish national party", "snp"]),
    ("Plaid Cymru", &["plaid cymru"]),
    ("Reform UK", &["reform uk"]),
    ("UKIP", &["uk independence party", "ukip"]),
    ("Independent", &["independents", "independent"]),
];

static PARTY_RE: Lazy<Regex> = Lazy::new(|| {
    let mut aliases: Vec<&str> = PARTY_ALIASES
        .iter()
        .flat_map(|(_, aliases)| aliases.iter().copied())
        .collect();
    aliases.sort_by_key(|alias| std::cmp::Reverse(alias.len()));
    let joined = aliases
        .iter()
        .map(|alias| regex::escape(alias).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{joined})\b")).unwrap()
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberMatch {
    pub raw: String,
    pub value: f64,
    pub start: usize,
    pub end: usize,
    pub context_before: String,
    pub context_after: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentMatch {
    pub value: f64,
    pub start: usize,
    pub end: usize,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyMatch {
    pub currency: String,
    pub amount: f64,
    pub raw: String,
    pub start: usize,
    pub end: usize,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyMention {
    pub party: String,
    pub raw: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Increase,
    Decrease,
    Freeze,
    Unspecified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilTaxChange {
    pub percent: f64,
    pub direction: ChangeDirection,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub numbers: Vec<NumberMatch>,
    pub percentages: Vec<PercentMatch>,
    pub currency: Vec<CurrencyMatch>,
    pub parties: Vec<PartyMention>,
    pub council_tax: Vec<CouncilTaxChange>,
}

/// Extract every number together with its context windows. A window never
/// reaches into a neighboring match: the before-window starts at the end of
/// the previous match and the after-window stops at the start of the next.
pub fn extract_numbers(text: &str) -> Vec<NumberMatch> {
    let spans: Vec<(usize, usize)> = NUMBER_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut matches = Vec::with_capacity(spans.len());
    for (i, &(start, end)) in spans.iter().enumerate() {
        let window_start = floor_char_boundary(text, start.saturating_sub(CONTEXT_WINDOW));
        let before_start = match i.checked_sub(1).map(|p| spans[p].1) {
            Some(prev_end) => window_start.max(prev_end),
            None => window_start,
        };
        let window_end = ceil_char_boundary(text, (end + CONTEXT_WINDOW).min(text.len()));
        let after_end = match spans.get(i + 1) {
            Some(&(next_start, _)) => window_end.min(next_start),
            None => window_end,
        };

        let raw = &text[start..end];
        matches.push(NumberMatch {
            raw: raw.to_string(),
            value: parse_number(raw),
            start,
            end,
            context_before: text[before_start..start].to_string(),
            context_after: text[end..after_end].to_string(),
        });
    }
    matches
}

pub fn extract_percentages(text: &str) -> Vec<PercentMatch> {
    PERCENT_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps.get(1)?;
            Some(PercentMatch {
                value: parse_number(number.as_str()),
                start: whole.start(),
                end: whole.end(),
                context: context_around(text, whole.start(), whole.end()),
            })
        })
        .collect()
}

pub fn extract_currency(text: &str) -> Vec<CurrencyMatch> {
    CURRENCY_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let symbol = caps.get(1)?.as_str();
            let number = caps.get(2)?.as_str();
            let multiplier = match caps.get(3).map(|m| m.as_str().to_lowercase()) {
                Some(suffix) if suffix == "million" || suffix == "m" => 1_000_000.0,
                Some(suffix) if suffix == "billion" || suffix == "bn" => 1_000_000_000.0,
                Some(suffix) if suffix == "k" => 1_000.0,
                _ => 1.0,
            };
            Some(CurrencyMatch {
                currency: symbol.to_string(),
                amount: parse_number(number) * multiplier,
                raw: whole.as_str().to_string(),
                start: whole.start(),
                end: whole.end(),
                context: context_around(text, whole.start(), whole.end()),
            })
        })
        .collect()
}

pub fn extract_parties(text: &str) -> Vec<PartyMention> {
    PARTY_RE
        .find_iter(text)
        .map(|m| PartyMention {
            party: canonical_party(m.as_str()),
            raw: m.as_str().to_string(),
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// Percentages whose context window mentions council tax, with a heuristic
/// direction read off the same window.
pub fn extract_council_tax_changes(text: &str) -> Vec<CouncilTaxChange> {
    extract_percentages(text)
        .into_iter()
        .filter(|percent| COUNCIL_TAX_RE.is_match(&percent.context))
        .map(|percent| {
            let direction = if FREEZE_RE.is_match(&percent.context) {
                ChangeDirection::Freeze
            } else if INCREASE_RE.is_match(&percent.context) {
                ChangeDirection::Increase
            } else if DECREASE_RE.is_match(&percent.context) {
                ChangeDirection::Decrease
            } else {
                ChangeDirection::Unspecified
            };
            CouncilTaxChange {
                percent: percent.value,
                direction,
                context: percent.context,
            }
        })
        .collect()
}

pub fn extract_report(text: &str) -> ExtractionReport {
    ExtractionReport {
        numbers: extract_numbers(text),
        percentages: extract_percentages(text),
        currency: extract_currency(text),
        parties: extract_parties(text),
        council_tax: extract_council_tax_changes(text),
    }
}

/// Attribute each percentage to the party whose mention sits inside the
/// percentage's context window. Plain string containment; when several
/// parties qualify the nearest one wins, and a figure binds more tightly to
/// the party named before it than to one named after.
pub fn attribute_percentages(text: &str) -> Vec<(String, PercentMatch)> {
    let parties = extract_parties(text);
    extract_percentages(text)
        .into_iter()
        .filter_map(|percent| {
            let party = nearest_party(text, &parties, percent.start, percent.end)?;
            Some((party, percent))
        })
        .collect()
}

/// Attribute currency amounts to parties the same way percentages are.
pub fn attribute_currency(text: &str) -> Vec<(String, CurrencyMatch)> {
    let parties = extract_parties(text);
    extract_currency(text)
        .into_iter()
        .filter_map(|amount| {
            let party = nearest_party(text, &parties, amount.start, amount.end)?;
            Some((party, amount))
        })
        .collect()
}

fn nearest_party(
    text: &str,
    parties: &[PartyMention],
    start: usize,
    end: usize,
) -> Option<String> {
    let window_start = floor_char_boundary(text, start.saturating_sub(CONTEXT_WINDOW));
    let window_end = ceil_char_boundary(text, (end + CONTEXT_WINDOW).min(text.len()));
    parties
        .iter()
        .filter(|mention| mention.start >= window_start && mention.end <= window_end)
        .min_by_key(|mention| {
            if mention.end <= start {
                start - mention.end
            } else {
                // Trailing mentions count double.
                mention.start.saturating_sub(end) * 2
            }
        })
        .map(|mention| mention.party.clone())
}

fn canonical_party(raw: &str) -> String {
    let folded = raw.to_lowercase();
    let folded = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    for (canonical, aliases) in PARTY_ALIASES {
        if aliases.iter().any(|alias| *alias == folded) {
            return (*canonical).to_string();
        }
    }
    raw.to_string()
}

fn parse_number(raw: &str) -> f64 {
    raw.replace(',', "").parse::<f64>().unwrap_or(0.0)
}

fn context_around(text: &str, start: usize, end: usize) -> String {
    let from = floor_char_boundary(text, start.saturating_sub(CONTEXT_WINDOW));
    let to = ceil_char_boundary(text, (end + CONTEXT_WINDOW).min(text.len()));
    text[from..to].to_string()
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_thousands_separators() {
        let matches = extract_numbers("a budget of 1,234,567.89 next year");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].raw, "1,234,567.89");
        assert!((matches[0].value - 1_234_567.89).abs() < 1e-9);
    }

    #[test]
    fn percent_variants() {
        let text = "a 4.99% rise, then 3 per cent, then 2 percent";
        let percentages = extract_percentages(text);
        let values: Vec<f64> = percentages.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![4.99, 3.0, 2.0]);
    }

    #[test]
    fn currency_magnitudes() {
        let amounts = extract_currency("£1.2 million on roads and £300k on parks");
        assert_eq!(amounts.len(), 2);
        assert!((amounts[0].amount - 1_200_000.0).abs() < 1e-6);
        assert!((amounts[1].amount - 300_000.0).abs() < 1e-6);
        assert_eq!(amounts[0].currency, "£");
    }

    #[test]
    fn party_aliases_canonicalize() {
        let text = "The Tories and the Lib Dems opposed the Labour Party budget.";
        let parties = extract_parties(text);
        let names: Vec<&str> = parties.iter().map(|p| p.party.as_str()).collect();
        assert_eq!(names, vec!["Conservative", "Liberal Democrats", "Labour"]);
    }

    #[test]
    fn council_tax_direction() {
        let changes =
            extract_council_tax_changes("The council tax will rise by 4.99% from April.");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].direction, ChangeDirection::Increase);
        assert!((changes[0].percent - 4.99).abs() < 1e-9);
    }
}
