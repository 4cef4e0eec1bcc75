use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domains::document::Document;
use crate::services::extract::{
    attribute_currency, attribute_percentages, extract_council_tax_changes, extract_parties,
    extract_percentages, CouncilTaxChange,
};
use crate::services::markdown::markdown_to_text;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyFigure {
    pub currency: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyFigures {
    pub party: String,
    pub mentions: usize,
    pub percentages: Vec<f64>,
    pub amounts: Vec<CurrencyFigure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub document_id: i32,
    pub title: String,
    pub parties: Vec<PartyFigures>,
    pub council_tax: Vec<CouncilTaxChange>,
    pub unattributed_percentages: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartySide {
    pub mentions: usize,
    pub mean_percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyComparison {
    pub party: String,
    pub left: Option<PartySide>,
    pub right: Option<PartySide>,
    pub mean_percentage_delta: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisComparison {
    pub left_document_id: i32,
    pub right_document_id: i32,
    pub parties: Vec<PartyComparison>,
}

/// Run the regex extractors over a document and group the figures per party.
pub fn analyze_document(document: &Document) -> DocumentAnalysis {
    let text = document
        .markdown
        .as_deref()
        .map(markdown_to_text)
        .unwrap_or_else(|| document.content.clone());

    let mut per_party: BTreeMap<String, PartyFigures> = BTreeMap::new();
    for mention in extract_parties(&text) {
        per_party
            .entry(mention.party.clone())
            .or_insert_with(|| PartyFigures {
                party: mention.party,
                mentions: 0,
                percentages: Vec::new(),
                amounts: Vec::new(),
            })
            .mentions += 1;
    }

    let attributed = attribute_percentages(&text);
    for (party, percent) in &attributed {
        if let Some(figures) = per_party.get_mut(party) {
            figures.percentages.push(percent.value);
        }
    }
    for (party, amount) in attribute_currency(&text) {
        if let Some(figures) = per_party.get_mut(&party) {
            figures.amounts.push(CurrencyFigure {
                currency: amount.currency,
                amount: amount.amount,
            });
        }
    }

    let attributed_spans: Vec<(usize, usize)> =
        attributed.iter().map(|(_, p)| (p.start, p.end)).collect();
    let unattributed_percentages = extract_percentages(&text)
        .into_iter()
        .filter(|p| !attributed_spans.contains(&(p.start, p.end)))
        .map(|p| p.value)
        .collect();

    DocumentAnalysis {
        document_id: document.id,
        title: document.title.clone(),
        parties: per_party.into_values().collect(),
        council_tax: extract_council_tax_changes(&text),
        unattributed_percentages,
    }
}

/// Compare two analyses party-by-party.
pub fn compare_analyses(left: &DocumentAnalysis, right: &DocumentAnalysis) -> AnalysisComparison {
    let mut names: Vec<String> = left
        .parties
        .iter()
        .chain(right.parties.iter())
        .map(|p| p.party.clone())
        .collect();
    names.sort();
    names.dedup();

    let parties = names
        .into_iter()
        .map(|party| {
            let left_side = side_for(left, &party);
            let right_side = side_for(right, &party);
            let delta = match (&left_side, &right_side) {
                (Some(l), Some(r)) => match (l.mean_percentage, r.mean_percentage) {
                    (Some(a), Some(b)) => Some(b - a),
                    _ => None,
                },
                _ => None,
            };
            PartyComparison {
                party,
                left: left_side,
                right: right_side,
                mean_percentage_delta: delta,
            }
        })
        .collect();

    AnalysisComparison {
        left_document_id: left.document_id,
        right_document_id: right.document_id,
        parties,
    }
}

fn side_for(analysis: &DocumentAnalysis, party: &str) -> Option<PartySide> {
    analysis
        .parties
        .iter()
        .find(|p| p.party == party)
        .map(|p| PartySide {
            mentions: p.mentions,
            mean_percentage: mean(&p.percentages),
        })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Plain-text block of extracted figures, folded into RAG prompts.
pub fn prompt_digest(text: &str) -> String {
    let mut out = String::new();

    let council_tax = extract_council_tax_changes(text);
    if !council_tax.is_empty() {
        out.push_str("Council tax changes found:\n");
        for change in &council_tax {
            out.push_str(&format!(
                "- {}% ({})\n",
                change.percent,
                direction_label(change)
            ));
        }
    }

    let attributed = attribute_percentages(text);
    if !attributed.is_empty() {
        out.push_str("Percentages attributed to parties:\n");
        for (party, percent) in &attributed {
            out.push_str(&format!("- {}: {}%\n", party, percent.value));
        }
    }

    let parties = extract_parties(text);
    if !parties.is_empty() {
        let mut names: Vec<String> = parties.into_iter().map(|p| p.party).collect();
        names.sort();
        names.dedup();
        out.push_str(&format!("Parties mentioned: {}\n", names.join(", ")));
    }

    out.trim_end().to_string()
}

fn direction_label(change: &CouncilTaxChange) -> &'static str {
    use crate::services::extract::ChangeDirection;
    match change.direction {
        ChangeDirection::Increase => "increase",
        ChangeDirection::Decrease => "decrease",
        ChangeDirection::Freeze => "freeze",
        ChangeDirection::Unspecified => "unspecified",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: i32, content: &str) -> Document {
        Document {
            id,
            title: format!("doc-{id}"),
            content: content.to_string(),
            markdown: None,
            metadata: None,
            folder: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn groups_percentages_by_party() {
        let text = "Labour proposes a 4.99% council tax rise. The Conservatives promise a 2% cut.";
        let analysis = analyze_document(&doc(1, text));
        let labour = analysis
            .parties
            .iter()
            .find(|p| p.party == "Labour")
            .unwrap();
        assert_eq!(labour.percentages, vec![4.99]);
        let tories = analysis
            .parties
            .iter()
            .find(|p| p.party == "Conservative")
            .unwrap();
        assert_eq!(tories.percentages, vec![2.0]);
    }

    #[test]
    fn compares_two_documents() {
        let a = analyze_document(&doc(1, "Labour proposes a 4% council tax rise."));
        let b = analyze_document(&doc(2, "Labour proposes a 2% council tax rise."));
        let comparison = compare_analyses(&a, &b);
        let labour = comparison
            .parties
            .iter()
            .find(|p| p.party == "Labour")
            .unwrap();
        assert_eq!(labour.mean_percentage_delta, Some(-2.0));
    }

    #[test]
    fn digest_mentions_parties_and_figures() {
        let digest = prompt_digest("Labour proposes a 4.99% council tax rise.");
        assert!(digest.contains("Council tax changes"));
        assert!(digest.contains("Labour"));
        assert!(digest.contains("4.99"));
    }
}
