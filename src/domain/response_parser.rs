use std::sync::LazyLock;

use itertools::Itertools;
use regex::{Captures, Regex};
use url::Url;

use super::lead::CompanyLead;

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*").expect("valid bold regex"));

// `__text__` or `*text*` opening at a word boundary, so `my__page` in a URL stays intact.
static WRAPPED_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(^|[\s(\[])(?:__(\S|\S[^\n]*?\S)__|\*(\S|\S[^*\n]*?\S)\*)([^\w]|$)")
        .expect("valid wrapped emphasis regex")
});

static NUMBERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\d+\.[ \t]+").expect("valid numbered item regex"));

// A label is followed by a colon, a spaced dash, whitespace, or nothing at all.
// Bare whitespace only counts for the lead fields themselves, see `labeled_line`.
static LABELED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[\s\-•*]*(company\s+name|country|website|brief\s+description|description|email|phone|contact|address)(\s*:|\s+[-–](?:\s|$)|\s+|$)\s*(.*)$",
    )
    .expect("valid labeled line regex")
});

static INLINE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(country|website|brief\s+description|description|email|phone|contact|address)\s*:[ \t]*",
    )
    .expect("valid inline label regex")
});

static INLINE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s[-–]\s|[|;]").expect("valid inline separator regex"));

static STRUCTURAL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:#.*|-{3,}\s*|part\s*\d+\b.*)$").expect("valid structural line regex")
});

static ABSOLUTE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://[\w.-]+[\w/#?&=.%+~:@-]*").expect("valid url regex")
});

/// Turns the completion service's free-text answer into leads.
pub trait ResponseParser: Send + Sync {
    fn parse(&self, answer: &str) -> Vec<CompanyLead>;
}

/// Best-effort extraction from numbered, loosely labelled company listings.
///
/// Blocks without a usable company name are dropped without notice. Label
/// text at the start of a description line is taken as that field, and a
/// description line that itself starts with `N. ` splits the block. A
/// `Country:` or `Website:` written anywhere in a block is used when no line
/// starts with that label, even when it sits inside the description.
#[derive(Debug, Clone)]
pub struct HeuristicResponseParser {
    source_label: String,
}

impl HeuristicResponseParser {
    pub fn new(source_label: impl Into<String>) -> Self {
        HeuristicResponseParser {
            source_label: source_label.into(),
        }
    }
}

impl ResponseParser for HeuristicResponseParser {
    fn parse(&self, answer: &str) -> Vec<CompanyLead> {
        let leads: Vec<CompanyLead> = split_company_blocks(answer)
            .into_iter()
            .filter_map(|block| parse_company_block(&block, &self.source_label))
            .collect();

        log::info!(
            "Parsed {} companies: {:?}",
            leads.len(),
            leads.iter().map(|l| l.company_name.as_str()).collect::<Vec<_>>()
        );

        leads
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    CompanyName,
    Country,
    Website,
    Description,
    Other,
}

fn field_from_label(label: &str) -> Field {
    let label = label.to_lowercase();
    if label.starts_with("company") {
        Field::CompanyName
    } else if label == "country" {
        Field::Country
    } else if label == "website" {
        Field::Website
    } else if label.ends_with("description") {
        Field::Description
    } else {
        Field::Other
    }
}

fn labeled_line(line: &str) -> Option<(Field, &str)> {
    let captures = LABELED_LINE.captures(line)?;
    let field = field_from_label(captures.get(1)?.as_str());
    let separator = captures.get(2).map_or("", |m| m.as_str());
    if field == Field::Other && !separator.is_empty() && separator.trim().is_empty() {
        return None;
    }

    let value = captures.get(3).map_or("", |m| m.as_str()).trim();
    Some((field, value))
}

/// `Label: value` pairs found anywhere in `block`, each value running to the
/// end of its line.
fn inline_fields<'a>(block: &'a str) -> impl Iterator<Item = (Field, &'a str)> + 'a {
    INLINE_LABEL.captures_iter(block).filter_map(move |captures| {
        let label = captures.get(1)?.as_str();
        let rest = &block[captures.get(0)?.end()..];

        Some((field_from_label(label), rest.lines().next().unwrap_or("")))
    })
}

fn inline_value(block: &str, field: Field) -> Option<&str> {
    inline_fields(block)
        .find(|(found, _)| *found == field)
        .map(|(_, value)| value)
}

fn is_structural(line: &str) -> bool {
    STRUCTURAL_LINE.is_match(line)
}

pub fn strip_emphasis(text: &str) -> String {
    let text = BOLD.replace_all(text, "");

    WRAPPED_EMPHASIS
        .replace_all(&text, |captures: &Captures| {
            let inner = captures.get(2).or_else(|| captures.get(3));
            format!(
                "{}{}{}",
                &captures[1],
                inner.map_or("", |m| m.as_str()),
                &captures[4]
            )
        })
        .into_owned()
}

/// Splits at numbered-list boundaries. When the text is numbered, whatever
/// precedes the first item is preamble and is not returned.
pub fn split_company_blocks(answer: &str) -> Vec<String> {
    let text = strip_emphasis(answer);
    let numbered = NUMBERED_ITEM.is_match(&text);

    NUMBERED_ITEM
        .split(&text)
        .skip(usize::from(numbered))
        .filter(|block| !block.trim().is_empty())
        .map(|block| block.to_string())
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    match value.is_empty() {
        true => None,
        false => Some(value.to_string()),
    }
}

pub fn extract_first_url(text: &str) -> Option<String> {
    let candidate = ABSOLUTE_URL.find(text)?.as_str();
    let candidate = candidate.trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);

    match Url::parse(candidate) {
        Ok(url) if url.has_host() => Some(candidate.to_string()),
        _ => None,
    }
}

fn strip_bullet(line: &str) -> &str {
    line.trim().trim_start_matches(['-', '•', '*']).trim()
}

fn clean_description(lines: &[&str]) -> Option<String> {
    let description = lines
        .iter()
        .map(|line| strip_bullet(line))
        .filter(|line| !line.is_empty())
        .join("\n");

    non_empty(&description)
}

/// The first non-empty line when it carries no label of its own.
fn unlabeled_line<'a>(lines: &[&'a str]) -> Option<&'a str> {
    let line = *lines.iter().find(|line| !line.trim().is_empty())?;
    match labeled_line(line).is_some() || is_structural(line) {
        true => None,
        false => Some(line),
    }
}

fn fallback_company_name(block: &str) -> Option<String> {
    let first_line = unlabeled_line(&block.lines().collect::<Vec<_>>())?;
    let name = match INLINE_LABEL.find(first_line) {
        Some(label) => &first_line[..label.start()],
        None => first_line,
    };

    non_empty(name.trim().trim_end_matches([' ', '-', '–', '|', ',', ';', ':']))
}

pub fn parse_company_block(block: &str, source_label: &str) -> Option<CompanyLead> {
    let lines: Vec<&str> = block.lines().collect();

    let mut company_name = None;
    let mut company_country = None;
    let mut website_url = None;
    let mut description = None;

    let mut index = 0;
    while index < lines.len() {
        let Some((field, value)) = labeled_line(lines[index]) else {
            index += 1;
            continue;
        };

        match field {
            Field::CompanyName if company_name.is_none() => {
                company_name = non_empty(value).or_else(|| {
                    unlabeled_line(&lines[index + 1..]).and_then(|line| non_empty(strip_bullet(line)))
                })
            }
            Field::Country if company_country.is_none() => company_country = non_empty(value),
            Field::Website if website_url.is_none() => website_url = extract_first_url(value),
            Field::Description => {
                let mut description_lines = vec![value];
                let mut next = index + 1;
                while next < lines.len()
                    && labeled_line(lines[next]).is_none()
                    && !is_structural(lines[next])
                {
                    description_lines.push(lines[next]);
                    next += 1;
                }

                if description.is_none() {
                    description = clean_description(&description_lines);
                }
                index = next;
                continue;
            }
            _ => {}
        }
        index += 1;
    }

    if company_country.is_none() {
        company_country = inline_value(block, Field::Country)
            .and_then(|rest| INLINE_SEPARATOR.split(rest).next())
            .and_then(non_empty);
    }
    if website_url.is_none() {
        website_url = inline_value(block, Field::Website).and_then(extract_first_url);
    }

    let company_name = company_name.or_else(|| fallback_company_name(block))?;

    Some(CompanyLead {
        company_name,
        company_country,
        website_url,
        description,
        source_label: source_label.to_string(),
    })
}
