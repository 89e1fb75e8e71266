//! Classification of the projection list and the FROM span of one
//! normalized candidate.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::dictionary::Dictionaries;
use crate::normalize::compile_regex;
use crate::normalize::find_word;

static WILDCARD: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"^(?:\*|count\b|top\s+\d+\s*\*)"));
static ALIAS_CLAUSE: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"\s+as\s+[a-z0-9_]+"));
static DECIMAL: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"\d+\.\d+"));
static REMOVED_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r"\b(?:distinct|count|results?|end|substring|charindex|yyyy-mm-dd)\b|[{}]")
});
static SPACED_WORDS: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\b(?:in|null|then)\b|\*"));
static SEPARATOR_WORDS: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\b(?:ifnull|else)\b|[-/]"));

/// Words that end a table reference in the FROM span rather than alias it.
const FROM_KEYWORDS: &[&str] = &[
    "as", "on", "join", "inner", "left", "right", "outer", "full", "cross", "natural", "using",
    "where", "group", "order", "having", "with", "noholdlock", "limit",
];

/// Clauses that close the FROM span.
const FROM_TERMINATORS: &[&str] = &["where", "group", "order", "having"];

/// One comma-separated item of the projection list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionItem {
    /// Empty, or only digits and operators.
    Skip,
    /// A `case ... when` expression; its operands are not attributed.
    CaseMarker,
    /// `a + b`: each operand is resolved on its own.
    Sum(Vec<String>),
    /// `alias.column`.
    Qualified { qualifier: String, column: String },
    /// One or more bare words resolved against the single table of the
    /// FROM span.
    Bare(Vec<String>),
}

/// Lower-cased identifier words of `text`, dotted names kept whole and pure
/// numbers dropped.
pub fn identifier_words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        .map(|w| w.trim_matches('.'))
        .filter(|w| !w.is_empty() && !w.bytes().all(|b| b.is_ascii_digit() || b == b'.'))
        .map(str::to_lowercase)
        .collect()
}

pub fn classify(item: &str) -> ProjectionItem {
    let item = item.trim();
    let words = identifier_words(item);
    if words.is_empty() {
        return ProjectionItem::Skip;
    }
    if words.iter().any(|w| w == "case") && words.iter().any(|w| w == "when") {
        return ProjectionItem::CaseMarker;
    }
    if item.contains('+') {
        let operands = item
            .split('+')
            .map(str::trim)
            .filter(|op| !op.is_empty())
            .map(str::to_string)
            .collect();
        return ProjectionItem::Sum(operands);
    }
    if let Some(dotted) = words.iter().find(|w| w.contains('.'))
        && let Some((qualifier, column)) = dotted.split_once('.')
    {
        return ProjectionItem::Qualified {
            qualifier: qualifier.to_string(),
            column: column.to_string(),
        };
    }
    ProjectionItem::Bare(words)
}

/// Whether `select <projection>` counts as reading every column: it opens
/// with `*`, `top <n> *` or any `count` expression. Takes the projection
/// before parentheses are stripped, so `count(a)` is still seen as `count`.
pub fn is_wildcard(projection: &str) -> bool {
    WILDCARD.is_match(projection.trim())
}

/// The text between `select` and `from`.
pub fn projection_span(candidate: &str) -> &str {
    let start = find_word(candidate, "select").map_or(0, |idx| idx + "select".len());
    let rest = &candidate[start..];
    let end = find_word(rest, "from").unwrap_or(rest.len());
    rest[..end].trim()
}

/// The text between `from` and the first clause that closes it.
pub fn from_span(candidate: &str) -> &str {
    let Some(from) = find_word(candidate, "from") else {
        return "";
    };
    let rest = &candidate[from + "from".len()..];
    let end = FROM_TERMINATORS
        .iter()
        .filter_map(|kw| find_word(rest, kw))
        .min()
        .unwrap_or(rest.len());
    rest[..end].trim()
}

/// Split the projection list into items after removing decorative tokens,
/// `as` aliases and decimal multipliers.
pub fn projection_items(projection: &str) -> Vec<String> {
    let text = ALIAS_CLAUSE.replace_all(projection, "");
    let text = DECIMAL.replace_all(&text, "");
    let text = REMOVED_WORDS.replace_all(&text, "");
    let text = SEPARATOR_WORDS.replace_all(&text, ",");
    let text = SPACED_WORDS.replace_all(&text, " ");
    text.split(',')
        .map(|item| item.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}

/// The words of the FROM span with commas kept as their own tokens.
fn from_tokens(span: &str) -> Vec<String> {
    span.replace(',', " , ")
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

/// Table references of one FROM span: which alias (or bare table name)
/// stands for which upper-cased table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    tables: HashMap<String, String>,
}

impl AliasMap {
    /// Recognizes `table alias`, `table as alias` and
    /// `join table alias on ...`.
    pub fn from_span(span: &str, dict: &Dictionaries) -> Self {
        let tokens = from_tokens(span);
        let mut tables = HashMap::new();
        for (idx, token) in tokens.iter().enumerate() {
            if !dict.mentions_table(token) {
                continue;
            }
            let table = token.to_uppercase();
            tables.insert(token.clone(), table.clone());

            let mut next = idx + 1;
            if tokens.get(next).is_some_and(|t| t == "as") {
                next += 1;
            }
            if let Some(alias) = tokens.get(next)
                && alias != ","
                && !FROM_KEYWORDS.contains(&alias.as_str())
                && !dict.mentions_table(alias)
            {
                tables.insert(alias.clone(), table);
            }
        }
        Self { tables }
    }

    pub fn resolve(&self, qualifier: &str) -> Option<&str> {
        self.tables.get(qualifier).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// The first table of interest named in the FROM span, upper-cased.
pub fn single_table(span: &str, dict: &Dictionaries) -> Option<String> {
    from_tokens(span)
        .into_iter()
        .find(|t| dict.is_included_table(t))
        .map(|t| t.to_uppercase())
}

/// Every distinct table of interest in the FROM span, upper-cased, in order.
pub fn included_tables(span: &str, dict: &Dictionaries) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    for token in from_tokens(span) {
        let table = token.to_uppercase();
        if dict.is_included_table(&token) && !tables.contains(&table) {
            tables.push(table);
        }
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dict() -> Dictionaries {
        Dictionaries::new(
            ["dc_e_rrc".to_string(), "dim_".to_string()],
            ["dim_".to_string()],
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn spans() {
        let candidate = "select a, b from dc_e_rrc_cell_raw t where t.x = 1 group by a";
        assert_eq!(projection_span(candidate), "a, b");
        assert_eq!(from_span(candidate), "dc_e_rrc_cell_raw t");
        assert_eq!(from_span("select a"), "");
        assert_eq!(
            from_span("select a from dc_e_rrc_cell_raw order by a"),
            "dc_e_rrc_cell_raw"
        );
    }

    #[test]
    fn wildcard_forms() {
        for projection in [
            "*",
            "count(*)",
            "count",
            "count(pma)",
            "count(1)",
            "count(distinct date_id)",
            "count(*), date_id",
            "top 10 *",
            " top 5 * ",
        ] {
            assert!(is_wildcard(projection), "{projection}");
        }
        for projection in ["a, *", "counter_a", "count_a", "countpma", "top 10 a"] {
            assert!(!is_wildcard(projection), "{projection}");
        }
    }

    #[test]
    fn projection_noise_is_removed() {
        assert_eq!(
            projection_items("distinct 0.08*pma as scaled, b/c, ifnull x else y end"),
            vec!["pma", "b", "c", "", "x", "y"]
        );
        assert_eq!(projection_items("date_id - 1"), vec!["date_id", "1"]);
        assert_eq!(projection_items("case when a in 1 then b"), vec!["case when a 1 b"]);
    }

    #[test]
    fn classifies_items() {
        assert_eq!(classify(""), ProjectionItem::Skip);
        assert_eq!(classify("42"), ProjectionItem::Skip);
        assert_eq!(classify("case when a 1 b"), ProjectionItem::CaseMarker);
        assert_eq!(
            classify("pma + pmb"),
            ProjectionItem::Sum(vec!["pma".to_string(), "pmb".to_string()])
        );
        assert_eq!(
            classify("t.pma"),
            ProjectionItem::Qualified {
                qualifier: "t".to_string(),
                column: "pma".to_string(),
            }
        );
        assert_eq!(
            classify("pma pmb"),
            ProjectionItem::Bare(vec!["pma".to_string(), "pmb".to_string()])
        );
    }

    #[test]
    fn alias_forms() {
        let dict = dict();
        let aliases = AliasMap::from_span(
            "dc_e_rrc_cell_raw c, dc_e_rrc_node_raw as n join dim_cell d on c.x = d.x",
            &dict,
        );
        assert_eq!(aliases.resolve("c"), Some("DC_E_RRC_CELL_RAW"));
        assert_eq!(aliases.resolve("n"), Some("DC_E_RRC_NODE_RAW"));
        assert_eq!(aliases.resolve("d"), Some("DIM_CELL"));
        assert_eq!(aliases.resolve("dc_e_rrc_cell_raw"), Some("DC_E_RRC_CELL_RAW"));
        assert_eq!(aliases.resolve("on"), None);

        let bare = AliasMap::from_span("dc_e_rrc_cell_raw", &dict);
        assert_eq!(bare.resolve("dc_e_rrc_cell_raw"), Some("DC_E_RRC_CELL_RAW"));
        assert!(AliasMap::from_span("other", &dict).is_empty());
    }

    #[test]
    fn table_selection_skips_excluded() {
        let dict = dict();
        let span = "dim_cell d, dc_e_rrc_cell_raw c, dc_e_rrc_cell_raw x";
        assert_eq!(single_table(span, &dict), Some("DC_E_RRC_CELL_RAW".to_string()));
        assert_eq!(included_tables(span, &dict), vec!["DC_E_RRC_CELL_RAW"]);
        assert_eq!(single_table("dim_cell", &dict), None);
    }
}
