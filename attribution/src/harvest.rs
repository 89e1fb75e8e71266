use std::io::BufRead;

use crate::queue::QueryMetadataEntry;

/// Field index that, when purely numeric, pushes the query text one column
/// to the right.
const SHIFT_FIELD: usize = 4;

/// The query text of one comma-delimited log record, or `None` when the
/// record has too few fields to carry a query.
pub fn query_text(record: &str) -> Option<&str> {
    let record = record.trim_end_matches(['\n', '\r']);
    let shift = record
        .split(',')
        .nth(SHIFT_FIELD)
        .is_some_and(|field| !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit()));
    let column = if shift { SHIFT_FIELD + 1 } else { SHIFT_FIELD };
    record.splitn(column + 1, ',').nth(column)
}

fn is_select_shaped(query: &str) -> bool {
    query.to_ascii_lowercase().contains("select")
}

/// Turn the records of a Level 1 segment into NOT PARSED queue entries with
/// ids starting at `first_id`. Records without a SELECT-shaped query are
/// skipped.
pub fn harvest<R: BufRead>(input: R, first_id: u64) -> std::io::Result<Vec<QueryMetadataEntry>> {
    let mut entries = Vec::new();
    let mut next_id = first_id;
    for line in input.lines() {
        let line = line?;
        let Some(query) = query_text(&line) else {
            tracing::debug!("skipping record without a query field: {line}");
            continue;
        };
        if !is_select_shaped(query) {
            continue;
        }
        entries.push(QueryMetadataEntry::new(next_id, query));
        next_id += 1;
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueryState;
    use pretty_assertions::assert_eq;

    #[test]
    fn numeric_fifth_field_shifts_query() {
        assert_eq!(
            query_text("12,x,y,z,5,select a,b from dim_cell_1"),
            Some("select a,b from dim_cell_1")
        );
        assert_eq!(
            query_text("12,x,y,z,select a,b from dim_cell_1"),
            Some("select a,b from dim_cell_1")
        );
        assert_eq!(
            query_text("12,x,y,z,5a,select a from t"),
            Some("5a,select a from t")
        );
        assert_eq!(query_text("12,x,y"), None);
    }

    #[test]
    fn harvest_assigns_sequential_ids() -> anyhow::Result<()> {
        let input = "\
12,x,y,z,5,select a,b from dim_cell_1
13,x,y,z,insert into t values (1)
14,x,y,z,SELECT * from dc_e_rrc_cell_raw
short,line
";
        let entries = harvest(input.as_bytes(), 41)?;
        assert_eq!(
            entries,
            vec![
                QueryMetadataEntry::new(41, "select a,b from dim_cell_1"),
                QueryMetadataEntry::new(42, "SELECT * from dc_e_rrc_cell_raw"),
            ]
        );
        assert!(entries.iter().all(|e| e.state == QueryState::NotParsed));
        Ok(())
    }
}
