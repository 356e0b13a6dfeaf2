//! Minimal CSV encoding for report rows, and a reader for reports we wrote.

/// Escape one field.
///
/// Fields containing a double quote, comma or line break are quoted with
/// inner quotes doubled; an absent field renders as `""`.
pub fn escape_field(field: Option<&str>) -> String {
    match field {
        None => "\"\"".to_string(),
        Some(value) if value.contains(['"', ',', '\n', '\r']) => {
            format!("\"{}\"", value.replace('"', "\"\""))
        }
        Some(value) => value.to_string(),
    }
}

/// Join escaped fields into one line, without the line terminator
pub fn format_row<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    fields
        .into_iter()
        .map(escape_field)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a CSV document into rows of fields.
///
/// Quoted fields may span lines and contain doubled quotes. A blank line
/// yields a row with a single empty field.
pub fn parse_document(input: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            // Quotes open a quoted field only at its start
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

#[cfg(test)]
#[path = "csv_test.rs"]
mod csv_test;
