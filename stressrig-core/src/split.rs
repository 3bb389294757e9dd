//! Whitespace field splitting for tabular command output

/// Field delimiters: space, tab, vertical tab and newline.
fn is_delimiter(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | 0x0b | b'\n')
}

/// Iterate over the whitespace-delimited fields of a raw line.
///
/// Runs of delimiters collapse into one, and leading or trailing
/// delimiters never yield empty fields.
pub fn fields(line: &[u8]) -> impl Iterator<Item = &[u8]> {
    line.split(|b| is_delimiter(*b)).filter(|f| !f.is_empty())
}

/// Split a raw line into owned fields.
///
/// Bytes that are not valid UTF-8 are replaced, mirroring how status
/// rows are later compared against resource identifiers.
pub fn split_fields(line: &[u8]) -> Vec<String> {
    fields(line)
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .collect()
}
