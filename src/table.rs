//! Tab-separated tables and the bracket-sectioned text layout GEO uses for
//! platform and non-normalized data files.

use std::fs;

use camino::Utf8Path;

use crate::error::KiraError;

/// Section parsed without a header row.
pub const HEADERLESS_SECTION: &str = "Heading";

/// Ordered column names plus a row-major grid of cells.
///
/// Headerless tables carry positional labels `0..n` as column names and
/// `has_header == false`; those labels are never written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub has_header: bool,
}

impl Table {
    pub fn from_lines<'a, I>(name: &str, lines: I, has_header: bool) -> Result<Self, KiraError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut rows = lines
            .into_iter()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .map(split_row);

        if has_header {
            let columns = rows
                .next()
                .ok_or_else(|| KiraError::Format(format!("section {name} has no header row")))?;
            let width = columns.len();
            let rows = rows
                .enumerate()
                .map(|(index, row)| fit_row(name, row, width, index + 2))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self {
                name: name.to_string(),
                columns,
                rows,
                has_header: true,
            });
        }

        let mut rows: Vec<Vec<String>> = rows.collect();
        if rows.is_empty() {
            return Err(KiraError::Format(format!("section {name} has no rows")));
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
        Ok(Self {
            name: name.to_string(),
            columns: (0..width).map(|index| index.to_string()).collect(),
            rows,
            has_header: false,
        })
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Removes `columns`; every one of them must be present.
    pub fn drop_columns(&self, columns: &[&str]) -> Result<Table, KiraError> {
        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|column| self.column_index(column).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(KiraError::Schema(format!(
                "{} lacks {}",
                self.name,
                missing.join(", ")
            )));
        }

        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|index| !columns.contains(&self.columns[*index].as_str()))
            .collect();
        Ok(Table {
            name: self.name.clone(),
            columns: keep.iter().map(|index| self.columns[*index].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|index| row[*index].clone()).collect())
                .collect(),
            has_header: self.has_header,
        })
    }

    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        if self.has_header {
            out.push_str(&self.columns.join("\t"));
            out.push('\n');
        }
        for row in &self.rows {
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out
    }
}

/// Splits sectioned text into tables, one per `[Name]` marker, in the order
/// sections first appear. A repeated name replaces the earlier table in place.
pub fn parse_sections(text: &str) -> Result<Vec<Table>, KiraError> {
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
    for line in text.lines() {
        if line.starts_with('[') {
            let name = section_name(line)?;
            sections.push((name, Vec::new()));
            continue;
        }
        if let Some((_, lines)) = sections.last_mut() {
            lines.push(line);
        }
    }

    let mut tables: Vec<Table> = Vec::new();
    for (name, lines) in sections {
        let has_header = name != HEADERLESS_SECTION;
        let table = Table::from_lines(&name, lines, has_header)?;
        match tables.iter_mut().find(|existing| existing.name == name) {
            Some(existing) => *existing = table,
            None => tables.push(table),
        }
    }
    Ok(tables)
}

pub fn read_sections(path: &Utf8Path) -> Result<Vec<Table>, KiraError> {
    let text = read_text(path)?;
    parse_sections(&text).map_err(|err| match err {
        KiraError::Format(message) => KiraError::Format(format!("{path}: {message}")),
        other => other,
    })
}

/// Loads a TSV file whose first line is the header.
pub fn read_tsv(path: &Utf8Path) -> Result<Table, KiraError> {
    let text = read_text(path)?;
    let name = path.file_stem().unwrap_or(path.as_str());
    Table::from_lines(name, text.lines(), true)
        .map_err(|err| match err {
            KiraError::Format(message) => KiraError::Format(format!("{path}: {message}")),
            other => other,
        })
}

pub fn write_tsv(table: &Table, path: &Utf8Path) -> Result<(), KiraError> {
    fs::write(path.as_std_path(), table.to_tsv())
        .map_err(|err| KiraError::Filesystem(format!("write {path}: {err}")))
}

/// Reads a text file; bytes that are not UTF-8 are bad input, not an I/O failure.
fn read_text(path: &Utf8Path) -> Result<String, KiraError> {
    let bytes = fs::read(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("read {path}: {err}")))?;
    String::from_utf8(bytes).map_err(|_| KiraError::Format(format!("{path}: not valid UTF-8")))
}

fn section_name(line: &str) -> Result<String, KiraError> {
    let name = line
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();
    if name.is_empty() {
        return Err(KiraError::Format(format!("empty section marker: {line:?}")));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(KiraError::Format(format!(
            "section name is not a valid file name: {name:?}"
        )));
    }
    Ok(name.to_string())
}

fn split_row(line: &str) -> Vec<String> {
    let mut cells: Vec<String> = line.split('\t').map(str::to_string).collect();
    while cells.len() > 1 && cells.last().is_some_and(|cell| cell.is_empty()) {
        cells.pop();
    }
    cells
}

fn fit_row(
    section: &str,
    mut row: Vec<String>,
    width: usize,
    line: usize,
) -> Result<Vec<String>, KiraError> {
    if row.len() > width {
        return Err(KiraError::Format(format!(
            "section {section}, row {line}: expected {width} fields, saw {}",
            row.len()
        )));
    }
    row.resize(width, String::new());
    Ok(row)
}
