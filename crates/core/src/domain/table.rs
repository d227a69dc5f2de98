use crate::error::{PipelineError, PipelineResult};

/// Untyped, string-valued table as handed over by a spreadsheet or a query.
///
/// Rows may be shorter than the header: the Sheets API drops trailing empty
/// cells, so a missing cell reads as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Builds a table whose first row is the header.
    pub fn from_rows_with_header(mut rows: Vec<Vec<String>>) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        let columns = rows.remove(0).into_iter().map(|c| c.trim().to_string()).collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> PipelineResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| PipelineError::missing_column(name))
    }

    pub fn cell(&self, row: usize, idx: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Keeps only `names`, in the given order.
    pub fn project(&self, names: &[&str]) -> PipelineResult<RawTable> {
        let indices = names
            .iter()
            .map(|name| self.column_index(name))
            .collect::<PipelineResult<Vec<_>>>()?;

        let rows = (0..self.rows.len())
            .map(|r| indices.iter().map(|&i| self.cell(r, i).to_string()).collect())
            .collect();

        Ok(RawTable {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn project_reorders_and_pads_short_rows() {
        let table = RawTable::new(
            s(&["A", "B", "C"]),
            vec![s(&["1", "2", "3"]), s(&["4"])],
        );
        let projected = table.project(&["C", "A"]).unwrap();
        assert_eq!(projected.columns, s(&["C", "A"]));
        assert_eq!(projected.rows, vec![s(&["3", "1"]), s(&["", "4"])]);
    }

    #[test]
    fn project_reports_missing_column() {
        let table = RawTable::new(s(&["A"]), vec![]);
        let err = table.project(&["A", "Stock"]).unwrap_err();
        assert_eq!(err, PipelineError::missing_column("Stock"));
    }

    #[test]
    fn header_row_is_split_off() {
        let table = RawTable::from_rows_with_header(vec![s(&[" Date ", "Type"]), s(&["x", "y"])]);
        assert_eq!(table.columns, s(&["Date", "Type"]));
        assert_eq!(table.len(), 1);
        assert!(RawTable::from_rows_with_header(vec![]).is_empty());
    }
}
