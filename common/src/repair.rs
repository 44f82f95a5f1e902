use crate::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TableRows {
    pub table: Table,
    pub rows: usize,
}

/// Rows removed per table, or the rows that would be removed for a dry run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RepairSummary {
    pub dry_run: bool,
    pub match_count: usize,
    pub tables: Vec<TableRows>,
    pub total: usize,
}

impl RepairSummary {
    pub fn new(dry_run: bool, match_count: usize) -> Self {
        Self {
            dry_run,
            match_count,
            ..Default::default()
        }
    }

    pub fn record(&mut self, table: Table, rows: usize) {
        self.total += rows;
        match self.tables.iter_mut().find(|t| t.table == table) {
            Some(entry) => entry.rows += rows,
            None => self.tables.push(TableRows { table, rows }),
        };
    }

    pub fn rows(&self, table: Table) -> usize {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.rows)
            .unwrap_or(0)
    }
}
