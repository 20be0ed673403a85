use std::io::{self, Read, Write};

use crate::models::{ListingRecord, UNAVAILABLE};
use crate::parsers::PriceSummary;

/// Records flattened into rows under the union of their field names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ListingTable {
    /// Columns appear in first-seen order; cells a record lacks render as `N/A`.
    pub fn from_records(records: &[ListingRecord]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for name in record.field_names() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| match record.get(column) {
                        Some(value) => value.to_string(),
                        None => UNAVAILABLE.to_string(),
                    })
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a str> + 'a> {
        let index = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(move |row| row.get(index).map(String::as_str).unwrap_or("")),
        )
    }

    /// Mean, min and max over the column's prices, skipping cells without digits.
    pub fn price_summary(&self, column: &str) -> Option<PriceSummary> {
        PriceSummary::from_raw(self.column(column)?)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> csv::Result<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Read a table back. Short rows are padded with `N/A`.
    pub fn read_csv<R: Read>(reader: R) -> csv::Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns: Vec<String> = rdr.headers()?.iter().map(String::from).collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(String::from).collect();
            row.resize(columns.len(), UNAVAILABLE.to_string());
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, ListingRecord};
    use pretty_assertions::assert_eq;

    fn record(fields: &[(&str, Option<&str>)]) -> ListingRecord {
        ListingRecord::from_fields(
            fields
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        Some(text) => FieldValue::Text(text.to_string()),
                        None => FieldValue::Unavailable,
                    };
                    (name.to_string(), value)
                })
                .collect(),
        )
    }

    #[test]
    fn columns_are_the_union_of_record_fields() {
        let records = vec![
            record(&[("title", Some("Studio")), ("price", Some("100 000 FCFA"))]),
            record(&[("title", Some("Villa")), ("surface", Some("300 m²"))]),
        ];
        let table = ListingTable::from_records(&records);

        assert_eq!(table.columns, vec!["title", "price", "surface"]);
        assert_eq!(table.rows[0], vec!["Studio", "100 000 FCFA", "N/A"]);
        assert_eq!(table.rows[1], vec!["Villa", "N/A", "300 m²"]);
    }

    #[test]
    fn writes_quoted_utf8_csv() {
        let table = ListingTable::from_records(&[record(&[
            ("title", Some("Appartement, vue \"mer\"")),
            ("address", None),
        ])]);

        assert_eq!(
            table.to_csv_string().unwrap(),
            "title,address\n\"Appartement, vue \"\"mer\"\"\",N/A\n"
        );
    }

    #[test]
    fn reads_back_what_it_writes() {
        let table = ListingTable::from_records(&[
            record(&[("title", Some("Chambre à Fann")), ("price", Some("75 000"))]),
            record(&[("title", Some("F4\nduplex")), ("price", None)]),
        ]);
        let csv = table.to_csv_string().unwrap();

        assert_eq!(ListingTable::read_csv(csv.as_bytes()).unwrap(), table);
    }

    #[test]
    fn short_rows_are_padded() {
        let table = ListingTable::read_csv("title,price\nStudio\n".as_bytes()).unwrap();
        assert_eq!(table.rows, vec![vec!["Studio".to_string(), "N/A".to_string()]]);
    }

    #[test]
    fn price_summary_skips_not_a_number() {
        let table = ListingTable::from_records(&[
            record(&[("price", Some("100 000 FCFA"))]),
            record(&[("price", None)]),
            record(&[("price", Some("200 000 FCFA"))]),
        ]);

        let summary = table.price_summary("price").unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.mean, 150_000.0);
        assert!(table.price_summary("surface").is_none());
    }
}
