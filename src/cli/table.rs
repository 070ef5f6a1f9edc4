//! Table formatting for CLI list commands

use console::style;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::escape_csv;
use crate::cli::OutputFormat;

/// Rows collected for one list command
pub struct TableOutput {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
    noun: &'static str,
}

impl TableOutput {
    /// `noun` names one row in the summary line, e.g. "event"
    pub fn new(headers: &[&'static str], noun: &'static str) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
            noun,
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Print the rows; `quiet` drops the summary line
    pub fn print(&self, format: OutputFormat, quiet: bool) {
        match format {
            OutputFormat::Tsv => {
                println!("{}", self.headers.join("\t"));
                for row in &self.rows {
                    println!("{}", row.join("\t"));
                }
            }
            OutputFormat::Csv => {
                println!("{}", self.headers.join(","));
                for row in &self.rows {
                    let cells: Vec<String> = row.iter().map(|c| escape_csv(c)).collect();
                    println!("{}", cells.join(","));
                }
            }
            OutputFormat::Id => {
                for row in &self.rows {
                    if let Some(first) = row.first() {
                        println!("{}", first);
                    }
                }
            }
            OutputFormat::Md => println!("{}", self.build(true)),
            _ => {
                if self.rows.is_empty() {
                    println!("No {}s found", self.noun);
                    return;
                }
                println!("{}", self.build(false));
                if !quiet {
                    println!(
                        "{} {}(s) found",
                        style(self.rows.len()).cyan(),
                        self.noun
                    );
                }
            }
        }
    }

    fn build(&self, markdown: bool) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.headers.iter().copied());
        for row in &self.rows {
            builder.push_record(row.iter().map(String::as_str));
        }
        let mut table = builder.build();
        if markdown {
            table.with(Style::markdown());
        } else {
            table.with(Style::sharp());
        }
        table.to_string()
    }
}
