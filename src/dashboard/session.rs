//! Line commands of the interactive session.

use std::str::FromStr;

use crate::chart::ChartKind;
use crate::dashboard::Selection;
use crate::processor::{AggregateOp, ProcessorError};

pub const HELP: &str = "\
commands:
  rows a,b        set the row fields (empty to clear)
  columns a,b     set the column fields
  values a,b      set the value fields to aggregate
  agg OP          count | sum | mean | min | max
  chart KIND      bar | line | scatter | heatmap
  show            re-render the current selection
  fields          list the dataset columns
  help            this text
  quit            leave the session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Rows(Vec<String>),
    Columns(Vec<String>),
    Values(Vec<String>),
    Agg(AggregateOp),
    Chart(ChartKind),
    Show,
    Fields,
    Help,
    Quit,
}

impl SessionCommand {
    /// Applies a selection change. Returns `false` for commands that do not
    /// touch the selection.
    pub fn apply(&self, selection: &mut Selection) -> bool {
        match self {
            SessionCommand::Rows(fields) => selection.rows = fields.clone(),
            SessionCommand::Columns(fields) => selection.columns = fields.clone(),
            SessionCommand::Values(fields) => selection.values = fields.clone(),
            SessionCommand::Agg(op) => selection.aggfunc = *op,
            SessionCommand::Chart(kind) => selection.chart = *kind,
            SessionCommand::Show
            | SessionCommand::Fields
            | SessionCommand::Help
            | SessionCommand::Quit => return false,
        }
        true
    }
}

/// Splits a comma separated field list, dropping blanks.
pub fn parse_field_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect()
}

impl FromStr for SessionCommand {
    type Err = ProcessorError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match word.to_ascii_lowercase().as_str() {
            "rows" => SessionCommand::Rows(parse_field_list(rest)),
            "columns" | "cols" => SessionCommand::Columns(parse_field_list(rest)),
            "values" => SessionCommand::Values(parse_field_list(rest)),
            "agg" | "aggfunc" => SessionCommand::Agg(rest.parse()?),
            "chart" => SessionCommand::Chart(rest.parse()?),
            "show" => SessionCommand::Show,
            "fields" => SessionCommand::Fields,
            "help" | "?" => SessionCommand::Help,
            "quit" | "exit" | "q" => SessionCommand::Quit,
            "" => return Err(ProcessorError::Parse("empty command".into())),
            other => {
                return Err(ProcessorError::Parse(format!(
                    "unknown command '{other}', type 'help'"
                )));
            }
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "rows region, category".parse::<SessionCommand>().unwrap(),
            SessionCommand::Rows(vec!["region".into(), "category".into()])
        );
        assert_eq!(
            "columns".parse::<SessionCommand>().unwrap(),
            SessionCommand::Columns(vec![])
        );
        assert_eq!(
            "AGG avg".parse::<SessionCommand>().unwrap(),
            SessionCommand::Agg(AggregateOp::Mean)
        );
        assert_eq!(
            "chart heatmap".parse::<SessionCommand>().unwrap(),
            SessionCommand::Chart(ChartKind::Heatmap)
        );
        assert_eq!("  quit ".parse::<SessionCommand>().unwrap(), SessionCommand::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<SessionCommand>().is_err());
        assert!("pivot now".parse::<SessionCommand>().is_err());
        assert!("agg median".parse::<SessionCommand>().is_err());
        assert!("chart pie".parse::<SessionCommand>().is_err());
    }

    #[test]
    fn test_apply() {
        let mut selection = Selection::default();
        assert!(SessionCommand::Values(vec!["sales".into()]).apply(&mut selection));
        assert!(SessionCommand::Agg(AggregateOp::Sum).apply(&mut selection));
        assert!(!SessionCommand::Show.apply(&mut selection));
        assert_eq!(selection.values, vec!["sales"]);
        assert_eq!(selection.aggfunc, AggregateOp::Sum);
        assert_eq!(selection.chart, ChartKind::Bar);
    }
}
