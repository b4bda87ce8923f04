//! The results module owns presenting the decrypted passwords.

use crate::password::PasswordRecord;
use std::fmt::{self, Display};
use tabled::{Style, Table};

const TITLE: &str = "Windows Instances Password Data";

/// All passwords collected in one run, already sorted.
#[derive(Debug, Default)]
pub(crate) struct PasswordReport {
    pub(crate) records: Vec<PasswordRecord>,
}

impl PasswordReport {
    pub(crate) fn new(records: Vec<PasswordRecord>) -> Self {
        Self { records }
    }
}

impl Display for PasswordReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Nothing to show; the log already says why.
        if self.records.is_empty() {
            return Ok(());
        }
        let table = Table::new(&self.records).with(Style::modern()).to_string();
        writeln!(f, "{}", TITLE)?;
        writeln!(f, "{}", table)
    }
}
