use crate::model::{Rejection, ValidationResult};
use chrono::{Local, NaiveDate, Utc};
use reconcile_core::config::{DateBasis, NamingConfig};

const EXPECTED_PARTS: usize = 3;
const DATE_LEN: usize = 8;
const DATE_FORMAT: &str = "%Y%m%d";

/// `<prefix>_<identifier>_<YYYYMMDD><suffix>`, e.g.
/// `FundTransferMerchantReconcile_20250130_20250130.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNamePattern {
    prefix: String,
    suffix: String,
}

impl FileNamePattern {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn from_config(config: &NamingConfig) -> Self {
        Self::new(&config.prefix, &config.suffix)
    }

    /// Length of the trailing `<date><suffix>` segment.
    pub fn dated_segment_len(&self) -> usize {
        DATE_LEN + self.suffix.len()
    }

    /// Applies the naming rules in order and reports the first one broken.
    pub fn validate(&self, name: &str, today: NaiveDate) -> ValidationResult {
        match self.check(name, today) {
            Ok(()) => ValidationResult::Accepted,
            Err(reason) => ValidationResult::Rejected(reason),
        }
    }

    fn check(&self, name: &str, today: NaiveDate) -> Result<(), Rejection> {
        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() != EXPECTED_PARTS {
            return Err(Rejection::InvalidFormat {
                expected: EXPECTED_PARTS,
                found: parts.len(),
            });
        }

        if parts[0] != self.prefix {
            return Err(Rejection::InvalidPrefix {
                expected: self.prefix.clone(),
                found: parts[0].to_string(),
            });
        }

        if parts[1].is_empty() {
            return Err(Rejection::EmptyDate);
        }

        let dated = parts[2];
        if dated.len() != self.dated_segment_len() || !dated.ends_with(&self.suffix) {
            return Err(Rejection::InvalidSuffix {
                expected: self.suffix.clone(),
                found: dated.to_string(),
            });
        }

        let found = parse_date(dated).ok_or_else(|| Rejection::InvalidDate {
            value: dated.get(..DATE_LEN).unwrap_or(dated).to_string(),
        })?;

        if found != today {
            return Err(Rejection::DateMismatch {
                expected: today,
                found,
            });
        }

        Ok(())
    }

    /// Name of the file expected for `date` in templated mode.
    pub fn template(&self, identifier: &str, date: NaiveDate) -> String {
        format!(
            "{}_{}_{}{}",
            self.prefix,
            identifier,
            date.format(DATE_FORMAT),
            self.suffix
        )
    }
}

fn parse_date(segment: &str) -> Option<NaiveDate> {
    let digits = segment.get(..DATE_LEN)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(digits, DATE_FORMAT).ok()
}

/// The processing date for a run, evaluated once.
pub fn today(basis: DateBasis) -> NaiveDate {
    match basis {
        DateBasis::Utc => Utc::now().date_naive(),
        DateBasis::Local => Local::now().date_naive(),
    }
}
