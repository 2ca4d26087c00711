//! Acquisition windows and timestamp parsing.

use chrono::NaiveDateTime;

use super::{NamingConvention, ProductError};

/// Compact timestamp format used in identifiers (`20170608T100435`).
pub const COMPACT_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Parse a timestamp in compact or ISO-8601 form.
///
/// `-`, `:` and a trailing `Z` are ignored, as is any fractional second, so
/// `2015-12-01T00:00:00.000Z` and `20151201T000000` are equivalent.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let compact: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | ':' | 'Z' | 'z'))
        .collect();
    let compact = compact.split('.').next().unwrap_or_default();
    NaiveDateTime::parse_from_str(compact, COMPACT_TIME_FORMAT).ok()
}

/// Format a timestamp the way identifiers carry it.
pub fn format_compact(time: &NaiveDateTime) -> String {
    time.format(COMPACT_TIME_FORMAT).to_string()
}

/// Sensing interval of a source product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AcquisitionWindow {
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
}

impl AcquisitionWindow {
    /// Parse the window out of a product identifier.
    ///
    /// # Arguments
    ///
    /// * `identifier` - Product directory name
    /// * `convention` - Layout the identifier follows
    pub fn parse(identifier: &str, convention: NamingConvention) -> Result<Self, ProductError> {
        let layout = convention.layout();
        let field = |range: std::ops::Range<usize>| {
            identifier
                .get(range)
                .and_then(parse_timestamp)
                .ok_or_else(|| ProductError::InvalidIdentifier {
                    identifier: identifier.to_string(),
                    reason: format!("no {} acquisition time", convention.as_str()),
                })
        };
        let start = field(layout.window_start.clone())?;
        let stop = field(layout.window_stop.clone())?;
        Ok(Self { start, stop })
    }

    /// Whether the window overlaps `[min, max]` (inclusive).
    pub fn intersects(&self, min: &NaiveDateTime, max: &NaiveDateTime) -> bool {
        self.start <= *max && self.stop >= *min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = NaiveDateTime::parse_from_str("20151201T000000", COMPACT_TIME_FORMAT).unwrap();
        assert_eq!(parse_timestamp("20151201T000000"), Some(expected));
        assert_eq!(parse_timestamp("2015-12-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2015-12-01T00:00:00.000Z"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(&t("2017-06-08T10:04:35Z")), "20170608T100435");
    }

    #[test]
    fn test_parse_standard_window() {
        let id = "S2A_USER_PRD_MSIL2A_PDMC_20160615T123456_R022_V20160614T101032_20160615T101032.SAFE";
        let window = AcquisitionWindow::parse(id, NamingConvention::Standard).unwrap();
        assert_eq!(window.start, t("20160614T101032"));
        assert_eq!(window.stop, t("20160615T101032"));
    }

    #[test]
    fn test_parse_compact_window_is_instant() {
        let id = "S2A_MSIL2A_20170608T100431_N0205_R122_T32TQM_20170608T100435.SAFE";
        let window = AcquisitionWindow::parse(id, NamingConvention::Compact).unwrap();
        assert_eq!(window.start, window.stop);
        assert_eq!(window.start, t("20170608T100435"));
    }

    #[test]
    fn test_parse_short_identifier_fails() {
        let err = AcquisitionWindow::parse("S2A_MSIL2A_2017", NamingConvention::Compact).unwrap_err();
        assert!(matches!(err, ProductError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_intersects() {
        let window = AcquisitionWindow {
            start: t("20170601T000000"),
            stop: t("20170610T000000"),
        };
        assert!(window.intersects(&t("20170605T000000"), &t("20170620T000000")));
        assert!(window.intersects(&t("20170610T000000"), &t("20170620T000000")));
        assert!(!window.intersects(&t("20170611T000000"), &t("20170620T000000")));
        assert!(!window.intersects(&t("20170101T000000"), &t("20170531T235959")));
    }
}
