use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpanError {
    #[error("span end {end} is not after start {start}")]
    Empty { start: NaiveDate, end: NaiveDate },
}

/// Half-open day range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSpan")]
pub struct DateSpan {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawSpan {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawSpan> for DateSpan {
    type Error = SpanError;

    fn try_from(raw: RawSpan) -> Result<Self, Self::Error> {
        DateSpan::new(raw.start, raw.end)
    }
}

impl DateSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, SpanError> {
        if end <= start {
            return Err(SpanError::Empty { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of whole days (nights) covered.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &DateSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// `max(0, min(a.end, b.end) - max(a.start, b.start))` in days.
    pub fn overlap_days(&self, other: &DateSpan) -> i64 {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            (end - start).num_days()
        } else {
            0
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }
}

impl fmt::Display for DateSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A span whose end may not be known yet. An open span blocks every day
/// from `start` onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSpan {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl OpenSpan {
    pub fn open(start: NaiveDate) -> Self {
        Self { start, end: None }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn overlaps(&self, span: &DateSpan) -> bool {
        match self.end {
            Some(end) => self.start < span.end() && span.start() < end,
            None => self.start < span.end(),
        }
    }

    /// Closes the span, returning the finished [`DateSpan`].
    pub fn close(&mut self, end: NaiveDate) -> Result<DateSpan, SpanError> {
        let span = DateSpan::new(self.start, end)?;
        self.end = Some(end);
        Ok(span)
    }

    pub fn as_closed(&self) -> Option<DateSpan> {
        self.end.and_then(|end| DateSpan::new(self.start, end).ok())
    }
}

impl From<DateSpan> for OpenSpan {
    fn from(span: DateSpan) -> Self {
        Self {
            start: span.start,
            end: Some(span.end),
        }
    }
}
