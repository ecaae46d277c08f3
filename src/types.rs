//! Shared value types: roles, document kinds, statuses and timestamps
use chrono::{DateTime, TimeZone, Utc};

/// Closed set of roles a user can hold. Routing conditions and step
/// approver slots are expressed in these, never in free-form strings.
#[derive(
    minicbor::Encode,
    minicbor::Decode,
    serde::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[n(0)]
    Sales,
    #[n(1)]
    BackOffice,
    #[n(2)]
    Manager,
    #[n(3)]
    Director,
    #[n(4)]
    Executive,
    #[n(5)]
    Admin,
}

impl Role {
    /// Back-office and admin users may submit documents they do not own.
    pub fn is_back_office(&self) -> bool {
        matches!(self, Role::BackOffice | Role::Admin)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    #[n(0)]
    Quote,
    #[n(1)]
    PurchaseOrder,
}

/// Approval status carried on the document itself. The engine is the only
/// writer of this field; everything else about the document belongs to the
/// external CRUD layer.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    Pending,
    #[n(2)]
    Approved,
    #[n(3)]
    Rejected,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Cancelled,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Skipped,
    #[n(4)]
    Cancelled,
}

/// Amount applicability condition of a route. A missing bound is open:
/// no `min` means 0, no `max` means unbounded.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AmountRange {
    #[n(0)]
    pub min: Option<u64>,
    #[n(1)]
    pub max: Option<u64>,
}

impl AmountRange {
    pub fn new(min: Option<u64>, max: Option<u64>) -> Self {
        Self { min, max }
    }

    /// The lower bound with the null-means-zero rule applied. This is also
    /// the matcher's sort key.
    pub fn floor(&self) -> u64 {
        self.min.unwrap_or(0)
    }

    pub fn contains(&self, amount: u64) -> bool {
        amount >= self.floor() && self.max.is_none_or(|max| amount <= max)
    }

    /// True when some amount satisfies both ranges. Used to refuse
    /// ambiguous route configurations before they reach the matcher.
    pub fn overlaps(&self, other: &AmountRange) -> bool {
        let lo = self.floor().max(other.floor());
        match (self.max, other.max) {
            (Some(a), Some(b)) => lo <= a.min(b),
            (Some(a), None) => lo <= a,
            (None, Some(b)) => lo <= b,
            (None, None) => true,
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn open_range_contains_everything() {
        let range = AmountRange::default();

        assert!(range.contains(0));
        assert!(range.contains(u64::MAX));
    }

    #[test]
    fn disjoint_ranges_do_not_overlap() {
        let low = AmountRange::new(None, Some(500_000));
        let high = AmountRange::new(Some(500_001), None);

        assert!(!low.overlaps(&high));
        assert!(!high.overlaps(&low));
    }
}
