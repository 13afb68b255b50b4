use crate::types::NotificationRecord;

use time::{Date, OffsetDateTime, UtcOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DateGroup {
    Today,
    Yesterday,
    Older,
}

impl DateGroup {
    pub fn label(self) -> &'static str {
        match self {
            DateGroup::Today => "Today",
            DateGroup::Yesterday => "Yesterday",
            DateGroup::Older => "Older",
        }
    }
}

#[derive(Debug)]
pub struct NotificationGroup<'a> {
    pub group: DateGroup,
    pub records: Vec<&'a NotificationRecord>,
}

fn local_date(at: OffsetDateTime, offset: UtcOffset) -> Date {
    at.to_offset(offset).date()
}

/// Calendar-day comparison in `offset`. Timestamps ahead of the local clock
/// still count as today.
pub fn group_for(timestamp: OffsetDateTime, now: OffsetDateTime, offset: UtcOffset) -> DateGroup {
    let today = local_date(now, offset);
    let day = local_date(timestamp, offset);
    if day >= today {
        DateGroup::Today
    } else if today.previous_day() == Some(day) {
        DateGroup::Yesterday
    } else {
        DateGroup::Older
    }
}

/// Non-empty groups in display order, newest record first within each.
pub fn group_records(
    records: &[NotificationRecord],
    now: OffsetDateTime,
    offset: UtcOffset,
) -> Vec<NotificationGroup<'_>> {
    let mut groups: Vec<NotificationGroup<'_>> = [DateGroup::Today, DateGroup::Yesterday, DateGroup::Older]
        .into_iter()
        .map(|group| NotificationGroup {
            group,
            records: Vec::new(),
        })
        .collect();

    for record in records {
        let index = group_for(record.timestamp, now, offset) as usize;
        groups[index].records.push(record);
    }
    for group in &mut groups {
        group
            .records
            .sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
    }
    groups.retain(|group| !group.records.is_empty());
    groups
}
