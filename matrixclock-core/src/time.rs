//! Wall clock, calendar conversion and uptime scheduling
//!
//! - [`DateTime`]: civil date/time from and to local epoch seconds
//! - [`ClockState`]: the NTP-disciplined wall clock anchored to uptime
//! - [`IntervalTimer`] / [`UptimeCounter`]: self-correcting periodic timers

/// Returned by the sync source when no time could be obtained
pub const SYNC_FAILED: i64 = 0;

const SECS_PER_DAY: i64 = 86_400;

/// Errors that can occur while parsing a date/time string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DateTimeError {
    /// Not `YYYY-MM-DDTHH:MM[:SS]`
    Format,
    /// A field is outside its calendar range
    OutOfRange,
}

/// Broken-down local date and time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// Split epoch seconds into calendar fields (proleptic Gregorian)
    pub fn from_epoch(epoch: i64) -> Self {
        let days = epoch.div_euclid(SECS_PER_DAY);
        let secs = epoch.rem_euclid(SECS_PER_DAY);
        let (year, month, day) = civil_from_days(days);
        Self {
            year: year as i32,
            month,
            day,
            hour: (secs / 3600) as u8,
            minute: (secs / 60 % 60) as u8,
            second: (secs % 60) as u8,
        }
    }

    /// Epoch seconds of this date/time
    pub fn to_epoch(&self) -> i64 {
        days_from_civil(self.year as i64, self.month, self.day) * SECS_PER_DAY
            + self.hour as i64 * 3600
            + self.minute as i64 * 60
            + self.second as i64
    }

    /// Hour on a 12-hour dial (1..=12)
    pub fn hour12(&self) -> u8 {
        match self.hour % 12 {
            0 => 12,
            h => h,
        }
    }

    pub fn is_am(&self) -> bool {
        self.hour < 12
    }

    /// Parse `YYYY-MM-DDTHH:MM` with optional `:SS`
    pub fn parse_local(s: &str) -> Result<Self, DateTimeError> {
        let (date, time) = s.trim().split_once('T').ok_or(DateTimeError::Format)?;

        let mut date_parts = date.split('-');
        let year = number(date_parts.next())?;
        let month = number(date_parts.next())?;
        let day = number(date_parts.next())?;
        if date_parts.next().is_some() {
            return Err(DateTimeError::Format);
        }

        let mut time_parts = time.split(':');
        let hour = number(time_parts.next())?;
        let minute = number(time_parts.next())?;
        let second = match time_parts.next() {
            Some(part) => number(Some(part))?,
            None => 0,
        };
        if time_parts.next().is_some() {
            return Err(DateTimeError::Format);
        }

        if !(1..=12).contains(&month)
            || day < 1
            || day > days_in_month(year as i64, month as u8) as u32
            || hour > 23
            || minute > 59
            || second > 59
        {
            return Err(DateTimeError::OutOfRange);
        }

        Ok(Self {
            year: year as i32,
            month: month as u8,
            day: day as u8,
            hour: hour as u8,
            minute: minute as u8,
            second: second as u8,
        })
    }
}

fn number(part: Option<&str>) -> Result<u32, DateTimeError> {
    let part = part.ok_or(DateTimeError::Format)?;
    if part.is_empty() || part.len() > 4 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DateTimeError::Format);
    }
    part.parse().map_err(|_| DateTimeError::Format)
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Days since 1970-01-01 for a civil date
fn days_from_civil(year: i64, month: u8, day: u8) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Civil date for days since 1970-01-01
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

/// Whether the wall clock holds a usable time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncStatus {
    /// Never set
    NotSet,
    /// Set, but the last resync failed
    NeedsSync,
    /// Set and in sync
    Set,
}

/// Wall clock anchored to the monotonic uptime
#[derive(Debug, Clone)]
pub struct ClockState {
    /// Local epoch seconds at `anchor_ms`
    anchor_epoch: i64,
    anchor_ms: u64,
    status: SyncStatus,
    sync_interval_s: u32,
    next_sync_ms: u64,
    last_displayed: Option<i64>,
}

impl ClockState {
    /// A clock that has never been set; the first sync is due at once
    pub fn new(sync_interval_s: u32) -> Self {
        Self {
            anchor_epoch: 0,
            anchor_ms: 0,
            status: SyncStatus::NotSet,
            sync_interval_s,
            next_sync_ms: 0,
            last_displayed: None,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn is_set(&self) -> bool {
        self.status != SyncStatus::NotSet
    }

    /// Local epoch seconds, `None` until first set
    pub fn now(&self, now_ms: u64) -> Option<i64> {
        if !self.is_set() {
            return None;
        }
        let elapsed_s = now_ms.saturating_sub(self.anchor_ms) / 1000;
        Some(self.anchor_epoch + elapsed_s as i64)
    }

    /// Local calendar time, `None` until first set
    pub fn local(&self, now_ms: u64) -> Option<DateTime> {
        self.now(now_ms).map(DateTime::from_epoch)
    }

    /// Set the time and push the next resync one interval out
    pub fn set_time(&mut self, epoch: i64, now_ms: u64) {
        self.anchor_epoch = epoch;
        self.anchor_ms = now_ms;
        self.status = SyncStatus::Set;
        self.next_sync_ms = now_ms + self.sync_interval_s as u64 * 1000;
    }

    /// Whether the next resync is due
    pub fn sync_due(&self, now_ms: u64) -> bool {
        now_ms >= self.next_sync_ms
    }

    /// Make the next resync due immediately
    pub fn request_sync(&mut self) {
        self.next_sync_ms = 0;
    }

    /// Apply the outcome of a sync attempt
    ///
    /// [`SYNC_FAILED`] keeps the current time, marks an already set clock
    /// as needing sync and retries one interval later.
    pub fn record_sync(&mut self, epoch: i64, now_ms: u64) {
        if epoch != SYNC_FAILED {
            self.set_time(epoch, now_ms);
            return;
        }
        self.next_sync_ms = now_ms + self.sync_interval_s as u64 * 1000;
        if self.status == SyncStatus::Set {
            self.status = SyncStatus::NeedsSync;
        }
    }

    /// The current time when its second differs from the last one shown
    pub fn second_changed(&mut self, now_ms: u64) -> Option<DateTime> {
        let now = self.now(now_ms)?;
        if self.last_displayed == Some(now) {
            return None;
        }
        self.last_displayed = Some(now);
        Some(DateTime::from_epoch(now))
    }
}

/// Signed milliseconds from `prev` to `next`
pub fn time_difference(prev: u64, next: u64) -> i64 {
    next.wrapping_sub(prev) as i64
}

/// Whether `timer` is at or before `now`
pub fn time_reached(timer: u64, now: u64) -> bool {
    time_difference(timer, now) >= 0
}

/// Periodic timer that catches up after short delays and restarts after
/// long ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    next_ms: u64,
    step_ms: u32,
}

impl IntervalTimer {
    /// First expiry is immediate
    pub const fn new(step_ms: u32) -> Self {
        Self { next_ms: 0, step_ms }
    }

    pub fn next_ms(&self) -> u64 {
        self.next_ms
    }

    /// True when the timer expired; schedules the following expiry
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !time_reached(self.next_ms, now_ms) {
            return false;
        }
        self.schedule_next(now_ms);
        true
    }

    fn schedule_next(&mut self, now_ms: u64) {
        let step = self.step_ms as u64;
        self.next_ms += step;
        let passed = time_difference(self.next_ms, now_ms);
        if passed < 0 {
            return;
        }
        if passed as u64 > step {
            // Too far behind, start over
            self.next_ms = now_ms + step;
        } else {
            self.next_ms = now_ms + (step - passed as u64);
        }
    }
}

/// Seconds since boot, advanced once per elapsed second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UptimeCounter {
    timer: IntervalTimer,
    seconds: u32,
}

impl Default for UptimeCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeCounter {
    pub const fn new() -> Self {
        Self {
            timer: IntervalTimer::new(1000),
            seconds: 0,
        }
    }

    /// Count a second if a boundary was crossed; returns whether it did
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if self.timer.poll(now_ms) {
            self.seconds = self.seconds.wrapping_add(1);
            true
        } else {
            false
        }
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }
}

/// Split seconds into `(days, hours, minutes, seconds)`
pub fn split_duration(total_s: u64) -> (u64, u8, u8, u8) {
    (
        total_s / 86_400,
        (total_s / 3600 % 24) as u8,
        (total_s / 60 % 60) as u8,
        (total_s % 60) as u8,
    )
}
