//! Per-participant sector and lap history

use serde::Serialize;

use crate::types::ParticipantTiming;

/// One completed sector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SectorTime {
    pub sector: u8,
    pub time: f32,
    pub valid: bool,
}

/// Sector times observed for one participant, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimingHistory {
    sectors: Vec<SectorTime>,
    current_sector: u8,
}

const SECTORS_PER_LAP: u8 = 3;

fn following(sector: u8) -> u8 {
    sector % SECTORS_PER_LAP + 1
}

impl TimingHistory {
    /// Feeds one telemetry slot; returns the sector it completed, if any.
    ///
    /// Only forward transitions (1 to 2, 2 to 3, 3 to 1) complete a sector.
    /// A step back to the previous sector comes from a late packet and is
    /// ignored; any other jump resynchronises without recording.
    pub fn observe(&mut self, timing: &ParticipantTiming) -> Option<SectorTime> {
        let sector = timing.sector();
        let completed = self.current_sector;
        if sector == completed || sector == 0 {
            return None;
        }
        if completed != 0 && following(sector) == completed {
            return None;
        }

        self.current_sector = sector;
        if completed == 0 || following(completed) != sector {
            return None;
        }

        let time = timing.sector_time()?;
        let record = SectorTime { sector: completed, time, valid: !timing.invalid_lap() };
        self.sectors.push(record);
        Some(record)
    }

    pub fn sector_times(&self) -> &[SectorTime] {
        &self.sectors
    }

    pub fn current_sector(&self) -> u8 {
        self.current_sector
    }

    /// Lap times from consecutive sector 1, 2, 3 runs.
    pub fn lap_times(&self) -> Vec<f32> {
        let mut laps = Vec::new();
        let mut i = 0;
        while i + 2 < self.sectors.len() {
            let run = &self.sectors[i..i + 3];
            if run.iter().map(|s| s.sector).eq(1..=SECTORS_PER_LAP) {
                laps.push(run.iter().map(|s| s.time).sum());
                i += 3;
            } else {
                i += 1;
            }
        }
        laps
    }

    pub fn laps_completed(&self) -> usize {
        self.lap_times().len()
    }

    pub fn last_lap(&self) -> Option<f32> {
        self.lap_times().last().copied()
    }

    pub fn best_lap(&self) -> Option<f32> {
        self.lap_times().into_iter().reduce(f32::min)
    }

    pub fn best_sector(&self, sector: u8) -> Option<f32> {
        self.sectors.iter().filter(|s| s.sector == sector).map(|s| s.time).reduce(f32::min)
    }

    /// Sum of every recorded sector time.
    pub fn race_time(&self) -> f32 {
        self.sectors.iter().map(|s| s.time).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::car;

    fn feed(history: &mut TimingHistory, steps: &[(u8, f32)]) -> usize {
        steps.iter().filter_map(|&(sector, last)| history.observe(&car(1, 0, sector, last))).count()
    }

    #[test]
    fn records_forward_transitions_only() {
        let mut history = TimingHistory::default();
        let recorded = feed(
            &mut history,
            &[(3, -123.0), (1, -123.0), (2, 31.0), (3, 29.5), (1, 30.0), (2, 30.5)],
        );
        assert_eq!(recorded, 4);
        let sectors: Vec<_> = history.sector_times().iter().map(|s| s.sector).collect();
        assert_eq!(sectors, [1, 2, 3, 1]);
    }

    #[test]
    fn late_packets_do_not_duplicate_sectors() {
        let mut history = TimingHistory::default();
        feed(&mut history, &[(1, -123.0), (2, 31.0), (1, -123.0), (2, 31.0), (3, 29.0)]);
        let times: Vec<_> = history.sector_times().iter().map(|s| s.time).collect();
        assert_eq!(times, [31.0, 29.0]);
    }

    #[test]
    fn laps_are_sector_triples() {
        let mut history = TimingHistory::default();
        feed(
            &mut history,
            &[(1, -123.0), (2, 10.0), (3, 11.0), (1, 12.0), (2, 9.0), (3, 10.0), (1, 11.5)],
        );
        assert_eq!(history.lap_times(), vec![33.0, 30.5]);
        assert_eq!(history.best_lap(), Some(30.5));
        assert_eq!(history.last_lap(), Some(30.5));
        assert_eq!(history.best_sector(1), Some(9.0));
        assert_eq!(history.best_sector(3), Some(11.5));
        assert_eq!(history.race_time(), 63.5);
    }

    #[test]
    fn unset_sector_times_are_not_recorded() {
        let mut history = TimingHistory::default();
        assert_eq!(feed(&mut history, &[(1, -123.0), (2, -123.0)]), 0);
        assert_eq!(history.current_sector(), 2);
        assert!(history.best_lap().is_none());
    }
}
