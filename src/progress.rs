use serde::Serialize;

/// Phase a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadPhase {
    Downloading,
    /// Part artifacts are being merged into the output file.
    Mixing,
    Completed,
}

/// Snapshot emitted to observers on every state transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    part_id: i64,
    bytes_received: u64,
    total_bytes: u64,
    phase: DownloadPhase,
}

impl ProgressEvent {
    /// Part id used for whole-file events (merge and completion).
    pub const WHOLE_FILE: i64 = -1;

    pub fn part(index: usize, bytes_received: u64, total_bytes: u64) -> Self {
        Self {
            part_id: index as i64,
            bytes_received,
            total_bytes,
            phase: DownloadPhase::Downloading,
        }
    }

    pub fn whole_file(bytes_received: u64, total_bytes: u64, phase: DownloadPhase) -> Self {
        Self {
            part_id: Self::WHOLE_FILE,
            bytes_received,
            total_bytes,
            phase,
        }
    }

    pub fn part_id(&self) -> i64 {
        self.part_id
    }

    /// Index of the part this event reports on, `None` for whole-file events.
    pub fn part_index(&self) -> Option<usize> {
        usize::try_from(self.part_id).ok()
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn phase(&self) -> DownloadPhase {
        self.phase
    }

    /// Completion percentage rounded to two decimals, 0 when the total is unknown.
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let pct = self.bytes_received as f64 * 100.0 / self.total_bytes as f64;
        (pct * 100.0).round() / 100.0
    }
}

pub type ProgressObserver = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Registered observers, invoked synchronously in registration order.
#[derive(Default)]
pub struct ProgressSink {
    observers: Vec<ProgressObserver>,
}

impl ProgressSink {
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn emit(&self, event: ProgressEvent) {
        for observer in &self.observers {
            observer(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_percentage_rounds_to_two_decimals() {
        let event = ProgressEvent::part(0, 1, 3);
        assert_eq!(event.percentage(), 33.33);

        let event = ProgressEvent::part(1, 2, 3);
        assert_eq!(event.percentage(), 66.67);

        let event = ProgressEvent::whole_file(10, 10, DownloadPhase::Completed);
        assert_eq!(event.percentage(), 100.0);
    }

    #[test]
    fn test_percentage_without_total() {
        let event = ProgressEvent::whole_file(10, 0, DownloadPhase::Mixing);
        assert_eq!(event.percentage(), 0.0);
    }

    #[test]
    fn test_whole_file_events_have_no_part_index() {
        let event = ProgressEvent::whole_file(5, 10, DownloadPhase::Mixing);
        assert_eq!(event.part_id(), -1);
        assert_eq!(event.part_index(), None);

        let event = ProgressEvent::part(2, 5, 10);
        assert_eq!(event.part_index(), Some(2));
        assert_eq!(event.phase(), DownloadPhase::Downloading);
    }

    #[test]
    fn test_sink_fans_out_to_every_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut sink = ProgressSink::default();
        for tag in 0..2 {
            let seen = seen.clone();
            sink.subscribe(move |e| seen.lock().unwrap().push((tag, e.bytes_received())));
        }

        sink.emit(ProgressEvent::part(0, 7, 10));

        assert_eq!(*seen.lock().unwrap(), vec![(0, 7), (1, 7)]);
    }

    #[test]
    fn test_event_serializes_as_camel_case() {
        let event = ProgressEvent::whole_file(4, 8, DownloadPhase::Mixing);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"partId":-1,"bytesReceived":4,"totalBytes":8,"phase":"mixing"}"#
        );
    }
}
