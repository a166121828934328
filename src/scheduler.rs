use std::cmp::Ordering;

use binary_heap_plus::{BinaryHeap, MinComparator};

#[derive(Debug, Copy, Clone, PartialOrd, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    NONE = 255,
    OamSearch = 0,
    LcdTransfer = 1,
    Hblank = 2,
    Vblank = 3,
    VblankWait = 4,
    Line153Reset = 5,
    DmaRequested = 6,
    DmaTransferComplete = 7,
    SerialTransferComplete = 8,
}

impl EventType {
    pub fn from_repr(value: u8) -> Option<EventType> {
        use EventType::*;
        match value {
            255 => Some(NONE),
            0 => Some(OamSearch),
            1 => Some(LcdTransfer),
            2 => Some(Hblank),
            3 => Some(Vblank),
            4 => Some(VblankWait),
            5 => Some(Line153Reset),
            6 => Some(DmaRequested),
            7 => Some(DmaTransferComplete),
            8 => Some(SerialTransferComplete),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq)]
pub struct Event {
    pub timestamp: u64,
    pub event_type: EventType,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.timestamp.partial_cmp(&other.timestamp)
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp.cmp(&other.timestamp)
    }
}

impl Event {
    /// Update the current event with new data.
    ///
    /// `delta_timestamp` will add the given time to the current `Event`'s `timestamp`.
    pub fn update_self(mut self, new_event_type: EventType, delta_timestamp: u64) -> Self {
        self.timestamp += delta_timestamp;
        self.event_type = new_event_type;
        self
    }
}

#[derive(Debug)]
pub struct Scheduler {
    // Want the smallest timestamp first, so MinComparator
    event_queue: BinaryHeap<Event, MinComparator>,
    pub current_time: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            event_queue: BinaryHeap::with_capacity_min(64),
            current_time: 0,
        }
    }

    /// Returns a `Some(Event)` if there is an event available which has a timestamp
    /// which is at or below the `current_time` for the `Scheduler`
    pub fn pop_closest(&mut self) -> Option<Event> {
        if let Some(event) = self.event_queue.peek() {
            if event.timestamp <= self.current_time {
                return self.event_queue.pop();
            }
        }
        None
    }

    /// The timestamp of the earliest scheduled event, `u64::MAX` when nothing is queued.
    pub fn next_event_timestamp(&self) -> u64 {
        self.event_queue.peek().map_or(u64::MAX, |e| e.timestamp)
    }

    /// Add a new event to the `Scheduler`.
    pub fn push_event(&mut self, event_type: EventType, timestamp: u64) {
        self.event_queue.push(Event { timestamp, event_type });
    }

    pub fn push_relative(&mut self, event_type: EventType, relative_timestamp: u64) {
        self.event_queue.push(Event {
            timestamp: self.current_time + relative_timestamp,
            event_type,
        });
    }

    /// Add an event to the `Scheduler`.
    /// This function is best used when we want to avoid an allocation for a new event,
    /// say in the `pop_closest()` loop for the scheduler. Instead we can then reuse that event
    /// and push it back in here.
    pub fn push_full_event(&mut self, event: Event) {
        self.event_queue.push(event);
    }

    pub fn remove_event_type(&mut self, event_type: EventType) {
        // Very inefficient way of doing this, but until we start needing to do more dynamic
        // removal of events it doesn't really matter.
        self.event_queue = BinaryHeap::from_vec(
            self.event_queue
                .clone()
                .into_iter()
                .filter(|e| e.event_type != event_type)
                .collect(),
        );
    }

    #[inline]
    pub fn add_cycles(&mut self, delta_cycles: u64) {
        self.current_time += delta_cycles;
    }

    /// Flatten the queue into `(event repr, timestamp)` pairs for save states.
    pub fn snapshot(&self) -> Vec<(u8, u64)> {
        self.event_queue
            .clone()
            .into_iter()
            .map(|e| (e.event_type as u8, e.timestamp))
            .collect()
    }

    /// Rebuild a scheduler from a snapshot taken with [`Scheduler::snapshot`].
    pub fn restore(current_time: u64, events: &[(u8, u64)]) -> Self {
        let mut result = Self::new();
        result.current_time = current_time;
        for (repr, timestamp) in events {
            if let Some(event_type) = EventType::from_repr(*repr) {
                result.push_event(event_type, *timestamp);
            } else {
                log::error!("Dropping unknown event type {} from snapshot", repr);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_order() {
        let mut scheduler = Scheduler::new();
        scheduler.push_event(EventType::Vblank, 400);
        scheduler.push_event(EventType::OamSearch, 80);
        scheduler.push_event(EventType::Hblank, 200);

        scheduler.add_cycles(400);

        assert_eq!(scheduler.pop_closest().unwrap().event_type, EventType::OamSearch);
        assert_eq!(scheduler.pop_closest().unwrap().event_type, EventType::Hblank);
        assert_eq!(scheduler.pop_closest().unwrap().event_type, EventType::Vblank);
        assert!(scheduler.pop_closest().is_none());
    }

    #[test]
    fn test_pop_respects_current_time() {
        let mut scheduler = Scheduler::new();
        scheduler.push_event(EventType::Hblank, 204);

        assert!(scheduler.pop_closest().is_none());
        scheduler.add_cycles(204);
        assert!(scheduler.pop_closest().is_some());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut scheduler = Scheduler::new();
        scheduler.push_event(EventType::Vblank, 456);
        scheduler.push_event(EventType::SerialTransferComplete, 4096);
        scheduler.add_cycles(100);

        let restored = Scheduler::restore(scheduler.current_time, &scheduler.snapshot());

        assert_eq!(restored.current_time, 100);
        assert_eq!(restored.next_event_timestamp(), 456);
    }
}
