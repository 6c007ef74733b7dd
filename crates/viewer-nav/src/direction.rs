//! Travel direction tracking and look-ahead ordering.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TravelDirection {
    #[default]
    Forward,
    Backward,
}

impl TravelDirection {
    /// Direction of a move, or `None` when the index did not change.
    pub fn between(previous: usize, current: usize) -> Option<Self> {
        match current.cmp(&previous) {
            std::cmp::Ordering::Greater => Some(TravelDirection::Forward),
            std::cmp::Ordering::Less => Some(TravelDirection::Backward),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            TravelDirection::Forward => TravelDirection::Backward,
            TravelDirection::Backward => TravelDirection::Forward,
        }
    }
}

/// Remembers the last non-zero move so that repeated views of the same index
/// keep prefetching the way the reader was going.
#[derive(Debug, Clone, Copy, Default)]
pub struct TravelTracker {
    last: TravelDirection,
}

impl TravelTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direction implied by moving from `previous` to `current`. A tie
    /// or a first visit keeps the last direction.
    pub fn observe(&mut self, current: usize, previous: Option<usize>) -> TravelDirection {
        if let Some(direction) = previous.and_then(|prev| TravelDirection::between(prev, current)) {
            self.last = direction;
        }
        self.last
    }

    pub fn last(&self) -> TravelDirection {
        self.last
    }

    /// Back to forward, as for a freshly opened source.
    pub fn reset(&mut self) {
        self.last = TravelDirection::default();
    }
}

/// Indices to load around `current`: up to `count` steps in the travel
/// direction first, then up to `count` steps the other way, clipped to
/// `0..len`.
pub fn prefetch_order(
    current: usize,
    len: usize,
    count: usize,
    direction: TravelDirection,
) -> Vec<usize> {
    if current >= len {
        return Vec::new();
    }

    let forward = (1..=count).map_while(|step| current.checked_add(step).filter(|&i| i < len));
    let backward = (1..=count).map_while(|step| current.checked_sub(step));

    match direction {
        TravelDirection::Forward => forward.chain(backward).collect(),
        TravelDirection::Backward => backward.chain(forward).collect(),
    }
}
